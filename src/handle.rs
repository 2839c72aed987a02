// ABOUTME: DeltaStream is the consumer side of a streaming CLI agent invocation.
// ABOUTME: Backed by a bounded channel; dropping it stops the reader and kills the child.

use crate::error::Result;
use crate::event::StreamEvent;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Capacity of the channel between the reader task and the consumer
pub const STREAM_BUFFER: usize = 32;

/// Lazy, finite, non-restartable sequence of stream events.
///
/// Items arrive in the exact order the agent produced them. An `Err` item
/// is always the last one. This is `Send` so it can cross task boundaries.
pub struct DeltaStream {
    rx: mpsc::Receiver<Result<StreamEvent>>,
}

impl DeltaStream {
    /// Consumer side of a channel whose sender is owned by a reader task
    pub fn new(rx: mpsc::Receiver<Result<StreamEvent>>) -> Self {
        Self { rx }
    }

    /// Bounded sender/stream pair
    pub fn channel() -> (mpsc::Sender<Result<StreamEvent>>, Self) {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        (tx, Self::new(rx))
    }

    /// Wait for the next event. `None` means the reader task is done and
    /// nothing more will arrive.
    pub async fn recv(&mut self) -> Option<Result<StreamEvent>> {
        self.rx.recv().await
    }

    /// Take an already buffered event, if any. `None` covers both "nothing
    /// yet" and "finished".
    pub fn try_recv(&mut self) -> Option<Result<StreamEvent>> {
        self.rx.try_recv().ok()
    }

    /// Drain the stream, concatenating every delta.
    ///
    /// Stops at the first error and returns it.
    pub async fn collect_text(mut self) -> Result<String> {
        let mut text = String::new();
        while let Some(event) = self.recv().await {
            if let Some(delta) = event?.delta() {
                text.push_str(delta);
            }
        }
        Ok(text)
    }
}

impl Stream for DeltaStream {
    type Item = Result<StreamEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
