// ABOUTME: TextProvider trait - the uniform generate/stream seam gateways implement.
// ABOUTME: Also defines PromptRequest, the per-call input shared by both operations.

use crate::conversation::Message;
use crate::error::Result;
use crate::event::GenerateResponse;
use crate::handle::DeltaStream;
use crate::schema::Schema;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

/// One text-generation call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptRequest {
    /// Model name; empty means the gateway's default model
    pub model: String,
    pub instructions: Option<String>,
    pub messages: Vec<Message>,
    /// Structured-output schema, if the caller wants one
    pub schema: Option<Schema>,
    /// Overrides the configured timeout for this call only
    pub timeout_secs: Option<u64>,
}

impl PromptRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            ..Default::default()
        }
    }

    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}

/// Something that turns a conversation into text, blocking or streamed.
pub trait TextProvider {
    /// Provider name used to tag responses
    fn name(&self) -> &str;

    /// Run the call to completion
    fn generate<'a>(&'a self, request: &'a PromptRequest) -> BoxFuture<'a, Result<GenerateResponse>>;

    /// Start the call and return its events as they arrive.
    ///
    /// The stream opens with a start envelope and, on success, closes with
    /// an end envelope. Dropping it cancels the call.
    fn stream(&self, invocation_id: &str, request: &PromptRequest) -> DeltaStream;
}
