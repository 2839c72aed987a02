// ABOUTME: Result and event types produced by CLI agent gateways.
// ABOUTME: Normalized per-call results, generate responses, and streaming envelopes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Events emitted while streaming a CLI agent invocation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum StreamEvent {
    /// Opening envelope, always the first event
    StreamStart {
        invocation_id: String,
        provider: String,
        model: String,
    },

    /// Incremental text fragment. An empty delta is still a delta.
    TextDelta { invocation_id: String, delta: String },

    /// Closing envelope, always the last event of a successful stream
    StreamEnd {
        invocation_id: String,
        /// Concatenation of every delta emitted
        text: String,
        /// Session id reported by the agent, if any
        session_id: Option<String>,
        usage: Usage,
    },
}

impl StreamEvent {
    /// The delta text, if this is a delta event
    pub fn delta(&self) -> Option<&str> {
        match self {
            StreamEvent::TextDelta { delta, .. } => Some(delta),
            _ => None,
        }
    }
}

/// Token usage. CLI agents report none, so every field stays zero.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Canonical shape every variant's raw output collapses into
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NormalizedResult {
    pub text: String,
    pub session_id: Option<String>,
    pub structured_output: Option<Value>,
}

impl NormalizedResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// Label identifying which provider produced a response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderLabel {
    pub name: String,
}

impl ProviderLabel {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Response returned by a blocking `generate` call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerateResponse {
    pub text: String,
    pub usage: Usage,
    pub provider: ProviderLabel,
    pub model: String,
    pub session_id: Option<String>,
    pub structured_output: Option<Value>,
}
