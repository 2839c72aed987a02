// ABOUTME: CLI agent variants (Claude, Codex, Gemini) and their dispatch functions.
// ABOUTME: Each variant module owns its argv rules and output formats.

pub mod claude;
pub mod codex;
pub mod gemini;

use crate::conversation::{is_present, Message, PromptPlan};
use crate::event::NormalizedResult;
use crate::schema::Schema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Which CLI agent a gateway drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Claude,
    Codex,
    Gemini,
}

/// Inputs shared by every variant's command builder
#[derive(Debug, Clone, Copy)]
pub struct CommandRequest<'a> {
    pub binary: &'a str,
    pub model: Option<&'a str>,
    pub instructions: Option<&'a str>,
    pub messages: &'a [Message],
    pub plan: &'a PromptPlan,
    pub schema: Option<&'a Schema>,
}

impl<'a> CommandRequest<'a> {
    /// Model name if it should be passed as a flag
    pub fn model(&self) -> Option<&'a str> {
        self.model.filter(|m| is_present(Some(*m)))
    }
}

/// What one streamed stdout line contributed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamLine {
    pub delta: Option<String>,
    pub session_id: Option<String>,
    /// The agent reported its final result; stop reading
    pub terminal: bool,
}

/// Strings as-is, null as "", everything else JSON-encoded.
pub(crate) fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl Variant {
    pub const ALL: [Variant; 3] = [Variant::Claude, Variant::Codex, Variant::Gemini];

    pub fn name(&self) -> &'static str {
        match self {
            Variant::Claude => "claude",
            Variant::Codex => "codex",
            Variant::Gemini => "gemini",
        }
    }

    /// Binary looked up on PATH when the config has no override
    pub fn default_binary(&self) -> &'static str {
        match self {
            Variant::Claude => claude::BINARY,
            Variant::Codex => codex::BINARY,
            Variant::Gemini => gemini::BINARY,
        }
    }

    /// Whether the CLI can continue a session it issued earlier
    pub fn supports_resume(&self) -> bool {
        matches!(self, Variant::Claude | Variant::Codex)
    }

    /// Whether the streaming form resumes stored sessions
    pub fn resumes_while_streaming(&self) -> bool {
        matches!(self, Variant::Claude)
    }

    /// Whether session ids seen while streaming are kept for the next call
    pub fn stores_streamed_sessions(&self) -> bool {
        matches!(self, Variant::Claude)
    }

    /// (default, cheapest, smartest) model names used when config sets none
    pub fn fallback_models(&self) -> (&'static str, &'static str, &'static str) {
        match self {
            Variant::Claude => ("sonnet", "haiku", "opus"),
            Variant::Codex => ("gpt-5-codex", "gpt-5-codex-mini", "gpt-5-codex"),
            Variant::Gemini => ("gemini-2.5-pro", "gemini-2.5-flash", "gemini-2.5-pro"),
        }
    }

    pub fn build_command(&self, request: &CommandRequest<'_>) -> Vec<String> {
        match self {
            Variant::Claude => claude::build_command(request),
            Variant::Codex => codex::build_command(request),
            Variant::Gemini => gemini::build_command(request),
        }
    }

    /// Streaming argv, or `None` for variants without a streaming form
    pub fn build_stream_command(&self, request: &CommandRequest<'_>) -> Option<Vec<String>> {
        match self {
            Variant::Claude => Some(claude::build_stream_command(request)),
            Variant::Codex => Some(codex::build_stream_command(request)),
            Variant::Gemini => None,
        }
    }

    /// Text piped to the child, if the variant reads its prompt from stdin
    pub fn stdin(&self, plan: &PromptPlan) -> Option<String> {
        match self {
            Variant::Claude | Variant::Codex => Some(plan.stdin.clone()),
            Variant::Gemini => None,
        }
    }

    pub fn parse_output(&self, raw: &str) -> NormalizedResult {
        match self {
            Variant::Claude => claude::parse_output(raw),
            Variant::Codex => codex::parse_output(raw),
            Variant::Gemini => gemini::parse_output(raw),
        }
    }

    pub fn parse_stream_line(&self, line: &str) -> StreamLine {
        match self {
            Variant::Claude => claude::parse_stream_line(line),
            Variant::Codex => codex::parse_stream_line(line),
            Variant::Gemini => StreamLine::default(),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "claude" | "claude-code" => Ok(Variant::Claude),
            "codex" => Ok(Variant::Codex),
            "gemini" => Ok(Variant::Gemini),
            other => Err(format!("Unknown CLI agent variant: {}", other)),
        }
    }
}
