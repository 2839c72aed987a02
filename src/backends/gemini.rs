// ABOUTME: Gemini CLI variant - one-shot `gemini --prompt <text>` invocations.
// ABOUTME: No stdin, no session resume, no streaming form of its own.

use super::{scalar_text, CommandRequest};
use crate::conversation::format_all_messages;
use crate::event::NormalizedResult;
use serde_json::Value;

pub const BINARY: &str = "gemini";

/// `gemini --prompt <text> [--model M]`.
///
/// The prompt carries instructions and the whole history, since every call
/// starts from scratch.
pub fn build_command(request: &CommandRequest<'_>) -> Vec<String> {
    let prompt = format_all_messages(request.instructions, request.messages);
    let mut args = vec![request.binary.to_string(), "--prompt".to_string(), prompt];
    if let Some(model) = request.model() {
        args.extend(["--model".to_string(), model.to_string()]);
    }
    args
}

/// Read the `response` field of the JSON output, or treat the whole output
/// as the response when it isn't a JSON object.
pub fn parse_output(raw: &str) -> NormalizedResult {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => NormalizedResult::text(
            map.get("response").map(scalar_text).unwrap_or_default(),
        ),
        _ => NormalizedResult::text(raw.trim()),
    }
}
