// ABOUTME: Codex CLI variant - `codex exec -` or `codex exec resume <id>` with --json.
// ABOUTME: Output is JSON Lines; message lines accumulate into the response text.

use super::{scalar_text, CommandRequest, StreamLine};
use crate::event::NormalizedResult;
use serde_json::Value;

pub const BINARY: &str = "codex";

fn build(request: &CommandRequest<'_>, resume: Option<&str>) -> Vec<String> {
    let mut args: Vec<String> = match resume {
        Some(session_id) => vec![
            request.binary.to_string(),
            "exec".to_string(),
            "resume".to_string(),
            session_id.to_string(),
        ],
        None => vec![
            request.binary.to_string(),
            "exec".to_string(),
            "-".to_string(),
        ],
    };
    args.extend(["--json".to_string(), "--skip-git-repo-check".to_string()]);

    if let Some(model) = request.model() {
        args.extend(["--model".to_string(), model.to_string()]);
    }
    if let Some(system_prompt) = &request.plan.system_prompt {
        args.extend(["--system-prompt".to_string(), system_prompt.clone()]);
    }
    if let Some(output_schema) = request.schema {
        args.extend(["--output-schema".to_string(), output_schema.to_flag_value()]);
    }
    args
}

/// `codex exec -` for new/replayed conversations, `codex exec resume <id>`
/// when a session is known.
pub fn build_command(request: &CommandRequest<'_>) -> Vec<String> {
    build(request, request.plan.resume_id())
}

/// Streaming never resumes, even when the plan carries a session id.
pub fn build_stream_command(request: &CommandRequest<'_>) -> Vec<String> {
    build(request, None)
}

fn message_content(json: &Value) -> Option<String> {
    if json.get("type").and_then(Value::as_str) != Some("message") {
        return None;
    }
    json.get("content")
        .filter(|c| !c.is_null())
        .map(scalar_text)
}

/// Fold the JSON Lines output into one result.
///
/// Undecodable lines are kept as text; `session_id` and `structured_output`
/// are taken from whichever line carries them last.
pub fn parse_output(raw: &str) -> NormalizedResult {
    let mut result = NormalizedResult::default();

    for line in raw.lines().filter(|l| !l.trim().is_empty()) {
        let Ok(json) = serde_json::from_str::<Value>(line) else {
            result.text.push_str(line);
            continue;
        };

        if let Some(content) = message_content(&json) {
            result.text.push_str(&content);
        }
        if let Some(session_id) = json.get("session_id").filter(|v| !v.is_null()) {
            result.session_id = Some(scalar_text(session_id));
        }
        if let Some(structured) = json.get("structured_output").filter(|v| !v.is_null()) {
            result.structured_output = Some(structured.clone());
        }
    }

    if result.text.is_empty() {
        tracing::debug!(raw_len = raw.len(), "No Codex message lines, using raw output");
        result.text = raw.to_string();
    }
    result
}

/// Only `message` lines with content produce a delta. Nothing is terminal;
/// the stream runs to EOF.
pub fn parse_stream_line(line: &str) -> StreamLine {
    let delta = serde_json::from_str::<Value>(line)
        .ok()
        .and_then(|json| message_content(&json));
    StreamLine {
        delta,
        ..Default::default()
    }
}
