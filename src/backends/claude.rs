// ABOUTME: Claude Code CLI variant - `claude -p -` with json or stream-json output.
// ABOUTME: Builds argv and normalizes the single JSON result or the stream-json events.

use super::{scalar_text, CommandRequest, StreamLine};
use crate::event::NormalizedResult;
use serde_json::Value;

pub const BINARY: &str = "claude";

fn push_common(args: &mut Vec<String>, request: &CommandRequest<'_>) {
    if let Some(model) = request.model() {
        args.extend(["--model".to_string(), model.to_string()]);
    }
    if let Some(system_prompt) = &request.plan.system_prompt {
        args.extend(["--system-prompt".to_string(), system_prompt.clone()]);
    }
    if let Some(session_id) = request.plan.resume_id() {
        args.extend(["--resume".to_string(), session_id.to_string()]);
    }
}

/// `claude -p - --output-format json [--model M] [--system-prompt S] [--resume ID] [--json-schema J]`
pub fn build_command(request: &CommandRequest<'_>) -> Vec<String> {
    let mut args: Vec<String> = [request.binary, "-p", "-", "--output-format", "json"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    push_common(&mut args, request);
    if let Some(schema) = request.schema {
        args.extend(["--json-schema".to_string(), schema.to_flag_value()]);
    }
    args
}

/// Streaming form: stream-json with partial messages, never a schema flag.
pub fn build_stream_command(request: &CommandRequest<'_>) -> Vec<String> {
    let mut args: Vec<String> = [
        request.binary,
        "-p",
        "-",
        "--output-format",
        "stream-json",
        "--verbose",
        "--include-partial-messages",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    push_common(&mut args, request);
    args
}

/// Parse the single JSON document `claude --output-format json` prints.
///
/// Anything that isn't a JSON object degrades to the trimmed raw text.
pub fn parse_output(raw: &str) -> NormalizedResult {
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(raw) else {
        let trimmed = raw.trim();
        tracing::debug!(raw_len = raw.len(), "Claude output is not a JSON object, using raw text");
        return NormalizedResult::text(if trimmed.is_empty() { raw } else { trimmed });
    };

    NormalizedResult {
        text: map.get("result").map(scalar_text).unwrap_or_default(),
        session_id: map.get("session_id").and_then(Value::as_str).map(str::to_string),
        structured_output: map.get("structured_output").filter(|v| !v.is_null()).cloned(),
    }
}

/// Interpret one stream-json line.
///
/// Text deltas come from `stream_event` lines wrapping a `text_delta`; the
/// `result` line carries the session id and ends the stream.
pub fn parse_stream_line(line: &str) -> StreamLine {
    if line.trim().is_empty() {
        return StreamLine::default();
    }
    let Ok(json) = serde_json::from_str::<Value>(line) else {
        return StreamLine::default();
    };

    match json.get("type").and_then(Value::as_str) {
        Some("stream_event") => {
            let delta = json
                .get("event")
                .and_then(|e| e.get("delta"))
                .filter(|d| d.get("type").and_then(Value::as_str) == Some("text_delta"))
                .and_then(|d| d.get("text"))
                .and_then(Value::as_str)
                .map(str::to_string);
            StreamLine {
                delta,
                ..Default::default()
            }
        }
        Some("result") => StreamLine {
            delta: None,
            session_id: json
                .get("session_id")
                .and_then(Value::as_str)
                .map(str::to_string),
            terminal: true,
        },
        _ => StreamLine::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{Message, PromptPlan};
    use crate::schema::Schema;
    use serde_json::json;

    fn request<'a>(
        plan: &'a PromptPlan,
        messages: &'a [Message],
        schema: Option<&'a Schema>,
    ) -> CommandRequest<'a> {
        CommandRequest {
            binary: "claude",
            model: Some("sonnet"),
            instructions: Some("Be concise"),
            messages,
            plan,
            schema,
        }
    }

    #[test]
    fn test_new_conversation_command() {
        let messages = [Message::user("hello")];
        let plan = PromptPlan::resolve(Some("Be concise"), &messages, None);
        let args = build_command(&request(&plan, &messages, None));
        assert_eq!(
            args,
            vec![
                "claude", "-p", "-", "--output-format", "json", "--model", "sonnet",
                "--system-prompt", "Be concise"
            ]
        );
    }

    #[test]
    fn test_resume_command_omits_system_prompt() {
        let messages = [Message::user("q"), Message::assistant("a"), Message::user("q2")];
        let plan = PromptPlan::resolve(Some("Be concise"), &messages, Some("s-1".into()));
        let args = build_command(&request(&plan, &messages, None));
        assert!(!args.contains(&"--system-prompt".to_string()));
        let pos = args.iter().position(|a| a == "--resume").unwrap();
        assert_eq!(args[pos + 1], "s-1");
    }

    #[test]
    fn test_schema_flag_only_in_blocking_form() {
        let messages = [Message::user("hello")];
        let plan = PromptPlan::resolve(None, &messages, None);
        let schema = Schema::new().property("answer", json!({"type": "string"}));

        let args = build_command(&request(&plan, &messages, Some(&schema)));
        let pos = args.iter().position(|a| a == "--json-schema").unwrap();
        assert_eq!(
            args[pos + 1],
            r#"{"type":"object","properties":{"answer":{"type":"string"}},"required":["answer"]}"#
        );

        let args = build_stream_command(&request(&plan, &messages, Some(&schema)));
        assert!(!args.contains(&"--json-schema".to_string()));
        assert_eq!(&args[3..7], &["--output-format", "stream-json", "--verbose", "--include-partial-messages"]);
        assert!(!args.contains(&"json".to_string()));
    }

    #[test]
    fn test_shell_metacharacters_stay_single_tokens() {
        let messages = [Message::user("hi")];
        let nasty = "$(rm -rf /); `id` && echo 'x' | cat";
        let plan = PromptPlan::resolve(Some(nasty), &messages, None);
        let mut req = request(&plan, &messages, None);
        req.instructions = Some(nasty);
        let args = build_command(&req);
        assert!(args.contains(&nasty.to_string()));
    }

    #[test]
    fn test_zero_model_is_absent() {
        let messages = [Message::user("hi")];
        let plan = PromptPlan::resolve(None, &messages, None);
        let mut req = request(&plan, &messages, None);
        req.model = Some("0");
        assert!(!build_command(&req).contains(&"--model".to_string()));
    }

    #[test]
    fn test_parse_output_result_and_session() {
        let result = parse_output(r#"{"result":"hi","session_id":"s1"}"#);
        assert_eq!(result.text, "hi");
        assert_eq!(result.session_id.as_deref(), Some("s1"));
        assert!(result.structured_output.is_none());
    }

    #[test]
    fn test_parse_output_null_result_is_empty_text() {
        let result = parse_output(r#"{"result":null,"session_id":"s1"}"#);
        assert_eq!(result.text, "");
        assert_eq!(result.session_id.as_deref(), Some("s1"));
    }

    #[test]
    fn test_parse_output_structured() {
        let result = parse_output(r#"{"result":"","structured_output":{"answer":"42"}}"#);
        assert_eq!(result.structured_output, Some(json!({"answer": "42"})));
    }

    #[test]
    fn test_parse_output_falls_back_to_raw() {
        assert_eq!(parse_output("x").text, "x");
        assert_eq!(parse_output("  plain words \n").text, "plain words");
        assert_eq!(parse_output("{not json").text, "{not json");
    }

    #[test]
    fn test_stream_text_delta() {
        let line = r#"{"type":"stream_event","event":{"delta":{"type":"text_delta","text":"Hello"}}}"#;
        assert_eq!(parse_stream_line(line).delta.as_deref(), Some("Hello"));
    }

    #[test]
    fn test_stream_empty_delta_is_kept() {
        let line = r#"{"type":"stream_event","event":{"delta":{"type":"text_delta","text":""}}}"#;
        assert_eq!(parse_stream_line(line).delta.as_deref(), Some(""));
    }

    #[test]
    fn test_stream_lines_without_delta() {
        for line in [
            r#"{"type":"stream_event","event":{"delta":{"type":"text_delta"}}}"#,
            r#"{"type":"stream_event","event":{"delta":{"type":"input_json_delta","partial_json":"{"}}}"#,
            r#"{"event":{"delta":{"type":"text_delta","text":"x"}}}"#,
            r#"{"type":"assistant","message":{}}"#,
            "not json",
            "   ",
        ] {
            let parsed = parse_stream_line(line);
            assert!(parsed.delta.is_none(), "unexpected delta for {}", line);
            assert!(!parsed.terminal);
        }
    }

    #[test]
    fn test_stream_result_line_is_terminal() {
        let parsed = parse_stream_line(r#"{"type":"result","session_id":"abc","result":"full"}"#);
        assert!(parsed.terminal);
        assert!(parsed.delta.is_none());
        assert_eq!(parsed.session_id.as_deref(), Some("abc"));
    }
}
