// ABOUTME: CliGateway drives one CLI agent variant as a text-generation provider.
// ABOUTME: Composes env, conversation state, command building, runners and parsers.

use crate::backends::{CommandRequest, Variant};
use crate::config::{Config, GatewayConfig};
use crate::conversation::{conversation_key, is_present, PromptPlan, SessionMap};
use crate::env;
use crate::error::Result;
use crate::event::{GenerateResponse, ProviderLabel, StreamEvent, Usage};
use crate::handle::DeltaStream;
use crate::runner::{self, Invocation, StreamingProcess};
use crate::traits::{PromptRequest, TextProvider};
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Called with (tool name, arguments) before a tool runs
pub type BeforeToolHook = Arc<dyn Fn(&str, &Value) + Send + Sync>;
/// Called with (tool name, arguments, result) after a tool ran
pub type AfterToolHook = Arc<dyn Fn(&str, &Value, &Value) + Send + Sync>;

/// Tool invocation callbacks kept for a higher layer. The gateway itself
/// never calls them.
#[derive(Clone)]
pub struct ToolHooks {
    pub before: BeforeToolHook,
    pub after: AfterToolHook,
}

/// Gateway to a locally installed CLI agent.
///
/// Each call launches a fresh process. Conversation continuity across calls
/// comes from the session map, which belongs to this instance alone.
pub struct CliGateway {
    config: GatewayConfig,
    provider: ProviderLabel,
    sessions: Arc<SessionMap>,
    tool_hooks: Option<ToolHooks>,
}

/// A call ready to launch
struct PreparedCall {
    key: String,
    model: String,
    invocation: Invocation,
    /// Uses the variant's streaming argv and line parser
    line_streamed: bool,
}

impl CliGateway {
    pub fn new(config: GatewayConfig) -> Self {
        let provider = ProviderLabel::new(config.variant.name());
        Self {
            config,
            provider,
            sessions: Arc::new(SessionMap::new()),
            tool_hooks: None,
        }
    }

    pub fn from_variant(variant: Variant) -> Self {
        Self::new(GatewayConfig::new(variant))
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.gateway.clone())
    }

    /// Tag responses with a different provider label
    pub fn with_provider(mut self, provider: ProviderLabel) -> Self {
        self.provider = provider;
        self
    }

    /// Register tool callbacks for a higher layer to use
    pub fn on_tool_invocation<B, A>(mut self, before: B, after: A) -> Self
    where
        B: Fn(&str, &Value) + Send + Sync + 'static,
        A: Fn(&str, &Value, &Value) + Send + Sync + 'static,
    {
        self.tool_hooks = Some(ToolHooks {
            before: Arc::new(before),
            after: Arc::new(after),
        });
        self
    }

    pub fn tool_hooks(&self) -> Option<&ToolHooks> {
        self.tool_hooks.as_ref()
    }

    pub fn variant(&self) -> Variant {
        self.config.variant
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn provider(&self) -> &ProviderLabel {
        &self.provider
    }

    pub fn default_model(&self) -> &str {
        self.config.default_model()
    }

    pub fn cheapest_model(&self) -> &str {
        self.config.cheapest_model()
    }

    pub fn smartest_model(&self) -> &str {
        self.config.smartest_model()
    }

    pub fn store_session(&self, key: &str, session_id: &str) {
        self.sessions.store(key, session_id);
    }

    pub fn session(&self, key: &str) -> Option<String> {
        self.sessions.get(key)
    }

    pub fn forget_session(&self, key: &str) -> Option<String> {
        self.sessions.remove(key)
    }

    pub fn clear_sessions(&self) {
        self.sessions.clear();
    }

    /// Session id stored for the conversation a request belongs to
    pub fn session_for(&self, request: &PromptRequest) -> Option<String> {
        self.sessions
            .get(&conversation_key(request.instructions.as_deref(), &request.messages))
    }

    /// Run the agent to completion and normalize its output.
    pub async fn generate(&self, request: &PromptRequest) -> Result<GenerateResponse> {
        let call = self.prepare(request, false);
        let raw = runner::run(&call.invocation).await?;
        let result = self.config.variant.parse_output(&raw);

        if let Some(session_id) = &result.session_id {
            tracing::info!(variant = %self.config.variant, session_id = %session_id, "Storing CLI agent session");
            self.sessions.store(&call.key, session_id);
        }

        Ok(GenerateResponse {
            text: result.text,
            usage: Usage::default(),
            provider: self.provider.clone(),
            model: call.model,
            session_id: result.session_id,
            structured_output: result.structured_output,
        })
    }

    /// Launch the agent and stream its output as events.
    ///
    /// Must be called inside a tokio runtime. The reader runs on its own task
    /// and stops, killing the child, as soon as the returned stream is dropped.
    pub fn stream(&self, invocation_id: impl Into<String>, request: &PromptRequest) -> DeltaStream {
        let call = self.prepare(request, true);
        let (tx, stream) = DeltaStream::channel();
        let driver = StreamDriver {
            variant: self.config.variant,
            invocation_id: invocation_id.into(),
            provider: self.provider.name.clone(),
            sessions: Arc::clone(&self.sessions),
            tx,
        };
        tokio::spawn(driver.run(call));
        stream
    }

    fn resolve_model(&self, requested: &str) -> String {
        if is_present(Some(requested)) {
            requested.to_string()
        } else {
            self.default_model().to_string()
        }
    }

    fn prepare(&self, request: &PromptRequest, streaming: bool) -> PreparedCall {
        let variant = self.config.variant;
        let model = self.resolve_model(&request.model);
        let instructions = request.instructions.as_deref();
        let key = conversation_key(instructions, &request.messages);

        let consult_sessions = if streaming {
            variant.resumes_while_streaming()
        } else {
            variant.supports_resume()
        };
        let stored = consult_sessions.then(|| self.sessions.get(&key)).flatten();
        let plan = PromptPlan::resolve(instructions, &request.messages, stored);
        tracing::debug!(variant = %variant, state = ?plan.state, streaming, "Resolved conversation state");

        let command = CommandRequest {
            binary: self.config.binary(),
            model: Some(&model),
            instructions,
            messages: &request.messages,
            plan: &plan,
            schema: request.schema.as_ref(),
        };
        let stream_argv = if streaming {
            variant.build_stream_command(&command)
        } else {
            None
        };
        let line_streamed = stream_argv.is_some();
        let argv = stream_argv.unwrap_or_else(|| variant.build_command(&command));

        let invocation = Invocation {
            argv,
            env: env::child_env(&self.config.env),
            stdin: variant.stdin(&plan),
            timeout_secs: self.config.timeout_secs(request.timeout_secs),
            working_dir: self.config.working_dir.clone(),
        };
        tracing::debug!(
            stdin_len = invocation.stdin.as_ref().map(String::len).unwrap_or(0),
            timeout_secs = invocation.timeout_secs,
            "Prepared CLI agent invocation"
        );

        PreparedCall {
            key,
            model,
            invocation,
            line_streamed,
        }
    }
}

impl TextProvider for CliGateway {
    fn name(&self) -> &str {
        &self.provider.name
    }

    fn generate<'a>(&'a self, request: &'a PromptRequest) -> BoxFuture<'a, Result<GenerateResponse>> {
        Box::pin(CliGateway::generate(self, request))
    }

    fn stream(&self, invocation_id: &str, request: &PromptRequest) -> DeltaStream {
        CliGateway::stream(self, invocation_id, request)
    }
}

/// Reader task behind a `DeltaStream`
struct StreamDriver {
    variant: Variant,
    invocation_id: String,
    provider: String,
    sessions: Arc<SessionMap>,
    tx: mpsc::Sender<Result<StreamEvent>>,
}

impl StreamDriver {
    async fn run(self, call: PreparedCall) {
        let start = StreamEvent::StreamStart {
            invocation_id: self.invocation_id.clone(),
            provider: self.provider.clone(),
            model: call.model.clone(),
        };
        if self.tx.send(Ok(start)).await.is_err() {
            tracing::debug!("Stream consumer gone before launch");
            return;
        }

        if call.line_streamed {
            self.run_lines(call).await;
        } else {
            self.run_one_shot(call).await;
        }
    }

    /// Variants without a streaming form: one blocking run, one delta.
    async fn run_one_shot(self, call: PreparedCall) {
        // Dropping the run future on cancellation kills the child.
        let outcome = tokio::select! {
            _ = self.tx.closed() => {
                tracing::debug!("Stream consumer dropped, abandoning one-shot run");
                return;
            }
            outcome = runner::run(&call.invocation) => outcome,
        };

        let result = match outcome {
            Ok(raw) => self.variant.parse_output(&raw),
            Err(e) => {
                let _ = self.tx.send(Err(e)).await;
                return;
            }
        };

        if let Some(session_id) = &result.session_id {
            self.sessions.store(&call.key, session_id);
        }
        if !self.send_delta(result.text.clone()).await {
            return;
        }
        self.send_end(result.text, result.session_id).await;
    }

    async fn run_lines(self, call: PreparedCall) {
        let mut process = match StreamingProcess::spawn(&call.invocation) {
            Ok(process) => process,
            Err(e) => {
                let _ = self.tx.send(Err(e)).await;
                return;
            }
        };

        let mut text = String::new();
        let mut session_id = None;
        let mut saw_terminal = false;

        loop {
            let next = tokio::select! {
                _ = self.tx.closed() => None,
                line = process.next_line() => Some(line),
            };
            let Some(line) = next else {
                tracing::debug!("Stream consumer dropped, killing CLI agent");
                process.kill().await;
                return;
            };

            let line = match line {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    let _ = self.tx.send(Err(e)).await;
                    return;
                }
            };

            let parsed = self.variant.parse_stream_line(&line);
            if parsed.session_id.is_some() {
                session_id = parsed.session_id;
            }
            if let Some(delta) = parsed.delta {
                text.push_str(&delta);
                if !self.send_delta(delta).await {
                    process.kill().await;
                    return;
                }
            }
            if parsed.terminal {
                saw_terminal = true;
                break;
            }
        }

        if !saw_terminal {
            let finished = tokio::select! {
                _ = self.tx.closed() => None,
                result = process.finish() => Some(result),
            };
            match finished {
                None => {
                    tracing::debug!("Stream consumer dropped while waiting for exit, killing CLI agent");
                    process.kill().await;
                    return;
                }
                Some(Err(e)) => {
                    let _ = self.tx.send(Err(e)).await;
                    return;
                }
                Some(Ok(())) => {}
            }
        }

        if let Some(id) = session_id.as_deref().filter(|_| self.variant.stores_streamed_sessions()) {
            tracing::info!(variant = %self.variant, session_id = %id, "Storing streamed CLI agent session");
            self.sessions.store(&call.key, id);
        }

        // Ends the stream before we wait on the child.
        self.send_end(text, session_id).await;

        if saw_terminal {
            process.reap().await;
        }
    }

    async fn send_delta(&self, delta: String) -> bool {
        let event = StreamEvent::TextDelta {
            invocation_id: self.invocation_id.clone(),
            delta,
        };
        self.tx.send(Ok(event)).await.is_ok()
    }

    /// Send the closing envelope. Consumes the driver so its sender is
    /// dropped and the stream ends right after.
    async fn send_end(self, text: String, session_id: Option<String>) {
        let end = StreamEvent::StreamEnd {
            invocation_id: self.invocation_id,
            text,
            session_id,
            usage: Usage::default(),
        };
        let _ = self.tx.send(Ok(end)).await;
    }
}
