// ABOUTME: Drives locally installed CLI agents (Claude Code, Codex, Gemini) as text providers.
// ABOUTME: One subprocess per call, with session continuity tracked across launches.

pub mod backends;
pub mod config;
pub mod conversation;
pub mod env;
pub mod error;
pub mod event;
pub mod gateway;
pub mod handle;
pub mod runner;
pub mod schema;
pub mod traits;

pub use backends::Variant;
pub use config::{Config, GatewayConfig};
pub use conversation::{Message, Role};
pub use error::{GatewayError, Result};
pub use event::{GenerateResponse, NormalizedResult, ProviderLabel, StreamEvent, Usage};
pub use gateway::CliGateway;
pub use handle::DeltaStream;
pub use schema::Schema;
pub use traits::{PromptRequest, TextProvider};
