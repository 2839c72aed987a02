// ABOUTME: Error taxonomy for CLI agent invocations.
// ABOUTME: Timeouts and non-zero exits are fatal; malformed output never is.

use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Errors surfaced by a CLI agent invocation
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The child process outlived its deadline and was killed
    #[error("CLI agent timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// The child process exited unsuccessfully
    #[error("{message}")]
    NonZeroExit { code: Option<i32>, message: String },

    /// The binary could not be launched
    #[error("Failed to spawn {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    /// Pipe I/O failed while talking to the child
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    /// Build a `NonZeroExit` from the exit code and captured stderr.
    ///
    /// Uses the trimmed stderr as the message, falling back to
    /// `"exited with code N"` when stderr carries nothing but whitespace.
    pub fn non_zero_exit(code: Option<i32>, stderr: &str) -> Self {
        let trimmed = stderr.trim();
        let message = if trimmed.is_empty() {
            match code {
                Some(code) => format!("exited with code {}", code),
                None => "exited with code -1 (terminated by signal)".to_string(),
            }
        } else {
            trimmed.to_string()
        };
        GatewayError::NonZeroExit { code, message }
    }

    /// Whether this error is a deadline expiry
    pub fn is_timeout(&self) -> bool {
        matches!(self, GatewayError::Timeout { .. })
    }
}
