// ABOUTME: Subprocess lifecycle for CLI agents: spawn, feed stdin, enforce deadlines.
// ABOUTME: Blocking runs buffer stdout; streaming runs hand out stdout one line at a time.

use crate::error::{GatewayError, Result};
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Default deadline for one invocation
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Stand-in deadline when `now + timeout` does not fit in an `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// How long a child may keep running after it reported its final result
const REAP_GRACE: Duration = Duration::from_secs(2);

/// Everything needed to launch one CLI agent process. Built fresh per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Binary followed by its arguments, passed as discrete tokens
    pub argv: Vec<String>,
    /// Complete child environment (the inherited env is not merged in again)
    pub env: HashMap<OsString, OsString>,
    /// Written to the child's stdin, which is then closed. `None` leaves
    /// stdin attached to /dev/null.
    pub stdin: Option<String>,
    pub timeout_secs: u64,
    pub working_dir: Option<PathBuf>,
}

impl Invocation {
    pub fn binary(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or("")
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Absolute deadline for a call starting now. Timeouts too large to
    /// represent saturate to a far-future instant.
    fn deadline(&self) -> Instant {
        let now = Instant::now();
        now.checked_add(self.timeout())
            .unwrap_or_else(|| now + FAR_FUTURE)
    }
}

fn spawn(invocation: &Invocation) -> Result<Child> {
    let (binary, args) = invocation.argv.split_first().ok_or_else(|| GatewayError::Spawn {
        binary: String::new(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty argv"),
    })?;

    if binary.contains("..") || binary.contains('\0') {
        return Err(GatewayError::Spawn {
            binary: binary.clone(),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "invalid CLI binary path",
            ),
        });
    }

    let mut command = Command::new(binary);
    command
        .args(args)
        .env_clear()
        .envs(&invocation.env)
        .stdin(if invocation.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(dir) = &invocation.working_dir {
        if !dir.exists() {
            return Err(GatewayError::Spawn {
                binary: binary.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("working directory does not exist: {}", dir.display()),
                ),
            });
        }
        command.current_dir(dir);
    }

    tracing::debug!(?args, binary = %binary, "Spawning CLI agent");

    let mut child = command.spawn().map_err(|source| GatewayError::Spawn {
        binary: binary.clone(),
        source,
    })?;

    if let Some(input) = invocation.stdin.clone() {
        if let Some(mut stdin) = child.stdin.take() {
            // Feed stdin from its own task so a chatty child can't deadlock us
            // on a full stdout pipe.
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(input.as_bytes()).await {
                    tracing::debug!(error = %e, "CLI agent closed stdin early");
                }
            });
        }
    }

    Ok(child)
}

/// Run to completion and return stdout unmodified.
///
/// Kills the child on timeout. A non-zero exit becomes `NonZeroExit`
/// carrying the trimmed stderr.
pub async fn run(invocation: &Invocation) -> Result<String> {
    let child = spawn(invocation)?;

    // Dropping the wait future on timeout drops the child, and kill_on_drop
    // sends the kill.
    let output = match tokio::time::timeout_at(invocation.deadline(), child.wait_with_output()).await {
        Ok(output) => output?,
        Err(_) => {
            tracing::error!(
                binary = %invocation.binary(),
                timeout_secs = invocation.timeout_secs,
                "CLI agent timed out, killed"
            );
            return Err(GatewayError::Timeout {
                timeout_secs: invocation.timeout_secs,
            });
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::warn!(
            binary = %invocation.binary(),
            exit_code = ?output.status.code(),
            stderr = %stderr.trim(),
            "CLI agent exited unsuccessfully"
        );
        return Err(GatewayError::non_zero_exit(output.status.code(), &stderr));
    }

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    tracing::debug!(stdout_len = stdout.len(), "CLI agent finished");
    Ok(stdout)
}

/// A running child whose stdout is consumed line by line.
///
/// One deadline covers the whole read loop and the final wait.
pub struct StreamingProcess {
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr: JoinHandle<String>,
    deadline: Instant,
    timeout_secs: u64,
    binary: String,
}

impl StreamingProcess {
    pub fn spawn(invocation: &Invocation) -> Result<Self> {
        let mut child = spawn(invocation)?;

        let stdout = child.stdout.take().ok_or_else(|| {
            GatewayError::Io(std::io::Error::other("failed to capture stdout"))
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            GatewayError::Io(std::io::Error::other("failed to capture stderr"))
        })?;

        let binary = invocation.binary().to_string();
        let stderr_binary = binary.clone();
        let stderr = tokio::spawn(async move {
            let mut reader = BufReader::new(stderr);
            let mut buf = Vec::new();
            if let Err(e) = reader.read_to_end(&mut buf).await {
                tracing::debug!(error = %e, "Failed reading CLI agent stderr");
            }
            let text = String::from_utf8_lossy(&buf).into_owned();
            for line in text.lines().filter(|l| !l.trim().is_empty()) {
                tracing::warn!(binary = %stderr_binary, stderr = %line, "CLI agent stderr");
            }
            text
        });

        Ok(Self {
            child,
            stdout: BufReader::new(stdout),
            stderr,
            deadline: invocation.deadline(),
            timeout_secs: invocation.timeout_secs,
            binary,
        })
    }

    /// Next complete stdout line without its line terminator, or `None` at EOF.
    ///
    /// Invalid UTF-8 is replaced rather than treated as an error.
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        let mut buf = Vec::new();
        let read = tokio::time::timeout_at(self.deadline, self.stdout.read_until(b'\n', &mut buf));
        match read.await {
            Ok(Ok(0)) => Ok(None),
            Ok(Ok(_)) => {
                if buf.last() == Some(&b'\n') {
                    buf.pop();
                    if buf.last() == Some(&b'\r') {
                        buf.pop();
                    }
                }
                Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(self.timed_out().await),
        }
    }

    /// Wait for exit after stdout hit EOF and classify the status.
    ///
    /// Borrows rather than consumes so a caller racing this against
    /// cancellation can still kill the child.
    pub async fn finish(&mut self) -> Result<()> {
        let status = match tokio::time::timeout_at(self.deadline, self.child.wait()).await {
            Ok(status) => status?,
            Err(_) => return Err(self.timed_out().await),
        };

        if status.success() {
            self.stderr.abort();
            return Ok(());
        }

        let stderr = match tokio::time::timeout_at(self.deadline, &mut self.stderr).await {
            Ok(Ok(text)) => text,
            _ => String::new(),
        };
        tracing::warn!(binary = %self.binary, exit_code = ?status.code(), "CLI agent exited unsuccessfully");
        Err(GatewayError::non_zero_exit(status.code(), &stderr))
    }

    /// Reap a child whose output we stopped reading after a terminal line.
    ///
    /// The exit status no longer affects the result. A child still running
    /// after a short grace period (or past the deadline) is killed.
    pub async fn reap(mut self) {
        let grace = Instant::now()
            .checked_add(REAP_GRACE)
            .map_or(self.deadline, |grace| grace.min(self.deadline));
        match tokio::time::timeout_at(grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(binary = %self.binary, exit_code = ?status.code(), "CLI agent exited after result");
            }
            Ok(Err(e)) => tracing::warn!(error = %e, "Failed to wait for CLI agent"),
            Err(_) => {
                tracing::warn!(binary = %self.binary, "CLI agent lingered after result, killing");
                self.kill().await;
            }
        }
        self.stderr.abort();
    }

    /// Kill the child and wait for it to go away.
    pub async fn kill(&mut self) {
        if let Err(e) = self.child.start_kill() {
            tracing::debug!(error = %e, "CLI agent already gone");
        }
        if let Err(e) = self.child.wait().await {
            tracing::warn!(error = %e, "Failed to reap killed CLI agent");
        }
    }

    async fn timed_out(&mut self) -> GatewayError {
        tracing::error!(
            binary = %self.binary,
            timeout_secs = self.timeout_secs,
            "CLI agent stream timed out, killing"
        );
        self.kill().await;
        GatewayError::Timeout {
            timeout_secs: self.timeout_secs,
        }
    }
}
