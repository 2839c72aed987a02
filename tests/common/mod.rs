// ABOUTME: Fake CLI agent used by integration tests.
// ABOUTME: A shell script that records argv/stdin/env per call and replays canned output.

#![allow(dead_code)]

use cligate::{GatewayConfig, Variant};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

const SCRIPT: &str = r#"#!/bin/sh
DIR='__DIR__'
n=$(cat "$DIR/count" 2>/dev/null || echo 0)
n=$((n + 1))
echo "$n" > "$DIR/count"
echo "$$" > "$DIR/pid"
printf '%s\0' "$@" > "$DIR/argv.$n"
cat > "$DIR/stdin.$n"
env > "$DIR/env.$n"
if [ -f "$DIR/response.$n" ]; then cat "$DIR/response.$n"; else cat "$DIR/response"; fi
if [ -f "$DIR/stderr" ]; then cat "$DIR/stderr" >&2; fi
if [ -f "$DIR/close_stdout" ]; then exec >&-; fi
if [ -f "$DIR/sleep" ]; then exec sleep "$(cat "$DIR/sleep")"; fi
exit "$(cat "$DIR/exit" 2>/dev/null || echo 0)"
"#;

/// A scripted stand-in for a CLI agent binary
pub struct FakeCli {
    dir: TempDir,
    binary: PathBuf,
}

impl FakeCli {
    /// Fake that prints `response` on every call
    pub fn new(response: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("fake-agent");
        std::fs::write(&binary, SCRIPT.replace("__DIR__", &dir.path().display().to_string()))
            .unwrap();
        std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755)).unwrap();
        std::fs::write(dir.path().join("response"), response).unwrap();
        Self { dir, binary }
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn binary(&self) -> &str {
        self.binary.to_str().unwrap()
    }

    /// Gateway config pointing at this fake
    pub fn config(&self, variant: Variant) -> GatewayConfig {
        let mut config = GatewayConfig::new(variant);
        config.binary = Some(self.binary().to_string());
        config
    }

    /// Output for the n-th call only (1-based)
    pub fn respond_on(&self, call: usize, response: &str) {
        std::fs::write(self.dir.path().join(format!("response.{}", call)), response).unwrap();
    }

    pub fn fail_with(&self, code: i32, stderr: &str) {
        std::fs::write(self.dir.path().join("exit"), code.to_string()).unwrap();
        std::fs::write(self.dir.path().join("stderr"), stderr).unwrap();
    }

    /// Keep running for `secs` after printing the response
    pub fn linger(&self, secs: u64) {
        std::fs::write(self.dir.path().join("sleep"), secs.to_string()).unwrap();
    }

    /// Close stdout after printing the response, before lingering
    pub fn close_stdout_early(&self) {
        std::fs::write(self.dir.path().join("close_stdout"), "").unwrap();
    }

    /// Poll until the recorded process exits; false if it outlives `within`
    pub async fn wait_for_exit(&self, within: Duration) -> bool {
        let pid = self.pid().await;
        let deadline = std::time::Instant::now() + within;
        while std::time::Instant::now() < deadline {
            if !process_alive(pid) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        !process_alive(pid)
    }

    pub fn calls(&self) -> usize {
        std::fs::read_to_string(self.dir.path().join("count"))
            .map(|s| s.trim().parse().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Arguments of the n-th call, without the binary itself
    pub fn argv(&self, call: usize) -> Vec<String> {
        let raw = std::fs::read(self.dir.path().join(format!("argv.{}", call))).unwrap();
        raw.split(|b| *b == 0)
            .filter(|part| !part.is_empty())
            .map(|part| String::from_utf8_lossy(part).into_owned())
            .collect()
    }

    pub fn stdin(&self, call: usize) -> String {
        std::fs::read_to_string(self.dir.path().join(format!("stdin.{}", call))).unwrap()
    }

    pub fn env(&self, call: usize) -> Vec<String> {
        std::fs::read_to_string(self.dir.path().join(format!("env.{}", call)))
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub async fn pid(&self) -> u32 {
        for _ in 0..100 {
            if let Ok(pid) = std::fs::read_to_string(self.dir.path().join("pid")) {
                if let Ok(pid) = pid.trim().parse() {
                    return pid;
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("fake agent never started");
    }
}

/// Value following `flag` in argv
pub fn flag_value<'a>(argv: &'a [String], flag: &str) -> Option<&'a str> {
    argv.iter()
        .position(|a| a == flag)
        .and_then(|i| argv.get(i + 1))
        .map(String::as_str)
}

pub fn process_alive(pid: u32) -> bool {
    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
