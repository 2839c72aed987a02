// ABOUTME: Configuration file support for CLI agent gateways.
// ABOUTME: Loads the [gateway] section from TOML: variant, binary, env, timeout, models.

use crate::backends::Variant;
use crate::conversation::is_present;
use crate::runner::DEFAULT_TIMEOUT_SECS;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Top-level configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub gateway: GatewayConfig,
}

/// Static settings for one gateway instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Which CLI agent to drive
    #[serde(rename = "type")]
    pub variant: Variant,

    /// Binary path override; defaults to the variant's binary name on PATH
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<String>,

    /// Extra environment variables, taking precedence over inherited ones
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Deadline for one invocation, in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cheapest_model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smartest_model: Option<String>,

    /// Working directory for the child process
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
}

impl GatewayConfig {
    pub fn new(variant: Variant) -> Self {
        Self {
            variant,
            binary: None,
            env: HashMap::new(),
            timeout_secs: None,
            default_model: None,
            cheapest_model: None,
            smartest_model: None,
            working_dir: None,
        }
    }

    /// Configured binary, or the variant's default
    pub fn binary(&self) -> &str {
        self.binary
            .as_deref()
            .filter(|b| is_present(Some(*b)))
            .unwrap_or_else(|| self.variant.default_binary())
    }

    /// Per-call override, else configured value, else 300 seconds
    pub fn timeout_secs(&self, override_secs: Option<u64>) -> u64 {
        override_secs
            .or(self.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
    }

    pub fn default_model(&self) -> &str {
        pick(&self.default_model, self.variant.fallback_models().0)
    }

    pub fn cheapest_model(&self) -> &str {
        pick(&self.cheapest_model, self.variant.fallback_models().1)
    }

    pub fn smartest_model(&self) -> &str {
        pick(&self.smartest_model, self.variant.fallback_models().2)
    }
}

fn pick<'a>(configured: &'a Option<String>, fallback: &'static str) -> &'a str {
    configured
        .as_deref()
        .filter(|m| is_present(Some(*m)))
        .unwrap_or(fallback)
}

impl Config {
    /// Read and parse a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&text)
    }

    /// Parse a config document already in memory.
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse config TOML")
    }

    /// Load the first config file on the search path, or `None` when there
    /// is none. A file that exists but fails to parse is an error.
    pub fn find_and_load() -> Result<Option<Self>> {
        match search_path().into_iter().find(|path| path.is_file()) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "Loading gateway config");
                Self::from_file(&path).map(Some)
            }
            None => Ok(None),
        }
    }
}

/// `./cligate.toml`, then `$HOME/.config/cligate/config.toml`
fn search_path() -> Vec<PathBuf> {
    let local = std::env::current_dir()
        .ok()
        .map(|dir| dir.join("cligate.toml"));
    let user = std::env::var_os("HOME")
        .map(|home| PathBuf::from(home).join(".config/cligate/config.toml"));
    local.into_iter().chain(user).collect()
}
