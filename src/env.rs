// ABOUTME: Builds the environment handed to a spawned CLI agent.
// ABOUTME: Merges config overrides over the inherited env and strips nesting markers.

use std::collections::HashMap;
use std::ffi::{OsStr, OsString};

/// Variables an agent CLI uses to detect that it is running inside another
/// agent session. Removed from every child environment, whatever their source.
pub const NESTING_MARKERS: [&str; 3] = ["CLAUDECODE", "CLAUDE_CODE_ENTRYPOINT", "CLAUDE_CODE_SSE_PORT"];

/// Merge `overrides` over `inherited`, then drop the nesting markers.
///
/// Config values win over inherited ones, but cannot reintroduce a marker.
/// Everything else passes through byte for byte, including names and values
/// that are not valid UTF-8.
pub fn sanitize<I>(inherited: I, overrides: &HashMap<String, String>) -> HashMap<OsString, OsString>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    let mut env: HashMap<OsString, OsString> = inherited.into_iter().collect();
    env.extend(
        overrides
            .iter()
            .map(|(k, v)| (OsString::from(k), OsString::from(v))),
    );

    for marker in NESTING_MARKERS {
        if env.remove(OsStr::new(marker)).is_some() {
            tracing::debug!(var = marker, "Stripped nesting marker from child env");
        }
    }

    env
}

/// Sanitized environment built from the current process environment.
pub fn child_env(overrides: &HashMap<String, String>) -> HashMap<OsString, OsString> {
    sanitize(std::env::vars_os(), overrides)
}
