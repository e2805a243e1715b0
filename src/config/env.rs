//! Environment snapshot used for configuration overrides.
//!
//! Captured once at startup so the rest of the crate never reads the
//! process environment directly.

use std::collections::HashMap;

/// Token variables, checked in order
pub const TOKEN_VARS: [&str; 2] = ["GITHUB_TOKEN", "GH_TOKEN"];
/// Override for the git remote name
pub const REMOTE_VAR: &str = "RELEASE_REMOTE";
/// Override for the main branch name
pub const MAIN_BRANCH_VAR: &str = "RELEASE_MAIN_BRANCH";
/// Override for the upstream repository's branch name
pub const UPSTREAM_BRANCH_VAR: &str = "RELEASE_UPSTREAM_BRANCH";
/// Override for the code-hosting API base URL
pub const API_URL_VAR: &str = "RELEASE_GITHUB_API_URL";
/// Override for tag push attempts
pub const TAG_PUSH_RETRY_VAR: &str = "RELEASE_RETRY_TAG_PUSH";

/// Upper bound for `RELEASE_RETRY_TAG_PUSH`
pub const MAX_TAG_PUSH_ATTEMPTS: u32 = 10;

/// Immutable view of the environment variables the orchestrator honours
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    vars: HashMap<String, String>,
}

impl EnvConfig {
    /// Snapshot the current process environment
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Build from explicit pairs (tests, embedding)
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Get a non-empty variable
    pub fn get(&self, key: &str) -> Option<String> {
        self.vars
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    /// Authentication token for the code-hosting API
    pub fn token(&self) -> Option<String> {
        TOKEN_VARS.iter().find_map(|key| self.get(key))
    }

    /// Parse a count from `key`, clamped to `max`
    ///
    /// Unset or unparseable values fall back to `default`.
    pub fn get_clamped(&self, key: &str, default: u32, max: u32) -> u32 {
        self.get(key)
            .and_then(|s| s.parse::<u32>().ok())
            .map(|v| v.min(max))
            .unwrap_or(default)
    }
}
