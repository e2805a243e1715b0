//! Orchestrator configuration.
//!
//! Loaded from an optional TOML file, then overlaid with environment
//! overrides. Every section has defaults so an empty file is valid.

mod env;

pub use env::{
    API_URL_VAR, EnvConfig, MAIN_BRANCH_VAR, MAX_TAG_PUSH_ATTEMPTS, REMOTE_VAR, TAG_PUSH_RETRY_VAR,
    TOKEN_VARS, UPSTREAM_BRANCH_VAR,
};

use crate::error::Result;
use crate::github::RepoSlug;
use crate::wait::{RetryPolicy, WaitPolicy};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file picked up from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "release.toml";

/// Default public API endpoint
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Complete orchestrator configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrchestratorConfig {
    /// The repository being released
    pub repository: RepositoryConfig,
    /// Release-blocker issue search
    pub blockers: BlockerConfig,
    /// Dependent repository sync automation
    pub upstream: UpstreamConfig,
    /// Prepare-release automation
    pub prepare: PrepareConfig,
    /// Tag publication
    pub tags: TagConfig,
    /// Post-release checklist
    pub verify: VerifyConfig,
    /// Bounded wait limits
    pub timeouts: TimeoutConfig,
    /// Retry limits for mutating actions
    pub retry: RetryConfig,
    /// API authentication token (environment only, never serialized)
    #[serde(skip)]
    pub token: Option<String>,
}

/// Repository being released
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RepositoryConfig {
    /// `owner/repo`; detected from the remote URL when unset
    pub slug: Option<RepoSlug>,
    /// Git remote name
    pub remote: String,
    /// Main branch name
    pub main_branch: String,
    /// Code-hosting API base URL
    pub api_url: String,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            slug: None,
            remote: "origin".to_string(),
            main_branch: "main".to_string(),
            api_url: DEFAULT_API_URL.to_string(),
        }
    }
}

/// Release-blocker search
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BlockerConfig {
    /// Issue label that marks a blocker
    pub label: String,
    /// Repositories to search; empty means only the released repository
    pub repositories: Vec<RepoSlug>,
}

impl Default for BlockerConfig {
    fn default() -> Self {
        Self {
            label: "release:blocker".to_string(),
            repositories: Vec::new(),
        }
    }
}

/// Dependent repository sync automation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpstreamConfig {
    /// Repository whose sync must be healthy; the stage is skipped when unset
    pub repository: Option<RepoSlug>,
    /// Sync workflow file name
    pub workflow: String,
    /// Branch the sync workflow runs on
    pub branch: String,
    /// A successful sync older than this is stale
    pub max_age_hours: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            repository: None,
            workflow: "update-otel.yaml".to_string(),
            branch: "main".to_string(),
            max_age_hours: 24,
        }
    }
}

/// Prepare-release automation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PrepareConfig {
    /// Workflow file name
    pub workflow: String,
    /// Title convention of the generated pull request
    pub pr_title: String,
    /// Merged PRs older than this are not considered
    pub recency_window_minutes: i64,
    /// Delay between dispatch and the first run lookup
    pub settle_delay_secs: u64,
}

impl Default for PrepareConfig {
    fn default() -> Self {
        Self {
            workflow: "prepare-release.yml".to_string(),
            pr_title: "Prepare release".to_string(),
            recency_window_minutes: 120,
            settle_delay_secs: 5,
        }
    }
}

/// Tag publication
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TagConfig {
    /// External tag-push action; `MODSET=` and `REMOTE=` are appended
    pub command: Vec<String>,
    /// Module-set name for the beta version
    pub beta_module_set: String,
    /// Module-set name for the stable version
    pub stable_module_set: String,
    /// Paths checked for changes since the current stable version
    pub stable_paths: Vec<String>,
    /// Prefix of the release branch (`release/` gives `release/v0.85.x`)
    pub branch_prefix: String,
}

impl Default for TagConfig {
    fn default() -> Self {
        Self {
            command: vec!["make".to_string(), "push-tags".to_string()],
            beta_module_set: "beta".to_string(),
            stable_module_set: "stable".to_string(),
            stable_paths: Vec::new(),
            branch_prefix: "release/".to_string(),
        }
    }
}

/// Post-release checklist
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VerifyConfig {
    /// Changelog files that must contain a section for the release
    pub changelog_files: Vec<PathBuf>,
    /// Workflow producing the source archive
    pub source_archive_workflow: String,
    /// Number of recent main-branch runs sampled for CI health
    pub ci_health_runs: u32,
    /// Whether release tags are expected to be signed
    pub signing: bool,
    /// Vulnerability scan command; skipped when the program is not on PATH
    pub vuln_scan_command: Vec<String>,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            changelog_files: vec![PathBuf::from("CHANGELOG.md")],
            source_archive_workflow: "source-code-release.yaml".to_string(),
            ci_health_runs: 10,
            signing: false,
            vuln_scan_command: vec!["govulncheck".to_string(), "./...".to_string()],
        }
    }
}

/// Bounded wait limits, in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutConfig {
    /// Interval between polls
    pub poll_interval_secs: u64,
    /// Waiting for a dispatched run to become queryable
    pub run_discovery_secs: u64,
    /// Waiting for an automation run to complete
    pub run_completion_secs: u64,
    /// Waiting for the prepare-release PR to appear
    pub pr_discovery_secs: u64,
    /// Waiting for the prepare-release PR to merge
    pub pr_merge_secs: u64,
    /// Waiting for the release branch after the beta tag push
    pub branch_creation_secs: u64,
    /// Waiting for tag-triggered builds
    pub tag_builds_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            run_discovery_secs: 120,
            run_completion_secs: 3600,
            pr_discovery_secs: 600,
            pr_merge_secs: 4 * 3600,
            branch_creation_secs: 900,
            tag_builds_secs: 2 * 3600,
        }
    }
}

impl TimeoutConfig {
    /// Wait policy bounded by `timeout_secs` at the configured interval
    pub fn policy(&self, timeout_secs: u64) -> WaitPolicy {
        WaitPolicy::new(
            Duration::from_secs(self.poll_interval_secs.max(1)),
            Duration::from_secs(timeout_secs),
        )
    }
}

/// Retry limits for the tag push
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    /// Attempts for the external tag-push action
    pub tag_push_attempts: u32,
    /// Fixed delay between attempts
    pub tag_push_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            tag_push_attempts: 3,
            tag_push_delay_secs: 10,
        }
    }
}

impl RetryConfig {
    /// Retry policy for the tag push
    pub fn tag_push_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.tag_push_attempts.max(1),
            Duration::from_secs(self.tag_push_delay_secs),
        )
    }
}

impl OrchestratorConfig {
    /// Load configuration and apply environment overrides
    ///
    /// An explicit `path` must exist. Without one, `release.toml` in `cwd`
    /// is used when present and built-in defaults otherwise.
    pub fn load(path: Option<&Path>, cwd: &Path, env: &EnvConfig) -> Result<Self> {
        let candidate = match path {
            Some(path) => Some(path.to_path_buf()),
            None => {
                let default_path = cwd.join(DEFAULT_CONFIG_FILE);
                default_path.exists().then_some(default_path)
            }
        };

        let mut config = match candidate {
            Some(path) => {
                log::debug!("Loading configuration from {}", path.display());
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading config file {}", path.display()))?;
                Self::from_toml(&content)?
            }
            None => Self::default(),
        };

        config.apply_env(env);
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Overlay environment overrides
    pub fn apply_env(&mut self, env: &EnvConfig) {
        self.token = env.token();
        if let Some(remote) = env.get(REMOTE_VAR) {
            self.repository.remote = remote;
        }
        if let Some(branch) = env.get(MAIN_BRANCH_VAR) {
            self.repository.main_branch = branch;
        }
        if let Some(branch) = env.get(UPSTREAM_BRANCH_VAR) {
            self.upstream.branch = branch;
        }
        if let Some(url) = env.get(API_URL_VAR) {
            self.repository.api_url = url;
        }
        self.retry.tag_push_attempts = env.get_clamped(
            TAG_PUSH_RETRY_VAR,
            self.retry.tag_push_attempts,
            MAX_TAG_PUSH_ATTEMPTS,
        );
    }

    /// Repositories searched for blockers, defaulting to the released one
    pub fn blocker_repositories(&self, released: &RepoSlug) -> Vec<RepoSlug> {
        if self.blockers.repositories.is_empty() {
            vec![released.clone()]
        } else {
            self.blockers.repositories.clone()
        }
    }
}
