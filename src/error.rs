//! Error types for release orchestration.
//!
//! Every fatal outcome carries enough identifying context (issue numbers,
//! run ids, URLs, tag names) for an operator to resume by hand.

use crate::stages::VerificationReport;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for release_conductor operations
pub type Result<T> = std::result::Result<T, ReleaseError>;

/// Main error type for all release_conductor operations
#[derive(Error, Debug)]
pub enum ReleaseError {
    /// Version format errors
    #[error("Version error: {0}")]
    Version(#[from] VersionError),

    /// Checks that must pass before anything is mutated
    #[error("Precondition failed: {0}")]
    Precondition(#[from] PreconditionError),

    /// Bounded waits that ran out of time
    #[error("Wait error: {0}")]
    Wait(#[from] WaitError),

    /// Stage-specific fatal outcomes
    #[error("Stage error: {0}")]
    Stage(#[from] StageError),

    /// Code-hosting API errors
    #[error("GitHub error: {0}")]
    GitHub(#[from] GitHubError),

    /// Version control errors
    #[error("Git error: {0}")]
    Git(#[from] GitError),

    /// Release context persistence errors
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Generic errors from anyhow
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Version format errors
#[derive(Error, Debug)]
pub enum VersionError {
    /// Version does not match MAJOR.MINOR.PATCH
    #[error("Invalid version '{version}': expected MAJOR.MINOR.PATCH (e.g. 0.85.0)")]
    InvalidVersion {
        /// Rejected version string
        version: String,
    },

    /// No previous version could be resolved from the tag list
    #[error("Could not resolve a previous version below {candidate} from repository tags")]
    NoPreviousVersion {
        /// Candidate version
        candidate: String,
    },
}

/// Failures detected before any mutation is issued
#[derive(Error, Debug)]
pub enum PreconditionError {
    /// Open release-blocking issues exist
    #[error("Release blocked by {} open issue(s): {}", .issues.len(), .issues.join(", "))]
    ReleaseBlocked {
        /// Issue references as `owner/repo#number (url)`
        issues: Vec<String>,
    },

    /// A release object already exists for the candidate tag
    #[error("A release already exists for tag '{tag}': {url}")]
    ReleaseAlreadyExists {
        /// Tag name
        tag: String,
        /// Release URL
        url: String,
    },

    /// Required tool or credential is unavailable
    #[error("Missing {what}: {hint}")]
    ToolOrAuthMissing {
        /// Tool or credential name
        what: String,
        /// How to provide it
        hint: String,
    },
}

/// Bounded wait errors
#[derive(Error, Debug)]
pub enum WaitError {
    /// The predicate never held within the timeout
    #[error("Timed out after {elapsed_secs:.1}s ({attempts} checks) waiting for {what}")]
    Timeout {
        /// What was being waited for
        what: String,
        /// Number of predicate evaluations
        attempts: u32,
        /// Elapsed wall-clock seconds
        elapsed_secs: f64,
    },
}

/// Fatal stage outcomes
#[derive(Error, Debug)]
pub enum StageError {
    /// Upstream sync is failing or stale and triggering was not permitted
    #[error("Upstream sync in {repo} is not ready ({reason}); rerun with --trigger-if-needed")]
    UpstreamNotReady {
        /// Upstream repository
        repo: String,
        /// Why it is not ready
        reason: String,
    },

    /// The upstream sync run finished unsuccessfully
    #[error("Upstream sync run {run_id} finished with '{conclusion}': {url}")]
    UpstreamSyncFailed {
        /// Run id
        run_id: u64,
        /// Run conclusion
        conclusion: String,
        /// Run URL
        url: String,
    },

    /// The prepare-release automation finished unsuccessfully
    #[error("Prepare-release run {run_id} finished with '{conclusion}'; logs: {url}")]
    PrepareReleaseFailed {
        /// Run id
        run_id: u64,
        /// Run conclusion
        conclusion: String,
        /// Run URL
        url: String,
    },

    /// The prepare-release pull request was closed without being merged
    #[error("Pull request #{number} '{title}' was closed without merging")]
    PrClosedWithoutMerge {
        /// PR number
        number: u64,
        /// PR title
        title: String,
    },

    /// The tag already exists locally or remotely
    #[error("Tag '{tag}' already exists ({location}); refusing to push")]
    TagConflict {
        /// Tag name
        tag: String,
        /// Where it was found
        location: String,
    },

    /// The release branch never appeared on the remote
    #[error("Release branch '{branch}' was not created on the remote within {timeout_secs}s")]
    BranchNotCreated {
        /// Expected branch
        branch: String,
        /// Timeout that elapsed
        timeout_secs: u64,
    },

    /// One or more tag-triggered builds failed
    #[error("Tag-triggered build(s) failed: {}", .failing_runs.join(", "))]
    TagBuildFailed {
        /// Failing run references
        failing_runs: Vec<String>,
    },

    /// The verification checklist reported failures
    #[error("Verification failed: {} of {} checks failed", .report.failure_count, .report.items.len())]
    VerificationFailure {
        /// Full itemized report
        report: VerificationReport,
    },

    /// A stage was invoked before its predecessors succeeded
    #[error("Stage '{stage}' requires '{predecessor}' to have succeeded first")]
    PredecessorIncomplete {
        /// Stage being invoked
        stage: String,
        /// Missing predecessor
        predecessor: String,
    },

    /// The stage graph contains a cycle
    #[error("Stage graph contains a cycle at '{stage}'")]
    CyclicGraph {
        /// Stage where the cycle was detected
        stage: String,
    },
}

/// Code-hosting API errors
#[derive(Error, Debug)]
pub enum GitHubError {
    /// Non-success HTTP status
    #[error("{method} {path} returned {status}: {message}")]
    Api {
        /// HTTP method
        method: String,
        /// Request path
        path: String,
        /// HTTP status code
        status: u16,
        /// Response message
        message: String,
    },

    /// Network-level failure
    #[error("Request to {path} failed: {reason}")]
    Transport {
        /// Request path
        path: String,
        /// Reason for the error
        reason: String,
    },

    /// Response body could not be decoded
    #[error("Could not decode response from {path}: {reason}")]
    Decode {
        /// Request path
        path: String,
        /// Reason for the error
        reason: String,
    },

    /// Malformed owner/repo reference
    #[error("Invalid repository reference '{input}'. Expected: owner/repo")]
    InvalidRepository {
        /// Rejected input
        input: String,
    },
}

/// Version control errors
#[derive(Error, Debug)]
pub enum GitError {
    /// Not a git repository
    #[error("Not a git repository. Run from within the release repository.")]
    NotRepository,

    /// A git or external command exited unsuccessfully
    #[error("Command '{command}' failed: {stderr}")]
    CommandFailed {
        /// Command line that failed
        command: String,
        /// Captured stderr
        stderr: String,
    },

    /// Output could not be interpreted
    #[error("Unexpected output from '{command}': {output}")]
    UnexpectedOutput {
        /// Command line
        command: String,
        /// Offending output
        output: String,
    },
}

/// Release context persistence errors
#[derive(Error, Debug)]
pub enum StateError {
    /// Context file not found
    #[error("Release context not found at {path}. Run the earlier stages first.")]
    NotFound {
        /// Expected path
        path: PathBuf,
    },

    /// Context file format version mismatch
    #[error("Release context format mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Expected version
        expected: u32,
        /// Found version
        found: u32,
    },

    /// Context belongs to a different release
    #[error("Release context at {path} is for {found}, not {expected}")]
    ReleaseMismatch {
        /// Context file
        path: PathBuf,
        /// Requested candidate version
        expected: String,
        /// Candidate version stored in the file
        found: String,
    },

    /// Failed to save context
    #[error("Failed to save release context: {reason}")]
    SaveFailed {
        /// Reason for the error
        reason: String,
    },

    /// Failed to load context
    #[error("Failed to load release context: {reason}")]
    LoadFailed {
        /// Reason for the error
        reason: String,
    },
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },

    /// Configuration could not be used
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Reason for the error
        reason: String,
    },
}

impl ReleaseError {
    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            ReleaseError::Version(VersionError::InvalidVersion { .. }) => vec![
                "Pass versions without a 'v' prefix or pre-release suffix, e.g. 0.85.0".to_string(),
            ],
            ReleaseError::Precondition(PreconditionError::ReleaseBlocked { issues }) => {
                let mut suggestions =
                    vec!["Resolve or relabel the blocking issues, then rerun 'validate'".to_string()];
                suggestions.extend(issues.iter().map(|issue| format!("Blocking: {}", issue)));
                suggestions
            }
            ReleaseError::Precondition(PreconditionError::ReleaseAlreadyExists { url, .. }) => vec![
                format!("Inspect the existing release: {}", url),
                "Choose the next candidate version if this one is already out".to_string(),
            ],
            ReleaseError::Precondition(PreconditionError::ToolOrAuthMissing { hint, .. }) => {
                vec![hint.clone()]
            }
            ReleaseError::Stage(StageError::UpstreamNotReady { .. }) => vec![
                "Rerun 'wait-upstream' with --trigger-if-needed to dispatch a fresh sync".to_string(),
            ],
            ReleaseError::Stage(StageError::UpstreamSyncFailed { url, .. })
            | ReleaseError::Stage(StageError::PrepareReleaseFailed { url, .. }) => vec![
                format!("Inspect the run logs: {}", url),
                "Fix the cause and rerun the same stage; no tags have been pushed".to_string(),
            ],
            ReleaseError::Stage(StageError::PrClosedWithoutMerge { number, .. }) => vec![
                format!("Reopen and merge PR #{}, or rerun 'prepare' to open a new one", number),
            ],
            ReleaseError::Stage(StageError::TagConflict { tag, .. }) => vec![
                format!("Check whether '{}' was already released: git ls-remote --tags origin {}", tag, tag),
                "If the tag is stale, delete it manually before rerunning 'push-tags'".to_string(),
            ],
            ReleaseError::Stage(StageError::BranchNotCreated { branch, .. }) => vec![
                format!("Tags are already pushed; create '{}' manually or re-run the branch workflow", branch),
                "Do NOT rerun 'push-tags' (tags exist); continue with 'verify' once the branch exists".to_string(),
            ],
            ReleaseError::Stage(StageError::TagBuildFailed { failing_runs }) => {
                let mut suggestions = vec![
                    "Tags are already pushed; re-run the failing builds from the CI UI".to_string(),
                ];
                suggestions.extend(failing_runs.iter().map(|run| format!("Failed: {}", run)));
                suggestions
            }
            ReleaseError::Stage(StageError::VerificationFailure { report }) => report
                .items
                .iter()
                .filter(|item| !item.passed)
                .map(|item| {
                    format!(
                        "Check '{}': {}",
                        item.name,
                        item.detail.as_deref().unwrap_or("failed")
                    )
                })
                .collect(),
            ReleaseError::Stage(StageError::PredecessorIncomplete { predecessor, .. }) => vec![
                format!("Run '{}' first, or use 'run' for the whole pipeline", predecessor),
            ],
            ReleaseError::State(StateError::ReleaseMismatch { path, .. }) => vec![
                format!("Remove {} or pass --context to start a new release", path.display()),
            ],
            ReleaseError::GitHub(GitHubError::Api { status: 401, .. })
            | ReleaseError::GitHub(GitHubError::Api { status: 403, .. }) => vec![
                "Check that GITHUB_TOKEN has repo and workflow scopes".to_string(),
            ],
            _ => vec!["Check the error message above for specific details".to_string()],
        }
    }

    /// Check if this error is worth retrying
    ///
    /// Only transient failures qualify; logical conflicts and validation
    /// failures never do.
    pub fn is_recoverable(&self) -> bool {
        match self {
            ReleaseError::GitHub(GitHubError::Transport { .. }) => true,
            ReleaseError::GitHub(GitHubError::Api { status, .. }) => {
                *status == 429 || *status >= 500
            }
            ReleaseError::Git(GitError::CommandFailed { .. }) => true,
            ReleaseError::Io(_) => true,
            _ => false,
        }
    }
}
