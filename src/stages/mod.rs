//! Release stages and the sequencer that orders them.
//!
//! Each stage is a small component generic over the external collaborators
//! it talks to ([`HostingApi`], [`VersionControl`], [`TagPushAction`]) so
//! that tests can drive it against in-memory fakes.

mod graph;
mod prepare;
mod prerequisites;
mod runs;
mod sequencer;
mod tags;
mod upstream;
mod verify;

pub use graph::{StageGraph, StageId};
pub use prepare::{PrClassification, ReleasePreparer, classify_pull_request};
pub use prerequisites::PrerequisiteValidator;
pub use sequencer::{Pipeline, PipelineOptions, preflight};
pub use tags::{PublishOutcome, StableDecision, TagPublisher};
pub use upstream::{SyncState, UpstreamSyncWaiter};
pub use verify::{ReleaseVerifier, VerificationItem, VerificationReport};

use crate::config::OrchestratorConfig;
use crate::error::ReleaseError;
use crate::git::{TagPushAction, VersionControl};
use crate::github::{HostingApi, RepoSlug};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Keys under which stages publish their resolved outputs
pub mod keys {
    /// Run id of the upstream sync that satisfied the wait
    pub const UPSTREAM_RUN_ID: &str = "upstream_run_id";
    /// Upstream sync state the stage ended in (`succeeded` or `triggered`)
    pub const UPSTREAM_STATE: &str = "upstream_state";
    /// Run id of the prepare-release automation
    pub const PREPARE_RUN_ID: &str = "prepare_run_id";
    /// Number of the merged prepare-release pull request
    pub const PR_NUMBER: &str = "pr_number";
    /// Commit the main branch was reconciled to
    pub const RELEASE_COMMIT: &str = "release_commit";
    /// Beta tag name
    pub const BETA_TAG: &str = "beta_tag";
    /// Stable tag name, when published
    pub const STABLE_TAG: &str = "stable_tag";
    /// Release branch created for the beta version
    pub const RELEASE_BRANCH: &str = "release_branch";
    /// Module sets published by the tag stage, comma separated
    pub const PUBLISHED_SETS: &str = "published_module_sets";
    /// Failure count of the verification checklist
    pub const VERIFICATION_FAILURES: &str = "verification_failures";
}

/// Lifecycle of one stage within an invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Not started
    Pending,
    /// In progress
    Running,
    /// Finished successfully
    Succeeded,
    /// Finished with a fatal error
    Failed,
    /// Not applicable for this release
    Skipped,
}

impl StageStatus {
    /// Whether a dependent stage may proceed
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Skipped)
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        f.write_str(label)
    }
}

/// Outcome of one stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageResult {
    /// Stage name (see [`StageId::name`])
    pub stage_name: String,
    /// Final status
    pub status: StageStatus,
    /// Resolved values passed to later stages
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
    /// Advisory warnings and dry-run "would ..." records, in order
    #[serde(default)]
    pub notes: Vec<String>,
    /// Fatal error message, when failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Recorded by a dry run; never stands in for a real run
    #[serde(default)]
    pub dry_run: bool,
}

impl StageResult {
    /// A fresh result in the running state
    pub fn running(stage: StageId) -> Self {
        Self {
            stage_name: stage.name().to_string(),
            status: StageStatus::Running,
            outputs: BTreeMap::new(),
            notes: Vec::new(),
            error: None,
            dry_run: false,
        }
    }

    /// A result for a stage that does not apply
    pub fn skipped(stage: StageId, reason: impl Into<String>) -> Self {
        let mut result = Self::running(stage);
        result.status = StageStatus::Skipped;
        result.notes.push(reason.into());
        result
    }

    /// A result recording a fatal error
    pub fn failed(stage: StageId, error: &ReleaseError) -> Self {
        let mut result = Self::running(stage);
        result.status = StageStatus::Failed;
        result.error = Some(error.to_string());
        result
    }

    /// Record an output value
    pub fn output(&mut self, key: &str, value: impl ToString) {
        self.outputs.insert(key.to_string(), value.to_string());
    }

    /// Record a note
    pub fn note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    /// Mark the result succeeded
    pub fn succeed(mut self) -> Self {
        self.status = StageStatus::Succeeded;
        self
    }
}

/// External collaborators and settings shared by every stage
#[derive(Debug)]
pub struct Collaborators<'a, H, V, T> {
    /// Code-hosting API
    pub hosting: &'a H,
    /// Local repository and its remote
    pub vcs: &'a V,
    /// External tag-push action
    pub pusher: &'a T,
    /// Loaded configuration
    pub config: &'a OrchestratorConfig,
    /// Repository being released
    pub repo: &'a RepoSlug,
    /// Repository working directory (changelogs, scan command)
    pub workdir: &'a Path,
}

impl<H, V, T> Clone for Collaborators<'_, H, V, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<H, V, T> Copy for Collaborators<'_, H, V, T> {}

impl<'a, H: HostingApi, V: VersionControl, T: TagPushAction> Collaborators<'a, H, V, T> {
    /// Prerequisite checks
    pub fn validator(&self) -> PrerequisiteValidator<'a, H, V> {
        PrerequisiteValidator::new(self.hosting, self.vcs, self.config, self.repo)
    }

    /// Upstream sync wait
    pub fn upstream(&self) -> UpstreamSyncWaiter<'a, H> {
        UpstreamSyncWaiter::new(self.hosting, self.config)
    }

    /// Prepare-release automation
    pub fn preparer(&self) -> ReleasePreparer<'a, H, V> {
        ReleasePreparer::new(self.hosting, self.vcs, self.config, self.repo)
    }

    /// Tag publication
    pub fn publisher(&self) -> TagPublisher<'a, H, V, T> {
        TagPublisher::new(self.hosting, self.vcs, self.pusher, self.config, self.repo)
    }

    /// Post-release checklist
    pub fn verifier(&self) -> ReleaseVerifier<'a, H, V> {
        ReleaseVerifier::new(self.hosting, self.vcs, self.config, self.repo, self.workdir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StageError;

    #[test]
    fn skipped_satisfies_dependents() {
        assert!(StageStatus::Succeeded.is_satisfied());
        assert!(StageStatus::Skipped.is_satisfied());
        assert!(!StageStatus::Failed.is_satisfied());
        assert!(!StageStatus::Pending.is_satisfied());
    }

    #[test]
    fn failed_result_keeps_message() {
        let err: ReleaseError = StageError::TagConflict {
            tag: "v0.85.0".to_string(),
            location: "remote".to_string(),
        }
        .into();
        let result = StageResult::failed(StageId::PushTags, &err);
        assert_eq!(result.stage_name, "push-tags");
        assert_eq!(result.status, StageStatus::Failed);
        assert!(result.error.as_deref().unwrap_or_default().contains("v0.85.0"));
    }
}
