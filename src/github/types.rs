//! Structured views of code-hosting objects.
//!
//! All of these are read-only projections of externally owned state; the
//! orchestrator refreshes them by polling and never edits them.

use crate::error::{GitHubError, ReleaseError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// `owner/repo` reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoSlug {
    /// Owner (user or organisation)
    pub owner: String,
    /// Repository name
    pub name: String,
}

impl RepoSlug {
    /// Create from parts
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Parse owner/repo from a git remote URL
    ///
    /// Supports Git URL formats:
    /// - SSH SCP-like: git@github.com:owner/repo.git
    /// - HTTPS: https://github.com/owner/repo.git
    pub fn from_remote_url(url: &str) -> Result<Self> {
        let url = url.trim();
        let path = if url.contains('@') && url.contains(':') && !url.contains("://") {
            url.split_once(':').map(|(_, path)| path)
        } else {
            url.find("://")
                .map(|scheme_end| &url[scheme_end + 3..])
                .and_then(|rest| rest.split_once('/'))
                .map(|(_, path)| path)
        };

        path.map(|p| p.trim_end_matches('/').trim_end_matches(".git"))
            .and_then(|p| p.parse::<RepoSlug>().ok())
            .ok_or_else(|| {
                GitHubError::InvalidRepository {
                    input: url.to_string(),
                }
                .into()
            })
    }
}

impl FromStr for RepoSlug {
    type Err = ReleaseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.split('/').collect::<Vec<_>>().as_slice() {
            [owner, name] if !owner.is_empty() && !name.is_empty() => Ok(Self::new(*owner, *name)),
            _ => Err(GitHubError::InvalidRepository {
                input: s.to_string(),
            }
            .into()),
        }
    }
}

impl TryFrom<String> for RepoSlug {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse().map_err(|e: ReleaseError| e.to_string())
    }
}

impl From<RepoSlug> for String {
    fn from(value: RepoSlug) -> Self {
        value.to_string()
    }
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Open issue returned by a label search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    /// Issue number
    pub number: u64,
    /// Issue title
    pub title: String,
    /// Browser URL
    pub url: String,
}

/// Lifecycle of an automation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Waiting for a runner
    Queued,
    /// Executing
    InProgress,
    /// Finished; see the conclusion
    Completed,
}

impl RunStatus {
    /// Map an API status string; pre-execution states count as queued
    pub fn from_api(status: &str) -> Self {
        match status {
            "completed" => Self::Completed,
            "in_progress" => Self::InProgress,
            _ => Self::Queued,
        }
    }
}

/// Outcome of a completed automation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunConclusion {
    /// Finished successfully
    Success,
    /// Finished with a failure
    Failure,
    /// Cancelled before finishing
    Cancelled,
    /// Any other terminal state (timed_out, skipped, neutral, ...)
    Other(String),
}

impl RunConclusion {
    /// Map an API conclusion string
    pub fn from_api(conclusion: &str) -> Self {
        match conclusion {
            "success" => Self::Success,
            "failure" => Self::Failure,
            "cancelled" => Self::Cancelled,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for RunConclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Other(other) => write!(f, "{}", other),
        }
    }
}

/// Automation (workflow) run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowRun {
    /// Run id
    pub id: u64,
    /// Workflow display name
    pub name: String,
    /// Current status
    pub status: RunStatus,
    /// Conclusion once completed
    pub conclusion: Option<RunConclusion>,
    /// Browser URL
    pub url: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Branch or tag the run was triggered for
    pub head_branch: Option<String>,
    /// Triggering event (push, workflow_dispatch, ...)
    pub event: String,
}

impl WorkflowRun {
    /// Whether the run has finished
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Whether the run finished successfully
    pub fn succeeded(&self) -> bool {
        self.is_completed() && self.conclusion == Some(RunConclusion::Success)
    }

    /// Conclusion as text (`none` while running)
    pub fn conclusion_label(&self) -> String {
        self.conclusion
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "none".to_string())
    }

    /// Human reference for error messages
    pub fn reference(&self) -> String {
        format!("{} #{} ({})", self.name, self.id, self.url)
    }
}

/// Pull request state, with merged split out of closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrState {
    /// Open for review
    Open,
    /// Closed by merging
    Merged,
    /// Closed without merging
    Closed,
}

/// Pull request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    /// PR number
    pub number: u64,
    /// PR title
    pub title: String,
    /// Current state
    pub state: PrState,
    /// Merge time, when merged
    pub merged_at: Option<DateTime<Utc>>,
    /// Browser URL
    pub url: String,
}

/// Release object attached to a tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    /// Tag the release points at
    pub tag_name: String,
    /// Browser URL
    pub url: String,
    /// Still a draft
    pub draft: bool,
    /// Marked as a pre-release
    pub prerelease: bool,
}

/// Milestone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Milestone {
    /// Milestone number
    pub number: u64,
    /// Milestone title
    pub title: String,
    /// `open` or `closed`
    pub state: String,
}

/// Filter for listing automation runs (newest first)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunQuery {
    /// Restrict to one workflow file
    pub workflow: Option<String>,
    /// Restrict to a branch or tag name
    pub branch: Option<String>,
    /// Restrict to a triggering event
    pub event: Option<String>,
    /// Page size
    pub per_page: u32,
}

impl RunQuery {
    /// Runs of one workflow
    pub fn workflow(workflow: impl Into<String>) -> Self {
        Self {
            workflow: Some(workflow.into()),
            per_page: 20,
            ..Self::default()
        }
    }

    /// Runs for one branch or tag across all workflows
    pub fn for_ref(branch: impl Into<String>) -> Self {
        Self {
            branch: Some(branch.into()),
            per_page: 50,
            ..Self::default()
        }
    }

    /// Restrict to `branch`
    pub fn on_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Restrict to `event`
    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    /// Override the page size
    pub fn limit(mut self, per_page: u32) -> Self {
        self.per_page = per_page;
        self
    }
}

/// Which pull requests to list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrStateFilter {
    /// Open only
    Open,
    /// Closed (merged or not) only
    Closed,
    /// Everything
    All,
}

impl PrStateFilter {
    /// API query value
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::All => "all",
        }
    }
}

/// Pull request search (newest first, title substring match)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrQuery {
    /// Case-insensitive title substring
    pub search: String,
    /// State filter
    pub state: PrStateFilter,
    /// Page size
    pub per_page: u32,
}
