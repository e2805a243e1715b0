//! Contract the orchestrator requires of the code-hosting service.

use super::types::{
    Issue, Milestone, PrQuery, PullRequest, Release, RepoSlug, RunQuery, WorkflowRun,
};
use crate::error::Result;
use std::collections::BTreeMap;
use std::future::Future;

/// Typed code-hosting operations
///
/// The production implementation is [`GitHubClient`](super::GitHubClient);
/// tests substitute an in-memory fake.
pub trait HostingApi {
    /// Open issues in `repo` carrying `label`
    fn list_issues(&self, repo: &RepoSlug, label: &str) -> impl Future<Output = Result<Vec<Issue>>>;

    /// Dispatch a named automation on `git_ref` with string inputs
    fn trigger_automation(
        &self,
        repo: &RepoSlug,
        workflow: &str,
        git_ref: &str,
        inputs: &BTreeMap<String, String>,
    ) -> impl Future<Output = Result<()>>;

    /// Current state of one run
    fn get_run(&self, repo: &RepoSlug, run_id: u64) -> impl Future<Output = Result<WorkflowRun>>;

    /// Runs matching `query`, newest first
    fn list_runs(
        &self,
        repo: &RepoSlug,
        query: &RunQuery,
    ) -> impl Future<Output = Result<Vec<WorkflowRun>>>;

    /// Current state of one pull request
    fn get_pull_request(
        &self,
        repo: &RepoSlug,
        number: u64,
    ) -> impl Future<Output = Result<PullRequest>>;

    /// Pull requests matching `query`, newest first
    fn list_pull_requests(
        &self,
        repo: &RepoSlug,
        query: &PrQuery,
    ) -> impl Future<Output = Result<Vec<PullRequest>>>;

    /// Release object for `tag`, if one exists
    fn get_release(
        &self,
        repo: &RepoSlug,
        tag: &str,
    ) -> impl Future<Output = Result<Option<Release>>>;

    /// All milestones, open and closed
    fn list_milestones(&self, repo: &RepoSlug) -> impl Future<Output = Result<Vec<Milestone>>>;
}
