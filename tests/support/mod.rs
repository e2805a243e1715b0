//! In-memory collaborators for driving stages without a network or a git checkout.
//!
//! Every fake records its calls so tests can assert on what was (and was not)
//! invoked. State sits behind `Arc<Mutex<..>>` so a test can keep a handle
//! while a stage holds a reference.

#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use release_conductor::config::OrchestratorConfig;
use release_conductor::error::{GitError, GitHubError, Result};
use release_conductor::git::{TagPushAction, VersionControl};
use release_conductor::github::{
    HostingApi, Issue, Milestone, PrQuery, PrState, PullRequest, Release, RepoSlug, RunConclusion,
    RunQuery, RunStatus, WorkflowRun,
};
use release_conductor::state::ReleaseRequest;
use release_conductor::version::ReleaseVersion;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

pub const PREPARE_WORKFLOW: &str = "prepare-release.yml";
pub const UPSTREAM_WORKFLOW: &str = "update-otel.yaml";
pub const ARCHIVE_WORKFLOW: &str = "source-code-release.yaml";

/// Repository being released in every test
pub fn repo() -> RepoSlug {
    RepoSlug::new("acme", "collector")
}

/// Upstream repository whose sync is awaited
pub fn upstream_repo() -> RepoSlug {
    RepoSlug::new("acme", "collector-core")
}

/// Configuration with short waits and no optional checks
pub fn test_config() -> OrchestratorConfig {
    let mut config = OrchestratorConfig::default();
    config.repository.slug = Some(repo());
    config.token = Some("test-token".to_string());
    config.upstream.repository = Some(upstream_repo());
    config.prepare.settle_delay_secs = 0;
    config.timeouts.poll_interval_secs = 5;
    config.timeouts.run_discovery_secs = 60;
    config.timeouts.run_completion_secs = 300;
    config.timeouts.pr_discovery_secs = 120;
    config.timeouts.pr_merge_secs = 300;
    config.timeouts.branch_creation_secs = 60;
    config.timeouts.tag_builds_secs = 300;
    config.retry.tag_push_attempts = 3;
    config.retry.tag_push_delay_secs = 2;
    config.verify.changelog_files = Vec::new();
    config.verify.vuln_scan_command = Vec::new();
    config
}

pub fn version(raw: &str) -> ReleaseVersion {
    ReleaseVersion::parse(raw).expect("test version is valid")
}

/// Beta 0.85.0 (from 0.84.0) with stable 1.11.0 (from 1.10.0)
pub fn request() -> ReleaseRequest {
    ReleaseRequest::beta(version("0.85.0"), version("0.84.0"))
        .with_stable(version("1.11.0"), Some(version("1.10.0")))
}

/// Beta-only 0.85.0 request
pub fn beta_request() -> ReleaseRequest {
    ReleaseRequest::beta(version("0.85.0"), version("0.84.0"))
}

pub fn workflow_run(
    id: u64,
    name: &str,
    branch: &str,
    status: RunStatus,
    conclusion: Option<RunConclusion>,
    created_at: DateTime<Utc>,
    event: &str,
) -> WorkflowRun {
    WorkflowRun {
        id,
        name: name.to_string(),
        status,
        conclusion,
        url: format!("https://github.test/runs/{}", id),
        created_at,
        head_branch: Some(branch.to_string()),
        event: event.to_string(),
    }
}

/// A run the fake hosting service advances on every `get_run`
#[derive(Debug, Clone)]
struct ScriptedRun {
    repo: RepoSlug,
    workflow: String,
    run: WorkflowRun,
    polls_left: u32,
    outcome: RunConclusion,
    /// Matching `list_runs` calls that do not see it yet
    hidden_for: u32,
}

/// A pull request that can appear late and change state while polled
#[derive(Debug, Clone)]
pub struct ScriptedPull {
    pub repo: RepoSlug,
    pub pr: PullRequest,
    /// `list_pull_requests` calls that do not see it yet
    pub hidden_for: u32,
    /// `get_pull_request` calls before it merges
    pub merge_after: Option<u32>,
    /// `get_pull_request` calls before it is closed unmerged
    pub close_after: Option<u32>,
    polls: u32,
}

impl ScriptedPull {
    pub fn new(repo: RepoSlug, number: u64, title: &str, state: PrState) -> Self {
        let merged_at = (state == PrState::Merged).then(Utc::now);
        Self {
            repo,
            pr: PullRequest {
                number,
                title: title.to_string(),
                state,
                merged_at,
                url: format!("https://github.test/pull/{}", number),
            },
            hidden_for: 0,
            merge_after: None,
            close_after: None,
            polls: 0,
        }
    }

    pub fn hidden_for(mut self, calls: u32) -> Self {
        self.hidden_for = calls;
        self
    }

    pub fn merge_after(mut self, polls: u32) -> Self {
        self.merge_after = Some(polls);
        self
    }

    pub fn close_after(mut self, polls: u32) -> Self {
        self.close_after = Some(polls);
        self
    }

    pub fn merged_minutes_ago(mut self, minutes: i64) -> Self {
        self.pr.merged_at = Some(Utc::now() - Duration::minutes(minutes));
        self
    }
}

/// An automation dispatch as received by the fake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub repo: RepoSlug,
    pub workflow: String,
    pub git_ref: String,
    pub inputs: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
struct HostingState {
    issues: HashMap<RepoSlug, Vec<Issue>>,
    runs: Vec<ScriptedRun>,
    on_trigger: HashMap<String, (u32, RunConclusion)>,
    pulls: Vec<ScriptedPull>,
    releases: HashMap<String, Release>,
    milestones: Vec<Milestone>,
    triggers: Vec<Trigger>,
    calls: Vec<String>,
    next_id: u64,
}

impl HostingState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        1000 + self.next_id
    }
}

/// In-memory code-hosting service
#[derive(Debug, Clone, Default)]
pub struct FakeHosting {
    state: Arc<Mutex<HostingState>>,
}

impl FakeHosting {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HostingState> {
        self.state.lock().expect("hosting state lock")
    }

    pub fn add_issue(&self, repo: &RepoSlug, number: u64, title: &str) {
        self.lock().issues.entry(repo.clone()).or_default().push(Issue {
            number,
            title: title.to_string(),
            url: format!("https://github.test/{}/issues/{}", repo, number),
        });
    }

    /// Seed a finished run created `age` ago; returns its id
    pub fn add_completed_run(
        &self,
        repo: &RepoSlug,
        workflow: &str,
        branch: &str,
        conclusion: RunConclusion,
        age: Duration,
    ) -> u64 {
        let mut state = self.lock();
        let id = state.next_id();
        let run = workflow_run(
            id,
            workflow,
            branch,
            RunStatus::Completed,
            Some(conclusion.clone()),
            Utc::now() - age,
            "push",
        );
        state.runs.push(ScriptedRun {
            repo: repo.clone(),
            workflow: workflow.to_string(),
            run,
            polls_left: 0,
            outcome: conclusion,
            hidden_for: 0,
        });
        id
    }

    /// Seed an in-progress run that completes after `polls` status checks
    pub fn add_running_run(
        &self,
        repo: &RepoSlug,
        workflow: &str,
        branch: &str,
        polls: u32,
        outcome: RunConclusion,
    ) -> u64 {
        let mut state = self.lock();
        let id = state.next_id();
        let run = workflow_run(
            id,
            workflow,
            branch,
            RunStatus::InProgress,
            None,
            Utc::now(),
            "push",
        );
        state.runs.push(ScriptedRun {
            repo: repo.clone(),
            workflow: workflow.to_string(),
            run,
            polls_left: polls,
            outcome,
            hidden_for: 0,
        });
        id
    }

    /// Seed a completed run that only shows up after `hidden_for` matching listings
    pub fn add_late_run(
        &self,
        repo: &RepoSlug,
        workflow: &str,
        branch: &str,
        conclusion: RunConclusion,
        hidden_for: u32,
    ) -> u64 {
        let id = self.add_completed_run(repo, workflow, branch, conclusion, Duration::zero());
        if let Some(scripted) = self.lock().runs.iter_mut().find(|r| r.run.id == id) {
            scripted.hidden_for = hidden_for;
        }
        id
    }

    /// Dispatching `workflow` creates a run finishing after `polls` checks
    pub fn on_trigger(&self, workflow: &str, polls: u32, outcome: RunConclusion) {
        self.lock()
            .on_trigger
            .insert(workflow.to_string(), (polls, outcome));
    }

    pub fn add_pull(&self, pull: ScriptedPull) {
        self.lock().pulls.push(pull);
    }

    pub fn add_release(&self, tag: &str, draft: bool, prerelease: bool) {
        self.lock().releases.insert(
            tag.to_string(),
            Release {
                tag_name: tag.to_string(),
                url: format!("https://github.test/releases/tag/{}", tag),
                draft,
                prerelease,
            },
        );
    }

    pub fn add_milestone(&self, number: u64, title: &str) {
        self.lock().milestones.push(Milestone {
            number,
            title: title.to_string(),
            state: "open".to_string(),
        });
    }

    pub fn clear_milestones(&self) {
        self.lock().milestones.clear();
    }

    pub fn triggers(&self) -> Vec<Trigger> {
        self.lock().triggers.clone()
    }

    /// Number of calls to the named trait method
    pub fn calls(&self, method: &str) -> usize {
        self.lock().calls.iter().filter(|c| c.as_str() == method).count()
    }

    pub fn total_calls(&self) -> usize {
        self.lock().calls.len()
    }

    fn record(&self, method: &str) {
        self.lock().calls.push(method.to_string());
    }
}

impl HostingApi for FakeHosting {
    async fn list_issues(&self, repo: &RepoSlug, _label: &str) -> Result<Vec<Issue>> {
        self.record("list_issues");
        Ok(self.lock().issues.get(repo).cloned().unwrap_or_default())
    }

    async fn trigger_automation(
        &self,
        repo: &RepoSlug,
        workflow: &str,
        git_ref: &str,
        inputs: &BTreeMap<String, String>,
    ) -> Result<()> {
        self.record("trigger_automation");
        let mut state = self.lock();
        state.triggers.push(Trigger {
            repo: repo.clone(),
            workflow: workflow.to_string(),
            git_ref: git_ref.to_string(),
            inputs: inputs.clone(),
        });

        if let Some((polls, outcome)) = state.on_trigger.get(workflow).cloned() {
            let id = state.next_id();
            let run = workflow_run(
                id,
                workflow,
                git_ref,
                RunStatus::Queued,
                None,
                Utc::now(),
                "workflow_dispatch",
            );
            state.runs.push(ScriptedRun {
                repo: repo.clone(),
                workflow: workflow.to_string(),
                run,
                polls_left: polls,
                outcome,
                hidden_for: 0,
            });
        }
        Ok(())
    }

    async fn get_run(&self, repo: &RepoSlug, run_id: u64) -> Result<WorkflowRun> {
        self.record("get_run");
        let mut state = self.lock();
        let scripted = state
            .runs
            .iter_mut()
            .find(|r| &r.repo == repo && r.run.id == run_id)
            .ok_or_else(|| GitHubError::Api {
                method: "GET".to_string(),
                path: format!("repos/{}/actions/runs/{}", repo, run_id),
                status: 404,
                message: "Not Found".to_string(),
            })?;

        if !scripted.run.is_completed() {
            if scripted.polls_left > 0 {
                scripted.polls_left -= 1;
                scripted.run.status = RunStatus::InProgress;
            } else {
                scripted.run.status = RunStatus::Completed;
                scripted.run.conclusion = Some(scripted.outcome.clone());
            }
        }
        Ok(scripted.run.clone())
    }

    async fn list_runs(&self, repo: &RepoSlug, query: &RunQuery) -> Result<Vec<WorkflowRun>> {
        self.record("list_runs");
        let mut state = self.lock();
        let mut runs: Vec<WorkflowRun> = state
            .runs
            .iter_mut()
            .filter(|r| &r.repo == repo)
            .filter(|r| query.workflow.as_ref().is_none_or(|w| *w == r.workflow))
            .filter(|r| {
                query
                    .branch
                    .as_ref()
                    .is_none_or(|b| r.run.head_branch.as_ref() == Some(b))
            })
            .filter(|r| query.event.as_ref().is_none_or(|e| *e == r.run.event))
            .filter_map(|r| {
                if r.hidden_for > 0 {
                    r.hidden_for -= 1;
                    return None;
                }
                Some(r.run.clone())
            })
            .collect();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        runs.truncate(query.per_page as usize);
        Ok(runs)
    }

    async fn get_pull_request(&self, repo: &RepoSlug, number: u64) -> Result<PullRequest> {
        self.record("get_pull_request");
        let mut state = self.lock();
        let pull = state
            .pulls
            .iter_mut()
            .find(|p| &p.repo == repo && p.pr.number == number)
            .ok_or_else(|| GitHubError::Api {
                method: "GET".to_string(),
                path: format!("repos/{}/pulls/{}", repo, number),
                status: 404,
                message: "Not Found".to_string(),
            })?;

        pull.polls += 1;
        if pull.pr.state == PrState::Open {
            if pull.merge_after.is_some_and(|n| pull.polls >= n) {
                pull.pr.state = PrState::Merged;
                pull.pr.merged_at = Some(Utc::now());
            } else if pull.close_after.is_some_and(|n| pull.polls >= n) {
                pull.pr.state = PrState::Closed;
            }
        }
        Ok(pull.pr.clone())
    }

    async fn list_pull_requests(&self, repo: &RepoSlug, query: &PrQuery) -> Result<Vec<PullRequest>> {
        self.record("list_pull_requests");
        let needle = query.search.to_lowercase();
        let mut state = self.lock();
        let mut pulls = Vec::new();
        for pull in state.pulls.iter_mut().filter(|p| &p.repo == repo) {
            if !pull.pr.title.to_lowercase().contains(&needle) {
                continue;
            }
            if pull.hidden_for > 0 {
                pull.hidden_for -= 1;
                continue;
            }
            pulls.push(pull.pr.clone());
        }
        pulls.sort_by(|a, b| b.number.cmp(&a.number));
        pulls.truncate(query.per_page as usize);
        Ok(pulls)
    }

    async fn get_release(&self, _repo: &RepoSlug, tag: &str) -> Result<Option<Release>> {
        self.record("get_release");
        Ok(self.lock().releases.get(tag).cloned())
    }

    async fn list_milestones(&self, _repo: &RepoSlug) -> Result<Vec<Milestone>> {
        self.record("list_milestones");
        Ok(self.lock().milestones.clone())
    }
}

/// Mutable state behind [`FakeVcs`]
#[derive(Debug)]
pub struct VcsState {
    pub local_tags: BTreeSet<String>,
    pub remote_tags: BTreeSet<String>,
    pub remote_branches: BTreeSet<String>,
    /// Branches that appear on the remote after this many existence checks
    pub pending_branches: HashMap<String, u32>,
    pub local_commit: String,
    pub remote_commit: String,
    pub current_branch: String,
    pub clean: bool,
    pub stable_paths_changed: bool,
    pub commit_count: u64,
    pub signed: bool,
    pub remote_url: String,
    pub force_syncs: u32,
    pub calls: Vec<String>,
}

impl Default for VcsState {
    fn default() -> Self {
        Self {
            local_tags: BTreeSet::new(),
            remote_tags: BTreeSet::new(),
            remote_branches: BTreeSet::new(),
            pending_branches: HashMap::new(),
            local_commit: "4f2a9c1".to_string(),
            remote_commit: "4f2a9c1".to_string(),
            current_branch: "main".to_string(),
            clean: true,
            stable_paths_changed: true,
            commit_count: 12,
            signed: false,
            remote_url: "git@github.com:acme/collector.git".to_string(),
            force_syncs: 0,
            calls: Vec::new(),
        }
    }
}

/// In-memory local repository and remote
#[derive(Debug, Clone, Default)]
pub struct FakeVcs {
    state: Arc<Mutex<VcsState>>,
}

impl FakeVcs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutate the state
    pub fn with<R>(&self, f: impl FnOnce(&mut VcsState) -> R) -> R {
        f(&mut self.state.lock().expect("vcs state lock"))
    }

    pub fn add_remote_tag(&self, tag: &str) {
        self.with(|s| s.remote_tags.insert(tag.to_string()));
    }

    pub fn add_local_tag(&self, tag: &str) {
        self.with(|s| s.local_tags.insert(tag.to_string()));
    }

    pub fn add_remote_branch(&self, branch: &str) {
        self.with(|s| s.remote_branches.insert(branch.to_string()));
    }

    pub fn branch_appears_after(&self, branch: &str, checks: u32) {
        self.with(|s| s.pending_branches.insert(branch.to_string(), checks));
    }

    pub fn calls(&self, method: &str) -> usize {
        self.with(|s| s.calls.iter().filter(|c| c.as_str() == method).count())
    }

    pub fn force_syncs(&self) -> u32 {
        self.with(|s| s.force_syncs)
    }

    fn record(&self, method: &str) {
        self.with(|s| s.calls.push(method.to_string()));
    }
}

impl VersionControl for FakeVcs {
    async fn tag_exists_locally(&self, tag: &str) -> Result<bool> {
        self.record("tag_exists_locally");
        Ok(self.with(|s| s.local_tags.contains(tag)))
    }

    async fn tag_exists_remotely(&self, tag: &str) -> Result<bool> {
        self.record("tag_exists_remotely");
        Ok(self.with(|s| s.remote_tags.contains(tag)))
    }

    async fn remote_branch_exists(&self, branch: &str) -> Result<bool> {
        self.record("remote_branch_exists");
        Ok(self.with(|s| {
            if s.remote_branches.contains(branch) {
                return true;
            }
            match s.pending_branches.get_mut(branch) {
                Some(0) => {
                    s.pending_branches.remove(branch);
                    s.remote_branches.insert(branch.to_string());
                    true
                }
                Some(left) => {
                    *left -= 1;
                    false
                }
                None => false,
            }
        }))
    }

    async fn fetch(&self) -> Result<()> {
        self.record("fetch");
        Ok(())
    }

    async fn local_commit(&self, _branch: &str) -> Result<String> {
        self.record("local_commit");
        Ok(self.with(|s| s.local_commit.clone()))
    }

    async fn remote_commit(&self, _branch: &str) -> Result<String> {
        self.record("remote_commit");
        Ok(self.with(|s| s.remote_commit.clone()))
    }

    async fn force_sync(&self, _branch: &str) -> Result<()> {
        self.record("force_sync");
        self.with(|s| {
            s.local_commit = s.remote_commit.clone();
            s.force_syncs += 1;
        });
        Ok(())
    }

    async fn current_branch(&self) -> Result<String> {
        self.record("current_branch");
        Ok(self.with(|s| s.current_branch.clone()))
    }

    async fn is_working_tree_clean(&self) -> Result<bool> {
        self.record("is_working_tree_clean");
        Ok(self.with(|s| s.clean))
    }

    async fn list_tags(&self) -> Result<Vec<String>> {
        self.record("list_tags");
        Ok(self.with(|s| s.local_tags.iter().cloned().collect()))
    }

    async fn has_changes_since(&self, _tag: &str, _paths: &[String]) -> Result<bool> {
        self.record("has_changes_since");
        Ok(self.with(|s| s.stable_paths_changed))
    }

    async fn count_commits(&self, _from: &str, _to: &str) -> Result<u64> {
        self.record("count_commits");
        Ok(self.with(|s| s.commit_count))
    }

    async fn verify_tag_signature(&self, _tag: &str) -> Result<bool> {
        self.record("verify_tag_signature");
        Ok(self.with(|s| s.signed))
    }

    async fn remote_url(&self) -> Result<String> {
        self.record("remote_url");
        Ok(self.with(|s| s.remote_url.clone()))
    }
}

/// Tag-push action that tags the fake repository
#[derive(Debug)]
pub struct FakeTagPusher {
    vcs: FakeVcs,
    releases: Option<FakeHosting>,
    tags: HashMap<String, String>,
    failures_left: Mutex<u32>,
    calls: Mutex<Vec<String>>,
}

impl FakeTagPusher {
    /// Pusher mapping `beta` to v0.85.0 and `stable` to v1.11.0
    pub fn new(vcs: &FakeVcs) -> Self {
        Self {
            vcs: vcs.clone(),
            releases: None,
            tags: HashMap::from([
                ("beta".to_string(), "v0.85.0".to_string()),
                ("stable".to_string(), "v1.11.0".to_string()),
            ]),
            failures_left: Mutex::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Fail the first `n` pushes with a transient command failure
    pub fn failing_first(self, n: u32) -> Self {
        *self.failures_left.lock().expect("pusher lock") = n;
        self
    }

    /// Create a release object on `hosting` for every pushed tag
    pub fn publishing_releases(mut self, hosting: &FakeHosting) -> Self {
        self.releases = Some(hosting.clone());
        self
    }

    /// Module sets pushed so far, including failed attempts
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("pusher lock").clone()
    }
}

impl TagPushAction for FakeTagPusher {
    async fn push_tags(&self, module_set: &str) -> Result<()> {
        self.calls
            .lock()
            .expect("pusher lock")
            .push(module_set.to_string());

        {
            let mut failures = self.failures_left.lock().expect("pusher lock");
            if *failures > 0 {
                *failures -= 1;
                return Err(GitError::CommandFailed {
                    command: format!("make push-tags MODSET={}", module_set),
                    stderr: "remote: Internal Server Error".to_string(),
                }
                .into());
            }
        }

        if let Some(tag) = self.tags.get(module_set) {
            self.vcs.with(|s| {
                s.local_tags.insert(tag.clone());
                s.remote_tags.insert(tag.clone());
            });
            if let Some(hosting) = &self.releases {
                hosting.add_release(tag, false, false);
            }
        }
        Ok(())
    }
}
