//! Drive the prepare-release automation through to a merged pull request.
//!
//! The automation updates release metadata and opens a pull request titled
//! after a fixed convention. Once that PR merges, the local main branch is
//! force-synced to the remote tip so tags are cut from the merged commit.

use super::runs::{await_completion, discover_run, dispatch};
use super::{StageId, StageResult, keys};
use crate::config::OrchestratorConfig;
use crate::error::{Result, StageError};
use crate::git::VersionControl;
use crate::github::{HostingApi, PrQuery, PrState, PrStateFilter, PullRequest, RepoSlug, RunQuery};
use crate::state::ReleaseRequest;
use crate::wait::wait_until;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

/// What the pull request search found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrClassification {
    /// No matching PR, or only ones merged outside the recency window
    NotFound,
    /// Awaiting review
    Open(PullRequest),
    /// Merged within the recency window
    MergedRecently(PullRequest),
    /// Closed without merging
    ClosedWithoutMerge(PullRequest),
}

/// Classify the newest PR in `pulls` (newest first)
///
/// A merged PR only counts when `merged_at` lies within `window` of `now`;
/// older merges belong to earlier releases.
pub fn classify_pull_request(
    pulls: &[PullRequest],
    now: DateTime<Utc>,
    window: Duration,
) -> PrClassification {
    let Some(newest) = pulls.first() else {
        return PrClassification::NotFound;
    };

    match (newest.state, newest.merged_at) {
        (PrState::Open, _) => PrClassification::Open(newest.clone()),
        (PrState::Merged, Some(merged_at)) if now - merged_at <= window => {
            PrClassification::MergedRecently(newest.clone())
        }
        (PrState::Merged, _) => PrClassification::NotFound,
        (PrState::Closed, _) => PrClassification::ClosedWithoutMerge(newest.clone()),
    }
}

/// Prepare-release automation driver
pub struct ReleasePreparer<'a, H, V> {
    hosting: &'a H,
    vcs: &'a V,
    config: &'a OrchestratorConfig,
    repo: &'a RepoSlug,
}

impl<'a, H: HostingApi, V: VersionControl> ReleasePreparer<'a, H, V> {
    /// Create a preparer for `repo`
    pub fn new(
        hosting: &'a H,
        vcs: &'a V,
        config: &'a OrchestratorConfig,
        repo: &'a RepoSlug,
    ) -> Self {
        Self {
            hosting,
            vcs,
            config,
            repo,
        }
    }

    fn inputs(request: &ReleaseRequest) -> BTreeMap<String, String> {
        let optional = |v: &Option<crate::version::ReleaseVersion>| {
            v.as_ref().map(ToString::to_string).unwrap_or_default()
        };
        BTreeMap::from([
            ("candidate-beta".to_string(), request.candidate_beta.to_string()),
            ("current-beta".to_string(), request.current_beta.to_string()),
            ("candidate-stable".to_string(), optional(&request.candidate_stable)),
            ("current-stable".to_string(), optional(&request.current_stable)),
        ])
    }

    fn window(&self) -> Duration {
        Duration::minutes(self.config.prepare.recency_window_minutes.max(0))
    }

    /// Run the stage
    ///
    /// The trigger fires even in dry-run mode; only the force-sync is
    /// replaced by a record.
    pub async fn run(&self, request: &ReleaseRequest) -> Result<StageResult> {
        let mut result = StageResult::running(StageId::Prepare);
        let prepare = &self.config.prepare;
        let timeouts = &self.config.timeouts;
        let main = &self.config.repository.main_branch;

        let query = RunQuery::workflow(&prepare.workflow).with_event("workflow_dispatch");
        let pending = dispatch(self.hosting, self.repo, &query, main, &Self::inputs(request)).await?;

        // The dispatch takes a moment to materialize as a run
        tokio::time::sleep(std::time::Duration::from_secs(prepare.settle_delay_secs)).await;
        let run = discover_run(
            self.hosting,
            self.repo,
            &query,
            &pending,
            timeouts.policy(timeouts.run_discovery_secs),
        )
        .await?;
        log::info!("Prepare-release run {}", run.reference());
        result.output(keys::PREPARE_RUN_ID, run.id);

        let finished = await_completion(
            self.hosting,
            self.repo,
            run.id,
            timeouts.policy(timeouts.run_completion_secs),
        )
        .await?;
        if !finished.succeeded() {
            return Err(StageError::PrepareReleaseFailed {
                run_id: finished.id,
                conclusion: finished.conclusion_label(),
                url: finished.url,
            }
            .into());
        }

        let pull = self.find_pull_request().await?;
        let merged = if pull.state == PrState::Merged {
            pull
        } else {
            log::info!("Waiting for PR #{} to merge: {}", pull.number, pull.url);
            self.await_merge(&pull).await?
        };
        result.output(keys::PR_NUMBER, merged.number);
        result.note(format!("merged {}", merged.url));

        let commit = self.reconcile(request.dry_run, &mut result).await?;
        result.output(keys::RELEASE_COMMIT, commit);

        Ok(result.succeed())
    }

    /// Poll until a prepare-release PR is open or recently merged
    ///
    /// A PR closed without merging aborts the search.
    pub async fn find_pull_request(&self) -> Result<PullRequest> {
        let prepare = &self.config.prepare;
        let timeouts = &self.config.timeouts;
        let query = PrQuery {
            search: prepare.pr_title.clone(),
            state: PrStateFilter::All,
            per_page: 10,
        };
        let window = self.window();
        let (hosting, repo, query) = (self.hosting, self.repo, &query);

        let what = format!("'{}' pull request in {}", prepare.pr_title, repo);
        wait_until(
            &what,
            timeouts.policy(timeouts.pr_discovery_secs),
            move || async move {
                let pulls = hosting.list_pull_requests(repo, query).await?;
                match classify_pull_request(&pulls, Utc::now(), window) {
                    PrClassification::NotFound => Ok(None),
                    PrClassification::Open(pr) | PrClassification::MergedRecently(pr) => Ok(Some(pr)),
                    PrClassification::ClosedWithoutMerge(pr) => Err(StageError::PrClosedWithoutMerge {
                        number: pr.number,
                        title: pr.title,
                    }
                    .into()),
                }
            },
        )
        .await
    }

    /// Poll `pr` until it merges; closing without merge is fatal
    pub async fn await_merge(&self, pr: &PullRequest) -> Result<PullRequest> {
        let timeouts = &self.config.timeouts;
        let (hosting, repo, number) = (self.hosting, self.repo, pr.number);

        let what = format!("PR #{} to merge", number);
        wait_until(
            &what,
            timeouts.policy(timeouts.pr_merge_secs),
            move || async move {
                let current = hosting.get_pull_request(repo, number).await?;
                match current.state {
                    PrState::Merged => Ok(Some(current)),
                    PrState::Open => Ok(None),
                    PrState::Closed => Err(StageError::PrClosedWithoutMerge {
                        number: current.number,
                        title: current.title,
                    }
                    .into()),
                }
            },
        )
        .await
    }

    /// Align local main with the remote tip, returning that commit
    async fn reconcile(&self, dry_run: bool, result: &mut StageResult) -> Result<String> {
        let main = &self.config.repository.main_branch;
        self.vcs.fetch().await?;
        let remote = self.vcs.remote_commit(main).await?;
        let local = self.vcs.local_commit(main).await?;

        if local == remote {
            log::debug!("Local {} already at {}", main, remote);
            return Ok(remote);
        }

        if dry_run {
            let record = format!("would force-sync {} from {} to {}", main, local, remote);
            log::info!("{}", record);
            result.note(record);
        } else {
            log::warn!(
                "Force-syncing {} from {} to {}; local changes on {} are discarded",
                main,
                local,
                remote,
                main
            );
            self.vcs.force_sync(main).await?;
            result.note(format!("force-synced {} to {}", main, remote));
        }
        Ok(remote)
    }
}
