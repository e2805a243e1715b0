//! Wait for the dependent repository's sync automation.
//!
//! A run in progress is awaited. A recent success is accepted. A failed,
//! stale or missing run is re-triggered once per invocation when allowed.

use super::runs::{await_completion, discover_run, dispatch};
use super::{StageId, StageResult, keys};
use crate::config::OrchestratorConfig;
use crate::error::{Result, StageError};
use crate::github::{HostingApi, RepoSlug, RunQuery, WorkflowRun};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::fmt;

/// Observed state of the sync automation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No usable run: none exists or the latest success is stale
    Idle,
    /// A run is queued or in progress
    Running,
    /// The latest run succeeded recently
    Succeeded,
    /// The latest run did not succeed
    Failed,
    /// A new run was dispatched by this invocation
    Triggered,
}

impl SyncState {
    /// Classify the newest run of the sync automation
    pub fn classify(latest: Option<&WorkflowRun>, now: DateTime<Utc>, max_age: Duration) -> Self {
        match latest {
            None => Self::Idle,
            Some(run) if !run.is_completed() => Self::Running,
            Some(run) if !run.succeeded() => Self::Failed,
            Some(run) if now - run.created_at > max_age => Self::Idle,
            Some(_) => Self::Succeeded,
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Triggered => "triggered",
        };
        f.write_str(label)
    }
}

/// Ensures the upstream sync is neither failing nor stale
pub struct UpstreamSyncWaiter<'a, H> {
    hosting: &'a H,
    config: &'a OrchestratorConfig,
}

impl<'a, H: HostingApi> UpstreamSyncWaiter<'a, H> {
    /// Create a waiter
    pub fn new(hosting: &'a H, config: &'a OrchestratorConfig) -> Self {
        Self { hosting, config }
    }

    fn query(&self) -> RunQuery {
        let upstream = &self.config.upstream;
        RunQuery::workflow(&upstream.workflow)
            .on_branch(&upstream.branch)
            .limit(10)
    }

    fn max_age(&self) -> Duration {
        // Capped at roughly a century so the conversion cannot overflow
        Duration::hours(self.config.upstream.max_age_hours.min(876_000) as i64)
    }

    /// Run the stage; `trigger_if_needed` permits one new dispatch
    pub async fn run(&self, trigger_if_needed: bool) -> Result<StageResult> {
        let Some(repo) = self.config.upstream.repository.as_ref() else {
            return Ok(StageResult::skipped(
                StageId::WaitUpstream,
                "no upstream repository configured",
            ));
        };

        let mut result = StageResult::running(StageId::WaitUpstream);
        let timeouts = &self.config.timeouts;
        let query = self.query();

        let runs = self.hosting.list_runs(repo, &query).await?;
        let mut latest = runs.into_iter().next();
        let mut state = SyncState::classify(latest.as_ref(), Utc::now(), self.max_age());
        log::info!("Upstream sync in {} is {}", repo, state);

        let running_id = latest
            .as_ref()
            .filter(|_| state == SyncState::Running)
            .map(|run| run.id);
        if let Some(run_id) = running_id {
            log::info!("Waiting for in-progress sync run {}", run_id);
            let finished = await_completion(
                self.hosting,
                repo,
                run_id,
                timeouts.policy(timeouts.run_completion_secs),
            )
            .await?;
            state = SyncState::classify(Some(&finished), Utc::now(), self.max_age());
            latest = Some(finished);
        }

        if state == SyncState::Succeeded {
            if let Some(run) = latest {
                result.output(keys::UPSTREAM_RUN_ID, run.id);
                result.output(keys::UPSTREAM_STATE, state);
                result.note(format!("upstream sync up to date: {}", run.url));
            }
            return Ok(result.succeed());
        }

        let reason = match (&state, &latest) {
            (SyncState::Failed, Some(run)) => {
                format!("latest run {} concluded '{}'", run.url, run.conclusion_label())
            }
            (_, Some(run)) => format!(
                "latest success {} is older than {}h",
                run.url, self.config.upstream.max_age_hours
            ),
            _ => "no sync run found".to_string(),
        };

        if !trigger_if_needed {
            return Err(StageError::UpstreamNotReady {
                repo: repo.to_string(),
                reason,
            }
            .into());
        }

        log::warn!("Upstream sync not ready ({}); triggering a new run", reason);
        let run = self.trigger_and_await(repo, &query).await?;
        state = SyncState::Triggered;
        result.output(keys::UPSTREAM_RUN_ID, run.id);
        result.output(keys::UPSTREAM_STATE, state);
        result.note(format!("triggered upstream sync: {}", run.url));
        Ok(result.succeed())
    }

    async fn trigger_and_await(&self, repo: &RepoSlug, query: &RunQuery) -> Result<WorkflowRun> {
        let upstream = &self.config.upstream;
        let timeouts = &self.config.timeouts;

        let pending = dispatch(
            self.hosting,
            repo,
            query,
            &upstream.branch,
            &BTreeMap::new(),
        )
        .await?;

        let run = discover_run(
            self.hosting,
            repo,
            query,
            &pending,
            timeouts.policy(timeouts.run_discovery_secs),
        )
        .await?;
        log::info!("Triggered sync {}", run.reference());

        let finished = await_completion(
            self.hosting,
            repo,
            run.id,
            timeouts.policy(timeouts.run_completion_secs),
        )
        .await?;

        if !finished.succeeded() {
            return Err(StageError::UpstreamSyncFailed {
                run_id: finished.id,
                conclusion: finished.conclusion_label(),
                url: finished.url,
            }
            .into());
        }
        Ok(finished)
    }
}
