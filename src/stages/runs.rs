//! Dispatch-and-await helpers for automation runs.

use crate::error::Result;
use crate::github::{HostingApi, RepoSlug, RunQuery, WorkflowRun};
use crate::wait::{WaitPolicy, wait_until};
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashSet};

/// Allowed difference between the local clock and the service's timestamps, in seconds
const CLOCK_SKEW_SECS: i64 = 60;

/// A dispatch whose run has not been identified yet
#[derive(Debug)]
pub(crate) struct Dispatch {
    known_ids: HashSet<u64>,
    dispatched_at: DateTime<Utc>,
}

/// Trigger `workflow` on `git_ref`, remembering which runs already existed
pub(crate) async fn dispatch<H: HostingApi>(
    hosting: &H,
    repo: &RepoSlug,
    query: &RunQuery,
    git_ref: &str,
    inputs: &BTreeMap<String, String>,
) -> Result<Dispatch> {
    let workflow = query.workflow.as_deref().unwrap_or_default();
    let known_ids = hosting
        .list_runs(repo, query)
        .await?
        .into_iter()
        .map(|run| run.id)
        .collect();
    let dispatched_at = Utc::now();

    log::info!("Dispatching {} on {} in {}", workflow, git_ref, repo);
    hosting
        .trigger_automation(repo, workflow, git_ref, inputs)
        .await?;

    Ok(Dispatch {
        known_ids,
        dispatched_at,
    })
}

impl Dispatch {
    /// Whether `run` could have been created by this dispatch
    pub(crate) fn matches(&self, run: &WorkflowRun) -> bool {
        let earliest = self.dispatched_at - Duration::seconds(CLOCK_SKEW_SECS);
        !self.known_ids.contains(&run.id) && run.created_at >= earliest
    }
}

/// Poll until the run created by `dispatch` becomes queryable
pub(crate) async fn discover_run<H: HostingApi>(
    hosting: &H,
    repo: &RepoSlug,
    query: &RunQuery,
    dispatch: &Dispatch,
    policy: WaitPolicy,
) -> Result<WorkflowRun> {
    let what = format!(
        "{} run to appear in {}",
        query.workflow.as_deref().unwrap_or("dispatched"),
        repo
    );
    wait_until(&what, policy, move || async move {
        let runs = hosting.list_runs(repo, query).await?;
        Ok(runs.into_iter().find(|run| dispatch.matches(run)))
    })
    .await
}

/// Poll until run `run_id` completes, returning its final state
pub(crate) async fn await_completion<H: HostingApi>(
    hosting: &H,
    repo: &RepoSlug,
    run_id: u64,
    policy: WaitPolicy,
) -> Result<WorkflowRun> {
    let what = format!("run {} in {} to complete", run_id, repo);
    wait_until(&what, policy, move || async move {
        let run = hosting.get_run(repo, run_id).await?;
        log::debug!("Run {} status {:?}", run.id, run.status);
        Ok(run.is_completed().then_some(run))
    })
    .await
}
