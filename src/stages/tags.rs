//! Idempotent tag publication.
//!
//! Tags are only pushed when absent both locally and on the remote. After
//! the beta tags land, the release branch and the tag-triggered builds are
//! awaited. Nothing here is rolled back on failure: pushed tags stay pushed.

use super::{StageId, StageResult, keys};
use crate::config::OrchestratorConfig;
use crate::error::{ReleaseError, Result, StageError, WaitError};
use crate::git::{TagPushAction, VersionControl};
use crate::github::{HostingApi, RepoSlug, RunQuery, WorkflowRun};
use crate::state::ReleaseRequest;
use crate::version::ReleaseVersion;
use crate::wait::{retry, wait_until};

/// Result of publishing one module set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The tag-push action succeeded
    Published {
        /// Tag that was pushed
        tag: String,
    },
    /// Dry run: nothing was executed
    DryRun {
        /// The "would publish" record
        record: String,
    },
}

/// Whether the stable module set is published in this release
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StableDecision<'r> {
    /// Publish at this version
    Publish(&'r ReleaseVersion),
    /// Skip, with the reason
    Skip(String),
}

/// Publishes module-set tags and awaits their downstream effects
pub struct TagPublisher<'a, H, V, T> {
    hosting: &'a H,
    vcs: &'a V,
    pusher: &'a T,
    config: &'a OrchestratorConfig,
    repo: &'a RepoSlug,
}

impl<'a, H, V, T> TagPublisher<'a, H, V, T>
where
    H: HostingApi,
    V: VersionControl,
    T: TagPushAction,
{
    /// Create a publisher for `repo`
    pub fn new(
        hosting: &'a H,
        vcs: &'a V,
        pusher: &'a T,
        config: &'a OrchestratorConfig,
        repo: &'a RepoSlug,
    ) -> Self {
        Self {
            hosting,
            vcs,
            pusher,
            config,
            repo,
        }
    }

    /// Fail with [`StageError::TagConflict`] if `tag` exists anywhere
    pub async fn ensure_tag_absent(&self, tag: &str) -> Result<()> {
        let location = if self.vcs.tag_exists_locally(tag).await? {
            "local repository"
        } else if self.vcs.tag_exists_remotely(tag).await? {
            "remote"
        } else {
            return Ok(());
        };

        Err(StageError::TagConflict {
            tag: tag.to_string(),
            location: location.to_string(),
        }
        .into())
    }

    /// Publish the tags of `module_set` at `version`
    ///
    /// In dry-run mode this issues no calls at all and returns the
    /// "would publish" record instead.
    pub async fn publish(
        &self,
        module_set: &str,
        version: &ReleaseVersion,
        dry_run: bool,
    ) -> Result<PublishOutcome> {
        let tag = version.tag_name();

        if dry_run {
            let record = format!("would publish {} tag {}", module_set, tag);
            log::info!("{}", record);
            return Ok(PublishOutcome::DryRun { record });
        }

        self.ensure_tag_absent(&tag).await?;

        let pusher = self.pusher;
        let operation = format!("push {} tags ({})", module_set, tag);
        retry(&operation, self.config.retry.tag_push_policy(), move || {
            pusher.push_tags(module_set)
        })
        .await?;

        log::info!("Published {} tag {}", module_set, tag);
        Ok(PublishOutcome::Published { tag })
    }

    /// Decide whether stable tags are published
    ///
    /// Requires a stable candidate. Without `skip_stable_check`, the stable
    /// paths must have changed since the current stable tag.
    pub async fn stable_decision<'r>(
        &self,
        request: &'r ReleaseRequest,
    ) -> Result<StableDecision<'r>> {
        let Some(candidate) = request.candidate_stable.as_ref() else {
            return Ok(StableDecision::Skip("no stable version requested".to_string()));
        };
        let baseline = request
            .current_stable
            .as_ref()
            .filter(|_| !request.skip_stable_check);
        let Some(current) = baseline else {
            return Ok(StableDecision::Publish(candidate));
        };

        let baseline = current.tag_name();
        let changed = self
            .vcs
            .has_changes_since(&baseline, &self.config.tags.stable_paths)
            .await?;
        Ok(if changed {
            StableDecision::Publish(candidate)
        } else {
            StableDecision::Skip(format!("no stable module changes since {}", baseline))
        })
    }

    /// Poll until `branch` exists on the remote
    pub async fn await_release_branch(&self, branch: &str) -> Result<()> {
        let timeouts = &self.config.timeouts;
        let vcs = self.vcs;

        let what = format!("release branch {}", branch);
        wait_until(
            &what,
            timeouts.policy(timeouts.branch_creation_secs),
            move || async move { Ok(vcs.remote_branch_exists(branch).await?.then_some(())) },
        )
        .await
        .map_err(|e| match e {
            ReleaseError::Wait(WaitError::Timeout { .. }) => StageError::BranchNotCreated {
                branch: branch.to_string(),
                timeout_secs: timeouts.branch_creation_secs,
            }
            .into(),
            other => other,
        })
    }

    /// Poll until every build triggered by `tags` completes
    ///
    /// Waits for at least one run to appear; then any non-success
    /// conclusion is fatal.
    pub async fn await_tag_builds(&self, tags: &[String]) -> Result<Vec<WorkflowRun>> {
        let timeouts = &self.config.timeouts;
        let (hosting, repo) = (self.hosting, self.repo);

        let what = format!("builds for {}", tags.join(", "));
        let runs = wait_until(
            &what,
            timeouts.policy(timeouts.tag_builds_secs),
            move || async move {
                let mut runs = Vec::new();
                let mut unbuilt = 0;
                for tag in tags {
                    let found = hosting.list_runs(repo, &RunQuery::for_ref(tag)).await?;
                    if found.is_empty() {
                        unbuilt += 1;
                    }
                    runs.extend(found);
                }
                let pending = runs.iter().filter(|run| !run.is_completed()).count();
                log::debug!(
                    "{} build(s) found, {} still running, {} tag(s) without builds",
                    runs.len(),
                    pending,
                    unbuilt
                );
                Ok((unbuilt == 0 && pending == 0).then_some(runs))
            },
        )
        .await?;

        let failing: Vec<String> = runs
            .iter()
            .filter(|run| !run.succeeded())
            .map(|run| format!("{} [{}]", run.reference(), run.conclusion_label()))
            .collect();
        if !failing.is_empty() {
            return Err(StageError::TagBuildFailed {
                failing_runs: failing,
            }
            .into());
        }
        Ok(runs)
    }

    /// Run the stage
    pub async fn run(&self, request: &ReleaseRequest) -> Result<StageResult> {
        let mut result = StageResult::running(StageId::PushTags);
        let tags_config = &self.config.tags;

        let beta = &request.candidate_beta;
        let branch = beta.release_branch(&tags_config.branch_prefix);
        let mut attempts: Vec<(&str, &ReleaseVersion)> =
            vec![(tags_config.beta_module_set.as_str(), beta)];

        match self.stable_decision(request).await? {
            StableDecision::Publish(stable) => {
                attempts.push((tags_config.stable_module_set.as_str(), stable))
            }
            StableDecision::Skip(reason) => {
                log::info!("Skipping stable tags: {}", reason);
                result.note(format!("stable skipped: {}", reason));
            }
        }

        result.output(keys::BETA_TAG, beta.tag_name());
        result.output(keys::RELEASE_BRANCH, &branch);
        if let Some((_, stable)) = attempts.get(1) {
            result.output(keys::STABLE_TAG, stable.tag_name());
        }
        let sets: Vec<&str> = attempts.iter().map(|(set, _)| *set).collect();
        result.output(keys::PUBLISHED_SETS, sets.join(","));

        if request.dry_run {
            for (set, version) in &attempts {
                if let PublishOutcome::DryRun { record } = self.publish(set, version, true).await? {
                    result.note(record);
                }
            }
            return Ok(result.succeed());
        }

        // Check every tag before pushing any of them
        for (_, version) in &attempts {
            self.ensure_tag_absent(&version.tag_name()).await?;
        }

        let mut pushed = Vec::new();
        for (set, version) in &attempts {
            if let PublishOutcome::Published { tag } = self.publish(set, version, false).await? {
                result.note(format!("published {} tag {}", set, tag));
                pushed.push(tag);
            }
        }

        self.await_release_branch(&branch).await?;
        result.note(format!("release branch {} exists", branch));

        let runs = self.await_tag_builds(&pushed).await?;
        result.note(format!("{} tag build(s) succeeded", runs.len()));

        Ok(result.succeed())
    }
}
