mod support;

#[cfg(test)]
mod tests {
    use super::support::*;
    use chrono::Duration;
    use release_conductor::config::OrchestratorConfig;
    use release_conductor::error::{PreconditionError, ReleaseError, StageError};
    use release_conductor::github::{PrState, RunConclusion};
    use release_conductor::stages::{
        Collaborators, Pipeline, PipelineOptions, StageId, StageResult, StageStatus, keys,
    };
    use release_conductor::state::{ContextStore, ReleaseContext};
    use std::path::Path;
    use tempfile::TempDir;

    /// External state for a release that goes through cleanly
    fn ready_world() -> (FakeHosting, FakeVcs) {
        let hosting = FakeHosting::new();
        hosting.add_completed_run(
            &upstream_repo(),
            UPSTREAM_WORKFLOW,
            "main",
            RunConclusion::Success,
            Duration::hours(3),
        );
        hosting.on_trigger(PREPARE_WORKFLOW, 2, RunConclusion::Success);
        hosting.add_pull(
            ScriptedPull::new(repo(), 50, "[chore] Prepare release 0.85.0", PrState::Open)
                .hidden_for(1)
                .merge_after(2),
        );
        for tag in ["v0.85.0", "v1.11.0"] {
            hosting.add_completed_run(&repo(), "build", tag, RunConclusion::Success, Duration::zero());
        }
        hosting.add_completed_run(
            &repo(),
            ARCHIVE_WORKFLOW,
            "v0.85.0",
            RunConclusion::Success,
            Duration::zero(),
        );
        hosting.add_milestone(21, "v0.85.0");

        let vcs = FakeVcs::new();
        vcs.with(|s| s.remote_commit = "9e8d7c6".to_string());
        vcs.branch_appears_after("release/v0.85.x", 1);
        (hosting, vcs)
    }

    fn collaborators<'a>(
        hosting: &'a FakeHosting,
        vcs: &'a FakeVcs,
        pusher: &'a FakeTagPusher,
        config: &'a OrchestratorConfig,
        target: &'a release_conductor::github::RepoSlug,
        workdir: &'a Path,
    ) -> Collaborators<'a, FakeHosting, FakeVcs, FakeTagPusher> {
        Collaborators {
            hosting,
            vcs,
            pusher,
            config,
            repo: target,
            workdir,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_release_runs_every_stage_in_order() {
        let (hosting, vcs) = ready_world();
        let pusher = FakeTagPusher::new(&vcs).publishing_releases(&hosting);
        let config = test_config();
        let target = repo();
        let dir = TempDir::new().expect("tempdir");

        let pipeline = Pipeline::new(
            collaborators(&hosting, &vcs, &pusher, &config, &target, dir.path()),
            PipelineOptions::default(),
        );

        let mut checkpoints: Vec<ReleaseContext> = Vec::new();
        let finished = pipeline
            .run_all(ReleaseContext::new(request()), |ctx| {
                checkpoints.push(ctx.clone());
                Ok(())
            })
            .await
            .expect("release completes");

        assert_eq!(checkpoints.len(), 5);
        for (i, stage) in StageId::ALL.iter().enumerate() {
            assert_eq!(finished.status(*stage), StageStatus::Succeeded, "{stage}");
            // Each checkpoint records exactly the stages run so far
            assert_eq!(checkpoints[i].stages.len(), i + 1);
        }

        assert_eq!(pusher.calls(), ["beta", "stable"]);
        assert_eq!(vcs.force_syncs(), 1);
        assert_eq!(finished.output(keys::PR_NUMBER), Some("50"));
        assert_eq!(finished.output(keys::RELEASE_COMMIT), Some("9e8d7c6"));
        assert_eq!(finished.output(keys::BETA_TAG), Some("v0.85.0"));
        assert_eq!(finished.output(keys::STABLE_TAG), Some("v1.11.0"));
        assert_eq!(finished.output(keys::VERIFICATION_FAILURES), Some("0"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocker_halts_before_any_other_stage() {
        let (hosting, vcs) = ready_world();
        hosting.add_issue(&repo(), 7, "Exporter drops spans under load");
        let pusher = FakeTagPusher::new(&vcs);
        let config = test_config();
        let target = repo();
        let dir = TempDir::new().expect("tempdir");

        let pipeline = Pipeline::new(
            collaborators(&hosting, &vcs, &pusher, &config, &target, dir.path()),
            PipelineOptions::default(),
        );

        let mut last = None;
        let err = pipeline
            .run_all(ReleaseContext::new(request()), |ctx| {
                last = Some(ctx.clone());
                Ok(())
            })
            .await
            .expect_err("blocked");

        assert!(matches!(
            err,
            ReleaseError::Precondition(PreconditionError::ReleaseBlocked { .. })
        ));
        let last = last.expect("failure checkpointed");
        assert_eq!(last.status(StageId::Validate), StageStatus::Failed);
        assert!(
            last.result(StageId::Validate)
                .and_then(|r| r.error.as_deref())
                .is_some_and(|e| e.contains("acme/collector#7"))
        );
        assert_eq!(last.status(StageId::WaitUpstream), StageStatus::Pending);
        assert_eq!(hosting.calls("list_runs"), 0);
        assert!(hosting.triggers().is_empty());
        assert!(pusher.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_pull_request_never_reaches_tag_publisher() {
        let hosting = FakeHosting::new();
        hosting.add_completed_run(
            &upstream_repo(),
            UPSTREAM_WORKFLOW,
            "main",
            RunConclusion::Success,
            Duration::hours(1),
        );
        hosting.on_trigger(PREPARE_WORKFLOW, 0, RunConclusion::Success);
        hosting.add_pull(ScriptedPull::new(repo(), 51, "Prepare release", PrState::Closed));
        let vcs = FakeVcs::new();
        let pusher = FakeTagPusher::new(&vcs);
        let config = test_config();
        let target = repo();
        let dir = TempDir::new().expect("tempdir");

        let pipeline = Pipeline::new(
            collaborators(&hosting, &vcs, &pusher, &config, &target, dir.path()),
            PipelineOptions::default(),
        );

        let mut last = None;
        let err = pipeline
            .run_all(ReleaseContext::new(beta_request()), |ctx| {
                last = Some(ctx.clone());
                Ok(())
            })
            .await
            .expect_err("PR closed");

        assert!(matches!(
            err,
            ReleaseError::Stage(StageError::PrClosedWithoutMerge { number: 51, .. })
        ));
        let last = last.expect("failure checkpointed");
        assert_eq!(last.status(StageId::Prepare), StageStatus::Failed);
        assert_eq!(last.status(StageId::PushTags), StageStatus::Pending);
        assert!(pusher.calls().is_empty());
        assert_eq!(vcs.calls("tag_exists_locally"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_stage_requires_recorded_predecessor() {
        let (hosting, vcs) = ready_world();
        let pusher = FakeTagPusher::new(&vcs);
        let config = test_config();
        let target = repo();
        let dir = TempDir::new().expect("tempdir");

        let pipeline = Pipeline::new(
            collaborators(&hosting, &vcs, &pusher, &config, &target, dir.path()),
            PipelineOptions::default(),
        );

        let err = pipeline
            .run_stages(&[StageId::PushTags], ReleaseContext::new(beta_request()), |_| Ok(()))
            .await
            .expect_err("prepare has not run");

        match err {
            ReleaseError::Stage(StageError::PredecessorIncomplete { stage, predecessor }) => {
                assert_eq!(stage, "push-tags");
                assert_eq!(predecessor, "prepare");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(pusher.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_skipped_stage_satisfies_successors() {
        let (hosting, vcs) = ready_world();
        let pusher = FakeTagPusher::new(&vcs);
        let mut config = test_config();
        config.upstream.repository = None;
        let target = repo();
        let dir = TempDir::new().expect("tempdir");

        let pipeline = Pipeline::new(
            collaborators(&hosting, &vcs, &pusher, &config, &target, dir.path()),
            PipelineOptions::default(),
        );

        let context = ReleaseContext::new(beta_request())
            .advance(StageResult::running(StageId::Validate).succeed());
        let context = pipeline
            .run_stage(StageId::WaitUpstream, &context)
            .await
            .expect("upstream skipped");

        assert_eq!(context.status(StageId::WaitUpstream), StageStatus::Skipped);
        assert!(pipeline.check_predecessors(StageId::Prepare, &context).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_release_resumes_from_stored_context() {
        let (hosting, vcs) = ready_world();
        hosting.on_trigger(PREPARE_WORKFLOW, 1, RunConclusion::Failure);
        let pusher = FakeTagPusher::new(&vcs).publishing_releases(&hosting);
        let mut config = test_config();
        // Only the retried prepare run counts toward CI health
        config.verify.ci_health_runs = 1;
        let target = repo();
        let dir = TempDir::new().expect("tempdir");
        let store = ContextStore::new(dir.path().join("context.json"));

        let pipeline = Pipeline::new(
            collaborators(&hosting, &vcs, &pusher, &config, &target, dir.path()),
            PipelineOptions::default(),
        );

        let err = pipeline
            .run_all(ReleaseContext::new(request()), |ctx| store.save(ctx))
            .await
            .expect_err("prepare automation fails");
        assert!(matches!(
            err,
            ReleaseError::Stage(StageError::PrepareReleaseFailed { .. })
        ));

        // Fix the automation and run again from the stored context
        hosting.on_trigger(PREPARE_WORKFLOW, 1, RunConclusion::Success);
        let stored = store
            .load_for(&request())
            .expect("context loads")
            .expect("context exists");
        assert_eq!(stored.status(StageId::Validate), StageStatus::Succeeded);
        assert_eq!(stored.status(StageId::Prepare), StageStatus::Failed);

        let finished = pipeline
            .run_all(stored, |ctx| store.save(ctx))
            .await
            .expect("release completes on resume");

        assert_eq!(finished.status(StageId::Verify), StageStatus::Succeeded);
        assert_eq!(hosting.calls("list_issues"), 1);
        assert_eq!(hosting.triggers().len(), 2);
        assert_eq!(store.load().expect("saved"), finished);
    }

    #[tokio::test(start_paused = true)]
    async fn test_real_run_after_dry_run_publishes_tags() {
        let (hosting, vcs) = ready_world();
        let pusher = FakeTagPusher::new(&vcs).publishing_releases(&hosting);
        let config = test_config();
        let target = repo();
        let dir = TempDir::new().expect("tempdir");
        let store = ContextStore::new(dir.path().join("context.json"));

        let pipeline = Pipeline::new(
            collaborators(&hosting, &vcs, &pusher, &config, &target, dir.path()),
            PipelineOptions::default(),
        );

        let rehearsal = [
            StageId::Validate,
            StageId::WaitUpstream,
            StageId::Prepare,
            StageId::PushTags,
        ];
        pipeline
            .run_stages(
                &rehearsal,
                ReleaseContext::new(beta_request().dry_run(true)),
                |ctx| store.save(ctx),
            )
            .await
            .expect("dry run completes");
        assert!(pusher.calls().is_empty());

        let stored = store
            .load_for(&beta_request())
            .expect("context loads")
            .expect("context exists");
        assert_eq!(stored.status(StageId::PushTags), StageStatus::Succeeded);
        assert!(!stored.is_satisfied(StageId::PushTags));
        assert!(matches!(
            pipeline.check_predecessors(StageId::PushTags, &stored),
            Err(ReleaseError::Stage(StageError::PredecessorIncomplete { .. }))
        ));

        let finished = pipeline
            .run_all(stored, |ctx| store.save(ctx))
            .await
            .expect("real release completes");

        assert_eq!(pusher.calls(), ["beta"]);
        assert_eq!(vcs.force_syncs(), 1);
        assert_eq!(hosting.calls("list_issues"), 2);
        for stage in StageId::ALL {
            let result = finished.result(stage).expect("stage recorded");
            assert_eq!(result.status, StageStatus::Succeeded, "{stage}");
            assert!(!result.dry_run, "{stage} still marked as dry run");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_dry_run_pushes_nothing_and_keeps_local_main() {
        let (hosting, vcs) = ready_world();
        let pusher = FakeTagPusher::new(&vcs);
        let config = test_config();
        let target = repo();
        let dir = TempDir::new().expect("tempdir");

        let pipeline = Pipeline::new(
            collaborators(&hosting, &vcs, &pusher, &config, &target, dir.path()),
            PipelineOptions::default(),
        );

        let stages = [
            StageId::Validate,
            StageId::WaitUpstream,
            StageId::Prepare,
            StageId::PushTags,
        ];
        let finished = pipeline
            .run_stages(&stages, ReleaseContext::new(request().dry_run(true)), |_| Ok(()))
            .await
            .expect("dry run completes");

        assert!(pusher.calls().is_empty());
        assert_eq!(vcs.force_syncs(), 0);
        assert_eq!(vcs.calls("remote_branch_exists"), 0);
        let records: Vec<&String> = finished
            .result(StageId::PushTags)
            .map(|r| r.notes.iter().filter(|n| n.starts_with("would publish")).collect())
            .unwrap_or_default();
        assert_eq!(records.len(), 2);
    }
}
