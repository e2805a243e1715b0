//! Stage command implementation.
//!
//! Runs one stage, or the whole pipeline for `run`, against the real
//! hosting API, the repository in the working directory and the configured
//! tag-push action. The context is saved after every stage.

use super::helpers::{build_request, context_store, detect_repository};
use crate::cli::{Command, ReleaseArgs, RuntimeConfig};
use crate::config::{EnvConfig, OrchestratorConfig};
use crate::error::{ReleaseError, Result, StageError};
use crate::git::{CommandTagPusher, SystemGit};
use crate::github::GitHubClient;
use crate::stages::{Collaborators, Pipeline, PipelineOptions, StageId, preflight};
use crate::state::ReleaseContext;

/// Execute a stage command or `run`
pub(super) async fn execute_stage(
    command: &Command,
    args: &ReleaseArgs,
    runtime: &RuntimeConfig,
) -> Result<i32> {
    let cwd = std::env::current_dir()?;
    let env = EnvConfig::from_process();
    let config = OrchestratorConfig::load(runtime.config_path.as_deref(), &cwd, &env)?;

    let stages: Vec<StageId> = match command.stage() {
        Some(stage) => vec![stage],
        None => StageId::ALL.to_vec(),
    };
    preflight(&config, &stages, args.dry_run)?;

    let vcs = SystemGit::open(&cwd, &config.repository.remote).await?;
    let repo = detect_repository(&config, &vcs).await?;
    let request = build_request(args, &vcs).await?;
    runtime.verbose_println(&format!("Repository {} at {}", repo, vcs.repo_path().display()));

    let store = context_store(runtime, &cwd);
    let context = match store.load_for(&request)? {
        Some(stored) => {
            runtime.verbose_println(&format!("Resuming from {}", store.path().display()));
            stored
        }
        None => ReleaseContext::new(request.clone()),
    };

    let hosting = GitHubClient::new(&config.repository.api_url, config.token.as_deref())?;
    let workdir = vcs.repo_path().to_path_buf();
    let pusher = CommandTagPusher::new(
        config.tags.command.clone(),
        config.repository.remote.clone(),
        workdir.clone(),
    )?;

    let collaborators = Collaborators {
        hosting: &hosting,
        vcs: &vcs,
        pusher: &pusher,
        config: &config,
        repo: &repo,
        workdir: &workdir,
    };
    let pipeline = Pipeline::new(
        collaborators,
        PipelineOptions {
            trigger_if_needed: args.trigger_if_needed,
        },
    );

    let output = runtime.output();
    let mode = if request.dry_run { " (dry run)" } else { "" };
    output.section(&format!("Release {} of {}{}", request.label(), repo, mode));

    let mut previous = context.clone();
    let checkpoint = |next: &ReleaseContext| -> Result<()> {
        store.save(next)?;
        for stage in StageId::ALL {
            if let Some(result) = next.result(stage)
                && previous.result(stage) != Some(result)
            {
                output.stage_result(result);
            }
        }
        previous = next.clone();
        Ok(())
    };

    let outcome = match command.stage() {
        Some(stage) => pipeline.run_stages(&[stage], context, checkpoint).await,
        None => pipeline.run_all(context, checkpoint).await,
    };

    match outcome {
        Ok(finished) => {
            if command.stage().is_none() {
                output.success(&format!("Release {} complete", finished.request.label()));
            }
            runtime.verbose_println(&format!("Context saved to {}", store.path().display()));
            Ok(0)
        }
        Err(e) => {
            if let ReleaseError::Stage(StageError::VerificationFailure { report }) = &e {
                output.report(report);
            }
            Err(e)
        }
    }
}
