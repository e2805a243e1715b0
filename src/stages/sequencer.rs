//! Fail-fast execution of the stage graph.

use super::graph::{StageGraph, StageId};
use super::{Collaborators, StageResult};
use crate::config::{OrchestratorConfig, TOKEN_VARS};
use crate::error::{PreconditionError, Result, StageError};
use crate::git::{TagPushAction, VersionControl};
use crate::github::HostingApi;
use crate::state::ReleaseContext;

/// Switches that apply to a single invocation only
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Allow the upstream stage to dispatch a new sync run
    pub trigger_if_needed: bool,
}

/// Check tools and credentials before any stage runs
///
/// The tag-push program is only required when `push-tags` runs for real.
pub fn preflight(config: &OrchestratorConfig, stages: &[StageId], dry_run: bool) -> Result<()> {
    if config.token.is_none() {
        return Err(PreconditionError::ToolOrAuthMissing {
            what: "API token".to_string(),
            hint: format!("Export {} with repo and workflow scopes", TOKEN_VARS.join(" or ")),
        }
        .into());
    }

    which::which("git").map_err(|_| PreconditionError::ToolOrAuthMissing {
        what: "git".to_string(),
        hint: "Install git and make sure it is on PATH".to_string(),
    })?;

    if stages.contains(&StageId::PushTags) && !dry_run {
        let program = config.tags.command.first().ok_or_else(|| {
            PreconditionError::ToolOrAuthMissing {
                what: "tag push command".to_string(),
                hint: "Set [tags].command in release.toml".to_string(),
            }
        })?;
        which::which(program).map_err(|_| PreconditionError::ToolOrAuthMissing {
            what: program.clone(),
            hint: format!("Install '{}' or point [tags].command at the tag-push action", program),
        })?;
    }

    Ok(())
}

/// Runs stages in graph order, halting on the first failure
pub struct Pipeline<'a, H, V, T> {
    collaborators: Collaborators<'a, H, V, T>,
    options: PipelineOptions,
    graph: StageGraph,
}

impl<'a, H, V, T> Pipeline<'a, H, V, T>
where
    H: HostingApi,
    V: VersionControl,
    T: TagPushAction,
{
    /// Pipeline over the standard release graph
    pub fn new(collaborators: Collaborators<'a, H, V, T>, options: PipelineOptions) -> Self {
        Self {
            collaborators,
            options,
            graph: StageGraph::release(),
        }
    }

    /// Fail unless every predecessor of `stage` is satisfied in `context`
    pub fn check_predecessors(&self, stage: StageId, context: &ReleaseContext) -> Result<()> {
        match self
            .graph
            .predecessors_of(stage)
            .into_iter()
            .find(|pred| !context.is_satisfied(*pred))
        {
            Some(missing) => Err(StageError::PredecessorIncomplete {
                stage: stage.to_string(),
                predecessor: missing.to_string(),
            }
            .into()),
            None => Ok(()),
        }
    }

    /// Run one stage and return the context with its result recorded
    ///
    /// `context` itself is left untouched on failure.
    pub async fn run_stage(&self, stage: StageId, context: &ReleaseContext) -> Result<ReleaseContext> {
        self.check_predecessors(stage, context)?;
        log::info!("Starting stage {}", stage);

        let c = &self.collaborators;
        let request = &context.request;
        let result: StageResult = match stage {
            StageId::Validate => c.validator().run(request).await?,
            StageId::WaitUpstream => c.upstream().run(self.options.trigger_if_needed).await?,
            StageId::Prepare => c.preparer().run(request).await?,
            StageId::PushTags => c.publisher().run(request).await?,
            StageId::Verify => c.verifier().run(context).await?,
        };

        log::info!("Stage {} {}", stage, result.status);
        Ok(context.advance(result))
    }

    /// Run `stages` in order, calling `checkpoint` after each one
    ///
    /// A failing stage is recorded as failed and passed to `checkpoint`
    /// before its error is returned; later stages never start.
    pub async fn run_stages<F>(
        &self,
        stages: &[StageId],
        context: ReleaseContext,
        mut checkpoint: F,
    ) -> Result<ReleaseContext>
    where
        F: FnMut(&ReleaseContext) -> Result<()>,
    {
        let mut context = context;
        for stage in stages {
            match self.run_stage(*stage, &context).await {
                Ok(next) => {
                    checkpoint(&next)?;
                    context = next;
                }
                Err(e) => {
                    log::error!("Stage {} failed: {}", stage, e);
                    checkpoint(&context.advance(StageResult::failed(*stage, &e)))?;
                    return Err(e);
                }
            }
        }
        Ok(context)
    }

    /// Run the whole graph, skipping stages `context` already records as done
    pub async fn run_all<F>(&self, context: ReleaseContext, checkpoint: F) -> Result<ReleaseContext>
    where
        F: FnMut(&ReleaseContext) -> Result<()>,
    {
        let pending: Vec<StageId> = self
            .graph
            .execution_order()?
            .into_iter()
            .filter(|stage| {
                let done = context.is_satisfied(*stage);
                if done {
                    log::info!("Stage {} already {}, skipping", stage, context.status(*stage));
                } else if context.result(*stage).is_some_and(|r| r.dry_run) {
                    log::info!("Stage {} only ran as a dry run, running it for real", stage);
                }
                !done
            })
            .collect();
        self.run_stages(&pending, context, checkpoint).await
    }
}
