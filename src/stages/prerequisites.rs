//! Checks run before anything is mutated.
//!
//! Version format, open blockers and an existing release are fatal. Branch
//! and working-tree problems are reported as warnings only.

use super::{StageId, StageResult};
use crate::config::OrchestratorConfig;
use crate::error::{PreconditionError, Result};
use crate::git::VersionControl;
use crate::github::{HostingApi, RepoSlug};
use crate::state::ReleaseRequest;
use crate::version::ReleaseVersion;

/// Read-only prerequisite checks
pub struct PrerequisiteValidator<'a, H, V> {
    hosting: &'a H,
    vcs: &'a V,
    config: &'a OrchestratorConfig,
    repo: &'a RepoSlug,
}

impl<'a, H: HostingApi, V: VersionControl> PrerequisiteValidator<'a, H, V> {
    /// Create a validator for `repo`
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

    /// Accept only `MAJOR.MINOR.PATCH`
    pub fn validate_format(version: &str) -> Result<ReleaseVersion> {
        ReleaseVersion::parse(version)
    }

    /// Fail if any of `repos` has an open blocker-labelled issue
    ///
    /// Every repository is queried so the error lists all blockers at once.
    pub async fn check_blockers(&self, repos: &[RepoSlug]) -> Result<()> {
        let label = &self.config.blockers.label;
        let mut blocking = Vec::new();

        for repo in repos {
            log::debug!("Searching {} for open '{}' issues", repo, label);
            let issues = self.hosting.list_issues(repo, label).await?;
            blocking.extend(
                issues
                    .into_iter()
                    .map(|issue| format!("{}#{} {} ({})", repo, issue.number, issue.title, issue.url)),
            );
        }

        if blocking.is_empty() {
            Ok(())
        } else {
            Err(PreconditionError::ReleaseBlocked { issues: blocking }.into())
        }
    }

    /// Fail if a release object already exists for `version`'s tag
    pub async fn check_existing(&self, version: &ReleaseVersion) -> Result<()> {
        let tag = version.tag_name();
        match self.hosting.get_release(self.repo, &tag).await? {
            Some(release) => Err(PreconditionError::ReleaseAlreadyExists {
                tag,
                url: release.url,
            }
            .into()),
            None => Ok(()),
        }
    }

    /// Advisory warnings about the local checkout
    ///
    /// Never fails; problems reading the repository become warnings too.
    pub async fn check_working_state(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let main = &self.config.repository.main_branch;

        match self.vcs.current_branch().await {
            Ok(branch) if &branch != main => warnings.push(format!(
                "Current branch is '{}', not '{}'; the prepare stage will switch to '{}'",
                branch, main, main
            )),
            Ok(_) => {}
            Err(e) => warnings.push(format!("Could not determine current branch: {}", e)),
        }

        match self.vcs.is_working_tree_clean().await {
            Ok(true) => {}
            Ok(false) => warnings.push(
                "Working tree has uncommitted changes; they will be lost when the prepare stage force-syncs"
                    .to_string(),
            ),
            Err(e) => warnings.push(format!("Could not check working tree: {}", e)),
        }

        warnings
    }

    /// Run every check for `request`
    pub async fn run(&self, request: &ReleaseRequest) -> Result<StageResult> {
        let mut result = StageResult::running(StageId::Validate);

        let repos = self.config.blocker_repositories(self.repo);
        self.check_blockers(&repos).await?;

        self.check_existing(&request.candidate_beta).await?;
        if let Some(stable) = &request.candidate_stable {
            self.check_existing(stable).await?;
        }

        for warning in self.check_working_state().await {
            log::warn!("{}", warning);
            result.note(warning);
        }

        Ok(result.succeed())
    }
}
