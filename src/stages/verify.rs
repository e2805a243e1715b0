//! Post-release checklist.
//!
//! Every check runs regardless of the others and contributes exactly one
//! item to the report. Errors while checking count as failures of that item.

use super::{StageId, StageResult, keys};
use crate::config::OrchestratorConfig;
use crate::error::{ReleaseError, Result, StageError};
use crate::git::VersionControl;
use crate::github::{HostingApi, RepoSlug, RunConclusion, RunQuery};
use crate::state::ReleaseContext;
use crate::version::ReleaseVersion;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One checklist entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationItem {
    /// What was checked
    pub name: String,
    /// Whether the check passed
    pub passed: bool,
    /// Explanation, always set for failures
    pub detail: Option<String>,
}

impl VerificationItem {
    /// A passing item
    pub fn pass(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            detail: Some(detail.into()),
        }
    }

    /// A failing item
    pub fn fail(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            detail: Some(detail.into()),
        }
    }

    /// A passing item for a check that does not apply
    pub fn skipped(name: impl Into<String>, reason: &str) -> Self {
        Self::pass(name, format!("skipped: {}", reason))
    }

    fn from_check(name: String, outcome: Result<(bool, String)>) -> Self {
        match outcome {
            Ok((true, detail)) => Self::pass(name, detail),
            Ok((false, detail)) => Self::fail(name, detail),
            Err(e) => Self::fail(name, format!("check errored: {}", e)),
        }
    }
}

/// Itemized outcome of the checklist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    /// One entry per check, in execution order
    pub items: Vec<VerificationItem>,
    /// Number of failing items
    pub failure_count: usize,
}

impl VerificationReport {
    /// Aggregate `items`
    pub fn new(items: Vec<VerificationItem>) -> Self {
        let failure_count = items.iter().filter(|item| !item.passed).count();
        Self {
            items,
            failure_count,
        }
    }

    /// Whether every check passed
    pub fn is_success(&self) -> bool {
        self.failure_count == 0
    }

    /// Failing items
    pub fn failures(&self) -> impl Iterator<Item = &VerificationItem> {
        self.items.iter().filter(|item| !item.passed)
    }

    /// One-line summary
    pub fn summary(&self) -> String {
        let total = self.items.len();
        if self.is_success() {
            format!("✅ All {} checks passed", total)
        } else {
            format!("❌ {}/{} checks passed", total - self.failure_count, total)
        }
    }
}

/// Runs the checklist against a published release
pub struct ReleaseVerifier<'a, H, V> {
    hosting: &'a H,
    vcs: &'a V,
    config: &'a OrchestratorConfig,
    repo: &'a RepoSlug,
    workdir: &'a Path,
}

impl<'a, H: HostingApi, V: VersionControl> ReleaseVerifier<'a, H, V> {
    /// Create a verifier for `repo` checked out at `workdir`
    pub fn new(
        hosting: &'a H,
        vcs: &'a V,
        config: &'a OrchestratorConfig,
        repo: &'a RepoSlug,
        workdir: &'a Path,
    ) -> Self {
        Self {
            hosting,
            vcs,
            config,
            repo,
            workdir,
        }
    }

    /// Run every check for `version`, released as `tags`, after `previous`
    pub async fn verify(
        &self,
        version: &ReleaseVersion,
        previous: &ReleaseVersion,
        tags: &[String],
    ) -> VerificationReport {
        let tag = version.tag_name();
        let mut items = Vec::new();

        for published in tags {
            items.push(self.check_remote_tag(published).await);
        }
        items.push(
            self.check_release_branch(&version.release_branch(&self.config.tags.branch_prefix))
                .await,
        );
        items.push(self.check_release_object(&tag).await);
        for file in &self.config.verify.changelog_files {
            items.push(self.check_changelog(file, version));
        }
        items.push(self.check_ci_health().await);
        items.push(self.check_source_archive(&tag).await);
        items.push(self.check_milestone(&tag).await);
        items.push(self.check_commit_count(&previous.tag_name(), &tag).await);
        items.push(self.check_signature(&tag).await);
        items.push(self.check_vulnerabilities().await);

        VerificationReport::new(items)
    }

    async fn check_remote_tag(&self, tag: &str) -> VerificationItem {
        let outcome = self.vcs.tag_exists_remotely(tag).await.map(|exists| {
            let detail = if exists { "present on remote" } else { "missing on remote" };
            (exists, detail.to_string())
        });
        VerificationItem::from_check(format!("tag {}", tag), outcome)
    }

    async fn check_release_branch(&self, branch: &str) -> VerificationItem {
        let outcome = self.vcs.remote_branch_exists(branch).await.map(|exists| {
            let detail = if exists { "present on remote" } else { "missing on remote" };
            (exists, detail.to_string())
        });
        VerificationItem::from_check(format!("release branch {}", branch), outcome)
    }

    async fn check_release_object(&self, tag: &str) -> VerificationItem {
        let outcome = self.hosting.get_release(self.repo, tag).await.map(|release| {
            match release {
                None => (false, "no release object".to_string()),
                Some(r) if r.draft => (false, format!("still a draft: {}", r.url)),
                Some(r) if r.prerelease => (false, format!("marked as pre-release: {}", r.url)),
                Some(r) => (true, r.url),
            }
        });
        VerificationItem::from_check(format!("release {}", tag), outcome)
    }

    fn check_changelog(&self, file: &Path, version: &ReleaseVersion) -> VerificationItem {
        let name = format!("changelog {}", file.display());
        let path: PathBuf = if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.workdir.join(file)
        };

        let needle = format!("v{}", version);
        let outcome = std::fs::read_to_string(&path)
            .map_err(ReleaseError::from)
            .map(|content| {
                let found = content
                    .lines()
                    .any(|line| line.starts_with("## ") && line.contains(&needle));
                let detail = if found {
                    format!("has a '{}' section", needle)
                } else {
                    format!("no '## ...{}' section", needle)
                };
                (found, detail)
            });
        VerificationItem::from_check(name, outcome)
    }

    async fn check_ci_health(&self) -> VerificationItem {
        let main = &self.config.repository.main_branch;
        let sample = self.config.verify.ci_health_runs.max(1);
        let query = RunQuery::for_ref(main.as_str()).limit(sample);

        let outcome = self.hosting.list_runs(self.repo, &query).await.map(|runs| {
            let completed: Vec<_> = runs.iter().filter(|run| run.is_completed()).collect();
            let failing: Vec<String> = completed
                .iter()
                .filter(|run| run.conclusion == Some(RunConclusion::Failure))
                .map(|run| run.reference())
                .collect();
            if failing.is_empty() {
                (true, format!("{} recent run(s) healthy", completed.len()))
            } else {
                (false, format!("failing: {}", failing.join(", ")))
            }
        });
        VerificationItem::from_check(format!("CI health on {}", main), outcome)
    }

    async fn check_source_archive(&self, tag: &str) -> VerificationItem {
        let workflow = &self.config.verify.source_archive_workflow;
        let query = RunQuery::workflow(workflow.as_str()).on_branch(tag);

        let outcome = self.hosting.list_runs(self.repo, &query).await.map(|runs| {
            match runs.iter().find(|run| run.succeeded()) {
                Some(run) => (true, run.url.clone()),
                None => match runs.first() {
                    Some(run) => (
                        false,
                        format!("latest run {} is '{}'", run.url, run.conclusion_label()),
                    ),
                    None => (false, format!("no {} run for {}", workflow, tag)),
                },
            }
        });
        VerificationItem::from_check("source archive build".to_string(), outcome)
    }

    async fn check_milestone(&self, tag: &str) -> VerificationItem {
        let outcome = self.hosting.list_milestones(self.repo).await.map(|milestones| {
            match milestones.iter().find(|m| m.title == tag) {
                Some(m) => (true, format!("#{} ({})", m.number, m.state)),
                None => (false, format!("no milestone titled {}", tag)),
            }
        });
        VerificationItem::from_check(format!("milestone {}", tag), outcome)
    }

    async fn check_commit_count(&self, previous: &str, tag: &str) -> VerificationItem {
        let outcome = self.vcs.count_commits(previous, tag).await.map(|count| {
            (count > 0, format!("{} commit(s) since {}", count, previous))
        });
        VerificationItem::from_check(format!("commits {}..{}", previous, tag), outcome)
    }

    async fn check_signature(&self, tag: &str) -> VerificationItem {
        let name = format!("signature of {}", tag);
        if !self.config.verify.signing {
            return VerificationItem::skipped(name, "signing not configured");
        }
        let outcome = self.vcs.verify_tag_signature(tag).await.map(|valid| {
            let detail = if valid { "valid signature" } else { "missing or invalid signature" };
            (valid, detail.to_string())
        });
        VerificationItem::from_check(name, outcome)
    }

    async fn check_vulnerabilities(&self) -> VerificationItem {
        let name = "vulnerability scan";
        let Some((program, args)) = self.config.verify.vuln_scan_command.split_first() else {
            return VerificationItem::skipped(name, "no scan command configured");
        };
        let Ok(resolved) = which::which(program) else {
            return VerificationItem::skipped(name, &format!("{} not found on PATH", program));
        };

        let outcome = tokio::process::Command::new(resolved)
            .args(args)
            .current_dir(self.workdir)
            .output()
            .await
            .map_err(ReleaseError::from)
            .map(|output| {
                if output.status.success() {
                    (true, format!("{} reported no issues", program))
                } else {
                    let stdout = String::from_utf8_lossy(&output.stdout);
                    let first = stdout.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
                    (false, format!("{} exited with {}: {}", program, output.status, first))
                }
            });
        VerificationItem::from_check(name.to_string(), outcome)
    }

    /// Run the stage against the published release recorded in `context`
    pub async fn run(&self, context: &ReleaseContext) -> Result<StageResult> {
        let request = &context.request;
        let mut result = StageResult::running(StageId::Verify);

        let mut tags = vec![
            context
                .output(keys::BETA_TAG)
                .map(str::to_string)
                .unwrap_or_else(|| request.candidate_beta.tag_name()),
        ];
        if let Some(stable) = context.output(keys::STABLE_TAG) {
            tags.push(stable.to_string());
        }

        let report = self
            .verify(&request.candidate_beta, &request.current_beta, &tags)
            .await;
        log::info!("{}", report.summary());
        result.output(keys::VERIFICATION_FAILURES, report.failure_count);

        if !report.is_success() {
            return Err(StageError::VerificationFailure { report }.into());
        }
        for item in &report.items {
            result.note(format!(
                "{}: {}",
                item.name,
                item.detail.as_deref().unwrap_or("ok")
            ));
        }
        Ok(result.succeed())
    }
}
