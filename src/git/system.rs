//! System git backend.
//!
//! Every operation is one `git` subprocess run in the repository directory
//! with terminal prompts disabled.

use super::operations::VersionControl;
use crate::error::{GitError, Result};
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;

/// Git backend using the system `git` binary
#[derive(Debug, Clone)]
pub struct SystemGit {
    repo_path: PathBuf,
    remote: String,
}

impl SystemGit {
    /// Open the repository containing `path`, talking to `remote`
    pub async fn open(path: &Path, remote: &str) -> Result<Self> {
        let output = Command::new("git")
            .arg("-C")
            .arg(path)
            .args(["rev-parse", "--show-toplevel"])
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("not a git repository") {
                return Err(GitError::NotRepository.into());
            }
            return Err(GitError::CommandFailed {
                command: "git rev-parse --show-toplevel".to_string(),
                stderr: stderr.trim().to_string(),
            }
            .into());
        }

        let top = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(Self {
            repo_path: PathBuf::from(top),
            remote: remote.to_string(),
        })
    }

    /// Repository root
    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    fn git_cmd(&self) -> Command {
        let mut cmd = Command::new("git");
        cmd.current_dir(&self.repo_path)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("LC_ALL", "C");
        cmd
    }

    async fn raw(&self, args: &[&str]) -> Result<Output> {
        log::debug!("git {}", args.join(" "));
        Ok(self.git_cmd().args(args).output().await?)
    }

    /// Run git and return trimmed stdout, failing on a non-zero exit
    async fn run(&self, args: &[&str]) -> Result<String> {
        let output = self.raw(args).await?;
        if !output.status.success() {
            return Err(GitError::CommandFailed {
                command: format!("git {}", args.join(" ")),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl VersionControl for SystemGit {
    async fn tag_exists_locally(&self, tag: &str) -> Result<bool> {
        let refname = format!("refs/tags/{}", tag);
        let output = self
            .raw(&["show-ref", "--verify", "--quiet", &refname])
            .await?;
        Ok(output.status.success())
    }

    async fn tag_exists_remotely(&self, tag: &str) -> Result<bool> {
        let refname = format!("refs/tags/{}", tag);
        let stdout = self
            .run(&["ls-remote", "--tags", &self.remote, &refname])
            .await?;
        Ok(!stdout.is_empty())
    }

    async fn remote_branch_exists(&self, branch: &str) -> Result<bool> {
        let refname = format!("refs/heads/{}", branch);
        let stdout = self
            .run(&["ls-remote", "--heads", &self.remote, &refname])
            .await?;
        Ok(!stdout.is_empty())
    }

    async fn fetch(&self) -> Result<()> {
        self.run(&["fetch", "--tags", "--prune", &self.remote])
            .await
            .map(|_| ())
    }

    async fn local_commit(&self, branch: &str) -> Result<String> {
        let refname = format!("refs/heads/{}", branch);
        self.run(&["rev-parse", "--verify", &refname]).await
    }

    async fn remote_commit(&self, branch: &str) -> Result<String> {
        let refname = format!("refs/remotes/{}/{}", self.remote, branch);
        self.run(&["rev-parse", "--verify", &refname]).await
    }

    async fn force_sync(&self, branch: &str) -> Result<()> {
        let upstream = format!("{}/{}", self.remote, branch);
        self.run(&["checkout", branch]).await?;
        self.run(&["reset", "--hard", &upstream]).await?;
        Ok(())
    }

    async fn current_branch(&self) -> Result<String> {
        self.run(&["rev-parse", "--abbrev-ref", "HEAD"]).await
    }

    async fn is_working_tree_clean(&self) -> Result<bool> {
        let stdout = self.run(&["status", "--porcelain"]).await?;
        Ok(stdout.is_empty())
    }

    async fn list_tags(&self) -> Result<Vec<String>> {
        let stdout = self.run(&["tag", "--list"]).await?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn has_changes_since(&self, tag: &str, paths: &[String]) -> Result<bool> {
        let range = format!("{}..HEAD", tag);
        let mut args = vec!["diff", "--quiet", range.as_str()];
        if !paths.is_empty() {
            args.push("--");
            args.extend(paths.iter().map(String::as_str));
        }

        // --quiet exits 1 when there are differences
        let output = self.raw(&args).await?;
        match output.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(GitError::CommandFailed {
                command: format!("git {}", args.join(" ")),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into()),
        }
    }

    async fn count_commits(&self, from: &str, to: &str) -> Result<u64> {
        let range = format!("{}..{}", from, to);
        let command = format!("git rev-list --count {}", range);
        let stdout = self.run(&["rev-list", "--count", &range]).await?;
        stdout.parse::<u64>().map_err(|_| {
            GitError::UnexpectedOutput {
                command,
                output: stdout.clone(),
            }
            .into()
        })
    }

    async fn verify_tag_signature(&self, tag: &str) -> Result<bool> {
        let output = self.raw(&["tag", "-v", tag]).await?;
        Ok(output.status.success())
    }

    async fn remote_url(&self) -> Result<String> {
        self.run(&["remote", "get-url", &self.remote]).await
    }
}
