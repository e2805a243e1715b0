//! Delegation of tag creation to the repository's tag-push action.

use crate::error::{GitError, PreconditionError, Result};
use std::future::Future;
use std::path::PathBuf;
use tokio::process::Command;

/// External action that creates and pushes the tags of one module set
pub trait TagPushAction {
    /// Create and push every tag belonging to `module_set`
    fn push_tags(&self, module_set: &str) -> impl Future<Output = Result<()>>;
}

/// Runs a configured command such as `make push-tags MODSET=<set> REMOTE=<remote>`
#[derive(Debug, Clone)]
pub struct CommandTagPusher {
    command: Vec<String>,
    remote: String,
    workdir: PathBuf,
}

impl CommandTagPusher {
    /// Create a pusher; `command` must name at least a program
    pub fn new(command: Vec<String>, remote: impl Into<String>, workdir: PathBuf) -> Result<Self> {
        if command.is_empty() {
            return Err(PreconditionError::ToolOrAuthMissing {
                what: "tag push command".to_string(),
                hint: "Set [tags].command in release.toml, e.g. [\"make\", \"push-tags\"]"
                    .to_string(),
            }
            .into());
        }
        Ok(Self {
            command,
            remote: remote.into(),
            workdir,
        })
    }

    /// Program the action invokes
    pub fn program(&self) -> &str {
        &self.command[0]
    }

    /// Full argument list for `module_set`, program excluded
    pub fn arguments(&self, module_set: &str) -> Vec<String> {
        let mut args: Vec<String> = self.command[1..].to_vec();
        args.push(format!("MODSET={}", module_set));
        args.push(format!("REMOTE={}", self.remote));
        args
    }
}

impl TagPushAction for CommandTagPusher {
    async fn push_tags(&self, module_set: &str) -> Result<()> {
        let args = self.arguments(module_set);
        let display = format!("{} {}", self.program(), args.join(" "));
        log::info!("Running {}", display);

        let output = Command::new(self.program())
            .args(&args)
            .current_dir(&self.workdir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .await?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(GitError::CommandFailed {
            command: display,
            stderr: if stderr.is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr
            },
        }
        .into())
    }
}
