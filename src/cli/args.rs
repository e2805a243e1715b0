//! Command line argument parsing and validation.
//!
//! One subcommand per release stage, plus `run` for the whole pipeline and
//! `status` for the persisted context.

use crate::stages::StageId;
use crate::version::validate_format;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Multi-repository release orchestration
#[derive(Parser, Debug)]
#[command(
    name = "release_conductor",
    version,
    about = "Drive a coordinated release through its stages",
    long_about = "Drive a coordinated release through its stages: prerequisite checks,
upstream sync, prepare-release automation, tag publishing and verification.

Usage:
  release_conductor validate 0.85.0
  release_conductor run 0.85.0 --stable-version 1.11.0 --dry-run
  release_conductor push-tags 0.85.0 --stable-version 1.11.0 --skip-stable-check
  release_conductor status --json"
)]
pub struct Args {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (defaults to release.toml in the working directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Release context file
    #[arg(long, global = true, value_name = "PATH")]
    pub context: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check blockers, existing releases and the local working state
    Validate(ReleaseArgs),

    /// Wait for the upstream sync automation to succeed
    #[command(name = "wait-upstream")]
    WaitUpstream(ReleaseArgs),

    /// Run the prepare-release automation and wait for its PR to merge
    Prepare(ReleaseArgs),

    /// Publish module-set tags and wait for the release branch and builds
    #[command(name = "push-tags")]
    PushTags(ReleaseArgs),

    /// Run the post-release checklist
    Verify(ReleaseArgs),

    /// Run every remaining stage in order, stopping at the first failure
    Run(ReleaseArgs),

    /// Show the persisted release context
    Status {
        /// Output the raw context as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Versions and switches shared by the stage commands
#[derive(clap::Args, Debug, Clone)]
pub struct ReleaseArgs {
    /// Candidate beta version (X.Y.Z, no 'v' prefix)
    #[arg(value_name = "VERSION")]
    pub version: String,

    /// Candidate stable version
    #[arg(long, value_name = "X.Y.Z")]
    pub stable_version: Option<String>,

    /// Current beta version (resolved from tags when omitted)
    #[arg(long, value_name = "X.Y.Z")]
    pub current_version: Option<String>,

    /// Current stable version (resolved from tags when omitted)
    #[arg(long, value_name = "X.Y.Z", requires = "stable_version")]
    pub current_stable_version: Option<String>,

    /// Log every mutating step instead of executing it
    #[arg(long)]
    pub dry_run: bool,

    /// Dispatch a new upstream sync when none has succeeded recently
    #[arg(long)]
    pub trigger_if_needed: bool,

    /// Publish stable tags even without stable module changes
    #[arg(long)]
    pub skip_stable_check: bool,
}

impl ReleaseArgs {
    /// Validate every version argument against the release format
    pub fn validate(&self) -> Result<(), String> {
        let versions = [
            Some(&self.version),
            self.stable_version.as_ref(),
            self.current_version.as_ref(),
            self.current_stable_version.as_ref(),
        ];
        for version in versions.into_iter().flatten() {
            validate_format(version).map_err(|e| e.to_string())?;
        }
        Ok(())
    }
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), String> {
        match self.command.release_args() {
            Some(release) => release.validate(),
            None => Ok(()),
        }
    }
}

impl Command {
    /// Command name as typed on the command line
    pub fn name(&self) -> &'static str {
        match self {
            Command::Run(_) => "run",
            Command::Status { .. } => "status",
            other => other.stage().map(|stage| stage.name()).unwrap_or("unknown"),
        }
    }

    /// The single stage this command runs, if any
    pub fn stage(&self) -> Option<StageId> {
        match self {
            Command::Validate(_) => Some(StageId::Validate),
            Command::WaitUpstream(_) => Some(StageId::WaitUpstream),
            Command::Prepare(_) => Some(StageId::Prepare),
            Command::PushTags(_) => Some(StageId::PushTags),
            Command::Verify(_) => Some(StageId::Verify),
            Command::Run(_) | Command::Status { .. } => None,
        }
    }

    /// Release arguments of stage commands
    pub fn release_args(&self) -> Option<&ReleaseArgs> {
        match self {
            Command::Validate(a)
            | Command::WaitUpstream(a)
            | Command::Prepare(a)
            | Command::PushTags(a)
            | Command::Verify(a)
            | Command::Run(a) => Some(a),
            Command::Status { .. } => None,
        }
    }
}

/// Configuration derived from command line arguments
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Explicit configuration file
    pub config_path: Option<PathBuf>,
    /// Explicit context file
    pub context_path: Option<PathBuf>,
    output: super::OutputManager,
}

impl RuntimeConfig {
    /// Get a reference to the output manager
    pub fn output(&self) -> &super::OutputManager {
        &self.output
    }

    /// Print message
    pub fn println(&self, message: &str) {
        self.output.println(message);
    }

    /// Print verbose message (only with --verbose)
    pub fn verbose_println(&self, message: &str) {
        self.output.verbose(message);
    }

    /// Print error message (always shown)
    pub fn error_println(&self, message: &str) {
        self.output.error(message);
    }

    /// Print warning message
    pub fn warning_println(&self, message: &str) {
        self.output.warn(message);
    }

    /// Print success message
    pub fn success_println(&self, message: &str) {
        self.output.success(message);
    }

    /// Print indented text
    pub fn indent(&self, message: &str) {
        self.output.indent(message);
    }

    /// Check if verbose output is enabled
    pub fn is_verbose(&self) -> bool {
        self.output.is_verbose()
    }

    /// Check if output is suppressed
    pub fn is_quiet(&self) -> bool {
        self.output.is_quiet()
    }
}

impl From<&Args> for RuntimeConfig {
    fn from(args: &Args) -> Self {
        Self {
            config_path: args.config.clone(),
            context_path: args.context.clone(),
            output: super::OutputManager::new(args.verbose, args.quiet),
        }
    }
}
