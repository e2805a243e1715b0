//! # Release Conductor
//!
//! Orchestration engine for a coordinated multi-repository release.
//!
//! A release moves through five stages, each observing or nudging state
//! owned by something else (issue tracker, CI automation, remote git refs):
//!
//! 1. **validate**: version formats, release blockers, existing releases
//! 2. **wait-upstream**: the upstream sync automation has succeeded recently
//! 3. **prepare**: dispatch the prepare-release automation, wait for its PR
//!    to merge, force-sync the local main branch
//! 4. **push-tags**: publish module-set tags exactly once, then wait for the
//!    release branch and tag-triggered builds
//! 5. **verify**: run an independent checklist over the published release
//!
//! Every wait is bounded ([`wait::wait_until`]); the only retried mutation is
//! the tag push ([`wait::retry`]). Progress is persisted as a
//! [`state::ReleaseContext`] so stages can be run one command at a time.
//!
//! ## Usage
//!
//! ```bash
//! release_conductor validate 0.85.0 --stable-version 1.11.0
//! release_conductor run 0.85.0 --dry-run
//! release_conductor status
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod cli;
pub mod config;
pub mod error;
pub mod git;
pub mod github;
pub mod stages;
pub mod state;
pub mod version;
pub mod wait;

// Re-export main types for public API
pub use cli::Args;
pub use config::{EnvConfig, OrchestratorConfig};
pub use error::{ReleaseError, Result};
pub use git::{CommandTagPusher, SystemGit, TagPushAction, VersionControl};
pub use github::{GitHubClient, HostingApi, RepoSlug};
pub use stages::{Pipeline, PipelineOptions, StageId, StageResult, StageStatus};
pub use state::{ContextStore, ReleaseContext, ReleaseRequest};
pub use version::ReleaseVersion;
