//! Version control operations required by the release stages.
//!
//! The production implementation is [`SystemGit`](super::SystemGit), which
//! shells out to the system `git`. The remote is fixed when the
//! implementation is constructed.

use crate::error::Result;
use std::future::Future;

/// Trait defining the Git operations used during a release
pub trait VersionControl {
    /// Check if a tag exists in the local repository
    fn tag_exists_locally(&self, tag: &str) -> impl Future<Output = Result<bool>>;

    /// Check if a tag exists on the remote
    fn tag_exists_remotely(&self, tag: &str) -> impl Future<Output = Result<bool>>;

    /// Check if a branch exists on the remote
    fn remote_branch_exists(&self, branch: &str) -> impl Future<Output = Result<bool>>;

    /// Fetch refs and tags from the remote
    fn fetch(&self) -> impl Future<Output = Result<()>>;

    /// Commit at the tip of a local branch
    fn local_commit(&self, branch: &str) -> impl Future<Output = Result<String>>;

    /// Commit at the tip of the remote-tracking branch (after [`fetch`](Self::fetch))
    fn remote_commit(&self, branch: &str) -> impl Future<Output = Result<String>>;

    /// Check out `branch` and hard-reset it to the remote tip
    ///
    /// Discards local commits and uncommitted changes on that branch.
    fn force_sync(&self, branch: &str) -> impl Future<Output = Result<()>>;

    /// Currently checked-out branch (`HEAD` when detached)
    fn current_branch(&self) -> impl Future<Output = Result<String>>;

    /// Check if the working tree has no uncommitted changes
    fn is_working_tree_clean(&self) -> impl Future<Output = Result<bool>>;

    /// All local tag names
    fn list_tags(&self) -> impl Future<Output = Result<Vec<String>>>;

    /// Check if any of `paths` changed between `tag` and `HEAD`
    ///
    /// An empty path list compares the whole tree.
    fn has_changes_since(&self, tag: &str, paths: &[String]) -> impl Future<Output = Result<bool>>;

    /// Number of commits reachable from `to` but not from `from`
    fn count_commits(&self, from: &str, to: &str) -> impl Future<Output = Result<u64>>;

    /// Check the cryptographic signature of a tag
    fn verify_tag_signature(&self, tag: &str) -> impl Future<Output = Result<bool>>;

    /// URL of the configured remote
    fn remote_url(&self) -> impl Future<Output = Result<String>>;
}
