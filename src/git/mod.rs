//! Version control and tag publication for release workflows.
//!
//! The orchestrator never writes commits; it reads refs, compares tips,
//! force-syncs the local main branch and delegates tag creation to the
//! repository's own tag-push action.

mod operations;
mod system;
mod tag_push;

pub use operations::VersionControl;
pub use system::SystemGit;
pub use tag_push::{CommandTagPusher, TagPushAction};
