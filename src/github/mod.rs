//! Code-hosting integration for release operations

mod api;
mod client;
mod types;

pub use api::HostingApi;
pub use client::GitHubClient;
pub use types::{
    Issue, Milestone, PrQuery, PrState, PrStateFilter, PullRequest, Release, RepoSlug,
    RunConclusion, RunQuery, RunStatus, WorkflowRun,
};
