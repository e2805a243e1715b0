//! Shared helper functions for command execution.

use crate::cli::{ReleaseArgs, RuntimeConfig};
use crate::config::OrchestratorConfig;
use crate::error::Result;
use crate::git::VersionControl;
use crate::github::RepoSlug;
use crate::state::{ContextStore, DEFAULT_CONTEXT_FILE, ReleaseRequest};
use crate::version::{ReleaseVersion, resolve_previous_version};
use std::path::Path;

/// Repository being released: configured slug, else the remote URL
pub(super) async fn detect_repository<V: VersionControl>(
    config: &OrchestratorConfig,
    vcs: &V,
) -> Result<RepoSlug> {
    if let Some(slug) = &config.repository.slug {
        return Ok(slug.clone());
    }
    let url = vcs.remote_url().await?;
    RepoSlug::from_remote_url(&url)
}

/// Build the release request, resolving omitted current versions from tags
pub(super) async fn build_request<V: VersionControl>(
    args: &ReleaseArgs,
    vcs: &V,
) -> Result<ReleaseRequest> {
    let candidate = ReleaseVersion::parse(&args.version)?;
    let stable = args
        .stable_version
        .as_deref()
        .map(ReleaseVersion::parse)
        .transpose()?;

    let needs_tags = args.current_version.is_none()
        || (stable.is_some() && args.current_stable_version.is_none());
    let tags = if needs_tags { vcs.list_tags().await? } else { Vec::new() };

    let current = match &args.current_version {
        Some(raw) => ReleaseVersion::parse(raw)?,
        None => resolve_previous_version(&candidate, &tags)?,
    };
    log::debug!("Current beta version {}", current);

    let mut request = ReleaseRequest::beta(candidate, current);
    if let Some(stable) = stable {
        let current_stable = match &args.current_stable_version {
            Some(raw) => Some(ReleaseVersion::parse(raw)?),
            // A stable line with no earlier tag is being released for the first time
            None => resolve_previous_version(&stable, &tags).ok(),
        };
        request = request.with_stable(stable, current_stable);
    }

    Ok(request
        .dry_run(args.dry_run)
        .skip_stable_check(args.skip_stable_check))
}

/// Context store at `--context`, defaulting to the working directory
pub(super) fn context_store(runtime: &RuntimeConfig, cwd: &Path) -> ContextStore {
    match &runtime.context_path {
        Some(path) => ContextStore::new(path.clone()),
        None => ContextStore::new(cwd.join(DEFAULT_CONTEXT_FILE)),
    }
}
