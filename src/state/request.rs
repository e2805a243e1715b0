//! The validated release request.

use crate::version::ReleaseVersion;
use serde::{Deserialize, Serialize};

/// Versions and switches for one release
///
/// Built once from validated input and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseRequest {
    /// Candidate version of the beta module set
    pub candidate_beta: ReleaseVersion,
    /// Candidate version of the stable module set, when releasing it
    pub candidate_stable: Option<ReleaseVersion>,
    /// Latest published beta version
    pub current_beta: ReleaseVersion,
    /// Latest published stable version
    pub current_stable: Option<ReleaseVersion>,
    /// Replace every mutating step with a logged record
    pub dry_run: bool,
    /// Publish stable tags without checking for changes
    pub skip_stable_check: bool,
}

impl ReleaseRequest {
    /// Beta-only request
    pub fn beta(candidate: ReleaseVersion, current: ReleaseVersion) -> Self {
        Self {
            candidate_beta: candidate,
            candidate_stable: None,
            current_beta: current,
            current_stable: None,
            dry_run: false,
            skip_stable_check: false,
        }
    }

    /// Add a stable candidate and its current version
    pub fn with_stable(mut self, candidate: ReleaseVersion, current: Option<ReleaseVersion>) -> Self {
        self.candidate_stable = Some(candidate);
        self.current_stable = current;
        self
    }

    /// Set dry-run mode
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set the stable change-check bypass
    pub fn skip_stable_check(mut self, skip: bool) -> Self {
        self.skip_stable_check = skip;
        self
    }

    /// Whether two requests describe the same release
    pub fn same_release(&self, other: &ReleaseRequest) -> bool {
        self.candidate_beta == other.candidate_beta && self.candidate_stable == other.candidate_stable
    }

    /// Short label such as `0.85.0` or `0.85.0 / 1.31.0`
    pub fn label(&self) -> String {
        match &self.candidate_stable {
            Some(stable) => format!("{} / {}", self.candidate_beta, stable),
            None => self.candidate_beta.to_string(),
        }
    }
}
