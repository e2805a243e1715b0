//! Persistence of the release context between invocations.
//!
//! Saves are atomic: the record is written to a sibling temp file, synced
//! and renamed over the target.

use super::context::{CONTEXT_FORMAT_VERSION, ReleaseContext};
use super::request::ReleaseRequest;
use crate::error::{Result, StateError};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Context file used when `--context` is not given
pub const DEFAULT_CONTEXT_FILE: &str = ".release-context.json";

/// JSON file holding one [`ReleaseContext`]
#[derive(Debug, Clone)]
pub struct ContextStore {
    path: PathBuf,
}

impl ContextStore {
    /// Store at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the context file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a context file exists
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Save `context`, replacing any previous file
    pub fn save(&self, context: &ReleaseContext) -> Result<()> {
        let serialized =
            serde_json::to_string_pretty(context).map_err(|e| StateError::SaveFailed {
                reason: format!("Failed to serialize context: {}", e),
            })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StateError::SaveFailed {
                reason: format!("Failed to create {}: {}", parent.display(), e),
            })?;
        }

        let temp_path = self.path.with_extension("tmp");
        {
            let mut file = fs::File::create(&temp_path).map_err(|e| StateError::SaveFailed {
                reason: format!("Failed to create temp file: {}", e),
            })?;
            file.write_all(serialized.as_bytes())
                .map_err(|e| StateError::SaveFailed {
                    reason: format!("Failed to write context: {}", e),
                })?;
            file.sync_all().map_err(|e| StateError::SaveFailed {
                reason: format!("Failed to sync file: {}", e),
            })?;
        }

        fs::rename(&temp_path, &self.path).map_err(|e| StateError::SaveFailed {
            reason: format!("Failed to rename temp file: {}", e),
        })?;

        log::debug!("Saved release context to {}", self.path.display());
        Ok(())
    }

    /// Load the context file
    pub fn load(&self) -> Result<ReleaseContext> {
        if !self.path.exists() {
            return Err(StateError::NotFound {
                path: self.path.clone(),
            }
            .into());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| StateError::LoadFailed {
            reason: format!("Failed to read {}: {}", self.path.display(), e),
        })?;

        // Check the format version before decoding the full record
        let raw: serde_json::Value =
            serde_json::from_str(&content).map_err(|e| StateError::LoadFailed {
                reason: format!("Invalid JSON in {}: {}", self.path.display(), e),
            })?;
        let found = raw
            .get("format_version")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(0) as u32;
        if found != CONTEXT_FORMAT_VERSION {
            return Err(StateError::VersionMismatch {
                expected: CONTEXT_FORMAT_VERSION,
                found,
            }
            .into());
        }

        serde_json::from_value(raw).map_err(|e| {
            StateError::LoadFailed {
                reason: format!("Failed to decode {}: {}", self.path.display(), e),
            }
            .into()
        })
    }

    /// Load the stored context for `request`, if any
    ///
    /// Fails when the stored context belongs to a different release.
    pub fn load_for(&self, request: &ReleaseRequest) -> Result<Option<ReleaseContext>> {
        if !self.exists() {
            return Ok(None);
        }
        let stored = self.load()?;
        if !stored.request.same_release(request) {
            return Err(StateError::ReleaseMismatch {
                path: self.path.clone(),
                expected: request.label(),
                found: stored.request.label(),
            }
            .into());
        }
        Ok(Some(stored.with_request(request.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::{StageId, StageResult, StageStatus};
    use crate::version::ReleaseVersion;

    fn request(candidate: &str) -> ReleaseRequest {
        ReleaseRequest::beta(
            ReleaseVersion::parse(candidate).unwrap(),
            ReleaseVersion::parse("0.84.0").unwrap(),
        )
    }

    #[test]
    fn saves_and_loads() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContextStore::new(dir.path().join("ctx.json"));
        let ctx = ReleaseContext::new(request("0.85.0"))
            .advance(StageResult::running(StageId::Validate).succeed());

        store.save(&ctx).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded, ctx);
        assert_eq!(loaded.status(StageId::Validate), StageStatus::Succeeded);
        assert!(!dir.path().join("ctx.tmp").exists());
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContextStore::new(dir.path().join("ctx.json"));
        assert!(store.load().is_err());
        assert!(store.load_for(&request("0.85.0")).unwrap().is_none());
    }

    #[test]
    fn rejects_other_release_and_format() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContextStore::new(dir.path().join("ctx.json"));
        store.save(&ReleaseContext::new(request("0.85.0"))).unwrap();

        let err = store.load_for(&request("0.86.0")).unwrap_err();
        assert!(err.to_string().contains("0.85.0"));

        std::fs::write(store.path(), r#"{"format_version": 99}"#).unwrap();
        let err = store.load().unwrap_err();
        assert!(matches!(
            err,
            crate::error::ReleaseError::State(StateError::VersionMismatch { found: 99, .. })
        ));
    }
}
