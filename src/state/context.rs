//! Immutable record threaded from stage to stage.

use super::request::ReleaseRequest;
use crate::stages::{StageId, StageResult, StageStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current version of the persisted context format
pub const CONTEXT_FORMAT_VERSION: u32 = 1;

/// Release request plus everything the stages have resolved so far
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseContext {
    /// Format of the persisted record
    pub format_version: u32,
    /// The request this release was started with
    pub request: ReleaseRequest,
    /// Latest result per stage, keyed by stage name
    pub stages: BTreeMap<String, StageResult>,
    /// Outputs of every succeeded stage, later stages overwriting earlier ones
    pub outputs: BTreeMap<String, String>,
    /// When the release was started
    pub started_at: DateTime<Utc>,
    /// When the last stage result was recorded
    pub updated_at: DateTime<Utc>,
}

impl ReleaseContext {
    /// Context for a release with no stages run
    pub fn new(request: ReleaseRequest) -> Self {
        let now = Utc::now();
        Self {
            format_version: CONTEXT_FORMAT_VERSION,
            request,
            stages: BTreeMap::new(),
            outputs: BTreeMap::new(),
            started_at: now,
            updated_at: now,
        }
    }

    /// New context with `result` recorded
    ///
    /// Outputs are only merged from succeeded stages. The result is marked
    /// with the request's dry-run mode.
    pub fn advance(&self, mut result: StageResult) -> Self {
        result.dry_run = self.request.dry_run;
        let mut next = self.clone();
        if result.status == StageStatus::Succeeded {
            next.outputs
                .extend(result.outputs.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        next.stages.insert(result.stage_name.clone(), result);
        next.updated_at = Utc::now();
        next
    }

    /// Same recorded progress under a new request for the same release
    ///
    /// Only the run switches (dry-run, stable check) may differ.
    pub fn with_request(&self, request: ReleaseRequest) -> Self {
        let mut next = self.clone();
        next.request = request;
        next
    }

    /// Recorded status of `stage`
    pub fn status(&self, stage: StageId) -> StageStatus {
        self.stages
            .get(stage.name())
            .map(|result| result.status)
            .unwrap_or(StageStatus::Pending)
    }

    /// Whether `stage` is done as far as this request is concerned
    ///
    /// Results recorded by a dry run only count while still dry-running.
    pub fn is_satisfied(&self, stage: StageId) -> bool {
        self.result(stage).is_some_and(|result| {
            result.status.is_satisfied() && (self.request.dry_run || !result.dry_run)
        })
    }

    /// Recorded result of `stage`
    pub fn result(&self, stage: StageId) -> Option<&StageResult> {
        self.stages.get(stage.name())
    }

    /// Resolved output value
    pub fn output(&self, key: &str) -> Option<&str> {
        self.outputs.get(key).map(String::as_str)
    }
}
