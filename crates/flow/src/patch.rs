//! Partial-update documents for `update_revision`/`update_pipeline`
//! (§4.B): every field is optional except `updated_at`, which every
//! mutation sets.

use chrono::{DateTime, Utc};
use flow_domain::{PipelineSnapshot, PipelineState};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct RevisionPatch {
    pub updated_at: DateTime<Utc>,
    pub status: Option<PipelineState>,
    pub errors: Option<Value>,
    pub stats: Option<Value>,
    pub logs: Option<Value>,
    pub pipelines: Option<BTreeMap<String, PipelineSnapshot>>,
}

impl RevisionPatch {
    pub fn touch(updated_at: DateTime<Utc>) -> Self {
        Self { updated_at, status: None, errors: None, stats: None, logs: None, pipelines: None }
    }
}

#[derive(Debug, Clone)]
pub struct PipelinePatch {
    pub updated_at: DateTime<Utc>,
    pub status: Option<PipelineState>,
    pub errors: Option<Value>,
    pub stats: Option<Value>,
    pub logs: Option<Value>,
}

impl PipelinePatch {
    pub fn touch(updated_at: DateTime<Utc>) -> Self {
        Self { updated_at, status: None, errors: None, stats: None, logs: None }
    }
}
