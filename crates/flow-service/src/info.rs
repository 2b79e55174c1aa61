//! §4.F info reader: a read-only projection of a revision for external
//! (HTTP GET) consumers.

use std::collections::BTreeMap;
use std::sync::Arc;

use flow::registry::format_identifier;
use flow::FlowRegistry;
use flow_domain::{PipelineSnapshot, RevisionKey};
use serde::Serialize;
use serde_json::Value;

use crate::errors::ServiceError;

#[derive(Debug, Clone, Serialize)]
pub struct DatasetInfo {
    pub id: String,
    pub spec_contents: Value,
    pub modified: String,
    pub state: String,
    pub error_log: Value,
    pub logs: Value,
    pub stats: Value,
    pub pipelines: BTreeMap<String, PipelineSnapshot>,
    pub certified: bool,
}

pub struct InfoReader {
    registry: Arc<dyn FlowRegistry>,
}

impl InfoReader {
    pub fn new(registry: Arc<dyn FlowRegistry>) -> Self {
        Self { registry }
    }

    pub fn info(&self, owner: &str, dataset: &str, which: RevisionKey) -> Result<DatasetInfo, ServiceError> {
        let dataset_id = format_identifier([owner, dataset]);
        let stored = self
            .registry
            .get_dataset(&dataset_id)
            .map_err(|e| ServiceError::Unexpected(e.to_string()))?
            .ok_or(ServiceError::NotFound)?;
        let revision = self
            .registry
            .get_revision(&dataset_id, which)
            .map_err(|e| ServiceError::Unexpected(e.to_string()))?
            .ok_or(ServiceError::NotFound)?;

        Ok(DatasetInfo {
            id: revision.revision_id,
            spec_contents: stored.spec,
            modified: stored.updated_at.to_rfc3339(),
            state: revision.status.to_snapshot_status().to_string(),
            error_log: revision.errors,
            logs: revision.logs,
            stats: revision.stats,
            pipelines: revision.pipelines,
            certified: stored.certified,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use flow::InMemoryFlowRegistry;
    use flow_domain::PipelineState;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn not_found_when_dataset_missing() {
        let registry: Arc<dyn FlowRegistry> = Arc::new(InMemoryFlowRegistry::new());
        let reader = InfoReader::new(registry);
        let err = reader.info("me", "id", RevisionKey::Latest).unwrap_err();
        assert_eq!(err, ServiceError::NotFound);
    }

    #[test]
    fn not_found_when_revision_missing() {
        let registry: Arc<dyn FlowRegistry> = Arc::new(InMemoryFlowRegistry::new());
        registry.create_or_update_dataset("me/id", "me", json!({}), now()).unwrap();
        let reader = InfoReader::new(registry);
        let err = reader.info("me", "id", RevisionKey::Latest).unwrap_err();
        assert_eq!(err, ServiceError::NotFound);
    }

    #[test]
    fn returns_projection_for_existing_revision() {
        let registry: Arc<dyn FlowRegistry> = Arc::new(InMemoryFlowRegistry::new());
        registry.create_or_update_dataset("me/id", "me", json!({"meta": {"ownerid": "me"}}), now()).unwrap();
        registry.create_revision("me/id", now(), PipelineState::Pending, json!([])).unwrap();

        let reader = InfoReader::new(registry);
        let info = reader.info("me", "id", RevisionKey::Latest).unwrap();
        assert_eq!(info.id, "me/id/1");
        assert_eq!(info.state, "QUEUED");
        assert!(info.pipelines.is_empty());
        assert!(!info.certified);
    }
}
