//! `InMemoryFlowRegistry`: a `Mutex`-guarded `HashMap`-backed
//! implementation of `FlowRegistry`. Not durable, not distributed —
//! intended for unit/integration tests and local runs without a
//! database, exactly as the teacher's `InMemoryFlowRepository` is for
//! `FlowRepository`.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use flow_domain::{
    calculate_new_schedule, Dataset, DatasetRevision, Pipeline, PipelineState, RevisionKey,
};
use serde_json::Value;

use crate::errors::{RegistryError, RegistryResult};
use crate::patch::{PipelinePatch, RevisionPatch};
use crate::registry::{format_identifier, FlowRegistry};

#[derive(Default)]
pub struct InMemoryFlowRegistry {
    datasets: Mutex<HashMap<String, Dataset>>,
    revisions: Mutex<HashMap<String, DatasetRevision>>,
    pipelines: Mutex<HashMap<String, Pipeline>>,
}

impl InMemoryFlowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_datasets(&self) -> std::sync::MutexGuard<'_, HashMap<String, Dataset>> {
        self.datasets.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_revisions(&self) -> std::sync::MutexGuard<'_, HashMap<String, DatasetRevision>> {
        self.revisions.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_pipelines(&self) -> std::sync::MutexGuard<'_, HashMap<String, Pipeline>> {
        self.pipelines.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl FlowRegistry for InMemoryFlowRegistry {
    fn get_dataset(&self, identifier: &str) -> RegistryResult<Option<Dataset>> {
        Ok(self.lock_datasets().get(identifier).cloned())
    }

    fn create_or_update_dataset(
        &self,
        identifier: &str,
        owner: &str,
        spec: Value,
        updated_at: DateTime<Utc>,
    ) -> RegistryResult<Dataset> {
        let mut datasets = self.lock_datasets();
        let entry = datasets
            .entry(identifier.to_string())
            .and_modify(|d| {
                d.owner = owner.to_string();
                d.spec = spec.clone();
                d.updated_at = updated_at;
            })
            .or_insert_with(|| Dataset {
                identifier: identifier.to_string(),
                owner: owner.to_string(),
                spec,
                created_at: updated_at,
                updated_at,
                scheduled_for: None,
                certified: false,
            });
        Ok(entry.clone())
    }

    fn update_dataset_schedule(
        &self,
        identifier: &str,
        period_seconds: Option<i64>,
        now: DateTime<Utc>,
    ) -> RegistryResult<Option<DateTime<Utc>>> {
        let mut datasets = self.lock_datasets();
        let dataset = datasets
            .get_mut(identifier)
            .ok_or_else(|| RegistryError::NotFound(format!("dataset {identifier}")))?;
        let next = calculate_new_schedule(dataset.scheduled_for, period_seconds, now);
        dataset.scheduled_for = next;
        Ok(next)
    }

    fn get_expired_datasets(&self, now: DateTime<Utc>) -> RegistryResult<Vec<Dataset>> {
        Ok(self
            .lock_datasets()
            .values()
            .filter(|d| d.scheduled_for.is_some_and(|s| s <= now))
            .cloned()
            .collect())
    }

    fn num_datasets_for_owner(&self, owner: &str) -> RegistryResult<u64> {
        Ok(self.lock_datasets().values().filter(|d| d.owner == owner).count() as u64)
    }

    fn create_revision(
        &self,
        dataset_id: &str,
        now: DateTime<Utc>,
        status: PipelineState,
        errors: Value,
    ) -> RegistryResult<DatasetRevision> {
        let mut revisions = self.lock_revisions();
        let next_revision = revisions
            .values()
            .filter(|r| r.dataset_id == dataset_id)
            .map(|r| r.revision)
            .max()
            .map(|m| m + 1)
            .unwrap_or(1);
        let revision_id = format_identifier([dataset_id.to_string(), next_revision.to_string()]);
        let row = DatasetRevision {
            revision_id: revision_id.clone(),
            dataset_id: dataset_id.to_string(),
            revision: next_revision,
            status,
            errors,
            stats: Value::Object(Default::default()),
            logs: Value::Array(vec![]),
            pipelines: Default::default(),
            created_at: now,
            updated_at: now,
        };
        revisions.insert(revision_id, row.clone());
        Ok(row)
    }

    fn get_revision(&self, dataset_id: &str, which: RevisionKey) -> RegistryResult<Option<DatasetRevision>> {
        let revisions = self.lock_revisions();
        let matching = revisions.values().filter(|r| r.dataset_id == dataset_id);
        let found = match which {
            RevisionKey::Latest => matching.max_by_key(|r| r.revision).cloned(),
            RevisionKey::Successful => matching
                .filter(|r| r.status == PipelineState::Success)
                .max_by_key(|r| r.revision)
                .cloned(),
            RevisionKey::Exact(n) => matching.find(|r| r.revision == n).cloned(),
        };
        Ok(found)
    }

    fn get_revision_by_id(&self, revision_id: &str) -> RegistryResult<Option<DatasetRevision>> {
        Ok(self.lock_revisions().get(revision_id).cloned())
    }

    fn update_revision(&self, revision_id: &str, patch: RevisionPatch) -> RegistryResult<DatasetRevision> {
        let mut revisions = self.lock_revisions();
        let row = revisions
            .get_mut(revision_id)
            .ok_or_else(|| RegistryError::NotFound(format!("revision {revision_id}")))?;
        if let Some(status) = patch.status {
            row.status = status;
        }
        if let Some(errors) = patch.errors {
            row.errors = errors;
        }
        if let Some(stats) = patch.stats {
            row.stats = stats;
        }
        if let Some(logs) = patch.logs {
            row.logs = logs;
        }
        if let Some(pipelines) = patch.pipelines {
            row.pipelines = pipelines;
        }
        row.updated_at = patch.updated_at;
        Ok(row.clone())
    }

    fn save_pipeline(&self, pipeline: Pipeline) -> RegistryResult<()> {
        self.lock_pipelines().insert(pipeline.pipeline_id.clone(), pipeline);
        Ok(())
    }

    fn get_pipeline(&self, pipeline_id: &str) -> RegistryResult<Option<Pipeline>> {
        Ok(self.lock_pipelines().get(pipeline_id).cloned())
    }

    fn list_pipelines_by_id(&self, flow_id: &str) -> RegistryResult<Vec<Pipeline>> {
        Ok(self.lock_pipelines().values().filter(|p| p.flow_id == flow_id).cloned().collect())
    }

    fn list_pipelines_by_flow_and_status(
        &self,
        flow_id: &str,
        status: PipelineState,
    ) -> RegistryResult<Vec<Pipeline>> {
        Ok(self
            .lock_pipelines()
            .values()
            .filter(|p| p.flow_id == flow_id && p.status == status)
            .cloned()
            .collect())
    }

    fn update_pipeline(&self, pipeline_id: &str, patch: PipelinePatch) -> RegistryResult<bool> {
        let mut pipelines = self.lock_pipelines();
        let Some(row) = pipelines.get_mut(pipeline_id) else {
            return Ok(false);
        };
        if let Some(status) = patch.status {
            row.status = status;
        }
        if let Some(errors) = patch.errors {
            row.errors = errors;
        }
        if let Some(stats) = patch.stats {
            row.stats = stats;
        }
        if let Some(logs) = patch.logs {
            row.logs = logs;
        }
        row.updated_at = patch.updated_at;
        Ok(true)
    }

    fn delete_pipelines(&self, flow_id: &str) -> RegistryResult<()> {
        self.lock_pipelines().retain(|_, p| p.flow_id != flow_id);
        Ok(())
    }

    fn check_flow_status(&self, flow_id: &str) -> RegistryResult<PipelineState> {
        let pipelines = self.lock_pipelines();
        let mut any_running = false;
        let mut any_pending = false;
        let mut any_success = false;
        let mut any_failed = false;
        for p in pipelines.values().filter(|p| p.flow_id == flow_id) {
            match p.status {
                PipelineState::Running => any_running = true,
                PipelineState::Pending => any_pending = true,
                PipelineState::Success => any_success = true,
                PipelineState::Failed => any_failed = true,
            }
        }
        Ok(flow_domain::status::aggregate_flow_status(any_running, any_pending, any_success, any_failed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn create_or_update_dataset_sets_created_at_once() {
        let reg = InMemoryFlowRegistry::new();
        let d1 = reg.create_or_update_dataset("me/id", "me", json!({}), now()).unwrap();
        assert_eq!(d1.created_at, now());
        let later = now() + chrono::Duration::seconds(10);
        let d2 = reg.create_or_update_dataset("me/id", "me", json!({"a": 1}), later).unwrap();
        assert_eq!(d2.created_at, now());
        assert_eq!(d2.updated_at, later);
    }

    #[test]
    fn revisions_are_monotonic_per_dataset() {
        let reg = InMemoryFlowRegistry::new();
        let r1 = reg.create_revision("me/id", now(), PipelineState::Pending, json!([])).unwrap();
        let r2 = reg.create_revision("me/id", now(), PipelineState::Pending, json!([])).unwrap();
        assert_eq!(r1.revision, 1);
        assert_eq!(r2.revision, 2);
        assert_eq!(r2.revision_id, "me/id/2");
    }

    #[test]
    fn get_revision_variants() {
        let reg = InMemoryFlowRegistry::new();
        reg.create_revision("me/id", now(), PipelineState::Failed, json!([])).unwrap();
        let r2 = reg.create_revision("me/id", now(), PipelineState::Success, json!([])).unwrap();
        reg.create_revision("me/id", now(), PipelineState::Pending, json!([])).unwrap();

        assert_eq!(reg.get_revision("me/id", RevisionKey::Latest).unwrap().unwrap().revision, 3);
        assert_eq!(
            reg.get_revision("me/id", RevisionKey::Successful).unwrap().unwrap().revision_id,
            r2.revision_id
        );
        assert_eq!(reg.get_revision("me/id", RevisionKey::Exact(1)).unwrap().unwrap().revision, 1);
        assert!(reg.get_revision("me/id", RevisionKey::Exact(99)).unwrap().is_none());
    }

    #[test]
    fn check_flow_status_matches_table() {
        let reg = InMemoryFlowRegistry::new();
        let mk = |id: &str, status: PipelineState| Pipeline {
            pipeline_id: id.to_string(),
            flow_id: "f".to_string(),
            title: None,
            pipeline_details: json!({}),
            status,
            errors: json!([]),
            stats: json!({}),
            logs: json!([]),
            created_at: now(),
            updated_at: now(),
        };
        reg.save_pipeline(mk("a", PipelineState::Pending)).unwrap();
        assert_eq!(reg.check_flow_status("f").unwrap(), PipelineState::Pending);

        reg.save_pipeline(mk("b", PipelineState::Success)).unwrap();
        assert_eq!(reg.check_flow_status("f").unwrap(), PipelineState::Running);

        reg.update_pipeline("a", PipelinePatch { status: Some(PipelineState::Success), ..PipelinePatch::touch(now()) })
            .unwrap();
        assert_eq!(reg.check_flow_status("f").unwrap(), PipelineState::Success);
    }
}
