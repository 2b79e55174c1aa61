//! The `FlowRegistry` trait: §4.B's operations, as a contract any
//! storage backend (in-memory, SQL) must satisfy. Every method is
//! documented as executing inside its own transactional scope — a
//! concrete implementation opens a transaction at the top of the call
//! and commits on `Ok`/rolls back on `Err` (§5).

use chrono::{DateTime, Utc};
use flow_domain::{Dataset, DatasetRevision, Pipeline, PipelineState, RevisionKey};
use serde_json::Value;

use crate::errors::RegistryResult;
use crate::patch::{PipelinePatch, RevisionPatch};

/// Slash-joins stringified parts. Deterministic, no escaping — matches
/// `FlowRegistry.format_identifier` in the original implementation.
pub fn format_identifier<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: std::fmt::Display,
{
    parts.into_iter().map(|p| p.to_string()).collect::<Vec<_>>().join("/")
}

pub trait FlowRegistry: Send + Sync {
    // -- Datasets --------------------------------------------------

    fn get_dataset(&self, identifier: &str) -> RegistryResult<Option<Dataset>>;

    /// Inserts if absent (`created_at := updated_at`), else updates
    /// `owner`/`spec`/`updated_at` in place. Returns the resulting row.
    fn create_or_update_dataset(
        &self,
        identifier: &str,
        owner: &str,
        spec: Value,
        updated_at: DateTime<Utc>,
    ) -> RegistryResult<Dataset>;

    /// Reads the current `scheduled_for`, computes the next slot via
    /// `flow_domain::calculate_new_schedule`, writes it back.
    fn update_dataset_schedule(
        &self,
        identifier: &str,
        period_seconds: Option<i64>,
        now: DateTime<Utc>,
    ) -> RegistryResult<Option<DateTime<Utc>>>;

    /// All datasets with `scheduled_for <= now`.
    fn get_expired_datasets(&self, now: DateTime<Utc>) -> RegistryResult<Vec<Dataset>>;

    /// Number of datasets owned by `owner` (§4.C quota check).
    fn num_datasets_for_owner(&self, owner: &str) -> RegistryResult<u64>;

    // -- Revisions ---------------------------------------------------

    /// Allocates `revision := 1 + max(revision) for this dataset_id`.
    fn create_revision(
        &self,
        dataset_id: &str,
        now: DateTime<Utc>,
        status: PipelineState,
        errors: Value,
    ) -> RegistryResult<DatasetRevision>;

    fn get_revision(&self, dataset_id: &str, which: RevisionKey) -> RegistryResult<Option<DatasetRevision>>;

    fn get_revision_by_id(&self, revision_id: &str) -> RegistryResult<Option<DatasetRevision>>;

    fn update_revision(&self, revision_id: &str, patch: RevisionPatch) -> RegistryResult<DatasetRevision>;

    // -- Pipelines -----------------------------------------------------

    fn save_pipeline(&self, pipeline: Pipeline) -> RegistryResult<()>;

    fn get_pipeline(&self, pipeline_id: &str) -> RegistryResult<Option<Pipeline>>;

    /// The `flow_id` a pipeline belongs to, if the pipeline exists.
    fn get_flow_id(&self, pipeline_id: &str) -> RegistryResult<Option<String>> {
        Ok(self.get_pipeline(pipeline_id)?.map(|p| p.flow_id))
    }

    fn list_pipelines_by_id(&self, flow_id: &str) -> RegistryResult<Vec<Pipeline>>;

    fn list_pipelines_by_flow_and_status(
        &self,
        flow_id: &str,
        status: PipelineState,
    ) -> RegistryResult<Vec<Pipeline>>;

    /// Returns `true` if the pipeline row existed (and was updated).
    fn update_pipeline(&self, pipeline_id: &str, patch: PipelinePatch) -> RegistryResult<bool>;

    fn delete_pipelines(&self, flow_id: &str) -> RegistryResult<()>;

    /// §4.B's core aggregation rule, computed after the triggering
    /// pipeline patch has been committed (§5: "must read
    /// `check_flow_status` after the pipeline patch is committed").
    fn check_flow_status(&self, flow_id: &str) -> RegistryResult<PipelineState>;
}
