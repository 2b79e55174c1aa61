//! §4.D status reducer: applies a single pipeline-status callback,
//! cascades failure to pending dependants, recomputes the flow status,
//! and — on a terminal flow status — deletes the pipeline rows, emits
//! the termination event, files an incident on failure, and schedules
//! a catalog re-index (§4.G).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use flow::patch::{PipelinePatch, RevisionPatch};
use flow::FlowRegistry;
use flow_domain::{strip_dot_slash, DatasetRevision, PipelineSnapshot, PipelineState, RevisionKey, SpecMeta};
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;

use crate::fanout::FanoutService;
use crate::ports::{FlowEvent, Incident};

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ReducerOutcome {
    pub status: Option<PipelineState>,
    pub id: Option<String>,
    pub errors: Vec<String>,
}

impl ReducerOutcome {
    fn not_found() -> Self {
        Self { status: None, id: None, errors: vec!["pipeline not found".to_string()] }
    }

    fn storage_error(flow_id: String, message: String) -> Self {
        Self { status: None, id: Some(flow_id), errors: vec![message] }
    }
}

/// Per-flow mutual exclusion around the reducer (§5, §9 design note):
/// a lazily-populated table of keyed async mutexes. Entries are never
/// removed — acceptable for a process's lifetime worth of distinct
/// flow ids.
pub struct StatusReducer {
    registry: Arc<dyn FlowRegistry>,
    fanout: Arc<FanoutService>,
    locks: DashMap<String, Arc<AsyncMutex<()>>>,
}

impl StatusReducer {
    pub fn new(registry: Arc<dyn FlowRegistry>, fanout: Arc<FanoutService>) -> Self {
        Self { registry, fanout, locks: DashMap::new() }
    }

    fn lock_for(&self, flow_id: &str) -> Arc<AsyncMutex<()>> {
        self.locks.entry(flow_id.to_string()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
    }

    /// Entry point for a runner/HTTP callback. Resolves the owning flow,
    /// acquires that flow's lock for the whole cascade, then delegates
    /// to the lock-free `apply_locked` — a cascade re-enters this flow's
    /// pipelines without ever trying to reacquire the lock it already
    /// holds.
    pub async fn apply(
        &self,
        raw_pipeline_id: &str,
        event: &str,
        success: Option<bool>,
        errors: Option<Value>,
        stats: Option<Value>,
        logs: Option<Value>,
        now: DateTime<Utc>,
    ) -> ReducerOutcome {
        let pipeline_id = strip_dot_slash(raw_pipeline_id).to_string();
        let Ok(Some(flow_id)) = self.registry.get_flow_id(&pipeline_id) else {
            return ReducerOutcome::not_found();
        };
        let lock = self.lock_for(&flow_id);
        let _guard = lock.lock().await;
        self.apply_locked(&pipeline_id, event, success, errors, stats, logs, now)
    }

    fn apply_locked(
        &self,
        pipeline_id: &str,
        event: &str,
        success: Option<bool>,
        errors: Option<Value>,
        stats: Option<Value>,
        logs: Option<Value>,
        now: DateTime<Utc>,
    ) -> ReducerOutcome {
        let Ok(Some(pipeline)) = self.registry.get_pipeline(pipeline_id) else {
            return ReducerOutcome::not_found();
        };
        let flow_id = pipeline.flow_id.clone();

        let pipeline_status = classify(event, success);
        let errors_val = errors.unwrap_or_else(|| Value::Array(vec![]));
        let stats_val = stats.unwrap_or_else(|| Value::Object(Default::default()));
        let logs_val = logs.unwrap_or_else(|| Value::Array(vec![]));

        let mut patch = PipelinePatch::touch(now);
        patch.status = Some(pipeline_status);
        patch.errors = Some(errors_val.clone());
        patch.stats = Some(stats_val.clone());
        patch.logs = Some(logs_val.clone());
        match self.registry.update_pipeline(pipeline_id, patch) {
            Ok(true) => {}
            Ok(false) => return ReducerOutcome::not_found(),
            Err(e) => return ReducerOutcome::storage_error(flow_id, e.to_string()),
        }

        // §5: read after the triggering patch is committed, but before any
        // cascade. A cascade that itself terminalizes the flow deletes the
        // pipeline rows in `on_terminal`; re-deriving this frame's status
        // from the now-empty set would misclassify it as `success` and
        // double-emit the terminal event. `original_source/flowmanager/
        // controllers.py:150` computes `flow_status` before calling
        // `update_dependants` for the same reason.
        let flow_status = match self.registry.check_flow_status(&flow_id) {
            Ok(status) => status,
            Err(e) => return ReducerOutcome::storage_error(flow_id, e.to_string()),
        };

        if pipeline_status == PipelineState::Failed {
            self.cascade(&flow_id, pipeline_id, now);
        }

        let revision = match self.registry.get_revision_by_id(&flow_id) {
            Ok(Some(r)) => r,
            Ok(None) => return ReducerOutcome::storage_error(flow_id, "revision not found".to_string()),
            Err(e) => return ReducerOutcome::storage_error(flow_id, e.to_string()),
        };

        let mut snapshot = revision.pipelines.clone();
        snapshot.insert(
            pipeline_id.to_string(),
            PipelineSnapshot {
                title: pipeline.title.clone(),
                status: pipeline_status.to_snapshot_status(),
                stats: stats_val.clone(),
                error_log: errors_val.clone(),
            },
        );

        let mut rev_patch = RevisionPatch::touch(now);
        rev_patch.status = Some(flow_status);
        rev_patch.pipelines = Some(snapshot);
        if is_truthy(&errors_val) {
            rev_patch.errors = Some(errors_val);
        }
        if is_truthy(&stats_val) {
            rev_patch.stats = Some(stats_val);
        }
        if is_truthy(&logs_val) {
            rev_patch.logs = Some(logs_val);
        }

        let updated_revision = match self.registry.update_revision(&revision.revision_id, rev_patch) {
            Ok(r) => r,
            Err(e) => return ReducerOutcome::storage_error(flow_id, e.to_string()),
        };

        let terminal = matches!(flow_status, PipelineState::Success | PipelineState::Failed);
        if terminal {
            self.on_terminal(&updated_revision, pipeline_id, event, flow_status);
        }

        let has_successful =
            matches!(self.registry.get_revision(&updated_revision.dataset_id, RevisionKey::Successful), Ok(Some(_)));
        if flow_status == PipelineState::Success || !has_successful {
            self.fanout.index_dataset(updated_revision.dataset_id.clone(), flow_id.clone(), !has_successful);
        }

        ReducerOutcome { status: Some(flow_status), id: Some(flow_id), errors: vec![] }
    }

    fn on_terminal(&self, revision: &DatasetRevision, pipeline_id: &str, event: &str, flow_status: PipelineState) {
        if let Err(e) = self.registry.delete_pipelines(&revision.revision_id) {
            tracing::warn!(flow_id = %revision.revision_id, error = %e, "failed to delete terminal pipeline rows");
        }

        let Ok(Some(dataset)) = self.registry.get_dataset(&revision.dataset_id) else {
            tracing::warn!(dataset_id = %revision.dataset_id, "dataset missing for terminal flow");
            return;
        };
        let meta = SpecMeta::from_spec(&dataset.spec);
        let findability =
            if flow_status == PipelineState::Success && meta.findability.as_deref() == Some("published") {
                "published"
            } else {
                "private"
            };
        self.fanout.emit_event(FlowEvent {
            source: "flow",
            event: event.to_string(),
            outcome: if flow_status == PipelineState::Success { "OK" } else { "FAIL" },
            findability,
            actor: dataset.owner.clone(),
            dataset: meta.dataset.clone().unwrap_or_default(),
            owner: meta.owner.clone().unwrap_or_default(),
            ownerid: meta.ownerid.clone().unwrap_or_default(),
            flow_id: revision.revision_id.clone(),
            pipeline_id: Some(pipeline_id.to_string()),
            payload: serde_json::json!({"flow-id": revision.revision_id, "errors": revision.errors}),
        });

        if flow_status == PipelineState::Failed {
            self.fanout.emit_incident(Incident {
                title: format!("Flow {} failed", revision.revision_id),
                owner: dataset.owner.clone(),
                errors: revision.errors.clone(),
            });
        }
    }

    /// §4.D step 2: for every still-pending pipeline in the flow whose
    /// recorded dependencies include the pipeline that just failed,
    /// recurse with a synthesized failure event. Pending pipelines are
    /// processed in `pipeline_id` order rather than storage-return
    /// order: a pipeline can be a direct dependent of more than one
    /// failure in the same cascade (e.g. a sink depending on everything
    /// upstream), and a stable order keeps which upstream failure ends
    /// up recorded on it deterministic instead of a storage-order race.
    /// The message concatenation (`"successfully" + "executed"`, no
    /// separator) is preserved verbatim (§9 open question 1).
    fn cascade(&self, flow_id: &str, failed_pipeline_id: &str, now: DateTime<Utc>) {
        let Ok(mut pendings) = self.registry.list_pipelines_by_flow_and_status(flow_id, PipelineState::Pending)
        else {
            return;
        };
        pendings.sort_by(|a, b| a.pipeline_id.cmp(&b.pipeline_id));
        for pending in pendings {
            let depends_on_failed = pending.dependencies().iter().any(|d| d.pipeline == failed_pipeline_id);
            if !depends_on_failed {
                continue;
            }
            let message = format!(
                "Dependency unsuccessful. Cannot run until dependency \"{failed_pipeline_id}\" is successfullyexecuted"
            );
            self.apply_locked(
                &pending.pipeline_id,
                "finish",
                Some(false),
                Some(Value::Array(vec![Value::String(message)])),
                None,
                None,
                now,
            );
        }
    }
}

/// §4.D's `pipeline_status` mapping, read off the callback's
/// `(event, success)` pair: `queue` is pending, `finish` is terminal
/// (success/failed per `success`), anything else is running.
fn classify(event: &str, success: Option<bool>) -> PipelineState {
    match event {
        "finish" => {
            if success.unwrap_or(false) {
                PipelineState::Success
            } else {
                PipelineState::Failed
            }
        }
        "queue" => PipelineState::Pending,
        _ => PipelineState::Running,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::String(s) => !s.is_empty(),
        Value::Number(_) => true,
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn classify_matches_the_event_success_table() {
        use super::classify;
        use flow_domain::PipelineState;

        assert_eq!(classify("queue", None), PipelineState::Pending);
        assert_eq!(classify("progress", None), PipelineState::Running);
        assert_eq!(classify("finish", Some(true)), PipelineState::Success);
        assert_eq!(classify("finish", Some(false)), PipelineState::Failed);
        assert_eq!(classify("finish", None), PipelineState::Failed);
    }

    #[test]
    fn truthiness_matches_the_overlay_rule() {
        use super::is_truthy;
        use serde_json::json;

        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!([])));
        assert!(!is_truthy(&json!({})));
        assert!(!is_truthy(&json!("")));
        assert!(is_truthy(&json!([1])));
        assert!(is_truthy(&json!({"a": 1})));
        assert!(is_truthy(&json!("x")));
    }
}
