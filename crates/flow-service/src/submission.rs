//! §4.C submission service: `upload(token, contents, registry, verifyer)`.
//! Auth/quota validation lives here; the internal submission path
//! (persist dataset/revision/pipelines, dispatch to the runner) is
//! shared between an authorized HTTP upload and the scheduler's
//! trusted resubmission (§4.E, which bypasses steps 1-4 entirely).

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use flow::registry::format_identifier;
use flow::FlowRegistry;
use flow_domain::{set_spec_time_field, strip_dot_slash, Pipeline, PipelineState, SpecMeta};
use serde_json::{json, Value};

use crate::fanout::FanoutService;
use crate::ports::{Incident, PipelineRunner, Planner, PlannerError, RunnerEvent, Verifyer};
use crate::reducer::StatusReducer;

/// The allowed `source/derived` type whitelist handed to the planner
/// (§4.C step 6).
fn default_allowed_types() -> HashSet<String> {
    [
        "derived/report",
        "derived/csv",
        "derived/json",
        "derived/zip",
        "derived/preview",
        "source/tabular",
        "source/non-tabular",
        "original",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct UploadOutcome {
    pub success: bool,
    pub dataset_id: Option<String>,
    pub flow_id: Option<String>,
    pub errors: Vec<String>,
}

impl UploadOutcome {
    fn rejected(errors: Vec<String>) -> Self {
        Self { success: false, dataset_id: None, flow_id: None, errors }
    }
}

pub struct SubmissionService {
    registry: Arc<dyn FlowRegistry>,
    verifyer: Arc<dyn Verifyer>,
    planner: Arc<dyn Planner>,
    runner: Arc<dyn PipelineRunner>,
    reducer: Arc<StatusReducer>,
    fanout: Arc<FanoutService>,
    allowed_types: HashSet<String>,
}

impl SubmissionService {
    pub fn new(
        registry: Arc<dyn FlowRegistry>,
        verifyer: Arc<dyn Verifyer>,
        planner: Arc<dyn Planner>,
        runner: Arc<dyn PipelineRunner>,
        reducer: Arc<StatusReducer>,
        fanout: Arc<FanoutService>,
    ) -> Self {
        Self { registry, verifyer, planner, runner, reducer, fanout, allowed_types: default_allowed_types() }
    }

    /// §4.C: authorization, quota, then the internal submission path.
    /// `contents` is `None` for an absent/unparseable request body.
    pub async fn upload(&self, token: &str, contents: Option<Value>, now: DateTime<Utc>) -> UploadOutcome {
        let Some(contents) = contents else {
            return UploadOutcome::rejected(vec![
                "Received empty contents (make sure your content-type is correct)".to_string(),
            ]);
        };

        let meta = SpecMeta::from_spec(&contents);
        let Some(ownerid) = meta.ownerid.clone() else {
            return UploadOutcome::rejected(vec!["Missing owner in spec".to_string()]);
        };

        let identity = match self.verifyer.extract_permissions(token) {
            Some(identity) if identity.userid == ownerid => identity,
            _ => return UploadOutcome::rejected(vec!["No token or token not authorised for owner".to_string()]),
        };

        let dataset_name = meta.dataset.clone().unwrap_or_default();
        let dataset_id = format_identifier([ownerid.clone(), dataset_name]);
        let is_new = matches!(self.registry.get_dataset(&dataset_id), Ok(None));
        if is_new {
            let owned = self.registry.num_datasets_for_owner(&ownerid).unwrap_or(0);
            if owned >= identity.permissions.max_dataset_num {
                return UploadOutcome::rejected(vec![format!(
                    "Max datasets for user exceeded plan limit ({})",
                    identity.permissions.max_dataset_num
                )]);
            }
        }

        let (dataset_id, flow_id, errors) = self.submit_internal(&ownerid, contents, now).await;
        UploadOutcome { success: errors.is_empty(), dataset_id: Some(dataset_id), flow_id, errors }
    }

    /// §4.E: the scheduler trusts the dataset's stored spec and skips
    /// auth/quota entirely, but runs the same internal submission path.
    pub async fn submit_trusted(&self, owner: &str, contents: Value, now: DateTime<Utc>) -> (String, Option<String>, Vec<String>) {
        self.submit_internal(owner, contents, now).await
    }

    /// §4.C steps 1-8 of `_internal_upload`: stamp `update_time`,
    /// upsert the dataset, parse/advance its schedule, create a new
    /// revision, plan it, persist the resulting pipelines, and dispatch
    /// to the runner. Any error collected along the way short-circuits
    /// the remaining steps; a non-empty result files a "failed to
    /// start" incident regardless of which step produced it.
    async fn submit_internal(&self, owner: &str, mut contents: Value, now: DateTime<Utc>) -> (String, Option<String>, Vec<String>) {
        set_spec_time_field(&mut contents, "update_time", now);

        let dataset_name = SpecMeta::from_spec(&contents).dataset.unwrap_or_default();
        let dataset_id = format_identifier([owner.to_string(), dataset_name]);

        let dataset = match self.registry.create_or_update_dataset(&dataset_id, owner, contents.clone(), now) {
            Ok(d) => d,
            Err(e) => return self.fail(owner, dataset_id, None, vec![format!("Unexpected error: {e}")]),
        };
        set_spec_time_field(&mut contents, "create_time", dataset.created_at);

        let (period, schedule_errors) = flow_domain::parse_schedule(&contents);
        if !schedule_errors.is_empty() {
            return self.fail(owner, dataset_id, None, schedule_errors);
        }
        if let Err(e) = self.registry.update_dataset_schedule(&dataset_id, period, now) {
            return self.fail(owner, dataset_id, None, vec![format!("Unexpected error: {e}")]);
        }

        let revision = match self.registry.create_revision(&dataset_id, now, PipelineState::Pending, json!([])) {
            Ok(r) => r,
            Err(e) => return self.fail(owner, dataset_id, None, vec![format!("Unexpected error: {e}")]),
        };
        let flow_id = revision.revision_id.clone();

        let planned = match self.planner.plan(revision.revision, &contents, &self.allowed_types) {
            Ok(p) => p,
            Err(PlannerError::Validation(_)) => {
                return self.fail(owner, dataset_id, Some(flow_id), vec!["Validation failed for contents".to_string()])
            }
            Err(PlannerError::Unexpected(msg)) => {
                return self.fail(owner, dataset_id, Some(flow_id), vec![format!("Unexpected error: {msg}")])
            }
        };

        for planned_pipeline in &planned {
            let title = planned_pipeline.details.get("title").and_then(Value::as_str).map(str::to_string);
            let pipeline = Pipeline {
                pipeline_id: strip_dot_slash(&planned_pipeline.pipeline_id).to_string(),
                flow_id: flow_id.clone(),
                title,
                pipeline_details: planned_pipeline.details.clone(),
                status: PipelineState::Pending,
                errors: json!([]),
                stats: json!({}),
                logs: json!([]),
                created_at: now,
                updated_at: now,
            };
            if let Err(e) = self.registry.save_pipeline(pipeline) {
                return self.fail(owner, dataset_id, Some(flow_id), vec![format!("Unexpected error: {e}")]);
            }
        }

        self.dispatch(&flow_id, &planned);
        (dataset_id, Some(flow_id), vec![])
    }

    fn fail(&self, owner: &str, dataset_id: String, flow_id: Option<String>, errors: Vec<String>) -> (String, Option<String>, Vec<String>) {
        self.fanout.emit_incident(Incident {
            title: "Failed to start flow".to_string(),
            owner: owner.to_string(),
            errors: json!(errors),
        });
        (dataset_id, flow_id, errors)
    }

    /// Bridges the runner's synchronous callback into the async
    /// reducer: every callback invocation is spawned as its own task so
    /// `runner.start` (called inline, on this task) never blocks on a
    /// registry round trip. The reducer's own per-flow lock (§5) keeps
    /// these concurrently-spawned callbacks ordered correctly.
    fn dispatch(&self, flow_id: &str, planned: &[crate::ports::PlannedPipeline]) {
        let reducer = self.reducer.clone();
        let callback: Arc<dyn Fn(RunnerEvent) + Send + Sync> = Arc::new(move |event: RunnerEvent| {
            let reducer = reducer.clone();
            tokio::spawn(async move {
                reducer
                    .apply(&event.pipeline_id, event.event, event.success, event.errors, event.stats, None, Utc::now())
                    .await;
            });
        });
        self.runner.start(flow_id, planned, callback);
    }
}
