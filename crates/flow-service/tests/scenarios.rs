//! End-to-end coverage of the seeded scenarios (S1-S6) and the
//! cross-cutting invariants, run against `InMemoryFlowRegistry` plus
//! the in-memory port stubs so the whole submission -> reducer ->
//! fanout pipeline runs without a database or network.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use flow::{FlowRegistry, InMemoryFlowRegistry};
use flow_domain::{PipelineState, RevisionKey};
use flow_service::ports::{
    ChannelEventBus, EchoPlanner, InMemoryDescriptorStore, InMemorySearchIndexer, NoopRunner, StaticVerifyer,
    VecIncidentReporter,
};
use flow_service::{FanoutService, StatusReducer, SubmissionService};
use serde_json::json;

fn now() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

struct Harness {
    registry: Arc<dyn FlowRegistry>,
    submission: Arc<SubmissionService>,
    reducer: Arc<StatusReducer>,
    incidents: Arc<VecIncidentReporter>,
}

fn harness() -> Harness {
    let registry: Arc<dyn FlowRegistry> = Arc::new(InMemoryFlowRegistry::new());
    let (event_bus, _rx) = ChannelEventBus::new();
    let incidents = Arc::new(VecIncidentReporter::new());
    let fanout = Arc::new(FanoutService::spawn(
        registry.clone(),
        Arc::new(InMemoryDescriptorStore::new()),
        Arc::new(event_bus),
        incidents.clone(),
        Arc::new(InMemorySearchIndexer::new()),
    ));
    let reducer = Arc::new(StatusReducer::new(registry.clone(), fanout.clone()));
    let verifyer = Arc::new(StaticVerifyer::new().with_user("tok-me", "me", 10));
    let submission = Arc::new(SubmissionService::new(
        registry.clone(),
        verifyer,
        Arc::new(EchoPlanner),
        Arc::new(NoopRunner),
        reducer.clone(),
        fanout,
    ));
    Harness { registry, submission, reducer, incidents }
}

fn spec_with_pipelines(pipelines: serde_json::Value) -> serde_json::Value {
    json!({
        "meta": {"ownerid": "me", "dataset": "id", "owner": "me", "findability": "published"},
        "pipelines": pipelines,
    })
}

fn pipeline_entry(id: &str, deps: &[&str]) -> serde_json::Value {
    json!({
        "pipeline_id": id,
        "title": id,
        "dependencies": deps.iter().map(|d| json!({"pipeline": d})).collect::<Vec<_>>(),
    })
}

/// S1: happy path submission — 7 pipelines, single upload.
#[tokio::test]
async fn s1_happy_path_submission() {
    let h = harness();
    let pipelines: Vec<_> = (0..7).map(|i| pipeline_entry(&format!("p{i}"), &[])).collect();
    let spec = spec_with_pipelines(json!(pipelines));

    let outcome = h.submission.upload("tok-me", Some(spec), now()).await;

    assert!(outcome.success, "errors: {:?}", outcome.errors);
    assert_eq!(outcome.dataset_id.as_deref(), Some("me/id"));
    assert_eq!(outcome.flow_id.as_deref(), Some("me/id/1"));

    let revision = h.registry.get_revision("me/id", RevisionKey::Exact(1)).unwrap().unwrap();
    assert_eq!(revision.revision, 1);
    assert_eq!(revision.status, PipelineState::Pending);
    assert_eq!(h.registry.list_pipelines_by_id("me/id/1").unwrap().len(), 7);
}

/// S2: a second upload for the same dataset increments the revision
/// and leaves the first revision's pipelines untouched.
#[tokio::test]
async fn s2_second_upload_increments_revision() {
    let h = harness();
    let pipelines: Vec<_> = (0..7).map(|i| pipeline_entry(&format!("p{i}"), &[])).collect();
    let spec = spec_with_pipelines(json!(pipelines));

    let first = h.submission.upload("tok-me", Some(spec.clone()), now()).await;
    assert_eq!(first.flow_id.as_deref(), Some("me/id/1"));

    let second = h.submission.upload("tok-me", Some(spec), now()).await;
    assert_eq!(second.flow_id.as_deref(), Some("me/id/2"));

    assert_eq!(h.registry.list_pipelines_by_id("me/id/1").unwrap().len(), 7);
    assert_eq!(h.registry.list_pipelines_by_id("me/id/2").unwrap().len(), 7);
}

/// S3: terminal success deletes pipeline rows and records both
/// pipelines as SUCCEEDED in the revision snapshot.
#[tokio::test]
async fn s3_terminal_success() {
    let h = harness();
    let spec =
        spec_with_pipelines(json!([pipeline_entry("me/id", &[]), pipeline_entry("me/id:non-tabular", &[])]));
    let outcome = h.submission.upload("tok-me", Some(spec), now()).await;
    let flow_id = outcome.flow_id.clone().unwrap();

    let r1 = h.reducer.apply("me/id", "finish", Some(true), None, None, None, now()).await;
    assert_eq!(r1.status, Some(PipelineState::Running));

    let r2 = h.reducer.apply("me/id:non-tabular", "finish", Some(true), None, None, None, now()).await;
    assert_eq!(r2.status, Some(PipelineState::Success));

    let revision = h.registry.get_revision_by_id(&flow_id).unwrap().unwrap();
    assert_eq!(revision.status, PipelineState::Success);
    assert!(h.registry.list_pipelines_by_id(&flow_id).unwrap().is_empty());
    assert_eq!(revision.pipelines["me/id"].status.to_string(), "SUCCEEDED");
    assert_eq!(revision.pipelines["me/id:non-tabular"].status.to_string(), "SUCCEEDED");
}

/// S4: cascade failure propagates to every dependant, preserving the
/// exact "successfullyexecuted" concatenation.
#[tokio::test]
async fn s4_cascade_failure() {
    let h = harness();
    let spec = spec_with_pipelines(json!([
        pipeline_entry("me/id:csv", &[]),
        pipeline_entry("me/id:json", &[]),
        pipeline_entry("me/id:preview", &["me/id:json"]),
        pipeline_entry("me/id:zip", &["me/id:csv"]),
        pipeline_entry("me/id", &["me/id:csv", "me/id:json", "me/id:preview", "me/id:zip"]),
    ]));
    let outcome = h.submission.upload("tok-me", Some(spec), now()).await;
    let flow_id = outcome.flow_id.clone().unwrap();

    h.reducer.apply("me/id:json", "finish", Some(true), None, None, None, now()).await;
    h.reducer.apply("me/id:csv", "finish", Some(false), None, None, None, now()).await;
    let r3 = h.reducer.apply("me/id:preview", "finish", Some(true), None, None, None, now()).await;

    assert_eq!(r3.status, Some(PipelineState::Failed));

    let revision = h.registry.get_revision_by_id(&flow_id).unwrap().unwrap();
    assert_eq!(revision.status, PipelineState::Failed);
    assert!(h.registry.list_pipelines_by_id(&flow_id).unwrap().is_empty());

    let expected =
        "Dependency unsuccessful. Cannot run until dependency \"me/id:csv\" is successfullyexecuted";
    assert_eq!(revision.pipelines["me/id:zip"].status.to_string(), "FAILED");
    assert_eq!(revision.pipelines["me/id:zip"].error_log, json!([expected]));
    assert_eq!(revision.pipelines["me/id"].status.to_string(), "FAILED");
    assert_eq!(revision.pipelines["me/id"].error_log, json!([expected]));

    assert_eq!(h.incidents.incidents().len(), 1);
}

/// Invariant: an update for an unknown pipeline id reports "not found"
/// without mutating anything.
#[tokio::test]
async fn unknown_pipeline_reports_not_found() {
    let h = harness();
    let outcome = h.reducer.apply("nope", "finish", Some(true), None, None, None, now()).await;
    assert_eq!(outcome.status, None);
    assert_eq!(outcome.errors, vec!["pipeline not found".to_string()]);
}

/// Missing owner short-circuits before any dataset/revision is created.
#[tokio::test]
async fn upload_rejects_missing_owner() {
    let h = harness();
    let outcome = h.submission.upload("tok-me", Some(json!({"meta": {}})), now()).await;
    assert!(!outcome.success);
    assert_eq!(outcome.errors, vec!["Missing owner in spec".to_string()]);
    assert!(outcome.dataset_id.is_none());
}

/// Token/owner mismatch is rejected before touching the registry.
#[tokio::test]
async fn upload_rejects_unauthorised_token() {
    let h = harness();
    let spec = json!({"meta": {"ownerid": "someone-else", "dataset": "id"}});
    let outcome = h.submission.upload("tok-me", Some(spec), now()).await;
    assert!(!outcome.success);
    assert_eq!(outcome.errors, vec!["No token or token not authorised for owner".to_string()]);
}

/// Quota is enforced only for brand-new datasets.
#[tokio::test]
async fn upload_enforces_quota_for_new_datasets_only() {
    let registry: Arc<dyn FlowRegistry> = Arc::new(InMemoryFlowRegistry::new());
    let (event_bus, _rx) = ChannelEventBus::new();
    let fanout = Arc::new(FanoutService::spawn(
        registry.clone(),
        Arc::new(InMemoryDescriptorStore::new()),
        Arc::new(event_bus),
        Arc::new(VecIncidentReporter::new()),
        Arc::new(InMemorySearchIndexer::new()),
    ));
    let reducer = Arc::new(StatusReducer::new(registry.clone(), fanout.clone()));
    let verifyer = Arc::new(StaticVerifyer::new().with_user("tok-me", "me", 1));
    let submission = Arc::new(SubmissionService::new(
        registry.clone(),
        verifyer,
        Arc::new(EchoPlanner),
        Arc::new(NoopRunner),
        reducer,
        fanout,
    ));

    let first = submission.upload("tok-me", Some(spec_with_pipelines(json!(null))), now()).await;
    assert!(first.success, "errors: {:?}", first.errors);

    let second_spec = json!({"meta": {"ownerid": "me", "dataset": "id2"}});
    let second = submission.upload("tok-me", Some(second_spec), now()).await;
    assert!(!second.success);
    assert_eq!(second.errors, vec!["Max datasets for user exceeded plan limit (1)".to_string()]);

    // Updating the existing dataset again is always allowed.
    let resubmit = submission.upload("tok-me", Some(spec_with_pipelines(json!(null))), now()).await;
    assert!(resubmit.success);
}
