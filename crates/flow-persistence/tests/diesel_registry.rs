use flow::registry::FlowRegistry;
use flow_domain::{PipelineState, RevisionKey};
use flow_persistence::{new_pool, DieselFlowRegistry};
use serde_json::json;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_db_url(label: &str) -> String {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    std::env::temp_dir().join(format!("flowmanager_test_{label}_{nanos}.db")).to_str().unwrap().to_string()
}

fn registry(label: &str) -> DieselFlowRegistry {
    let url = temp_db_url(label);
    let pool = new_pool(&url).expect("pool + migrations");
    DieselFlowRegistry::new(pool)
}

#[test]
fn dataset_create_then_update_keeps_created_at() {
    let reg = registry("dataset");
    let now = chrono::Utc::now();
    let d1 = reg.create_or_update_dataset("me/ds", "me", json!({"a": 1}), now).unwrap();
    assert_eq!(d1.created_at, d1.updated_at);

    let later = now + chrono::Duration::seconds(60);
    let d2 = reg.create_or_update_dataset("me/ds", "me", json!({"a": 2}), later).unwrap();
    assert_eq!(d2.created_at.timestamp(), now.timestamp());
    assert_eq!(d2.updated_at.timestamp(), later.timestamp());
    assert_eq!(d2.spec, json!({"a": 2}));
}

#[test]
fn revision_allocation_is_monotonic_per_dataset() {
    let reg = registry("revisions");
    let now = chrono::Utc::now();
    reg.create_or_update_dataset("me/ds", "me", json!({}), now).unwrap();
    let r1 = reg.create_revision("me/ds", now, PipelineState::Pending, json!(null)).unwrap();
    let r2 = reg.create_revision("me/ds", now, PipelineState::Pending, json!(null)).unwrap();
    assert_eq!(r1.revision, 1);
    assert_eq!(r2.revision, 2);
    assert_eq!(r2.revision_id, "me/ds/2");

    let latest = reg.get_revision("me/ds", RevisionKey::Latest).unwrap().unwrap();
    assert_eq!(latest.revision, 2);
    let exact = reg.get_revision("me/ds", RevisionKey::Exact(1)).unwrap().unwrap();
    assert_eq!(exact.revision_id, r1.revision_id);
}

#[test]
fn check_flow_status_reflects_pipeline_rows() {
    use flow::patch::PipelinePatch;
    use flow_domain::Pipeline;

    let reg = registry("status");
    let now = chrono::Utc::now();
    let mk = |id: &str, status: PipelineState| Pipeline {
        pipeline_id: id.to_string(),
        flow_id: "flow-1".to_string(),
        title: None,
        pipeline_details: json!({}),
        status,
        errors: json!(null),
        stats: json!({}),
        logs: json!([]),
        created_at: now,
        updated_at: now,
    };
    reg.save_pipeline(mk("p1", PipelineState::Pending)).unwrap();
    reg.save_pipeline(mk("p2", PipelineState::Pending)).unwrap();
    assert_eq!(reg.check_flow_status("flow-1").unwrap(), PipelineState::Pending);

    let mut patch = PipelinePatch::touch(now);
    patch.status = Some(PipelineState::Running);
    reg.update_pipeline("p1", patch).unwrap();
    assert_eq!(reg.check_flow_status("flow-1").unwrap(), PipelineState::Running);

    let mut patch = PipelinePatch::touch(now);
    patch.status = Some(PipelineState::Failed);
    reg.update_pipeline("p1", patch.clone()).unwrap();
    reg.update_pipeline("p2", patch).unwrap();
    assert_eq!(reg.check_flow_status("flow-1").unwrap(), PipelineState::Failed);

    reg.delete_pipelines("flow-1").unwrap();
    assert!(reg.list_pipelines_by_id("flow-1").unwrap().is_empty());
}

#[test]
fn update_dataset_schedule_not_found_is_an_error() {
    let reg = registry("schedule-missing");
    let now = chrono::Utc::now();
    let err = reg.update_dataset_schedule("ghost/ds", Some(3600), now).unwrap_err();
    match err {
        flow::RegistryError::NotFound(_) => {}
        other => panic!("expected NotFound, got {other:?}"),
    }
}
