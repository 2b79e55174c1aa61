//! §4.G fanout orchestration: a single dedicated background task per
//! `FanoutService`, draining an unbounded channel, so the reducer never
//! blocks on the event bus, incident reporter, search indexer, or
//! descriptor store (§5). Jobs for the same flow are only ever enqueued
//! from inside that flow's lock, so FIFO drain order preserves
//! per-flow event ordering without any extra bookkeeping here.

use std::sync::Arc;

use flow::FlowRegistry;
use flow_domain::{RevisionKey, SpecMeta};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::ports::{
    normalize_for_index, DatasetDocument, DescriptorStore, EventBus, FlowEvent, Incident, IncidentReporter,
    SearchIndexer,
};

enum FanoutJob {
    Event(FlowEvent),
    Incident(Incident),
    Index { dataset_id: String, flow_id: String, downgrade_published: bool },
}

pub struct FanoutService {
    tx: mpsc::UnboundedSender<FanoutJob>,
}

impl FanoutService {
    pub fn spawn(
        registry: Arc<dyn FlowRegistry>,
        descriptors: Arc<dyn DescriptorStore>,
        event_bus: Arc<dyn EventBus>,
        incidents: Arc<dyn IncidentReporter>,
        indexer: Arc<dyn SearchIndexer>,
    ) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<FanoutJob>();
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                match job {
                    FanoutJob::Event(event) => event_bus.publish(event),
                    FanoutJob::Incident(incident) => incidents.report(incident),
                    FanoutJob::Index { dataset_id, flow_id, downgrade_published } => {
                        index_one(&*registry, &*descriptors, &*indexer, &dataset_id, &flow_id, downgrade_published);
                    }
                }
            }
        });
        Self { tx }
    }

    pub fn emit_event(&self, event: FlowEvent) {
        if self.tx.send(FanoutJob::Event(event)).is_err() {
            tracing::warn!("fanout channel closed, event dropped");
        }
    }

    pub fn emit_incident(&self, incident: Incident) {
        if self.tx.send(FanoutJob::Incident(incident)).is_err() {
            tracing::warn!("fanout channel closed, incident dropped");
        }
    }

    /// Schedules a re-index of `dataset_id`'s catalog entry (§4.D step
    /// 7). `downgrade_published` is true exactly when the dataset still
    /// has no successful revision, in which case a `published`
    /// `datahub.findability` in the descriptor is downgraded to
    /// `unlisted` (§9 open question: a dataset's first-ever revision is
    /// indexed once even if it fails, just never as publicly published).
    pub fn index_dataset(&self, dataset_id: impl Into<String>, flow_id: impl Into<String>, downgrade_published: bool) {
        let job = FanoutJob::Index { dataset_id: dataset_id.into(), flow_id: flow_id.into(), downgrade_published };
        if self.tx.send(job).is_err() {
            tracing::warn!("fanout channel closed, index request dropped");
        }
    }
}

fn index_one(
    registry: &dyn FlowRegistry,
    descriptors: &dyn DescriptorStore,
    indexer: &dyn SearchIndexer,
    dataset_id: &str,
    flow_id: &str,
    downgrade_published: bool,
) {
    let Some(mut descriptor) = descriptors.get_descriptor(flow_id) else { return };
    let Ok(Some(dataset)) = registry.get_dataset(dataset_id) else { return };
    if downgrade_published {
        if let Some(findability) = descriptor.pointer_mut("/datahub/findability") {
            if findability.as_str() == Some("published") {
                *findability = Value::String("unlisted".to_string());
            }
        }
    }
    let meta = SpecMeta::from_spec(&dataset.spec);
    let has_successful = matches!(registry.get_revision(dataset_id, RevisionKey::Successful), Ok(Some(_)));
    let doc = DatasetDocument {
        id: dataset_id.to_string(),
        name: meta.dataset.clone().unwrap_or_else(|| dataset_id.to_string()),
        title: descriptor.get("title").and_then(Value::as_str).map(str::to_string),
        description: descriptor.get("description").and_then(Value::as_str).map(str::to_string),
        certified: dataset.certified,
        datapackage: normalize_for_index(&descriptor),
        datahub: normalize_for_index(&serde_json::json!({
            "owner": meta.owner,
            "ownerid": meta.ownerid,
            "findability": descriptor.pointer("/datahub/findability"),
            "flowid": flow_id,
            "hassuccessfulrevision": has_successful,
        })),
    };
    indexer.index(doc);
}
