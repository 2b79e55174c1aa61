//! §4.E scheduler loop: minute-granular, cooperative-cancellation
//! resubmission of every dataset whose `scheduled_for` has elapsed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use flow::FlowRegistry;

use crate::submission::SubmissionService;

/// Cooperative stop flag, checked between ticks and during the 5s
/// sleep increments (§4.E: "the loop checks a stop signal between
/// iterations").
#[derive(Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct Scheduler {
    registry: Arc<dyn FlowRegistry>,
    submission: Arc<SubmissionService>,
}

impl Scheduler {
    pub fn new(registry: Arc<dyn FlowRegistry>, submission: Arc<SubmissionService>) -> Self {
        Self { registry, submission }
    }

    /// Runs until `stop` is signalled. Each tick snapshots `base`,
    /// resubmits every dataset expired as of `base`, then advances
    /// `base` by 60s and sleeps in 5s increments until wall clock
    /// catches up — a missed tick is never coalesced, because
    /// `update_dataset_schedule` (invoked inside the resubmission path)
    /// advances `scheduled_for` past `base` before the next pass sees it.
    pub async fn run(&self, stop: StopSignal) {
        let mut base = Utc::now();
        while !stop.is_stopped() {
            self.tick(base).await;
            base += chrono::Duration::seconds(60);
            while Utc::now() < base {
                if stop.is_stopped() {
                    return;
                }
                tokio::time::sleep(StdDuration::from_secs(5)).await;
            }
        }
    }

    async fn tick(&self, base: DateTime<Utc>) {
        let expired = match self.registry.get_expired_datasets(base) {
            Ok(datasets) => datasets,
            Err(e) => {
                tracing::warn!(error = %e, "failed to list expired datasets");
                return;
            }
        };
        for dataset in expired {
            let (_, _, errors) = self.submission.submit_trusted(&dataset.owner, dataset.spec, base).await;
            if !errors.is_empty() {
                tracing::warn!(dataset = %dataset.identifier, ?errors, "scheduled resubmission failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fanout::FanoutService;
    use crate::ports::{
        EchoPlanner, ImmediateRunner, InMemoryDescriptorStore, InMemorySearchIndexer, StaticVerifyer,
        VecIncidentReporter,
    };
    use crate::reducer::StatusReducer;
    use flow::InMemoryFlowRegistry;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[tokio::test]
    async fn tick_resubmits_expired_datasets() {
        let registry: Arc<dyn FlowRegistry> = Arc::new(InMemoryFlowRegistry::new());
        registry
            .create_or_update_dataset("me/id", "me", json!({"meta": {"ownerid": "me", "dataset": "id"}}), now())
            .unwrap();
        registry.update_dataset_schedule("me/id", Some(60), now() - chrono::Duration::seconds(120)).unwrap();

        let fanout = Arc::new(FanoutService::spawn(
            registry.clone(),
            Arc::new(InMemoryDescriptorStore::new()),
            Arc::new(crate::ports::ChannelEventBus::new().0),
            Arc::new(VecIncidentReporter::new()),
            Arc::new(InMemorySearchIndexer::new()),
        ));
        let reducer = Arc::new(StatusReducer::new(registry.clone(), fanout.clone()));
        let submission = Arc::new(SubmissionService::new(
            registry.clone(),
            Arc::new(StaticVerifyer::new()),
            Arc::new(EchoPlanner),
            Arc::new(ImmediateRunner),
            reducer,
            fanout,
        ));

        assert!(registry.get_expired_datasets(now()).unwrap().len() == 1);

        let scheduler = Scheduler::new(registry.clone(), submission);
        scheduler.tick(now()).await;

        let revision = registry.get_revision("me/id", flow_domain::RevisionKey::Latest).unwrap().unwrap();
        assert_eq!(revision.revision, 1);
        assert!(registry.get_expired_datasets(now()).unwrap().is_empty());
    }
}
