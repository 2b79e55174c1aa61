//! `flowmanager`: process wiring for the flow manager service (§2, §6).
//! Loads configuration, builds the registry and collaborator ports,
//! starts the scheduler loop, and serves the HTTP surface. No business
//! logic lives here — it is pure composition of `flow`, `flow-persistence`,
//! and `flow-service`.

mod config;
mod http;

use std::sync::Arc;

use config::Config;
use flow::FlowRegistry;
use flow_persistence::{new_pool, DieselFlowRegistry};
use flow_service::ports::{
    ChannelEventBus, EchoPlanner, ImmediateRunner, InMemoryDescriptorStore, InMemorySearchIndexer, StaticVerifyer,
    VecIncidentReporter,
};
use flow_service::{FanoutService, InfoReader, Scheduler, StatusReducer, StopSignal, SubmissionService};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.verbosity).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!(bind_addr = %config.http_bind_addr, database_url = %config.database_url, "starting flowmanager");

    let pool = new_pool(&config.database_url)?;
    let registry: Arc<dyn FlowRegistry> = Arc::new(DieselFlowRegistry::new(pool));

    // The Verifyer/Planner/PipelineRunner/EventBus/IncidentReporter/
    // SearchIndexer/DescriptorStore ports are external collaborators
    // (spec.md §1's "out of scope" list). Production deployments wire
    // real implementations behind AUTH_SERVER/EVENTS_ELASTICSEARCH_HOST/
    // PKGSTORE_BUCKET; absent those, the in-memory stubs keep the
    // service runnable end to end.
    let (event_bus, _event_rx) = ChannelEventBus::new();
    let fanout = Arc::new(FanoutService::spawn(
        registry.clone(),
        Arc::new(InMemoryDescriptorStore::new()),
        Arc::new(event_bus),
        Arc::new(VecIncidentReporter::new()),
        Arc::new(InMemorySearchIndexer::new()),
    ));
    let reducer = Arc::new(StatusReducer::new(registry.clone(), fanout.clone()));
    let submission = Arc::new(SubmissionService::new(
        registry.clone(),
        Arc::new(StaticVerifyer::new()),
        Arc::new(EchoPlanner),
        Arc::new(ImmediateRunner),
        reducer.clone(),
        fanout,
    ));
    let info = Arc::new(InfoReader::new(registry.clone()));

    let stop = StopSignal::new();
    if config.scheduler_enabled {
        let scheduler = Scheduler::new(registry.clone(), submission.clone());
        let stop_for_scheduler = stop.clone();
        tokio::spawn(async move {
            scheduler.run(stop_for_scheduler).await;
        });
    }

    let state = http::AppState { submission, reducer, info };
    let app = http::build_router(state, &config.http_prefix);

    let listener = tokio::net::TcpListener::bind(config.http_bind_addr).await?;
    axum::serve(listener, app).await?;

    stop.stop();
    Ok(())
}
