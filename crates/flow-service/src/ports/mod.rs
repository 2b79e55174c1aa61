//! The external-collaborator contracts the core depends on (§6): auth,
//! planning, execution, and the fanout sinks. Each trait ships with an
//! in-memory stub implementation so `flow-service` is runnable and
//! testable without a real auth server, planner, runner, message
//! broker, or search cluster behind it.

pub mod descriptor;
pub mod event_bus;
pub mod incident;
pub mod indexer;
pub mod planner;
pub mod runner;
pub mod verifyer;

pub use descriptor::{DescriptorStore, InMemoryDescriptorStore};
pub use event_bus::{ChannelEventBus, EventBus, FlowEvent};
pub use incident::{Incident, IncidentReporter, VecIncidentReporter};
pub use indexer::{normalize_for_index, DatasetDocument, InMemorySearchIndexer, SearchIndexer};
pub use planner::{EchoPlanner, Planner, PlannedPipeline, PlannerError};
pub use runner::{ImmediateRunner, NoopRunner, PipelineRunner, RunnerEvent};
pub use verifyer::{Permissions, StaticVerifyer, UserIdentity, Verifyer};
