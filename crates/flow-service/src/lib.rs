//! `flow-service`: the orchestration layer atop `flow`'s `FlowRegistry`
//! contract. Owns submission (§4.C), the status reducer (§4.D), the
//! scheduler loop (§4.E), the read-only info projection (§4.F), and
//! fanout (§4.G) — plus the collaborator ports this core depends on
//! (Verifyer, Planner, PipelineRunner, EventBus, IncidentReporter,
//! SearchIndexer, DescriptorStore), each paired with an in-memory stub
//! so the whole pipeline runs end to end without a real auth server,
//! planner, runner, or search index.

pub mod errors;
pub mod fanout;
pub mod info;
pub mod ports;
pub mod reducer;
pub mod scheduler;
pub mod submission;

pub use errors::ServiceError;
pub use fanout::FanoutService;
pub use info::{DatasetInfo, InfoReader};
pub use reducer::{ReducerOutcome, StatusReducer};
pub use scheduler::{Scheduler, StopSignal};
pub use submission::{SubmissionService, UploadOutcome};
