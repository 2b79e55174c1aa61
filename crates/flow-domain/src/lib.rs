//! Pure domain types for the flow manager: the persisted entities
//! (`Dataset`, `DatasetRevision`, `Pipeline`), the status state machine,
//! and the schedule parser. Nothing here touches a database, the network,
//! or a clock other than by taking `chrono::DateTime<Utc>` as a parameter.

pub mod model;
pub mod schedule;
pub mod status;

pub use model::{
    parse_dependencies, set_spec_time_field, strip_dot_slash, Dataset, DatasetRevision, Dependency, Pipeline,
    PipelineDetails, PipelineSnapshot, RevisionKey, SpecMeta,
};
pub use schedule::{calculate_new_schedule, parse_schedule, ScheduleError};
pub use status::{FlowStatus, PipelineState, SnapshotStatus};
