//! `flow`: the `FlowRegistry` contract (§4.B) plus an in-memory
//! implementation for tests and local wiring.
//!
//! This crate plays the same role the teacher's `flow` crate plays for
//! `chem-persistence`: it owns the trait every concrete storage backend
//! must implement, the patch types used for partial updates, and a
//! reference implementation (`InMemoryFlowRegistry`) good enough to run
//! the whole service without a database.

pub mod errors;
pub mod patch;
pub mod registry;
pub mod stubs;

pub use errors::{RegistryError, RegistryResult};
pub use patch::{PipelinePatch, RevisionPatch};
pub use registry::FlowRegistry;
pub use stubs::InMemoryFlowRegistry;

pub use flow_domain::*;
