//! Diesel-backed `FlowRegistry` (§6): SQLite by default, Postgres behind
//! the `pg` feature, mirroring the teacher crate's `chem-persistence`
//! split. Every `FlowRegistry` method opens one transaction, commits on
//! `Ok`, rolls back on `Err` (§5).

mod registry;
mod rows;
mod schema;

pub use registry::{new_pool, DieselFlowRegistry, DbPool};
