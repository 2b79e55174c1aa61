//! Registry-level errors. Mirrors `flow::errors::FlowError` in the
//! teacher crate: a small, storage-agnostic set of failure kinds shared
//! by every `FlowRegistry` implementation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(String),
}

pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
