//! §7 service-level error kinds: the shapes the submission service and
//! info reader surface to their HTTP callers.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Auth(String),
    #[error("{0}")]
    Quota(String),
    #[error("not found")]
    NotFound,
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}
