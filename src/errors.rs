//! Error taxonomy for the storage and generation layers.
//!
//! Missing records are never errors: reads return `Option`. Transport
//! failures from the generation service are returned as tagged values
//! (`TextReply::Failed`), not errors. What remains:
//!
//! - [`StoreError::Fault`] — the backing engine misbehaved (corruption,
//!   permissions, unexpected I/O). Callers surface a generic storage error.
//! - [`StoreError::Exhausted`] — a write was rejected for capacity. The
//!   record store shrinks story retention once before letting this escape;
//!   when it does escape the message is user-actionable.
//! - [`StoreError::Shape`] — a persisted or patched record no longer fits
//!   its declared shape.
//! - [`GenerationError::ResponseFormat`] — no parsing strategy could read
//!   the model's structured reply; callers should offer a retry.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage fault: {0}")]
    Fault(String),

    #[error("storage is full; delete old stories to free space")]
    Exhausted,

    #[error("record shape error: {0}")]
    Shape(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Fault(err.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Fault(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("the model reply could not be interpreted as structured data")]
    ResponseFormat,
}
