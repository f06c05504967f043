//! Persistence error types.

use thiserror::Error;

use crate::db::DatabaseError;

/// Errors raised by a ticket sink.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// The store answered but refused the request.
    #[error("Ticket store rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// The store could not be reached.
    #[error("Ticket store transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The record or response could not be (de)serialized.
    #[error("Ticket serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Local database failure.
    #[error("Ticket database error: {0}")]
    Database(#[from] DatabaseError),

    /// The blocking database task did not complete.
    #[error("Ticket store task failed: {0}")]
    TaskFailed(String),
}

/// Result type for persistence operations.
pub type Result<T> = std::result::Result<T, PersistenceError>;
