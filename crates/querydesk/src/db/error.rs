use std::path::PathBuf;

use thiserror::Error;

/// Failures of the local ticket database.
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Cannot create database directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Schema migration v{version} failed: {reason}")]
    Migration { version: u32, reason: String },

    /// A stored row no longer maps to a valid ticket.
    #[error("Corrupt ticket row '{id}': {reason}")]
    CorruptRow { id: String, reason: String },

    /// A thread panicked while holding the connection.
    #[error("Ticket database lock poisoned")]
    LockPoisoned,
}
