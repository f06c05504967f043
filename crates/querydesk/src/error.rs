use thiserror::Error;

use crate::email::MailboxError;
use crate::ingest::IngestError;
use crate::secrets::SecretError;
use crate::store::PersistenceError;

#[derive(Error, Debug)]
pub enum QuerydeskError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Mailbox error: {0}")]
    Mailbox(#[from] MailboxError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Ingestion error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Failed to install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required setting '{key}'")]
    Missing { key: String },

    #[error("Invalid value '{value}' for '{key}': {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Secret error: {0}")]
    Secret(#[from] SecretError),

    #[error("No ticket store configured (set SUPABASE_URL or DATABASE_PATH)")]
    NoTicketStore,
}

pub type Result<T> = std::result::Result<T, QuerydeskError>;
