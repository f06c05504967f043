//! Ticket persistence.
//!
//! The ingestion job only needs to know whether a ticket already exists
//! for a message and to insert new ones. [`RestTicketSink`] writes to a
//! PostgREST table (Supabase); [`SqliteTicketStore`] keeps tickets in a
//! local database.

pub mod error;
pub mod rest;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::StoreSettings;
use crate::ticket::{DedupKey, TicketRecord};

pub use error::{PersistenceError, Result};
pub use rest::RestTicketSink;
pub use sqlite::SqliteTicketStore;

/// Result of a successful insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A ticket with the same dedup key was stored first; nothing was written.
    AlreadyPresent,
}

/// Destination for ticket records.
#[async_trait]
pub trait TicketSink: Send + Sync {
    /// Whether a ticket for this message was already persisted.
    async fn exists(&self, key: &DedupKey) -> Result<bool>;

    /// Persists a new ticket.
    async fn insert(&self, record: &TicketRecord) -> Result<InsertOutcome>;
}

/// Builds the sink selected by the configuration.
pub fn sink_from_settings(settings: &StoreSettings) -> Result<Arc<dyn TicketSink>> {
    match settings {
        StoreSettings::Rest {
            url,
            api_key,
            table,
        } => Ok(Arc::new(RestTicketSink::new(url, api_key.clone(), table)?)),
        StoreSettings::Sqlite { path } => Ok(Arc::new(SqliteTicketStore::open(path)?)),
    }
}
