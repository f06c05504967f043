//! Local SQLite ticket store.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log::{debug, warn};
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::ticket_repo::{self, TicketRow};
use crate::db::{open_ticket_db, open_ticket_db_in_memory, DatabaseError};
use crate::ticket::{DedupKey, TicketRecord};

use super::error::{PersistenceError, Result};
use super::{InsertOutcome, TicketSink};

/// Tickets stored in a local database file.
///
/// One connection is shared behind a mutex; async callers reach it through
/// `spawn_blocking` so SQLite I/O never runs on a runtime worker.
#[derive(Clone)]
pub struct SqliteTicketStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTicketStore {
    /// Opens (or creates) the database file and applies migrations.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::from_connection(open_ticket_db(path)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_connection(open_ticket_db_in_memory()?))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    pub fn find_by_id(&self, id: &Uuid) -> Result<Option<TicketRecord>> {
        let id = id.to_string();
        let row = self.with_conn(|conn| ticket_repo::find_by_id(conn, &id))?;
        Ok(row.map(TicketRow::into_record).transpose()?)
    }

    pub fn find_by_dedup_key(&self, key: &DedupKey) -> Result<Option<TicketRecord>> {
        let row = self.with_conn(|conn| ticket_repo::find_by_dedup_key(conn, key.as_str()))?;
        Ok(row.map(TicketRow::into_record).transpose()?)
    }

    /// Most recent tickets first.
    pub fn recent(&self, limit: u32) -> Result<Vec<TicketRecord>> {
        let rows = self.with_conn(|conn| ticket_repo::list_recent(conn, limit))?;
        rows.into_iter()
            .map(|row| row.into_record().map_err(PersistenceError::from))
            .collect()
    }

    pub fn count(&self) -> Result<u64> {
        Ok(self.with_conn(ticket_repo::count)?)
    }

    fn with_conn<F, T>(&self, f: F) -> std::result::Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> std::result::Result<T, DatabaseError>,
    {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&conn)
    }

    async fn run_blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> std::result::Result<T, DatabaseError> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.with_conn(f))
            .await
            .map_err(|e| PersistenceError::TaskFailed(e.to_string()))?
            .map_err(PersistenceError::from)
    }
}

#[async_trait]
impl TicketSink for SqliteTicketStore {
    async fn exists(&self, key: &DedupKey) -> Result<bool> {
        let key = key.as_str().to_string();
        self.run_blocking(move |conn| ticket_repo::exists_by_dedup_key(conn, &key))
            .await
    }

    async fn insert(&self, record: &TicketRecord) -> Result<InsertOutcome> {
        let row = TicketRow::from_record(record)?;
        let dedup_key = row.dedup_key.clone();
        let inserted = self
            .run_blocking(move |conn| ticket_repo::insert(conn, &row))
            .await?;

        if inserted {
            debug!("Stored ticket {} ({})", record.id, dedup_key);
            Ok(InsertOutcome::Inserted)
        } else {
            // The UNIQUE dedup_key already holds this message's ticket.
            warn!("Ticket for {} already stored, insert ignored", dedup_key);
            Ok(InsertOutcome::AlreadyPresent)
        }
    }
}
