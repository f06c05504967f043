//! Local SQLite storage for tickets.
//!
//! [`open_ticket_db`] prepares a connection with the ticket schema applied;
//! the row mapping and queries live in [`ticket_repo`]. Locking and
//! blocking-thread dispatch belong to `store::SqliteTicketStore`, which is
//! the only owner of a connection.

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;

pub mod error;
pub mod migrations;
pub mod ticket_repo;

pub use error::DatabaseError;

/// How long a writer waits on a lock held by another process (for example
/// an operator running `sqlite3` against the same file).
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens (or creates) the ticket database at `path` and brings its schema
/// up to date.
pub fn open_ticket_db(path: &Path) -> Result<Connection, DatabaseError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| DatabaseError::CreateDir {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    let conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    // Readers outside the daemon should not block ticket inserts.
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    migrations::run_all(&conn)?;

    log::info!("Ticket database ready at {}", path.display());
    Ok(conn)
}

/// In-memory ticket database with the schema applied.
pub fn open_ticket_db_in_memory() -> Result<Connection, DatabaseError> {
    let conn = Connection::open_in_memory()?;
    migrations::run_all(&conn)?;
    Ok(conn)
}
