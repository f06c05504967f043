//! Queries and row mapping for the `tickets` table.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::ticket::{DedupKey, HistoryEntry, Tags, TicketRecord};

use super::DatabaseError;

/// A raw ticket row from the database.
#[derive(Debug, Clone)]
pub struct TicketRow {
    pub id: String,
    pub dedup_key: String,
    pub subject: String,
    pub content: String,
    pub sender: String,
    pub channel: String,
    pub query_type: String,
    pub priority: String,
    pub status: String,
    pub tags: String,
    pub history: String,
    pub created_at: String,
    pub updated_at: String,
}

const SELECT_COLUMNS: &str = "id, dedup_key, subject, content, sender, channel, query_type, \
     priority, status, tags, history, created_at, updated_at";

impl TicketRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            dedup_key: row.get(1)?,
            subject: row.get(2)?,
            content: row.get(3)?,
            sender: row.get(4)?,
            channel: row.get(5)?,
            query_type: row.get(6)?,
            priority: row.get(7)?,
            status: row.get(8)?,
            tags: row.get(9)?,
            history: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }

    pub fn from_record(record: &TicketRecord) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: record.id.to_string(),
            dedup_key: record.dedup_key.to_string(),
            subject: record.subject.clone(),
            content: record.content.clone(),
            sender: record.sender.clone(),
            channel: record.channel.as_str().to_string(),
            query_type: record.query_type.as_str().to_string(),
            priority: record.priority.as_str().to_string(),
            status: record.status.as_str().to_string(),
            tags: serde_json::to_string(&record.tags)?,
            history: serde_json::to_string(&record.history)?,
            created_at: record.created_at.to_rfc3339(),
            updated_at: record.updated_at.to_rfc3339(),
        })
    }

    pub fn into_record(self) -> Result<TicketRecord, DatabaseError> {
        let corrupt = |reason: String| DatabaseError::CorruptRow {
            id: self.id.clone(),
            reason,
        };

        let tags: Tags = serde_json::from_str(&self.tags).map_err(|e| corrupt(e.to_string()))?;
        let history: Vec<HistoryEntry> =
            serde_json::from_str(&self.history).map_err(|e| corrupt(e.to_string()))?;

        Ok(TicketRecord {
            id: Uuid::parse_str(&self.id).map_err(|e| corrupt(e.to_string()))?,
            subject: self.subject.clone(),
            content: self.content.clone(),
            sender: self.sender.clone(),
            channel: self.channel.parse().map_err(|e| corrupt(format!("{}", e)))?,
            query_type: self.query_type.parse().map_err(|e| corrupt(format!("{}", e)))?,
            priority: self.priority.parse().map_err(|e| corrupt(format!("{}", e)))?,
            status: self.status.parse().map_err(|e| corrupt(format!("{}", e)))?,
            tags,
            created_at: parse_timestamp(&self.created_at).map_err(corrupt)?,
            updated_at: parse_timestamp(&self.updated_at).map_err(corrupt)?,
            history,
            dedup_key: DedupKey::from(self.dedup_key.clone()),
        })
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("bad timestamp '{}': {}", value, e))
}

/// Inserts a ticket row. Returns `false` when a row with the same id or
/// dedup key already exists.
pub fn insert(conn: &Connection, row: &TicketRow) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO tickets (id, dedup_key, subject, content, sender, channel,
            query_type, priority, status, tags, history, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            row.id,
            row.dedup_key,
            row.subject,
            row.content,
            row.sender,
            row.channel,
            row.query_type,
            row.priority,
            row.status,
            row.tags,
            row.history,
            row.created_at,
            row.updated_at,
        ],
    )?;
    Ok(changed > 0)
}

/// Checks whether a ticket with the given dedup key exists.
pub fn exists_by_dedup_key(conn: &Connection, dedup_key: &str) -> Result<bool, DatabaseError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM tickets WHERE dedup_key = ?1)",
        params![dedup_key],
        |r| r.get(0),
    )?;
    Ok(exists)
}

/// Finds a ticket row by id.
pub fn find_by_id(conn: &Connection, id: &str) -> Result<Option<TicketRow>, DatabaseError> {
    find_one(conn, "id", id)
}

/// Finds a ticket row by dedup key.
pub fn find_by_dedup_key(
    conn: &Connection,
    dedup_key: &str,
) -> Result<Option<TicketRow>, DatabaseError> {
    find_one(conn, "dedup_key", dedup_key)
}

fn find_one(
    conn: &Connection,
    column: &str,
    value: &str,
) -> Result<Option<TicketRow>, DatabaseError> {
    let sql = format!("SELECT {} FROM tickets WHERE {} = ?1", SELECT_COLUMNS, column);
    let row = conn
        .query_row(&sql, params![value], TicketRow::from_row)
        .optional()?;
    Ok(row)
}

/// Lists ticket rows, newest first.
pub fn list_recent(conn: &Connection, limit: u32) -> Result<Vec<TicketRow>, DatabaseError> {
    let sql = format!(
        "SELECT {} FROM tickets ORDER BY created_at DESC, id LIMIT ?1",
        SELECT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![limit], TicketRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Counts all tickets.
pub fn count(conn: &Connection) -> Result<u64, DatabaseError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM tickets", [], |r| r.get(0))?;
    Ok(count as u64)
}
