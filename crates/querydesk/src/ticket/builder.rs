//! Converts classified messages into ticket records.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::email::ParsedMessage;

use super::model::{
    Channel, DedupKey, HistoryEntry, Priority, QueryType, Tags, TicketRecord, TicketStatus,
};

pub const CREATED_FROM_EMAIL_ACTION: &str = "Query created from email";
pub const SYSTEM_ACTOR: &str = "system";
pub const NO_SUBJECT: &str = "No Subject";
pub const INGEST_TAGS: [&str; 2] = ["email", "auto"];

/// Source of ticket identifiers.
pub trait IdSource: Send + Sync {
    fn next_id(&self) -> Uuid;
}

/// Random v4 UUIDs.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl IdSource for RandomIds {
    fn next_id(&self) -> Uuid {
        Uuid::new_v4()
    }
}

/// Builds the canonical record for a message that classified as a query.
#[derive(Clone)]
pub struct RecordBuilder {
    ids: Arc<dyn IdSource>,
}

impl RecordBuilder {
    pub fn new(ids: Arc<dyn IdSource>) -> Self {
        Self { ids }
    }

    /// Every call draws a fresh id, so records built in the same cycle
    /// never share one.
    pub fn build(
        &self,
        parsed: &ParsedMessage,
        dedup_key: DedupKey,
        now: DateTime<Utc>,
    ) -> TicketRecord {
        let subject = if parsed.subject.trim().is_empty() {
            NO_SUBJECT.to_string()
        } else {
            parsed.subject.clone()
        };

        TicketRecord {
            id: self.ids.next_id(),
            subject,
            content: parsed.body.clone(),
            sender: parsed.sender.clone(),
            channel: Channel::Email,
            query_type: QueryType::BugReport,
            priority: Priority::Medium,
            status: TicketStatus::New,
            tags: INGEST_TAGS.into_iter().collect::<Tags>(),
            created_at: now,
            updated_at: now,
            history: vec![HistoryEntry::new(now, CREATED_FROM_EMAIL_ACTION, SYSTEM_ACTOR)],
            dedup_key,
        }
    }
}

impl Default for RecordBuilder {
    fn default() -> Self {
        Self::new(Arc::new(RandomIds))
    }
}
