//! Ticket record model shared by the builder and the persistence sinks.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::email::MessageUid;

/// Errors raised when mutating a ticket record.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TicketError {
    #[error("History event at {event} is older than the last event at {last}")]
    HistoryOutOfOrder {
        event: DateTime<Utc>,
        last: DateTime<Utc>,
    },

    #[error("Unknown {field} value '{value}'")]
    UnknownValue { field: &'static str, value: String },
}

macro_rules! string_enum {
    ($name:ident, $field:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = TicketError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(TicketError::UnknownValue {
                        field: $field,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

/// Channel a ticket arrived through.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
}

string_enum!(Channel, "channel", { Email => "email" });

/// Kind of request a ticket represents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    Question,
    Request,
    Complaint,
    Feedback,
    BugReport,
}

string_enum!(QueryType, "type", {
    Question => "question",
    Request => "request",
    Complaint => "complaint",
    Feedback => "feedback",
    BugReport => "bug_report",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

string_enum!(Priority, "priority", {
    Low => "low",
    Medium => "medium",
    High => "high",
    Urgent => "urgent",
});

/// Lifecycle status. Ingestion only ever creates `New` tickets; the other
/// states belong to the triage workflows.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    New,
    Open,
    InProgress,
    Resolved,
    Closed,
}

string_enum!(TicketStatus, "status", {
    New => "new",
    Open => "open",
    InProgress => "in_progress",
    Resolved => "resolved",
    Closed => "closed",
});

/// Insertion-ordered set of tags.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Tags(Vec<String>);

impl Tags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tag, returning false when it was already present.
    pub fn insert(&mut self, tag: impl Into<String>) -> bool {
        let tag = tag.into();
        if self.0.contains(&tag) {
            return false;
        }
        self.0.push(tag);
        true
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t == tag)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for Tags {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut tags = Tags::new();
        for tag in iter {
            tags.insert(tag);
        }
        tags
    }
}

/// One audit-trail event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    #[serde(rename = "user")]
    pub actor: String,
}

impl HistoryEntry {
    pub fn new(timestamp: DateTime<Utc>, action: impl Into<String>, actor: impl Into<String>) -> Self {
        Self {
            timestamp,
            action: action.into(),
            actor: actor.into(),
        }
    }
}

/// Stable key identifying the mailbox message a ticket came from.
///
/// Built from folder, UIDVALIDITY and UID only. Header fields such as
/// Message-ID are sender-controlled and may repeat across distinct messages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DedupKey(String);

impl DedupKey {
    pub fn for_message(folder: &str, uid: MessageUid) -> Self {
        DedupKey(format!("uid:{}:{}:{}", folder, uid.uidvalidity, uid.uid))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for DedupKey {
    fn from(value: String) -> Self {
        DedupKey(value)
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A ticket created from an ingested message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TicketRecord {
    pub id: Uuid,
    pub subject: String,
    pub content: String,
    pub sender: String,
    pub channel: Channel,
    #[serde(rename = "type")]
    pub query_type: QueryType,
    pub priority: Priority,
    pub status: TicketStatus,
    pub tags: Tags,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub history: Vec<HistoryEntry>,
    pub dedup_key: DedupKey,
}

impl TicketRecord {
    /// Appends an audit event. History is append-only and chronological.
    pub fn push_history(&mut self, entry: HistoryEntry) -> Result<(), TicketError> {
        if let Some(last) = self.history.last() {
            if entry.timestamp < last.timestamp {
                return Err(TicketError::HistoryOutOfOrder {
                    event: entry.timestamp,
                    last: last.timestamp,
                });
            }
        }
        if entry.timestamp > self.updated_at {
            self.updated_at = entry.timestamp;
        }
        self.history.push(entry);
        Ok(())
    }
}
