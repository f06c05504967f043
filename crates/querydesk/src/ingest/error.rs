use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::email::MailboxError;

/// Failures that abandon a whole ingestion cycle.
///
/// Per-message failures never surface here; they are logged and the
/// message is left unseen for the next cycle.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Failed to open mailbox session: {0}")]
    Connect(#[source] MailboxError),

    #[error("Failed to list unseen messages: {0}")]
    List(#[source] MailboxError),
}

/// Coarse class of a cycle failure, reported in health snapshots so an
/// operator can tell an unreachable server from rejected credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Network, TLS or timeout.
    Connection,
    Auth,
    /// The server answered but the folder or a command was rejected.
    Mailbox,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureKind::Connection => "ConnectionError",
            FailureKind::Auth => "AuthError",
            FailureKind::Mailbox => "MailboxError",
        })
    }
}

impl IngestError {
    pub fn mailbox_error(&self) -> &MailboxError {
        match self {
            IngestError::Connect(e) | IngestError::List(e) => e,
        }
    }

    pub fn kind(&self) -> FailureKind {
        let cause = self.mailbox_error();
        if cause.is_connection() {
            FailureKind::Connection
        } else if matches!(cause, MailboxError::AuthenticationFailed(_)) {
            FailureKind::Auth
        } else {
            FailureKind::Mailbox
        }
    }
}
