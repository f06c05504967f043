//! Mailbox access and message decoding.
//!
//! The ingestion job talks to the mailbox through the [`MailboxConnector`]
//! and [`MailboxSession`] traits; [`ImapConnector`] is the IMAP-over-TLS
//! implementation used in production.

pub mod client;
pub mod decoder;
pub mod error;
pub mod mailbox;

pub use client::{ImapConnector, ImapSession};
pub use decoder::{decode, html_to_text, ParsedMessage};
pub use error::MailboxError;
pub use mailbox::{MailboxConnector, MailboxSession, MessageUid, RawMessage};
