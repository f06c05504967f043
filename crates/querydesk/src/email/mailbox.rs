//! Mailbox session abstraction used by the ingestion job.
//!
//! The job only needs a handful of operations from the server. Keeping them
//! behind traits lets the cycle logic run against a scripted mailbox in tests
//! while production uses [`ImapConnector`](super::client::ImapConnector).

use std::fmt;

use async_trait::async_trait;

use super::error::Result;

/// Mailbox-assigned identity of a message.
///
/// A UID is only meaningful together with the folder's UIDVALIDITY; if the
/// folder is recreated the same UID may name a different message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageUid {
    pub uidvalidity: u32,
    pub uid: u32,
}

impl MessageUid {
    pub fn new(uidvalidity: u32, uid: u32) -> Self {
        Self { uidvalidity, uid }
    }
}

impl fmt::Display for MessageUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.uidvalidity, self.uid)
    }
}

/// A single fetched mailbox entry. Lives for one cycle only.
#[derive(Clone)]
pub struct RawMessage {
    pub uid: MessageUid,
    pub content: Vec<u8>,
}

impl fmt::Debug for RawMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawMessage")
            .field("uid", &self.uid)
            .field("content_len", &self.content.len())
            .finish()
    }
}

/// Opens authenticated sessions against one mailbox folder.
#[async_trait]
pub trait MailboxConnector: Send + Sync {
    /// Connects, authenticates and selects the configured folder.
    async fn connect(&self) -> Result<Box<dyn MailboxSession>>;

    /// Folder the sessions operate on.
    fn folder(&self) -> &str;
}

/// An open session. Operations are sequential; the session is owned by a
/// single cycle and must be closed on every exit path.
#[async_trait]
pub trait MailboxSession: Send {
    /// Lists unseen messages in ascending UID order.
    async fn list_unseen(&mut self) -> Result<Vec<MessageUid>>;

    /// Fetches the full message without touching its `\Seen` flag.
    async fn fetch(&mut self, uid: MessageUid) -> Result<RawMessage>;

    /// Sets `\Seen` on the message.
    async fn mark_seen(&mut self, uid: MessageUid) -> Result<()>;

    /// Logs out and releases the connection.
    async fn close(&mut self) -> Result<()>;
}
