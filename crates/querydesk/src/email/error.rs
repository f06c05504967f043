//! Mailbox error types.

use thiserror::Error;

/// Errors raised while talking to the IMAP server.
#[derive(Error, Debug)]
pub enum MailboxError {
    /// Failed to reach the IMAP server.
    #[error("IMAP connection failed: {0}")]
    ConnectionFailed(String),

    /// TLS/SSL error during connection.
    #[error("TLS error: {0}")]
    TlsError(String),

    /// The server rejected the configured credentials.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The server response could not be used.
    #[error("IMAP protocol error: {0}")]
    ProtocolError(String),

    /// Folder not found.
    #[error("IMAP folder '{0}' not found")]
    FolderNotFound(String),

    /// A message listed as unseen was gone by the time it was fetched.
    #[error("Message with UID {0} not found")]
    MessageNotFound(u32),

    /// Operation timed out.
    #[error("Operation timed out: {0}")]
    Timeout(String),
}

impl MailboxError {
    /// Whether the error belongs to the network/TLS class rather than to
    /// the conversation with the server.
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            MailboxError::ConnectionFailed(_) | MailboxError::TlsError(_) | MailboxError::Timeout(_)
        )
    }
}

impl From<async_native_tls::Error> for MailboxError {
    fn from(err: async_native_tls::Error) -> Self {
        MailboxError::TlsError(err.to_string())
    }
}

/// Result type for mailbox operations.
pub type Result<T> = std::result::Result<T, MailboxError>;
