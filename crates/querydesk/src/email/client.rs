//! IMAP client for the ingested mailbox.

use std::future::Future;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use async_imap::types::Fetch;
use async_imap::Session;
use async_native_tls::TlsConnector;
use async_trait::async_trait;
use futures_util::TryStreamExt;
use log::{debug, info, warn};
use secrecy::ExposeSecret;

use crate::config::ImapSettings;

use super::error::{MailboxError, Result};
use super::mailbox::{MailboxConnector, MailboxSession, MessageUid, RawMessage};

/// Type alias for the underlying async stream (using async-std compatible TcpStream).
type AsyncTcpStream = async_io::Async<TcpStream>;

/// Type alias for the TLS stream used by the IMAP session.
type TlsStream = async_native_tls::TlsStream<AsyncTcpStream>;

/// Opens TLS-protected IMAP sessions using password login.
#[derive(Debug, Clone)]
pub struct ImapConnector {
    settings: ImapSettings,
}

impl ImapConnector {
    pub fn new(settings: ImapSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ImapSettings {
        &self.settings
    }

}

/// Resolves and connects with a per-address timeout. Blocking; run it off
/// the async workers.
fn open_tcp(host: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
    let addr = format!("{}:{}", host, port);
    let candidates = addr
        .to_socket_addrs()
        .map_err(|e| MailboxError::ConnectionFailed(format!("{}: {}", addr, e)))?;

    let mut last_error = None;
    for candidate in candidates {
        match TcpStream::connect_timeout(&candidate, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!("Connection to {} failed: {}", candidate, e);
                last_error = Some(e);
            }
        }
    }

    Err(MailboxError::ConnectionFailed(match last_error {
        Some(e) => format!("{}: {}", addr, e),
        None => format!("{}: no addresses resolved", addr),
    }))
}

/// Maps a failed SELECT. A tagged `NO` means the server refused the folder;
/// anything else is a protocol or transport problem.
fn select_error(folder: &str, err: async_imap::error::Error) -> MailboxError {
    match err {
        async_imap::error::Error::No(_) => MailboxError::FolderNotFound(folder.to_string()),
        async_imap::error::Error::Io(e) => MailboxError::ConnectionFailed(e.to_string()),
        async_imap::error::Error::ConnectionLost => {
            MailboxError::ConnectionFailed("connection lost during select".to_string())
        }
        other => MailboxError::ProtocolError(other.to_string()),
    }
}

#[async_trait]
impl MailboxConnector for ImapConnector {
    async fn connect(&self) -> Result<Box<dyn MailboxSession>> {
        info!(
            "Connecting to IMAP server at {}:{}",
            self.settings.host, self.settings.port
        );

        let (host, port, timeout) = (
            self.settings.host.clone(),
            self.settings.port,
            self.settings.timeout,
        );
        let std_stream = tokio::task::spawn_blocking(move || open_tcp(&host, port, timeout))
            .await
            .map_err(|e| MailboxError::ConnectionFailed(format!("connect task failed: {}", e)))??;
        std_stream
            .set_nonblocking(true)
            .map_err(|e| MailboxError::ConnectionFailed(e.to_string()))?;
        let tcp_stream = async_io::Async::new(std_stream)
            .map_err(|e| MailboxError::ConnectionFailed(e.to_string()))?;

        let tls = TlsConnector::new();
        let tls_stream = with_timeout(
            self.settings.timeout,
            "TLS handshake",
            tls.connect(&self.settings.host, tcp_stream),
        )
        .await?
        .map_err(|e| MailboxError::TlsError(e.to_string()))?;

        let client = async_imap::Client::new(tls_stream);

        let mut session = with_timeout(
            self.settings.timeout,
            "login",
            client.login(
                &self.settings.username,
                self.settings.password.expose_secret(),
            ),
        )
        .await?
        .map_err(|(e, _)| MailboxError::AuthenticationFailed(e.to_string()))?;

        info!("Authenticated to IMAP server as {}", self.settings.username);

        let folder = &self.settings.mailbox;
        let mailbox = match with_timeout(self.settings.timeout, "select", session.select(folder))
            .await?
        {
            Ok(mailbox) => mailbox,
            Err(e) => {
                // Best effort; the select failure is what gets reported.
                let _ = session.logout().await;
                return Err(select_error(folder, e));
            }
        };

        let uidvalidity = match mailbox.uid_validity {
            Some(value) => value,
            None => {
                let _ = session.logout().await;
                return Err(MailboxError::ProtocolError(
                    "Server did not provide UIDVALIDITY".to_string(),
                ));
            }
        };

        debug!(
            "Folder '{}' selected with UIDVALIDITY={} ({} messages)",
            folder, uidvalidity, mailbox.exists
        );

        Ok(Box::new(ImapSession {
            session: Some(session),
            uidvalidity,
            timeout: self.settings.timeout,
        }))
    }

    fn folder(&self) -> &str {
        &self.settings.mailbox
    }
}

/// A selected, authenticated IMAP session.
pub struct ImapSession {
    session: Option<Session<TlsStream>>,
    uidvalidity: u32,
    timeout: Duration,
}

impl ImapSession {
    fn session_mut(&mut self) -> Result<&mut Session<TlsStream>> {
        self.session
            .as_mut()
            .ok_or_else(|| MailboxError::ConnectionFailed("Not connected".to_string()))
    }

    fn check_uidvalidity(&self, uid: MessageUid) -> Result<()> {
        if uid.uidvalidity != self.uidvalidity {
            return Err(MailboxError::ProtocolError(format!(
                "UIDVALIDITY changed: message {} belongs to {}, session has {}",
                uid.uid, uid.uidvalidity, self.uidvalidity
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl MailboxSession for ImapSession {
    async fn list_unseen(&mut self) -> Result<Vec<MessageUid>> {
        let timeout = self.timeout;
        let uidvalidity = self.uidvalidity;
        let session = self.session_mut()?;

        let uids = with_timeout(timeout, "search", session.uid_search("UNSEEN"))
            .await?
            .map_err(|e| MailboxError::ProtocolError(e.to_string()))?;

        let mut uid_list: Vec<u32> = uids.into_iter().collect();
        uid_list.sort_unstable();
        debug!("Found {} unseen messages", uid_list.len());

        Ok(uid_list
            .into_iter()
            .map(|uid| MessageUid::new(uidvalidity, uid))
            .collect())
    }

    async fn fetch(&mut self, uid: MessageUid) -> Result<RawMessage> {
        self.check_uidvalidity(uid)?;
        let timeout = self.timeout;
        let session = self.session_mut()?;

        debug!("Fetching email with UID {}", uid.uid);

        // BODY.PEEK[] leaves \Seen untouched; read-state only moves on mark_seen.
        let fetches: Vec<Fetch> = with_timeout(timeout, "fetch", async {
            session
                .uid_fetch(uid.uid.to_string(), "(UID BODY.PEEK[])")
                .await?
                .try_collect()
                .await
        })
        .await?
        .map_err(|e| MailboxError::ProtocolError(e.to_string()))?;

        let body = fetches
            .iter()
            .find(|fetch| fetch.uid.map_or(true, |fetched| fetched == uid.uid))
            .and_then(|fetch| fetch.body())
            .ok_or(MailboxError::MessageNotFound(uid.uid))?;

        Ok(RawMessage {
            uid,
            content: body.to_vec(),
        })
    }

    async fn mark_seen(&mut self, uid: MessageUid) -> Result<()> {
        self.check_uidvalidity(uid)?;
        let timeout = self.timeout;
        let session = self.session_mut()?;

        let _updates: Vec<Fetch> = with_timeout(timeout, "store", async {
            session
                .uid_store(uid.uid.to_string(), "+FLAGS (\\Seen)")
                .await?
                .try_collect()
                .await
        })
        .await?
        .map_err(|e| MailboxError::ProtocolError(e.to_string()))?;

        debug!("Marked UID {} as seen", uid.uid);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let timeout = self.timeout;
        if let Some(mut session) = self.session.take() {
            info!("Disconnecting from IMAP server");
            with_timeout(timeout, "logout", session.logout())
                .await?
                .map_err(|e| MailboxError::ProtocolError(e.to_string()))?;
        }
        Ok(())
    }
}

impl Drop for ImapSession {
    fn drop(&mut self) {
        if self.session.is_some() {
            warn!("ImapSession dropped without explicit close - connection will be dropped");
        }
    }
}

async fn with_timeout<F, T>(duration: Duration, operation: &str, future: F) -> Result<T>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(duration, future)
        .await
        .map_err(|_| MailboxError::Timeout(format!("{} after {:?}", operation, duration)))
}
