use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

/// Terms that mark an email as an actionable query.
pub const DEFAULT_QUERY_KEYWORDS: &[&str] = &[
    "query",
    "question",
    "support",
    "help",
    "issue",
    "bug",
    "error",
    "request",
    "ticket",
    "problem",
    "customer",
    "inquiry",
    "complaint",
    "trouble",
];

pub const DEFAULT_IMAP_PORT: u16 = 993;
pub const DEFAULT_MAILBOX: &str = "INBOX";
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_IMAP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_TICKET_TABLE: &str = "queries";

/// Complete runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub imap: ImapSettings,
    pub check_interval: Duration,
    pub keywords: Vec<String>,
    pub store: StoreSettings,
}

/// Connection settings for the ingested mailbox.
#[derive(Clone)]
pub struct ImapSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub mailbox: String,
    pub timeout: Duration,
}

impl fmt::Debug for ImapSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImapSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("mailbox", &self.mailbox)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Where ticket records are persisted.
#[derive(Clone)]
pub enum StoreSettings {
    /// PostgREST-compatible table API (Supabase).
    Rest {
        url: String,
        api_key: SecretString,
        table: String,
    },
    /// Local SQLite database file.
    Sqlite { path: PathBuf },
}

impl fmt::Debug for StoreSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreSettings::Rest { url, table, .. } => f
                .debug_struct("Rest")
                .field("url", url)
                .field("api_key", &"[REDACTED]")
                .field("table", table)
                .finish(),
            StoreSettings::Sqlite { path } => {
                f.debug_struct("Sqlite").field("path", path).finish()
            }
        }
    }
}

/// Normalizes a keyword list: trimmed, lower-cased, empties dropped,
/// duplicates removed while keeping first-seen order.
pub fn normalize_keywords<I, S>(keywords: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut normalized: Vec<String> = Vec::new();
    for keyword in keywords {
        let keyword = keyword.as_ref().trim().to_lowercase();
        if !keyword.is_empty() && !normalized.contains(&keyword) {
            normalized.push(keyword);
        }
    }
    normalized
}

pub fn default_keywords() -> Vec<String> {
    normalize_keywords(DEFAULT_QUERY_KEYWORDS)
}
