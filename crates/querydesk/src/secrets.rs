//! Secret resolution for configuration keys.
//!
//! A secret named `KEY` is looked up in priority order:
//!
//! 1. **Direct value** - `KEY` itself (e.g. `IMAP_PASSWORD=hunter2`)
//! 2. **File reference** - `KEY_FILE`, for the Docker secrets pattern
//!    (e.g. `IMAP_PASSWORD_FILE=/run/secrets/imap_password`)

use secrecy::SecretString;
use std::fs;

/// Error type for secret resolution failures.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No value for '{key}' (set {key} or {key}_FILE)")]
    NoSourceProvided { key: String },

    #[error("Failed to read secret from file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Secret file '{path}' is empty")]
    EmptyFile { path: String },
}

/// Result type for secret resolution.
pub type Result<T> = std::result::Result<T, SecretError>;

/// Resolves the secret `key` through `lookup`, which maps configuration keys
/// to raw values (normally the process environment).
///
/// Empty values count as unset. File contents are trimmed, since secret files
/// usually end with a newline.
pub fn resolve_secret<F>(lookup: F, key: &str) -> Result<SecretString>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(key) {
        if !value.is_empty() {
            return Ok(SecretString::from(value));
        }
    }

    let file_key = format!("{}_FILE", key);
    if let Some(path) = lookup(&file_key) {
        if !path.is_empty() {
            let expanded = expand_home(&path);
            let content = fs::read_to_string(&expanded).map_err(|e| SecretError::FileReadError {
                path: expanded.clone(),
                source: e,
            })?;
            let trimmed = content.trim();
            if trimmed.is_empty() {
                return Err(SecretError::EmptyFile { path: expanded });
            }
            return Ok(SecretString::from(trimmed.to_string()));
        }
    }

    Err(SecretError::NoSourceProvided {
        key: key.to_string(),
    })
}

/// Expands `~` to the user's home directory.
///
/// Only `~` and `~/path` are supported, not `~user/path`.
fn expand_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            let home = home.to_string_lossy();
            if path == "~" {
                return home.into_owned();
            }
            return path.replacen('~', &home, 1);
        }
    }
    path.to_string()
}
