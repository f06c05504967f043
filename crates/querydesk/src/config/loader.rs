use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::config::schema::{
    default_keywords, normalize_keywords, Config, ImapSettings, StoreSettings,
    DEFAULT_CHECK_INTERVAL_SECS, DEFAULT_IMAP_PORT, DEFAULT_IMAP_TIMEOUT_SECS, DEFAULT_MAILBOX,
    DEFAULT_TICKET_TABLE,
};
use crate::error::ConfigError;
use crate::secrets::resolve_secret;

/// Loads the configuration from the process environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(|key| std::env::var(key).ok())
}

/// Loads the configuration from an arbitrary key/value lookup.
///
/// Blank values are treated as unset so that `KEY=` in an env file falls
/// back to the default instead of failing to parse.
pub fn load_config_from<F>(lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| {
        lookup(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };

    let imap = ImapSettings {
        host: required(&get, "IMAP_HOST")?,
        port: parsed_or(&get, "IMAP_PORT", DEFAULT_IMAP_PORT)?,
        username: required(&get, "IMAP_USER")?,
        password: resolve_secret(&lookup, "IMAP_PASSWORD")?,
        mailbox: get("IMAP_MAILBOX").unwrap_or_else(|| DEFAULT_MAILBOX.to_string()),
        timeout: Duration::from_secs(parsed_or(
            &get,
            "IMAP_TIMEOUT_SECS",
            DEFAULT_IMAP_TIMEOUT_SECS,
        )?),
    };

    let interval_secs = parsed_or(&get, "CHECK_INTERVAL_SECONDS", DEFAULT_CHECK_INTERVAL_SECS)?;
    if interval_secs == 0 {
        return Err(ConfigError::Invalid {
            key: "CHECK_INTERVAL_SECONDS".to_string(),
            value: "0".to_string(),
            reason: "interval must be at least one second".to_string(),
        });
    }

    let keywords = match get("QUERY_KEYWORDS") {
        Some(raw) => normalize_keywords(raw.split(',')),
        None => default_keywords(),
    };
    if keywords.is_empty() {
        return Err(ConfigError::Invalid {
            key: "QUERY_KEYWORDS".to_string(),
            value: lookup("QUERY_KEYWORDS").unwrap_or_default(),
            reason: "at least one keyword is required".to_string(),
        });
    }

    let store = load_store(&get, &lookup)?;

    Ok(Config {
        imap,
        check_interval: Duration::from_secs(interval_secs),
        keywords,
        store,
    })
}

fn load_store<G, F>(get: &G, lookup: &F) -> Result<StoreSettings, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = get("SUPABASE_URL") {
        let api_key = resolve_secret(lookup, "SUPABASE_SERVICE_ROLE_KEY")?;
        let table = get("SUPABASE_TABLE").unwrap_or_else(|| DEFAULT_TICKET_TABLE.to_string());
        if !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ConfigError::Invalid {
                key: "SUPABASE_TABLE".to_string(),
                value: table,
                reason: "only letters, digits and underscores are allowed".to_string(),
            });
        }
        return Ok(StoreSettings::Rest {
            url: url.trim_end_matches('/').to_string(),
            api_key,
            table,
        });
    }

    if let Some(path) = get("DATABASE_PATH") {
        return Ok(StoreSettings::Sqlite {
            path: PathBuf::from(path),
        });
    }

    Err(ConfigError::NoTicketStore)
}

fn required<G>(get: &G, key: &str) -> Result<String, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    get(key).ok_or_else(|| ConfigError::Missing {
        key: key.to_string(),
    })
}

fn parsed_or<G, T>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw.parse::<T>().map_err(|e| ConfigError::Invalid {
            key: key.to_string(),
            value: raw,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("IMAP_HOST", "imap.example.com"),
            ("IMAP_USER", "support@example.com"),
            ("IMAP_PASSWORD", "app-password"),
            ("SUPABASE_URL", "https://project.supabase.co/"),
            ("SUPABASE_SERVICE_ROLE_KEY", "service-key"),
        ])
    }

    fn load(env: &HashMap<&'static str, &'static str>) -> Result<Config, ConfigError> {
        load_config_from(|key| env.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn test_defaults_applied() {
        let config = load(&base_env()).unwrap();
        assert_eq!(config.imap.port, 993);
        assert_eq!(config.imap.mailbox, "INBOX");
        assert_eq!(config.imap.password.expose_secret(), "app-password");
        assert_eq!(config.check_interval, Duration::from_secs(300));
        assert_eq!(config.keywords.len(), 14);
        match config.store {
            StoreSettings::Rest { url, table, .. } => {
                assert_eq!(url, "https://project.supabase.co");
                assert_eq!(table, "queries");
            }
            other => panic!("expected REST store, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_host_is_fatal() {
        let mut env = base_env();
        env.remove("IMAP_HOST");
        let err = load(&env).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { key } if key == "IMAP_HOST"));
    }

    #[test]
    fn test_missing_password_is_fatal() {
        let mut env = base_env();
        env.remove("IMAP_PASSWORD");
        assert!(matches!(load(&env), Err(ConfigError::Secret(_))));
    }

    #[test]
    fn test_blank_value_uses_default() {
        let mut env = base_env();
        env.insert("IMAP_MAILBOX", "  ");
        env.insert("CHECK_INTERVAL_SECONDS", "");
        let config = load(&env).unwrap();
        assert_eq!(config.imap.mailbox, "INBOX");
        assert_eq!(config.check_interval, Duration::from_secs(300));
    }

    #[test]
    fn test_invalid_interval() {
        let mut env = base_env();
        env.insert("CHECK_INTERVAL_SECONDS", "five");
        assert!(matches!(load(&env), Err(ConfigError::Invalid { .. })));

        env.insert("CHECK_INTERVAL_SECONDS", "0");
        assert!(matches!(load(&env), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_custom_keywords() {
        let mut env = base_env();
        env.insert("QUERY_KEYWORDS", "Refund, invoice ,,");
        let config = load(&env).unwrap();
        assert_eq!(config.keywords, vec!["refund", "invoice"]);

        env.insert("QUERY_KEYWORDS", "  ");
        assert_eq!(load(&env).unwrap().keywords.len(), 14);

        env.insert("QUERY_KEYWORDS", ",,");
        assert!(matches!(load(&env), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_rest_store_requires_key() {
        let mut env = base_env();
        env.remove("SUPABASE_SERVICE_ROLE_KEY");
        assert!(matches!(load(&env), Err(ConfigError::Secret(_))));
    }

    #[test]
    fn test_rest_table_validated() {
        let mut env = base_env();
        env.insert("SUPABASE_TABLE", "queries;drop");
        assert!(matches!(load(&env), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_sqlite_store_selected_without_rest_url() {
        let mut env = base_env();
        env.remove("SUPABASE_URL");
        env.insert("DATABASE_PATH", "/var/lib/querydesk/tickets.db");
        let config = load(&env).unwrap();
        assert!(matches!(config.store, StoreSettings::Sqlite { .. }));
    }

    #[test]
    fn test_no_store_is_fatal() {
        let mut env = base_env();
        env.remove("SUPABASE_URL");
        assert!(matches!(load(&env), Err(ConfigError::NoTicketStore)));
    }

    #[test]
    #[serial]
    fn test_load_config_reads_process_env() {
        let keys = [
            ("IMAP_HOST", "imap.env.test"),
            ("IMAP_USER", "ops@env.test"),
            ("IMAP_PASSWORD", "pw"),
            ("DATABASE_PATH", "/tmp/querydesk-env-test.db"),
        ];
        for (key, value) in keys {
            std::env::set_var(key, value);
        }
        std::env::remove_var("SUPABASE_URL");

        let config = load_config().unwrap();
        assert_eq!(config.imap.host, "imap.env.test");

        for (key, _) in keys {
            std::env::remove_var(key);
        }
    }
}
