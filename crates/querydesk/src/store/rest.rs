//! PostgREST (Supabase) ticket sink.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};

use crate::ticket::{DedupKey, TicketRecord};

use super::error::{PersistenceError, Result};
use super::{InsertOutcome, TicketSink};

/// PostgreSQL `unique_violation`, reported by PostgREST with HTTP 409.
const UNIQUE_VIOLATION: &str = "23505";

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum length for error bodies kept in errors and logs.
const MAX_ERROR_BODY_LENGTH: usize = 200;

fn truncate_body(body: &str) -> String {
    if body.len() > MAX_ERROR_BODY_LENGTH {
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated)", &body[..end])
    } else {
        body.to_string()
    }
}

fn is_unique_violation(body: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .is_some_and(|value| value.get("code").and_then(|c| c.as_str()) == Some(UNIQUE_VIOLATION))
}

/// Writes tickets to `{url}/rest/v1/{table}`.
pub struct RestTicketSink {
    client: Client,
    endpoint: String,
    api_key: SecretString,
}

impl RestTicketSink {
    pub fn new(url: &str, api_key: SecretString, table: &str) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/rest/v1/{}", url.trim_end_matches('/'), table),
            api_key,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let key = self.api_key.expose_secret();
        request
            .header("apikey", key)
            .header("Authorization", format!("Bearer {}", key))
    }

    async fn check_status(response: Response) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(PersistenceError::Rejected {
            status,
            body: truncate_body(&body),
        })
    }
}

#[async_trait]
impl TicketSink for RestTicketSink {
    async fn exists(&self, key: &DedupKey) -> Result<bool> {
        let request = self.client.get(&self.endpoint).query(&[
            ("dedupKey", format!("eq.{}", key)),
            ("select", "id".to_string()),
            ("limit", "1".to_string()),
        ]);

        let response = self.authorized(request).send().await?;
        let response = Self::check_status(response).await?;
        let body = response.text().await?;
        let rows: Vec<serde_json::Value> = serde_json::from_str(&body)?;

        debug!("Dedup lookup for {}: {} match(es)", key, rows.len());
        Ok(!rows.is_empty())
    }

    async fn insert(&self, record: &TicketRecord) -> Result<InsertOutcome> {
        let body = serde_json::to_vec(record)?;
        let request = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .header("Prefer", "return=minimal")
            .body(body);

        let response = self.authorized(request).send().await?;
        if response.status() == StatusCode::CONFLICT {
            let body = response.text().await.unwrap_or_default();
            if is_unique_violation(&body) {
                warn!("Ticket for {} already stored, insert ignored", record.dedup_key);
                return Ok(InsertOutcome::AlreadyPresent);
            }
            return Err(PersistenceError::Rejected {
                status: StatusCode::CONFLICT.as_u16(),
                body: truncate_body(&body),
            });
        }
        Self::check_status(response).await?;

        debug!("Inserted ticket {} ({})", record.id, record.dedup_key);
        Ok(InsertOutcome::Inserted)
    }
}
