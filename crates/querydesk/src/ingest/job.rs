//! One ingestion cycle: connect, list unseen, process each message, close.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::classifier::Classifier;
use crate::email::{decode, MailboxConnector, MailboxSession, MessageUid};
use crate::health::HealthReporter;
use crate::store::{InsertOutcome, TicketSink};
use crate::ticket::{DedupKey, RecordBuilder};

use super::error::IngestError;

/// Counts for one completed cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    /// Unseen messages found at the start of the cycle.
    pub listed: usize,
    pub tickets_created: usize,
    /// Messages that did not classify as queries.
    pub ignored: usize,
    /// Queries whose ticket already existed.
    pub duplicates: usize,
    /// Messages left unseen because fetch, dedup check or persist failed.
    pub failed: usize,
    pub mark_seen_failures: usize,
    /// Shutdown was requested before every listed message was handled.
    pub cancelled: bool,
    /// Ids of the tickets created in this cycle, in processing order.
    pub ticket_ids: Vec<Uuid>,
}

/// Result of a trigger.
#[derive(Debug)]
pub enum CycleOutcome {
    /// Another cycle held the run lock.
    Skipped,
    /// The cycle was abandoned before any message was processed.
    Failed(IngestError),
    Completed(CycleReport),
}

impl CycleOutcome {
    pub fn report(&self) -> Option<&CycleReport> {
        match self {
            CycleOutcome::Completed(report) => Some(report),
            _ => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, CycleOutcome::Skipped)
    }
}

/// The ingestion job. At most one cycle runs at a time.
pub struct IngestionJob {
    connector: Arc<dyn MailboxConnector>,
    classifier: Classifier,
    builder: RecordBuilder,
    sink: Arc<dyn TicketSink>,
    run_lock: Mutex<()>,
    health: Option<HealthReporter>,
}

impl IngestionJob {
    pub fn new(
        connector: Arc<dyn MailboxConnector>,
        classifier: Classifier,
        builder: RecordBuilder,
        sink: Arc<dyn TicketSink>,
    ) -> Self {
        Self {
            connector,
            classifier,
            builder,
            sink,
            run_lock: Mutex::new(()),
            health: None,
        }
    }

    /// Publishes a health snapshot after every cycle that ran.
    pub fn with_health(mut self, health: HealthReporter) -> Self {
        self.health = Some(health);
        self
    }

    /// Runs one cycle to completion without a shutdown signal.
    pub async fn run_once(&self) -> CycleOutcome {
        let (_tx, rx) = watch::channel(false);
        self.run_cycle(&rx).await
    }

    /// Runs one cycle unless another is in progress.
    ///
    /// `shutdown` is checked between messages; once it reads `true` the
    /// remaining messages stay unseen and the session is closed.
    pub async fn run_cycle(&self, shutdown: &watch::Receiver<bool>) -> CycleOutcome {
        let _guard = match self.run_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                info!("Ingestion cycle already running, skipping trigger");
                return CycleOutcome::Skipped;
            }
        };

        let span = info_span!("ingest_cycle", folder = %self.connector.folder());
        let outcome = self.execute(shutdown).instrument(span).await;

        if let Some(health) = &self.health {
            health.publish(&outcome, Utc::now());
        }
        outcome
    }

    async fn execute(&self, shutdown: &watch::Receiver<bool>) -> CycleOutcome {
        let mut session = match self.connector.connect().await {
            Ok(session) => session,
            Err(e) => {
                let e = IngestError::Connect(e);
                error!(kind = %e.kind(), "Ingestion cycle failed: {}", e);
                return CycleOutcome::Failed(e);
            }
        };

        let result = self.process_session(session.as_mut(), shutdown).await;

        if let Err(e) = session.close().await {
            warn!("Failed to close mailbox session: {}", e);
        }

        match result {
            Ok(report) => {
                info!(
                    listed = report.listed,
                    created = report.tickets_created,
                    ignored = report.ignored,
                    duplicates = report.duplicates,
                    failed = report.failed,
                    mark_seen_failures = report.mark_seen_failures,
                    cancelled = report.cancelled,
                    "Ingestion cycle complete"
                );
                CycleOutcome::Completed(report)
            }
            Err(e) => {
                error!(kind = %e.kind(), "Ingestion cycle failed: {}", e);
                CycleOutcome::Failed(e)
            }
        }
    }

    async fn process_session(
        &self,
        session: &mut dyn MailboxSession,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<CycleReport, IngestError> {
        let uids = session.list_unseen().await.map_err(IngestError::List)?;

        let mut report = CycleReport {
            listed: uids.len(),
            ..Default::default()
        };

        if uids.is_empty() {
            info!("No unseen messages");
            return Ok(report);
        }
        info!("Found {} unseen messages", uids.len());

        for (index, uid) in uids.iter().copied().enumerate() {
            if *shutdown.borrow() {
                warn!(
                    "Shutdown requested, leaving {} message(s) unseen",
                    uids.len() - index
                );
                report.cancelled = true;
                break;
            }

            self.process_message(session, uid, &mut report)
                .instrument(info_span!("message", uid = %uid))
                .await;
        }

        Ok(report)
    }

    async fn process_message(
        &self,
        session: &mut dyn MailboxSession,
        uid: MessageUid,
        report: &mut CycleReport,
    ) {
        let raw = match session.fetch(uid).await {
            Ok(raw) => raw,
            Err(e) => {
                error!("Failed to fetch message, leaving it unseen: {}", e);
                report.failed += 1;
                return;
            }
        };

        let parsed = decode(&raw);

        if !self
            .classifier
            .is_query(Some(&parsed.subject), Some(&parsed.body))
        {
            debug!("Not a query: {:?}", parsed.subject);
            report.ignored += 1;
            self.mark_seen(session, uid, report).await;
            return;
        }

        let key = DedupKey::for_message(self.connector.folder(), uid);
        if let Some(message_id) = &parsed.message_id {
            debug!("Query {} has Message-ID {}", key, message_id);
        }

        match self.sink.exists(&key).await {
            Ok(true) => {
                info!("Ticket for {} already exists, marking seen", key);
                report.duplicates += 1;
                self.mark_seen(session, uid, report).await;
                return;
            }
            Ok(false) => {}
            Err(e) => {
                error!(
                    "PersistenceError: dedup check for {} failed, leaving message unseen: {}",
                    key, e
                );
                report.failed += 1;
                return;
            }
        }

        let record = self.builder.build(&parsed, key, Utc::now());

        match self.sink.insert(&record).await {
            Ok(InsertOutcome::Inserted) => {
                info!("Created ticket {} from {:?}", record.id, record.subject);
                report.tickets_created += 1;
                report.ticket_ids.push(record.id);
            }
            Ok(InsertOutcome::AlreadyPresent) => {
                info!("Ticket for {} stored concurrently, marking seen", record.dedup_key);
                report.duplicates += 1;
            }
            Err(e) => {
                error!(
                    "PersistenceError: failed to persist ticket for {}, leaving message unseen: {}",
                    record.dedup_key, e
                );
                report.failed += 1;
                return;
            }
        }

        self.mark_seen(session, uid, report).await;
    }

    async fn mark_seen(
        &self,
        session: &mut dyn MailboxSession,
        uid: MessageUid,
        report: &mut CycleReport,
    ) {
        if let Err(e) = session.mark_seen(uid).await {
            // The next cycle sees the message again; the dedup check keeps
            // it from producing a second ticket.
            warn!("Failed to mark message seen: {}", e);
            report.mark_seen_failures += 1;
        }
    }
}
