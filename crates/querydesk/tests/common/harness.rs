//! Test harness for isolated ingestion cycles.
//!
//! `FakeMailbox` scripts the server side: unseen messages, injected
//! failures and an optional gate that parks the first fetch so tests can
//! observe a cycle while it is in flight. `RecordingSink` keeps inserted
//! tickets in memory.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use uuid::Uuid;

use querydesk::email::{MailboxConnector, MailboxError, MailboxSession, MessageUid, RawMessage};
use querydesk::store::{InsertOutcome, PersistenceError, TicketSink};
use querydesk::ticket::{DedupKey, IdSource, RecordBuilder, TicketRecord};
use querydesk::{Classifier, HealthReporter, IngestionJob};

pub const FOLDER: &str = "INBOX";
pub const UIDVALIDITY: u32 = 7;

/// Parks a fetch until released.
#[derive(Default)]
pub struct FetchGate {
    pub entered: Notify,
    pub release: Notify,
}

struct StoredMessage {
    content: Vec<u8>,
    seen: bool,
}

#[derive(Default)]
struct MailboxState {
    messages: BTreeMap<u32, StoredMessage>,
    fail_connect: bool,
    fail_list: bool,
    fail_fetch: HashSet<u32>,
    fail_mark_seen: HashSet<u32>,
    gate: Option<Arc<FetchGate>>,
    connects: usize,
    closes: usize,
    fetches: Vec<u32>,
    mark_seen_calls: Vec<u32>,
}

/// Scripted mailbox shared between the test and the sessions it hands out.
#[derive(Clone, Default)]
pub struct FakeMailbox {
    state: Arc<Mutex<MailboxState>>,
}

impl FakeMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_message(&self, uid: u32, content: Vec<u8>) {
        self.state.lock().unwrap().messages.insert(
            uid,
            StoredMessage {
                content,
                seen: false,
            },
        );
    }

    pub fn fail_connect(&self) {
        self.state.lock().unwrap().fail_connect = true;
    }

    pub fn fail_list(&self) {
        self.state.lock().unwrap().fail_list = true;
    }

    pub fn fail_fetch(&self, uid: u32) {
        self.state.lock().unwrap().fail_fetch.insert(uid);
    }

    pub fn fail_mark_seen(&self, uid: u32) {
        self.state.lock().unwrap().fail_mark_seen.insert(uid);
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.lock().unwrap();
        state.fail_connect = false;
        state.fail_list = false;
        state.fail_fetch.clear();
        state.fail_mark_seen.clear();
    }

    /// Parks the next fetch on the returned gate.
    pub fn install_gate(&self) -> Arc<FetchGate> {
        let gate = Arc::new(FetchGate::default());
        self.state.lock().unwrap().gate = Some(Arc::clone(&gate));
        gate
    }

    pub fn is_seen(&self, uid: u32) -> bool {
        self.state
            .lock()
            .unwrap()
            .messages
            .get(&uid)
            .map(|m| m.seen)
            .unwrap_or(false)
    }

    pub fn unseen(&self) -> Vec<u32> {
        let state = self.state.lock().unwrap();
        state
            .messages
            .iter()
            .filter(|(_, m)| !m.seen)
            .map(|(uid, _)| *uid)
            .collect()
    }

    pub fn connects(&self) -> usize {
        self.state.lock().unwrap().connects
    }

    pub fn closes(&self) -> usize {
        self.state.lock().unwrap().closes
    }

    pub fn fetches(&self) -> Vec<u32> {
        self.state.lock().unwrap().fetches.clone()
    }

    pub fn mark_seen_calls(&self) -> Vec<u32> {
        self.state.lock().unwrap().mark_seen_calls.clone()
    }
}

#[async_trait]
impl MailboxConnector for FakeMailbox {
    async fn connect(&self) -> Result<Box<dyn MailboxSession>, MailboxError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_connect {
            return Err(MailboxError::ConnectionFailed(
                "connection refused".to_string(),
            ));
        }
        state.connects += 1;
        Ok(Box::new(FakeSession {
            state: Arc::clone(&self.state),
        }))
    }

    fn folder(&self) -> &str {
        FOLDER
    }
}

struct FakeSession {
    state: Arc<Mutex<MailboxState>>,
}

#[async_trait]
impl MailboxSession for FakeSession {
    async fn list_unseen(&mut self) -> Result<Vec<MessageUid>, MailboxError> {
        let state = self.state.lock().unwrap();
        if state.fail_list {
            return Err(MailboxError::ProtocolError("SEARCH failed".to_string()));
        }
        Ok(state
            .messages
            .iter()
            .filter(|(_, m)| !m.seen)
            .map(|(uid, _)| MessageUid::new(UIDVALIDITY, *uid))
            .collect())
    }

    async fn fetch(&mut self, uid: MessageUid) -> Result<RawMessage, MailboxError> {
        let gate = self.state.lock().unwrap().gate.take();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        let mut state = self.state.lock().unwrap();
        state.fetches.push(uid.uid);
        if state.fail_fetch.contains(&uid.uid) {
            return Err(MailboxError::Timeout("fetch".to_string()));
        }
        let message = state
            .messages
            .get(&uid.uid)
            .ok_or(MailboxError::MessageNotFound(uid.uid))?;
        Ok(RawMessage {
            uid,
            content: message.content.clone(),
        })
    }

    async fn mark_seen(&mut self, uid: MessageUid) -> Result<(), MailboxError> {
        let mut state = self.state.lock().unwrap();
        state.mark_seen_calls.push(uid.uid);
        if state.fail_mark_seen.contains(&uid.uid) {
            return Err(MailboxError::ProtocolError("STORE failed".to_string()));
        }
        if let Some(message) = state.messages.get_mut(&uid.uid) {
            message.seen = true;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), MailboxError> {
        self.state.lock().unwrap().closes += 1;
        Ok(())
    }
}

#[derive(Default)]
struct SinkState {
    records: Vec<TicketRecord>,
    failing_subjects: HashSet<String>,
    fail_exists: bool,
    stale_exists: bool,
    exists_calls: usize,
}

/// In-memory ticket sink that records every insert.
#[derive(Default)]
pub struct RecordingSink {
    state: Mutex<SinkState>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes inserts of tickets with this subject fail.
    pub fn fail_insert_for(&self, subject: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_subjects
            .insert(subject.to_string());
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.lock().unwrap();
        state.failing_subjects.clear();
        state.fail_exists = false;
    }

    pub fn fail_exists(&self, fail: bool) {
        self.state.lock().unwrap().fail_exists = fail;
    }

    /// Makes `exists` answer `false` even for stored keys, as when another
    /// writer stored the ticket between the check and the insert.
    pub fn stale_exists(&self, stale: bool) {
        self.state.lock().unwrap().stale_exists = stale;
    }

    pub fn records(&self) -> Vec<TicketRecord> {
        self.state.lock().unwrap().records.clone()
    }

    pub fn exists_calls(&self) -> usize {
        self.state.lock().unwrap().exists_calls
    }
}

#[async_trait]
impl TicketSink for RecordingSink {
    async fn exists(&self, key: &DedupKey) -> Result<bool, PersistenceError> {
        let mut state = self.state.lock().unwrap();
        state.exists_calls += 1;
        if state.fail_exists {
            return Err(PersistenceError::Rejected {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        if state.stale_exists {
            return Ok(false);
        }
        Ok(state.records.iter().any(|r| &r.dedup_key == key))
    }

    async fn insert(&self, record: &TicketRecord) -> Result<InsertOutcome, PersistenceError> {
        let mut state = self.state.lock().unwrap();
        if state.failing_subjects.contains(&record.subject) {
            return Err(PersistenceError::Rejected {
                status: 500,
                body: "insert failed".to_string(),
            });
        }
        if state.records.iter().any(|r| r.dedup_key == record.dedup_key) {
            return Ok(InsertOutcome::AlreadyPresent);
        }
        state.records.push(record.clone());
        Ok(InsertOutcome::Inserted)
    }
}

/// Deterministic ids: 1, 2, 3, ...
#[derive(Default)]
pub struct SequentialIds(AtomicU64);

impl IdSource for SequentialIds {
    fn next_id(&self) -> Uuid {
        Uuid::from_u128(u128::from(self.0.fetch_add(1, Ordering::SeqCst) + 1))
    }
}

/// Test harness wiring an ingestion job to the fakes.
pub struct TestHarness {
    pub mailbox: FakeMailbox,
    pub sink: Arc<RecordingSink>,
    pub health: HealthReporter,
}

impl TestHarness {
    pub fn new() -> Self {
        Self {
            mailbox: FakeMailbox::new(),
            sink: Arc::new(RecordingSink::new()),
            health: HealthReporter::new("support@example.com"),
        }
    }

    /// Job with default keywords and random ids.
    pub fn job(&self) -> IngestionJob {
        self.job_with_builder(RecordBuilder::default())
    }

    /// Job with deterministic ids.
    pub fn job_with_sequential_ids(&self) -> IngestionJob {
        self.job_with_builder(RecordBuilder::new(Arc::new(SequentialIds::default())))
    }

    fn job_with_builder(&self, builder: RecordBuilder) -> IngestionJob {
        IngestionJob::new(
            Arc::new(self.mailbox.clone()),
            Classifier::default(),
            builder,
            Arc::clone(&self.sink) as Arc<dyn TicketSink>,
        )
        .with_health(self.health.clone())
    }
}

/// Polls `condition` until it holds or the timeout elapses.
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Log output captured from `tracing` events on the current thread.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// Routes events emitted on this thread into the buffer until the guard
    /// is dropped. Pair with the single-threaded `#[tokio::test]` runtime.
    pub fn install() -> (Self, tracing::subscriber::DefaultGuard) {
        let logs = Self::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        (logs, tracing::subscriber::set_default(subscriber))
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
