//! Last-cycle health snapshot for an external status endpoint.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

use crate::ingest::{CycleOutcome, CycleReport, FailureKind};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// No cycle has finished yet.
    Starting,
    Ok,
    /// The last cycle could not reach or list the mailbox.
    Degraded,
}

/// Summary of the last cycle that ran.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum LastOutcome {
    Completed(CycleReport),
    Failed { kind: FailureKind, error: String },
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    pub status: HealthStatus,
    pub mailbox_user: String,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub last_outcome: Option<LastOutcome>,
}

impl HealthSnapshot {
    pub fn starting(mailbox_user: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Starting,
            mailbox_user: mailbox_user.into(),
            last_checked_at: None,
            last_outcome: None,
        }
    }

    /// Folds a cycle outcome into the snapshot. Skipped triggers leave it
    /// untouched; the cycle that held the lock reports for them.
    pub fn record(&mut self, outcome: &CycleOutcome, at: DateTime<Utc>) {
        match outcome {
            CycleOutcome::Skipped => return,
            CycleOutcome::Failed(e) => {
                self.status = HealthStatus::Degraded;
                self.last_outcome = Some(LastOutcome::Failed {
                    kind: e.kind(),
                    error: e.to_string(),
                });
            }
            CycleOutcome::Completed(report) => {
                self.status = HealthStatus::Ok;
                self.last_outcome = Some(LastOutcome::Completed(report.clone()));
            }
        }
        self.last_checked_at = Some(at);
    }
}

/// Publishing side of the health channel.
#[derive(Debug, Clone)]
pub struct HealthReporter {
    tx: watch::Sender<HealthSnapshot>,
}

impl HealthReporter {
    pub fn new(mailbox_user: impl Into<String>) -> Self {
        let (tx, _rx) = watch::channel(HealthSnapshot::starting(mailbox_user));
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<HealthSnapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        self.tx.borrow().clone()
    }

    pub fn publish(&self, outcome: &CycleOutcome, at: DateTime<Utc>) {
        self.tx.send_modify(|snapshot| snapshot.record(outcome, at));
    }
}
