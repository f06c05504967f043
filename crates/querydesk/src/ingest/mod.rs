//! Mailbox ingestion: the per-cycle job and the scheduler that drives it.

pub mod error;
pub mod job;
pub mod scheduler;

pub use error::{FailureKind, IngestError};
pub use job::{CycleOutcome, CycleReport, IngestionJob};
pub use scheduler::IngestScheduler;
