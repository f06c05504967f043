pub mod classifier;
pub mod config;
pub mod db;
pub mod email;
pub mod error;
pub mod health;
pub mod ingest;
pub mod secrets;
pub mod store;
pub mod ticket;

pub use classifier::Classifier;
pub use config::{load_config, load_config_from, Config};
pub use email::{decode, ImapConnector, MailboxConnector, MailboxSession, ParsedMessage};
pub use error::{ConfigError, QuerydeskError, Result};
pub use health::{HealthReporter, HealthSnapshot, HealthStatus};
pub use ingest::{CycleOutcome, CycleReport, IngestError, IngestScheduler, IngestionJob};
pub use secrets::{resolve_secret, SecretError};
pub use store::{sink_from_settings, InsertOutcome, PersistenceError, TicketSink};
pub use ticket::{DedupKey, RecordBuilder, TicketRecord};
