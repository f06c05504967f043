//! Ticket records created from ingested messages.

pub mod builder;
pub mod model;

pub use builder::{IdSource, RandomIds, RecordBuilder};
pub use model::{
    Channel, DedupKey, HistoryEntry, Priority, QueryType, Tags, TicketError, TicketRecord,
    TicketStatus,
};
