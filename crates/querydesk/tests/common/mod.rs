//! Shared test utilities for querydesk integration tests.
//!
//! This module provides:
//! - `TestHarness` wiring an `IngestionJob` to a scripted mailbox and a
//!   recording ticket sink
//! - `MessageBuilder` for assembling raw RFC 5322 messages

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::*;
