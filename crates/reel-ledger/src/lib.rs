//! Job ledger for ReelForge.
//!
//! This crate provides:
//! - The [`JobLedger`] store of record, written only by the orchestrator
//! - A Redis implementation with a per-user latest-job index
//! - An in-memory implementation for tests and single-process runs
//! - The read-only status projection served to pollers

pub mod config;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod projection;
pub mod redis_ledger;

pub use config::{LedgerBackend, LedgerConfig};
pub use error::{LedgerError, LedgerResult};
pub use ledger::{connect, JobLedger};
pub use memory::MemoryLedger;
pub use projection::JobStatusView;
pub use redis_ledger::RedisLedger;
