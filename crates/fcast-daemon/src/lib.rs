//! Forecast ETL daemon
//!
//! Each cycle reads the location list and, one location at a time:
//! - fetches the current observation and the forecast series
//! - normalizes them into instant records
//! - reconciles them into the local staging store
//! - replicates the touched documents to the remote store of record

pub mod batch;
pub mod locations;
pub mod scheduler;
pub mod stores;

pub use batch::{BatchRunner, CycleSummary};
pub use locations::{parse_locations, read_locations};
pub use scheduler::Scheduler;
