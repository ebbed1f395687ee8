//! Core data types, time bucketing and payload normalization for forecast-etl
//!
//! This crate holds the canonical weather record and instant document
//! schema shared by the store, fetch and reconcile crates. Nothing here
//! performs I/O.

pub mod bucket;
pub mod normalize;
pub mod raw;
pub mod types;

pub use bucket::*;
pub use normalize::*;
pub use raw::RawPayload;
pub use types::*;
