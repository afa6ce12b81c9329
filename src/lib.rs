//! zper - write-ingestion workers for a per-topic persistence broker
//!
//! Workers receive multi-frame messages over a dealer connection, append
//! them to per-topic logs and acknowledge durable writes.

pub mod batch;
pub mod cli;
pub mod envelope;
pub mod log;
pub mod observability;
pub mod transport;
pub mod writer;
