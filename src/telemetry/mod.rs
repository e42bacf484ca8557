//! Request telemetry: a structured JSONL log of every backend exchange.
//!
//! Written by the HTTP wrapper, read back by `ccdash history`.

pub mod logger;

pub use logger::{RequestLog, RequestLogEntry, RequestOutcome};
