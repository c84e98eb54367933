#![forbid(unsafe_code)]

//! `agent-toolstream` — streaming tool-execution progress protocol.
//!
//! Multiplexes incremental child-process output (stdout, stderr, status)
//! with a primary conversation stream, keyed by tool-call identity, while
//! enforcing ordering, backpressure, buffering limits, and two-phase
//! cancellation.

pub mod config;
pub mod errors;
pub mod exec;
pub mod models;
pub mod mux;
pub mod orchestrator;
pub mod registry;

pub use config::StreamSettings;
pub use errors::{Result, StreamError};
