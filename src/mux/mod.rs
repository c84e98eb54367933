//! Stream multiplexing: one ordered event sequence from many concurrent
//! producers.

pub mod event;
pub mod multiplexer;

pub use event::{SequencedEvent, StreamEvent};
pub use multiplexer::StreamMux;
