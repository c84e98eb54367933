//! Core data model: tool-call identity, lifecycle, and progress updates.

pub mod call;
pub mod progress;

pub use call::{CallPhase, ExecOutcome, ToolCallId};
pub use progress::{ProgressKind, ProgressUpdate};
