//! Incremental progress updates attributed to a tool call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::call::ToolCallId;

/// Which channel a progress update belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProgressKind {
    /// Standard output of the child process.
    Stdout,
    /// Standard error of the child process.
    Stderr,
    /// Free-form status line (replaces, rather than appends to, prior status).
    Status,
}

/// One unit of incremental output for a tool call.
///
/// Immutable once emitted. `content` carries raw chunk text upstream of the
/// throttler and coalesced batches downstream of it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// Call this update belongs to.
    pub tool_call_id: ToolCallId,
    /// Source channel.
    pub kind: ProgressKind,
    /// Chunk content (lossy UTF-8 for raw process bytes).
    pub content: String,
    /// Wall-clock time the chunk was observed.
    pub timestamp: DateTime<Utc>,
}

impl ProgressUpdate {
    /// Build an update stamped with the current time.
    #[must_use]
    pub fn now(tool_call_id: ToolCallId, kind: ProgressKind, content: String) -> Self {
        Self {
            tool_call_id,
            kind,
            content,
            timestamp: Utc::now(),
        }
    }
}
