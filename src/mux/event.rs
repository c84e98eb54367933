//! Wire-level stream events.
//!
//! Tagged union consumed from the multiplexer's output. Conceptually one
//! JSON object per event, transport-agnostic; the tag field is `type` and
//! variant names are kebab-case on the wire.

use serde::{Deserialize, Serialize};

use crate::exec::request::ExecResult;
use crate::models::{ExecOutcome, ProgressUpdate, ToolCallId};

/// One event in the merged conversation/tool stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum StreamEvent {
    /// Incremental conversation text from the primary stream.
    TextDelta {
        /// Text fragment.
        delta: String,
    },
    /// A tool call has been announced.
    ToolCallStart {
        /// Call identity.
        tool_call_id: ToolCallId,
        /// Tool name as exposed to the model.
        name: String,
    },
    /// Incremental fragment of the call's argument payload.
    ToolCallArgDelta {
        /// Call identity.
        tool_call_id: ToolCallId,
        /// Raw argument fragment.
        delta: String,
    },
    /// Argument streaming finished; the full payload is available.
    ToolCallArgFinish {
        /// Call identity.
        tool_call_id: ToolCallId,
        /// Complete argument payload.
        args: serde_json::Value,
    },
    /// Incremental output or status for a running call.
    ToolProgress {
        /// Call identity.
        tool_call_id: ToolCallId,
        /// The coalesced update.
        progress: ProgressUpdate,
    },
    /// Terminal result for a call; emitted exactly once per started call.
    ToolResult {
        /// Call identity.
        tool_call_id: ToolCallId,
        /// Final captured result.
        result: ExecResult,
        /// Terminal outcome.
        outcome: ExecOutcome,
    },
}

impl StreamEvent {
    /// The call this event belongs to, when it is a tool event.
    #[must_use]
    pub fn tool_call_id(&self) -> Option<&ToolCallId> {
        match self {
            Self::TextDelta { .. } => None,
            Self::ToolCallStart { tool_call_id, .. }
            | Self::ToolCallArgDelta { tool_call_id, .. }
            | Self::ToolCallArgFinish { tool_call_id, .. }
            | Self::ToolProgress { tool_call_id, .. }
            | Self::ToolResult { tool_call_id, .. } => Some(tool_call_id),
        }
    }
}

/// A stream event stamped with its emission-time sequence number.
///
/// `seq` is assigned by the multiplexer at the single emission point and
/// increases monotonically across the whole stream; it is distinct from the
/// per-chunk timestamps inside progress updates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SequencedEvent {
    /// Total-order position on the wire.
    pub seq: u64,
    /// The event payload.
    #[serde(flatten)]
    pub event: StreamEvent,
}
