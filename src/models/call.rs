//! Tool-call identity, outcome, and lifecycle phase.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier for one tool invocation.
///
/// Assigned by the conversation layer when a tool call begins; unique within
/// a conversation turn and never reused. Callers may supply their own ids or
/// use [`ToolCallId::generate`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ToolCallId(pub String);

impl ToolCallId {
    /// Generate a fresh random id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ToolCallId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ToolCallId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Terminal outcome of one tool-call execution.
///
/// A non-zero exit code is still `Success` at the protocol level; exit-code
/// interpretation belongs to the caller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecOutcome {
    /// Process exited on its own, with any exit code.
    Success,
    /// Process could not be started, or its exit could not be observed.
    Error,
    /// Execution ended by external cancellation.
    Cancelled,
    /// Execution ended because the timeout elapsed.
    Timeout,
}

impl ExecOutcome {
    /// The terminal [`CallPhase`] this outcome maps to.
    #[must_use]
    pub fn terminal_phase(self) -> CallPhase {
        match self {
            Self::Success => CallPhase::Completed,
            Self::Error | Self::Timeout => CallPhase::Failed,
            Self::Cancelled => CallPhase::Cancelled,
        }
    }
}

/// Lifecycle phase of one tool call.
///
/// `Pending → Running → {Completed | Failed | Cancelled}`. `Running` permits
/// a self-transition on each progress event. No transition leaves a terminal
/// phase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CallPhase {
    /// Call announced but the process has not started yet.
    Pending,
    /// Process running; progress events are valid.
    Running,
    /// Terminal: process exited on its own.
    Completed,
    /// Terminal: spawn failure or timeout.
    Failed,
    /// Terminal: externally cancelled.
    Cancelled,
}

impl CallPhase {
    /// Whether this phase is terminal.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether a transition from `self` to `next` is permitted.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        match self {
            Self::Pending => matches!(next, Self::Running) || next.is_terminal(),
            Self::Running => matches!(next, Self::Running) || next.is_terminal(),
            Self::Completed | Self::Failed | Self::Cancelled => false,
        }
    }
}
