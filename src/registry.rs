//! Tool-call state registry.
//!
//! The single place renderers query "what has happened for this call so
//! far". One shared `Arc<Mutex<HashMap>>` keyed by [`ToolCallId`]; every
//! mutation goes through the registry's own operations, so concurrent
//! executors for different calls never corrupt each other's state.
//!
//! Unknown-id updates and progress arriving after a terminal phase are
//! protocol defects upstream, not fatal conditions here: both are logged
//! with `warn!` and dropped.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::models::{CallPhase, ExecOutcome, ProgressKind, ProgressUpdate, ToolCallId};

/// Per-call accumulated state, owned exclusively by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallState {
    /// Call this state belongs to.
    pub id: ToolCallId,
    /// Current lifecycle phase.
    pub phase: CallPhase,
    /// Stdout accumulated so far, tail-capped at the streaming cap.
    pub accumulated_stdout: String,
    /// Stderr accumulated so far, tail-capped at the streaming cap.
    pub accumulated_stderr: String,
    /// Most recent status line, if any.
    pub status_line: Option<String>,
    /// When the call was registered.
    pub started_at: DateTime<Utc>,
    /// When the call reached a terminal phase.
    pub completed_at: Option<DateTime<Utc>>,
    /// Terminal outcome, set exactly once by `complete`.
    pub outcome: Option<ExecOutcome>,
}

impl ToolCallState {
    fn new(id: ToolCallId) -> Self {
        Self {
            id,
            phase: CallPhase::Pending,
            accumulated_stdout: String::new(),
            accumulated_stderr: String::new(),
            status_line: None,
            started_at: Utc::now(),
            completed_at: None,
            outcome: None,
        }
    }
}

/// Shared registry of active and recently-completed tool calls.
#[derive(Debug, Clone)]
pub struct ToolCallRegistry {
    calls: Arc<Mutex<HashMap<ToolCallId, ToolCallState>>>,
    streaming_cap: usize,
}

impl ToolCallRegistry {
    /// Create an empty registry with the given live-view tail cap.
    #[must_use]
    pub fn new(streaming_cap_bytes: usize) -> Self {
        Self {
            calls: Arc::new(Mutex::new(HashMap::new())),
            streaming_cap: streaming_cap_bytes,
        }
    }

    /// Register a new call in the `Pending` phase.
    ///
    /// Re-registering an id that is still present is a protocol defect;
    /// the existing state is kept, a warning is logged, and `false` is
    /// returned.
    pub async fn begin(&self, id: ToolCallId) -> bool {
        let mut guard = self.calls.lock().await;
        if guard.contains_key(&id) {
            warn!(tool_call_id = %id, "begin called for an already-registered call");
            return false;
        }
        guard.insert(id.clone(), ToolCallState::new(id));
        true
    }

    /// Append a progress update to the matching channel accumulator and
    /// move the call to `Running`.
    ///
    /// `Status` updates replace the status line instead of appending.
    /// Updates for unknown ids or terminal calls are dropped with a warning
    /// and `false` is returned.
    pub async fn append_progress(&self, update: &ProgressUpdate) -> bool {
        let mut guard = self.calls.lock().await;
        let Some(state) = guard.get_mut(&update.tool_call_id) else {
            warn!(
                tool_call_id = %update.tool_call_id,
                "progress update for unregistered call dropped"
            );
            return false;
        };
        if !state.phase.can_transition_to(CallPhase::Running) {
            warn!(
                tool_call_id = %update.tool_call_id,
                phase = ?state.phase,
                "progress update after terminal phase dropped"
            );
            return false;
        }
        state.phase = CallPhase::Running;
        match update.kind {
            ProgressKind::Stdout => {
                state.accumulated_stdout.push_str(&update.content);
                tail_trim(&mut state.accumulated_stdout, self.streaming_cap);
            }
            ProgressKind::Stderr => {
                state.accumulated_stderr.push_str(&update.content);
                tail_trim(&mut state.accumulated_stderr, self.streaming_cap);
            }
            ProgressKind::Status => {
                state.status_line = Some(update.content.clone());
            }
        }
        true
    }

    /// Mark a call terminal with the given outcome.
    ///
    /// Idempotent: a second call for the same id is ignored and leaves
    /// `completed_at` and `outcome` unchanged (`false` is returned).
    pub async fn complete(&self, id: &ToolCallId, outcome: ExecOutcome) -> bool {
        let mut guard = self.calls.lock().await;
        let Some(state) = guard.get_mut(id) else {
            warn!(tool_call_id = %id, "complete called for unregistered call");
            return false;
        };
        if state.phase.is_terminal() {
            debug!(tool_call_id = %id, "complete called twice; ignoring");
            return false;
        }
        state.phase = outcome.terminal_phase();
        state.outcome = Some(outcome);
        state.completed_at = Some(Utc::now());
        true
    }

    /// Immutable copy of the current state for rendering.
    pub async fn snapshot(&self, id: &ToolCallId) -> Option<ToolCallState> {
        self.calls.lock().await.get(id).cloned()
    }

    /// Remove a call's state once the consumer no longer needs it.
    ///
    /// Takes the same lock as `append_progress`, so eviction cannot race an
    /// in-flight update.
    pub async fn evict(&self, id: &ToolCallId) -> Option<ToolCallState> {
        self.calls.lock().await.remove(id)
    }

    /// Number of calls currently tracked.
    pub async fn len(&self) -> usize {
        self.calls.lock().await.len()
    }

    /// Whether the registry tracks no calls.
    pub async fn is_empty(&self) -> bool {
        self.calls.lock().await.is_empty()
    }
}

/// Trim the front of `buf` so at most `cap` bytes remain, respecting UTF-8
/// boundaries. Keeps the trailing window.
fn tail_trim(buf: &mut String, cap: usize) {
    if buf.len() <= cap {
        return;
    }
    let mut cut = buf.len() - cap;
    while cut < buf.len() && !buf.is_char_boundary(cut) {
        cut += 1;
    }
    buf.drain(..cut);
}
