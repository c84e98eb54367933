//! Per-call orchestration: wires the executor, throttler, and multiplexer
//! together for one tool invocation.
//!
//! Sequence for a call: announce it on the stream, finish its argument
//! payload, run the command with throttled progress forwarded into the
//! multiplexer, then emit the terminal result. Spawn failures surface as a
//! terminal result with outcome `error`; the stream never sees them as
//! errors.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info_span, warn, Instrument};

use crate::config::StreamSettings;
use crate::exec::request::{ExecRequest, ExecResult};
use crate::exec::{execute, spawn_throttler};
use crate::mux::{StreamEvent, StreamMux};
use crate::Result;

/// Everything needed to run one tool call through the stream.
#[derive(Debug, Clone)]
pub struct ToolCallSpec {
    /// Tool name as announced to the consumer.
    pub name: String,
    /// Complete argument payload for the `tool-call-arg-finish` event.
    pub args: serde_json::Value,
    /// The command execution request (carries the call id).
    pub request: ExecRequest,
}

/// Run one tool call end to end.
///
/// Emits `tool-call-start` and `tool-call-arg-finish`, executes the command
/// with progress throttled per the settings, waits for all progress to be
/// forwarded, then emits exactly one `tool-result`. The returned result is
/// the same value carried by the terminal event.
///
/// # Errors
///
/// Returns `StreamError::Channel` only if the multiplexer pump has shut
/// down; execution failures resolve into the result's outcome instead.
pub async fn run_tool_call(
    mux: &StreamMux,
    settings: &StreamSettings,
    spec: ToolCallSpec,
    cancel: CancellationToken,
) -> Result<ExecResult> {
    let id = spec.request.tool_call_id.clone();
    let span = info_span!("tool_call", tool_call_id = %id, name = %spec.name);

    async {
        mux.emit(StreamEvent::ToolCallStart {
            tool_call_id: id.clone(),
            name: spec.name.clone(),
        })
        .await?;
        mux.emit(StreamEvent::ToolCallArgFinish {
            tool_call_id: id.clone(),
            args: spec.args.clone(),
        })
        .await?;

        // Throttler output feeds a forwarding task that wraps coalesced
        // updates into stream events. Progress must be fully forwarded
        // before the terminal result goes out.
        let (coalesced_tx, mut coalesced_rx) =
            mpsc::channel(settings.event_channel_capacity);
        let (raw_tx, throttle_handle) = spawn_throttler(settings, coalesced_tx);

        let forward_mux = mux.clone();
        let forward_handle = tokio::spawn(async move {
            while let Some(update) = coalesced_rx.recv().await {
                let event = StreamEvent::ToolProgress {
                    tool_call_id: update.tool_call_id.clone(),
                    progress: update,
                };
                if forward_mux.emit(event).await.is_err() {
                    warn!("multiplexer closed while forwarding progress");
                    break;
                }
            }
        });

        let result = execute(&spec.request, Some(raw_tx), cancel).await;

        // Executor dropped its raw senders; the throttler flushes and
        // exits, closing the coalesced channel, which ends the forwarder.
        if let Err(err) = throttle_handle.await {
            warn!(%err, "throttler task failed");
        }
        if let Err(err) = forward_handle.await {
            warn!(%err, "progress forwarder task failed");
        }

        mux.emit(StreamEvent::ToolResult {
            tool_call_id: id.clone(),
            result: result.clone(),
            outcome: result.outcome,
        })
        .await?;

        Ok(result)
    }
    .instrument(span)
    .await
}
