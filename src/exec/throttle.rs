//! Progress throttling: coalesce raw output chunks into rate-limited
//! emissions.
//!
//! Sits between an executor's raw progress channel and the downstream sink.
//! Per (call, channel) pair, pending content is flushed when the throttle
//! window elapses or the size window fills, whichever first. Closing the
//! input channel flushes everything still pending, so a command that
//! finishes inside one window still delivers its full output — it just
//! produces no intermediate events.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::config::StreamSettings;
use crate::models::{ProgressKind, ProgressUpdate, ToolCallId};

/// Pending unflushed content for one (call, channel) pair.
struct PendingBatch {
    content: String,
    deadline: Instant,
}

/// Spawn the coalescing task.
///
/// Returns the raw sender to hand to executors and the task's join handle.
/// The task exits after the final flush once every raw sender is dropped.
/// `Status` updates bypass coalescing and are forwarded immediately.
#[must_use]
pub fn spawn_throttler(
    settings: &StreamSettings,
    downstream: mpsc::Sender<ProgressUpdate>,
) -> (mpsc::Sender<ProgressUpdate>, JoinHandle<()>) {
    let (raw_tx, raw_rx) = mpsc::channel(settings.event_channel_capacity);
    let window = settings.throttle_window();
    let size_cap = settings.throttle_bytes;
    let handle = tokio::spawn(run(raw_rx, downstream, window, size_cap));
    (raw_tx, handle)
}

async fn run(
    mut raw_rx: mpsc::Receiver<ProgressUpdate>,
    downstream: mpsc::Sender<ProgressUpdate>,
    window: std::time::Duration,
    size_cap: usize,
) {
    let mut pending: HashMap<(ToolCallId, ProgressKind), PendingBatch> = HashMap::new();

    loop {
        let next_deadline = pending.values().map(|batch| batch.deadline).min();

        tokio::select! {
            received = raw_rx.recv() => {
                let Some(update) = received else {
                    break;
                };
                handle_update(update, &mut pending, &downstream, window, size_cap).await;
            }
            () = sleep_until_or_never(next_deadline) => {
                flush_due(&mut pending, &downstream).await;
            }
        }
    }

    // Input closed: executor finished. Flush every pending batch so no
    // content is lost to throttling.
    let leftovers: Vec<_> = pending.drain().collect();
    for ((id, kind), batch) in leftovers {
        send(&downstream, ProgressUpdate::now(id, kind, batch.content)).await;
    }
}

async fn handle_update(
    update: ProgressUpdate,
    pending: &mut HashMap<(ToolCallId, ProgressKind), PendingBatch>,
    downstream: &mpsc::Sender<ProgressUpdate>,
    window: std::time::Duration,
    size_cap: usize,
) {
    if update.kind == ProgressKind::Status {
        send(downstream, update).await;
        return;
    }

    let key = (update.tool_call_id.clone(), update.kind);
    let batch = pending.entry(key).or_insert_with(|| PendingBatch {
        content: String::new(),
        deadline: Instant::now() + window,
    });
    batch.content.push_str(&update.content);

    if batch.content.len() >= size_cap {
        let key = (update.tool_call_id, update.kind);
        if let Some(batch) = pending.remove(&key) {
            let (id, kind) = key;
            send(downstream, ProgressUpdate::now(id, kind, batch.content)).await;
        }
    }
}

async fn flush_due(
    pending: &mut HashMap<(ToolCallId, ProgressKind), PendingBatch>,
    downstream: &mpsc::Sender<ProgressUpdate>,
) {
    let now = Instant::now();
    let due: Vec<_> = pending
        .iter()
        .filter(|(_, batch)| batch.deadline <= now)
        .map(|(key, _)| key.clone())
        .collect();
    for key in due {
        if let Some(batch) = pending.remove(&key) {
            let (id, kind) = key;
            send(downstream, ProgressUpdate::now(id, kind, batch.content)).await;
        }
    }
}

/// Sleep until `deadline`, or forever when there is nothing pending.
async fn sleep_until_or_never(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn send(downstream: &mpsc::Sender<ProgressUpdate>, update: ProgressUpdate) {
    if downstream.send(update).await.is_err() {
        // Downstream consumer is gone; keep draining so executors are
        // never blocked on a dead sink.
        debug!("progress downstream closed; coalesced batch dropped");
    }
}
