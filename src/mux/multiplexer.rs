//! Stream multiplexer: the single emission point for all producers.
//!
//! Producers (the conversation text stream and every tool call's argument
//! and progress streams) hold clones of [`StreamMux`] and write
//! independently; one pump task serializes the writes, assigns sequence
//! numbers at emission time, applies registry effects, and forwards
//! [`SequencedEvent`]s to the single consumer.
//!
//! A disconnected consumer never stalls the pump: events keep draining and
//! registry state keeps advancing, delivery is simply skipped. A new
//! consumer installed via [`StreamMux::reconnect`] resumes from the next
//! sequence number; history is rebuilt from registry snapshots, never by
//! replaying raw bytes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::StreamSettings;
use crate::mux::event::{SequencedEvent, StreamEvent};
use crate::registry::ToolCallRegistry;
use crate::{Result, StreamError};

/// Shared pump state: consumer slot and sequence counter.
#[derive(Debug)]
struct MuxShared {
    consumer: Mutex<Option<mpsc::Sender<SequencedEvent>>>,
    last_seq: AtomicU64,
    capacity: usize,
}

/// Clone-able producer handle over the multiplexer.
#[derive(Debug, Clone)]
pub struct StreamMux {
    tx: mpsc::Sender<StreamEvent>,
    shared: Arc<MuxShared>,
}

impl StreamMux {
    /// Spawn the pump task and return the producer handle plus the initial
    /// consumer receiver.
    ///
    /// The pump runs until every producer handle is dropped or `cancel`
    /// fires.
    #[must_use]
    pub fn spawn(
        registry: ToolCallRegistry,
        settings: &StreamSettings,
        cancel: CancellationToken,
    ) -> (Self, mpsc::Receiver<SequencedEvent>) {
        let (tx, rx) = mpsc::channel(settings.event_channel_capacity);
        let (consumer_tx, consumer_rx) = mpsc::channel(settings.event_channel_capacity);
        let shared = Arc::new(MuxShared {
            consumer: Mutex::new(Some(consumer_tx)),
            last_seq: AtomicU64::new(0),
            capacity: settings.event_channel_capacity,
        });

        tokio::spawn(pump(rx, registry, Arc::clone(&shared), cancel));

        (Self { tx, shared }, consumer_rx)
    }

    /// Submit an event for sequencing and delivery.
    ///
    /// # Errors
    ///
    /// Returns `StreamError::Channel` if the pump has shut down.
    pub async fn emit(&self, event: StreamEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| StreamError::Channel("multiplexer pump has shut down".into()))
    }

    /// Sequence number of the most recently emitted event.
    #[must_use]
    pub fn last_seq(&self) -> u64 {
        self.shared.last_seq.load(Ordering::SeqCst)
    }

    /// Install a fresh consumer, replacing any previous one.
    ///
    /// Delivery resumes with the next emitted event; the caller rebuilds
    /// per-call history from registry snapshots.
    pub async fn reconnect(&self) -> mpsc::Receiver<SequencedEvent> {
        let (consumer_tx, consumer_rx) = mpsc::channel(self.shared.capacity);
        let mut slot = self.shared.consumer.lock().await;
        *slot = Some(consumer_tx);
        info!(last_seq = self.last_seq(), "stream consumer reconnected");
        consumer_rx
    }
}

/// The single emission point. Applies registry effects, enforces the
/// per-call phase machine, assigns sequence numbers, and delivers.
async fn pump(
    mut rx: mpsc::Receiver<StreamEvent>,
    registry: ToolCallRegistry,
    shared: Arc<MuxShared>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            received = rx.recv() => match received {
                Some(event) => event,
                None => break,
            },
            () = cancel.cancelled() => {
                info!("multiplexer pump shutting down");
                break;
            }
        };

        if !apply(&registry, &event).await {
            // Lifecycle violation or unknown call: logged upstream, the
            // event is discarded rather than crashing the stream.
            continue;
        }

        let seq = shared.last_seq.fetch_add(1, Ordering::SeqCst) + 1;
        deliver(&shared, SequencedEvent { seq, event }).await;
    }
}

/// Apply the event's registry effect. Returns whether the event is valid
/// for delivery under the per-call state machine.
async fn apply(registry: &ToolCallRegistry, event: &StreamEvent) -> bool {
    match event {
        StreamEvent::TextDelta { .. } => true,
        StreamEvent::ToolCallStart { tool_call_id, .. } => {
            registry.begin(tool_call_id.clone()).await
        }
        StreamEvent::ToolCallArgDelta { tool_call_id, .. }
        | StreamEvent::ToolCallArgFinish { tool_call_id, .. } => {
            // Argument streaming is valid only before the call turns
            // terminal.
            match registry.snapshot(tool_call_id).await {
                Some(state) if !state.phase.is_terminal() => true,
                Some(_) => {
                    warn!(%tool_call_id, "argument event after terminal phase discarded");
                    false
                }
                None => {
                    warn!(%tool_call_id, "argument event for unknown call discarded");
                    false
                }
            }
        }
        StreamEvent::ToolProgress { progress, .. } => registry.append_progress(progress).await,
        StreamEvent::ToolResult {
            tool_call_id,
            outcome,
            ..
        } => registry.complete(tool_call_id, *outcome).await,
    }
}

/// Attempt delivery to the current consumer; a closed consumer is detached
/// so the pump keeps draining producers.
///
/// The slot lock is never held across the send, so a full consumer cannot
/// block [`StreamMux::reconnect`].
async fn deliver(shared: &MuxShared, event: SequencedEvent) {
    let consumer = {
        let slot = shared.consumer.lock().await;
        match slot.as_ref() {
            Some(tx) => tx.clone(),
            None => {
                debug!(seq = event.seq, "no consumer attached; event not delivered");
                return;
            }
        }
    };
    if consumer.send(event).await.is_err() {
        warn!("stream consumer disconnected; draining without delivery");
        let mut slot = shared.consumer.lock().await;
        // A fresh consumer may have been installed while the send was in
        // flight; only detach the one that failed.
        if slot.as_ref().is_some_and(|tx| tx.same_channel(&consumer)) {
            *slot = None;
        }
    }
}
