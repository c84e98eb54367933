//! Command executor: spawns one child process per tool invocation, captures
//! its output, and emits raw progress chunks as bytes arrive.
//!
//! Each channel (stdout, stderr) is drained by its own reader task feeding
//! a shared mpsc sink, so per-channel ordering is exact while cross-channel
//! interleaving stays unordered by design. The final result is produced
//! only after the exit status is known and both readers have drained — or,
//! when a grandchild keeps the pipe open past the drain bound, with
//! whatever had been captured by then.

use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

use crate::exec::request::{ExecRequest, ExecResult};
use crate::exec::terminate::terminate_child;
use crate::models::{ExecOutcome, ProgressKind, ProgressUpdate, ToolCallId};

/// Read granularity for child output pipes.
const READ_CHUNK_BYTES: usize = 4096;

/// Ratio of non-printable bytes in a chunk above which the channel is
/// treated as binary for the remainder of the call.
const BINARY_RATIO: f64 = 0.30;

/// Upper bound on waiting for pipe EOF after the child has exited. A
/// grandchild inheriting the pipe can hold it open arbitrarily long; past
/// this bound the captured output is taken as-is.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Captured state for one output channel, shared with its reader task so
/// partial output survives an aborted drain.
#[derive(Debug, Default)]
struct ChannelCapture {
    buf: BytesMut,
    truncated: bool,
}

type SharedCapture = Arc<Mutex<ChannelCapture>>;

/// Execute one command and resolve to its final result.
///
/// Raw chunks are forwarded unthrottled to `progress_tx` as they arrive;
/// coalescing is the throttler's concern. Every failure mode resolves to an
/// [`ExecResult`] — spawn failures carry [`ExecOutcome::Error`], timeouts
/// [`ExecOutcome::Timeout`], cancellation [`ExecOutcome::Cancelled`] — so
/// no error crosses the protocol boundary as a panic or stream error.
pub async fn execute(
    request: &ExecRequest,
    progress_tx: Option<mpsc::Sender<ProgressUpdate>>,
    cancel: CancellationToken,
) -> ExecResult {
    let span = info_span!(
        "execute",
        tool_call_id = %request.tool_call_id,
        program = %request.program
    );
    run(request, progress_tx, cancel).instrument(span).await
}

async fn run(
    request: &ExecRequest,
    progress_tx: Option<mpsc::Sender<ProgressUpdate>>,
    cancel: CancellationToken,
) -> ExecResult {
    let started = Instant::now();

    let mut cmd = Command::new(&request.program);
    cmd.args(&request.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &request.cwd {
        cmd.current_dir(dir);
    }

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => {
            warn!(%err, "failed to spawn command");
            return ExecResult::spawn_failure(format!("failed to spawn command: {err}"));
        }
    };

    let stdout_capture = SharedCapture::default();
    let stderr_capture = SharedCapture::default();

    let stdout_task = child.stdout.take().map(|pipe| {
        spawn_reader(
            pipe,
            request.tool_call_id.clone(),
            ProgressKind::Stdout,
            request.max_buffer_bytes,
            Arc::clone(&stdout_capture),
            progress_tx.clone(),
        )
    });
    let stderr_task = child.stderr.take().map(|pipe| {
        spawn_reader(
            pipe,
            request.tool_call_id.clone(),
            ProgressKind::Stderr,
            request.max_buffer_bytes,
            Arc::clone(&stderr_capture),
            progress_tx,
        )
    });

    // Await exit, external cancellation, or the timeout — whichever first.
    // Timeout is treated identically to cancellation, two-phase included.
    let (exit_code, outcome) = tokio::select! {
        waited = child.wait() => match waited {
            Ok(status) => (status.code(), ExecOutcome::Success),
            Err(err) => {
                warn!(%err, "failed waiting for child");
                (None, ExecOutcome::Error)
            }
        },
        () = cancel.cancelled() => {
            terminate(&mut child, request).await;
            (None, ExecOutcome::Cancelled)
        }
        () = sleep_or_never(request.timeout) => {
            info!(timeout = ?request.timeout, "execution timed out");
            terminate(&mut child, request).await;
            (None, ExecOutcome::Timeout)
        }
    };

    // The pipes close with the process, so the readers normally finish on
    // their own; the drain bound covers pipes inherited by grandchildren.
    drain_reader(stdout_task, ProgressKind::Stdout).await;
    drain_reader(stderr_task, ProgressKind::Stderr).await;

    let (stdout, stdout_truncated) = take_capture(&stdout_capture);
    let (stderr, stderr_truncated) = take_capture(&stderr_capture);

    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    info!(?outcome, exit_code, duration_ms, "execution finished");

    ExecResult {
        exit_code,
        stdout,
        stderr,
        duration_ms,
        outcome,
        stdout_truncated,
        stderr_truncated,
    }
}

async fn terminate(child: &mut tokio::process::Child, request: &ExecRequest) {
    if let Err(err) = terminate_child(child, request.grace_period).await {
        warn!(%err, "two-phase termination failed");
    }
}

async fn sleep_or_never(timeout: Option<Duration>) {
    match timeout {
        Some(limit) => tokio::time::sleep(limit).await,
        None => std::future::pending().await,
    }
}

async fn drain_reader(task: Option<JoinHandle<()>>, kind: ProgressKind) {
    let Some(mut handle) = task else {
        return;
    };
    match tokio::time::timeout(DRAIN_TIMEOUT, &mut handle).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(%err, ?kind, "reader task failed"),
        Err(_elapsed) => {
            // Aborting also drops the reader's progress sender, so the
            // throttler downstream still observes channel close.
            warn!(?kind, "pipe still open after child exit; abandoning drain");
            handle.abort();
        }
    }
}

fn take_capture(capture: &SharedCapture) -> (String, bool) {
    match capture.lock() {
        Ok(mut guard) => {
            let buf = std::mem::take(&mut guard.buf);
            (String::from_utf8_lossy(&buf).into_owned(), guard.truncated)
        }
        Err(poisoned) => {
            warn!("capture mutex poisoned; recovering contents");
            let guard = poisoned.into_inner();
            (
                String::from_utf8_lossy(&guard.buf).into_owned(),
                guard.truncated,
            )
        }
    }
}

/// Drain one output pipe, accumulating up to the buffer cap and forwarding
/// raw chunks as progress updates.
fn spawn_reader<R>(
    mut pipe: R,
    tool_call_id: ToolCallId,
    kind: ProgressKind,
    max_buffer_bytes: usize,
    capture: SharedCapture,
    progress_tx: Option<mpsc::Sender<ProgressUpdate>>,
) -> JoinHandle<()>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut binary = false;
        let mut sink = progress_tx;
        let mut chunk = [0u8; READ_CHUNK_BYTES];

        loop {
            let read = match pipe.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => &chunk[..n],
                Err(err) => {
                    warn!(%err, ?kind, "pipe read failed");
                    break;
                }
            };

            accumulate(&capture, read, max_buffer_bytes);

            if !binary && looks_binary(read) {
                binary = true;
                warn!(?kind, "channel looks binary; suppressing progress emission");
            }
            if binary {
                continue;
            }

            if let Some(tx) = &sink {
                let update = ProgressUpdate::now(
                    tool_call_id.clone(),
                    kind,
                    String::from_utf8_lossy(read).into_owned(),
                );
                if tx.send(update).await.is_err() {
                    // Throttler gone; stop emitting but keep accumulating.
                    sink = None;
                }
            }
        }
    })
}

/// Append a chunk under the hard result ceiling; bytes past it are dropped
/// from the stored result while streaming continues.
fn accumulate(capture: &SharedCapture, read: &[u8], max_buffer_bytes: usize) {
    let Ok(mut guard) = capture.lock() else {
        return;
    };
    if guard.buf.len() < max_buffer_bytes {
        let room = max_buffer_bytes - guard.buf.len();
        if read.len() > room {
            guard.buf.extend_from_slice(&read[..room]);
            guard.truncated = true;
        } else {
            guard.buf.extend_from_slice(read);
        }
    } else {
        guard.truncated = true;
    }
}

/// Heuristic for binary output: a high ratio of non-printable bytes in one
/// chunk, where non-printable means a control byte (excluding `\n`, `\r`,
/// `\t`) or a byte that is not part of a valid UTF-8 sequence. Multi-byte
/// text therefore stays printable while compressed or random high-byte
/// streams trip the ratio. A sequence truncated at the chunk edge is not
/// counted; the continuation arrives with the next read.
fn looks_binary(chunk: &[u8]) -> bool {
    if chunk.is_empty() {
        return false;
    }
    let mut non_printable = 0usize;
    let mut rest = chunk;
    loop {
        match std::str::from_utf8(rest) {
            Ok(text) => {
                non_printable += count_control_bytes(text.as_bytes());
                break;
            }
            Err(err) => {
                non_printable += count_control_bytes(&rest[..err.valid_up_to()]);
                let Some(bad) = err.error_len() else {
                    break;
                };
                non_printable += bad;
                rest = &rest[err.valid_up_to() + bad..];
            }
        }
    }
    #[allow(clippy::cast_precision_loss)]
    let ratio = non_printable as f64 / chunk.len() as f64;
    ratio > BINARY_RATIO
}

fn count_control_bytes(bytes: &[u8]) -> usize {
    bytes
        .iter()
        .filter(|&&b| (b < 0x20 && b != b'\n' && b != b'\r' && b != b'\t') || b == 0x7f)
        .count()
}
