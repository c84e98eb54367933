//! Two-phase process termination and the cancellation controller.
//!
//! Termination protocol: send a graceful signal (SIGTERM on unix), wait up
//! to the grace period for exit, then force a kill. The caller's result is
//! produced only once exit is confirmed, so accumulated output is always
//! consistent at resolution time.

use std::time::Duration;

use tokio::process::Child;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How a terminated child actually exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationKind {
    /// Exited within the grace period after the graceful signal.
    Graceful,
    /// Had to be forcibly killed after the grace period elapsed.
    Forced,
}

/// Handle that requests termination of an executor's child process.
///
/// Wraps a [`CancellationToken`]; the executor observes the token and runs
/// the two-phase termination protocol when it fires. Triggering after the
/// process has already exited is a no-op.
#[derive(Debug, Clone, Default)]
pub struct CancellationController {
    token: CancellationToken,
}

impl CancellationController {
    /// Create a controller with a fresh token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Token to hand to [`execute`](crate::exec::execute).
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Request termination. Idempotent.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    /// Whether termination has been requested.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Terminate `child` gracefully, escalating to a forced kill after `grace`.
///
/// Returns the exit status together with how termination was achieved.
/// The future resolves only once the process is confirmed dead, bounding
/// every cancellation path at `grace` plus the kill latency.
///
/// # Errors
///
/// Returns the underlying I/O error if waiting on the process fails.
pub async fn terminate_child(
    child: &mut Child,
    grace: Duration,
) -> std::io::Result<(std::process::ExitStatus, TerminationKind)> {
    send_graceful_signal(child);

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => {
            debug!("child exited within grace period");
            Ok((status?, TerminationKind::Graceful))
        }
        Err(_elapsed) => {
            warn!(grace = ?grace, "grace period elapsed; forcing kill");
            child.kill().await?;
            let status = child.wait().await?;
            Ok((status, TerminationKind::Forced))
        }
    }
}

/// Ask the child to exit without forcing it.
///
/// On unix this is SIGTERM, giving the process a chance to flush and clean
/// up. Elsewhere there is no graceful equivalent, so the kill is started
/// immediately and the grace period only bounds reaping.
#[cfg(unix)]
fn send_graceful_signal(child: &Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        // Already exited; wait() below will return the stored status.
        return;
    };
    #[allow(clippy::cast_possible_wrap)]
    let pid = Pid::from_raw(pid as i32);
    if let Err(err) = kill(pid, Signal::SIGTERM) {
        warn!(%err, "failed to send SIGTERM; relying on forced kill");
    }
}

#[cfg(not(unix))]
fn send_graceful_signal(child: &mut Child) {
    // No portable graceful signal; start the kill right away.
    if let Err(err) = child.start_kill() {
        warn!(%err, "failed to start kill");
    }
}
