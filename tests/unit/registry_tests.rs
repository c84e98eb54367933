//! Unit tests for the tool-call state registry.

use agent_toolstream::models::{CallPhase, ExecOutcome, ProgressKind, ProgressUpdate, ToolCallId};
use agent_toolstream::registry::ToolCallRegistry;

fn update(id: &ToolCallId, kind: ProgressKind, content: &str) -> ProgressUpdate {
    ProgressUpdate::now(id.clone(), kind, content.to_owned())
}

/// `begin` registers a call in the `Pending` phase with empty accumulators.
#[tokio::test]
async fn begin_creates_pending_state() {
    let registry = ToolCallRegistry::new(1024);
    let id = ToolCallId::from("call-1");

    assert!(registry.begin(id.clone()).await);

    let state = registry.snapshot(&id).await.expect("state must exist");
    assert_eq!(state.phase, CallPhase::Pending);
    assert!(state.accumulated_stdout.is_empty());
    assert!(state.outcome.is_none());
    assert!(state.completed_at.is_none());
}

/// Re-registering an id is rejected and keeps the original state.
#[tokio::test]
async fn duplicate_begin_is_rejected() {
    let registry = ToolCallRegistry::new(1024);
    let id = ToolCallId::from("call-1");

    assert!(registry.begin(id.clone()).await);
    registry
        .append_progress(&update(&id, ProgressKind::Stdout, "kept"))
        .await;

    assert!(!registry.begin(id.clone()).await, "second begin must be rejected");
    let state = registry.snapshot(&id).await.expect("state must exist");
    assert_eq!(state.accumulated_stdout, "kept");
}

/// Progress appends per channel and moves the call to `Running`; status
/// updates replace the status line.
#[tokio::test]
async fn append_progress_routes_channels() {
    let registry = ToolCallRegistry::new(1024);
    let id = ToolCallId::from("call-1");
    registry.begin(id.clone()).await;

    assert!(registry.append_progress(&update(&id, ProgressKind::Stdout, "out1")).await);
    assert!(registry.append_progress(&update(&id, ProgressKind::Stderr, "err1")).await);
    assert!(registry.append_progress(&update(&id, ProgressKind::Stdout, "out2")).await);
    assert!(registry.append_progress(&update(&id, ProgressKind::Status, "compiling")).await);
    assert!(registry.append_progress(&update(&id, ProgressKind::Status, "linking")).await);

    let state = registry.snapshot(&id).await.expect("state must exist");
    assert_eq!(state.phase, CallPhase::Running);
    assert_eq!(state.accumulated_stdout, "out1out2");
    assert_eq!(state.accumulated_stderr, "err1");
    assert_eq!(state.status_line.as_deref(), Some("linking"));
}

/// An update for an unregistered id is dropped without side effects.
#[tokio::test]
async fn unknown_id_update_is_dropped() {
    let registry = ToolCallRegistry::new(1024);
    let ghost = ToolCallId::from("ghost");

    assert!(!registry.append_progress(&update(&ghost, ProgressKind::Stdout, "x")).await);
    assert!(registry.snapshot(&ghost).await.is_none());
    assert!(!registry.complete(&ghost, ExecOutcome::Success).await);
}

/// `complete` is idempotent: the second call changes nothing.
#[tokio::test]
async fn complete_is_idempotent() {
    let registry = ToolCallRegistry::new(1024);
    let id = ToolCallId::from("call-1");
    registry.begin(id.clone()).await;

    assert!(registry.complete(&id, ExecOutcome::Success).await);
    let first = registry.snapshot(&id).await.expect("state must exist");

    assert!(
        !registry.complete(&id, ExecOutcome::Cancelled).await,
        "second complete must be ignored"
    );
    let second = registry.snapshot(&id).await.expect("state must exist");

    assert_eq!(second.outcome, Some(ExecOutcome::Success));
    assert_eq!(second.completed_at, first.completed_at);
    assert_eq!(second.phase, CallPhase::Completed);
}

/// Progress arriving after the terminal phase is discarded.
#[tokio::test]
async fn progress_after_terminal_is_discarded() {
    let registry = ToolCallRegistry::new(1024);
    let id = ToolCallId::from("call-1");
    registry.begin(id.clone()).await;
    registry.append_progress(&update(&id, ProgressKind::Stdout, "before")).await;
    registry.complete(&id, ExecOutcome::Cancelled).await;

    assert!(!registry.append_progress(&update(&id, ProgressKind::Stdout, "after")).await);

    let state = registry.snapshot(&id).await.expect("state must exist");
    assert_eq!(state.accumulated_stdout, "before");
    assert_eq!(state.phase, CallPhase::Cancelled);
}

/// Accumulators keep only the trailing window at the streaming cap.
#[tokio::test]
async fn accumulator_keeps_trailing_window() {
    let registry = ToolCallRegistry::new(8);
    let id = ToolCallId::from("call-1");
    registry.begin(id.clone()).await;

    registry.append_progress(&update(&id, ProgressKind::Stdout, "0123456789")).await;
    registry.append_progress(&update(&id, ProgressKind::Stdout, "abcd")).await;

    let state = registry.snapshot(&id).await.expect("state must exist");
    assert_eq!(state.accumulated_stdout, "6789abcd", "only the tail survives");
}

/// Tail trimming never splits a multi-byte character.
#[tokio::test]
async fn tail_trim_respects_utf8_boundaries() {
    let registry = ToolCallRegistry::new(4);
    let id = ToolCallId::from("call-1");
    registry.begin(id.clone()).await;

    // Each snowman is 3 bytes; a 4-byte cap cannot hold two of them and
    // must not cut through the middle of one.
    registry.append_progress(&update(&id, ProgressKind::Stdout, "☃☃☃")).await;

    let state = registry.snapshot(&id).await.expect("state must exist");
    assert_eq!(state.accumulated_stdout, "☃");
}

/// Two concurrent calls never contaminate each other's accumulated state.
#[tokio::test]
async fn concurrent_calls_are_isolated() {
    let registry = ToolCallRegistry::new(1024);
    let left = ToolCallId::from("left");
    let right = ToolCallId::from("right");
    registry.begin(left.clone()).await;
    registry.begin(right.clone()).await;

    let mut tasks = Vec::new();
    for n in 0..50 {
        let registry_left = registry.clone();
        let registry_right = registry.clone();
        let left = left.clone();
        let right = right.clone();
        tasks.push(tokio::spawn(async move {
            registry_left
                .append_progress(&ProgressUpdate::now(left, ProgressKind::Stdout, "L".into()))
                .await;
        }));
        tasks.push(tokio::spawn(async move {
            registry_right
                .append_progress(&ProgressUpdate::now(right, ProgressKind::Stdout, "R".into()))
                .await;
        }));
        let _ = n;
    }
    for task in tasks {
        task.await.expect("append task must not panic");
    }

    let left_state = registry.snapshot(&left).await.expect("left state");
    let right_state = registry.snapshot(&right).await.expect("right state");
    assert_eq!(left_state.accumulated_stdout, "L".repeat(50));
    assert_eq!(right_state.accumulated_stdout, "R".repeat(50));
}

/// Eviction removes the state; later updates are then unknown-id drops.
#[tokio::test]
async fn evict_removes_state() {
    let registry = ToolCallRegistry::new(1024);
    let id = ToolCallId::from("call-1");
    registry.begin(id.clone()).await;
    registry.complete(&id, ExecOutcome::Success).await;

    let evicted = registry.evict(&id).await.expect("evict must return the state");
    assert_eq!(evicted.outcome, Some(ExecOutcome::Success));
    assert!(registry.snapshot(&id).await.is_none());
    assert!(registry.is_empty().await);
    assert!(!registry.append_progress(&update(&id, ProgressKind::Stdout, "late")).await);
}
