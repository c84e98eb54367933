//! Wire-format contract for the tagged event stream: one JSON object per
//! event, `type` tag in kebab-case, camelCase field names.

use chrono::{TimeZone, Utc};
use serde_json::{json, Value};

use agent_toolstream::exec::ExecResult;
use agent_toolstream::models::{ExecOutcome, ProgressKind, ProgressUpdate, ToolCallId};
use agent_toolstream::mux::{SequencedEvent, StreamEvent};

fn to_value(event: &StreamEvent) -> Value {
    serde_json::to_value(event).expect("event must serialize")
}

/// `text-delta` carries only the fragment.
#[test]
fn text_delta_wire_shape() {
    let value = to_value(&StreamEvent::TextDelta { delta: "hi".into() });
    assert_eq!(value, json!({"type": "text-delta", "delta": "hi"}));
}

/// `tool-call-start` carries the id and tool name in camelCase.
#[test]
fn tool_call_start_wire_shape() {
    let value = to_value(&StreamEvent::ToolCallStart {
        tool_call_id: ToolCallId::from("c1"),
        name: "shell".into(),
    });
    assert_eq!(
        value,
        json!({"type": "tool-call-start", "toolCallId": "c1", "name": "shell"})
    );
}

/// `tool-call-arg-delta` carries a raw fragment.
#[test]
fn tool_call_arg_delta_wire_shape() {
    let value = to_value(&StreamEvent::ToolCallArgDelta {
        tool_call_id: ToolCallId::from("c1"),
        delta: "{\"cmd".into(),
    });
    assert_eq!(
        value,
        json!({"type": "tool-call-arg-delta", "toolCallId": "c1", "delta": "{\"cmd"})
    );
}

/// `tool-call-arg-finish` carries the complete argument payload.
#[test]
fn tool_call_arg_finish_wire_shape() {
    let value = to_value(&StreamEvent::ToolCallArgFinish {
        tool_call_id: ToolCallId::from("c1"),
        args: json!({"command": "ls"}),
    });
    assert_eq!(value["type"], "tool-call-arg-finish");
    assert_eq!(value["args"]["command"], "ls");
}

/// `tool-progress` nests the update with kind and timestamp.
#[test]
fn tool_progress_wire_shape() {
    let timestamp = Utc.with_ymd_and_hms(2026, 8, 24, 12, 0, 0).unwrap();
    let value = to_value(&StreamEvent::ToolProgress {
        tool_call_id: ToolCallId::from("c1"),
        progress: ProgressUpdate {
            tool_call_id: ToolCallId::from("c1"),
            kind: ProgressKind::Stderr,
            content: "warning".into(),
            timestamp,
        },
    });
    assert_eq!(value["type"], "tool-progress");
    assert_eq!(value["toolCallId"], "c1");
    assert_eq!(value["progress"]["kind"], "stderr");
    assert_eq!(value["progress"]["content"], "warning");
    assert!(value["progress"]["timestamp"].is_string());
}

/// `tool-result` carries the result and a snake_case outcome.
#[test]
fn tool_result_wire_shape() {
    let value = to_value(&StreamEvent::ToolResult {
        tool_call_id: ToolCallId::from("c1"),
        result: ExecResult {
            exit_code: Some(0),
            stdout: "done\n".into(),
            stderr: String::new(),
            duration_ms: 42,
            outcome: ExecOutcome::Success,
            stdout_truncated: false,
            stderr_truncated: false,
        },
        outcome: ExecOutcome::Success,
    });
    assert_eq!(value["type"], "tool-result");
    assert_eq!(value["outcome"], "success");
    assert_eq!(value["result"]["stdout"], "done\n");
    assert_eq!(value["result"]["exit_code"], 0);
}

/// A sequenced event flattens its payload next to `seq`.
#[test]
fn sequenced_event_flattens_payload() {
    let value = serde_json::to_value(SequencedEvent {
        seq: 7,
        event: StreamEvent::TextDelta { delta: "x".into() },
    })
    .expect("must serialize");
    assert_eq!(value, json!({"seq": 7, "type": "text-delta", "delta": "x"}));
}

/// Events round-trip through JSON without loss.
#[test]
fn events_round_trip() {
    let original = StreamEvent::ToolCallStart {
        tool_call_id: ToolCallId::from("c1"),
        name: "shell".into(),
    };
    let text = serde_json::to_string(&original).expect("serialize");
    let parsed: StreamEvent = serde_json::from_str(&text).expect("deserialize");
    assert_eq!(parsed, original);
}

/// Every tool event exposes its call id; text deltas have none.
#[test]
fn tool_call_id_accessor() {
    let start = StreamEvent::ToolCallStart {
        tool_call_id: ToolCallId::from("c1"),
        name: "shell".into(),
    };
    assert_eq!(start.tool_call_id(), Some(&ToolCallId::from("c1")));
    assert_eq!(StreamEvent::TextDelta { delta: String::new() }.tool_call_id(), None);
}
