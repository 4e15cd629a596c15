// ABOUTME: Tests for the streaming delta engine - event emission rules,
// ABOUTME: tool call accumulation by index, and finalization.

use super::*;
use crate::message::{ContentPart, MessageContent, MessageDelta, ToolCallDelta, role};

fn tool_delta(index: usize) -> ToolCallDelta {
    ToolCallDelta {
        index,
        ..Default::default()
    }
}

#[test]
fn test_role_emitted_once() {
    let mut state = StepStreamState::new();

    let events = state.apply_delta(MessageDelta::role("assistant"));
    assert_eq!(
        events,
        vec![StepStreamEvent::Role {
            role: "assistant".into()
        }]
    );

    let events = state.apply_delta(MessageDelta::role("assistant"));
    assert!(events.is_empty());
}

#[test]
fn test_content_delta_carries_fragment_only() {
    let mut state = StepStreamState::new();
    state.apply_delta(MessageDelta::content("Hello"));
    let events = state.apply_delta(MessageDelta::content(" world"));

    assert_eq!(
        events,
        vec![StepStreamEvent::ContentDelta {
            delta: MessageContent::from(" world")
        }]
    );
    assert_eq!(state.message().content, MessageContent::from("Hello world"));
}

#[test]
fn test_empty_fragments_emit_nothing() {
    let mut state = StepStreamState::new();
    let events = state.apply_delta(MessageDelta {
        content: Some(MessageContent::from("")),
        reasoning: Some(MessageContent::Parts(vec![])),
        ..Default::default()
    });
    assert!(events.is_empty());
    assert!(state.message().reasoning.is_none());
}

#[test]
fn test_rule_order_within_one_delta() {
    let mut state = StepStreamState::new();
    let events = state.apply_delta(MessageDelta {
        role: Some("assistant".into()),
        content: Some("a".into()),
        reasoning: Some("r".into()),
        refusal: Some("no".into()),
        tool_calls: Some(vec![ToolCallDelta {
            index: 0,
            id: Some("c1".into()),
            name: Some("f".into()),
            arguments: Some("{}".into()),
            ..Default::default()
        }]),
    });

    let kinds: Vec<&str> = events.iter().map(StepStreamEvent::event_type).collect();
    assert_eq!(
        kinds,
        vec![
            "role",
            "content.delta",
            "reasoning.delta",
            "refusal.delta",
            "tool_call.start",
            "tool_call.delta"
        ]
    );
}

#[test]
fn test_reasoning_and_refusal_accumulate() {
    let mut state = StepStreamState::new();
    state.apply_delta(MessageDelta::reasoning("step 1"));
    state.apply_delta(MessageDelta::reasoning(", step 2"));
    let events = state.apply_delta(MessageDelta::refusal("I can't"));

    assert_eq!(
        events,
        vec![StepStreamEvent::RefusalDelta {
            delta: MessageContent::from("I can't")
        }]
    );
    let (_, message) = state.finalize();
    assert_eq!(message.reasoning, Some(MessageContent::from("step 1, step 2")));
    assert_eq!(message.refusal, Some(MessageContent::from("I can't")));
}

#[test]
fn test_parts_content_never_reverts() {
    let mut state = StepStreamState::new();
    state.apply_delta(MessageDelta::content("look: "));
    state.apply_delta(MessageDelta::content(ContentPart::image_url("https://x/y.png")));
    state.apply_delta(MessageDelta::content("done"));

    let (_, message) = state.finalize();
    assert_eq!(
        message.content,
        MessageContent::Parts(vec![
            ContentPart::text("look: "),
            ContentPart::image_url("https://x/y.png"),
            ContentPart::text("done"),
        ])
    );
}

#[test]
fn test_tool_call_name_split_across_chunks() {
    let mut state = StepStreamState::new();

    let events = state.apply_delta(MessageDelta::tool_call(ToolCallDelta {
        id: Some("call_1".into()),
        name: Some("read_".into()),
        ..tool_delta(0)
    }));
    assert_eq!(
        events,
        vec![StepStreamEvent::ToolCallStart {
            index: 0,
            id: Some("call_1".into()),
            name: "read_".into()
        }]
    );

    // Already announced: further name fragments accumulate silently.
    let events = state.apply_delta(MessageDelta::tool_call(ToolCallDelta {
        name: Some("file".into()),
        ..tool_delta(0)
    }));
    assert!(events.is_empty());

    let (_, message) = state.finalize();
    assert_eq!(message.tool_calls()[0].name, "read_file");
}

#[test]
fn test_tool_call_start_waits_for_name() {
    let mut state = StepStreamState::new();

    let events = state.apply_delta(MessageDelta::tool_call(ToolCallDelta {
        id: Some("call_1".into()),
        ..tool_delta(0)
    }));
    assert!(events.is_empty());
    assert_eq!(state.tool_call_count(), 1);

    let events = state.apply_delta(MessageDelta::tool_call(ToolCallDelta {
        name: Some("bash".into()),
        ..tool_delta(0)
    }));
    assert_eq!(
        events,
        vec![StepStreamEvent::ToolCallStart {
            index: 0,
            id: Some("call_1".into()),
            name: "bash".into()
        }]
    );
}

#[test]
fn test_tool_call_id_overwrites() {
    let mut state = StepStreamState::new();
    state.apply_delta(MessageDelta::tool_call(ToolCallDelta {
        id: Some("first".into()),
        name: Some("f".into()),
        ..tool_delta(0)
    }));
    state.apply_delta(MessageDelta::tool_call(ToolCallDelta {
        id: Some("second".into()),
        ..tool_delta(0)
    }));

    let (_, message) = state.finalize();
    assert_eq!(message.tool_calls()[0].id.as_deref(), Some("second"));
}

#[test]
fn test_arguments_accumulate_in_arrival_order() {
    let mut state = StepStreamState::new();
    state.apply_delta(MessageDelta::tool_call(ToolCallDelta {
        name: Some("bash".into()),
        ..tool_delta(0)
    }));

    let mut fragments = Vec::new();
    for piece in [r#"{"com"#, r#"mand": "#, r#""ls"}"#] {
        let events = state.apply_delta(MessageDelta::tool_call(ToolCallDelta {
            arguments: Some(piece.into()),
            ..tool_delta(0)
        }));
        fragments.extend(events);
    }

    assert_eq!(
        fragments,
        vec![
            StepStreamEvent::ToolCallDelta {
                index: 0,
                delta: r#"{"com"#.into()
            },
            StepStreamEvent::ToolCallDelta {
                index: 0,
                delta: r#"mand": "#.into()
            },
            StepStreamEvent::ToolCallDelta {
                index: 0,
                delta: r#""ls"}"#.into()
            },
        ]
    );

    let (_, message) = state.finalize();
    assert_eq!(message.tool_calls()[0].arguments, r#"{"command": "ls"}"#);
}

#[test]
fn test_out_of_order_indices_finalize_sorted() {
    let mut state = StepStreamState::new();

    for index in [2, 0, 1] {
        let start = state.apply_delta(MessageDelta::tool_call(ToolCallDelta {
            id: Some(format!("call_{}", index)),
            name: Some(format!("tool_{}", index)),
            ..tool_delta(index)
        }));
        assert_eq!(start.len(), 1);

        let delta = state.apply_delta(MessageDelta::tool_call(ToolCallDelta {
            arguments: Some(format!("{{\"n\":{}}}", index)),
            ..tool_delta(index)
        }));
        assert_eq!(delta.len(), 1);
    }

    let (events, message) = state.finalize();

    let end_indices: Vec<usize> = events
        .iter()
        .map(|e| match e {
            StepStreamEvent::ToolCallEnd { index, .. } => *index,
            other => panic!("unexpected event {:?}", other),
        })
        .collect();
    assert_eq!(end_indices, vec![0, 1, 2]);

    let names: Vec<&str> = message.tool_calls().iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["tool_0", "tool_1", "tool_2"]);
    assert_eq!(message.tool_calls()[2].arguments, r#"{"n":2}"#);
}

#[test]
fn test_finalize_defaults_role_to_assistant() {
    let mut state = StepStreamState::new();
    state.apply_delta(MessageDelta::content("hi"));
    let (events, message) = state.finalize();

    assert!(events.is_empty());
    assert_eq!(message.role, role::ASSISTANT);
    assert!(message.tool_calls.is_none());
}

#[test]
fn test_finalize_keeps_streamed_role() {
    let mut state = StepStreamState::new();
    state.apply_delta(MessageDelta::role("model"));
    let (_, message) = state.finalize();
    assert_eq!(message.role, "model");
}
