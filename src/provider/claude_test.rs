// ABOUTME: Tests for the Claude codec - system prompt handling, turn merging,
// ABOUTME: thinking blocks, finish reasons, and stream/full decode parity.

use serde_json::json;

use super::*;
use crate::error::CodecError;
use crate::message::{
    ContentPart, FinishReason, MediaSource, Message, MessageContent, StepParams, ToolCall,
};
use crate::step::ProviderCodec;
use crate::stream::StepStreamEvent;

fn encode(params: &StepParams) -> serde_json::Value {
    let request = ClaudeCodec::default().encode(params).unwrap();
    serde_json::to_value(request).unwrap()
}

fn event(value: serde_json::Value) -> ClaudeStreamEvent {
    serde_json::from_value(value).unwrap()
}

#[test]
fn test_system_and_developer_go_to_system_prompt() {
    let body = encode(&StepParams::new([
        Message::system("Be brief."),
        Message::developer("Answer in English."),
        Message::user("Hi"),
    ]));

    assert_eq!(body["system"], json!("Be brief.\n\nAnswer in English."));
    assert_eq!(body["messages"], json!([{"role": "user", "content": "Hi"}]));
    assert_eq!(body["max_tokens"], json!(CLAUDE_DEFAULT_MAX_TOKENS));
    assert_eq!(body["stream"], json!(false));
}

#[test]
fn test_consecutive_assistant_messages_merge() {
    let body = encode(&StepParams::new([
        Message::user("Hi"),
        Message::assistant("One."),
        Message::assistant("Two."),
    ]));

    assert_eq!(
        body["messages"][1],
        json!({
            "role": "assistant",
            "content": [
                {"type": "text", "text": "One."},
                {"type": "text", "text": "Two."}
            ]
        })
    );
    assert_eq!(body["messages"].as_array().unwrap().len(), 2);
}

#[test]
fn test_tool_results_become_user_turn() {
    let body = encode(&StepParams::new([
        Message::user("List files"),
        Message::assistant("").with_tool_calls(vec![
            ToolCall::new("toolu_1", "bash", r#"{"cmd":"ls"}"#),
            ToolCall::new("toolu_2", "pwd", ""),
        ]),
        Message::tool_result("toolu_1", "a.txt"),
        Message::tool_result("toolu_2", "/tmp"),
    ]));

    assert_eq!(
        body["messages"][1]["content"],
        json!([
            {"type": "tool_use", "id": "toolu_1", "name": "bash", "input": {"cmd": "ls"}},
            {"type": "tool_use", "id": "toolu_2", "name": "pwd", "input": {}}
        ])
    );
    assert_eq!(
        body["messages"][2],
        json!({
            "role": "user",
            "content": [
                {"type": "tool_result", "tool_use_id": "toolu_1", "content": "a.txt"},
                {"type": "tool_result", "tool_use_id": "toolu_2", "content": "/tmp"}
            ]
        })
    );
}

#[test]
fn test_image_tool_result_sent_as_blocks() {
    let content = MessageContent::Parts(vec![
        ContentPart::text("screenshot"),
        ContentPart::image_url("data:image/jpeg;base64,QUJD"),
    ]);
    let body = encode(&StepParams::new([Message::tool_result("toolu_1", content)]));

    assert_eq!(
        body["messages"][0]["content"][0]["content"],
        json!([
            {"type": "text", "text": "screenshot"},
            {
                "type": "image",
                "source": {"type": "base64", "media_type": "image/jpeg", "data": "QUJD"}
            }
        ])
    );
}

#[test]
fn test_media_sources() {
    let content = MessageContent::Parts(vec![
        ContentPart::image_url("https://example.com/cat.png"),
        ContentPart::Image(MediaSource::data("AAAA", None)),
        ContentPart::File(MediaSource {
            file_id: Some("file_1".into()),
            ..Default::default()
        }),
        ContentPart::File(MediaSource::data("UERG", None)),
    ]);
    let body = encode(&StepParams::new([Message::user(content)]));

    assert_eq!(
        body["messages"][0]["content"],
        json!([
            {"type": "image", "source": {"type": "url", "url": "https://example.com/cat.png"}},
            {"type": "image", "source": {
                "type": "base64", "media_type": "image/png", "data": "AAAA"
            }},
            {"type": "document", "source": {"type": "file", "file_id": "file_1"}},
            {"type": "document", "source": {
                "type": "base64", "media_type": "application/pdf", "data": "UERG"
            }}
        ])
    );
}

#[test]
fn test_audio_is_unsupported() {
    let content = MessageContent::Parts(vec![ContentPart::Audio(MediaSource::data(
        "AAAA",
        Some("wav".into()),
    ))]);
    let err = ClaudeCodec::default()
        .encode(&StepParams::new([Message::user(content)]))
        .unwrap_err();
    assert_eq!(err.to_string(), "claude does not support audio content");
}

#[test]
fn test_image_without_source_fails() {
    let content = MessageContent::Parts(vec![ContentPart::Image(MediaSource::default())]);
    let err = ClaudeCodec::default()
        .encode(&StepParams::new([Message::user(content)]))
        .unwrap_err();
    assert!(matches!(err, CodecError::MissingSource { kind: "image" }));
}

#[test]
fn test_thinking_blocks_replayed_first() {
    let mut assistant = Message::assistant("Answer");
    assistant
        .update_extra_ns::<ClaudeExtra, _>(|extra| {
            extra.thinking_blocks.push(ClaudeThinkingBlock::Thinking {
                thinking: "hmm".into(),
                signature: "sig".into(),
            })
        })
        .unwrap();

    let body = encode(&StepParams::new([Message::user("Q"), assistant]));
    assert_eq!(
        body["messages"][1]["content"],
        json!([
            {"type": "thinking", "thinking": "hmm", "signature": "sig"},
            {"type": "text", "text": "Answer"}
        ])
    );
}

#[test]
fn test_finish_reason_table() {
    assert_eq!(claude_finish_reason("end_turn"), FinishReason::Stop);
    assert_eq!(claude_finish_reason("stop_sequence"), FinishReason::Stop);
    assert_eq!(claude_finish_reason("max_tokens"), FinishReason::Length);
    assert_eq!(claude_finish_reason("tool_use"), FinishReason::ToolCalls);
    assert_eq!(claude_finish_reason("refusal"), FinishReason::ContentFilter);
    assert_eq!(claude_finish_reason("pause_turn"), FinishReason::Stop);
}

fn thinking_response() -> ClaudeResponse {
    serde_json::from_value(json!({
        "id": "msg_1",
        "model": "claude-sonnet-4-5",
        "content": [
            {"type": "thinking", "thinking": "First.", "signature": "s1"},
            {"type": "thinking", "thinking": "Second.", "signature": "s2"},
            {"type": "text", "text": "Done."},
            {"type": "tool_use", "id": "toolu_1", "name": "pwd", "input": {}},
            {"type": "server_tool_use", "id": "srv_1", "name": "web_search", "input": {}}
        ],
        "stop_reason": "tool_use",
        "usage": {"input_tokens": 12, "output_tokens": 30}
    }))
    .unwrap()
}

#[test]
fn test_decode_response() {
    let result = ClaudeCodec::default().decode(thinking_response()).unwrap();
    let message = result.message().unwrap();

    assert_eq!(message.role, "assistant");
    assert_eq!(message.content, MessageContent::from("Done."));
    assert_eq!(message.reasoning, Some(MessageContent::from("First.\nSecond.")));
    assert_eq!(message.tool_calls(), &[ToolCall::new("toolu_1", "pwd", "{}")]);
    assert_eq!(result.finish_reason, Some(FinishReason::ToolCalls));

    let extra = message.extra_ns::<ClaudeExtra>().unwrap().unwrap();
    assert_eq!(extra.thinking_blocks.len(), 2);

    let usage = result.token_usage.unwrap();
    assert_eq!((usage.input_tokens, usage.output_tokens), (12, 30));
}

#[tokio::test]
async fn test_stream_matches_full_response() {
    let full = ClaudeCodec::default().decode(thinking_response()).unwrap();

    let events = vec![
        event(json!({
            "type": "message_start",
            "message": {
                "id": "msg_1",
                "model": "claude-sonnet-4-5",
                "role": "assistant",
                "usage": {"input_tokens": 12, "output_tokens": 1}
            }
        })),
        event(json!({"type": "content_block_start", "index": 0,
            "content_block": {"type": "thinking", "thinking": "", "signature": ""}})),
        event(json!({"type": "content_block_delta", "index": 0,
            "delta": {"type": "thinking_delta", "thinking": "First."}})),
        event(json!({"type": "content_block_delta", "index": 0,
            "delta": {"type": "signature_delta", "signature": "s1"}})),
        event(json!({"type": "content_block_stop", "index": 0})),
        event(json!({"type": "content_block_start", "index": 1,
            "content_block": {"type": "thinking", "thinking": "", "signature": ""}})),
        event(json!({"type": "content_block_delta", "index": 1,
            "delta": {"type": "thinking_delta", "thinking": "Second."}})),
        event(json!({"type": "content_block_delta", "index": 1,
            "delta": {"type": "signature_delta", "signature": "s2"}})),
        event(json!({"type": "content_block_stop", "index": 1})),
        event(json!({"type": "ping"})),
        event(json!({"type": "content_block_start", "index": 2,
            "content_block": {"type": "text", "text": ""}})),
        event(json!({"type": "content_block_delta", "index": 2,
            "delta": {"type": "text_delta", "text": "Done."}})),
        event(json!({"type": "content_block_stop", "index": 2})),
        event(json!({"type": "content_block_start", "index": 3,
            "content_block": {"type": "tool_use", "id": "toolu_1", "name": "pwd", "input": {}}})),
        event(json!({"type": "content_block_stop", "index": 3})),
        event(json!({"type": "message_delta",
            "delta": {"stop_reason": "tool_use"}, "usage": {"output_tokens": 30}})),
        event(json!({"type": "message_stop"})),
    ];

    let (stream_events, streamed) = drain_stream(ClaudeStreamMapper::default(), events).await;

    assert_eq!(streamed, full);
    assert!(stream_events.contains(&StepStreamEvent::ToolCallDelta {
        index: 0,
        delta: "{}".into()
    }));
}

#[tokio::test]
async fn test_stream_tool_input_accumulates() {
    let events = vec![
        event(json!({"type": "message_start", "message": {"id": "msg_2", "model": "m"}})),
        event(json!({"type": "content_block_start", "index": 0,
            "content_block": {"type": "tool_use", "id": "toolu_9", "name": "bash", "input": {}}})),
        event(json!({"type": "content_block_delta", "index": 0,
            "delta": {"type": "input_json_delta", "partial_json": "{\"cmd\":"}})),
        event(json!({"type": "content_block_delta", "index": 0,
            "delta": {"type": "input_json_delta", "partial_json": "\"ls\"}"}})),
        event(json!({"type": "content_block_stop", "index": 0})),
    ];

    let (_, result) = drain_stream(ClaudeStreamMapper::default(), events).await;
    assert_eq!(
        result.message().unwrap().tool_calls(),
        &[ToolCall::new("toolu_9", "bash", r#"{"cmd":"ls"}"#)]
    );
}

#[tokio::test]
async fn test_stream_error_event_fails() {
    use futures::StreamExt;

    let chunks = vec![Ok::<_, crate::error::TransportError>(event(json!({
        "type": "error",
        "error": {"type": "overloaded_error", "message": "Overloaded"}
    })))];
    let mut stream = crate::stream::decode_stream(
        ClaudeStreamMapper::default(),
        futures::stream::iter(chunks),
    );

    let err = stream.next().await.unwrap().unwrap_err();
    assert!(err.to_string().contains("overloaded_error: Overloaded"));
    assert!(stream.next().await.is_none());
    assert!(stream.result().is_none());
}

#[tokio::test]
async fn test_stream_keeps_unterminated_thinking_block() {
    let events = vec![
        event(json!({"type": "message_start", "message": {"id": "msg_3", "model": "m"}})),
        event(json!({"type": "content_block_start", "index": 0,
            "content_block": {"type": "thinking", "thinking": "", "signature": ""}})),
        event(json!({"type": "content_block_delta", "index": 0,
            "delta": {"type": "thinking_delta", "thinking": "Halfway"}})),
        event(json!({"type": "content_block_delta", "index": 0,
            "delta": {"type": "signature_delta", "signature": "sig"}})),
    ];

    let (_, result) = drain_stream(ClaudeStreamMapper::default(), events).await;
    let message = result.message().unwrap();
    assert_eq!(message.reasoning, Some(MessageContent::from("Halfway")));

    let extra = message.extra_ns::<ClaudeExtra>().unwrap().unwrap();
    assert_eq!(
        extra.thinking_blocks,
        vec![ClaudeThinkingBlock::Thinking {
            thinking: "Halfway".to_string(),
            signature: "sig".to_string(),
        }]
    );
}

#[tokio::test]
async fn test_stream_ignores_unknown_event_types() {
    let events = vec![
        event(json!({"type": "message_start", "message": {"id": "msg_4", "model": "m"}})),
        event(json!({"type": "content_block_start", "index": 0,
            "content_block": {"type": "text", "text": "Hi"}})),
        event(json!({"type": "message_annotation", "annotation": {"kind": "new"}})),
        event(json!({"type": "content_block_stop", "index": 0})),
    ];

    let (_, result) = drain_stream(ClaudeStreamMapper::default(), events).await;
    assert_eq!(result.text(), "Hi");
}

#[test]
fn test_missing_usage_decodes_to_none() {
    let response: ClaudeResponse = serde_json::from_value(json!({
        "content": [{"type": "text", "text": "Hi"}],
        "stop_reason": "end_turn"
    }))
    .unwrap();

    let result = ClaudeCodec::default().decode(response).unwrap();
    assert_eq!(result.token_usage, None);
    assert_eq!(result.finish_reason, Some(FinishReason::Stop));
}
