// ABOUTME: Tests for the OpenAI codec - request shape, media and tool
// ABOUTME: encoding, response decoding, and stream mapping.

use serde_json::json;

use super::*;
use crate::error::CodecError;
use crate::message::{
    ContentPart, FinishReason, FunctionDefinition, MediaSource, Message, MessageContent,
    StepParams, ToolCall,
};
use crate::step::ProviderCodec;
use crate::stream::StepStreamEvent;

fn encode(params: &StepParams) -> serde_json::Value {
    let request = OpenAICodec::default().encode(params).unwrap();
    serde_json::to_value(request).unwrap()
}

fn chunk(value: serde_json::Value) -> OpenAIStreamChunk {
    serde_json::from_value(value).unwrap()
}

#[test]
fn test_encode_minimal_request() {
    let body = encode(&StepParams::new([Message::user("Hi")]));
    assert_eq!(
        body,
        json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": "Hi"}],
            "stream": false
        })
    );
}

#[test]
fn test_set_streaming_requests_usage() {
    let codec = OpenAICodec::new("gpt-4o-mini").max_tokens(100);
    let mut request = codec.encode(&StepParams::new([Message::user("Hi")])).unwrap();
    codec.set_streaming(&mut request, true);

    let body = serde_json::to_value(&request).unwrap();
    assert_eq!(body["stream"], json!(true));
    assert_eq!(body["stream_options"], json!({"include_usage": true}));
    assert_eq!(body["max_completion_tokens"], json!(100));
    assert_eq!(body["model"], json!("gpt-4o-mini"));
}

#[test]
fn test_encode_functions_and_schema() {
    let params = StepParams::new([Message::user("weather?")])
        .function(FunctionDefinition::new(
            "get_weather",
            "Look up weather",
            json!({"type": "object"}),
        ))
        .response_schema("answer", json!({"type": "object"}));

    let body = encode(&params);
    assert_eq!(
        body["tools"],
        json!([{
            "type": "function",
            "function": {
                "name": "get_weather",
                "description": "Look up weather",
                "parameters": {"type": "object"}
            }
        }])
    );
    assert_eq!(
        body["response_format"],
        json!({
            "type": "json_schema",
            "json_schema": {"name": "answer", "schema": {"type": "object"}}
        })
    );
}

#[test]
fn test_encode_tool_call_and_result() {
    let params = StepParams::new([
        Message::assistant("").with_tool_calls(vec![ToolCall::new(
            "call_1",
            "bash",
            r#"{"cmd":"ls"}"#,
        )]),
        Message::tool_result("call_1", "a.txt"),
    ]);

    let body = encode(&params);
    assert_eq!(
        body["messages"][0]["tool_calls"],
        json!([{
            "type": "function",
            "id": "call_1",
            "function": {"name": "bash", "arguments": "{\"cmd\":\"ls\"}"}
        }])
    );
    assert_eq!(
        body["messages"][1],
        json!({"role": "tool", "content": "a.txt", "tool_call_id": "call_1"})
    );
}

#[test]
fn test_encode_inline_image_as_data_url() {
    let content = MessageContent::Parts(vec![
        ContentPart::text("What is this?"),
        ContentPart::Image(MediaSource::data("AAAA", None)),
    ]);
    let body = encode(&StepParams::new([Message::user(content)]));
    assert_eq!(
        body["messages"][0]["content"],
        json!([
            {"type": "text", "text": "What is this?"},
            {"type": "image_url", "image_url": {"url": "data:image/png;base64,AAAA"}}
        ])
    );
}

#[test]
fn test_encode_image_without_source_fails() {
    let content = MessageContent::Parts(vec![ContentPart::Image(MediaSource::default())]);
    let err = OpenAICodec::default()
        .encode(&StepParams::new([Message::user(content)]))
        .unwrap_err();
    assert!(matches!(err, CodecError::MissingSource { kind: "image" }));
}

#[test]
fn test_encode_audio_url_rejected() {
    let content = MessageContent::Parts(vec![ContentPart::Audio(MediaSource::url(
        "https://example.com/a.wav",
    ))]);
    let err = OpenAICodec::default()
        .encode(&StepParams::new([Message::user(content)]))
        .unwrap_err();
    assert!(matches!(err, CodecError::InvalidContent { .. }));
}

#[test]
fn test_encode_image_tool_result_unsupported() {
    let content = MessageContent::Parts(vec![ContentPart::image_url("https://x/y.png")]);
    let err = OpenAICodec::default()
        .encode(&StepParams::new([Message::tool_result("call_1", content)]))
        .unwrap_err();
    assert!(matches!(err, CodecError::Unsupported { .. }));
}

#[test]
fn test_decode_response() {
    let response: OpenAIResponse = serde_json::from_value(json!({
        "id": "chatcmpl-1",
        "model": "gpt-4o-2024-08-06",
        "choices": [{
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "type": "function",
                    "id": "call_9",
                    "function": {"name": "bash", "arguments": "{}"}
                }]
            },
            "finish_reason": "tool_calls"
        }],
        "usage": {
            "prompt_tokens": 10,
            "completion_tokens": 5,
            "total_tokens": 15,
            "prompt_tokens_details": {"cached_tokens": 4}
        }
    }))
    .unwrap();

    let result = OpenAICodec::default().decode(response).unwrap();
    let message = result.message().unwrap();
    assert_eq!(message.role, "assistant");
    assert_eq!(message.content, MessageContent::from(""));
    assert_eq!(message.tool_calls(), &[ToolCall::new("call_9", "bash", "{}")]);
    assert_eq!(result.finish_reason, Some(FinishReason::ToolCalls));

    let usage = result.token_usage.unwrap();
    assert_eq!(usage.input_tokens, 10);
    assert_eq!(usage.output_tokens, 5);
    assert_eq!(usage.cache_read_tokens, Some(4));

    let metadata = result.metadata.unwrap();
    assert_eq!(metadata.id.as_deref(), Some("chatcmpl-1"));
}

#[test]
fn test_decode_single_text_part_collapses() {
    let message: OpenAIMessage = serde_json::from_value(json!({
        "role": "assistant",
        "content": [{"type": "text", "text": "Hello"}]
    }))
    .unwrap();
    assert_eq!(decode_openai_message(message).content, MessageContent::from("Hello"));
}

#[test]
fn test_decode_passes_unknown_finish_reason() {
    let response: OpenAIResponse = serde_json::from_value(json!({
        "choices": [{
            "message": {"role": "assistant", "content": "ok"},
            "finish_reason": "function_call"
        }]
    }))
    .unwrap();

    let result = OpenAICodec::default().decode(response).unwrap();
    assert_eq!(
        result.finish_reason,
        Some(FinishReason::Other("function_call".into()))
    );
    assert!(result.metadata.is_none());
}

#[test]
fn test_decode_without_choices_fails() {
    let response: OpenAIResponse = serde_json::from_value(json!({"choices": []})).unwrap();
    let err = OpenAICodec::default().decode(response).unwrap_err();
    assert!(matches!(err, CodecError::MissingField { field: "choices", .. }));
}

#[tokio::test]
async fn test_stream_text_and_tool_call() {
    let chunks = vec![
        chunk(json!({
            "id": "chatcmpl-2",
            "model": "gpt-4o",
            "choices": [{"delta": {"role": "assistant", "content": ""}}]
        })),
        chunk(json!({"choices": [{"delta": {"content": "Let me check"}}]})),
        chunk(json!({"choices": [{"delta": {"tool_calls": [{
            "index": 0, "id": "call_1", "function": {"name": "bash", "arguments": ""}
        }]}}]})),
        chunk(json!({"choices": [{"delta": {"tool_calls": [{
            "index": 0, "function": {"arguments": "{\"cmd\":"}
        }]}}]})),
        chunk(json!({"choices": [{"delta": {"tool_calls": [{
            "index": 0, "function": {"arguments": "\"ls\"}"}
        }]}}]})),
        chunk(json!({"choices": [{"delta": {}, "finish_reason": "tool_calls"}]})),
        chunk(json!({
            "choices": [],
            "usage": {"prompt_tokens": 3, "completion_tokens": 7}
        })),
    ];

    let (events, result) = drain_stream(OpenAIStreamMapper::default(), chunks).await;

    let kinds: Vec<&str> = events.iter().map(StepStreamEvent::event_type).collect();
    assert_eq!(
        kinds,
        vec![
            "stream.start",
            "role",
            "content.delta",
            "tool_call.start",
            "tool_call.delta",
            "tool_call.delta",
            "tool_call.end",
            "stream.end",
        ]
    );

    let message = result.message().unwrap();
    assert_eq!(message.content, MessageContent::from("Let me check"));
    assert_eq!(
        message.tool_calls(),
        &[ToolCall::new("call_1", "bash", r#"{"cmd":"ls"}"#)]
    );
    assert_eq!(result.finish_reason, Some(FinishReason::ToolCalls));
    assert_eq!(result.token_usage.unwrap().output_tokens, 7);
    assert_eq!(
        result.metadata.unwrap().model.as_deref(),
        Some("gpt-4o")
    );
}

#[tokio::test]
async fn test_stream_matches_full_response() {
    let response: OpenAIResponse = serde_json::from_value(json!({
        "id": "chatcmpl-3",
        "model": "gpt-4o",
        "choices": [{
            "message": {"role": "assistant", "content": "Hello there"},
            "finish_reason": "stop"
        }]
    }))
    .unwrap();
    let full = OpenAICodec::default().decode(response).unwrap();

    let chunks = vec![
        chunk(json!({
            "id": "chatcmpl-3",
            "model": "gpt-4o",
            "choices": [{"delta": {"role": "assistant", "content": "Hello"}}]
        })),
        chunk(json!({"choices": [{"delta": {"content": " there"}, "finish_reason": "stop"}]})),
    ];
    let (_, streamed) = drain_stream(OpenAIStreamMapper::default(), chunks).await;

    assert_eq!(streamed, full);
}
