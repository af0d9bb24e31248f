//! Streams one assistant turn from an OpenAI-compatible chat endpoint.
//!
//! Every delivery is tagged with the stream id it belongs to so the
//! conversation loop can drop chunks from superseded streams.

use std::time::Duration;

use futures_util::StreamExt;
use memchr::memchr;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::api::{ChatMessage, ChatRequest, ChatResponse};
use crate::utils::url::construct_api_url;

#[derive(Clone, Debug, PartialEq)]
pub enum StreamMessage {
    Chunk(String),
    Error(String),
    End,
}

pub type StreamDelivery = (StreamMessage, u64);

fn extract_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

fn handle_data_payload(
    payload: &str,
    tx: &mpsc::UnboundedSender<StreamDelivery>,
    stream_id: u64,
) -> bool {
    if payload == "[DONE]" {
        let _ = tx.send((StreamMessage::End, stream_id));
        return true;
    }

    match serde_json::from_str::<ChatResponse>(payload) {
        Ok(response) => {
            if let Some(content) = response
                .choices
                .first()
                .and_then(|choice| choice.delta.content.as_ref())
            {
                let _ = tx.send((StreamMessage::Chunk(content.clone()), stream_id));
            }
            false
        }
        Err(_) => {
            if payload.trim().is_empty() {
                return false;
            }

            let _ = tx.send((StreamMessage::Error(format_api_error(payload)), stream_id));
            let _ = tx.send((StreamMessage::End, stream_id));
            true
        }
    }
}

fn process_sse_line(
    line: &str,
    tx: &mpsc::UnboundedSender<StreamDelivery>,
    stream_id: u64,
) -> bool {
    extract_data_payload(line)
        .map(|payload| handle_data_payload(payload, tx, stream_id))
        .unwrap_or(false)
}

fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value
                .get("error")
                .and_then(|v| v.as_str().map(str::to_owned))
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        });

    summary.map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
}

pub fn format_api_error(error_text: &str) -> String {
    let trimmed = error_text.trim();

    if trimmed.is_empty() {
        return "API Error:\n```\n<empty>\n```".to_string();
    }

    if let Ok(json_value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Ok(pretty_json) = serde_json::to_string_pretty(&json_value) {
            return match extract_error_summary(&json_value).filter(|s| !s.is_empty()) {
                Some(summary) => format!("API Error: {summary}\n```\n{pretty_json}\n```"),
                None => format!("API Error:\n```\n{pretty_json}\n```"),
            };
        }
    }

    format!("API Error:\n```\n{trimmed}\n```")
}

pub struct StreamParams {
    pub client: reqwest::Client,
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub system_prompt: String,
    pub api_messages: Vec<ChatMessage>,
    pub max_duration: Duration,
    pub cancel_token: tokio_util::sync::CancellationToken,
    pub stream_id: u64,
}

#[derive(Clone)]
pub struct ChatStreamService {
    tx: mpsc::UnboundedSender<StreamDelivery>,
}

impl ChatStreamService {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StreamDelivery>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn spawn_stream(&self, params: StreamParams) {
        let tx = self.tx.clone();
        let stream_id = params.stream_id;
        let cancel_token = params.cancel_token.clone();
        let max_duration = params.max_duration;

        tokio::spawn(async move {
            tokio::select! {
                outcome = tokio::time::timeout(max_duration, run_stream(params, tx.clone())) => {
                    if outcome.is_err() {
                        warn!(stream_id, ?max_duration, "stream exceeded its duration bound");
                        let _ = tx.send((
                            StreamMessage::Error(format!(
                                "Response timed out after {} seconds",
                                max_duration.as_secs()
                            )),
                            stream_id,
                        ));
                        let _ = tx.send((StreamMessage::End, stream_id));
                    }
                }
                _ = cancel_token.cancelled() => {
                    debug!(stream_id, "stream cancelled");
                }
            }
        });
    }

    #[cfg(test)]
    pub fn send_for_test(&self, message: StreamMessage, stream_id: u64) {
        let _ = self.tx.send((message, stream_id));
    }
}

async fn run_stream(params: StreamParams, tx: mpsc::UnboundedSender<StreamDelivery>) {
    let StreamParams {
        client,
        base_url,
        api_key,
        model,
        system_prompt,
        api_messages,
        cancel_token,
        stream_id,
        ..
    } = params;

    let mut messages = Vec::with_capacity(api_messages.len() + 1);
    messages.push(ChatMessage::new("system", system_prompt));
    messages.extend(api_messages);

    let request = ChatRequest {
        model,
        messages,
        stream: true,
    };

    let chat_url = construct_api_url(&base_url, "chat/completions");
    debug!(stream_id, url = %chat_url, "starting chat stream");
    let mut http_request = client
        .post(chat_url)
        .header("Content-Type", "application/json");
    if let Some(key) = api_key.filter(|key| !key.is_empty()) {
        http_request = http_request.bearer_auth(key);
    }

    let response = match http_request.json(&request).send().await {
        Ok(response) => response,
        Err(e) => {
            let _ = tx.send((StreamMessage::Error(format_api_error(&e.to_string())), stream_id));
            let _ = tx.send((StreamMessage::End, stream_id));
            return;
        }
    };

    if !response.status().is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());
        let _ = tx.send((StreamMessage::Error(format_api_error(&error_text)), stream_id));
        let _ = tx.send((StreamMessage::End, stream_id));
        return;
    }

    let mut stream = response.bytes_stream();
    let mut buffer: Vec<u8> = Vec::new();

    while let Some(chunk) = stream.next().await {
        if cancel_token.is_cancelled() {
            return;
        }

        let chunk_bytes = match chunk {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = tx.send((StreamMessage::Error(format_api_error(&e.to_string())), stream_id));
                let _ = tx.send((StreamMessage::End, stream_id));
                return;
            }
        };
        buffer.extend_from_slice(&chunk_bytes);

        while let Some(newline_pos) = memchr(b'\n', &buffer) {
            let should_end = match std::str::from_utf8(&buffer[..newline_pos]) {
                Ok(line) => process_sse_line(line.trim(), &tx, stream_id),
                Err(e) => {
                    warn!(stream_id, error = %e, "invalid UTF-8 in stream");
                    false
                }
            };
            buffer.drain(..=newline_pos);
            if should_end {
                return;
            }
        }
    }

    let _ = tx.send((StreamMessage::End, stream_id));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_sse_line_handles_spacing_variants() {
        let (service, mut rx) = ChatStreamService::new();
        let variants = [
            (
                r#"data: {"choices":[{"delta":{"content":"Hello"}}]}"#,
                "Hello",
                "data: [DONE]",
            ),
            (
                r#"data:{"choices":[{"delta":{"content":"World"}}]}"#,
                "World",
                "data:[DONE]",
            ),
        ];

        for (index, (chunk_line, expected_chunk, done_line)) in variants.iter().enumerate() {
            let stream_id = (index + 1) as u64;

            assert!(!process_sse_line(chunk_line, &service.tx, stream_id));
            let (message, received_id) = rx.try_recv().expect("expected chunk message");
            assert_eq!(received_id, stream_id);
            assert_eq!(message, StreamMessage::Chunk(expected_chunk.to_string()));

            assert!(process_sse_line(done_line, &service.tx, stream_id));
            let (message, received_id) = rx.try_recv().expect("expected end message");
            assert_eq!(received_id, stream_id);
            assert_eq!(message, StreamMessage::End);
        }

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn non_data_lines_are_ignored() {
        let (service, mut rx) = ChatStreamService::new();
        assert!(!process_sse_line(": keep-alive", &service.tx, 1));
        assert!(!process_sse_line("event: message", &service.tx, 1));
        assert!(!process_sse_line("data: ", &service.tx, 1));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn chunk_metadata_fields_are_ignored() {
        let (service, mut rx) = ChatStreamService::new();
        let line = r#"data: {"id":"c1","choices":[{"index":0,"delta":{"role":"assistant","content":"Hi"},"finish_reason":null}]}"#;
        assert!(!process_sse_line(line, &service.tx, 2));
        assert_eq!(rx.try_recv().expect("chunk"), (StreamMessage::Chunk("Hi".into()), 2));

        let last = r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        assert!(!process_sse_line(last, &service.tx, 2));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn process_sse_line_routes_stream_errors() {
        let (service, mut rx) = ChatStreamService::new();
        let error_line = r#"data: {"error":{"message":"internal server error"}}"#;

        assert!(process_sse_line(error_line, &service.tx, 99));

        let (message, received_id) = rx.try_recv().expect("expected error message");
        assert_eq!(received_id, 99);
        let StreamMessage::Error(text) = message else {
            panic!("expected error message, got {message:?}");
        };
        assert!(text.starts_with("API Error: internal server error\n```\n"));

        let (message, _) = rx.try_recv().expect("expected end message");
        assert_eq!(message, StreamMessage::End);
    }

    #[test]
    fn format_api_error_variants() {
        assert_eq!(
            format_api_error(r#"{"status":"failed"}"#),
            "API Error:\n```\n{\n  \"status\": \"failed\"\n}\n```"
        );
        assert_eq!(
            format_api_error("connection refused"),
            "API Error:\n```\nconnection refused\n```"
        );
        assert_eq!(format_api_error("   "), "API Error:\n```\n<empty>\n```");
    }

    #[tokio::test]
    async fn test_sender_delivers_tagged_messages() {
        let (service, mut rx) = ChatStreamService::new();
        service.send_for_test(StreamMessage::Chunk("hi".into()), 4);
        assert_eq!(
            rx.recv().await,
            Some((StreamMessage::Chunk("hi".into()), 4))
        );
    }
}
