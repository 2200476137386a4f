//! Server-Sent Events Streaming
//!
//! Shared plumbing for the streaming HTTP adapters. The response body is
//! consumed on a spawned task that forwards extracted text chunks over a
//! bounded channel; when the consumer drops the receiving stream, the next
//! send fails, the task returns, and the HTTP connection is released. That
//! is the cancellation path (Ctrl-C during streaming).

use std::time::Duration;

use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};
use tracing::debug;

use super::{ChunkStream, ProviderKind};
use crate::types::{QueryError, Result};

const CHANNEL_CAPACITY: usize = 32;

/// One parsed SSE line.
#[derive(Debug, PartialEq)]
enum SseEvent {
    /// Payload of a `data:` line.
    Data(String),
    /// OpenAI-style end-of-stream sentinel.
    Done,
    /// Comment, event name, blank line or anything else.
    Ignore,
}

fn parse_line(line: &str) -> SseEvent {
    let Some(data) = line.strip_prefix("data:") else {
        return SseEvent::Ignore;
    };
    let data = data.trim();
    if data == "[DONE]" {
        SseEvent::Done
    } else if data.is_empty() {
        SseEvent::Ignore
    } else {
        SseEvent::Data(data.to_string())
    }
}

/// Consume an SSE response on a background task, applying `extract` to each
/// event's JSON payload and yielding the non-empty text fragments.
///
/// Every body read is bounded by `timeout`: a backend that accepts the
/// request and then stalls yields `QueryError::Timeout` instead of hanging
/// the run.
pub(crate) fn spawn_sse_stream(
    kind: ProviderKind,
    response: reqwest::Response,
    timeout: Duration,
    extract: fn(&serde_json::Value) -> Option<String>,
) -> ChunkStream {
    let (mut tx, rx) = mpsc::channel::<Result<String>>(CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let mut body = response.bytes_stream();
        let mut buffer = String::new();

        loop {
            let chunk = match tokio::time::timeout(timeout, body.next()).await {
                Err(_) => {
                    let err = QueryError::Timeout {
                        provider: kind.to_string(),
                        timeout,
                    };
                    let _ = tx.send(Err(err.into())).await;
                    return;
                }
                Ok(None) => return,
                Ok(Some(Err(e))) => {
                    let err =
                        QueryError::classify(kind.as_str(), &e.to_string(), Duration::ZERO);
                    let _ = tx.send(Err(err.into())).await;
                    return;
                }
                Ok(Some(Ok(chunk))) => chunk,
            };

            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(pos) = buffer.find('\n') {
                let line: String = buffer.drain(..=pos).collect();

                match parse_line(line.trim_end()) {
                    SseEvent::Done => return,
                    SseEvent::Ignore => {}
                    SseEvent::Data(payload) => {
                        let text = match serde_json::from_str::<serde_json::Value>(&payload) {
                            Ok(value) => extract(&value).filter(|t| !t.is_empty()),
                            Err(e) => {
                                debug!(provider = %kind, "Skipping unparsable SSE payload: {}", e);
                                None
                            }
                        };

                        if let Some(text) = text
                            && tx.send(Ok(text)).await.is_err()
                        {
                            // Receiver dropped: stream cancelled.
                            return;
                        }
                    }
                }
            }
        }
    });

    rx.boxed()
}

/// A stream yielding one complete response.
pub(crate) fn once_stream(text: String) -> ChunkStream {
    futures::stream::iter([Ok(text)]).boxed()
}

// =============================================================================
// Payload Extractors
// =============================================================================

/// Text delta of an OpenAI-compatible chat completion chunk.
pub(crate) fn openai_delta(value: &serde_json::Value) -> Option<String> {
    value["choices"][0]["delta"]["content"]
        .as_str()
        .map(str::to_string)
}

/// Text of a Gemini `generateContent` chunk (same shape for streaming and
/// unary responses).
pub(crate) fn gemini_text(value: &serde_json::Value) -> Option<String> {
    value["candidates"][0]["content"]["parts"][0]["text"]
        .as_str()
        .map(str::to_string)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_line_variants() {
        assert_eq!(
            parse_line("data: {\"x\":1}"),
            SseEvent::Data("{\"x\":1}".to_string())
        );
        assert_eq!(parse_line("data: [DONE]"), SseEvent::Done);
        assert_eq!(parse_line(""), SseEvent::Ignore);
        assert_eq!(parse_line(": keep-alive"), SseEvent::Ignore);
        assert_eq!(parse_line("event: ping"), SseEvent::Ignore);
        assert_eq!(parse_line("data:"), SseEvent::Ignore);
    }

    #[test]
    fn test_openai_delta_extraction() {
        let chunk = json!({
            "choices": [{"delta": {"content": "Hel"}, "index": 0}]
        });
        assert_eq!(openai_delta(&chunk), Some("Hel".to_string()));

        // Role-only first chunk carries no content.
        let role_only = json!({"choices": [{"delta": {"role": "assistant"}}]});
        assert_eq!(openai_delta(&role_only), None);
    }

    #[test]
    fn test_gemini_text_extraction() {
        let chunk = json!({
            "candidates": [{
                "content": {"parts": [{"text": "check the drm driver"}], "role": "model"}
            }]
        });
        assert_eq!(gemini_text(&chunk), Some("check the drm driver".to_string()));
        assert_eq!(gemini_text(&json!({"candidates": []})), None);
    }

    #[tokio::test]
    async fn test_stalled_body_yields_timeout_not_hang() {
        use crate::types::SosError;
        use tokio::io::AsyncWriteExt;

        // Accept the request, send SSE headers, then stall without a body.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\n\r\n")
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(socket);
        });

        let response = reqwest::Client::new()
            .get(format!("http://{addr}/"))
            .send()
            .await
            .unwrap();

        let mut stream = spawn_sse_stream(
            ProviderKind::Openai,
            response,
            Duration::from_millis(200),
            openai_delta,
        );

        let item = tokio::time::timeout(Duration::from_secs(3), stream.next())
            .await
            .expect("stream must surface a timeout instead of hanging")
            .unwrap();

        match item {
            Err(SosError::Query(QueryError::Timeout { provider, .. })) => {
                assert_eq!(provider, "openai");
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_once_stream_yields_single_chunk() {
        let mut stream = once_stream("full response".to_string());
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first, "full response");
        assert!(stream.next().await.is_none());
    }
}
