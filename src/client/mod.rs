//! Streaming client adapter for the gateway's chat endpoint.
//!
//! Mirrors the observer interface UI widgets expect: `next` per text delta,
//! then exactly one of `complete` or `error`. A deadline covers the whole
//! request so a stalled stream surfaces as [`StreamError::Timeout`] rather
//! than a generic network failure.

use std::fmt;
use std::time::Duration;

use futures_util::StreamExt;

use crate::api::{ChatRequestBody, StreamFrame};
use crate::config::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::utils::sse::{extract_data_payload, SseLineBuffer};

/// Consumer of one streamed chat turn.
pub trait StreamObserver {
    fn next(&mut self, content: &str);
    fn error(&mut self, error: StreamError);
    fn complete(&mut self);
}

/// Classified failures of a streaming request.
#[derive(Debug)]
pub enum StreamError {
    /// The deadline elapsed before the stream finished
    Timeout,
    /// The gateway answered with a non-success status
    Status(u16, String),
    /// Connection or transport failure
    Network(String),
    /// The gateway relayed an upstream API error frame
    Api(String),
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::Timeout => write!(f, "Request timeout"),
            StreamError::Status(code, body) => {
                write!(f, "Server responded with {code}: {body}")
            }
            StreamError::Network(msg) => write!(f, "Network error: {msg}"),
            StreamError::Api(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for StreamError {}

/// Client for `POST /api/chat`.
pub struct ChatStreamClient {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl ChatStreamClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        ChatStreamClient {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Stream one chat turn into the observer. Always ends with exactly one
    /// `complete` or `error` call.
    pub async fn stream_text(&self, body: &ChatRequestBody, observer: &mut dyn StreamObserver) {
        match tokio::time::timeout(self.timeout, self.run(body, observer)).await {
            Ok(Ok(())) => observer.complete(),
            Ok(Err(err)) => observer.error(err),
            Err(_) => observer.error(StreamError::Timeout),
        }
    }

    async fn run(
        &self,
        body: &ChatRequestBody,
        observer: &mut dyn StreamObserver,
    ) -> Result<(), StreamError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(body)
            .send()
            .await
            .map_err(|err| StreamError::Network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(StreamError::Status(status.as_u16(), text));
        }

        let mut stream = response.bytes_stream();
        let mut lines = SseLineBuffer::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|err| StreamError::Network(err.to_string()))?;
            lines.push(&chunk);

            while let Some(line) = lines.next_line() {
                let Some(payload) = extract_data_payload(&line) else {
                    continue;
                };
                if payload == "[DONE]" {
                    return Ok(());
                }
                match serde_json::from_str::<StreamFrame>(payload) {
                    Ok(frame) => observer.next(&frame.content),
                    Err(_) => {
                        // Error frames carry {"error": ...} instead of the
                        // regular envelope; anything else is skipped.
                        if let Ok(value) = serde_json::from_str::<serde_json::Value>(payload) {
                            if let Some(message) = value.get("error").and_then(|v| v.as_str()) {
                                return Err(StreamError::Api(message.to_string()));
                            }
                        }
                        tracing::debug!(payload, "skipping unparseable SSE payload");
                    }
                }
            }
        }

        // Body ended without [DONE]; the deltas seen so far stand.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;
    use axum::routing::post;
    use axum::Router;

    #[derive(Default)]
    struct RecordingObserver {
        deltas: Vec<String>,
        completed: bool,
        error: Option<StreamError>,
    }

    impl StreamObserver for RecordingObserver {
        fn next(&mut self, content: &str) {
            self.deltas.push(content.to_string());
        }

        fn error(&mut self, error: StreamError) {
            self.error = Some(error);
        }

        fn complete(&mut self) {
            self.completed = true;
        }
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        format!("http://{addr}/api/chat")
    }

    fn request_body() -> ChatRequestBody {
        ChatRequestBody {
            messages: vec![crate::api::ChatMessage {
                role: "user".to_string(),
                content: "hi".to_string(),
            }],
            config_id: None,
            character_id: None,
        }
    }

    fn sse_route(body: &'static str) -> Router {
        Router::new().route(
            "/api/chat",
            post(move || async move {
                ([(header::CONTENT_TYPE, "text/event-stream")], body)
            }),
        )
    }

    #[tokio::test]
    async fn round_trips_ordered_deltas_until_done() {
        let frames = concat!(
            "data: {\"id\":\"1\",\"role\":\"assistant\",\"content\":\"Hel\",\"createdAt\":\"2026-01-01T00:00:00Z\"}\n\n",
            "data: {\"id\":\"2\",\"role\":\"assistant\",\"content\":\"lo\",\"createdAt\":\"2026-01-01T00:00:01Z\"}\n\n",
            "data: [DONE]\n\n",
            "data: {\"id\":\"3\",\"role\":\"assistant\",\"content\":\"ignored\",\"createdAt\":\"2026-01-01T00:00:02Z\"}\n\n",
        );
        let endpoint = serve(sse_route(frames)).await;

        let client = ChatStreamClient::new(endpoint);
        let mut observer = RecordingObserver::default();
        client.stream_text(&request_body(), &mut observer).await;

        assert_eq!(observer.deltas, vec!["Hel", "lo"]);
        assert!(observer.completed);
        assert!(observer.error.is_none());
    }

    #[tokio::test]
    async fn skips_malformed_payloads() {
        let frames = concat!(
            "data: not json\n\n",
            "data: {\"id\":\"1\",\"role\":\"assistant\",\"content\":\"ok\",\"createdAt\":\"2026-01-01T00:00:00Z\"}\n\n",
            "data: [DONE]\n\n",
        );
        let endpoint = serve(sse_route(frames)).await;

        let client = ChatStreamClient::new(endpoint);
        let mut observer = RecordingObserver::default();
        client.stream_text(&request_body(), &mut observer).await;

        assert_eq!(observer.deltas, vec!["ok"]);
        assert!(observer.completed);
    }

    #[tokio::test]
    async fn classifies_elapsed_deadline_as_timeout() {
        let app = Router::new().route(
            "/api/chat",
            post(|| async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                ([(header::CONTENT_TYPE, "text/event-stream")], "data: [DONE]\n\n")
            }),
        );
        let endpoint = serve(app).await;

        let client = ChatStreamClient::new(endpoint).with_timeout(Duration::from_millis(50));
        let mut observer = RecordingObserver::default();
        client.stream_text(&request_body(), &mut observer).await;

        assert!(observer.deltas.is_empty());
        assert!(!observer.completed);
        match observer.error {
            Some(StreamError::Timeout) => {}
            other => panic!("expected timeout classification, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn classifies_http_failure_as_status() {
        let app = Router::new().route(
            "/api/chat",
            post(|| async {
                (
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "{\"error\":\"API key not configured\"}",
                )
            }),
        );
        let endpoint = serve(app).await;

        let client = ChatStreamClient::new(endpoint);
        let mut observer = RecordingObserver::default();
        client.stream_text(&request_body(), &mut observer).await;

        match observer.error {
            Some(StreamError::Status(500, _)) => {}
            other => panic!("expected status classification, got {other:?}"),
        }
        assert!(!observer.completed);
    }

    #[tokio::test]
    async fn surfaces_relayed_api_error_frames() {
        let frames = "data: {\"error\":\"API Error: model overloaded\"}\n\ndata: [DONE]\n\n";
        let endpoint = serve(sse_route(frames)).await;

        let client = ChatStreamClient::new(endpoint);
        let mut observer = RecordingObserver::default();
        client.stream_text(&request_body(), &mut observer).await;

        match &observer.error {
            Some(StreamError::Api(message)) => {
                assert_eq!(message, "API Error: model overloaded");
            }
            other => panic!("expected api error, got {other:?}"),
        }
        assert!(!observer.completed);
    }

    #[test]
    fn timeout_has_distinct_display() {
        assert_eq!(StreamError::Timeout.to_string(), "Request timeout");
        assert_ne!(
            StreamError::Network("reset".to_string()).to_string(),
            StreamError::Timeout.to_string()
        );
    }
}
