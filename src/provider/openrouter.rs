//! OpenRouter provider: OpenAI-compatible `chat/completions` streaming.

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::mpsc;

use crate::api::{ChatMessage, ChatRequest, ChatResponse};
use crate::provider::{
    format_api_error, ChatStreamRequest, LlmProvider, ProviderError, StreamMessage,
};
use crate::utils::sse::{extract_data_payload, SseLineBuffer};
use crate::utils::url::join_url;

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

pub struct OpenRouterProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenRouterProvider {
    pub fn new(client: reqwest::Client, base_url: String, api_key: String) -> Self {
        OpenRouterProvider {
            client,
            base_url,
            api_key,
        }
    }
}

/// Handle one `data:` payload. Returns true when the stream is finished.
fn handle_data_payload(payload: &str, tx: &mpsc::UnboundedSender<StreamMessage>) -> bool {
    if payload == "[DONE]" {
        let _ = tx.send(StreamMessage::End);
        return true;
    }

    match serde_json::from_str::<ChatResponse>(payload) {
        Ok(response) => {
            if let Some(choice) = response.choices.first() {
                if let Some(content) = &choice.delta.content {
                    let _ = tx.send(StreamMessage::Chunk(content.clone()));
                }
            }
            false
        }
        Err(_) => {
            // Keep-alive comments and blank payloads are not errors.
            if payload.trim().is_empty() {
                return false;
            }
            let _ = tx.send(StreamMessage::Error(format_api_error(payload)));
            let _ = tx.send(StreamMessage::End);
            true
        }
    }
}

fn process_sse_line(line: &str, tx: &mpsc::UnboundedSender<StreamMessage>) -> bool {
    extract_data_payload(line)
        .map(|payload| handle_data_payload(payload, tx))
        .unwrap_or(false)
}

#[async_trait]
impl LlmProvider for OpenRouterProvider {
    fn name(&self) -> &'static str {
        "openrouter"
    }

    async fn stream_chat(
        &self,
        request: ChatStreamRequest,
    ) -> Result<mpsc::UnboundedReceiver<StreamMessage>, ProviderError> {
        let (tx, rx) = mpsc::unbounded_channel();

        let body = ChatRequest {
            model: request.model_id,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: request.system_prompt,
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: request.prompt,
                },
            ],
            stream: true,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let url = join_url(&self.base_url, "chat/completions");
        let client = self.client.clone();
        let api_key = self.api_key.clone();
        let cancel_token = request.cancel_token;

        tokio::spawn(async move {
            tokio::select! {
                _ = run_stream(client, url, api_key, body, tx.clone()) => {}
                _ = cancel_token.cancelled() => {}
            }
        });

        Ok(rx)
    }
}

async fn run_stream(
    client: reqwest::Client,
    url: String,
    api_key: String,
    body: ChatRequest,
    tx: mpsc::UnboundedSender<StreamMessage>,
) {
    let response = client
        .post(url)
        .header("Authorization", format!("Bearer {api_key}"))
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await;

    let response = match response {
        Ok(response) => response,
        Err(err) => {
            let _ = tx.send(StreamMessage::Error(format_api_error(&err.to_string())));
            let _ = tx.send(StreamMessage::End);
            return;
        }
    };

    if !response.status().is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());
        let _ = tx.send(StreamMessage::Error(format_api_error(&error_text)));
        let _ = tx.send(StreamMessage::End);
        return;
    }

    let mut stream = response.bytes_stream();
    let mut lines = SseLineBuffer::new();

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(err) => {
                let _ = tx.send(StreamMessage::Error(format_api_error(&err.to_string())));
                let _ = tx.send(StreamMessage::End);
                return;
            }
        };

        lines.push(&chunk);
        while let Some(line) = lines.next_line() {
            if process_sse_line(&line, &tx) {
                return;
            }
        }
    }

    // Upstream closed without [DONE]; treat it as a clean end.
    let _ = tx.send(StreamMessage::End);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_sse_line_handles_spacing_variants() {
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

        for (chunk_line, expected, done_line) in variants {
            let (tx, mut rx) = mpsc::unbounded_channel();

            assert!(!process_sse_line(chunk_line, &tx));
            match rx.try_recv().expect("expected chunk message") {
                StreamMessage::Chunk(content) => assert_eq!(content, expected),
                other => panic!("expected chunk message, got {other:?}"),
            }

            assert!(process_sse_line(done_line, &tx));
            assert!(matches!(rx.try_recv().unwrap(), StreamMessage::End));
            assert!(rx.try_recv().is_err());
        }
    }

    #[test]
    fn process_sse_line_routes_stream_errors() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let error_line = r#"data: {"error":{"message":"internal server error"}}"#;

        assert!(process_sse_line(error_line, &tx));

        match rx.try_recv().expect("expected error message") {
            StreamMessage::Error(text) => {
                assert_eq!(text, "API Error: internal server error");
            }
            other => panic!("expected error message, got {other:?}"),
        }
        assert!(matches!(rx.try_recv().unwrap(), StreamMessage::End));
    }

    #[test]
    fn non_data_lines_are_ignored() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        assert!(!process_sse_line(": keep-alive", &tx));
        assert!(!process_sse_line("", &tx));
        assert!(!process_sse_line("event: message", &tx));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn empty_data_payload_is_not_an_error() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        assert!(!process_sse_line("data:", &tx));
        assert!(rx.try_recv().is_err());
    }
}
