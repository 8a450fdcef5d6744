//! Wire types shared by the gateway, the upstream provider clients, and the
//! streaming client adapter.
//!
//! Two families live here: the OpenAI-compatible payloads we send upstream
//! (`ChatRequest` and friends) and the gateway's own surface (`ChatRequestBody`
//! in, `StreamFrame` SSE envelopes out).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single turn in an upstream chat completion request.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Request body for an OpenAI-compatible `chat/completions` call.
#[derive(Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Deserialize)]
pub struct ChatResponseDelta {
    pub content: Option<String>,
}

#[derive(Deserialize)]
pub struct ChatResponseChoice {
    pub delta: ChatResponseDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// One streaming chunk of an upstream chat completion response.
#[derive(Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<ChatResponseChoice>,
}

/// Request body accepted by `POST /api/chat`.
#[derive(Deserialize, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequestBody {
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_id: Option<String>,
}

/// JSON envelope for one SSE `data:` line emitted by the gateway.
///
/// The stream is terminated by a literal `data: [DONE]` line rather than a
/// frame, so end-of-stream never parses as a `StreamFrame`.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct StreamFrame {
    pub id: String,
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl StreamFrame {
    /// Wrap a text delta in a fresh assistant frame.
    pub fn assistant(content: impl Into<String>) -> Self {
        StreamFrame {
            id: uuid::Uuid::new_v4().to_string(),
            role: "assistant".to_string(),
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// Error body returned by gateway routes: `{"error": ..., "details": ...}`.
#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_request_omits_unset_sampling_params() {
        let request = ChatRequest {
            model: "meta-llama/llama-3.2-1b-instruct".to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: "hi".to_string(),
            }],
            stream: true,
            temperature: None,
            max_tokens: None,
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("temperature"));
        assert!(!json.contains("max_tokens"));
    }

    #[test]
    fn request_body_accepts_camel_case_config_id() {
        let body: ChatRequestBody =
            serde_json::from_str(r#"{"messages":[{"role":"user","content":"hi"}],"configId":"x"}"#)
                .unwrap();
        assert_eq!(body.config_id.as_deref(), Some("x"));
        assert_eq!(body.messages.len(), 1);
    }

    #[test]
    fn stream_frame_serializes_camel_case() {
        let frame = StreamFrame::assistant("hello");
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains("\"createdAt\""));
        assert!(json.contains("\"role\":\"assistant\""));

        let parsed: StreamFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.content, "hello");
    }
}
