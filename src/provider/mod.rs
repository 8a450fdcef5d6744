//! Upstream LLM providers.
//!
//! A provider takes a flattened conversation and returns a channel of
//! [`StreamMessage`]s: zero or more `Chunk`s, possibly an `Error`, always an
//! `End`. The gateway re-frames chunks as SSE; providers never see HTTP
//! response types.

pub mod openrouter;
pub mod vertex;

use std::env;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::api::ChatMessage;

pub use openrouter::OpenRouterProvider;
pub use vertex::VertexProvider;

/// One event on a provider stream.
#[derive(Clone, Debug)]
pub enum StreamMessage {
    Chunk(String),
    Error(String),
    End,
}

/// A flattened, provider-ready chat request.
pub struct ChatStreamRequest {
    pub model_id: String,
    pub system_prompt: String,
    pub prompt: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub cancel_token: CancellationToken,
}

/// Errors raised before a stream starts. Failures mid-stream travel on the
/// channel as [`StreamMessage::Error`] instead.
#[derive(Debug)]
pub enum ProviderError {
    /// Required environment variable is not set
    MissingEnv(&'static str),
    /// No provider registered under this id
    Unknown(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::MissingEnv(var) => {
                write!(f, "Environment variable {var} is not set")
            }
            ProviderError::Unknown(id) => write!(f, "Unknown provider '{id}'"),
        }
    }
}

impl std::error::Error for ProviderError {}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Start a completion and return the receiving end of its event stream.
    /// `Err` means the request never left the gateway (bad configuration);
    /// upstream failures arrive as `StreamMessage::Error` on the channel.
    async fn stream_chat(
        &self,
        request: ChatStreamRequest,
    ) -> Result<mpsc::UnboundedReceiver<StreamMessage>, ProviderError>;
}

/// Build a provider from environment variables. Called per request so a key
/// added or rotated while the gateway runs is picked up without a restart.
pub fn from_env(
    provider_id: &str,
    client: reqwest::Client,
) -> Result<Arc<dyn LlmProvider>, ProviderError> {
    match provider_id {
        "openrouter" => {
            let api_key = env::var("OPENROUTER_API_KEY")
                .map_err(|_| ProviderError::MissingEnv("OPENROUTER_API_KEY"))?;
            let base_url = env::var("OPENROUTER_BASE_URL")
                .unwrap_or_else(|_| openrouter::DEFAULT_BASE_URL.to_string());
            Ok(Arc::new(OpenRouterProvider::new(client, base_url, api_key)))
        }
        "vertex" => {
            let project_id = env::var("GOOGLE_PROJECT_ID")
                .map_err(|_| ProviderError::MissingEnv("GOOGLE_PROJECT_ID"))?;
            let location = env::var("VERTEX_LOCATION")
                .map_err(|_| ProviderError::MissingEnv("VERTEX_LOCATION"))?;
            let endpoint_id = env::var("VERTEX_ENDPOINT_ID")
                .map_err(|_| ProviderError::MissingEnv("VERTEX_ENDPOINT_ID"))?;
            let access_token = env::var("VERTEX_ACCESS_TOKEN")
                .map_err(|_| ProviderError::MissingEnv("VERTEX_ACCESS_TOKEN"))?;
            Ok(Arc::new(VertexProvider::new(
                client,
                project_id,
                location,
                endpoint_id,
                access_token,
            )))
        }
        other => Err(ProviderError::Unknown(other.to_string())),
    }
}

/// Instruction appended to every combined system prompt so models do not echo
/// their own name as a speaker label.
pub const FORMAT_INSTRUCTION: &str = "\nImportant: Respond naturally in first person without \
     prefixing your responses with your name or 'assistant:'.";

/// A conversation reduced to the system/prompt pair providers consume.
#[derive(Debug, PartialEq)]
pub struct ConversationPrompt {
    pub system: String,
    pub prompt: String,
}

/// Fold the message history into a single prompt.
///
/// System turns are lifted into the combined system prompt; user turns become
/// `user: {content}` lines; assistant turns stay raw. The format instruction
/// always closes the system prompt.
pub fn flatten_conversation(messages: &[ChatMessage], system_prompt: &str) -> ConversationPrompt {
    let system_extra = messages
        .iter()
        .find(|m| m.role == "system")
        .map(|m| m.content.as_str())
        .unwrap_or("");

    let prompt = messages
        .iter()
        .filter(|m| m.role != "system")
        .map(|m| {
            if m.role == "user" {
                format!("user: {}", m.content)
            } else {
                m.content.clone()
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    ConversationPrompt {
        system: format!("{system_prompt}\n\n{system_extra}{FORMAT_INSTRUCTION}"),
        prompt,
    }
}

fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value.get("error").and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.clone()),
                _ => None,
            })
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        })?;

    Some(summary.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Render an upstream error body (JSON, XML, or plain text) into the message
/// carried by [`StreamMessage::Error`].
pub fn format_api_error(error_text: &str) -> String {
    let trimmed = error_text.trim();
    if trimmed.is_empty() {
        return "API Error: <empty response>".to_string();
    }

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(summary) = extract_error_summary(&value) {
            if !summary.is_empty() {
                return format!("API Error: {summary}");
            }
        }
        return format!("API Error: {trimmed}");
    }

    format!("API Error: {trimmed}")
}
