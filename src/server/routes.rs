//! Route handlers for the gateway API surface.

use std::convert::Infallible;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures_util::stream::{self, Stream};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::api::{ChatRequestBody, StreamFrame};
use crate::catalog::prompt::generate_prompt;
use crate::catalog::scenarios::extract_model_characteristics;
use crate::catalog::{models::ModelConfig, CatalogError};
use crate::provider::{self, ChatStreamRequest, ProviderError, StreamMessage};
use crate::server::error::ApiError;
use crate::server::AppState;

/// Literal payload of the final SSE line.
pub const DONE_SENTINEL: &str = "[DONE]";

fn catalog_failure(context: &str, err: CatalogError) -> ApiError {
    match err {
        CatalogError::NotFound(id) => ApiError::not_found(format!("'{id}' not found")),
        other => ApiError::internal(context, other.to_string()),
    }
}

/// `POST /api/chat` — select a model config, build the combined system
/// prompt, and relay the provider token stream as SSE frames.
pub async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatRequestBody>,
) -> Result<impl IntoResponse, ApiError> {
    if body.messages.is_empty() {
        return Err(ApiError::bad_request("No messages provided"));
    }

    let provider =
        provider::from_env(&state.provider_id, state.client.clone()).map_err(|err| match err {
            ProviderError::MissingEnv(_) => {
                ApiError::internal("API key not configured", err.to_string())
            }
            ProviderError::Unknown(_) => {
                ApiError::internal("Provider not configured", err.to_string())
            }
        })?;

    // Unknown or absent configId falls back to the active entry, then the
    // first one. Only an unreadable or empty catalog is an error.
    let model = state
        .models
        .select(body.config_id.as_deref())
        .map_err(|err| catalog_failure("Failed to load model configuration", err))?;

    let mut system_prompt = model.system_prompt.clone();
    if let Some(character_id) = &body.character_id {
        let characters = state
            .characters
            .load()
            .map_err(|err| catalog_failure("Failed to load characters", err))?;
        let character_prompt = generate_prompt(character_id, &characters)
            .map_err(|err| catalog_failure("Failed to build character prompt", err))?;
        if system_prompt.is_empty() {
            system_prompt = character_prompt;
        } else {
            system_prompt = format!("{system_prompt}\n\n{character_prompt}");
        }
    }

    let flattened = provider::flatten_conversation(&body.messages, &system_prompt);
    tracing::info!(
        config_id = %model.config_id,
        model_id = %model.model_id,
        turns = body.messages.len(),
        "starting chat stream"
    );

    let rx = provider
        .stream_chat(ChatStreamRequest {
            model_id: model.model_id.clone(),
            system_prompt: flattened.system,
            prompt: flattened.prompt,
            temperature: Some(model.temperature),
            max_tokens: Some(model.max_tokens),
            cancel_token: CancellationToken::new(),
        })
        .await
        .map_err(|err| ApiError::internal("Failed to process chat request", err.to_string()))?;

    Ok(Sse::new(frame_stream(rx)))
}

/// Map provider events onto SSE frames, closing after the `[DONE]` line.
fn frame_stream(
    rx: mpsc::UnboundedReceiver<StreamMessage>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(Some(rx), |state| async move {
        let mut rx = state?;
        let (event, next) = match rx.recv().await {
            Some(StreamMessage::Chunk(content)) => {
                let frame = StreamFrame::assistant(content);
                let data =
                    serde_json::to_string(&frame).unwrap_or_else(|_| "{}".to_string());
                (Event::default().data(data), Some(rx))
            }
            Some(StreamMessage::Error(message)) => {
                let data = serde_json::json!({ "error": message }).to_string();
                (Event::default().data(data), Some(rx))
            }
            Some(StreamMessage::End) | None => (Event::default().data(DONE_SENTINEL), None),
        };
        Some((Ok(event), next))
    })
}

#[derive(Deserialize)]
pub struct ModelsQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(rename = "configId")]
    pub config_id: Option<String>,
}

/// `GET /api/models?type=page|chat[&configId=..]`
pub async fn list_models(
    State(state): State<AppState>,
    Query(query): Query<ModelsQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let models = state
        .models
        .load()
        .map_err(|err| catalog_failure("Failed to process model request", err))?;

    match query.kind.as_deref() {
        Some("page") => {
            let views: Vec<_> = models.iter().map(ModelConfig::page_view).collect();
            Ok(Json(serde_json::json!(views)))
        }
        Some("chat") => {
            if let Some(config_id) = &query.config_id {
                let model = models
                    .iter()
                    .find(|m| &m.config_id == config_id)
                    .ok_or_else(|| ApiError::not_found("Model not found"))?;
                Ok(Json(serde_json::json!(model.chat_view())))
            } else {
                let views: Vec<_> = models.iter().map(ModelConfig::chat_view).collect();
                Ok(Json(serde_json::json!(views)))
            }
        }
        _ => Err(ApiError::bad_request(
            "Invalid type parameter. Use \"page\" or \"chat\".",
        )),
    }
}

/// `GET /api/config` — the raw catalog, seeding defaults on first run.
pub async fn get_config(
    State(state): State<AppState>,
) -> Result<Json<Vec<ModelConfig>>, ApiError> {
    state
        .models
        .load()
        .map(Json)
        .map_err(|err| catalog_failure("Failed to load configurations", err))
}

/// `POST /api/config` — replace the catalog file.
pub async fn save_config(
    State(state): State<AppState>,
    Json(configs): Json<Vec<ModelConfig>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .models
        .save(&configs)
        .map_err(|err| catalog_failure("Failed to save configurations", err))?;
    Ok(Json(serde_json::json!({ "success": true })))
}

/// `GET /api/characters`
pub async fn list_characters(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let summaries = state
        .characters
        .list()
        .map_err(|err| catalog_failure("Failed to retrieve character list", err))?;
    Ok(Json(serde_json::json!(summaries)))
}

/// `GET /api/characters/{id}`
pub async fn get_character(
    State(state): State<AppState>,
    Path(character_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let character = state
        .characters
        .find(&character_id)
        .map_err(|err| match err {
            CatalogError::NotFound(_) => ApiError::not_found("Character not found"),
            other => ApiError::internal("Failed to retrieve character", other.to_string()),
        })?;
    Ok(Json(serde_json::json!(character)))
}

#[derive(Deserialize)]
pub struct ScenariosQuery {
    #[serde(rename = "configId")]
    pub config_id: Option<String>,
}

/// `GET /api/scenarios[?configId=..]` — everything, or only the scenarios
/// compatible with the selected model's extracted characteristics.
pub async fn list_scenarios(
    State(state): State<AppState>,
    Query(query): Query<ScenariosQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    match &query.config_id {
        None => {
            let data = state
                .scenarios
                .load()
                .map_err(|err| catalog_failure("Failed to load scenarios", err))?;
            Ok(Json(serde_json::json!(data)))
        }
        Some(config_id) => {
            let model = state
                .models
                .select(Some(config_id))
                .map_err(|err| catalog_failure("Failed to load model configuration", err))?;
            let characteristics = extract_model_characteristics(&model.system_prompt);
            let scenarios = state
                .scenarios
                .compatible_with(&characteristics)
                .map_err(|err| catalog_failure("Failed to load scenarios", err))?;
            Ok(Json(serde_json::json!({ "scenarios": scenarios })))
        }
    }
}

/// `GET /api/status`
pub async fn status() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok", "app": "dramatis" }))
}
