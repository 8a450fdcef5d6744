//! Vertex AI provider.
//!
//! The prediction endpoint is request/response rather than streaming, so the
//! whole prediction is emitted as a single `Chunk` followed by `End`. The
//! channel contract stays the same as the streaming providers'.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::provider::{
    format_api_error, ChatStreamRequest, LlmProvider, ProviderError, StreamMessage,
};

pub struct VertexProvider {
    client: reqwest::Client,
    project_id: String,
    location: String,
    endpoint_id: String,
    access_token: String,
}

#[derive(Serialize)]
struct PredictRequest {
    instances: Vec<PredictInstance>,
}

#[derive(Serialize)]
struct PredictInstance {
    inputs: String,
}

#[derive(Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<serde_json::Value>,
}

impl VertexProvider {
    pub fn new(
        client: reqwest::Client,
        project_id: String,
        location: String,
        endpoint_id: String,
        access_token: String,
    ) -> Self {
        VertexProvider {
            client,
            project_id,
            location,
            endpoint_id,
            access_token,
        }
    }

    fn predict_url(&self) -> String {
        format!(
            "https://{loc}-aiplatform.googleapis.com/v1/projects/{proj}/locations/{loc}/endpoints/{ep}:predict",
            loc = self.location,
            proj = self.project_id,
            ep = self.endpoint_id,
        )
    }
}

fn prediction_text(prediction: &serde_json::Value) -> String {
    match prediction {
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl LlmProvider for VertexProvider {
    fn name(&self) -> &'static str {
        "vertex"
    }

    async fn stream_chat(
        &self,
        request: ChatStreamRequest,
    ) -> Result<mpsc::UnboundedReceiver<StreamMessage>, ProviderError> {
        let (tx, rx) = mpsc::unbounded_channel();

        let body = PredictRequest {
            instances: vec![PredictInstance {
                inputs: format!("{}\n\n{}", request.system_prompt, request.prompt),
            }],
        };
        let url = self.predict_url();
        let client = self.client.clone();
        let access_token = self.access_token.clone();
        let cancel_token = request.cancel_token;

        tokio::spawn(async move {
            tokio::select! {
                _ = run_predict(client, url, access_token, body, tx.clone()) => {}
                _ = cancel_token.cancelled() => {}
            }
        });

        Ok(rx)
    }
}

async fn run_predict(
    client: reqwest::Client,
    url: String,
    access_token: String,
    body: PredictRequest,
    tx: mpsc::UnboundedSender<StreamMessage>,
) {
    let response = client
        .post(url)
        .header("Authorization", format!("Bearer {access_token}"))
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

    match response.json::<PredictResponse>().await {
        Ok(parsed) => {
            if let Some(prediction) = parsed.predictions.first() {
                let _ = tx.send(StreamMessage::Chunk(prediction_text(prediction)));
            }
            let _ = tx.send(StreamMessage::End);
        }
        Err(err) => {
            let _ = tx.send(StreamMessage::Error(format_api_error(&err.to_string())));
            let _ = tx.send(StreamMessage::End);
        }
    }
}
