//! The HTTP gateway: router assembly, shared state, and server lifecycle.

pub mod error;
pub mod routes;

use std::net::SocketAddr;
use std::path::Path;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::catalog::characters::CharacterStore;
use crate::catalog::models::ModelStore;
use crate::catalog::scenarios::ScenarioStore;

/// Shared per-request state. The stores only hold file paths; every request
/// re-reads the catalog files, so there is no cross-request cache to
/// invalidate.
#[derive(Clone)]
pub struct AppState {
    pub provider_id: String,
    pub client: reqwest::Client,
    pub models: ModelStore,
    pub characters: CharacterStore,
    pub scenarios: ScenarioStore,
}

impl AppState {
    pub fn new(provider_id: String, data_dir: &Path) -> Self {
        AppState {
            provider_id,
            client: reqwest::Client::new(),
            models: ModelStore::new(data_dir),
            characters: CharacterStore::new(data_dir),
            scenarios: ScenarioStore::new(data_dir),
        }
    }
}

/// Assemble the gateway router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(routes::chat))
        .route("/api/config", get(routes::get_config).post(routes::save_config))
        .route("/api/models", get(routes::list_models))
        .route("/api/characters", get(routes::list_characters))
        .route("/api/characters/{id}", get(routes::get_character))
        .route("/api/scenarios", get(routes::list_scenarios))
        .route("/api/status", get(routes::status))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// A running gateway with a graceful-shutdown handle.
pub struct GatewayServer {
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    addr: SocketAddr,
}

impl GatewayServer {
    /// Bind and start serving. `bind` may use port 0 to pick a free port;
    /// the bound address is available from [`GatewayServer::addr`].
    pub async fn start(bind: &str, state: AppState) -> Result<Self, Box<dyn std::error::Error>> {
        let app = router(state);
        let listener = tokio::net::TcpListener::bind(bind).await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        tracing::info!(%addr, "gateway listening");
        Ok(GatewayServer {
            shutdown_tx: Some(shutdown_tx),
            addr,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for GatewayServer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::StreamFrame;
    use crate::catalog::characters::test_fixtures::sample_character;
    use crate::catalog::models::default_models;
    use std::sync::Mutex;
    use tempfile::TempDir;

    // Chat tests mutate provider environment variables; serialize them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    async fn start_gateway(provider_id: &str) -> (GatewayServer, String, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let state = AppState::new(provider_id.to_string(), temp_dir.path());
        let server = GatewayServer::start("127.0.0.1:0", state)
            .await
            .expect("gateway should bind");
        let base = format!("http://{}", server.addr());
        (server, base, temp_dir)
    }

    #[tokio::test]
    async fn status_endpoint_answers() {
        let (_server, base, _dir) = start_gateway("openrouter").await;

        let body: serde_json::Value = reqwest::get(format!("{base}/api/status"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn config_get_seeds_defaults_on_first_run() {
        let (_server, base, dir) = start_gateway("openrouter").await;

        let response = reqwest::get(format!("{base}/api/config")).await.unwrap();
        assert!(response.status().is_success());
        let configs: Vec<crate::catalog::models::ModelConfig> = response.json().await.unwrap();
        assert_eq!(configs, default_models());
        assert!(dir.path().join("current-models.json").exists());
    }

    #[tokio::test]
    async fn config_post_replaces_catalog() {
        let (_server, base, _dir) = start_gateway("openrouter").await;
        let client = reqwest::Client::new();

        let mut configs = default_models();
        configs[0].name = "Renamed".to_string();
        let response = client
            .post(format!("{base}/api/config"))
            .json(&configs)
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());

        let loaded: Vec<crate::catalog::models::ModelConfig> =
            reqwest::get(format!("{base}/api/config"))
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
        assert_eq!(loaded[0].name, "Renamed");
    }

    #[tokio::test]
    async fn models_route_validates_type_parameter() {
        let (_server, base, _dir) = start_gateway("openrouter").await;

        let response = reqwest::get(format!("{base}/api/models")).await.unwrap();
        assert_eq!(response.status().as_u16(), 400);

        let response = reqwest::get(format!("{base}/api/models?type=page"))
            .await
            .unwrap();
        assert!(response.status().is_success());
        let views: serde_json::Value = response.json().await.unwrap();
        assert_eq!(views[0]["configId"], "default-bird-model");
        assert!(views[0].get("systemPrompt").is_none());

        let response = reqwest::get(format!("{base}/api/models?type=chat&configId=nope"))
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 404);

        let response = reqwest::get(format!(
            "{base}/api/models?type=chat&configId=default-bird-model"
        ))
        .await
        .unwrap();
        let view: serde_json::Value = response.json().await.unwrap();
        assert!(view["systemPrompt"].as_str().unwrap().contains("bird"));
    }

    #[tokio::test]
    async fn character_routes_list_and_fetch() {
        let (_server, base, dir) = start_gateway("openrouter").await;

        let empty: serde_json::Value = reqwest::get(format!("{base}/api/characters"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(empty, serde_json::json!([]));

        let characters = vec![sample_character("inara")];
        std::fs::write(
            dir.path().join("characters.json"),
            serde_json::to_string(&characters).unwrap(),
        )
        .unwrap();

        let listed: serde_json::Value = reqwest::get(format!("{base}/api/characters"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(listed[0]["id"], "inara");
        assert!(listed[0].get("characterInfo").is_none());

        let full: serde_json::Value = reqwest::get(format!("{base}/api/characters/inara"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(full["characterInfo"]["occupation"], "shipwright, dockmaster");

        let missing = reqwest::get(format!("{base}/api/characters/nobody"))
            .await
            .unwrap();
        assert_eq!(missing.status().as_u16(), 404);
    }

    #[tokio::test]
    async fn scenario_route_filters_by_model() {
        let (_server, base, dir) = start_gateway("openrouter").await;

        let mut configs = default_models();
        configs[0].system_prompt =
            "<?xml version=\"1.0\"?><profile><age>22</age><gender>female</gender></profile>"
                .to_string();
        std::fs::write(
            dir.path().join("current-models.json"),
            serde_json::to_string(&configs).unwrap(),
        )
        .unwrap();

        let scenarios = serde_json::json!({
            "scenarios": [
                {
                    "source": [{"age": ["young_adult"], "gender": ["woman"]}],
                    "target": [{"age": ["adult"], "gender": ["man"]}],
                    "relationship": ["strangers"],
                    "setting": ["harbor"],
                    "scenario_description": "matching",
                    "popularity_score": 1.0
                },
                {
                    "source": [{"age": ["mature"], "gender": ["man"]}],
                    "target": [{"age": ["mature"], "gender": ["man"]}],
                    "relationship": ["rivals"],
                    "setting": ["court"],
                    "scenario_description": "not matching",
                    "popularity_score": 2.0
                }
            ]
        });
        std::fs::write(
            dir.path().join("scenarios.json"),
            scenarios.to_string(),
        )
        .unwrap();

        let all: serde_json::Value = reqwest::get(format!("{base}/api/scenarios"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(all["scenarios"].as_array().unwrap().len(), 2);

        let filtered: serde_json::Value =
            reqwest::get(format!("{base}/api/scenarios?configId=default-bird-model"))
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
        let filtered = filtered["scenarios"].as_array().unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0]["scenario_description"], "matching");
    }

    #[tokio::test]
    async fn chat_rejects_empty_message_list() {
        let (_server, base, _dir) = start_gateway("openrouter").await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("{base}/api/chat"))
            .json(&serde_json::json!({ "messages": [] }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 400);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["error"], "No messages provided");
    }

    #[tokio::test]
    async fn chat_reports_missing_api_key() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        std::env::remove_var("OPENROUTER_API_KEY");

        let (_server, base, _dir) = start_gateway("openrouter").await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("{base}/api/chat"))
            .json(&serde_json::json!({
                "messages": [{"role": "user", "content": "hi"}]
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 500);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["error"], "API key not configured");
    }

    /// Stand-in for the upstream chat completions endpoint.
    fn fake_upstream(body: &'static str) -> Router {
        use axum::http::header;
        Router::new().route(
            "/chat/completions",
            post(move || async move {
                ([(header::CONTENT_TYPE, "text/event-stream")], body)
            }),
        )
    }

    async fn serve_upstream(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn chat_relays_upstream_deltas_and_terminates() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());

        let upstream = serve_upstream(fake_upstream(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n\
             data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n\
             data: [DONE]\n\n",
        ))
        .await;
        std::env::set_var("OPENROUTER_API_KEY", "test-key");
        std::env::set_var("OPENROUTER_BASE_URL", &upstream);

        let (_server, base, _dir) = start_gateway("openrouter").await;
        let client = reqwest::Client::new();

        // An unknown configId must fall back to the active model, not error.
        let response = client
            .post(format!("{base}/api/chat"))
            .json(&serde_json::json!({
                "messages": [{"role": "user", "content": "hi"}],
                "configId": "x"
            }))
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());
        assert!(response
            .headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/event-stream"));

        let body = response.text().await.unwrap();
        let mut contents = Vec::new();
        let mut saw_done = false;
        for line in body.lines() {
            let Some(payload) = crate::utils::sse::extract_data_payload(line) else {
                continue;
            };
            if payload == routes::DONE_SENTINEL {
                saw_done = true;
                break;
            }
            let frame: StreamFrame = serde_json::from_str(payload).unwrap();
            assert_eq!(frame.role, "assistant");
            contents.push(frame.content);
        }
        assert_eq!(contents, vec!["Hel", "lo"]);
        assert!(saw_done);

        std::env::remove_var("OPENROUTER_API_KEY");
        std::env::remove_var("OPENROUTER_BASE_URL");
    }

    #[tokio::test]
    async fn chat_surfaces_upstream_error_frames() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());

        let upstream = serve_upstream(fake_upstream(
            "data: {\"error\":{\"message\":\"model overloaded\"}}\n\n",
        ))
        .await;
        std::env::set_var("OPENROUTER_API_KEY", "test-key");
        std::env::set_var("OPENROUTER_BASE_URL", &upstream);

        let (_server, base, _dir) = start_gateway("openrouter").await;
        let client = reqwest::Client::new();

        let body = client
            .post(format!("{base}/api/chat"))
            .json(&serde_json::json!({
                "messages": [{"role": "user", "content": "hi"}]
            }))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();

        assert!(body.contains("API Error: model overloaded"));
        assert!(body.contains(routes::DONE_SENTINEL));

        std::env::remove_var("OPENROUTER_API_KEY");
        std::env::remove_var("OPENROUTER_BASE_URL");
    }
}
