//! Model configuration catalog.
//!
//! Configurations live in `current-models.json` under the data directory as a
//! plain JSON array. The first read of a missing file writes the built-in
//! defaults and returns them, so a fresh install always has a usable catalog.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::catalog::CatalogError;

pub const MODELS_FILE: &str = "current-models.json";

/// A named set of LLM invocation parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    pub config_id: String,
    pub model_id: String,
    pub name: String,
    pub system_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub is_active: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

/// Card fields for the selection page (`?type=page`).
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelPageView {
    pub config_id: String,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub profile_picture: Option<String>,
    pub avatar: Option<String>,
}

/// Prompt fields for the chat page (`?type=chat`).
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelChatView {
    pub config_id: String,
    pub name: String,
    pub description: Option<String>,
    pub system_prompt: String,
    pub is_active: bool,
    pub model_id: String,
    pub avatar: Option<String>,
}

impl ModelConfig {
    pub fn page_view(&self) -> ModelPageView {
        ModelPageView {
            config_id: self.config_id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            is_active: self.is_active,
            profile_picture: self.profile_picture.clone(),
            avatar: self.avatar.clone(),
        }
    }

    pub fn chat_view(&self) -> ModelChatView {
        ModelChatView {
            config_id: self.config_id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            system_prompt: self.system_prompt.clone(),
            is_active: self.is_active,
            model_id: self.model_id.clone(),
            avatar: self.avatar.clone(),
        }
    }
}

/// The catalog shipped with a fresh install.
pub fn default_models() -> Vec<ModelConfig> {
    vec![ModelConfig {
        config_id: "default-bird-model".to_string(),
        model_id: "meta-llama/llama-3.2-1b-instruct".to_string(),
        name: "Llama 3.2 1B Instruct".to_string(),
        system_prompt: "You are a not helpful AI assistant. You are a bird and respond \
                        with stereotypical bird talk"
            .to_string(),
        temperature: 0.7,
        max_tokens: 1000,
        is_active: true,
        description: None,
        profile_picture: None,
        avatar: None,
    }]
}

/// Whole-file store for [`ModelConfig`] records.
#[derive(Clone)]
pub struct ModelStore {
    path: PathBuf,
}

impl ModelStore {
    pub fn new(data_dir: &Path) -> Self {
        ModelStore {
            path: data_dir.join(MODELS_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the full catalog, seeding the file with the defaults when it does
    /// not exist yet.
    pub fn load(&self) -> Result<Vec<ModelConfig>, CatalogError> {
        match fs::read_to_string(&self.path) {
            Ok(data) => serde_json::from_str(&data)
                .map_err(|err| CatalogError::InvalidJson(self.path.clone(), err)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let defaults = default_models();
                self.save(&defaults)?;
                Ok(defaults)
            }
            Err(err) => Err(CatalogError::Io(self.path.clone(), err)),
        }
    }

    /// Replace the catalog file with the given records.
    pub fn save(&self, configs: &[ModelConfig]) -> Result<(), CatalogError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| CatalogError::Io(self.path.clone(), err))?;
        }
        let data = serde_json::to_string_pretty(configs)
            .map_err(|err| CatalogError::InvalidJson(self.path.clone(), err))?;
        fs::write(&self.path, data).map_err(|err| CatalogError::Io(self.path.clone(), err))
    }

    /// Load the catalog and pick the configuration for a chat request.
    pub fn select(&self, requested: Option<&str>) -> Result<ModelConfig, CatalogError> {
        let configs = self.load()?;
        select_config(&configs, requested)
            .cloned()
            .ok_or_else(|| CatalogError::Empty(self.path.clone()))
    }

    pub fn find(&self, config_id: &str) -> Result<ModelConfig, CatalogError> {
        self.load()?
            .into_iter()
            .find(|c| c.config_id == config_id)
            .ok_or_else(|| CatalogError::NotFound(config_id.to_string()))
    }
}

/// Selection order: requested id, then the active flag, then file order.
///
/// An unknown requested id falls through to the next rule instead of failing;
/// only an empty catalog yields `None`.
pub fn select_config<'a>(
    configs: &'a [ModelConfig],
    requested: Option<&str>,
) -> Option<&'a ModelConfig> {
    requested
        .and_then(|id| configs.iter().find(|c| c.config_id == id))
        .or_else(|| configs.iter().find(|c| c.is_active))
        .or_else(|| configs.first())
}
