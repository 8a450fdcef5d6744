//! Character catalog.
//!
//! Characters are read from `characters.json` under the data directory. The
//! catalog is read-only from the gateway's perspective; the listing endpoint
//! returns a trimmed projection and the detail endpoint the full record.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::catalog::CatalogError;

pub const CHARACTERS_FILE: &str = "characters.json";

/// Physical description fields used when templating a prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Appearance {
    pub age: u32,
    pub build: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hair: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eyes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<String>,
}

impl Appearance {
    /// Flatten the set fields into `key: value` pairs, in declaration order.
    pub fn describe(&self) -> String {
        let mut parts = vec![
            format!("age: {}", self.age),
            format!("build: {}", self.build),
        ];
        let optional = [
            ("hair", &self.hair),
            ("eyes", &self.eyes),
            ("complexion", &self.complexion),
            ("height", &self.height),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                parts.push(format!("{key}: {value}"));
            }
        }
        parts.join(", ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommunicationStyle {
    /// Core speech patterns and habits
    pub patterns: Vec<String>,
    /// Domain-specific language usage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminology: Option<Vec<String>>,
    /// Emotional and delivery aspects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DialogueExchange {
    pub context: String,
    pub response: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryTraits {
    pub category: String,
    pub traits: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CharacterInfo {
    pub occupation: String,
    pub appearance: Appearance,
    pub environment: Vec<String>,
    pub communication_style: CommunicationStyle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example_dialogue: Option<Vec<DialogueExchange>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personality: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traits: Option<Vec<CategoryTraits>>,
}

/// A role-play character record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub profile_picture: String,
    pub display_description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub character_info: CharacterInfo,
}

/// Listing projection: just the fields the selection UI needs.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterSummary {
    pub id: String,
    pub name: String,
    pub profile_picture: String,
    pub display_description: String,
    pub tags: Vec<String>,
}

impl Character {
    pub fn summary(&self) -> CharacterSummary {
        CharacterSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            profile_picture: self.profile_picture.clone(),
            display_description: self.display_description.clone(),
            tags: self.tags.clone(),
        }
    }
}

/// Whole-file store for [`Character`] records.
#[derive(Clone)]
pub struct CharacterStore {
    path: PathBuf,
}

impl CharacterStore {
    pub fn new(data_dir: &Path) -> Self {
        CharacterStore {
            path: data_dir.join(CHARACTERS_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every character. A missing file is an empty catalog, not an error.
    pub fn load(&self) -> Result<Vec<Character>, CatalogError> {
        match fs::read_to_string(&self.path) {
            Ok(data) => serde_json::from_str(&data)
                .map_err(|err| CatalogError::InvalidJson(self.path.clone(), err)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(CatalogError::Io(self.path.clone(), err)),
        }
    }

    pub fn list(&self) -> Result<Vec<CharacterSummary>, CatalogError> {
        Ok(self.load()?.iter().map(Character::summary).collect())
    }

    pub fn find(&self, character_id: &str) -> Result<Character, CatalogError> {
        self.load()?
            .into_iter()
            .find(|c| c.id == character_id)
            .ok_or_else(|| CatalogError::NotFound(character_id.to_string()))
    }
}
