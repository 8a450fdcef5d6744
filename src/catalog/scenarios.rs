//! Scenario catalog and model/scenario compatibility matching.
//!
//! Scenarios describe a pairing (source/target descriptors, relationship,
//! setting) plus free text. The matcher extracts coarse gender/age
//! characteristics from a model's system prompt so the listing endpoint can
//! filter scenarios down to plausible pairings for the selected model.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::catalog::CatalogError;

pub const SCENARIOS_FILE: &str = "scenarios.json";

/// Gender/age descriptor sets for one side of a scenario pairing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioCharacter {
    pub age: Vec<String>,
    pub gender: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scenario {
    pub source: Vec<ScenarioCharacter>,
    pub target: Vec<ScenarioCharacter>,
    pub relationship: Vec<String>,
    pub setting: Vec<String>,
    pub scenario_description: String,
    pub popularity_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ScenarioData {
    pub scenarios: Vec<Scenario>,
}

/// Coarse characteristics extracted from a model's system prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCharacteristics {
    pub gender: String,
    pub age: String,
}

// An age of zero means the prompt gave no usable reading, so it stays in
// the default bucket.
fn age_category(age: Option<u32>) -> &'static str {
    match age {
        Some(age) if age > 0 && age < 25 => "young_adult",
        Some(age) if age > 40 => "mature",
        _ => "adult",
    }
}

fn capture_number(text: &str, tag_open: &str, tag_close: &str) -> Option<u32> {
    let start = text.find(tag_open)? + tag_open.len();
    let rest = &text[start..];
    let end = rest.find(tag_close)?;
    rest[..end].trim().parse().ok()
}

// Both the search and the digit scan run over the same lowered string;
// lowercasing can change byte offsets, so indexing back into the original
// text is not safe.
fn number_after(lower: &str, marker: &str) -> Option<u32> {
    let start = lower.find(marker)? + marker.len();
    let digits: String = lower[start..]
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Extract gender and age-category hints from a system prompt.
///
/// Prompts appear in two shapes in practice: XML profiles with `<age>`/
/// `<gender>` tags, and plain-text profiles with `Age:` lines and prose
/// gender cues. Either way the result is a coarse bucket, never a precise
/// reading.
pub fn extract_model_characteristics(system_prompt: &str) -> ModelCharacteristics {
    let lower = system_prompt.to_lowercase();

    let (age, is_female) = if lower.contains("<?xml") {
        let age = capture_number(&lower, "<age>", "</age>");
        let is_female = lower.contains("<gender>female</gender>")
            || lower.contains("<gender>woman</gender>")
            || lower.contains("actress")
            || lower.contains("herself");
        (age, is_female)
    } else {
        let age = number_after(&lower, "age:").or_else(|| number_after(&lower, "age "));
        let is_female = lower.contains("female")
            || lower.contains("woman")
            || lower.contains("actress")
            || lower.contains("herself");
        (age, is_female)
    };

    ModelCharacteristics {
        gender: if is_female { "woman" } else { "man" }.to_string(),
        age: age_category(age).to_string(),
    }
}

fn side_matches(side: &[ScenarioCharacter], model: &ModelCharacteristics) -> bool {
    side.iter().any(|descriptor| {
        descriptor.gender.iter().any(|g| g == &model.gender)
            && descriptor.age.iter().any(|a| a == &model.age)
    })
}

/// A scenario fits when the model's characteristics match either side of the
/// pairing.
pub fn is_scenario_compatible(scenario: &Scenario, model: &ModelCharacteristics) -> bool {
    side_matches(&scenario.source, model) || side_matches(&scenario.target, model)
}

/// Whole-file store for the scenario catalog.
#[derive(Clone)]
pub struct ScenarioStore {
    path: PathBuf,
}

impl ScenarioStore {
    pub fn new(data_dir: &Path) -> Self {
        ScenarioStore {
            path: data_dir.join(SCENARIOS_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the scenario catalog. A missing file yields an empty catalog.
    pub fn load(&self) -> Result<ScenarioData, CatalogError> {
        match fs::read_to_string(&self.path) {
            Ok(data) => serde_json::from_str(&data)
                .map_err(|err| CatalogError::InvalidJson(self.path.clone(), err)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(ScenarioData::default()),
            Err(err) => Err(CatalogError::Io(self.path.clone(), err)),
        }
    }

    /// Scenarios compatible with the given model characteristics, most
    /// popular first.
    pub fn compatible_with(
        &self,
        model: &ModelCharacteristics,
    ) -> Result<Vec<Scenario>, CatalogError> {
        let mut scenarios: Vec<Scenario> = self
            .load()?
            .scenarios
            .into_iter()
            .filter(|scenario| is_scenario_compatible(scenario, model))
            .collect();
        scenarios.sort_by(|a, b| {
            b.popularity_score
                .partial_cmp(&a.popularity_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(scenarios)
    }
}
