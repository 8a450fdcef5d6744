//! Role-play system prompt generator.
//!
//! Builds the system prompt for a character from its `character_info` fields.
//! The wording here is deliberately plain; the structure (persona line,
//! profile, response framework, reminders) is what the chat pipeline relies
//! on.

use crate::catalog::characters::Character;
use crate::catalog::CatalogError;

/// Build the role-play system prompt for the character with the given id.
///
/// Card text may carry `{{char}}`/`{{user}}` placeholders (example dialogue
/// especially), so the assembled prompt is run through
/// [`apply_substitutions`] before it reaches the provider.
pub fn generate_prompt(character_id: &str, characters: &[Character]) -> Result<String, CatalogError> {
    let character = characters
        .iter()
        .find(|c| c.id == character_id)
        .ok_or_else(|| CatalogError::NotFound(character_id.to_string()))?;
    let prompt = build_character_prompt(character);
    Ok(apply_substitutions(&prompt, Some(&character.name), None))
}

/// Build the role-play system prompt from a character record.
pub fn build_character_prompt(character: &Character) -> String {
    let info = &character.character_info;

    let personality = info.personality.as_deref().unwrap_or(&[]);
    let persona_line = if personality.is_empty() {
        String::new()
    } else {
        format!(" Your persona is {}.", personality.join(", "))
    };

    let mut style_parts: Vec<String> = Vec::new();
    style_parts.push(info.communication_style.patterns.join(", "));
    if let Some(terminology) = &info.communication_style.terminology {
        style_parts.push(terminology.join(", "));
    }
    if let Some(tone) = &info.communication_style.tone {
        style_parts.push(tone.join(" and "));
    }
    let style_parts: Vec<String> = style_parts.into_iter().filter(|s| !s.is_empty()).collect();

    let mut prompt = String::new();
    prompt.push_str(&format!(
        "You are role-playing as **{}**, a {}.{} Your communication style includes {}.\n\n",
        character.name,
        info.occupation,
        persona_line,
        style_parts.join(", "),
    ));

    prompt.push_str("### Character Profile\n");
    prompt.push_str(&format!("Appearance: {}\n", info.appearance.describe()));
    prompt.push_str(&format!(
        "Primary Locations: {}\n",
        info.environment.join(", ")
    ));
    if let Some(exchange) = info
        .example_dialogue
        .as_ref()
        .and_then(|dialogue| dialogue.first())
    {
        prompt.push_str(&format!("Example Dialogue: \"{}\"\n", exchange.response));
    }

    prompt.push_str("\n### Response Framework\n");
    prompt.push_str(&format!(
        "1. Translate user interactions into vivid, immersive storytelling in {}'s authentic voice.\n",
        character.name
    ));
    prompt.push_str(&format!(
        "2. Begin each response with scene-setting in {}'s environment, include their current emotional state, and draw on their professional background.\n",
        character.name
    ));
    prompt.push_str(
        "3. Respond naturally in first person without prefixing responses with your name.\n",
    );

    prompt.push_str(&format!("\nRemember to stay true to {}'s:\n", character.name));
    prompt.push_str(&format!("- Professional background as {}\n", info.occupation));
    prompt.push_str("- Communication style and terminology\n");
    if !personality.is_empty() {
        prompt.push_str(&format!("- Personal traits: {}\n", personality.join(", ")));
    }
    prompt.push_str(&format!(
        "- Typical environments: {}\n",
        info.environment.join(", ")
    ));

    prompt
}

/// Apply character and user substitutions to free text.
/// `{{char}}` becomes the character name ("Assistant" when absent) and
/// `{{user}}` the user display name ("Anon" when absent).
pub fn apply_substitutions(text: &str, char_name: Option<&str>, user_name: Option<&str>) -> String {
    text.replace("{{char}}", char_name.unwrap_or("Assistant"))
        .replace("{{user}}", user_name.unwrap_or("Anon"))
}
