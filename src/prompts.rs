//! Prompts for recipe extraction and illustration generation.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — changing extraction behaviour (adding a
//!    schema field, tightening the JSON rules) requires editing exactly one
//!    place.
//!
//! 2. **Testability** — unit tests can inspect prompts directly without a
//!    live service, so a prompt regression (dropped schema field, lost
//!    JSON-only rule) is caught by `cargo test`.
//!
//! Callers can override the extraction prompt via
//! [`crate::config::RunConfig::extraction_prompt`]; the constants here are
//! used only when no override is provided.

use crate::recipe::RecipeRecord;
use crate::style::StyleProfile;

/// Default system prompt for extracting a structured recipe from a photo.
///
/// The JSON schema spelled out here must stay in lock-step with
/// [`crate::recipe::RecipeRecord`] — the parser rejects anything that does
/// not deserialise into it.
pub const DEFAULT_EXTRACTION_PROMPT: &str = r#"You are an expert chef transcribing recipes from photographs. You receive one photo of a recipe (handwritten card, cookbook page, or dish with notes) and return structured data only.

Follow these rules precisely:

1. OUTPUT FORMAT
   - Respond with a single JSON object and nothing else
   - Do NOT wrap the JSON in markdown fences
   - Do NOT add commentary before or after the JSON

2. SCHEMA
   {
     "dish_name": string,
     "description": string,
     "ingredients": [{"name": string, "quantity": string, "unit": string}],
     "steps": [string],
     "preparation_time": string,
     "cooking_time": string,
     "servings": string,
     "tips": [string]
   }

3. CONTENT
   - Transcribe faithfully; do not invent ingredients or steps that are not visible
   - Keep the ingredient order and step order exactly as written
   - Quantities and units stay as written ("1/2", "a pinch"); use "" when absent
   - Use "" or [] for anything the photo does not show

4. LANGUAGE
   - Write all values in the requested target language
   - Translate from the source language when they differ, keeping dish names
     recognisable (add a translation in parentheses if helpful)"#;

/// Built-in base style phrase used when the caller configures neither a
/// default style nor reference images with their own phrase.
pub const DEFAULT_STYLE_PHRASE: &str =
    "soft watercolor illustration, light paper texture, gentle washes, no text";

/// Build the user-turn text for an extraction request.
///
/// The image itself travels as an attachment; this text carries only the
/// language contract.
pub fn extraction_user_prompt(source_language: Option<&str>, target_language: &str) -> String {
    match source_language {
        Some(src) => format!(
            "Extract the recipe from this photo. The recipe is written in {src}; \
             produce the structured data in {target_language}."
        ),
        None => format!(
            "Extract the recipe from this photo and produce the structured data \
             in {target_language}."
        ),
    }
}

/// Build the generation prompt for one recipe illustration.
///
/// Combines the dish summary with the run's shared style profile so every
/// illustration in the cookbook reads as one artist's work.
pub fn illustration_prompt(record: &RecipeRecord, style: &StyleProfile) -> String {
    let ingredients: Vec<&str> = record
        .ingredients
        .iter()
        .take(8)
        .map(|i| i.name.as_str())
        .collect();

    let mut prompt = format!(
        "{style}\nDish: {dish}\nKey ingredients: {ingredients}",
        style = style.descriptor,
        dish = record.dish_name,
        ingredients = ingredients.join(", "),
    );
    if !record.description.is_empty() {
        prompt.push_str(&format!("\nMood: {}", record.description));
    }
    if !style.palette.is_empty() {
        prompt.push_str(&format!("\nPalette: {}", style.palette_hex().join(", ")));
    }
    if !style.reference_names.is_empty() {
        prompt.push_str(&format!(
            "\nStyle references: {}",
            style.reference_names.join(", ")
        ));
    }
    prompt
}
