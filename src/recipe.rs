//! The structured recipe schema and its fail-closed validation.
//!
//! The extraction collaborator returns free-form model output; this module is
//! the gate that turns it into a [`RecipeRecord`] or rejects it. Rejection is
//! deliberate — the pipeline never coerces a half-formed response into a
//! record, because a silently defaulted ingredient list would produce a
//! confidently wrong cookbook page. Missing or mistyped required fields
//! (`dish_name`, `ingredients`, `steps`) fail deserialisation outright;
//! everything else is optional and defaults to empty.

use serde::{Deserialize, Serialize};

/// One ingredient line: a name plus free-text quantity and unit.
///
/// Quantity and unit stay strings ("1/2", "a pinch") — recipe photos are not
/// a reliable source of machine-parseable measures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    /// Ingredient name, e.g. "plain flour".
    pub name: String,
    /// Amount, e.g. "250" or "1/2". Empty when the photo gives none.
    #[serde(default)]
    pub quantity: String,
    /// Unit, e.g. "g", "tbsp". Empty when the photo gives none.
    #[serde(default)]
    pub unit: String,
}

/// Structured recipe data extracted from one photo region.
///
/// Required fields reject the response when missing or mistyped; the rest
/// default to empty so a sparse handwritten card still yields a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeRecord {
    /// Name of the dish.
    pub dish_name: String,

    /// A short, appetising description or subtitle for the dish.
    #[serde(default)]
    pub description: String,

    /// Ingredient list, in the order the photo gives it.
    pub ingredients: Vec<Ingredient>,

    /// Ordered cooking steps, free text.
    pub steps: Vec<String>,

    /// Preparation time including units, e.g. "15 min".
    #[serde(default)]
    pub preparation_time: String,

    /// Cooking time including units, e.g. "30 min".
    #[serde(default)]
    pub cooking_time: String,

    /// Number of servings, e.g. "2".
    #[serde(default)]
    pub servings: String,

    /// Optional cooking tips or notes.
    #[serde(default)]
    pub tips: Vec<String>,

    /// Language the photographed recipe was written in, when the model could
    /// tell. Stamped from configuration when the caller supplied a hint.
    #[serde(default)]
    pub source_language: Option<String>,

    /// Language the record was translated into. Stamped from configuration
    /// after parsing.
    #[serde(default)]
    pub target_language: String,

    /// Identifier of the source photo this record was extracted from.
    /// Stamped by the pipeline, not trusted from the model.
    #[serde(default)]
    pub source_photo: String,
}

impl RecipeRecord {
    /// Semantic validation on top of the serde schema check.
    ///
    /// Serde guarantees shape; this guarantees substance: a blank dish name,
    /// an empty ingredient list, a blank ingredient name, or no steps all
    /// reject the record.
    pub fn validate(&self) -> Result<(), String> {
        if self.dish_name.trim().is_empty() {
            return Err("dish_name is blank".into());
        }
        if self.ingredients.is_empty() {
            return Err("ingredients list is empty".into());
        }
        if let Some(i) = self.ingredients.iter().position(|i| i.name.trim().is_empty()) {
            return Err(format!("ingredient {} has a blank name", i + 1));
        }
        if self.steps.is_empty() {
            return Err("steps list is empty".into());
        }
        if let Some(i) = self.steps.iter().position(|s| s.trim().is_empty()) {
            return Err(format!("step {} is blank", i + 1));
        }
        Ok(())
    }
}

/// Parse and validate a raw extraction response into a [`RecipeRecord`].
///
/// Fails closed: any JSON error, missing required field, type mismatch, or
/// semantic violation returns `Err` with a human-readable detail string.
/// Callers wrap the detail into [`crate::error::UnitError::ExtractionValidation`].
pub fn parse_recipe(raw: &str) -> Result<RecipeRecord, String> {
    let record: RecipeRecord =
        serde_json::from_str(raw).map_err(|e| format!("schema violation: {e}"))?;
    record.validate()?;
    Ok(record)
}
