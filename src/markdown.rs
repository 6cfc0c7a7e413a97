//! Output writing: one Markdown document plus illustration asset per recipe.
//!
//! The pipeline hands over a fully populated record and illustration; this
//! module decides file names and layout. Documents land directly in the
//! output directory, assets under `illustrations/`, and the embed uses a
//! relative path so the cookbook directory can be moved or published as-is.
//!
//! Writes are atomic (temp file + rename) to prevent half-written documents,
//! and file names are slug-deduplicated so two photos of "Pancakes" do not
//! overwrite each other.

use crate::error::CookbookError;
use crate::output::{Illustration, RecipeOutput};
use crate::recipe::RecipeRecord;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The output-writer collaborator seam.
#[async_trait]
pub trait OutputWriter: Send + Sync {
    /// Persist one recipe and return the terminal [`RecipeOutput`].
    async fn write(
        &self,
        record: &RecipeRecord,
        illustration: &Illustration,
    ) -> Result<RecipeOutput, CookbookError>;
}

static RE_NON_SLUG: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Turn a dish name into a safe, readable file stem.
pub fn slugify(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let slug = RE_NON_SLUG.replace_all(&lowered, "-");
    let slug = slug.trim_matches('-').to_string();
    if slug.is_empty() {
        "recipe".to_string()
    } else {
        slug
    }
}

/// Built-in writer producing per-recipe Markdown documents.
#[derive(Debug, Clone)]
pub struct MarkdownWriter {
    output_dir: PathBuf,
}

impl MarkdownWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Find a free slug: `pancakes`, then `pancakes-2`, `pancakes-3`, …
    async fn free_slug(&self, base: &str) -> String {
        let mut slug = base.to_string();
        let mut n = 1usize;
        loop {
            let doc = self.output_dir.join(format!("{slug}.md"));
            let art = self
                .output_dir
                .join("illustrations")
                .join(format!("{slug}.png"));
            let doc_taken = tokio::fs::try_exists(&doc).await.unwrap_or(false);
            let art_taken = tokio::fs::try_exists(&art).await.unwrap_or(false);
            if !doc_taken && !art_taken {
                return slug;
            }
            n += 1;
            slug = format!("{base}-{n}");
        }
    }

    /// Render the recipe document with a relative illustration embed.
    fn render(record: &RecipeRecord, illustration_rel: &str) -> String {
        let mut lines: Vec<String> = Vec::new();
        lines.push(format!("# {}", record.dish_name));
        lines.push(String::new());
        if !record.description.is_empty() {
            lines.push(format!("*{}*", record.description));
            lines.push(String::new());
        }
        lines.push(format!("![{}]({})", record.dish_name, illustration_rel));
        lines.push(String::new());

        let mut facts: Vec<String> = Vec::new();
        if !record.preparation_time.is_empty() {
            facts.push(format!("Preparation: {}", record.preparation_time));
        }
        if !record.cooking_time.is_empty() {
            facts.push(format!("Cooking: {}", record.cooking_time));
        }
        if !record.servings.is_empty() {
            facts.push(format!("Serves: {}", record.servings));
        }
        if !facts.is_empty() {
            lines.push(facts.join(" · "));
            lines.push(String::new());
        }

        lines.push("## Ingredients".to_string());
        lines.push(String::new());
        for ing in &record.ingredients {
            let amount = format!("{} {}", ing.quantity, ing.unit);
            let amount = amount.trim();
            if amount.is_empty() {
                lines.push(format!("- {}", ing.name));
            } else {
                lines.push(format!("- {} {}", amount, ing.name));
            }
        }
        lines.push(String::new());

        lines.push("## Steps".to_string());
        lines.push(String::new());
        for (i, step) in record.steps.iter().enumerate() {
            lines.push(format!("{}. {}", i + 1, step));
        }

        if !record.tips.is_empty() {
            lines.push(String::new());
            lines.push("## Tips".to_string());
            lines.push(String::new());
            for tip in &record.tips {
                lines.push(format!("- {tip}"));
            }
        }

        let mut doc = lines.join("\n");
        doc.push('\n');
        doc
    }

    async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CookbookError> {
        let map_err = |e: std::io::Error| CookbookError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(map_err)?;
        }
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await.map_err(map_err)?;
        tokio::fs::rename(&tmp, path).await.map_err(map_err)?;
        Ok(())
    }
}

#[async_trait]
impl OutputWriter for MarkdownWriter {
    async fn write(
        &self,
        record: &RecipeRecord,
        illustration: &Illustration,
    ) -> Result<RecipeOutput, CookbookError> {
        let slug = self.free_slug(&slugify(&record.dish_name)).await;
        let illustration_rel = format!("illustrations/{slug}.png");
        let illustration_path = self.output_dir.join(&illustration_rel);
        let document_path = self.output_dir.join(format!("{slug}.md"));

        Self::write_atomic(&illustration_path, &illustration.bytes).await?;
        let doc = Self::render(record, &illustration_rel);
        Self::write_atomic(&document_path, doc.as_bytes()).await?;

        debug!(
            "Wrote '{}' → {} + {}",
            record.dish_name,
            document_path.display(),
            illustration_rel
        );

        Ok(RecipeOutput {
            record: record.clone(),
            document_path,
            illustration_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::Ingredient;

    fn record(dish: &str) -> RecipeRecord {
        RecipeRecord {
            dish_name: dish.into(),
            description: "Best eaten warm".into(),
            ingredients: vec![
                Ingredient {
                    name: "flour".into(),
                    quantity: "200".into(),
                    unit: "g".into(),
                },
                Ingredient {
                    name: "salt".into(),
                    quantity: String::new(),
                    unit: String::new(),
                },
            ],
            steps: vec!["Mix.".into(), "Bake.".into()],
            preparation_time: "10 min".into(),
            cooking_time: "30 min".into(),
            servings: "4".into(),
            tips: vec!["Rest the dough.".into()],
            source_language: None,
            target_language: "English".into(),
            source_photo: "p.jpg".into(),
        }
    }

    fn illustration() -> Illustration {
        Illustration {
            bytes: vec![1, 2, 3, 4],
            mime_type: "image/png".into(),
        }
    }

    #[test]
    fn slugify_cases() {
        assert_eq!(slugify("Pancakes"), "pancakes");
        assert_eq!(slugify("Sourdough  Bread!"), "sourdough-bread");
        assert_eq!(slugify("  Crème Brûlée  "), "cr-me-br-l-e");
        assert_eq!(slugify("???"), "recipe");
    }

    #[test]
    fn render_layout() {
        let doc = MarkdownWriter::render(&record("Flatbread"), "illustrations/flatbread.png");
        assert!(doc.starts_with("# Flatbread\n"));
        assert!(doc.contains("![Flatbread](illustrations/flatbread.png)"));
        assert!(doc.contains("Preparation: 10 min · Cooking: 30 min · Serves: 4"));
        assert!(doc.contains("- 200 g flour"));
        assert!(doc.contains("- salt"));
        assert!(doc.contains("1. Mix.\n2. Bake."));
        assert!(doc.contains("## Tips"));
        assert!(doc.ends_with('\n'));
    }

    #[tokio::test]
    async fn write_creates_document_and_asset() {
        let dir = tempfile::tempdir().unwrap();
        let writer = MarkdownWriter::new(dir.path());
        let out = writer.write(&record("Flatbread"), &illustration()).await.unwrap();

        assert_eq!(out.document_path, dir.path().join("flatbread.md"));
        assert!(out.document_path.exists());
        assert!(out.illustration_path.exists());
        let doc = std::fs::read_to_string(&out.document_path).unwrap();
        assert!(doc.contains("![Flatbread](illustrations/flatbread.png)"));
        assert_eq!(std::fs::read(&out.illustration_path).unwrap(), vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn duplicate_dish_names_do_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let writer = MarkdownWriter::new(dir.path());
        let first = writer.write(&record("Pancakes"), &illustration()).await.unwrap();
        let second = writer.write(&record("Pancakes"), &illustration()).await.unwrap();

        assert_eq!(first.document_path, dir.path().join("pancakes.md"));
        assert_eq!(second.document_path, dir.path().join("pancakes-2.md"));
        assert!(first.document_path.exists());
        assert!(second.document_path.exists());
    }
}
