//! # photos2cookbook
//!
//! Turn a collection of recipe photographs into an illustrated Markdown
//! cookbook using Vision Language Models (VLMs).
//!
//! ## Why this crate?
//!
//! A shoebox of recipe cards, cookbook snapshots, and photographed contact
//! sheets is unreadable to classic OCR — handwriting, stains, mixed layouts,
//! several dishes on one sheet. Instead this crate normalizes each photo,
//! cuts composite sheets apart along their gutter seams, and lets a VLM read
//! each dish photo as a human would, producing a validated structured recipe
//! plus a style-consistent generated illustration per dish.
//!
//! ## Pipeline Overview
//!
//! ```text
//! photos
//!  │
//!  ├─ 1. Ingest      ordered photo sequence (local directory or custom source)
//!  ├─ 2. Normalize   reshape to the target aspect ratio (pad or crop)
//!  ├─ 3. Split       cut composite sheets along gutter seams into regions
//!  ├─ 4. Extract     concurrent VLM calls → validated recipe records
//!  ├─ 5. Illustrate  one artwork per recipe, shared style profile
//!  └─ 6. Assemble    per-recipe Markdown + illustration asset + run report
//! ```
//!
//! Failure isolation is the core design property: every photo region is an
//! independent unit. A region whose extraction fails validation, or whose
//! calls exhaust their retries, is recorded in the run report — it never
//! blocks sibling regions or other photos.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use photos2cookbook::{run, DirectorySource, RunConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // API key picked up from OPENAI_API_KEY.
//!     let config = RunConfig::builder()
//!         .reference_style_dir("reference_style")
//!         .output_dir("cookbook")
//!         .build()?;
//!     let source = DirectorySource::new("photos");
//!     let report = run(&source, &config).await?;
//!     println!(
//!         "{} recipes assembled, {} failed",
//!         report.stats.assembled,
//!         report.stats.extract_failed + report.stats.illustrate_failed
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `photos2cookbook` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only
//! deps:
//! ```toml
//! photos2cookbook = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod adapters;
pub mod config;
pub mod error;
pub mod markdown;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod recipe;
pub mod run;
pub mod source;
pub mod stream;
pub mod style;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use adapters::openai::{OpenAiIllustrator, OpenAiRecipeExtractor};
pub use adapters::{
    AdapterError, EncodedImage, ExtractionRequest, Illustrator, IllustrationRequest,
    RecipeExtractor, RetryPolicy,
};
pub use config::{CancelSignal, RunConfig, RunConfigBuilder};
pub use error::{CookbookError, UnitError};
pub use markdown::{slugify, MarkdownWriter, OutputWriter};
pub use output::{Illustration, RecipeOutput, RegionResult, RunReport, RunStats, UnitState};
pub use pipeline::normalize::{normalize_aspect, NormalizedPhoto, RATIO_EPSILON};
pub use pipeline::split::{split_regions, SplitRegion};
pub use progress::{NoopProgressCallback, ProgressCallback, RunProgressCallback};
pub use recipe::{Ingredient, RecipeRecord};
pub use run::run;
pub use source::{DirectorySource, Photo, PhotoSource};
pub use stream::{run_stream, RegionResultStream};
pub use style::{build_style_profile, StyleProfile};
