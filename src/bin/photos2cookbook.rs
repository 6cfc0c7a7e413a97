//! CLI binary for photos2cookbook.
//!
//! A thin shim over the library crate that maps CLI flags to `RunConfig`,
//! renders live progress, and prints the run report.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use photos2cookbook::{run, CancelSignal, DirectorySource, RunConfig, RunProgressCallback};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI definition ───────────────────────────────────────────────────────────

/// Generate an illustrated Markdown cookbook from a directory of recipe photos.
#[derive(Parser, Debug)]
#[command(name = "photos2cookbook", version, about)]
struct Cli {
    /// Directory containing recipe photos
    #[arg(default_value = "photos")]
    input_dir: PathBuf,

    /// Directory for generated documents and illustrations
    #[arg(short, long, default_value = "cookbook")]
    output_dir: PathBuf,

    /// Target aspect ratio (width/height) for preprocessing
    #[arg(long, default_value_t = 0.8)]
    aspect_ratio: f32,

    /// Minimum seam width for composite splitting, as a fraction of the
    /// shorter image dimension
    #[arg(long, default_value_t = 0.08)]
    split_margin_ratio: f32,

    /// Language the photographed recipes are written in (auto-detect if unset)
    #[arg(long)]
    source_language: Option<String>,

    /// Target language for the generated recipes
    #[arg(short, long, default_value = "English")]
    language: String,

    /// Directory containing reference style images for illustrations
    #[arg(long)]
    reference_style_dir: Option<PathBuf>,

    /// Fallback style phrase when no reference images are available
    #[arg(long)]
    default_style: Option<String>,

    /// Number of concurrent extraction/illustration units
    #[arg(short, long, default_value_t = 4)]
    concurrency: usize,

    /// Maximum retry attempts on transient service failures
    #[arg(long, default_value_t = 3)]
    max_retries: u32,

    /// Initial retry backoff in milliseconds (doubles per attempt)
    #[arg(long, default_value_t = 500)]
    retry_backoff_ms: u64,

    /// Per-service-call timeout in seconds
    #[arg(long, default_value_t = 60)]
    api_timeout: u64,

    /// OpenAI-compatible API base URL
    #[arg(long, env = "COOKBOOK_API_ENDPOINT")]
    api_endpoint: Option<String>,

    /// API key for the extraction/illustration services
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Extraction model identifier
    #[arg(long)]
    extraction_model: Option<String>,

    /// Illustration model identifier
    #[arg(long)]
    illustration_model: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress progress output
    #[arg(short, long)]
    quiet: bool,
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus per-region log lines.
/// Regions complete out of order in concurrent mode; the bar length grows as
/// composite photos split into extra regions.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:40.green/238}] {pos:>3}/{len} regions  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");
        bar.set_style(style);
        bar.set_prefix("Cooking");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }
}

impl RunProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_photos: usize) {
        self.bar.set_length(total_photos as u64);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {total_photos} photos…"))
        ));
    }

    fn on_photo_split(&self, photo_id: &str, regions: usize) {
        if regions > 1 {
            self.bar.inc_length(regions as u64 - 1);
            self.bar.println(format!(
                "  {} {photo_id} split into {regions} regions",
                cyan("◇")
            ));
        }
    }

    fn on_region_start(&self, photo_id: &str, region_index: usize) {
        self.bar.set_message(format!("{photo_id}#{region_index}"));
    }

    fn on_region_complete(&self, photo_id: &str, region_index: usize, dish_name: &str) {
        self.bar.println(format!(
            "  {} {}  {}",
            green("✓"),
            bold(dish_name),
            dim(&format!("({photo_id}#{region_index})"))
        ));
        self.bar.inc(1);
    }

    fn on_region_error(&self, photo_id: &str, region_index: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg = if error.len() > 80 {
            format!("{}\u{2026}", &error[..79])
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} {photo_id}#{region_index}  {}",
            red("✗"),
            dim(&msg)
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, _total_regions: usize, _assembled: usize) {
        self.bar.finish_and_clear();
    }
}

// ── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (_, 0) => "warn",
        (_, 1) => "photos2cookbook=debug,info",
        (_, _) => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cancel = CancelSignal::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\n{} finishing in-flight work…", bold("Cancelling:"));
                cancel.cancel();
            }
        });
    }

    let mut builder = RunConfig::builder()
        .target_aspect_ratio(cli.aspect_ratio)
        .split_margin_ratio(cli.split_margin_ratio)
        .target_language(&cli.language)
        .output_dir(&cli.output_dir)
        .concurrency(cli.concurrency)
        .max_retries(cli.max_retries)
        .retry_backoff_ms(cli.retry_backoff_ms)
        .api_timeout_secs(cli.api_timeout)
        .cancel(cancel);
    if let Some(lang) = &cli.source_language {
        builder = builder.source_language(lang);
    }
    if let Some(dir) = &cli.reference_style_dir {
        builder = builder.reference_style_dir(dir);
    }
    if let Some(style) = &cli.default_style {
        builder = builder.default_style(style);
    }
    if let Some(endpoint) = &cli.api_endpoint {
        builder = builder.api_endpoint(endpoint);
    }
    if let Some(key) = &cli.api_key {
        builder = builder.api_key(key);
    }
    if let Some(model) = &cli.extraction_model {
        builder = builder.extraction_model(model);
    }
    if let Some(model) = &cli.illustration_model {
        builder = builder.illustration_model(model);
    }
    if !cli.quiet {
        builder = builder.progress_callback(CliProgressCallback::new());
    }
    let config = builder.build().context("invalid configuration")?;

    let source = DirectorySource::new(&cli.input_dir);
    let report = run(&source, &config)
        .await
        .context("cookbook run failed")?;

    // ── Summary ──────────────────────────────────────────────────────────
    let s = &report.stats;
    println!();
    println!(
        "{}  {} photos → {} regions in {:.1}s",
        bold("Done."),
        s.total_photos,
        s.total_regions,
        s.total_duration_ms as f64 / 1000.0
    );
    println!("  {} {} assembled", green("✓"), s.assembled);
    if s.extract_failed > 0 {
        println!("  {} {} extraction failures", red("✗"), s.extract_failed);
    }
    if s.illustrate_failed > 0 {
        println!("  {} {} illustration failures", red("✗"), s.illustrate_failed);
    }
    if s.invalid_photos > 0 {
        println!("  {} {} unusable photos", red("✗"), s.invalid_photos);
    }
    if s.skipped > 0 {
        println!("  {} {} skipped (cancelled)", dim("∅"), s.skipped);
    }
    for failure in report.failures() {
        if let Some(err) = &failure.error {
            println!("    {}", dim(&err.to_string()));
        }
    }
    if s.assembled > 0 {
        println!(
            "\n  Cookbook written to {}",
            bold(&cli.output_dir.display().to_string())
        );
    }

    // Non-zero exit when cancelled or nothing was produced.
    let incomplete = report.results.iter().any(|r| r.is_incomplete());
    if s.assembled == 0 || incomplete {
        std::process::exit(1);
    }
    Ok(())
}
