//! Pipeline stages for photo-to-cookbook conversion.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. a different seam heuristic) without touching
//! other stages.
//!
//! ## Data Flow
//!
//! ```text
//! photo ──▶ normalize ──▶ split ──▶ encode ──▶ extract ──▶ illustrate
//! (bytes)   (ratio fix)  (regions)  (base64)   (recipe)    (artwork)
//! ```
//!
//! 1. [`normalize`] — decode the photo and reshape it to the target aspect
//!    ratio (pad or symmetric crop); runs under `spawn_blocking` because
//!    pixel work is CPU-bound
//! 2. [`split`]     — detect gutter seams and cut composite photos into
//!    per-dish regions; each region is re-normalized before extraction
//! 3. [`encode`]    — PNG-encode and base64-wrap each region for the
//!    multimodal API request body
//! 4. [`extract`]   — drive the extraction call with retry/backoff and
//!    fail-closed schema validation; network I/O
//! 5. [`illustrate`]— drive the generation call with the same retry shape,
//!    using the run's shared style profile; network I/O

pub mod encode;
pub mod extract;
pub mod illustrate;
pub mod normalize;
pub mod split;
