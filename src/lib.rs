//! # upscale4k
//!
//! Upscale raster images so their longer edge is exactly 3840 pixels, keeping
//! the aspect ratio. A neural super-resolution engine is used when one is
//! installed; otherwise, or whenever it fails, a single Lanczos3 resample
//! produces the same dimensions.
//!
//! # Architecture: Upload → Plan → Upscale → Expire
//!
//! ```text
//! 1. Upload   bytes       →  uploads/{ts}_{token}_{name}
//! 2. Plan     dimensions  →  TargetDimensions (long edge 3840)
//! 3. Upscale  source      →  processed/upscaled_{ts}_{token}_{name}
//! 4. Expire   sweeper     →  both files deleted after 10 minutes
//! ```
//!
//! The filesystem is the only state. Nothing records which uploads exist:
//! artifacts are found by name, and the sweeper forgets them by age.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`handler`] | Upload/download boundary: validation, naming, status codes, JSON descriptors |
//! | [`upscale`] | Two-tier strategy: AI tier with Lanczos3 fallback, bounded AI concurrency |
//! | [`engine`] | The [`Enhancer`](engine::Enhancer) contract and the Real-ESRGAN CLI engine |
//! | [`imaging`] | Dimension planning, decode/encode, resampling filters |
//! | [`retention`] | Background sweeper deleting files older than 600 seconds |
//! | [`naming`] | Upload and artifact filename patterns, download name checks |
//! | [`config`] | `config.toml` loading and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Capability, Not Global State
//!
//! Whether the AI engine works is decided once at startup and carried as an
//! [`AiCapability`](engine::AiCapability) value inside the
//! [`Upscaler`](upscale::Upscaler). Tests inject a mock enhancer the same way
//! production injects the real one. A failed initialization is logged and
//! never retried.
//!
//! ## Fallback Is Silent
//!
//! Callers never learn which tier ran. Both tiers honour the planned
//! dimensions exactly, so the artifact is interchangeable. AI errors, including
//! panics inside the engine, are logged as warnings and the request proceeds
//! on the fallback tier.
//!
//! ## Atomic Artifacts
//!
//! Artifacts are written to a hidden `.partial` sibling and renamed into place.
//! A download never sees a half-written file, and the sweeper never deletes
//! one under its final name.

pub mod config;
pub mod engine;
pub mod handler;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod retention;
pub mod upscale;

#[cfg(test)]
pub(crate) mod test_helpers;
