//! Two-tier upscaling strategy.
//!
//! Every request produces an artifact of exactly the requested size. The
//! tiers are tried in order:
//!
//! 1. **AI tier**: only when the process has an [`AiCapability::Available`]
//!    engine. Decode at native depth, enhance 4×, area-resample to the exact
//!    target, save. Any failure along the way (including a panic inside the
//!    engine) is logged and swallowed.
//! 2. **Fallback tier**: decode, drop alpha/palette to plain RGB, one
//!    Lanczos3 resample straight to the target, save. Its errors are the only
//!    ones a caller ever sees.
//!
//! Callers can't tell the tiers apart from the artifact: both honour the same
//! dimensions. [`ArtifactResult::tier`] exists for logs and CLI reports.
//!
//! ## Bounded AI concurrency
//!
//! Enhancement is heavy on memory and GPU. AI work runs inside a dedicated
//! rayon pool whose size caps how many enhancements happen at once; a caller
//! blocks in [`rayon::ThreadPool::install`] until a worker takes its job. The
//! fallback tier runs on the caller's thread.

use crate::engine::{AiCapability, EngineError, Enhancer};
use crate::imaging::{self, ImagingError, UpscaleParams};
use serde::Serialize;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UpscaleError {
    #[error("Failed to read source image: {0}")]
    Source(#[source] ImagingError),
    #[error("Failed to write artifact: {0}")]
    Write(#[source] ImagingError),
}

/// Which tier produced an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Ai,
    Fallback,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Ai => f.write_str("ai"),
            Tier::Fallback => f.write_str("fallback"),
        }
    }
}

/// A written artifact. `width`/`height` always equal the requested target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactResult {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub tier: Tier,
}

pub struct Upscaler {
    capability: AiCapability,
    ai_pool: Option<rayon::ThreadPool>,
}

impl Upscaler {
    /// Build an upscaler around a capability decided at startup.
    ///
    /// `max_ai_jobs` bounds concurrent enhancements. If the pool cannot be
    /// built, AI work runs unbounded on the caller's thread instead.
    pub fn new(capability: AiCapability, max_ai_jobs: usize) -> Self {
        let ai_pool = if capability.is_available() {
            rayon::ThreadPoolBuilder::new()
                .num_threads(max_ai_jobs.max(1))
                .thread_name(|i| format!("ai-upscale-{i}"))
                .build()
                .map_err(|e| log::warn!("AI worker pool unavailable, running inline: {e}"))
                .ok()
        } else {
            None
        };
        Self {
            capability,
            ai_pool,
        }
    }

    pub fn capability(&self) -> &AiCapability {
        &self.capability
    }

    /// Produce `params.output` at exactly `params.width` × `params.height`.
    pub fn upscale(&self, params: &UpscaleParams) -> Result<ArtifactResult, UpscaleError> {
        if let Some(enhancer) = self.capability.enhancer() {
            match self.run_ai_tier(enhancer, params) {
                Ok(()) => {
                    log::info!(
                        "{} → {}x{} via {}",
                        params.source.display(),
                        params.width,
                        params.height,
                        enhancer.name()
                    );
                    return Ok(artifact(params, Tier::Ai));
                }
                Err(e) => log::warn!(
                    "AI upscaling failed for {}, using fallback: {e}",
                    params.source.display()
                ),
            }
        }

        upscale_fallback(params)?;
        log::info!(
            "{} → {}x{} via Lanczos3 fallback",
            params.source.display(),
            params.width,
            params.height
        );
        Ok(artifact(params, Tier::Fallback))
    }

    fn run_ai_tier(
        &self,
        enhancer: &dyn Enhancer,
        params: &UpscaleParams,
    ) -> Result<(), EngineError> {
        let job = || {
            catch_unwind(AssertUnwindSafe(|| upscale_ai(enhancer, params)))
                .unwrap_or_else(|payload| Err(EngineError::Panicked(panic_message(payload))))
        };
        match &self.ai_pool {
            Some(pool) => pool.install(job),
            None => job(),
        }
    }
}

fn artifact(params: &UpscaleParams, tier: Tier) -> ArtifactResult {
    ArtifactResult {
        path: params.output.clone(),
        width: params.width,
        height: params.height,
        tier,
    }
}

/// AI tier: native-depth decode → 4× enhance → area resample → save.
pub fn upscale_ai(enhancer: &dyn Enhancer, params: &UpscaleParams) -> Result<(), EngineError> {
    let img = imaging::load_image(&params.source)?;
    let enhanced = enhancer.enhance(&img)?;
    log::debug!(
        "{} enhanced {}x{} → {}x{}",
        enhancer.name(),
        img.width(),
        img.height(),
        enhanced.width(),
        enhanced.height()
    );
    drop(img);

    let resized = imaging::resample_area(&enhanced, params.width, params.height)?;
    drop(enhanced);
    imaging::save_image(&resized, &params.output, params.quality)?;
    Ok(())
}

/// Fallback tier: RGB decode → one-step Lanczos3 → save.
pub fn upscale_fallback(params: &UpscaleParams) -> Result<(), UpscaleError> {
    let img = imaging::load_rgb8(&params.source).map_err(UpscaleError::Source)?;
    let resized = imaging::resample_lanczos(&img, params.width, params.height);
    imaging::save_image(&resized, &params.output, params.quality).map_err(UpscaleError::Write)
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
