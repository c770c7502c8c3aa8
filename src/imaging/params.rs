//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the request handler (which decides names and target
//! sizes) and the [`upscale`](crate::upscale) strategy (which does the pixel
//! work through whichever tier succeeds).
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 95). Clamped on construction.
//! - [`UpscaleParams`]: everything needed for one upscale: source, output path,
//!   exact target size, quality.

use super::calculations::TargetDimensions;
use std::path::PathBuf;

/// Quality setting for lossy image encoding (1-100).
///
/// Only JPEG output honours it; PNG, TIFF, BMP and WebP are written lossless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    /// Photographic content: high enough that re-encoding a 4K upscale shows no blocking.
    fn default() -> Self {
        Self(95)
    }
}

/// Parameters for producing one artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct UpscaleParams {
    pub source: PathBuf,
    /// Final artifact path. The encoder is chosen from its extension.
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub quality: Quality,
}

impl UpscaleParams {
    pub fn new(
        source: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        target: TargetDimensions,
        quality: Quality,
    ) -> Self {
        Self {
            source: source.into(),
            output: output.into(),
            width: target.width,
            height: target.height,
            quality,
        }
    }

    pub fn target(&self) -> TargetDimensions {
        TargetDimensions {
            width: self.width,
            height: self.height,
        }
    }
}
