//! Service configuration module.
//!
//! Handles loading and validating `config.toml`. Every field has a default, so
//! the file is optional and may be sparse.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [storage]
//! uploads = "uploads"       # Received source images
//! processed = "processed"   # Upscaled artifacts
//! weights = "weights"       # Model files (and optionally the engine binary)
//!
//! [engine]
//! enabled = true            # Set false to always use the classical fallback
//! # binary = "/opt/realesrgan/realesrgan-ncnn-vulkan"
//! model = "realesrgan-x4plus"
//! tile = 400                # Engine tile size in px (0 = whole image)
//!
//! [output]
//! quality = 95              # JPEG quality (1-100)
//!
//! [processing]
//! # max_ai_jobs = 1         # Concurrent AI upscales (omit for 1)
//! ```
//!
//! Retention (600 s max age, 60 s sweep interval) is fixed and
//! not configurable; see [`retention`](crate::retention).
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Service configuration loaded from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Directory layout.
    pub storage: StorageConfig,
    /// Neural upscaling engine.
    pub engine: EngineConfig,
    /// Artifact encoding.
    pub output: OutputConfig,
    /// Concurrency limits.
    pub processing: ProcessingConfig,
}

impl ServiceConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output.quality == 0 || self.output.quality > 100 {
            return Err(ConfigError::Validation(
                "output.quality must be 1-100".into(),
            ));
        }
        if self.engine.model.trim().is_empty() {
            return Err(ConfigError::Validation(
                "engine.model must not be empty".into(),
            ));
        }
        if self.engine.tile != 0 && self.engine.tile < 32 {
            return Err(ConfigError::Validation(
                "engine.tile must be 0 or at least 32".into(),
            ));
        }
        if self.processing.max_ai_jobs == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_ai_jobs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Where files live. Relative paths resolve against the working directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub uploads: PathBuf,
    pub processed: PathBuf,
    pub weights: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            uploads: PathBuf::from("uploads"),
            processed: PathBuf::from("processed"),
            weights: PathBuf::from("weights"),
        }
    }
}

/// Neural engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// When false the AI capability is never initialized.
    pub enabled: bool,
    /// Explicit path to the engine executable. When absent, the weights
    /// directory and then `PATH` are searched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary: Option<PathBuf>,
    /// Pretrained model name; `{model}.param` and `{model}.bin` must exist in
    /// the weights directory.
    pub model: String,
    /// Tile edge in pixels used by the engine to bound memory. 0 disables tiling.
    pub tile: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            binary: None,
            model: "realesrgan-x4plus".to_string(),
            tile: 400,
        }
    }
}

/// Artifact encoding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Lossy quality for JPEG artifacts.
    pub quality: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { quality: 95 }
    }
}

/// Concurrency settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of AI upscales running at once.
    /// When absent, one at a time. Values larger than the core count are clamped down.
    pub max_ai_jobs: Option<usize>,
}

/// Resolve the effective AI worker count from config.
///
/// - `None` → 1
/// - `Some(n)` → `min(n, cores)`, at least 1
pub fn effective_ai_jobs(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_ai_jobs.map(|n| n.min(cores)).unwrap_or(1).max(1)
}

/// Parse a TOML string into a validated config.
pub fn parse_config(content: &str) -> Result<ServiceConfig, ConfigError> {
    let config: ServiceConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, falling back to defaults when the file doesn't exist.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    if !path.exists() {
        return Ok(ServiceConfig::default());
    }
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// A documented stock `config.toml` with every option at its default.
pub fn stock_config_toml() -> &'static str {
    r#"# upscale4k configuration
# All options are optional; the values below are the defaults.

[storage]
# Received source images. Swept after 10 minutes.
uploads = "uploads"
# Upscaled artifacts. Swept after 10 minutes.
processed = "processed"
# Model files for the neural engine.
weights = "weights"

[engine]
# Set to false to always use the classical Lanczos fallback.
enabled = true
# Path to realesrgan-ncnn-vulkan. When omitted, the weights directory and
# then PATH are searched.
# binary = "/opt/realesrgan/realesrgan-ncnn-vulkan"
# Pretrained model; weights/<model>.param and weights/<model>.bin must exist.
model = "realesrgan-x4plus"
# Tile edge in pixels. Smaller tiles use less memory. 0 = no tiling.
tile = 400

[output]
# JPEG quality (1-100). Other formats are written lossless.
quality = 95

[processing]
# Concurrent AI upscales. Defaults to 1; clamped to the CPU core count.
# max_ai_jobs = 1
"#
}
