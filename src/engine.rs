//! Neural super-resolution engine.
//!
//! The engine is an opaque capability: hand it an image, get back the same
//! image enlarged 4×, or an error. [`Enhancer`] is that contract, and
//! [`AiCapability`] is what the process decided at startup: either a ready
//! enhancer or the reason there isn't one. The capability is built exactly
//! once and passed to the [`Upscaler`](crate::upscale::Upscaler) explicitly;
//! a failed initialization is never retried.
//!
//! The production enhancer is [`RealEsrganCli`], which drives the
//! `realesrgan-ncnn-vulkan` executable with the `realesrgan-x4plus` model.
//! The executable tiles internally, so memory is bounded by the tile size
//! rather than the image size.

use crate::config::EngineConfig;
use crate::imaging::{self, ImagingError, Quality};
use image::DynamicImage;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use thiserror::Error;

/// Fixed enlargement factor of every enhancer.
pub const SCALE: u32 = 4;

/// Executable name searched for when no explicit binary is configured.
pub const ENGINE_BINARY: &str = "realesrgan-ncnn-vulkan";

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Imaging(#[from] ImagingError),
    #[error("Engine disabled in config")]
    Disabled,
    #[error("Engine executable not found: {0}")]
    BinaryNotFound(String),
    #[error("Model file missing: {}", .0.display())]
    ModelMissing(PathBuf),
    #[error("Engine exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("Engine panicked: {0}")]
    Panicked(String),
}

/// A 4× super-resolution model.
///
/// Implementations must be `Send + Sync`: one enhancer is shared by every
/// request for the life of the process.
pub trait Enhancer: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Enlarge `image` by [`SCALE`] in both dimensions.
    fn enhance(&self, image: &DynamicImage) -> Result<DynamicImage, EngineError>;
}

/// Whether the AI tier can run in this process.
#[derive(Clone)]
pub enum AiCapability {
    Available(Arc<dyn Enhancer>),
    Unavailable { reason: String },
}

impl AiCapability {
    /// Initialize the production engine once, at startup.
    ///
    /// Never fails: any problem is logged and recorded as
    /// [`AiCapability::Unavailable`] for the rest of the process lifetime.
    pub fn initialize(config: &EngineConfig, weights_dir: &Path) -> Self {
        if !config.enabled {
            return Self::unavailable(EngineError::Disabled.to_string());
        }
        match RealEsrganCli::locate(config, weights_dir) {
            Ok(engine) => {
                log::info!(
                    "AI engine ready: {} ({})",
                    engine.name(),
                    engine.binary.display()
                );
                Self::available(engine)
            }
            Err(e) => {
                log::warn!("AI engine unavailable, classical fallback only: {e}");
                Self::unavailable(e.to_string())
            }
        }
    }

    pub fn available(enhancer: impl Enhancer + 'static) -> Self {
        Self::Available(Arc::new(enhancer))
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn enhancer(&self) -> Option<&dyn Enhancer> {
        match self {
            Self::Available(e) => Some(e.as_ref()),
            Self::Unavailable { .. } => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }
}

impl fmt::Debug for AiCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Available(e) => f.debug_tuple("Available").field(&e.name()).finish(),
            Self::Unavailable { reason } => f
                .debug_struct("Unavailable")
                .field("reason", reason)
                .finish(),
        }
    }
}

/// Real-ESRGAN through the ncnn/Vulkan command-line build.
#[derive(Debug, Clone)]
pub struct RealEsrganCli {
    binary: PathBuf,
    model_dir: PathBuf,
    model: String,
    tile: u32,
    scratch_dir: PathBuf,
}

impl RealEsrganCli {
    /// Find the executable and model files, without running anything.
    ///
    /// Executable lookup order: `config.binary`, then `weights_dir`, then
    /// every directory on `PATH`.
    pub fn locate(config: &EngineConfig, weights_dir: &Path) -> Result<Self, EngineError> {
        let binary = match &config.binary {
            Some(path) if path.is_file() => path.clone(),
            Some(path) => return Err(EngineError::BinaryNotFound(path.display().to_string())),
            None => find_binary(weights_dir)
                .ok_or_else(|| EngineError::BinaryNotFound(ENGINE_BINARY.to_string()))?,
        };

        for ext in ["param", "bin"] {
            let file = weights_dir.join(format!("{}.{ext}", config.model));
            if !file.is_file() {
                return Err(EngineError::ModelMissing(file));
            }
        }

        Ok(Self {
            binary,
            model_dir: weights_dir.to_path_buf(),
            model: config.model.clone(),
            tile: config.tile,
            scratch_dir: std::env::temp_dir(),
        })
    }

    /// Command line for one enhancement, input and output both PNG.
    fn command(&self, input: &Path, output: &Path) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-i")
            .arg(input)
            .arg("-o")
            .arg(output)
            .arg("-n")
            .arg(&self.model)
            .arg("-s")
            .arg(SCALE.to_string())
            .arg("-t")
            .arg(self.tile.to_string())
            .arg("-m")
            .arg(&self.model_dir)
            .arg("-f")
            .arg("png");
        cmd
    }

    fn scratch_file(&self, role: &str) -> ScratchFile {
        let token: u64 = rand::random();
        ScratchFile(
            self.scratch_dir
                .join(format!("upscale4k-{token:016x}-{role}.png")),
        )
    }
}

impl Enhancer for RealEsrganCli {
    fn name(&self) -> &str {
        &self.model
    }

    fn enhance(&self, image: &DynamicImage) -> Result<DynamicImage, EngineError> {
        let input = self.scratch_file("in");
        let output = self.scratch_file("out");

        // PNG keeps the native channel layout and depth for the engine.
        imaging::save_image(image, &input.0, Quality::default())?;

        let result = self.command(&input.0, &output.0).output()?;
        if !result.status.success() {
            return Err(EngineError::Failed {
                status: result.status.to_string(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        Ok(imaging::load_image_unbounded(&output.0)?)
    }
}

/// Temporary file removed on drop, whether or not the engine succeeded.
struct ScratchFile(PathBuf);

impl Drop for ScratchFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

fn binary_file_name() -> String {
    format!("{ENGINE_BINARY}{}", std::env::consts::EXE_SUFFIX)
}

fn find_binary(weights_dir: &Path) -> Option<PathBuf> {
    let name = binary_file_name();
    let local = weights_dir.join(&name);
    if local.is_file() {
        return Some(local);
    }
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(&name))
        .find(|candidate| candidate.is_file())
}
