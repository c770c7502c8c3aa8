//! Upload and download boundary.
//!
//! This is the seam a transport (the CLI here, an HTTP router elsewhere)
//! calls into. It owns no per-request state: each upload is written under a
//! fresh generated name, planned, upscaled, and described back to the caller
//! as JSON-ready structs.
//!
//! ```text
//! upload bytes ──► uploads/{ts}_{token}_{name}
//!                    │ identify → plan_target_dimensions
//!                    ▼
//!                  Upscaler (AI tier → fallback tier)
//!                    │
//!                    ▼
//!              processed/upscaled_{ts}_{token}_{name} ──► UploadResponse
//! ```
//!
//! Both files are left for the [`retention`](crate::retention) sweeper.

use crate::config::{ServiceConfig, StorageConfig, effective_ai_jobs};
use crate::engine::AiCapability;
use crate::imaging::{self, ImagingError, Quality, UpscaleParams, plan_target_dimensions};
use crate::naming;
use crate::upscale::{ArtifactResult, UpscaleError, Upscaler};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("No file part")]
    NoFile,
    #[error("No selected file")]
    EmptyFilename,
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("Invalid image: {0}")]
    InvalidImage(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Imaging(#[from] ImagingError),
    #[error(transparent)]
    Upscale(#[from] UpscaleError),
}

impl HandlerError {
    /// HTTP-style status for this error.
    pub fn status(&self) -> u16 {
        match self {
            Self::NoFile | Self::EmptyFilename | Self::UnsupportedType(_) => 400,
            Self::NotFound(_) => 404,
            Self::InvalidImage(_) | Self::Io(_) | Self::Imaging(_) | Self::Upscale(_) => 500,
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.to_string(),
        }
    }
}

/// Success descriptor: `{"success": true, "filename", "width", "height"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    /// Artifact filename, usable with [`Service::resolve_download`].
    pub filename: String,
    pub width: u32,
    pub height: u32,
}

impl From<&ArtifactResult> for UploadResponse {
    fn from(artifact: &ArtifactResult) -> Self {
        Self {
            success: true,
            filename: artifact
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            width: artifact.width,
            height: artifact.height,
        }
    }
}

/// Failure descriptor: `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// The three storage directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Storage {
    pub uploads: PathBuf,
    pub processed: PathBuf,
    pub weights: PathBuf,
}

impl Storage {
    pub fn from_config(config: &StorageConfig) -> Self {
        Self {
            uploads: config.uploads.clone(),
            processed: config.processed.clone(),
            weights: config.weights.clone(),
        }
    }

    /// All three directories under one root, for tests and ad-hoc runs.
    pub fn under(root: &Path) -> Self {
        Self {
            uploads: root.join("uploads"),
            processed: root.join("processed"),
            weights: root.join("weights"),
        }
    }

    /// Create any missing directories.
    pub fn initialize(&self) -> std::io::Result<()> {
        for dir in [&self.uploads, &self.processed, &self.weights] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Path of an existing artifact in the processed directory.
    ///
    /// Names that could escape the directory, hidden files, and anything
    /// already swept all resolve to [`HandlerError::NotFound`].
    pub fn resolve_artifact(&self, filename: &str) -> Result<PathBuf, HandlerError> {
        if !naming::is_servable_name(filename) {
            return Err(HandlerError::NotFound(filename.to_string()));
        }
        let path = self.processed.join(filename);
        if path.is_file() {
            Ok(path)
        } else {
            Err(HandlerError::NotFound(filename.to_string()))
        }
    }

    /// Directories the retention sweeper watches.
    pub fn swept_dirs(&self) -> Vec<PathBuf> {
        vec![self.uploads.clone(), self.processed.clone()]
    }
}

/// Upload processing service: storage plus an upscaler.
pub struct Service {
    storage: Storage,
    upscaler: Upscaler,
    quality: Quality,
}

impl Service {
    pub fn new(storage: Storage, upscaler: Upscaler, quality: Quality) -> Self {
        Self {
            storage,
            upscaler,
            quality,
        }
    }

    /// Startup: create directories and initialize the AI capability once.
    ///
    /// With `allow_ai` false the engine is never probed and every request
    /// uses the classical fallback.
    pub fn start(config: &ServiceConfig, allow_ai: bool) -> Result<Self, HandlerError> {
        let storage = Storage::from_config(&config.storage);
        storage.initialize()?;

        let capability = if allow_ai {
            AiCapability::initialize(&config.engine, &storage.weights)
        } else {
            AiCapability::unavailable("disabled on the command line")
        };
        let upscaler = Upscaler::new(capability, effective_ai_jobs(&config.processing));

        Ok(Self::new(
            storage,
            upscaler,
            Quality::new(config.output.quality),
        ))
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn upscaler(&self) -> &Upscaler {
        &self.upscaler
    }

    /// Handle one upload.
    ///
    /// `original_name` is `None` when the request carried no file at all.
    pub fn handle_upload(
        &self,
        original_name: Option<&str>,
        bytes: &[u8],
    ) -> Result<UploadResponse, HandlerError> {
        let artifact = self.process_upload(original_name, bytes)?;
        Ok(UploadResponse::from(&artifact))
    }

    /// Like [`handle_upload`](Self::handle_upload), returning the full artifact
    /// result including which tier produced it.
    pub fn process_upload(
        &self,
        original_name: Option<&str>,
        bytes: &[u8],
    ) -> Result<ArtifactResult, HandlerError> {
        let original_name = original_name.ok_or(HandlerError::NoFile)?;
        if original_name.trim().is_empty() {
            return Err(HandlerError::EmptyFilename);
        }
        let original =
            naming::sanitize_original_name(original_name).ok_or(HandlerError::EmptyFilename)?;
        if !imaging::has_supported_extension(Path::new(&original)) {
            return Err(HandlerError::UnsupportedType(original));
        }

        let upload_name = naming::new_upload_filename(&original);
        let upload_path = self.storage.uploads.join(&upload_name);
        std::fs::write(&upload_path, bytes)?;

        let (width, height) = imaging::identify(&upload_path)?;
        if width == 0 || height == 0 {
            return Err(HandlerError::InvalidImage(format!(
                "{original} is {width}x{height}"
            )));
        }
        let target = plan_target_dimensions(width, height);

        let artifact_path = self
            .storage
            .processed
            .join(naming::artifact_filename(&upload_name));
        let params = UpscaleParams::new(&upload_path, artifact_path, target, self.quality);
        Ok(self.upscaler.upscale(&params)?)
    }

    /// Resolve an artifact filename for download.
    pub fn resolve_download(&self, filename: &str) -> Result<PathBuf, HandlerError> {
        self.storage.resolve_artifact(filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tests::{MockBehavior, MockEnhancer};
    use crate::test_helpers::{dir_names, jpeg_bytes, truncated_jpeg_bytes};
    use crate::upscale::Tier;
    use tempfile::TempDir;

    fn service(root: &Path, capability: AiCapability) -> Service {
        let storage = Storage::under(root);
        storage.initialize().unwrap();
        Service::new(storage, Upscaler::new(capability, 1), Quality::default())
    }

    fn fallback_service(root: &Path) -> Service {
        service(root, AiCapability::unavailable("test"))
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn missing_file_is_400() {
        let tmp = TempDir::new().unwrap();
        let svc = fallback_service(tmp.path());

        let err = svc.handle_upload(None, b"").unwrap_err();
        assert!(matches!(err, HandlerError::NoFile));
        assert_eq!(err.status(), 400);
        assert_eq!(err.to_response().error, "No file part");
    }

    #[test]
    fn empty_filename_is_400() {
        let tmp = TempDir::new().unwrap();
        let svc = fallback_service(tmp.path());

        for name in ["", "   ", "uploads/"] {
            let err = svc.handle_upload(Some(name), b"x").unwrap_err();
            assert!(matches!(err, HandlerError::EmptyFilename), "{name:?}");
            assert_eq!(err.to_response().error, "No selected file");
        }
        assert!(dir_names(&svc.storage().uploads).is_empty());
    }

    #[test]
    fn unsupported_extension_is_400() {
        let tmp = TempDir::new().unwrap();
        let svc = fallback_service(tmp.path());

        let err = svc.handle_upload(Some("notes.txt"), b"hello").unwrap_err();
        assert!(matches!(err, HandlerError::UnsupportedType(_)));
        assert_eq!(err.status(), 400);
    }

    // =========================================================================
    // Processing
    // =========================================================================

    #[test]
    fn upload_writes_source_and_artifact() {
        let tmp = TempDir::new().unwrap();
        let svc = service(
            tmp.path(),
            AiCapability::available(MockEnhancer::new(MockBehavior::Enlarge)),
        );

        let response = svc
            .handle_upload(Some("wide.jpg"), &jpeg_bytes(40, 20))
            .unwrap();

        assert!(response.success);
        assert_eq!((response.width, response.height), (3840, 1920));
        assert!(response.filename.starts_with("upscaled_"));
        assert!(response.filename.ends_with("_wide.jpg"));

        let uploads = dir_names(&svc.storage().uploads);
        assert_eq!(uploads.len(), 1);
        assert_eq!(response.filename, format!("upscaled_{}", uploads[0]));

        let artifact = svc.resolve_download(&response.filename).unwrap();
        assert_eq!(imaging::identify(&artifact).unwrap(), (3840, 1920));
    }

    #[test]
    fn failing_engine_still_succeeds() {
        let tmp = TempDir::new().unwrap();
        let svc = service(
            tmp.path(),
            AiCapability::available(MockEnhancer::new(MockBehavior::Fail)),
        );

        let artifact = svc
            .process_upload(Some("tall.jpg"), &jpeg_bytes(10, 20))
            .unwrap();
        assert_eq!(artifact.tier, Tier::Fallback);
        assert_eq!((artifact.width, artifact.height), (1920, 3840));
        assert_eq!(imaging::identify(&artifact.path).unwrap(), (1920, 3840));
    }

    #[test]
    fn corrupt_upload_is_500_without_artifact() {
        let tmp = TempDir::new().unwrap();
        let svc = fallback_service(tmp.path());

        let err = svc
            .handle_upload(Some("broken.jpg"), &truncated_jpeg_bytes())
            .unwrap_err();

        assert_eq!(err.status(), 500);
        assert!(!err.to_response().error.is_empty());
        assert!(dir_names(&svc.storage().processed).is_empty());
    }

    #[test]
    fn half_uploaded_jpeg_is_500_without_artifact() {
        let tmp = TempDir::new().unwrap();
        let svc = service(
            tmp.path(),
            AiCapability::available(MockEnhancer::new(MockBehavior::Enlarge)),
        );
        let bytes = jpeg_bytes(400, 300);

        let err = svc
            .handle_upload(Some("half.jpg"), &bytes[..bytes.len() / 2])
            .unwrap_err();

        assert!(matches!(err, HandlerError::Upscale(UpscaleError::Source(_))));
        assert_eq!(err.status(), 500);
        assert!(dir_names(&svc.storage().processed).is_empty());
    }

    #[test]
    fn directory_components_are_stripped_from_upload_names() {
        let tmp = TempDir::new().unwrap();
        let svc = fallback_service(tmp.path());

        let response = svc
            .handle_upload(Some("../../evil/sq.png"), &png_bytes(8, 8))
            .unwrap();

        assert!(response.filename.ends_with("_sq.png"));
        assert_eq!((response.width, response.height), (3840, 3840));
        assert_eq!(dir_names(&svc.storage().uploads).len(), 1);
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 10, 10]));
        let mut bytes = std::io::Cursor::new(Vec::new());
        img.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    // =========================================================================
    // Download
    // =========================================================================

    #[test]
    fn download_unknown_is_404() {
        let tmp = TempDir::new().unwrap();
        let svc = fallback_service(tmp.path());

        let err = svc.resolve_download("upscaled_nope.jpg").unwrap_err();
        assert!(matches!(err, HandlerError::NotFound(_)));
        assert_eq!(err.status(), 404);
    }

    #[test]
    fn download_rejects_traversal_and_hidden_files() {
        let tmp = TempDir::new().unwrap();
        let svc = fallback_service(tmp.path());
        std::fs::write(svc.storage().uploads.join("secret.jpg"), b"x").unwrap();
        std::fs::write(svc.storage().processed.join(".x.jpg.partial"), b"x").unwrap();

        for name in ["../uploads/secret.jpg", ".x.jpg.partial", ""] {
            assert!(
                matches!(svc.resolve_download(name), Err(HandlerError::NotFound(_))),
                "{name:?}"
            );
        }
    }

    // =========================================================================
    // Descriptors
    // =========================================================================

    #[test]
    fn upload_response_json_shape() {
        let response = UploadResponse {
            success: true,
            filename: "upscaled_1_000000ab_a.jpg".into(),
            width: 3840,
            height: 2160,
        };
        let json: serde_json::Value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "success": true,
                "filename": "upscaled_1_000000ab_a.jpg",
                "width": 3840,
                "height": 2160
            })
        );
    }

    #[test]
    fn error_response_json_shape() {
        let json = serde_json::to_string(&HandlerError::NoFile.to_response()).unwrap();
        assert_eq!(json, r#"{"error":"No file part"}"#);
    }

    #[test]
    fn storage_initialize_creates_all_dirs() {
        let tmp = TempDir::new().unwrap();
        let storage = Storage::under(&tmp.path().join("nested"));
        storage.initialize().unwrap();

        assert!(storage.uploads.is_dir());
        assert!(storage.processed.is_dir());
        assert!(storage.weights.is_dir());
        assert_eq!(
            storage.swept_dirs(),
            vec![storage.uploads.clone(), storage.processed.clone()]
        );
    }

    #[test]
    fn start_with_ai_disabled_uses_fallback() {
        let tmp = TempDir::new().unwrap();
        let config = ServiceConfig {
            storage: StorageConfig {
                uploads: tmp.path().join("u"),
                processed: tmp.path().join("p"),
                weights: tmp.path().join("w"),
            },
            ..ServiceConfig::default()
        };

        let svc = Service::start(&config, false).unwrap();
        assert!(!svc.upscaler().capability().is_available());
        assert!(tmp.path().join("w").is_dir());
    }
}
