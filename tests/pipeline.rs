//! End-to-end runs through the public upload/download API.

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use upscale4k::engine::{AiCapability, EngineError, Enhancer, SCALE};
use upscale4k::handler::{HandlerError, Service, Storage};
use upscale4k::imaging::{self, Quality};
use upscale4k::retention::{self, RetentionPolicy};
use upscale4k::upscale::{Tier, Upscaler};

fn encoded(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 5 % 256) as u8, (y * 9 % 256) as u8, 60])
    });
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, format).unwrap();
    bytes.into_inner()
}

fn start(root: &Path, capability: AiCapability) -> Service {
    let storage = Storage::under(root);
    storage.initialize().unwrap();
    Service::new(storage, Upscaler::new(capability, 1), Quality::default())
}

/// Bilinear 4× enlargement standing in for a neural model.
struct BilinearX4 {
    calls: AtomicUsize,
}

impl Enhancer for BilinearX4 {
    fn name(&self) -> &str {
        "bilinear-x4"
    }

    fn enhance(&self, image: &DynamicImage) -> Result<DynamicImage, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(image.resize_exact(
            image.width() * SCALE,
            image.height() * SCALE,
            image::imageops::FilterType::Triangle,
        ))
    }
}

struct Broken;

impl Enhancer for Broken {
    fn name(&self) -> &str {
        "broken"
    }

    fn enhance(&self, _image: &DynamicImage) -> Result<DynamicImage, EngineError> {
        Err(EngineError::Failed {
            status: "exit status: 255".into(),
            stderr: "no Vulkan device".into(),
        })
    }
}

#[test]
fn fallback_only_upload_then_download() {
    let tmp = TempDir::new().unwrap();
    let service = start(tmp.path(), AiCapability::unavailable("not installed"));

    let response = service
        .handle_upload(Some("landscape.png"), &encoded(40, 20, ImageFormat::Png))
        .unwrap();

    assert!(response.success);
    assert_eq!((response.width, response.height), (3840, 1920));

    let path = service.resolve_download(&response.filename).unwrap();
    assert_eq!(imaging::identify(&path).unwrap(), (3840, 1920));
}

#[test]
fn ai_tier_output_matches_planned_dimensions() {
    let tmp = TempDir::new().unwrap();
    let enhancer = std::sync::Arc::new(BilinearX4 {
        calls: AtomicUsize::new(0),
    });
    let service = start(tmp.path(), AiCapability::Available(enhancer.clone()));

    let artifact = service
        .process_upload(Some("portrait.jpg"), &encoded(30, 60, ImageFormat::Jpeg))
        .unwrap();

    assert_eq!(artifact.tier, Tier::Ai);
    assert_eq!(enhancer.calls.load(Ordering::SeqCst), 1);
    assert_eq!((artifact.width, artifact.height), (1920, 3840));
    assert_eq!(imaging::identify(&artifact.path).unwrap(), (1920, 3840));
}

#[test]
fn broken_engine_is_invisible_to_the_caller() {
    let tmp = TempDir::new().unwrap();
    let service = start(tmp.path(), AiCapability::available(Broken));

    let response = service
        .handle_upload(Some("square.png"), &encoded(16, 16, ImageFormat::Png))
        .unwrap();

    assert!(response.success);
    assert_eq!((response.width, response.height), (3840, 3840));
}

#[test]
fn corrupt_upload_returns_error_and_no_artifact() {
    let tmp = TempDir::new().unwrap();
    let service = start(tmp.path(), AiCapability::unavailable("not installed"));

    // JPEG start-of-image marker, then garbage.
    let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
    bytes.extend_from_slice(b"not really a jpeg");
    let err = service.handle_upload(Some("cut.jpg"), &bytes).unwrap_err();

    assert_eq!(err.status(), 500);
    let processed: Vec<_> = std::fs::read_dir(&service.storage().processed)
        .unwrap()
        .collect();
    assert!(processed.is_empty());
}

#[test]
fn truncated_jpeg_upload_returns_error_and_no_artifact() {
    let tmp = TempDir::new().unwrap();
    let service = start(tmp.path(), AiCapability::unavailable("not installed"));

    let bytes = encoded(400, 300, ImageFormat::Jpeg);
    let err = service
        .handle_upload(Some("half.jpg"), &bytes[..bytes.len() / 2])
        .unwrap_err();

    assert_eq!(err.status(), 500);
    assert_eq!(
        std::fs::read_dir(&service.storage().processed)
            .unwrap()
            .count(),
        0
    );
}

#[test]
fn download_boundary_rejects_unknown_and_escaping_names() {
    let tmp = TempDir::new().unwrap();
    let service = start(tmp.path(), AiCapability::unavailable("not installed"));

    for name in ["upscaled_missing.png", "../uploads", "/etc/passwd"] {
        let err = service.resolve_download(name).unwrap_err();
        assert!(matches!(err, HandlerError::NotFound(_)), "{name}");
        assert_eq!(err.status(), 404);
    }
}

#[test]
fn swept_artifact_is_no_longer_downloadable() {
    let tmp = TempDir::new().unwrap();
    let service = start(tmp.path(), AiCapability::unavailable("not installed"));
    let response = service
        .handle_upload(Some("gone.png"), &encoded(8, 4, ImageFormat::Png))
        .unwrap();

    // Judge age from eleven minutes in the future instead of waiting.
    let later = SystemTime::now() + Duration::from_secs(660);
    let report = retention::sweep_once(
        &service.storage().swept_dirs(),
        &RetentionPolicy::default(),
        later,
    );

    assert_eq!(report.deleted, 2);
    assert!(matches!(
        service.resolve_download(&response.filename),
        Err(HandlerError::NotFound(_))
    ));
}
