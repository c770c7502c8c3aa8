//! Shared test utilities for the upscale4k test suite.
//!
//! Synthetic image writers, a corrupt-file writer, and a helper for backdating
//! file modification times so retention tests don't have to wait.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = tempfile::TempDir::new().unwrap();
//! let source = tmp.path().join("photo.jpg");
//! create_test_jpeg(&source, 40, 20);
//! backdate(&source, SystemTime::now(), 601);
//! ```

use image::{ImageEncoder, Rgb, RgbImage, Rgba, RgbaImage};
use std::path::Path;
use std::time::{Duration, SystemTime};

// =========================================================================
// Synthetic images
// =========================================================================

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    })
}

/// Encode a small gradient JPEG in memory.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = gradient(width, height);
    let mut bytes = Vec::new();
    image::codecs::jpeg::JpegEncoder::new(&mut bytes)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    bytes
}

/// Create a small valid JPEG file with the given dimensions.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    std::fs::write(path, jpeg_bytes(width, height)).unwrap();
}

/// Create a PNG with a real alpha channel.
pub fn create_test_rgba_png(path: &Path, width: u32, height: u32) {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 64, ((x + y) % 256) as u8])
    });
    img.save(path).unwrap();
}

/// Write bytes that start like a JPEG but end before any image data.
pub fn write_corrupt_image(path: &Path) {
    std::fs::write(path, truncated_jpeg_bytes()).unwrap();
}

/// A JPEG SOI marker followed by junk.
pub fn truncated_jpeg_bytes() -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
    bytes.extend_from_slice(b"definitely not the rest of a jpeg");
    bytes
}

// =========================================================================
// Filesystem timing
// =========================================================================

/// Set `path`'s modification time to `secs` seconds before `now`.
pub fn backdate(path: &Path, now: SystemTime, secs: u64) {
    let mtime = filetime::FileTime::from_system_time(now - Duration::from_secs(secs));
    filetime::set_file_mtime(path, mtime).unwrap();
}

/// Names of all entries in `dir`, sorted.
pub fn dir_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
