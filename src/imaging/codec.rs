//! Decoding and encoding in pure Rust, via the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `ImageReader::into_dimensions` (header only) |
//! | Decode, native depth | `ImageReader::decode` with content sniffing |
//! | Decode, normalized | decode + `to_rgb8` (alpha and palette dropped) |
//! | Encode | format from the output extension; JPEG at the requested quality |
//!
//! JPEG streams must end with their end-of-image marker before a full decode
//! is attempted. The JPEG decoder fills missing scan data instead of failing,
//! so a cut-short upload would otherwise decode into a partly gray image.
//!
//! Every write goes to a hidden sibling file first and is renamed into place,
//! so a reader (or the retention sweeper) never observes a half-written
//! artifact under its final name.

use super::params::Quality;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImagingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode {}: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },
    #[error("Failed to encode {}: {reason}", path.display())]
    Encode { path: PathBuf, reason: String },
    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),
    #[error("Resampling failed: {0}")]
    Resample(String),
}

/// Extensions we can both decode and re-encode.
///
/// Artifacts keep the upload's extension, so an input is only accepted when
/// the same format can be written back out.
const FORMAT_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
    ("bmp", ImageFormat::Bmp),
    ("gif", ImageFormat::Gif),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    FORMAT_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled() && fmt.writing_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the file extensions that can round-trip through the codecs compiled in.
pub fn supported_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// Whether `path` ends in one of [`supported_extensions`] (case-insensitive).
pub fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            supported_extensions()
                .iter()
                .any(|s| s.eq_ignore_ascii_case(ext))
        })
}

/// Bytes read from the end of a JPEG when looking for its end-of-image marker.
const JPEG_TAIL_LEN: u64 = 4096;

fn open_reader(path: &Path) -> Result<ImageReader<BufReader<File>>, ImagingError> {
    ImageReader::open(path)
        .map_err(ImagingError::Io)?
        .with_guessed_format()
        .map_err(ImagingError::Io)
}

/// Open a reader for a full decode, rejecting JPEG streams that were cut short.
fn open_complete(path: &Path) -> Result<ImageReader<BufReader<File>>, ImagingError> {
    let reader = open_reader(path)?;
    if reader.format() == Some(ImageFormat::Jpeg) && !jpeg_has_end_marker(path)? {
        return Err(decode_error(path, "truncated JPEG, no end-of-image marker"));
    }
    Ok(reader)
}

fn jpeg_has_end_marker(path: &Path) -> Result<bool, ImagingError> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    file.seek(SeekFrom::Start(len.saturating_sub(JPEG_TAIL_LEN)))?;
    let mut tail = Vec::new();
    file.read_to_end(&mut tail)?;
    Ok(ends_with_eoi(&tail))
}

/// Whether `data` ends with the JPEG EOI marker `FF D9`.
///
/// Trailing zero, `FF` and whitespace padding after the marker is ignored.
fn ends_with_eoi(data: &[u8]) -> bool {
    let end = data
        .iter()
        .rposition(|&b| !matches!(b, 0x00 | 0xFF | b'\r' | b'\n' | b' '))
        .map_or(0, |i| i + 1);
    data[..end].ends_with(&[0xFF, 0xD9])
}

fn decode_error(path: &Path, e: impl std::fmt::Display) -> ImagingError {
    ImagingError::Decode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

/// Read pixel dimensions from the header without decoding the image.
pub fn identify(path: &Path) -> Result<(u32, u32), ImagingError> {
    open_reader(path)?
        .into_dimensions()
        .map_err(|e| decode_error(path, e))
}

/// Load and decode an image in its native channel layout and bit depth.
pub fn load_image(path: &Path) -> Result<DynamicImage, ImagingError> {
    open_complete(path)?
        .decode()
        .map_err(|e| decode_error(path, e))
}

/// Decode without the default allocation limits.
///
/// For intermediates we produced ourselves, such as a 4× enhanced frame,
/// which can legitimately exceed the decoder's safety cap.
pub fn load_image_unbounded(path: &Path) -> Result<DynamicImage, ImagingError> {
    let mut reader = open_complete(path)?;
    reader.no_limits();
    reader.decode().map_err(|e| decode_error(path, e))
}

/// Load an image and normalize it to plain 8-bit RGB.
///
/// Alpha is dropped rather than composited and palettes are expanded by the
/// decoder, so every format ends up with the same three channels.
pub fn load_rgb8(path: &Path) -> Result<DynamicImage, ImagingError> {
    let img = load_image(path)?;
    Ok(match img {
        DynamicImage::ImageRgb8(_) => img,
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    })
}

/// Output format for `path`, inferred from its extension.
pub fn output_format(path: &Path) -> Result<ImageFormat, ImagingError> {
    let format = ImageFormat::from_path(path)
        .map_err(|_| ImagingError::UnsupportedFormat(path.display().to_string()))?;
    if !format.writing_enabled() {
        return Err(ImagingError::UnsupportedFormat(format!("{format:?}")));
    }
    Ok(format)
}

/// Save `img` to `path`, inferring the format from its extension.
///
/// The encoded bytes land in a hidden `.{name}.{token}.partial` sibling and are
/// renamed over `path` only once fully flushed. On failure the partial file is
/// removed and `path` is left untouched.
pub fn save_image(img: &DynamicImage, path: &Path, quality: Quality) -> Result<(), ImagingError> {
    let format = output_format(path)?;
    let partial = partial_path(path)?;

    let result = write_encoded(img, &partial, format, quality)
        .and_then(|()| std::fs::rename(&partial, path).map_err(ImagingError::Io));
    if result.is_err() {
        let _ = std::fs::remove_file(&partial);
    }
    result
}

fn partial_path(path: &Path) -> Result<PathBuf, ImagingError> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| ImagingError::UnsupportedFormat(path.display().to_string()))?;
    let token: u32 = rand::random();
    Ok(path.with_file_name(format!(".{name}.{token:08x}.partial")))
}

/// Convert to a pixel layout the target encoder accepts.
///
/// JPEG carries neither alpha nor 16-bit samples; the 8-bit-only encoders
/// get 8-bit data and GIF always gets RGBA. PNG and TIFF take the image as is.
fn encodable(img: &DynamicImage, format: ImageFormat) -> Cow<'_, DynamicImage> {
    match (format, img) {
        (ImageFormat::Jpeg, DynamicImage::ImageRgb8(_) | DynamicImage::ImageLuma8(_)) => {
            Cow::Borrowed(img)
        }
        (ImageFormat::Jpeg, _) => Cow::Owned(DynamicImage::ImageRgb8(img.to_rgb8())),
        (ImageFormat::Png | ImageFormat::Tiff, _) => Cow::Borrowed(img),
        (ImageFormat::Gif, DynamicImage::ImageRgba8(_)) => Cow::Borrowed(img),
        (ImageFormat::Gif, _) => Cow::Owned(DynamicImage::ImageRgba8(img.to_rgba8())),
        (
            _,
            DynamicImage::ImageRgb8(_)
            | DynamicImage::ImageRgba8(_)
            | DynamicImage::ImageLuma8(_)
            | DynamicImage::ImageLumaA8(_),
        ) => Cow::Borrowed(img),
        (_, other) if other.color().has_alpha() => {
            Cow::Owned(DynamicImage::ImageRgba8(other.to_rgba8()))
        }
        (_, other) => Cow::Owned(DynamicImage::ImageRgb8(other.to_rgb8())),
    }
}

fn write_encoded(
    img: &DynamicImage,
    path: &Path,
    format: ImageFormat,
    quality: Quality,
) -> Result<(), ImagingError> {
    let encode_error = |e: image::ImageError| ImagingError::Encode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let img = encodable(img, format);

    if format == ImageFormat::Jpeg {
        let encoder = JpegEncoder::new_with_quality(&mut writer, quality.value() as u8);
        img.write_with_encoder(encoder).map_err(encode_error)?;
    } else {
        img.write_to(&mut writer, format).map_err(encode_error)?;
    }

    writer.flush()?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(())
}
