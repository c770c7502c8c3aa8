//! Resampling to exact pixel sizes.
//!
//! Two filters, one per tier:
//!
//! - [`resample_lanczos`]: Lanczos3 via `image::imageops`, used for the
//!   one-step classical fallback. Good for both enlarging and shrinking.
//! - [`resample_area`]: area averaging, used after 4× enhancement. When a
//!   dimension shrinks, each output pixel is the coverage-weighted mean of the
//!   source pixels under it, which avoids the aliasing a windowed kernel
//!   produces on large reductions. When a dimension grows it degrades to
//!   bilinear interpolation.
//!
//! [`resample_area`] keeps the image's channel layout and bit depth. Rows are
//! produced in parallel with rayon; each output row horizontally resamples
//! only the handful of source rows it covers, so memory stays at one output
//! buffer even for very large enhanced frames.

use super::codec::ImagingError;
use image::imageops::FilterType;
use image::{DynamicImage, ImageBuffer, Pixel};
use rayon::prelude::*;

/// One-step Lanczos3 resample to exactly `width` × `height`.
pub fn resample_lanczos(img: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    img.resize_exact(width, height, FilterType::Lanczos3)
}

/// Area-averaging resample to exactly `width` × `height`.
pub fn resample_area(
    img: &DynamicImage,
    width: u32,
    height: u32,
) -> Result<DynamicImage, ImagingError> {
    if width == 0 || height == 0 {
        return Err(ImagingError::Resample(format!(
            "target {width}x{height} has a zero dimension"
        )));
    }
    if img.width() == 0 || img.height() == 0 {
        return Err(ImagingError::Resample("source image is empty".into()));
    }

    Ok(match img {
        DynamicImage::ImageLuma8(b) => DynamicImage::ImageLuma8(area_buffer(b, width, height)?),
        DynamicImage::ImageLumaA8(b) => DynamicImage::ImageLumaA8(area_buffer(b, width, height)?),
        DynamicImage::ImageRgb8(b) => DynamicImage::ImageRgb8(area_buffer(b, width, height)?),
        DynamicImage::ImageRgba8(b) => DynamicImage::ImageRgba8(area_buffer(b, width, height)?),
        DynamicImage::ImageLuma16(b) => DynamicImage::ImageLuma16(area_buffer(b, width, height)?),
        DynamicImage::ImageLumaA16(b) => DynamicImage::ImageLumaA16(area_buffer(b, width, height)?),
        DynamicImage::ImageRgb16(b) => DynamicImage::ImageRgb16(area_buffer(b, width, height)?),
        DynamicImage::ImageRgba16(b) => DynamicImage::ImageRgba16(area_buffer(b, width, height)?),
        DynamicImage::ImageRgb32F(b) => DynamicImage::ImageRgb32F(area_buffer(b, width, height)?),
        other => DynamicImage::ImageRgba32F(area_buffer(&other.to_rgba32f(), width, height)?),
    })
}

/// Channel sample types the area filter can read and write.
trait Sample: Copy + Send + Sync {
    fn to_f32(self) -> f32;
    fn from_f32(v: f32) -> Self;
}

impl Sample for u8 {
    fn to_f32(self) -> f32 {
        self as f32
    }
    fn from_f32(v: f32) -> Self {
        v.round().clamp(0.0, u8::MAX as f32) as u8
    }
}

impl Sample for u16 {
    fn to_f32(self) -> f32 {
        self as f32
    }
    fn from_f32(v: f32) -> Self {
        v.round().clamp(0.0, u16::MAX as f32) as u16
    }
}

impl Sample for f32 {
    fn to_f32(self) -> f32 {
        self
    }
    fn from_f32(v: f32) -> Self {
        v
    }
}

/// Source pixels contributing to one output pixel along one axis.
#[derive(Debug, Clone, PartialEq)]
struct Contribution {
    first: usize,
    weights: Vec<f32>,
}

/// Per-output-index contributions for resampling an axis of `src_len` to `dst_len`.
fn axis_contributions(src_len: u32, dst_len: u32) -> Vec<Contribution> {
    let scale = src_len as f64 / dst_len as f64;
    (0..dst_len)
        .map(|i| {
            if scale >= 1.0 {
                area_contribution(i, scale, src_len)
            } else {
                linear_contribution(i, scale, src_len)
            }
        })
        .collect()
}

/// Output pixel `i` covers `[i·scale, (i+1)·scale)` of the source.
fn area_contribution(i: u32, scale: f64, src_len: u32) -> Contribution {
    let start = i as f64 * scale;
    let end = (start + scale).min(src_len as f64);
    let first = start.floor() as usize;
    let last = (end.ceil() as usize).clamp(first + 1, src_len as usize);

    let weights = (first..last)
        .map(|k| {
            let overlap = end.min(k as f64 + 1.0) - start.max(k as f64);
            (overlap.max(0.0) / scale) as f32
        })
        .collect();
    Contribution { first, weights }
}

/// Pixel-center aligned linear interpolation between two source pixels.
fn linear_contribution(i: u32, scale: f64, src_len: u32) -> Contribution {
    let max = (src_len - 1) as f64;
    let center = ((i as f64 + 0.5) * scale - 0.5).clamp(0.0, max);
    let first = center.floor() as usize;
    let frac = (center - first as f64) as f32;

    if first as f64 >= max || frac == 0.0 {
        Contribution {
            first,
            weights: vec![1.0],
        }
    } else {
        Contribution {
            first,
            weights: vec![1.0 - frac, frac],
        }
    }
}

fn area_buffer<P>(
    src: &ImageBuffer<P, Vec<P::Subpixel>>,
    width: u32,
    height: u32,
) -> Result<ImageBuffer<P, Vec<P::Subpixel>>, ImagingError>
where
    P: Pixel,
    P::Subpixel: Sample,
{
    let channels = P::CHANNEL_COUNT as usize;
    let src_width = src.width() as usize;
    let dst_width = width as usize;
    let row_len = dst_width * channels;
    let raw: &[P::Subpixel] = src.as_raw();

    let columns = axis_contributions(src.width(), width);
    let rows = axis_contributions(src.height(), height);

    let mut out = vec![P::Subpixel::from_f32(0.0); row_len * height as usize];
    out.par_chunks_mut(row_len)
        .zip(rows.par_iter())
        .for_each(|(out_row, row)| {
            let mut acc = vec![0f32; row_len];
            for (offset, &wy) in row.weights.iter().enumerate() {
                if wy == 0.0 {
                    continue;
                }
                let y = row.first + offset;
                let src_row = &raw[y * src_width * channels..(y + 1) * src_width * channels];
                for (x, col) in columns.iter().enumerate() {
                    for (dx, &wx) in col.weights.iter().enumerate() {
                        let w = wx * wy;
                        let s = (col.first + dx) * channels;
                        for c in 0..channels {
                            acc[x * channels + c] += src_row[s + c].to_f32() * w;
                        }
                    }
                }
            }
            for (dst, v) in out_row.iter_mut().zip(acc) {
                *dst = P::Subpixel::from_f32(v);
            }
        });

    ImageBuffer::from_raw(width, height, out)
        .ok_or_else(|| ImagingError::Resample("output buffer size mismatch".into()))
}
