//! Image processing in pure Rust, via the `image` crate.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `ImageReader::into_dimensions` |
//! | **Plan** | [`plan_target_dimensions`] (longer edge → 3840) |
//! | **Classical resize** | Lanczos3 (`image::imageops`) |
//! | **Post-AI resize** | area averaging, rayon over rows |
//! | **Encode** | format from extension, atomic rename into place |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing an upscale
//! - **Codec**: decode, normalize, encode
//! - **Resample**: the two resampling filters

mod calculations;
pub mod codec;
mod params;
pub mod resample;

pub use calculations::{LONG_EDGE, TargetDimensions, plan_target_dimensions};
pub use codec::{
    ImagingError, has_supported_extension, identify, load_image, load_image_unbounded, load_rgb8,
    save_image, supported_extensions,
};
pub use params::{Quality, UpscaleParams};
pub use resample::{resample_area, resample_lanczos};
