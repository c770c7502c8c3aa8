//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Upscale
//!
//! ```text
//! AI engine: realesrgan-x4plus
//! cat.png → 3840x2160 (ai)
//!     Artifact: upscaled_1760601600_9f3a01c2_cat.png
//! broken.jpg: 500 Failed to read source image: ...
//!
//! Upscaled 1 of 2 images
//! ```
//!
//! With `--json` each result is instead printed as the response body a web
//! front end would return, one object per line:
//!
//! ```text
//! {"success":true,"filename":"upscaled_...","width":3840,"height":2160}
//! {"error":"Invalid image: ..."}
//! ```
//!
//! ## Sweep
//!
//! ```text
//! Swept 2 directories: 3 deleted, 0 skipped of 7 files
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>` or `String`)
//! for testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::engine::AiCapability;
use crate::handler::{ErrorResponse, HandlerError, UploadResponse};
use crate::retention::SweepReport;
use crate::upscale::ArtifactResult;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

// ============================================================================
// Upscale output
// ============================================================================

/// One-line description of the AI capability decided at startup.
pub fn format_capability(capability: &AiCapability) -> String {
    match capability {
        AiCapability::Available(enhancer) => format!("AI engine: {}", enhancer.name()),
        AiCapability::Unavailable { reason } => {
            format!("AI engine: unavailable ({reason}), using Lanczos3 fallback")
        }
    }
}

/// Format a successful upscale.
///
/// ```text
/// cat.png → 3840x2160 (ai)
///     Artifact: upscaled_1760601600_9f3a01c2_cat.png
/// ```
pub fn format_upscale_success(source: &str, artifact: &ArtifactResult) -> Vec<String> {
    let filename = artifact
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    vec![
        format!(
            "{} → {}x{} ({})",
            source, artifact.width, artifact.height, artifact.tier
        ),
        format!("{}Artifact: {}", indent(1), filename),
    ]
}

/// Format a failed upscale with its status code.
pub fn format_upscale_failure(source: &str, error: &HandlerError) -> String {
    format!("{}: {} {}", source, error.status(), error)
}

/// Closing summary line for a batch.
pub fn format_upscale_summary(succeeded: usize, total: usize) -> String {
    format!("Upscaled {} of {}", succeeded, plural(total, "image", "images"))
}

/// Serialize a success descriptor as a single JSON line.
pub fn format_response_json(response: &UploadResponse) -> String {
    serde_json::to_string(response).unwrap_or_default()
}

/// Serialize a failure descriptor as a single JSON line.
pub fn format_error_json(response: &ErrorResponse) -> String {
    serde_json::to_string(response).unwrap_or_default()
}

pub fn print_capability(capability: &AiCapability) {
    println!("{}", format_capability(capability));
}

pub fn print_upscale_success(source: &str, artifact: &ArtifactResult) {
    for line in format_upscale_success(source, artifact) {
        println!("{}", line);
    }
}

pub fn print_upscale_failure(source: &str, error: &HandlerError) {
    println!("{}", format_upscale_failure(source, error));
}

// ============================================================================
// Sweep output
// ============================================================================

/// Summary of one retention pass.
///
/// ```text
/// Swept 2 directories: 3 deleted, 0 skipped of 7 files
///     1 directory error (see log)
/// ```
pub fn format_sweep_report(dirs: usize, report: &SweepReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Swept {}: {} deleted, {} skipped of {}",
        plural(dirs, "directory", "directories"),
        report.deleted,
        report.skipped,
        plural(report.scanned, "file", "files")
    )];
    if report.errors > 0 {
        lines.push(format!(
            "{}{} (see log)",
            indent(1),
            plural(report.errors, "directory error", "directory errors")
        ));
    }
    lines
}

pub fn print_sweep_report(dirs: usize, report: &SweepReport) {
    for line in format_sweep_report(dirs, report) {
        println!("{}", line);
    }
}
