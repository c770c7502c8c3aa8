//! Generated filenames for uploads and artifacts.
//!
//! The filesystem is the only index: an artifact is found purely by the name
//! handed back to the client, so names must be unique and safe to join onto
//! a storage directory.
//!
//! ## Patterns
//!
//! - Upload: `{unix_seconds}_{token}_{original}`, e.g. `1760601600_9f3a01c2_cat.png`.
//!   The 32-bit random token keeps two same-second uploads of `cat.png` apart.
//! - Artifact: `upscaled_{upload}`, e.g. `upscaled_1760601600_9f3a01c2_cat.png`.
//!
//! Artifacts keep the upload's extension, which selects the output encoder.

use std::time::{SystemTime, UNIX_EPOCH};

/// Prefix of every artifact filename.
pub const ARTIFACT_PREFIX: &str = "upscaled_";

/// Reduce a client-supplied filename to a bare, printable file name.
///
/// Directory components (either separator) are discarded and control
/// characters removed. Returns `None` when nothing usable is left.
///
/// - `"cat.png"` → `Some("cat.png")`
/// - `"C:\\Users\\me\\cat.png"` → `Some("cat.png")`
/// - `"../../etc/passwd"` → `Some("passwd")`
/// - `"   "`, `".."`, `"dir/"` → `None`
pub fn sanitize_original_name(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        return None;
    }
    Some(cleaned.to_string())
}

/// Build an upload filename from its parts.
pub fn upload_filename(original: &str, unix_seconds: u64, token: u32) -> String {
    format!("{unix_seconds}_{token:08x}_{original}")
}

/// Upload filename for `original` stamped with the current time and a random token.
pub fn new_upload_filename(original: &str) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    upload_filename(original, now, rand::random())
}

/// Artifact filename derived from an upload filename.
pub fn artifact_filename(upload: &str) -> String {
    format!("{ARTIFACT_PREFIX}{upload}")
}

/// Whether `name` may be served from the processed directory.
///
/// Rejects anything that could escape the directory and hidden files, which
/// includes in-progress `.partial` writes.
pub fn is_servable_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\'])
        && !name.chars().any(|c| c.is_control())
}
