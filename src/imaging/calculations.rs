//! Pure calculation functions for target dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Length in pixels of the longer edge of every processed artifact.
pub const LONG_EDGE: u32 = 3840;

/// Exact pixel size an artifact must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetDimensions {
    pub width: u32,
    pub height: u32,
}

/// Calculate the 4K target for a source image.
///
/// The longer edge becomes exactly [`LONG_EDGE`]; the shorter edge is scaled
/// by the same ratio and truncated, so aspect ratio is kept to within one
/// pixel. Square sources take the landscape branch.
///
/// Callers must reject zero-sized sources before calling; decoding already
/// guarantees this for real images.
///
/// # Examples
/// ```
/// # use upscale4k::imaging::{plan_target_dimensions, TargetDimensions};
/// assert_eq!(
///     plan_target_dimensions(4000, 2000),
///     TargetDimensions { width: 3840, height: 1920 }
/// );
/// assert_eq!(
///     plan_target_dimensions(2000, 4000),
///     TargetDimensions { width: 1920, height: 3840 }
/// );
/// ```
pub fn plan_target_dimensions(width: u32, height: u32) -> TargetDimensions {
    if width >= height {
        TargetDimensions {
            width: LONG_EDGE,
            height: scale_short_edge(height, width),
        }
    } else {
        TargetDimensions {
            width: scale_short_edge(width, height),
            height: LONG_EDGE,
        }
    }
}

/// `floor(LONG_EDGE * short / long)`, never below one pixel.
fn scale_short_edge(short: u32, long: u32) -> u32 {
    let scaled = LONG_EDGE as u64 * short as u64 / long.max(1) as u64;
    (scaled as u32).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(width: u32, height: u32) -> TargetDimensions {
        TargetDimensions { width, height }
    }

    // =========================================================================
    // plan_target_dimensions scenarios
    // =========================================================================

    #[test]
    fn landscape_two_to_one() {
        assert_eq!(plan_target_dimensions(4000, 2000), dims(3840, 1920));
    }

    #[test]
    fn portrait_one_to_two() {
        assert_eq!(plan_target_dimensions(2000, 4000), dims(1920, 3840));
    }

    #[test]
    fn square_uses_width_branch() {
        assert_eq!(plan_target_dimensions(1000, 1000), dims(3840, 3840));
    }

    #[test]
    fn small_source_is_enlarged() {
        // 640x480 (4:3) → 3840x2880
        assert_eq!(plan_target_dimensions(640, 480), dims(3840, 2880));
    }

    #[test]
    fn large_source_is_shrunk() {
        // 8000x6000 → 3840x2880
        assert_eq!(plan_target_dimensions(8000, 6000), dims(3840, 2880));
    }

    #[test]
    fn fractional_short_edge_is_truncated() {
        // 3840 * 1080 / 1921 = 2158.87… → 2158
        assert_eq!(plan_target_dimensions(1921, 1080), dims(3840, 2158));
        // 3840 * 2 / 3 = 2560 exactly
        assert_eq!(plan_target_dimensions(2, 3), dims(2560, 3840));
    }

    #[test]
    fn extreme_strip_keeps_one_pixel() {
        assert_eq!(plan_target_dimensions(100_000, 1), dims(3840, 1));
        assert_eq!(plan_target_dimensions(1, 100_000), dims(1, 3840));
    }

    #[test]
    fn huge_inputs_do_not_overflow() {
        assert_eq!(
            plan_target_dimensions(u32::MAX, u32::MAX / 2),
            dims(3840, 1919)
        );
    }

    // =========================================================================
    // Properties over a grid of inputs
    // =========================================================================

    #[test]
    fn exactly_one_side_is_long_edge_unless_square() {
        for w in (1..=5000).step_by(97) {
            for h in (1..=5000).step_by(89) {
                let t = plan_target_dimensions(w, h);
                assert!(t.width >= 1 && t.height >= 1, "{w}x{h} → {t:?}");
                if w == h {
                    assert_eq!(t, dims(LONG_EDGE, LONG_EDGE));
                } else {
                    assert!(
                        (t.width == LONG_EDGE) ^ (t.height == LONG_EDGE),
                        "{w}x{h} → {t:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn aspect_ratio_within_one_pixel() {
        for (w, h) in [(1234, 567), (567, 1234), (3001, 2999), (7, 3), (4032, 3024)] {
            let t = plan_target_dimensions(w, h);
            let (long, short) = if w >= h { (w, h) } else { (h, w) };
            let exact = LONG_EDGE as f64 * short as f64 / long as f64;
            let got = t.width.min(t.height) as f64;
            assert!((exact - got).abs() < 1.0, "{w}x{h}: {exact} vs {got}");
        }
    }
}
