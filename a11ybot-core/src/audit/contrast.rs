//! WCAG color contrast.
//!
//! Relative luminance and contrast ratio per WCAG 2.x, plus parsing of the
//! resolved `rgb()`/`rgba()` strings browsers report from `getComputedStyle`.
//! No exemption is made for large or bold text: every pair below
//! [`MIN_CONTRAST_RATIO`] is flagged.

use regex::Regex;
use std::sync::LazyLock;

/// Minimum acceptable contrast ratio for body text (WCAG AA).
pub const MIN_CONTRAST_RATIO: f64 = 4.5;

static RGB_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^rgba?\(\s*(\d{1,3})\s*,\s*(\d{1,3})\s*,\s*(\d{1,3})\s*(?:,\s*([0-9]*\.?[0-9]+)\s*)?\)$",
    )
    .expect("valid regex")
});

/// An opaque sRGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

/// Parse a resolved CSS color into an opaque RGB triple.
///
/// Returns `None` for anything that is not `rgb(r, g, b)` or
/// `rgba(r, g, b, a)` with `a == 1`, including transparent backgrounds.
pub fn parse_opaque_rgb(value: &str) -> Option<Rgb> {
    let caps = RGB_RE.captures(value.trim())?;
    let r: u8 = caps[1].parse().ok()?;
    let g: u8 = caps[2].parse().ok()?;
    let b: u8 = caps[3].parse().ok()?;
    if let Some(alpha) = caps.get(4) {
        let alpha: f64 = alpha.as_str().parse().ok()?;
        if alpha < 1.0 {
            return None;
        }
    }
    Some(Rgb(r, g, b))
}

fn linear_channel(value: u8) -> f64 {
    let c = f64::from(value) / 255.0;
    if c <= 0.03928 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Relative luminance in `[0, 1]`.
pub fn relative_luminance(color: Rgb) -> f64 {
    0.2126 * linear_channel(color.0) + 0.7152 * linear_channel(color.1)
        + 0.0722 * linear_channel(color.2)
}

/// Contrast ratio in `[1, 21]`, independent of argument order.
pub fn contrast_ratio(a: Rgb, b: Rgb) -> f64 {
    let l1 = relative_luminance(a);
    let l2 = relative_luminance(b);
    (l1.max(l2) + 0.05) / (l1.min(l2) + 0.05)
}

/// Whether a ratio falls below the accepted minimum.
pub fn is_insufficient(ratio: f64) -> bool {
    ratio < MIN_CONTRAST_RATIO
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLACK: Rgb = Rgb(0, 0, 0);
    const WHITE: Rgb = Rgb(255, 255, 255);

    #[test]
    fn test_black_on_white_is_max() {
        let ratio = contrast_ratio(BLACK, WHITE);
        assert!((ratio - 21.0).abs() < 0.01);
        assert!(!is_insufficient(ratio));
    }

    #[test]
    fn test_gray_on_white_is_flagged() {
        let ratio = contrast_ratio(Rgb(128, 128, 128), WHITE);
        assert!(ratio < 4.5, "ratio was {ratio}");
        assert!((ratio - 3.95).abs() < 0.01);
        assert!(is_insufficient(ratio));
    }

    #[test]
    fn test_ratio_is_symmetric() {
        let a = Rgb(12, 99, 200);
        let b = Rgb(250, 240, 10);
        assert_eq!(contrast_ratio(a, b), contrast_ratio(b, a));
    }

    #[test]
    fn test_same_color_is_one() {
        assert!((contrast_ratio(WHITE, WHITE) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_luminance_extremes() {
        assert_eq!(relative_luminance(BLACK), 0.0);
        assert!((relative_luminance(WHITE) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_rgb() {
        assert_eq!(parse_opaque_rgb("rgb(0, 0, 0)"), Some(BLACK));
        assert_eq!(parse_opaque_rgb("rgb(255,255,255)"), Some(WHITE));
        assert_eq!(parse_opaque_rgb(" rgba(10, 20, 30, 1) "), Some(Rgb(10, 20, 30)));
    }

    #[test]
    fn test_parse_rejects_translucent_and_other_formats() {
        assert_eq!(parse_opaque_rgb("rgba(0, 0, 0, 0)"), None);
        assert_eq!(parse_opaque_rgb("rgba(0, 0, 0, 0.5)"), None);
        assert_eq!(parse_opaque_rgb("#ffffff"), None);
        assert_eq!(parse_opaque_rgb("transparent"), None);
        assert_eq!(parse_opaque_rgb("rgb(300, 0, 0)"), None);
        assert_eq!(parse_opaque_rgb("color(srgb 1 1 1)"), None);
    }
}
