//! Image scale pyramid for the proposal stage.

/// Side of the proposal network's receptive window, in pixels.
pub const DETECTION_WINDOW: f32 = 12.0;

/// Geometric sequence of resize factors, largest first.
///
/// The first factor maps a `min_face`-sized face onto the 12-pixel detection
/// window. Each following factor is `factor` times the previous one, and the
/// sequence continues while the scaled shorter image side stays above the
/// window. Returns an empty sequence when no scale is runnable, including for
/// degenerate inputs (zero size, `factor` outside `(0, 1)`).
pub fn scale_pyramid(width: u32, height: u32, min_face: u32, factor: f32) -> Vec<f32> {
    if width == 0 || height == 0 || min_face == 0 || !(factor > 0.0 && factor < 1.0) {
        return Vec::new();
    }

    let mut scale = DETECTION_WINDOW / min_face as f32;
    // Scaled shorter side, shrunk in lockstep with `scale`.
    let mut min_side = width.min(height) as f32 * scale;

    let mut scales = Vec::new();
    while min_side > DETECTION_WINDOW {
        scales.push(scale);
        min_side *= factor;
        scale *= factor;
    }
    scales
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pyramid_100x100_default() {
        let scales = scale_pyramid(100, 100, 40, 0.709);
        assert_eq!(scales.len(), 3);
        assert!((scales[0] - 0.3).abs() < 1e-6);
        assert!((scales[1] - 0.3 * 0.709).abs() < 1e-6);
        assert!((scales[2] - 0.3 * 0.709 * 0.709).abs() < 1e-6);
    }

    #[test]
    fn test_pyramid_descending() {
        let scales = scale_pyramid(640, 480, 20, 0.709);
        assert!(scales.len() > 5);
        assert!(scales.windows(2).all(|w| w[0] > w[1]));
        let last = *scales.last().unwrap();
        assert!(480.0 * last > DETECTION_WINDOW);
    }

    #[test]
    fn test_pyramid_uses_shorter_side() {
        assert_eq!(
            scale_pyramid(1000, 100, 40, 0.709),
            scale_pyramid(100, 1000, 40, 0.709)
        );
    }

    #[test]
    fn test_pyramid_too_small_is_empty() {
        assert!(scale_pyramid(35, 35, 40, 0.709).is_empty());
        assert!(scale_pyramid(30, 200, 40, 0.709).is_empty());
    }

    #[test]
    fn test_larger_min_face_gives_fewer_scales() {
        let small = scale_pyramid(400, 400, 20, 0.709);
        let large = scale_pyramid(400, 400, 80, 0.709);
        assert!(large.len() < small.len());
        assert!(large[0] < small[0]);
    }

    #[test]
    fn test_pyramid_degenerate_inputs() {
        assert!(scale_pyramid(0, 100, 40, 0.709).is_empty());
        assert!(scale_pyramid(100, 100, 0, 0.709).is_empty());
        assert!(scale_pyramid(100, 100, 40, 1.0).is_empty());
        assert!(scale_pyramid(100, 100, 40, 0.0).is_empty());
    }
}
