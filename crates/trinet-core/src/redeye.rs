//! Circular red-eye correction around a landmark.

use rayon::prelude::*;

// A pixel is treated as red-eye when its red/(green+blue) ratio, weighted by
// the blue/green balance, exceeds this value.
const RED_RATIO_THRESHOLD: f32 = 0.7;

/// Correct red-eye in place inside the disc of `radius` around `center`.
///
/// Pixels with `dx² + dy² <= radius²` whose red ratio exceeds the threshold
/// get their channels damped; everything else is left untouched. Requires at
/// least three channels (RGB order); anything else is a no-op.
pub fn remove_red_eye(
    pixels: &mut [u8],
    width: u32,
    height: u32,
    channels: u32,
    center: (i32, i32),
    radius: i32,
) {
    let (w, h, c) = (width as usize, height as usize, channels as usize);
    if c < 3 || w == 0 || h == 0 || radius < 0 || pixels.len() < w * h * c {
        tracing::warn!(
            width,
            height,
            channels,
            radius,
            len = pixels.len(),
            "red-eye: invalid geometry, skipping"
        );
        return;
    }

    let (cx, cy, r) = (center.0 as i64, center.1 as i64, radius as i64);
    let left = (cx - r).clamp(0, w as i64) as usize;
    let right = (cx + r + 1).clamp(0, w as i64) as usize;
    let top = (cy - r).clamp(0, h as i64) as usize;
    let bottom = (cy + r + 1).clamp(0, h as i64) as usize;
    if left >= right || top >= bottom {
        return;
    }
    let radius_sq = r * r;
    let stride = w * c;

    pixels[top * stride..bottom * stride]
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(i, row)| {
            let dy = (top + i) as i64 - cy;
            for x in left..right {
                let dx = x as i64 - cx;
                if dx * dx + dy * dy > radius_sq {
                    continue;
                }
                let px = &mut row[x * c..x * c + 3];
                if let Some(fixed) = correct_pixel(px[0], px[1], px[2]) {
                    px.copy_from_slice(&fixed);
                }
            }
        });
}

/// Non-aliasing variant: `dst` receives a copy of `src` with red-eye corrected.
///
/// Leaves `dst` untouched when the two buffers differ in length.
#[allow(clippy::too_many_arguments)]
pub fn remove_red_eye_into(
    src: &[u8],
    dst: &mut [u8],
    width: u32,
    height: u32,
    channels: u32,
    center: (i32, i32),
    radius: i32,
) {
    if src.len() != dst.len() {
        tracing::warn!(
            src = src.len(),
            dst = dst.len(),
            "red-eye: buffer length mismatch, skipping"
        );
        return;
    }
    dst.copy_from_slice(src);
    remove_red_eye(dst, width, height, channels, center, radius);
}

/// Corrected `[r, g, b]` for a red-eye pixel, or `None` when it does not qualify.
pub fn correct_pixel(red: u8, green: u8, blue: u8) -> Option<[u8; 3]> {
    let (r, g, b) = (red as f32, green as f32, blue as f32);

    let nrv = (blue as i32 + green as i32).max(1) as f32;
    let blue_ratio = if green > 1 { b / g } else { b };
    let blue_ratio = blue_ratio.sqrt().clamp(0.5, 1.5);
    let red_ratio = r / nrv * blue_ratio;
    if red_ratio <= RED_RATIO_THRESHOLD {
        return None;
    }

    let pow_r = (1.775 - (red_ratio * 0.75 + 0.25)).max(0.0).powi(2);
    let pow_b = 0.5 + pow_r * 0.5;
    let pow_g = 0.75 + pow_r * 0.25;

    Some([scale_channel(pow_r, r), scale_channel(pow_g, g), scale_channel(pow_b, b)])
}

/// `round_half_up(factor * value)` clamped to a byte.
fn scale_channel(factor: f32, value: f32) -> u8 {
    ((factor * value + 0.5) as i32).clamp(0, 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(w: u32, h: u32, c: u32, px: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity((w * h * c) as usize);
        for _ in 0..w * h {
            buf.extend_from_slice(&px[..c as usize]);
        }
        buf
    }

    #[test]
    fn test_correct_pixel_strong_red() {
        // ratio = 200 / 40 = 5, so pow_r clamps to zero.
        assert_eq!(correct_pixel(200, 20, 20), Some([0, 15, 10]));
    }

    #[test]
    fn test_correct_pixel_moderate_red() {
        // ratio = 100 / 120 = 0.8333; pow_r = (1.775 - 0.875)^2 = 0.81.
        assert_eq!(correct_pixel(100, 60, 60), Some([81, 57, 54]));
    }

    #[test]
    fn test_correct_pixel_ignores_neutral() {
        assert_eq!(correct_pixel(100, 100, 100), None);
        assert_eq!(correct_pixel(0, 0, 0), None);
        assert_eq!(correct_pixel(255, 255, 255), None);
    }

    #[test]
    fn test_correct_pixel_dark_green_uses_blue_directly() {
        // green <= 1: blue ratio is sqrt(blue) clamped to 1.5.
        assert!(correct_pixel(50, 1, 30).is_some());
        assert_eq!(correct_pixel(0, 0, 0), None);
    }

    #[test]
    fn test_containment() {
        let (w, h) = (21u32, 21u32);
        let src = uniform(w, h, 3, &[200, 20, 20]);
        let mut out = src.clone();
        remove_red_eye(&mut out, w, h, 3, (10, 10), 4);

        for y in 0..h as i32 {
            for x in 0..w as i32 {
                let i = ((y * w as i32 + x) * 3) as usize;
                let inside = (x - 10).pow(2) + (y - 10).pow(2) <= 16;
                if inside {
                    assert_eq!(&out[i..i + 3], &[0, 15, 10], "({x}, {y}) should be corrected");
                } else {
                    assert_eq!(&out[i..i + 3], &src[i..i + 3], "({x}, {y}) should be untouched");
                }
            }
        }
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let (w, h) = (9u32, 9u32);
        let mut buf = uniform(w, h, 3, &[200, 20, 20]);
        remove_red_eye(&mut buf, w, h, 3, (4, 4), 3);
        // (7, 4) lies exactly on the circle.
        let i = (4 * 9 + 7) * 3;
        assert_eq!(&buf[i..i + 3], &[0, 15, 10]);
    }

    #[test]
    fn test_alpha_untouched() {
        let mut buf = uniform(5, 5, 4, &[200, 20, 20, 77]);
        remove_red_eye(&mut buf, 5, 5, 4, (2, 2), 2);
        assert!(buf.chunks(4).all(|px| px[3] == 77));
        assert_eq!(&buf[(2 * 5 + 2) * 4..(2 * 5 + 2) * 4 + 3], &[0, 15, 10]);
    }

    #[test]
    fn test_circle_clipped_at_image_edge() {
        let mut buf = uniform(6, 6, 3, &[200, 20, 20]);
        remove_red_eye(&mut buf, 6, 6, 3, (0, 0), 3);
        assert_eq!(&buf[0..3], &[0, 15, 10]);
        // (5, 5) is far outside the disc.
        assert_eq!(&buf[(5 * 6 + 5) * 3..(5 * 6 + 5) * 3 + 3], &[200, 20, 20]);
    }

    #[test]
    fn test_gray_is_noop() {
        let mut buf = vec![200u8; 25];
        remove_red_eye(&mut buf, 5, 5, 1, (2, 2), 2);
        assert!(buf.iter().all(|&p| p == 200));
    }

    #[test]
    fn test_center_off_image_is_noop() {
        let src = uniform(5, 5, 3, &[200, 20, 20]);
        let mut buf = src.clone();
        remove_red_eye(&mut buf, 5, 5, 3, (50, 50), 3);
        assert_eq!(buf, src);
    }

    #[test]
    fn test_extreme_center_is_noop() {
        let src = uniform(5, 5, 3, &[200, 20, 20]);
        let mut buf = src.clone();
        remove_red_eye(&mut buf, 5, 5, 3, (i32::MAX, 2), 2);
        remove_red_eye(&mut buf, 5, 5, 3, (2, i32::MIN), 2);
        remove_red_eye(&mut buf, 5, 5, 3, (i32::MIN, i32::MAX), i32::MAX);
        assert_eq!(buf, src);
    }

    #[test]
    fn test_into_copies_untouched_pixels() {
        let src = uniform(7, 7, 3, &[200, 20, 20]);
        let mut dst = vec![0u8; src.len()];
        remove_red_eye_into(&src, &mut dst, 7, 7, 3, (3, 3), 1);
        assert_eq!(&dst[0..3], &[200, 20, 20]);
        let i = (3 * 7 + 3) * 3;
        assert_eq!(&dst[i..i + 3], &[0, 15, 10]);
        assert_eq!(&src[i..i + 3], &[200, 20, 20]);
    }
}
