//! Bilinear rotation about the image centre with a solid background fill.

use crate::types::Rgb;
use rayon::prelude::*;

/// Geometry of an interleaved 8-bit pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    /// Bytes from the start of one row to the next; at least `width * channels`.
    pub stride: usize,
}

impl Layout {
    /// Tightly packed rows.
    pub fn packed(width: usize, height: usize, channels: usize) -> Self {
        Self {
            width,
            height,
            channels,
            stride: width * channels,
        }
    }

    /// Minimum buffer length this layout addresses.
    fn required_len(&self) -> usize {
        if self.height == 0 {
            return 0;
        }
        (self.height - 1) * self.stride + self.width * self.channels
    }

    pub(crate) fn is_valid_for(&self, len: usize) -> bool {
        self.width > 0
            && self.height > 0
            && matches!(self.channels, 1 | 3 | 4)
            && self.stride >= self.width * self.channels
            && len >= self.required_len()
    }
}

/// Rotate `src` by `degrees` into `dst`, each about its own centre `((dim - 1) / 2)`.
///
/// Every destination pixel is mapped back into the source with the inverse
/// rotation. Pixels that land outside the source get `fill` (gray buffers use
/// its green component, RGBA gets opaque alpha); the rest are bilinearly
/// interpolated per channel and truncated. RGBA output is always opaque.
///
/// Invalid layouts, or a channel count mismatch between the two buffers,
/// leave `dst` untouched.
pub fn rotate_bilinear(
    src: &[u8],
    src_layout: Layout,
    dst: &mut [u8],
    dst_layout: Layout,
    degrees: f32,
    fill: Rgb,
) {
    if !src_layout.is_valid_for(src.len())
        || !dst_layout.is_valid_for(dst.len())
        || src_layout.channels != dst_layout.channels
    {
        tracing::warn!(
            ?src_layout,
            ?dst_layout,
            src_len = src.len(),
            dst_len = dst.len(),
            "rotate: invalid geometry, skipping"
        );
        return;
    }

    let sampler = Sampler::new(src, src_layout, dst_layout, degrees);
    let row_bytes = dst_layout.width * dst_layout.channels;

    dst[..dst_layout.required_len()]
        .par_chunks_mut(dst_layout.stride)
        .enumerate()
        .for_each(|(y, row)| {
            let row = &mut row[..row_bytes];
            match dst_layout.channels {
                1 => sampler.gray_row(y, row, fill),
                3 => sampler.rgb_row(y, row, fill),
                _ => sampler.rgba_row(y, row, fill),
            }
        });
}

/// Inverse mapping from destination to source coordinates.
struct Sampler<'a> {
    src: &'a [u8],
    layout: Layout,
    cos: f32,
    sin: f32,
    src_cx: f32,
    src_cy: f32,
    dst_cx: f32,
    dst_cy: f32,
}

/// Source neighbourhood of one destination pixel.
struct Taps {
    /// Byte offsets of the top-left, top-right, bottom-left, bottom-right pixels.
    offsets: [usize; 4],
    dx: f32,
    dy: f32,
}

impl<'a> Sampler<'a> {
    fn new(src: &'a [u8], layout: Layout, dst_layout: Layout, degrees: f32) -> Self {
        let angle = -(degrees as f64) * std::f64::consts::PI / 180.0;
        Self {
            src,
            layout,
            cos: angle.cos() as f32,
            sin: angle.sin() as f32,
            src_cx: (layout.width - 1) as f32 / 2.0,
            src_cy: (layout.height - 1) as f32 / 2.0,
            dst_cx: (dst_layout.width - 1) as f32 / 2.0,
            dst_cy: (dst_layout.height - 1) as f32 / 2.0,
        }
    }

    /// Source taps for destination pixel `(x, y)`, or `None` when it falls outside.
    fn taps(&self, x: usize, y: usize) -> Option<Taps> {
        let cx = x as f32 - self.dst_cx;
        let cy = y as f32 - self.dst_cy;
        let ox = self.sin * cy + self.src_cx + self.cos * cx;
        let oy = self.cos * cy + self.src_cy - self.sin * cx;

        // Truncation toward zero, so coordinates in (-1, 0) still sample row/column 0.
        let ox1 = ox as i32;
        let oy1 = oy as i32;
        if ox1 < 0
            || oy1 < 0
            || ox1 >= self.layout.width as i32
            || oy1 >= self.layout.height as i32
        {
            return None;
        }
        let (ox1, oy1) = (ox1 as usize, oy1 as usize);
        let ox2 = if ox1 == self.layout.width - 1 { ox1 } else { ox1 + 1 };
        let oy2 = if oy1 == self.layout.height - 1 { oy1 } else { oy1 + 1 };

        let c = self.layout.channels;
        let row1 = oy1 * self.layout.stride;
        let row2 = oy2 * self.layout.stride;
        Some(Taps {
            offsets: [row1 + ox1 * c, row1 + ox2 * c, row2 + ox1 * c, row2 + ox2 * c],
            dx: (ox - ox1 as f32).max(0.0),
            dy: (oy - oy1 as f32).max(0.0),
        })
    }

    fn interpolate(&self, taps: &Taps, channel: usize) -> u8 {
        let [p1, p2, p3, p4] = taps.offsets.map(|o| self.src[o + channel] as f32);
        let (dx1, dy1) = (taps.dx, taps.dy);
        let (dx2, dy2) = (1.0 - dx1, 1.0 - dy1);
        (dy2 * (dx2 * p1 + dx1 * p2) + dy1 * (dx2 * p3 + dx1 * p4)) as u8
    }

    fn gray_row(&self, y: usize, row: &mut [u8], fill: Rgb) {
        for (x, px) in row.iter_mut().enumerate() {
            *px = match self.taps(x, y) {
                Some(taps) => self.interpolate(&taps, 0),
                None => fill.1,
            };
        }
    }

    fn rgb_row(&self, y: usize, row: &mut [u8], fill: Rgb) {
        for (x, px) in row.chunks_exact_mut(3).enumerate() {
            match self.taps(x, y) {
                Some(taps) => {
                    px[0] = self.interpolate(&taps, 0);
                    px[1] = self.interpolate(&taps, 1);
                    px[2] = self.interpolate(&taps, 2);
                }
                None => px.copy_from_slice(&[fill.0, fill.1, fill.2]),
            }
        }
    }

    fn rgba_row(&self, y: usize, row: &mut [u8], fill: Rgb) {
        for (x, px) in row.chunks_exact_mut(4).enumerate() {
            match self.taps(x, y) {
                Some(taps) => {
                    px[0] = self.interpolate(&taps, 0);
                    px[1] = self.interpolate(&taps, 1);
                    px[2] = self.interpolate(&taps, 2);
                }
                None => px[..3].copy_from_slice(&[fill.0, fill.1, fill.2]),
            }
            px[3] = 255;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(w: usize, h: usize, c: usize) -> Vec<u8> {
        (0..w * h * c).map(|i| ((i * 37 + 11) % 251) as u8).collect()
    }

    #[test]
    fn test_zero_rotation_is_identity() {
        for (w, h, c) in [(7, 5, 1), (8, 6, 3), (9, 4, 3)] {
            let layout = Layout::packed(w, h, c);
            let src = pattern(w, h, c);
            let mut dst = vec![0u8; src.len()];
            rotate_bilinear(&src, layout, &mut dst, layout, 0.0, Rgb::WHITE);
            assert_eq!(dst, src, "{w}x{h}x{c}");
        }
    }

    #[test]
    fn test_zero_rotation_rgba_forces_opaque() {
        let layout = Layout::packed(6, 6, 4);
        let mut src = pattern(6, 6, 4);
        let mut dst = vec![0u8; src.len()];
        rotate_bilinear(&src, layout, &mut dst, layout, 0.0, Rgb::WHITE);
        for px in src.chunks_mut(4) {
            px[3] = 255;
        }
        assert_eq!(dst, src);
    }

    #[test]
    fn test_corners_get_fill() {
        let layout = Layout::packed(10, 10, 3);
        let src = vec![0u8; 300];
        let mut dst = vec![1u8; 300];
        let fill = Rgb(10, 20, 30);
        rotate_bilinear(&src, layout, &mut dst, layout, 45.0, fill);

        for (x, y) in [(0, 0), (9, 0), (0, 9), (9, 9)] {
            let i = (y * 10 + x) * 3;
            assert_eq!(&dst[i..i + 3], &[10, 20, 30], "corner ({x}, {y})");
        }
        // The centre stays inside the source.
        let i = (5 * 10 + 5) * 3;
        assert_eq!(&dst[i..i + 3], &[0, 0, 0]);
    }

    #[test]
    fn test_gray_fill_uses_green() {
        let layout = Layout::packed(10, 10, 1);
        let src = vec![0u8; 100];
        let mut dst = vec![0u8; 100];
        rotate_bilinear(&src, layout, &mut dst, layout, 45.0, Rgb(10, 20, 30));
        assert_eq!(dst[0], 20);
    }

    #[test]
    fn test_rgba_fill_is_opaque() {
        let layout = Layout::packed(10, 10, 4);
        let src = vec![0u8; 400];
        let mut dst = vec![0u8; 400];
        rotate_bilinear(&src, layout, &mut dst, layout, 45.0, Rgb::WHITE);
        assert_eq!(&dst[0..4], &[255, 255, 255, 255]);
        assert!(dst.chunks(4).all(|px| px[3] == 255));
    }

    #[test]
    fn test_half_turn_reverses() {
        let (w, h) = (5, 3);
        let layout = Layout::packed(w, h, 1);
        let src: Vec<u8> = (0..(w * h) as u8).map(|v| v * 10).collect();
        let mut dst = vec![0u8; src.len()];
        rotate_bilinear(&src, layout, &mut dst, layout, 180.0, Rgb::WHITE);
        // cos(pi) is not exactly -1 in f32, so compare within one level.
        for (i, &v) in dst.iter().enumerate() {
            let expected = src[src.len() - 1 - i] as i32;
            assert!((v as i32 - expected).abs() <= 10, "pixel {i}: {v} vs {expected}");
        }
    }

    #[test]
    fn test_padded_stride_preserved() {
        let (w, h) = (4, 3);
        let src_layout = Layout { width: w, height: h, channels: 3, stride: 16 };
        let dst_layout = Layout { width: w, height: h, channels: 3, stride: 14 };
        let src = pattern(16, h, 1);
        let mut dst = vec![99u8; 14 * h];
        rotate_bilinear(&src, src_layout, &mut dst, dst_layout, 0.0, Rgb::WHITE);
        for y in 0..h {
            assert_eq!(&dst[y * 14..y * 14 + 12], &src[y * 16..y * 16 + 12]);
            assert_eq!(&dst[y * 14 + 12..y * 14 + 14], &[99, 99]);
        }
    }

    #[test]
    fn test_output_size_may_differ() {
        let src = vec![50u8; 4 * 4 * 3];
        let mut dst = vec![0u8; 8 * 8 * 3];
        let (small, large) = (Layout::packed(4, 4, 3), Layout::packed(8, 8, 3));
        rotate_bilinear(&src, small, &mut dst, large, 0.0, Rgb(1, 2, 3));
        assert_eq!(&dst[0..3], &[1, 2, 3]);
        let centre = (4 * 8 + 4) * 3;
        assert_eq!(&dst[centre..centre + 3], &[50, 50, 50]);
    }

    #[test]
    fn test_invalid_geometry_is_noop() {
        let src = vec![0u8; 12];
        let mut dst = vec![7u8; 12];
        let (rgb, two) = (Layout::packed(2, 2, 3), Layout::packed(2, 2, 2));
        rotate_bilinear(&src, rgb, &mut dst, two, 10.0, Rgb::WHITE);
        assert!(dst.iter().all(|&p| p == 7));
        rotate_bilinear(&src[..5], rgb, &mut dst, rgb, 10.0, Rgb::WHITE);
        assert!(dst.iter().all(|&p| p == 7));
    }
}
