//! Frame type and tensor pre-processing: normalisation, bilinear resize, border crop.

use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use ndarray::{Array3, ArrayView3};

// Maps 0..=255 to roughly [-1, 1].
const PIXEL_MEAN: f32 = 127.5;
const PIXEL_NORM: f32 = 0.0078125;

/// An interleaved 8-bit image owned by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Pixel data, `width * height * channels` bytes, rows tightly packed.
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// 1 (gray), 3 (RGB) or 4 (RGBA).
    pub channels: u32,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u32) -> Self {
        Self {
            data,
            width,
            height,
            channels,
        }
    }

    /// A frame filled with a single value.
    pub fn filled(width: u32, height: u32, channels: u32, value: u8) -> Self {
        let len = width as usize * height as usize * channels as usize;
        Self::new(vec![value; len], width, height, channels)
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width as usize * self.channels as usize
    }

    /// True when the buffer length matches the declared geometry.
    pub fn is_consistent(&self) -> bool {
        self.width > 0
            && self.height > 0
            && matches!(self.channels, 1 | 3 | 4)
            && self.data.len() == self.stride() * self.height as usize
    }

    /// Convert a decoded image, keeping gray, RGB and RGBA layouts as-is.
    pub fn from_image(img: &DynamicImage) -> Self {
        match img {
            DynamicImage::ImageLuma8(gray) => {
                Self::new(gray.as_raw().clone(), gray.width(), gray.height(), 1)
            }
            DynamicImage::ImageRgba8(rgba) => {
                Self::new(rgba.as_raw().clone(), rgba.width(), rgba.height(), 4)
            }
            other => {
                let rgb = other.to_rgb8();
                let (w, h) = rgb.dimensions();
                Self::new(rgb.into_raw(), w, h, 3)
            }
        }
    }

    /// Convert back into an `image` buffer. Returns `None` on inconsistent geometry.
    pub fn into_image(self) -> Option<DynamicImage> {
        let (w, h) = (self.width, self.height);
        match self.channels {
            1 => GrayImage::from_raw(w, h, self.data).map(DynamicImage::ImageLuma8),
            3 => RgbImage::from_raw(w, h, self.data).map(DynamicImage::ImageRgb8),
            4 => RgbaImage::from_raw(w, h, self.data).map(DynamicImage::ImageRgba8),
            _ => None,
        }
    }

    /// Normalise into a planar `(3, height, width)` float tensor.
    ///
    /// Gray is replicated to all three planes; alpha is dropped.
    pub fn to_tensor(&self) -> Array3<f32> {
        let (w, h) = (self.width as usize, self.height as usize);
        let c = self.channels as usize;
        let mut tensor = Array3::<f32>::zeros((3, h, w));

        for y in 0..h {
            for x in 0..w {
                let px = &self.data[(y * w + x) * c..];
                for plane in 0..3 {
                    let value = if c == 1 { px[0] } else { px[plane] };
                    tensor[[plane, y, x]] = (value as f32 - PIXEL_MEAN) * PIXEL_NORM;
                }
            }
        }

        tensor
    }
}

/// Bilinearly resize a planar tensor to `out_w × out_h`.
///
/// Sampling uses pixel centres (`(x + 0.5) / scale - 0.5`) and clamps at the
/// edges, so a uniform input stays uniform.
pub fn resize_bilinear(src: ArrayView3<f32>, out_w: usize, out_h: usize) -> Array3<f32> {
    let (planes, in_h, in_w) = src.dim();
    let mut out = Array3::<f32>::zeros((planes, out_h, out_w));
    if in_w == 0 || in_h == 0 || out_w == 0 || out_h == 0 {
        return out;
    }

    let scale_x = in_w as f32 / out_w as f32;
    let scale_y = in_h as f32 / out_h as f32;

    for y in 0..out_h {
        let src_y = (y as f32 + 0.5) * scale_y - 0.5;
        let y0 = (src_y.floor() as i32).clamp(0, in_h as i32 - 1) as usize;
        let y1 = (y0 + 1).min(in_h - 1);
        let fy = (src_y - src_y.floor()).clamp(0.0, 1.0);
        let fy = if src_y < 0.0 { 0.0 } else { fy };

        for x in 0..out_w {
            let src_x = (x as f32 + 0.5) * scale_x - 0.5;
            let x0 = (src_x.floor() as i32).clamp(0, in_w as i32 - 1) as usize;
            let x1 = (x0 + 1).min(in_w - 1);
            let fx = (src_x - src_x.floor()).clamp(0.0, 1.0);
            let fx = if src_x < 0.0 { 0.0 } else { fx };

            for p in 0..planes {
                let tl = src[[p, y0, x0]];
                let tr = src[[p, y0, x1]];
                let bl = src[[p, y1, x0]];
                let br = src[[p, y1, x1]];

                out[[p, y, x]] = tl * (1.0 - fx) * (1.0 - fy)
                    + tr * fx * (1.0 - fy)
                    + bl * (1.0 - fx) * fy
                    + br * fx * fy;
            }
        }
    }

    out
}

/// Copy rows `[y1, y2)` and columns `[x1, x2)` of `src` into a new tensor.
///
/// Coordinates outside the source replicate the nearest edge pixel. Returns
/// `None` when the requested region is empty.
pub fn crop_with_border(
    src: ArrayView3<f32>,
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
) -> Option<Array3<f32>> {
    let (planes, in_h, in_w) = src.dim();
    if x2 <= x1 || y2 <= y1 || in_w == 0 || in_h == 0 {
        return None;
    }
    let out_w = (x2 - x1) as usize;
    let out_h = (y2 - y1) as usize;
    let max_x = in_w as i32 - 1;
    let max_y = in_h as i32 - 1;

    let mut out = Array3::<f32>::zeros((planes, out_h, out_w));
    for oy in 0..out_h {
        let sy = (y1 + oy as i32).clamp(0, max_y) as usize;
        for ox in 0..out_w {
            let sx = (x1 + ox as i32).clamp(0, max_x) as usize;
            for p in 0..planes {
                out[[p, oy, ox]] = src[[p, sy, sx]];
            }
        }
    }

    Some(out)
}
