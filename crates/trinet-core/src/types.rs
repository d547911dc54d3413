use serde::{Deserialize, Serialize};

/// Bounding box for a detected face, in integer pixel coordinates.
///
/// `(x1, y1)` is the top-left corner and `(x2, y2)` the bottom-right. After any
/// refine step `x1 <= x2` and `y1 <= y2` hold and the box lies inside the image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
    /// Classifier confidence from the most recent stage that kept this box.
    pub score: f32,
    /// Regression deltas `(dx1, dy1, dx2, dy2)` relative to box width/height.
    /// Stage-local: written by a stage, consumed by the next refine.
    pub regression: [f32; 4],
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    /// Only the output stage fills these in.
    pub landmarks: Option<[(f32, f32); 5]>,
}

impl BoundingBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32, score: f32) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            score,
            regression: [0.0; 4],
            landmarks: None,
        }
    }

    /// Box area as used by suppression: `(x2 - x1) * (y2 - y1)`.
    pub fn area(&self) -> i64 {
        self.width() as i64 * self.height() as i64
    }

    /// Exclusive width, `x2 - x1`.
    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    /// Exclusive height, `y2 - y1`.
    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }

    /// Left and right eye landmarks rounded to the nearest pixel.
    pub fn eye_pixels(&self) -> Option<((i32, i32), (i32, i32))> {
        let lms = self.landmarks.as_ref()?;
        let round = |(x, y): (f32, f32)| (x.round() as i32, y.round() as i32);
        Some((round(lms[0]), round(lms[1])))
    }
}

/// Denominator used when turning an intersection area into an overlap ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric {
    /// Intersection over union.
    Union,
    /// Intersection over the smaller of the two areas.
    Min,
}

/// 8-bit RGB colour used for fills and annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const WHITE: Rgb = Rgb(255, 255, 255);
    pub const RED: Rgb = Rgb(255, 0, 0);
    pub const BLUE: Rgb = Rgb(0, 0, 255);
}

impl Default for Rgb {
    fn default() -> Self {
        Rgb::WHITE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_area_tracks_coordinates() {
        let mut b = BoundingBox::new(10, 20, 30, 60, 0.9);
        assert_eq!(b.area(), 20 * 40);
        b.x2 = 20;
        assert_eq!(b.area(), 10 * 40);
    }

    #[test]
    fn test_area_degenerate() {
        let b = BoundingBox::new(5, 5, 5, 9, 0.1);
        assert_eq!(b.area(), 0);
    }

    #[test]
    fn test_eye_pixels_rounds() {
        let mut b = BoundingBox::new(0, 0, 10, 10, 1.0);
        assert!(b.eye_pixels().is_none());
        b.landmarks = Some([(2.4, 3.5), (7.6, 3.49), (5.0, 5.0), (3.0, 8.0), (7.0, 8.0)]);
        assert_eq!(b.eye_pixels(), Some(((2, 4), (8, 3))));
    }

    #[test]
    fn test_default_fill_is_white() {
        assert_eq!(Rgb::default(), Rgb(255, 255, 255));
    }
}
