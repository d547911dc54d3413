//! Bounding-box regression, square normalisation and clipping.

use crate::types::BoundingBox;

/// Apply each box's regression deltas, optionally squaring it, then clip to the image.
///
/// Deltas scale with the inclusive box size (`x2 - x1 + 1`). With `square`
/// the shorter side grows to the longer one around the same centre.
/// Coordinates round half away from zero. After clipping
/// `0 <= x1 <= x2 <= width - 1` and `0 <= y1 <= y2 <= height - 1`.
///
/// The deltas are consumed: every returned box carries zero regression.
pub fn refine(boxes: Vec<BoundingBox>, width: u32, height: u32, square: bool) -> Vec<BoundingBox> {
    boxes
        .into_iter()
        .map(|b| refine_one(b, width, height, square))
        .collect()
}

fn refine_one(mut b: BoundingBox, width: u32, height: u32, square: bool) -> BoundingBox {
    let bbw = (b.x2 - b.x1 + 1) as f32;
    let bbh = (b.y2 - b.y1 + 1) as f32;
    let [dx1, dy1, dx2, dy2] = b.regression;

    let mut x1 = b.x1 as f32 + dx1 * bbw;
    let mut y1 = b.y1 as f32 + dy1 * bbh;
    let mut x2 = b.x2 as f32 + dx2 * bbw;
    let mut y2 = b.y2 as f32 + dy2 * bbh;

    if square {
        let w = x2 - x1 + 1.0;
        let h = y2 - y1 + 1.0;
        let max_side = w.max(h);
        x1 += (w - max_side) * 0.5;
        y1 += (h - max_side) * 0.5;
        x2 = x1 + max_side - 1.0;
        y2 = y1 + max_side - 1.0;
    }

    b.x1 = x1.round() as i32;
    b.y1 = y1.round() as i32;
    b.x2 = x2.round() as i32;
    b.y2 = y2.round() as i32;
    b.regression = [0.0; 4];

    clip(&mut b, width, height);
    b
}

/// Clamp a box into `[0, width - 1] x [0, height - 1]` keeping the corners ordered.
fn clip(b: &mut BoundingBox, width: u32, height: u32) {
    let max_x = (width as i32 - 1).max(0);
    let max_y = (height as i32 - 1).max(0);

    b.x1 = b.x1.clamp(0, max_x);
    b.y1 = b.y1.clamp(0, max_y);
    b.x2 = b.x2.clamp(b.x1, max_x);
    b.y2 = b.y2.clamp(b.y1, max_y);
}
