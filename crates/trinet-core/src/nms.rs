//! Greedy non-maximum suppression over integer boxes.

use crate::types::{BoundingBox, Metric};

/// Non-Maximum Suppression: keep the best-scoring box of every overlapping cluster.
///
/// Candidates are stably sorted by ascending score, then the highest remaining
/// one is repeatedly kept and every remaining candidate overlapping it by more
/// than `threshold` is dropped. Among equal scores the later-inserted box wins.
/// Kept boxes are returned verbatim, in descending score order.
pub fn nms(mut boxes: Vec<BoundingBox>, threshold: f32, metric: Metric) -> Vec<BoundingBox> {
    if boxes.is_empty() {
        return boxes;
    }

    boxes.sort_by(|a, b| {
        a.score
            .partial_cmp(&b.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; boxes.len()];

    for i in (0..boxes.len()).rev() {
        if suppressed[i] {
            continue;
        }
        suppressed[i] = true;

        // Everything above `i` is already kept or suppressed.
        for j in 0..i {
            if !suppressed[j] && overlap(&boxes[j], &boxes[i], metric) > threshold {
                suppressed[j] = true;
            }
        }
        keep.push(i);
    }

    keep.into_iter().map(|i| boxes[i].clone()).collect()
}

/// Overlap ratio between two boxes under the given metric.
///
/// The intersection counts pixels inclusively (`x2 - x1 + 1`) while areas use
/// the exclusive [`BoundingBox::area`]. Under `Min`, a zero-area box that
/// still shares pixels with the other overlaps it infinitely.
pub fn overlap(a: &BoundingBox, b: &BoundingBox, metric: Metric) -> f32 {
    let inter_w = (a.x2.min(b.x2) - a.x1.max(b.x1) + 1).max(0) as f32;
    let inter_h = (a.y2.min(b.y2) - a.y1.max(b.y1) + 1).max(0) as f32;
    let inter_area = inter_w * inter_h;

    let area_a = a.area() as f32;
    let area_b = b.area() as f32;
    let denom = match metric {
        Metric::Union => area_a + area_b - inter_area,
        Metric::Min => area_a.min(area_b),
    };

    if denom > 0.0 {
        inter_area / denom
    } else if metric == Metric::Min && inter_area > 0.0 {
        f32::INFINITY
    } else {
        0.0
    }
}
