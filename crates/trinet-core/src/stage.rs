//! The three cascade stages.
//!
//! Each stage takes the normalised image plus the previous stage's boxes and
//! returns a fresh box list; nothing is carried between calls.

use crate::detector::DetectorError;
use crate::evaluator::{Evaluator, NetOutput, Stage};
use crate::frame::{crop_with_border, resize_bilinear};
use crate::nms::nms;
use crate::pyramid::DETECTION_WINDOW;
use crate::types::{BoundingBox, Metric};
use ndarray::ArrayView3;

// Proposal network geometry: a 12×12 window slid with stride 2.
const PROPOSAL_STRIDE: f32 = 2.0;

/// Run the proposal network over every pyramid level.
///
/// Each level is suppressed on its own (`Union`, `nms_threshold`) before
/// being appended to the merged candidate list.
pub fn propose<E: Evaluator + ?Sized>(
    evaluator: &mut E,
    image: ArrayView3<f32>,
    scales: &[f32],
    threshold: f32,
    nms_threshold: f32,
) -> Result<Vec<BoundingBox>, DetectorError> {
    let (_, height, width) = image.dim();
    let mut merged = Vec::new();

    for &scale in scales {
        let ws = (width as f32 * scale).ceil() as usize;
        let hs = (height as f32 * scale).ceil() as usize;
        let input = resize_bilinear(image, ws, hs);

        let output = evaluator.evaluate(Stage::Proposal, input.view())?;
        if !output.is_consistent() {
            return Err(shape_mismatch(Stage::Proposal, &output));
        }

        let boxes = generate_proposals(&output, scale, threshold);
        let boxes = nms(boxes, nms_threshold, Metric::Union);
        tracing::trace!(scale, input_w = ws, input_h = hs, count = boxes.len(), "pyramid level");
        merged.extend(boxes);
    }

    Ok(merged)
}

/// Decode a proposal score map into boxes at original-image scale.
///
/// Cell `(row, col)` covers the window starting at `2 * col + 1` in the
/// resized image; dividing by `scale` maps it back.
pub fn generate_proposals(output: &NetOutput, scale: f32, threshold: f32) -> Vec<BoundingBox> {
    let inv_scale = 1.0 / scale;
    let mut boxes = Vec::new();

    for ((row, col), &score) in output.scores.indexed_iter() {
        if score <= threshold {
            continue;
        }
        let left = PROPOSAL_STRIDE * col as f32 + 1.0;
        let top = PROPOSAL_STRIDE * row as f32 + 1.0;

        let mut b = BoundingBox::new(
            (left * inv_scale).round() as i32,
            (top * inv_scale).round() as i32,
            ((left + DETECTION_WINDOW) * inv_scale).round() as i32,
            ((top + DETECTION_WINDOW) * inv_scale).round() as i32,
            score,
        );
        b.regression = std::array::from_fn(|c| output.regression[[c, row, col]]);
        boxes.push(b);
    }

    boxes
}

/// Re-score every box with the 24×24 refine network.
pub fn refine_boxes<E: Evaluator + ?Sized>(
    evaluator: &mut E,
    image: ArrayView3<f32>,
    boxes: Vec<BoundingBox>,
    threshold: f32,
) -> Result<Vec<BoundingBox>, DetectorError> {
    classify_crops(evaluator, image, boxes, Stage::Refine, threshold)
}

/// Re-score every box with the 48×48 output network and attach landmarks.
pub fn output_boxes<E: Evaluator + ?Sized>(
    evaluator: &mut E,
    image: ArrayView3<f32>,
    boxes: Vec<BoundingBox>,
    threshold: f32,
) -> Result<Vec<BoundingBox>, DetectorError> {
    classify_crops(evaluator, image, boxes, Stage::Output, threshold)
}

/// Crop, resize and classify each box; keep those scoring above `threshold`.
///
/// Kept boxes take the new score and regression. Boxes whose crop is empty
/// are dropped without calling the evaluator.
fn classify_crops<E: Evaluator + ?Sized>(
    evaluator: &mut E,
    image: ArrayView3<f32>,
    boxes: Vec<BoundingBox>,
    stage: Stage,
    threshold: f32,
) -> Result<Vec<BoundingBox>, DetectorError> {
    let Some(side) = stage.input_size() else {
        return Err(DetectorError::ShapeMismatch {
            stage: stage.name(),
            detail: "stage has no fixed crop size".into(),
        });
    };
    let mut kept = Vec::with_capacity(boxes.len());

    for mut b in boxes {
        let Some(crop) = crop_with_border(image, b.x1, b.y1, b.x2, b.y2) else {
            tracing::debug!(
                stage = stage.name(),
                x1 = b.x1,
                y1 = b.y1,
                x2 = b.x2,
                y2 = b.y2,
                "skipping empty crop"
            );
            continue;
        };
        let input = resize_bilinear(crop.view(), side, side);

        let output = evaluator.evaluate(stage, input.view())?;
        if output.scores.dim() != (1, 1) || !output.is_consistent() {
            return Err(shape_mismatch(stage, &output));
        }

        let score = output.scores[[0, 0]];
        if score <= threshold {
            continue;
        }

        if stage == Stage::Output {
            let lm = output.landmarks.as_ref().ok_or_else(|| DetectorError::ShapeMismatch {
                stage: stage.name(),
                detail: "no landmark map".into(),
            })?;
            let (w, h) = (b.width() as f32, b.height() as f32);
            b.landmarks = Some(std::array::from_fn(|i| {
                (
                    b.x1 as f32 + w * lm[[i, 0, 0]],
                    b.y1 as f32 + h * lm[[i + 5, 0, 0]],
                )
            }));
        }

        b.regression = std::array::from_fn(|c| output.regression[[c, 0, 0]]);
        b.score = score;
        kept.push(b);
    }

    Ok(kept)
}

fn shape_mismatch(stage: Stage, output: &NetOutput) -> DetectorError {
    DetectorError::ShapeMismatch {
        stage: stage.name(),
        detail: format!(
            "scores {:?}, regression {:?}, landmarks {:?}",
            output.scores.dim(),
            output.regression.dim(),
            output.landmarks.as_ref().map(|lm| lm.dim())
        ),
    }
}
