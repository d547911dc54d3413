//! Landmark-driven post-processing: red-eye removal, then pose levelling.

use crate::alignment::align_pose;
use crate::frame::Frame;
use crate::redeye::remove_red_eye;
use crate::types::BoundingBox;

/// What [`retouch`] changed.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RetouchReport {
    /// Number of eye regions passed through red-eye correction.
    pub eyes_corrected: usize,
    /// Rotation applied to level the eyes, in degrees (0 when none).
    pub roll_degrees: f32,
}

/// Red-eye disc radius for a pair of eyes: a ninth of the eye distance, at least 1.
pub fn red_eye_radius(left_eye: (i32, i32), right_eye: (i32, i32)) -> i32 {
    let dx = (right_eye.0 as i64 - left_eye.0 as i64) as f64;
    let dy = (right_eye.1 as i64 - left_eye.1 as i64) as f64;
    let distance = (dx * dx + dy * dy).sqrt() as i64;
    (distance / 9).clamp(1, i32::MAX as i64) as i32
}

/// Correct red-eye at both eyes of every face, then level the frame on the last face's eyes.
///
/// Faces without landmarks are skipped. Without any landmarked face the frame
/// is not rotated.
pub fn retouch(frame: &mut Frame, faces: &[BoundingBox]) -> RetouchReport {
    let mut report = RetouchReport::default();
    let mut last_eyes = None;

    for face in faces {
        let Some((left, right)) = face.eye_pixels() else {
            continue;
        };
        let radius = red_eye_radius(left, right);
        for eye in [left, right] {
            remove_red_eye(&mut frame.data, frame.width, frame.height, frame.channels, eye, radius);
            report.eyes_corrected += 1;
        }
        last_eyes = Some((left, right));
    }

    if let Some((left, right)) = last_eyes {
        report.roll_degrees = align_pose(
            &mut frame.data,
            frame.width,
            frame.height,
            frame.channels,
            left,
            right,
        );
    }

    tracing::debug!(
        faces = faces.len(),
        eyes = report.eyes_corrected,
        roll = report.roll_degrees,
        "retouch complete"
    );
    report
}
