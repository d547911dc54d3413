//! Head-pose levelling from the two eye landmarks.
//!
//! Rotates the whole image so the line between the eyes becomes horizontal.

use crate::rotate::{rotate_bilinear, Layout};
use crate::types::Rgb;

// Below this horizontal eye separation the roll angle is treated as zero.
const MIN_EYE_DX: f32 = 1e-7;

/// Roll angle, in degrees, of the line from `left_eye` to `right_eye`.
///
/// Uses `atan(dy / dx)`, so the result lies in `(-90, 90)`; vertically
/// stacked eyes give 0.
pub fn eye_roll_degrees(left_eye: (i32, i32), right_eye: (i32, i32)) -> f32 {
    let dx = (right_eye.0 as i64 - left_eye.0 as i64) as f32;
    let dy = (right_eye.1 as i64 - left_eye.1 as i64) as f32;
    if dx.abs() < MIN_EYE_DX {
        return 0.0;
    }
    (dy / dx).atan().to_degrees()
}

/// Level the eyes by rotating `pixels` in place about the image centre.
///
/// The image keeps its size; uncovered corners are filled white. Returns the
/// applied angle in degrees. A zero angle leaves the buffer untouched, and so
/// does invalid geometry (reported as a zero angle).
pub fn align_pose(
    pixels: &mut [u8],
    width: u32,
    height: u32,
    channels: u32,
    left_eye: (i32, i32),
    right_eye: (i32, i32),
) -> f32 {
    let degrees = eye_roll_degrees(left_eye, right_eye);
    if degrees == 0.0 {
        return 0.0;
    }

    let layout = Layout::packed(width as usize, height as usize, channels as usize);
    if !layout.is_valid_for(pixels.len()) {
        tracing::warn!(
            width,
            height,
            channels,
            len = pixels.len(),
            "pose: invalid geometry, skipping"
        );
        return 0.0;
    }
    let mut scratch = pixels.to_vec();
    rotate_bilinear(pixels, layout, &mut scratch, layout, degrees, Rgb::WHITE);
    pixels.copy_from_slice(&scratch);

    tracing::debug!(degrees, ?left_eye, ?right_eye, "pose aligned");
    degrees
}
