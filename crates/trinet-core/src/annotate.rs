//! Draws detections onto a frame: box outlines and landmark dots.

use crate::frame::Frame;
use crate::types::{BoundingBox, Rgb};

/// Outline each face in red and mark its landmarks in blue.
pub fn draw_detections(frame: &mut Frame, faces: &[BoundingBox]) {
    for face in faces {
        draw_rect(frame, face.x1, face.y1, face.x2, face.y2, Rgb::RED);
        if let Some(landmarks) = face.landmarks {
            for (x, y) in landmarks {
                draw_point(frame, x.round() as i32, y.round() as i32, Rgb::BLUE);
            }
        }
    }
}

/// Set one pixel. Gray frames take the red component; alpha is left alone.
/// Coordinates outside the frame are ignored.
pub fn draw_point(frame: &mut Frame, x: i32, y: i32, color: Rgb) {
    if x < 0 || y < 0 || x >= frame.width as i32 || y >= frame.height as i32 {
        return;
    }
    let c = frame.channels as usize;
    let offset = y as usize * frame.stride() + x as usize * c;
    let rgb = [color.0, color.1, color.2];
    let n = c.min(3);
    if let Some(px) = frame.data.get_mut(offset..offset + n) {
        px.copy_from_slice(&rgb[..n]);
    }
}

/// One-pixel rectangle outline with inclusive corners, clipped to the frame.
pub fn draw_rect(frame: &mut Frame, x1: i32, y1: i32, x2: i32, y2: i32, color: Rgb) {
    let (left, right) = (x1.min(x2), x1.max(x2));
    let (top, bottom) = (y1.min(y2), y1.max(y2));
    for x in left..=right {
        draw_point(frame, x, top, color);
        draw_point(frame, x, bottom, color);
    }
    for y in top..=bottom {
        draw_point(frame, left, y, color);
        draw_point(frame, right, y, color);
    }
}
