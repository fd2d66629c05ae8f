// src/services/region_encoder.rs
// Converts drag gestures on a rendered image into normalized selections and
// back again for overlays.
use crate::models::{NORMALIZED_MAX, Selection};
use serde::{Deserialize, Serialize};

/// Drags this small (in display pixels) on either axis are treated as clicks.
pub const MIN_DRAG_PX: f64 = 5.0;

const SCALE: f64 = NORMALIZED_MAX as f64;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayPoint {
    pub x: f64,
    pub y: f64,
}

/// Size of the image as rendered when the gesture finished, not the file's
/// own resolution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplaySize {
    pub width: f64,
    pub height: f64,
}

impl DisplaySize {
    fn is_usable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DragGesture {
    pub start: DisplayPoint,
    pub end: DisplayPoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

fn clamp_point(p: DisplayPoint, size: DisplaySize) -> DisplayPoint {
    DisplayPoint {
        x: p.x.clamp(0.0, size.width),
        y: p.y.clamp(0.0, size.height),
    }
}

/// Origin-normalized pixel rectangle spanned by a drag, in either direction.
pub fn drag_rect(drag: DragGesture, size: DisplaySize) -> PixelRect {
    let a = clamp_point(drag.start, size);
    let b = clamp_point(drag.end, size);
    PixelRect {
        left: a.x.min(b.x),
        top: a.y.min(b.y),
        width: (a.x - b.x).abs(),
        height: (a.y - b.y).abs(),
    }
}

fn to_units(px: f64, extent: f64) -> u32 {
    (px / extent * SCALE).round().clamp(0.0, SCALE) as u32
}

pub fn normalize(rect: PixelRect, size: DisplaySize) -> Option<Selection> {
    if !size.is_usable() {
        return None;
    }
    let sel = Selection {
        x: to_units(rect.left, size.width),
        y: to_units(rect.top, size.height),
        width: to_units(rect.width, size.width),
        height: to_units(rect.height, size.height),
    };
    Some(sel.clamped())
}

/// Encodes a finished drag. Returns `None` for noise-sized drags and for an
/// unusable display size.
pub fn encode_drag(drag: DragGesture, size: DisplaySize) -> Option<Selection> {
    if !size.is_usable() {
        return None;
    }
    let rect = drag_rect(drag, size);
    if rect.width <= MIN_DRAG_PX || rect.height <= MIN_DRAG_PX {
        return None;
    }
    normalize(rect, size)
}

pub fn encode_drags(drags: &[DragGesture], size: DisplaySize) -> Vec<Selection> {
    drags.iter().filter_map(|d| encode_drag(*d, size)).collect()
}

pub fn denormalize(sel: &Selection, size: DisplaySize) -> PixelRect {
    PixelRect {
        left: sel.x as f64 / SCALE * size.width,
        top: sel.y as f64 / SCALE * size.height,
        width: sel.width as f64 / SCALE * size.width,
        height: sel.height as f64 / SCALE * size.height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size(w: f64, h: f64) -> DisplaySize {
        DisplaySize { width: w, height: h }
    }

    fn drag(x1: f64, y1: f64, x2: f64, y2: f64) -> DragGesture {
        DragGesture {
            start: DisplayPoint { x: x1, y: y1 },
            end: DisplayPoint { x: x2, y: y2 },
        }
    }

    #[test]
    fn encodes_relative_to_displayed_size() {
        let sel = encode_drag(drag(100.0, 50.0, 300.0, 150.0), size(800.0, 400.0)).unwrap();
        assert_eq!(sel, Selection { x: 125, y: 125, width: 250, height: 250 });
    }

    #[test]
    fn drag_direction_does_not_matter() {
        let s = size(640.0, 480.0);
        let forward = encode_drag(drag(10.0, 20.0, 210.0, 220.0), s).unwrap();
        let backward = encode_drag(drag(210.0, 220.0, 10.0, 20.0), s).unwrap();
        let mixed = encode_drag(drag(210.0, 20.0, 10.0, 220.0), s).unwrap();
        assert_eq!(forward, backward);
        assert_eq!(forward, mixed);
        assert_eq!(forward.x, 16);
    }

    #[test]
    fn small_drags_are_discarded() {
        let s = size(500.0, 500.0);
        assert!(encode_drag(drag(10.0, 10.0, 15.0, 100.0), s).is_none());
        assert!(encode_drag(drag(10.0, 10.0, 100.0, 14.0), s).is_none());
        assert!(encode_drag(drag(10.0, 10.0, 16.0, 16.0), s).is_some());
    }

    #[test]
    fn zero_display_size_yields_nothing() {
        assert!(encode_drag(drag(0.0, 0.0, 50.0, 50.0), size(0.0, 300.0)).is_none());
    }

    #[test]
    fn out_of_bounds_points_are_clamped() {
        let sel = encode_drag(drag(-40.0, 900.0, 300.0, 100.0), size(200.0, 500.0)).unwrap();
        assert_eq!(sel, Selection { x: 0, y: 200, width: 1000, height: 800 });
        assert!(sel.x_max() <= NORMALIZED_MAX && sel.y_max() <= NORMALIZED_MAX);
    }

    #[test]
    fn same_selection_overlays_at_any_size() {
        let sel = Selection { x: 250, y: 100, width: 500, height: 300 };
        let close = |a: f64, b: f64| (a - b).abs() < 1e-9;
        let small = denormalize(&sel, size(400.0, 200.0));
        let large = denormalize(&sel, size(1600.0, 800.0));
        assert!(close(small.left, 100.0) && close(small.top, 20.0));
        assert!(close(small.width, 200.0) && close(small.height, 60.0));
        assert!(close(large.left, small.left * 4.0));
        assert!(close(large.height, small.height * 4.0));
    }

    #[test]
    fn round_trip_stays_within_one_unit() {
        let sizes = [size(333.0, 777.0), size(1024.0, 768.0), size(97.0, 1301.0)];
        for s in sizes {
            let mut left = 0.0;
            while left + 6.0 <= s.width {
                let rect = PixelRect {
                    left,
                    top: (left * 0.7).min(s.height - 6.0),
                    width: (s.width - left).min(6.0 + left / 3.0),
                    height: 6.0 + (left % 40.0),
                };
                if rect.top + rect.height > s.height {
                    left += 13.0;
                    continue;
                }
                let sel = normalize(rect, s).unwrap();
                let back = denormalize(&sel, s);
                let unit_x = s.width / SCALE;
                let unit_y = s.height / SCALE;
                assert!((back.left - rect.left).abs() <= unit_x, "{rect:?} -> {back:?}");
                assert!((back.top - rect.top).abs() <= unit_y, "{rect:?} -> {back:?}");
                assert!((back.width - rect.width).abs() <= unit_x, "{rect:?} -> {back:?}");
                assert!((back.height - rect.height).abs() <= unit_y, "{rect:?} -> {back:?}");
                left += 13.0;
            }
        }
    }
}
