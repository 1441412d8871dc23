// THEORY:
// The `geometry` module holds the two "dumb" value types every other layer speaks:
// the axis-aligned `Rect` (proposals, detections, frame margins) and the sub-pixel
// `Point2` (feature points handed to the point tracker). Neither type knows anything
// about images; they only know how to intersect, combine and move themselves.
//
// `Rect` uses the (x, y, width, height) convention with integer coordinates, where
// the right and bottom edges are exclusive. An empty rectangle (non-positive width
// or height) is a legal value for intermediate arithmetic but is never handed to a
// scorer or stored as a detection.

use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle in pixel coordinates. `right()` and `bottom()` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Builds a rectangle from its edges, `right`/`bottom` exclusive.
    pub fn from_edges(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self::new(left, top, right - left, bottom - top)
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.width as i64 * self.height as i64
        }
    }

    /// The overlapping part of two rectangles, if it has positive area.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        let overlap = Rect::from_edges(left, top, right, bottom);
        (!overlap.is_empty()).then_some(overlap)
    }

    /// True when the two rectangles share a positive-area region.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.intersection(other).is_some()
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect::from_edges(
            self.x.min(other.x),
            self.y.min(other.y),
            self.right().max(other.right()),
            self.bottom().max(other.bottom()),
        )
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    pub fn contains_point(&self, point: Point2) -> bool {
        point.x >= self.x as f32
            && point.y >= self.y as f32
            && point.x < self.right() as f32
            && point.y < self.bottom() as f32
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Shifts the rectangle by a sub-pixel displacement and clamps it into `bounds`.
    ///
    /// The top-left and bottom-right corners are shifted and clamped independently,
    /// then truncated to integers, so a rectangle pushed against the border shrinks
    /// instead of sliding out of the frame. The result may be empty.
    pub fn translate_clamped(&self, dx: f32, dy: f32, bounds: &Rect) -> Rect {
        let (min_x, max_x) = (bounds.x as f32, bounds.right() as f32);
        let (min_y, max_y) = (bounds.y as f32, bounds.bottom() as f32);

        let left = (self.x as f32 + dx).clamp(min_x, max_x);
        let top = (self.y as f32 + dy).clamp(min_y, max_y);
        let right = (self.right() as f32 + dx).clamp(min_x, max_x);
        let bottom = (self.bottom() as f32 + dy).clamp(min_y, max_y);

        let x = left as i32;
        let y = top as i32;
        Rect::new(x, y, (right - x as f32) as i32, (bottom - y as f32) as i32)
    }
}

/// A sub-pixel location in frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn displacement_to(&self, other: Point2) -> (f32, f32) {
        (other.x - self.x, other.y - self.y)
    }
}

/// The admissible proposal size range, fixed by the scorer's expected input scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizeWindow {
    pub min_width: i32,
    pub min_height: i32,
    pub max_width: i32,
    pub max_height: i32,
}

impl Default for SizeWindow {
    fn default() -> Self {
        Self {
            min_width: 50,
            min_height: 50,
            max_width: 347,
            max_height: 429,
        }
    }
}

impl SizeWindow {
    /// True when both sides of `rect` fall inside the window (inclusive).
    pub fn admits(&self, rect: &Rect) -> bool {
        rect.width >= self.min_width
            && rect.height >= self.min_height
            && rect.width <= self.max_width
            && rect.height <= self.max_height
    }
}

/// Width and height of the image patch the scorer consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputSize {
    pub width: i32,
    pub height: i32,
}

impl Default for InputSize {
    fn default() -> Self {
        Self {
            width: 227,
            height: 227,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersection_requires_positive_area() {
        let a = Rect::new(0, 0, 10, 10);
        let touching = Rect::new(10, 0, 10, 10);
        let inside = Rect::new(5, 5, 10, 10);

        assert_eq!(a.intersection(&touching), None);
        assert!(!a.overlaps(&touching));
        assert_eq!(a.intersection(&inside), Some(Rect::new(5, 5, 5, 5)));
    }

    #[test]
    fn union_covers_both() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(20, 5, 5, 20);
        assert_eq!(a.union(&b), Rect::new(0, 0, 25, 25));
    }

    #[test]
    fn translate_shifts_inside_bounds() {
        let bounds = Rect::new(0, 0, 640, 480);
        let moved = Rect::new(100, 100, 60, 60).translate_clamped(5.0, 3.0, &bounds);
        assert_eq!(moved, Rect::new(105, 103, 60, 60));
    }

    #[test]
    fn translate_clamps_to_frame_edges() {
        let bounds = Rect::new(0, 0, 200, 100);

        let left = Rect::new(10, 10, 50, 50).translate_clamped(-30.0, 0.0, &bounds);
        assert_eq!(left, Rect::new(0, 10, 30, 50));

        let bottom_right = Rect::new(160, 70, 50, 50).translate_clamped(20.0, 20.0, &bounds);
        assert!(bounds.contains_rect(&bottom_right));
        assert_eq!(bottom_right, Rect::new(180, 90, 20, 10));

        let gone = Rect::new(10, 10, 20, 20).translate_clamped(-100.0, 0.0, &bounds);
        assert!(gone.is_empty());
    }

    #[test]
    fn size_window_is_inclusive() {
        let window = SizeWindow::default();
        assert!(window.admits(&Rect::new(0, 0, 50, 50)));
        assert!(window.admits(&Rect::new(0, 0, 347, 429)));
        assert!(!window.admits(&Rect::new(0, 0, 49, 60)));
        assert!(!window.admits(&Rect::new(0, 0, 60, 430)));
    }
}
