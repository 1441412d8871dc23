//! Test doubles and synthetic frames shared by the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use image::{Rgb, RgbImage};
use nest_vision::{
    CollaboratorError, Frame, HsvImage, Point2, PointTracker, Rect, Scorer, Segmentation,
    SegmentationParams, Segmenter, TrackedPoint,
};

/// Labels every pixel 0.
pub struct UniformSegmenter;

impl Segmenter for UniformSegmenter {
    fn segment(
        &self,
        image: &HsvImage,
        _params: &SegmentationParams,
    ) -> Result<Segmentation, CollaboratorError> {
        Ok(Segmentation {
            width: image.width,
            height: image.height,
            labels: vec![0; image.width * image.height],
            component_count: 1,
        })
    }
}

/// Labels pixels inside `block` 1 and everything else 0.
pub struct BlockSegmenter {
    pub block: Rect,
}

impl Segmenter for BlockSegmenter {
    fn segment(
        &self,
        image: &HsvImage,
        _params: &SegmentationParams,
    ) -> Result<Segmentation, CollaboratorError> {
        let labels = (0..image.height)
            .flat_map(|y| (0..image.width).map(move |x| (x, y)))
            .map(|(x, y)| {
                let inside = self.block.contains_point(Point2::new(x as f32, y as f32));
                u32::from(inside)
            })
            .collect();
        Ok(Segmentation {
            width: image.width,
            height: image.height,
            labels,
            component_count: 2,
        })
    }
}

/// One label per distinct HSV colour, so flat-colour blocks become exact leaves.
pub struct ColourSegmenter;

impl Segmenter for ColourSegmenter {
    fn segment(
        &self,
        image: &HsvImage,
        _params: &SegmentationParams,
    ) -> Result<Segmentation, CollaboratorError> {
        let mut colours: HashMap<[u8; 3], u32> = HashMap::new();
        let labels = image
            .samples
            .iter()
            .map(|sample| {
                let next = colours.len() as u32;
                *colours.entry(*sample).or_insert(next)
            })
            .collect();
        Ok(Segmentation {
            width: image.width,
            height: image.height,
            labels,
            component_count: colours.len(),
        })
    }
}

/// Delegates to `inner` for the first `allowed` calls, then fails.
pub struct ExhaustedSegmenter<S> {
    pub inner: S,
    pub allowed: usize,
    pub calls: AtomicUsize,
}

impl<S: Segmenter> ExhaustedSegmenter<S> {
    pub fn new(inner: S, allowed: usize) -> Self {
        Self {
            inner,
            allowed,
            calls: AtomicUsize::new(0),
        }
    }
}

impl<S: Segmenter> Segmenter for ExhaustedSegmenter<S> {
    fn segment(
        &self,
        image: &HsvImage,
        params: &SegmentationParams,
    ) -> Result<Segmentation, CollaboratorError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) >= self.allowed {
            return Err("segmentation quota exhausted".into());
        }
        self.inner.segment(image, params)
    }
}

/// Moves every point by a fixed displacement and reports success.
pub struct ShiftTracker {
    pub dx: f32,
    pub dy: f32,
}

impl PointTracker for ShiftTracker {
    fn track(
        &self,
        _previous: &Frame,
        _current: &Frame,
        points: &[Point2],
    ) -> Result<Vec<TrackedPoint>, CollaboratorError> {
        Ok(points
            .iter()
            .map(|p| TrackedPoint {
                point: Point2::new(p.x + self.dx, p.y + self.dy),
                found: true,
            })
            .collect())
    }
}

/// Reports every point as lost.
pub struct LosingTracker;

impl PointTracker for LosingTracker {
    fn track(
        &self,
        _previous: &Frame,
        _current: &Frame,
        points: &[Point2],
    ) -> Result<Vec<TrackedPoint>, CollaboratorError> {
        Ok(points
            .iter()
            .map(|&point| TrackedPoint {
                point,
                found: false,
            })
            .collect())
    }
}

/// Always returns one result too few.
pub struct ShortTracker;

impl PointTracker for ShortTracker {
    fn track(
        &self,
        _previous: &Frame,
        _current: &Frame,
        points: &[Point2],
    ) -> Result<Vec<TrackedPoint>, CollaboratorError> {
        Ok(points
            .iter()
            .skip(1)
            .map(|&point| TrackedPoint { point, found: true })
            .collect())
    }
}

/// Fails on every call.
pub struct FailingTracker;

impl PointTracker for FailingTracker {
    fn track(
        &self,
        _previous: &Frame,
        _current: &Frame,
        _points: &[Point2],
    ) -> Result<Vec<TrackedPoint>, CollaboratorError> {
        Err("tracker offline".into())
    }
}

/// Scores `target` with `hit` and everything else with `miss`.
pub struct TargetScorer {
    pub target: Rect,
    pub hit: f32,
    pub miss: f32,
}

impl Scorer for TargetScorer {
    fn score(&self, rect: Rect, _frame: &Frame) -> Result<f32, CollaboratorError> {
        Ok(if rect == self.target { self.hit } else { self.miss })
    }
}

/// Scores listed rectangles with their value, everything else 0, and fails on `fail_on`.
pub struct TableScorer {
    pub scores: Vec<(Rect, f32)>,
    pub fail_on: Option<Rect>,
}

impl Scorer for TableScorer {
    fn score(&self, rect: Rect, _frame: &Frame) -> Result<f32, CollaboratorError> {
        if self.fail_on == Some(rect) {
            return Err(format!("no score for {rect:?}").into());
        }
        Ok(self
            .scores
            .iter()
            .find(|(r, _)| *r == rect)
            .map_or(0.0, |&(_, p)| p))
    }
}

/// Intersection over union of two rectangles.
pub fn iou(a: &Rect, b: &Rect) -> f32 {
    let inter = a.intersection(b).map_or(0, |r| r.area()) as f32;
    let union = (a.area() + b.area()) as f32 - inter;
    if union <= 0.0 { 0.0 } else { inter / union }
}

pub fn flat_frame(width: u32, height: u32) -> Frame {
    Frame::new(RgbImage::from_pixel(width, height, Rgb([100, 100, 100]))).unwrap()
}

/// Solid squares of the given colours on a grey background.
pub fn blocks_frame(width: u32, height: u32, blocks: &[(Rect, [u8; 3])]) -> Frame {
    let image = RgbImage::from_fn(width, height, |x, y| {
        let point = Point2::new(x as f32, y as f32);
        blocks
            .iter()
            .find(|(rect, _)| rect.contains_point(point))
            .map_or(Rgb([128, 128, 128]), |(_, colour)| Rgb(*colour))
    });
    Frame::new(image).unwrap()
}
