// THEORY:
// The `tracker` module gives detections a life across video frames. Instead of
// rescanning every frame from scratch, it moves the detections it already has and only
// searches the parts of the frame they do not cover.
//
// Key architectural principles:
// 1.  **Motion from one point**: each detection follows a single feature point. The
//     point tracker reports where that point went; the detection's box is shifted by
//     the same displacement and clamped to the frame.
// 2.  **Shared motion for the rest**: detections whose point was lost, or that never
//     had one, are shifted by the average displacement of the successfully tracked
//     points (zero when there are none) and then try to re-acquire a feature.
// 3.  **Memory of confidence**: each detection is rescored on every frame, and its
//     probability is the running mean over all frames it has been observed in.
// 4.  **Dirty margins**: only the strips of the frame outside the bounding extent of
//     the surviving detections are searched for new detections. They go through the
//     normal proposal pass and are merged into the tracked set by the aggregator.
// 5.  **Atomic frames**: `advance` computes the next state without touching the
//     tracker; `commit` stores it. A collaborator failure therefore aborts the frame
//     and leaves the previous state intact.

use tracing::{debug, warn};

use crate::core_modules::aggregator::{Detection, DetectionAggregator};
use crate::core_modules::features::CornerSelector;
use crate::core_modules::frame::Frame;
use crate::core_modules::geometry::{InputSize, Point2, Rect};
use crate::core_modules::plane::Plane;
use crate::core_modules::point_tracker::PointTracker;
use crate::error::{Error, Result};
use crate::pipeline::FrameContext;

/// The next tracker state computed for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingOutcome {
    pub detections: Vec<Detection>,
    /// Detections moved by their own successfully tracked feature point.
    pub tracked: usize,
    /// Areas searched for new detections, in frame coordinates.
    pub rescanned: Vec<Rect>,
}

/// Cross-frame owner of the detection set.
#[derive(Debug, Clone, Default)]
pub struct NestTracker {
    detections: Vec<Detection>,
    previous: Option<Frame>,
}

impl NestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    /// Forgets all detections and the previous frame.
    pub fn reset(&mut self) {
        self.detections.clear();
        self.previous = None;
    }

    /// Stores the state produced by `advance` for `frame`.
    pub fn commit(&mut self, frame: Frame, detections: Vec<Detection>) {
        self.detections = detections;
        self.previous = Some(frame);
    }

    /// Computes the detections for the frame in `ctx` from the current state.
    pub fn advance(
        &self,
        ctx: &FrameContext<'_>,
        point_tracker: &dyn PointTracker,
    ) -> Result<TrackingOutcome> {
        let frame = ctx.frame;
        let previous = match &self.previous {
            Some(previous) if !self.detections.is_empty() => previous,
            _ => return Self::full_scan(ctx),
        };
        if previous.width() != frame.width() || previous.height() != frame.height() {
            warn!(
                from = ?(previous.width(), previous.height()),
                to = ?(frame.width(), frame.height()),
                "frame size changed, tracked detections discarded"
            );
            return Self::full_scan(ctx);
        }

        let bounds = frame.bounds();
        let corners = CornerSelector::new(ctx.config.features);
        let mut detections = self.detections.clone();

        // Point tracking for detections that carry a feature.
        let (indices, points): (Vec<usize>, Vec<Point2>) = detections
            .iter()
            .enumerate()
            .filter_map(|(i, d)| d.feature.map(|p| (i, p)))
            .unzip();
        let results = if points.is_empty() {
            Vec::new()
        } else {
            point_tracker
                .track(previous, frame, &points)
                .map_err(Error::PointTracker)?
        };
        if results.len() != points.len() {
            return Err(Error::TrackerContract {
                expected: points.len(),
                actual: results.len(),
            });
        }

        let mut deferred: Vec<usize> = detections
            .iter()
            .enumerate()
            .filter(|(_, d)| d.feature.is_none())
            .map(|(i, _)| i)
            .collect();
        let mut lost = Vec::new();
        let (mut sum_dx, mut sum_dy, mut tracked) = (0.0f32, 0.0f32, 0usize);
        for ((&i, &before), result) in indices.iter().zip(&points).zip(&results) {
            if !result.found {
                deferred.push(i);
                lost.push(i);
                continue;
            }
            let (dx, dy) = before.displacement_to(result.point);
            let detection = &mut detections[i];
            detection.rect = detection.rect.translate_clamped(dx, dy, &bounds);
            detection.feature = Some(result.point);
            sum_dx += dx;
            sum_dy += dy;
            tracked += 1;
        }

        // Zero tracked points means zero shared displacement.
        let (avg_dx, avg_dy) = if tracked == 0 {
            (0.0, 0.0)
        } else {
            (sum_dx / tracked as f32, sum_dy / tracked as f32)
        };
        let mut luma: Option<Plane> = None;
        let mut unrecoverable = vec![false; detections.len()];
        for &i in &deferred {
            let detection = &mut detections[i];
            detection.rect = detection.rect.translate_clamped(avg_dx, avg_dy, &bounds);
            let plane = luma.get_or_insert_with(|| frame.luma());
            detection.feature = corners.select(plane, &detection.rect);
            if detection.feature.is_none() && lost.contains(&i) {
                warn!(rect = ?detection.rect, "tracking lost and no feature to re-acquire, detection dropped");
                unrecoverable[i] = true;
            }
        }

        let window = ctx.config.size_window;
        let mut survivors = Vec::with_capacity(detections.len());
        for (detection, dropped) in detections.into_iter().zip(unrecoverable) {
            if dropped || !window.admits(&detection.rect) {
                continue;
            }
            survivors.push(detection);
        }
        for detection in &mut survivors {
            let fresh = ctx.score(detection.rect)?;
            detection.observe(fresh);
        }

        let rescanned = match extent(&survivors) {
            Some(extent) => dirty_margins(&bounds, &extent, &ctx.config.scorer_input),
            None => vec![bounds],
        };
        let mut aggregator = DetectionAggregator::from_detections(survivors);
        for margin in &rescanned {
            ctx.scan(margin, &mut aggregator)?;
        }
        let mut detections = aggregator.into_detections();
        acquire_features(&mut detections, frame, &corners, luma);

        debug!(
            tracked,
            deferred = deferred.len(),
            margins = rescanned.len(),
            detections = detections.len(),
            "tracker advanced"
        );
        Ok(TrackingOutcome {
            detections,
            tracked,
            rescanned,
        })
    }

    fn full_scan(ctx: &FrameContext<'_>) -> Result<TrackingOutcome> {
        let bounds = ctx.frame.bounds();
        let mut aggregator = DetectionAggregator::new();
        ctx.scan(&bounds, &mut aggregator)?;
        let mut detections = aggregator.into_detections();
        let corners = CornerSelector::new(ctx.config.features);
        acquire_features(&mut detections, ctx.frame, &corners, None);
        Ok(TrackingOutcome {
            detections,
            tracked: 0,
            rescanned: vec![bounds],
        })
    }
}

/// Picks a feature point for detections born on this frame.
fn acquire_features(
    detections: &mut [Detection],
    frame: &Frame,
    corners: &CornerSelector,
    luma: Option<Plane>,
) {
    let mut luma = luma;
    for detection in detections
        .iter_mut()
        .filter(|d| d.frames_observed == 1 && d.feature.is_none())
    {
        let plane = luma.get_or_insert_with(|| frame.luma());
        detection.feature = corners.select(plane, &detection.rect);
    }
}

/// Bounding extent of all detections, or `None` for an empty set.
fn extent(detections: &[Detection]) -> Option<Rect> {
    detections
        .iter()
        .map(|d| d.rect)
        .reduce(|acc, rect| acc.union(&rect))
}

/// The strips of the frame outside `extent` that are still larger than the scorer's
/// input patch: top, bottom, then left and right of the extent.
pub fn dirty_margins(bounds: &Rect, extent: &Rect, input: &InputSize) -> Vec<Rect> {
    let (width, height) = (bounds.width, bounds.height);
    let (min_x, min_y) = (extent.x, extent.y);
    let (max_x, max_y) = (extent.right(), extent.bottom());
    let band = max_y - min_y;

    let mut margins = Vec::new();
    if min_y > input.height {
        margins.push(Rect::new(0, 0, width, min_y));
    }
    if height - max_y > input.height {
        margins.push(Rect::new(0, max_y, width, height - max_y));
    }
    if band > input.height && min_x > input.width {
        margins.push(Rect::new(0, min_y, min_x, band));
    }
    if band > input.height && width - max_x > input.width {
        margins.push(Rect::new(max_x, min_y, width - max_x, band));
    }
    margins
}
