// THEORY:
// The `aggregator` resolves overlapping scored proposals into a detection set with a
// greedy, order-dependent non-maximum suppression:
//
// -   a new box is rejected if it overlaps (positive area) any current detection whose
//     probability is at least as high;
// -   otherwise every overlapping detection with a strictly lower probability is
//     evicted and the new box is accepted.
//
// Acceptance is judged against the *current* set only, so presenting the same
// proposals in a different order can produce a different result. Callers that
// parallelise scoring must still feed the aggregator in enumeration order.

use serde::Serialize;
use tracing::trace;

use crate::core_modules::geometry::{Point2, Rect};

/// A scored box that survived aggregation, plus its tracking state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub rect: Rect,
    pub probability: f32,
    /// Feature point followed by the point tracker, if one has been acquired.
    pub feature: Option<Point2>,
    /// Frames this detection has been scored in; drives the running mean.
    pub frames_observed: u32,
}

impl Detection {
    pub fn new(rect: Rect, probability: f32) -> Self {
        Self {
            rect,
            probability,
            feature: None,
            frames_observed: 1,
        }
    }

    /// Folds a fresh score into the running mean over all observed frames.
    pub fn observe(&mut self, score: f32) {
        self.frames_observed += 1;
        let runs = self.frames_observed as f32;
        self.probability = (self.probability * (runs - 1.0) + score) / runs;
    }
}

/// Greedy NMS over an ordered stream of `(rect, probability)` pairs.
#[derive(Debug, Clone, Default)]
pub struct DetectionAggregator {
    detections: Vec<Detection>,
}

impl DetectionAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing detection set (e.g. the tracked detections of a frame).
    pub fn from_detections(detections: Vec<Detection>) -> Self {
        Self { detections }
    }

    /// Offers one scored box. Returns whether it was accepted.
    pub fn consider(&mut self, rect: Rect, probability: f32) -> bool {
        let dominated = self
            .detections
            .iter()
            .any(|d| d.probability >= probability && d.rect.overlaps(&rect));
        if dominated {
            trace!(?rect, probability, "proposal rejected");
            return false;
        }

        let before = self.detections.len();
        self.detections
            .retain(|d| !(d.probability < probability && d.rect.overlaps(&rect)));
        trace!(
            ?rect,
            probability,
            evicted = before - self.detections.len(),
            "proposal accepted"
        );
        self.detections.push(Detection::new(rect, probability));
        true
    }

    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    pub fn into_detections(self) -> Vec<Detection> {
        self.detections
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rects(aggregator: &DetectionAggregator) -> Vec<Rect> {
        aggregator.detections().iter().map(|d| d.rect).collect()
    }

    #[test]
    fn lower_overlapping_proposal_is_rejected() {
        let mut aggregator = DetectionAggregator::new();
        assert!(aggregator.consider(Rect::new(0, 0, 100, 100), 0.9));
        assert!(!aggregator.consider(Rect::new(50, 50, 100, 100), 0.6));
        assert!(aggregator.consider(Rect::new(200, 200, 50, 50), 0.95));

        assert_eq!(
            rects(&aggregator),
            vec![Rect::new(0, 0, 100, 100), Rect::new(200, 200, 50, 50)]
        );
    }

    #[test]
    fn higher_proposal_evicts_overlapping_detections() {
        let mut aggregator = DetectionAggregator::new();
        aggregator.consider(Rect::new(0, 0, 60, 60), 0.5);
        aggregator.consider(Rect::new(100, 0, 60, 60), 0.4);
        aggregator.consider(Rect::new(300, 300, 60, 60), 0.3);

        assert!(aggregator.consider(Rect::new(40, 0, 80, 60), 0.8));
        assert_eq!(
            rects(&aggregator),
            vec![Rect::new(300, 300, 60, 60), Rect::new(40, 0, 80, 60)]
        );
    }

    #[test]
    fn equal_probability_keeps_the_incumbent() {
        let mut aggregator = DetectionAggregator::new();
        aggregator.consider(Rect::new(0, 0, 60, 60), 0.7);
        assert!(!aggregator.consider(Rect::new(10, 10, 60, 60), 0.7));
        assert_eq!(aggregator.detections().len(), 1);
    }

    #[test]
    fn touching_boxes_do_not_conflict() {
        let mut aggregator = DetectionAggregator::new();
        aggregator.consider(Rect::new(0, 0, 50, 50), 0.9);
        assert!(aggregator.consider(Rect::new(50, 0, 50, 50), 0.1));
    }

    #[test]
    fn result_depends_on_presentation_order() {
        // B overlaps A and C, A and C do not overlap each other.
        let a = (Rect::new(0, 0, 60, 60), 0.5);
        let b = (Rect::new(50, 0, 60, 60), 0.6);
        let c = (Rect::new(100, 0, 60, 60), 0.7);

        let mut forward = DetectionAggregator::new();
        [a, b, c].into_iter().for_each(|(r, p)| {
            forward.consider(r, p);
        });
        let mut backward = DetectionAggregator::new();
        [c, b, a].into_iter().for_each(|(r, p)| {
            backward.consider(r, p);
        });

        assert_eq!(rects(&forward), vec![c.0]);
        assert_eq!(rects(&backward), vec![c.0, a.0]);
    }

    #[test]
    fn running_mean_equals_arithmetic_mean() {
        let scores = [0.2_f32, 0.9, 0.5, 0.7, 0.1];
        let mut detection = Detection::new(Rect::new(0, 0, 60, 60), scores[0]);
        scores[1..].iter().for_each(|&s| detection.observe(s));

        let mean = scores.iter().sum::<f32>() / scores.len() as f32;
        assert!((detection.probability - mean).abs() < 1e-6);
        assert_eq!(detection.frames_observed, 5);
    }
}
