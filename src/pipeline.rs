// THEORY:
// The `pipeline` module is the top-level API of the proposal and tracking engine. It
// wires the layers under `core_modules` into two entry points:
//
// -   `DetectionPipeline::detect` runs one stateless pass over a still image:
//     propose → score → aggregate.
// -   `DetectionPipeline::process_frame` feeds a video frame to the `NestTracker`,
//     which moves the detections of the previous frame and only searches the margins
//     they leave uncovered.
//
// Everything one frame's processing needs (the frame, the configuration and the
// collaborators) travels through an explicit `FrameContext`, borrowed for the
// duration of that frame. No stage reaches for global state.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core_modules::aggregator::DetectionAggregator;
use crate::core_modules::features::FeatureConfig;
use crate::core_modules::merge_scheduler::SelectiveSearchConfig;
use crate::core_modules::point_tracker::{LucasKanadeConfig, LucasKanadeTracker, PointTracker};
use crate::core_modules::proposal::{ProposalStats, ProposalStrategy, Proposer, StrategyKind};
use crate::core_modules::scorer::{Scorer, checked_score};
use crate::core_modules::segmenter::{GraphSegmenter, SegmentationParams, Segmenter};
use crate::core_modules::tracker::NestTracker;
use crate::error::{Error, Result};

// Re-export key data structures for the public API.
pub use crate::core_modules::aggregator::Detection;
pub use crate::core_modules::frame::Frame;
pub use crate::core_modules::geometry::{InputSize, Point2, Rect, SizeWindow};

/// Configuration of the whole engine, nested by concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Admissible proposal and detection sizes.
    pub size_window: SizeWindow,
    /// Patch size the scorer consumes; tracked frames only rescan margins larger than it.
    pub scorer_input: InputSize,
    pub segmentation: SegmentationParams,
    pub selective_search: SelectiveSearchConfig,
    pub strategy: StrategyKind,
    pub point_tracking: LucasKanadeConfig,
    pub features: FeatureConfig,
    /// Proposals scoring below this are never offered to the aggregator.
    pub min_probability: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            size_window: SizeWindow::default(),
            scorer_input: InputSize::default(),
            segmentation: SegmentationParams::default(),
            selective_search: SelectiveSearchConfig::default(),
            strategy: StrategyKind::default(),
            point_tracking: LucasKanadeConfig::default(),
            features: FeatureConfig::default(),
            min_probability: 0.0,
        }
    }
}

impl PipelineConfig {
    /// Parses and validates a JSON configuration; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Err(Error::InvalidInput(message));
        let w = &self.size_window;
        if w.min_width <= 0 || w.min_height <= 0 {
            return invalid(format!("size window minimum must be positive, got {w:?}"));
        }
        if w.min_width > w.max_width || w.min_height > w.max_height {
            return invalid(format!("size window minimum exceeds its maximum: {w:?}"));
        }
        let input = &self.scorer_input;
        if input.width <= 0 || input.height <= 0 {
            return invalid(format!("scorer input size must be positive, got {input:?}"));
        }
        if self.selective_search.histogram_bins == 0 {
            return invalid("histogram_bins must be at least 1".to_string());
        }
        if let StrategyKind::SlidingWindow { window, stride } = self.strategy {
            if window == 0 || stride == 0 {
                return invalid(format!(
                    "sliding window needs a positive side and stride, got {window} / {stride}"
                ));
            }
        }
        let s = &self.segmentation;
        if s.sigma.is_nan() || s.sigma < 0.0 || s.k.is_nan() || s.k < 0.0 {
            return invalid(format!(
                "segmentation sigma and k must be non-negative, got {:?}",
                self.segmentation
            ));
        }
        if self.point_tracking.pyramid_levels == 0 || self.point_tracking.max_iterations == 0 {
            return invalid("point tracking needs at least one level and one iteration".to_string());
        }
        if self.features.block_size == 0 {
            return invalid("feature block_size must be at least 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.min_probability) {
            return invalid(format!(
                "min_probability must lie in [0, 1], got {}",
                self.min_probability
            ));
        }
        Ok(())
    }
}

/// Everything one frame's processing borrows.
pub struct FrameContext<'a> {
    pub frame: &'a Frame,
    pub config: &'a PipelineConfig,
    pub segmenter: &'a Arc<dyn Segmenter>,
    pub scorer: &'a dyn Scorer,
}

impl<'a> FrameContext<'a> {
    pub fn new(
        frame: &'a Frame,
        config: &'a PipelineConfig,
        segmenter: &'a Arc<dyn Segmenter>,
        scorer: &'a dyn Scorer,
    ) -> Self {
        Self {
            frame,
            config,
            segmenter,
            scorer,
        }
    }

    /// A fresh proposer configured for this frame.
    pub fn proposer(&self) -> Proposer {
        Proposer::new(
            self.config.strategy,
            Arc::clone(self.segmenter),
            self.config.segmentation,
            self.config.selective_search,
            self.config.size_window,
        )
    }

    /// Every admissible proposal inside `area`, in frame coordinates and enumeration order.
    pub fn proposals(&self, area: &Rect) -> Result<(Vec<Rect>, Option<ProposalStats>)> {
        let cropped;
        let source = if *area == self.frame.bounds() {
            self.frame
        } else {
            cropped = self.frame.crop(area)?;
            &cropped
        };
        let mut proposer = self.proposer();
        proposer.initialize(source)?;
        let proposals: Vec<Rect> = proposer
            .by_ref()
            .map(|rect| rect.offset(area.x, area.y))
            .collect();
        Ok((proposals, proposer.stats()))
    }

    /// Scores `rect` of the frame.
    pub fn score(&self, rect: Rect) -> Result<f32> {
        checked_score(self.scorer, rect, self.frame)
    }

    /// Runs a proposal pass over `area` and feeds the scored proposals to `aggregator`
    /// in enumeration order. Returns the number of accepted proposals.
    pub fn scan(&self, area: &Rect, aggregator: &mut DetectionAggregator) -> Result<usize> {
        let (proposals, _) = self.proposals(area)?;
        let mut accepted = 0;
        for &rect in &proposals {
            let probability = self.score(rect)?;
            if probability >= self.config.min_probability && aggregator.consider(rect, probability) {
                accepted += 1;
            }
        }
        debug!(?area, proposals = proposals.len(), accepted, "proposal pass finished");
        Ok(accepted)
    }

    /// One stateless detection pass over the whole frame.
    pub fn detect(&self) -> Result<Vec<Detection>> {
        let mut aggregator = DetectionAggregator::new();
        self.scan(&self.frame.bounds(), &mut aggregator)?;
        Ok(aggregator.into_detections())
    }
}

/// What the consumer receives for each processed frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameReport {
    /// Zero-based index of the frame among all frames handed to `process_frame`.
    pub frame_index: u64,
    /// Detections in aggregation order.
    pub detections: Vec<Detection>,
    /// Detections carried over by their own tracked feature point.
    pub tracked: usize,
    /// Areas searched for new detections.
    pub rescanned_margins: Vec<Rect>,
}

/// The main, top-level struct of the engine.
pub struct DetectionPipeline {
    config: PipelineConfig,
    scorer: Arc<dyn Scorer>,
    segmenter: Arc<dyn Segmenter>,
    point_tracker: Arc<dyn PointTracker>,
    tracker: NestTracker,
    frames_seen: u64,
}

impl DetectionPipeline {
    /// A pipeline with the built-in segmenter and point tracker.
    pub fn new(config: PipelineConfig, scorer: Arc<dyn Scorer>) -> Result<Self> {
        let point_tracker = Arc::new(LucasKanadeTracker::new(config.point_tracking));
        Self::with_collaborators(config, scorer, Arc::new(GraphSegmenter::new()), point_tracker)
    }

    pub fn with_collaborators(
        config: PipelineConfig,
        scorer: Arc<dyn Scorer>,
        segmenter: Arc<dyn Segmenter>,
        point_tracker: Arc<dyn PointTracker>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            scorer,
            segmenter,
            point_tracker,
            tracker: NestTracker::new(),
            frames_seen: 0,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Detections of a single image, with no tracking state involved.
    pub fn detect(&self, frame: &Frame) -> Result<Vec<Detection>> {
        FrameContext::new(frame, &self.config, &self.segmenter, self.scorer.as_ref()).detect()
    }

    /// Processes the next video frame. On error the tracked state is left as it was.
    pub fn process_frame(&mut self, frame: Frame) -> Result<FrameReport> {
        let frame_index = self.frames_seen;
        self.frames_seen += 1;

        let outcome = {
            let ctx = FrameContext::new(&frame, &self.config, &self.segmenter, self.scorer.as_ref());
            self.tracker.advance(&ctx, self.point_tracker.as_ref())?
        };
        self.tracker.commit(frame, outcome.detections.clone());

        info!(
            frame_index,
            detections = outcome.detections.len(),
            tracked = outcome.tracked,
            margins = outcome.rescanned.len(),
            "frame processed"
        );
        Ok(FrameReport {
            frame_index,
            detections: outcome.detections,
            tracked: outcome.tracked,
            rescanned_margins: outcome.rescanned,
        })
    }

    /// Detections currently carried by the tracker.
    pub fn tracked_detections(&self) -> &[Detection] {
        self.tracker.detections()
    }

    /// Forgets all tracked state; the next frame is treated as the first.
    pub fn reset(&mut self) {
        self.tracker.reset();
        self.frames_seen = 0;
    }
}
