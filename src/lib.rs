// THEORY:
// This file is the main entry point for the `nest_vision` library crate: a
// region-proposal and multi-object tracking engine.
//
// A still image goes through selective search (segment, build the region hierarchy,
// enumerate region boxes), every proposal is scored by an external classifier, and a
// greedy non-maximum suppression keeps the best non-conflicting boxes. For video,
// detections are carried from frame to frame by point tracking, and only the parts of
// the frame they leave uncovered are searched again.
//
// The public API is the `pipeline` module (`DetectionPipeline`, `PipelineConfig`,
// `FrameReport`) plus the `parallel_pipeline` for concurrent scoring. The algorithmic
// layers live in `core_modules`; the collaborator traits (`Scorer`, `Segmenter`,
// `PointTracker`) are re-exported here so callers can plug in their own.

pub mod core_modules;
pub mod error;
pub mod parallel_pipeline;
pub mod pipeline;

pub use core_modules::aggregator::{Detection, DetectionAggregator};
pub use core_modules::features::{CornerSelector, FeatureConfig};
pub use core_modules::frame::{Frame, HsvImage};
pub use core_modules::geometry::{InputSize, Point2, Rect, SizeWindow};
pub use core_modules::merge_scheduler::SelectiveSearchConfig;
pub use core_modules::point_tracker::{
    LucasKanadeConfig, LucasKanadeTracker, PointTracker, TrackedPoint,
};
pub use core_modules::proposal::{
    ProposalStats, ProposalStrategy, Proposer, SelectiveSearch, SlidingWindow, StrategyKind,
};
pub use core_modules::scorer::{FnScorer, Scorer};
pub use core_modules::segmenter::{GraphSegmenter, Segmentation, SegmentationParams, Segmenter};
pub use error::{CollaboratorError, Error, Result};
pub use parallel_pipeline::ParallelPipeline;
pub use pipeline::{DetectionPipeline, FrameContext, FrameReport, PipelineConfig};
