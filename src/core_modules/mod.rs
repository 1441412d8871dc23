// Pixel-level building blocks.
pub mod frame;
pub mod geometry;
pub mod histogram;
pub mod pixel;
pub mod plane;

// Selective search.
pub mod merge_scheduler;
pub mod proposal;
pub mod region;
pub mod segmenter;
pub mod similarity;

// Scoring, aggregation and tracking.
pub mod aggregator;
pub mod features;
pub mod point_tracker;
pub mod scorer;
pub mod tracker;
