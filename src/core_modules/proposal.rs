// THEORY:
// The `proposal` module turns one image into a lazy stream of candidate rectangles
// for the scorer. Two interchangeable strategies sit behind one small interface:
//
// 1.  **SelectiveSearch**: segment → build the region registry → merge greedily →
//     walk the registry in id order (leaves first, then merge nodes in the order they
//     were created) and yield every region box the size window admits.
// 2.  **SlidingWindow**: a fixed square window stepped row-major over the image.
//
// Key architectural principles:
// -   **Explicit end of stream**: `next_proposal` returns `Option<Rect>`. A
//     zero-area rectangle is never used as a sentinel, and once a stream is
//     exhausted it keeps returning `None`.
// -   **Single pass**: a stream cannot be rewound. `reset` discards all per-image
//     state; a new `initialize` is needed before the strategy yields again.
// -   **Closed set**: the strategies are modelled as an enum (`Proposer`), so the
//     pipeline can hold "a strategy" by value without boxing.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core_modules::frame::Frame;
use crate::core_modules::geometry::{Rect, SizeWindow};
use crate::core_modules::merge_scheduler::{MergeScheduler, SelectiveSearchConfig};
use crate::core_modules::region::RegionRegistry;
use crate::core_modules::segmenter::{SegmentationParams, Segmenter};
use crate::error::{Error, Result};

/// The common interface of every proposal strategy.
pub trait ProposalStrategy {
    /// Prepares a fresh proposal stream for `frame`, discarding any previous one.
    fn initialize(&mut self, frame: &Frame) -> Result<()>;
    /// The next admissible rectangle, or `None` once the stream is exhausted.
    fn next_proposal(&mut self) -> Option<Rect>;
    /// Discards all per-image state.
    fn reset(&mut self);
}

/// Which strategy a pipeline proposes with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    SelectiveSearch,
    SlidingWindow {
        #[serde(default = "default_window")]
        window: u32,
        #[serde(default = "default_stride")]
        stride: u32,
    },
}

fn default_window() -> u32 {
    227
}

fn default_stride() -> u32 {
    8
}

impl StrategyKind {
    /// Sliding window with the default side and stride.
    pub fn sliding_window() -> Self {
        StrategyKind::SlidingWindow {
            window: default_window(),
            stride: default_stride(),
        }
    }
}

/// Bookkeeping of the last selective-search pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ProposalStats {
    pub leaves: usize,
    pub merges: usize,
    pub regions: usize,
}

/// Hierarchical-grouping proposals over a pixel segmentation.
pub struct SelectiveSearch {
    segmenter: Arc<dyn Segmenter>,
    params: SegmentationParams,
    config: SelectiveSearchConfig,
    size_window: SizeWindow,
    registry: Option<RegionRegistry>,
    cursor: usize,
    stats: Option<ProposalStats>,
}

impl SelectiveSearch {
    pub fn new(
        segmenter: Arc<dyn Segmenter>,
        params: SegmentationParams,
        config: SelectiveSearchConfig,
        size_window: SizeWindow,
    ) -> Self {
        Self {
            segmenter,
            params,
            config,
            size_window,
            registry: None,
            cursor: 0,
            stats: None,
        }
    }

    /// Counts of the most recent pass, kept after its registry has been dropped.
    pub fn stats(&self) -> Option<ProposalStats> {
        self.stats
    }
}

impl ProposalStrategy for SelectiveSearch {
    fn initialize(&mut self, frame: &Frame) -> Result<()> {
        self.reset();
        if self.config.histogram_bins == 0 {
            return Err(Error::InvalidInput(
                "histogram_bins must be at least 1".to_string(),
            ));
        }

        let hsv = frame.hsv();
        let segmentation = self
            .segmenter
            .segment(&hsv, &self.params)
            .map_err(Error::Segmenter)?;
        let mut registry =
            RegionRegistry::from_segmentation(&segmentation, &hsv, self.config.histogram_bins)?;
        let leaves = registry.leaf_count();
        let summary = MergeScheduler::new(self.config.region_cap).run(&mut registry);

        let stats = ProposalStats {
            leaves,
            merges: summary.merges,
            regions: registry.len(),
        };
        debug!(
            width = frame.width(),
            height = frame.height(),
            leaves = stats.leaves,
            merges = stats.merges,
            capped = summary.capped,
            "selective search hierarchy built"
        );
        self.stats = Some(stats);
        self.registry = Some(registry);
        Ok(())
    }

    fn next_proposal(&mut self) -> Option<Rect> {
        let registry = self.registry.as_ref()?;
        while let Some(region) = registry.region(self.cursor) {
            self.cursor += 1;
            if self.size_window.admits(&region.bounds) {
                return Some(region.bounds);
            }
        }
        // Exhausted: the registry is not needed any more.
        self.registry = None;
        None
    }

    fn reset(&mut self) {
        self.registry = None;
        self.cursor = 0;
        self.stats = None;
    }
}

/// Square windows stepped row-major over the frame, each fully inside it.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    window: u32,
    stride: u32,
    size_window: SizeWindow,
    frame_size: Option<(u32, u32)>,
    x: u32,
    y: u32,
}

impl SlidingWindow {
    pub fn new(window: u32, stride: u32, size_window: SizeWindow) -> Self {
        Self {
            window,
            stride,
            size_window,
            frame_size: None,
            x: 0,
            y: 0,
        }
    }
}

impl ProposalStrategy for SlidingWindow {
    fn initialize(&mut self, frame: &Frame) -> Result<()> {
        self.reset();
        if self.window == 0 || self.stride == 0 {
            return Err(Error::InvalidInput(format!(
                "sliding window needs a positive side and stride, got {} / {}",
                self.window, self.stride
            )));
        }
        self.frame_size = Some((frame.width(), frame.height()));
        Ok(())
    }

    fn next_proposal(&mut self) -> Option<Rect> {
        let (width, height) = self.frame_size?;
        while self.window <= width && self.y + self.window <= height {
            let rect = Rect::new(
                self.x as i32,
                self.y as i32,
                self.window as i32,
                self.window as i32,
            );
            self.x += self.stride;
            if self.x + self.window > width {
                self.x = 0;
                self.y += self.stride;
            }
            if self.size_window.admits(&rect) {
                return Some(rect);
            }
        }
        self.frame_size = None;
        None
    }

    fn reset(&mut self) {
        self.frame_size = None;
        self.x = 0;
        self.y = 0;
    }
}

/// The closed set of proposal strategies.
pub enum Proposer {
    SelectiveSearch(SelectiveSearch),
    SlidingWindow(SlidingWindow),
}

impl Proposer {
    pub fn new(
        kind: StrategyKind,
        segmenter: Arc<dyn Segmenter>,
        params: SegmentationParams,
        config: SelectiveSearchConfig,
        size_window: SizeWindow,
    ) -> Self {
        match kind {
            StrategyKind::SelectiveSearch => Proposer::SelectiveSearch(SelectiveSearch::new(
                segmenter,
                params,
                config,
                size_window,
            )),
            StrategyKind::SlidingWindow { window, stride } => {
                Proposer::SlidingWindow(SlidingWindow::new(window, stride, size_window))
            }
        }
    }

    /// Selective-search counts of the last pass; `None` for the sliding window.
    pub fn stats(&self) -> Option<ProposalStats> {
        match self {
            Proposer::SelectiveSearch(search) => search.stats(),
            Proposer::SlidingWindow(_) => None,
        }
    }
}

impl ProposalStrategy for Proposer {
    fn initialize(&mut self, frame: &Frame) -> Result<()> {
        match self {
            Proposer::SelectiveSearch(search) => search.initialize(frame),
            Proposer::SlidingWindow(window) => window.initialize(frame),
        }
    }

    fn next_proposal(&mut self) -> Option<Rect> {
        match self {
            Proposer::SelectiveSearch(search) => search.next_proposal(),
            Proposer::SlidingWindow(window) => window.next_proposal(),
        }
    }

    fn reset(&mut self) {
        match self {
            Proposer::SelectiveSearch(search) => search.reset(),
            Proposer::SlidingWindow(window) => window.reset(),
        }
    }
}

impl Iterator for Proposer {
    type Item = Rect;

    fn next(&mut self) -> Option<Rect> {
        self.next_proposal()
    }
}
