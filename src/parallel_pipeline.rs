// THEORY:
// The `parallel_pipeline` spreads the expensive part of a detection pass, the scorer
// calls, over a pool of blocking tokio tasks, without changing the result.
//
// Key architectural principles:
// 1.  **Enumerate once, in order**: proposals are produced on the caller's task by
//     the same `FrameContext` the sequential pipeline uses.
// 2.  **Score in batches**: the proposal list is cut into contiguous batches (one per
//     CPU by default); each batch is scored on `spawn_blocking`, since scorers are
//     synchronous and CPU-bound.
// 3.  **Aggregate in enumeration order**: batches are joined and their scores fed to
//     the aggregator in proposal order. Greedy NMS is order-dependent,
//     so this is what keeps the output identical to `DetectionPipeline::detect`.
//     An error is reported for the first failing proposal in that order.

use std::sync::Arc;

use futures::future::try_join_all;
use tracing::debug;

use crate::core_modules::aggregator::DetectionAggregator;
use crate::core_modules::scorer::{Scorer, checked_score};
use crate::core_modules::segmenter::{GraphSegmenter, Segmenter};
use crate::error::{Error, Result};
use crate::pipeline::{Detection, Frame, FrameContext, PipelineConfig};

/// Still-image detection with concurrent scoring.
pub struct ParallelPipeline {
    config: Arc<PipelineConfig>,
    scorer: Arc<dyn Scorer>,
    segmenter: Arc<dyn Segmenter>,
    batches: usize,
}

impl ParallelPipeline {
    pub fn new(config: PipelineConfig, scorer: Arc<dyn Scorer>) -> Result<Self> {
        Self::with_segmenter(config, scorer, Arc::new(GraphSegmenter::new()))
    }

    pub fn with_segmenter(
        config: PipelineConfig,
        scorer: Arc<dyn Scorer>,
        segmenter: Arc<dyn Segmenter>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            scorer,
            segmenter,
            batches: num_cpus::get().max(1),
        })
    }

    /// Overrides the number of scoring batches per frame.
    pub fn with_batches(mut self, batches: usize) -> Self {
        self.batches = batches.max(1);
        self
    }

    /// Same detections as `DetectionPipeline::detect`, with scoring run concurrently.
    pub async fn detect(&self, frame: Arc<Frame>) -> Result<Vec<Detection>> {
        let proposals = {
            let ctx = FrameContext::new(&frame, &self.config, &self.segmenter, self.scorer.as_ref());
            ctx.proposals(&frame.bounds())?.0
        };
        if proposals.is_empty() {
            return Ok(Vec::new());
        }

        let batch_len = proposals.len().div_ceil(self.batches);
        let tasks = proposals.chunks(batch_len).map(|batch| {
            let batch = batch.to_vec();
            let frame = Arc::clone(&frame);
            let scorer = Arc::clone(&self.scorer);
            tokio::task::spawn_blocking(move || {
                batch
                    .into_iter()
                    .map(|rect| checked_score(scorer.as_ref(), rect, &frame).map(|p| (rect, p)))
                    .collect::<Result<Vec<_>>>()
            })
        });
        let scored = try_join_all(tasks)
            .await
            .map_err(|e| Error::Worker(e.to_string()))?;

        let mut aggregator = DetectionAggregator::new();
        for batch in scored {
            for (rect, probability) in batch? {
                if probability >= self.config.min_probability {
                    aggregator.consider(rect, probability);
                }
            }
        }
        debug!(
            proposals = proposals.len(),
            batches = proposals.len().div_ceil(batch_len),
            detections = aggregator.detections().len(),
            "parallel detection pass finished"
        );
        Ok(aggregator.into_detections())
    }

    /// Runs a full detection pass for every frame concurrently; results follow input order.
    pub async fn detect_all(&self, frames: Vec<Frame>) -> Result<Vec<Vec<Detection>>> {
        let tasks = frames.into_iter().map(|frame| {
            let config = Arc::clone(&self.config);
            let scorer = Arc::clone(&self.scorer);
            let segmenter = Arc::clone(&self.segmenter);
            tokio::task::spawn_blocking(move || {
                FrameContext::new(&frame, &config, &segmenter, scorer.as_ref()).detect()
            })
        });
        try_join_all(tasks)
            .await
            .map_err(|e| Error::Worker(e.to_string()))?
            .into_iter()
            .collect()
    }
}
