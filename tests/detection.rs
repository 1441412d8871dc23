mod common;

use std::sync::Arc;

use common::{blocks_frame, iou};
use nest_vision::core_modules::proposal::ProposalStrategy;
use nest_vision::{
    DetectionAggregator, DetectionPipeline, Error, FnScorer, Frame, GraphSegmenter,
    PipelineConfig, Proposer, Rect, StrategyKind,
};

const RED: Rect = Rect::new(40, 40, 80, 80);
const BLUE: Rect = Rect::new(180, 60, 70, 70);

fn scene() -> Frame {
    blocks_frame(300, 200, &[(RED, [220, 20, 20]), (BLUE, [20, 40, 220])])
}

#[test]
fn selective_search_proposes_the_coloured_blocks() {
    let config = PipelineConfig::default();
    let frame = scene();
    let mut proposer = Proposer::new(
        config.strategy,
        Arc::new(GraphSegmenter::new()),
        config.segmentation,
        config.selective_search,
        config.size_window,
    );
    proposer.initialize(&frame).unwrap();
    let proposals: Vec<Rect> = proposer.by_ref().collect();

    assert!(proposals.iter().any(|p| iou(p, &RED) > 0.9), "{proposals:?}");
    assert!(proposals.iter().any(|p| iou(p, &BLUE) > 0.9), "{proposals:?}");
    assert!(proposals.iter().all(|p| config.size_window.admits(p)));

    let stats = proposer.stats().unwrap();
    assert!(stats.leaves >= 3);
    assert_eq!(stats.regions, stats.leaves + stats.merges);
    assert_eq!(proposer.next(), None);
}

#[test]
fn detect_keeps_the_best_box_per_object() {
    let config = PipelineConfig {
        min_probability: 0.5,
        ..PipelineConfig::default()
    };
    let scorer = FnScorer::new(|rect: Rect, _: &Frame| iou(&rect, &RED));
    let pipeline = DetectionPipeline::new(config, Arc::new(scorer)).unwrap();

    let detections = pipeline.detect(&scene()).unwrap();
    assert_eq!(detections.len(), 1, "{detections:?}");
    assert!(iou(&detections[0].rect, &RED) > 0.9);
    assert!(detections[0].probability > 0.9);
}

#[test]
fn sliding_window_strategy_scans_the_whole_frame() {
    let config = PipelineConfig {
        strategy: StrategyKind::SlidingWindow {
            window: 80,
            stride: 20,
        },
        ..PipelineConfig::default()
    };
    let scorer = FnScorer::new(|rect: Rect, _: &Frame| iou(&rect, &RED));
    let pipeline = DetectionPipeline::new(config, Arc::new(scorer)).unwrap();

    let detections = pipeline.detect(&scene()).unwrap();
    // The window grid hits the red block exactly at (40, 40).
    assert!(detections.iter().any(|d| d.rect == RED && d.probability == 1.0));
    for (i, a) in detections.iter().enumerate() {
        for b in &detections[i + 1..] {
            assert!(!a.rect.overlaps(&b.rect));
        }
    }
}

#[test]
fn aggregation_scenario_from_presentation_order() {
    let mut aggregator = DetectionAggregator::new();
    aggregator.consider(Rect::new(0, 0, 100, 100), 0.9);
    aggregator.consider(Rect::new(50, 50, 100, 100), 0.6);
    aggregator.consider(Rect::new(200, 200, 50, 50), 0.95);

    let accepted: Vec<(Rect, f32)> = aggregator
        .detections()
        .iter()
        .map(|d| (d.rect, d.probability))
        .collect();
    assert_eq!(
        accepted,
        vec![
            (Rect::new(0, 0, 100, 100), 0.9),
            (Rect::new(200, 200, 50, 50), 0.95),
        ]
    );
}

#[test]
fn scorer_output_is_validated() {
    let pipeline = DetectionPipeline::new(
        PipelineConfig::default(),
        Arc::new(FnScorer::new(|_: Rect, _: &Frame| 2.0)),
    )
    .unwrap();
    assert!(matches!(
        pipeline.detect(&scene()),
        Err(Error::ProbabilityOutOfRange { probability, .. }) if probability == 2.0
    ));
}

#[test]
fn invalid_configuration_is_rejected_up_front() {
    let mut config = PipelineConfig::default();
    config.size_window.min_width = 0;
    let result = DetectionPipeline::new(config, Arc::new(FnScorer::new(|_: Rect, _: &Frame| 0.5)));
    assert!(matches!(result, Err(Error::InvalidInput(_))));
}
