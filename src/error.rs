//! Error types for the proposal and tracking engine.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::core_modules::geometry::Rect;

/// Failure reported by an external collaborator (scorer, segmenter, point tracker).
pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while proposing, scoring or tracking regions.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to load image '{path}': {source}")]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Segmenter failed: {0}")]
    Segmenter(#[source] CollaboratorError),

    #[error("Segmentation label map has {actual} entries, expected {expected}")]
    LabelMap { expected: usize, actual: usize },

    #[error("Scorer failed for {rect:?}: {source}")]
    Scorer {
        rect: Rect,
        #[source]
        source: CollaboratorError,
    },

    #[error("Scorer returned {probability} for {rect:?}, expected a value in [0, 1]")]
    ProbabilityOutOfRange { rect: Rect, probability: f32 },

    #[error("Point tracker failed: {0}")]
    PointTracker(#[source] CollaboratorError),

    #[error("Point tracker returned {actual} results for {expected} points")]
    TrackerContract { expected: usize, actual: usize },

    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("Scoring worker failed: {0}")]
    Worker(String),
}

pub type Result<T> = std::result::Result<T, Error>;
