//! The classifier seam: anything that maps a rectangle of a frame to a probability.

use crate::core_modules::frame::Frame;
use crate::core_modules::geometry::Rect;
use crate::error::{CollaboratorError, Error, Result};

/// Scores one rectangle of a frame. Must be deterministic for identical inputs.
pub trait Scorer: Send + Sync {
    fn score(&self, rect: Rect, frame: &Frame) -> std::result::Result<f32, CollaboratorError>;
}

/// Adapts a plain closure into a `Scorer`.
pub struct FnScorer<F> {
    f: F,
}

impl<F> FnScorer<F>
where
    F: Fn(Rect, &Frame) -> f32 + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> Scorer for FnScorer<F>
where
    F: Fn(Rect, &Frame) -> f32 + Send + Sync,
{
    fn score(&self, rect: Rect, frame: &Frame) -> std::result::Result<f32, CollaboratorError> {
        Ok((self.f)(rect, frame))
    }
}

/// Calls the scorer and checks that it returned a probability.
pub fn checked_score(scorer: &dyn Scorer, rect: Rect, frame: &Frame) -> Result<f32> {
    let probability = scorer
        .score(rect, frame)
        .map_err(|source| Error::Scorer { rect, source })?;
    if !(0.0..=1.0).contains(&probability) {
        return Err(Error::ProbabilityOutOfRange { rect, probability });
    }
    Ok(probability)
}
