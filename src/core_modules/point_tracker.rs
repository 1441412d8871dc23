// THEORY:
// The `point_tracker` follows sparse feature points from one frame to the next. The
// engine only depends on the `PointTracker` trait: one output per input point, in
// the same order, each with a success flag.
//
// `LucasKanadeTracker` is the built-in implementation: pyramidal, forward-additive
// Lucas-Kanade on the luma planes.
// 1.  Both frames are turned into Gaussian pyramids.
// 2.  Each point is solved coarse-to-fine. At every level a Gauss-Newton loop warps
//     a (2·half_window + 1)² patch of the current frame onto the template patch
//     of the previous frame and updates the displacement. The displacement is doubled
//     when moving one level finer.
// 3.  A point is lost when its structure tensor is singular, when the template has
//     too little texture (`min_eigenvalue`), or when the final position leaves the
//     frame.

use serde::{Deserialize, Serialize};

use crate::core_modules::frame::Frame;
use crate::core_modules::geometry::Point2;
use crate::core_modules::plane::{Plane, Pyramid};
use crate::error::CollaboratorError;

/// Smallest pyramid level side the tracker will build.
const MIN_LEVEL_SIDE: usize = 8;

/// Outcome for one tracked point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedPoint {
    pub point: Point2,
    pub found: bool,
}

/// Sparse point tracking between two consecutive frames.
pub trait PointTracker: Send + Sync {
    /// Returns exactly one result per input point, in input order.
    fn track(
        &self,
        previous: &Frame,
        current: &Frame,
        points: &[Point2],
    ) -> Result<Vec<TrackedPoint>, CollaboratorError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LucasKanadeConfig {
    /// Patch half-size; the patch is (2 * half_window + 1)².
    pub half_window: usize,
    pub pyramid_levels: usize,
    /// Gauss-Newton iterations per level.
    pub max_iterations: usize,
    /// Convergence threshold on the update, in pixels.
    pub epsilon: f32,
    /// Minimum eigenvalue of the mean per-pixel structure tensor, on a [0, 1] intensity scale.
    pub min_eigenvalue: f32,
}

impl Default for LucasKanadeConfig {
    fn default() -> Self {
        Self {
            half_window: 15,
            pyramid_levels: 3,
            max_iterations: 20,
            epsilon: 0.03,
            min_eigenvalue: 1e-6,
        }
    }
}

enum Refinement {
    Converged(f32, f32),
    Singular,
}

/// Pyramidal forward-additive Lucas-Kanade tracker.
#[derive(Debug, Clone, Copy, Default)]
pub struct LucasKanadeTracker {
    config: LucasKanadeConfig,
}

impl LucasKanadeTracker {
    pub fn new(config: LucasKanadeConfig) -> Self {
        Self { config }
    }

    fn track_point(&self, previous: &Pyramid, current: &Pyramid, point: Point2) -> TrackedPoint {
        let levels = self
            .config
            .pyramid_levels
            .max(1)
            .min(previous.num_levels())
            .min(current.num_levels());
        let lost = TrackedPoint {
            point,
            found: false,
        };

        let (mut dx, mut dy) = (0.0f32, 0.0f32);
        for level in (0..levels).rev() {
            let scale = 1.0 / (1u32 << level) as f32;
            let (fx, fy) = (point.x * scale, point.y * scale);
            let (prev, curr) = (&previous.levels[level], &current.levels[level]);

            if level == 0 && !self.is_textured(prev, fx, fy) {
                return lost;
            }
            match self.refine(prev, curr, fx, fy, dx, dy) {
                Refinement::Converged(ndx, ndy) => {
                    dx = ndx;
                    dy = ndy;
                }
                Refinement::Singular => return lost,
            }
            if level > 0 {
                dx *= 2.0;
                dy *= 2.0;
            }
        }

        let moved = Point2::new(point.x + dx, point.y + dy);
        let base = &current.levels[0];
        let inside = moved.x >= 0.0
            && moved.y >= 0.0
            && moved.x < base.width() as f32
            && moved.y < base.height() as f32;
        TrackedPoint {
            point: moved,
            found: inside && dx.is_finite() && dy.is_finite(),
        }
    }

    /// Mean per-pixel minimum eigenvalue of the template's structure tensor.
    fn is_textured(&self, prev: &Plane, fx: f32, fy: f32) -> bool {
        let half = self.config.half_window as isize;
        let (mut a, mut b, mut c) = (0.0f32, 0.0f32, 0.0f32);
        for py in -half..=half {
            for px in -half..=half {
                let (x, y) = (fx + px as f32, fy + py as f32);
                let gx = 0.5 * (prev.bilinear(x + 1.0, y) - prev.bilinear(x - 1.0, y)) / 255.0;
                let gy = 0.5 * (prev.bilinear(x, y + 1.0) - prev.bilinear(x, y - 1.0)) / 255.0;
                a += gx * gx;
                b += gx * gy;
                c += gy * gy;
            }
        }
        let n = ((2 * half + 1) * (2 * half + 1)) as f32;
        let (a, b, c) = (a / n, b / n, c / n);
        let lambda_min = 0.5 * (a + c) - (0.25 * (a - c) * (a - c) + b * b).sqrt();
        lambda_min >= self.config.min_eigenvalue
    }

    /// Gauss-Newton refinement of the displacement at one pyramid level.
    fn refine(&self, prev: &Plane, curr: &Plane, fx: f32, fy: f32, mut dx: f32, mut dy: f32) -> Refinement {
        let half = self.config.half_window as isize;
        let offsets: Vec<(f32, f32)> = (-half..=half)
            .flat_map(|py| (-half..=half).map(move |px| (px as f32, py as f32)))
            .collect();
        let template: Vec<f32> = offsets
            .iter()
            .map(|&(px, py)| prev.bilinear(fx + px, fy + py))
            .collect();

        for _ in 0..self.config.max_iterations {
            let (mut h00, mut h01, mut h11, mut b0, mut b1) = (0.0f32, 0.0f32, 0.0f32, 0.0f32, 0.0f32);
            for (&(px, py), &t) in offsets.iter().zip(&template) {
                let (wx, wy) = (fx + dx + px, fy + dy + py);
                let e = t - curr.bilinear(wx, wy);
                let gx = 0.5 * (curr.bilinear(wx + 1.0, wy) - curr.bilinear(wx - 1.0, wy));
                let gy = 0.5 * (curr.bilinear(wx, wy + 1.0) - curr.bilinear(wx, wy - 1.0));
                h00 += gx * gx;
                h01 += gx * gy;
                h11 += gy * gy;
                b0 += gx * e;
                b1 += gy * e;
            }

            let det = h00 * h11 - h01 * h01;
            if det.abs() < 1e-6 {
                return Refinement::Singular;
            }
            let step_x = (h11 * b0 - h01 * b1) / det;
            let step_y = (h00 * b1 - h01 * b0) / det;
            dx += step_x;
            dy += step_y;
            if step_x * step_x + step_y * step_y < self.config.epsilon * self.config.epsilon {
                break;
            }
        }
        Refinement::Converged(dx, dy)
    }
}

impl PointTracker for LucasKanadeTracker {
    fn track(
        &self,
        previous: &Frame,
        current: &Frame,
        points: &[Point2],
    ) -> Result<Vec<TrackedPoint>, CollaboratorError> {
        if previous.width() != current.width() || previous.height() != current.height() {
            return Err(format!(
                "frame size changed from {}x{} to {}x{}",
                previous.width(),
                previous.height(),
                current.width(),
                current.height()
            )
            .into());
        }
        if points.is_empty() {
            return Ok(Vec::new());
        }
        let levels = self.config.pyramid_levels.max(1);
        let previous = Pyramid::build(&previous.luma(), levels, MIN_LEVEL_SIDE);
        let current = Pyramid::build(&current.luma(), levels, MIN_LEVEL_SIDE);
        Ok(points
            .iter()
            .map(|&p| self.track_point(&previous, &current, p))
            .collect())
    }
}
