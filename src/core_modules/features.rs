// THEORY:
// `features` picks the points the tracker follows. A detection is tracked through a
// single good corner inside its box: a pixel whose local gradient structure is strong
// in two directions, so its motion is well defined (the aperture problem rules out
// points on straight edges and flat patches).
//
// The response of a pixel is the smaller eigenvalue of its structure tensor
// (Shi-Tomasi), accumulated over a `block_size` × `block_size` window:
//
//     M = Σ [ Ix²  IxIy ] = [ a b ]      λmin = det(M) / λmax
//           [ IxIy Iy²  ]   [ b c ]
//
// Candidates must be 3×3 local maxima, reach `quality_level` × the best response in
// the box, and keep `min_distance` from every stronger corner already chosen.

use serde::{Deserialize, Serialize};

use crate::core_modules::geometry::{Point2, Rect};
use crate::core_modules::plane::Plane;

/// Responses at or below this are treated as flat texture.
const MIN_RESPONSE: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Fraction of the best response a corner must reach.
    pub quality_level: f32,
    /// Side of the structure-tensor window.
    pub block_size: usize,
    /// Minimum spacing between returned corners.
    pub min_distance: f32,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            quality_level: 0.3,
            block_size: 7,
            min_distance: 7.0,
        }
    }
}

/// Shi-Tomasi corner selection restricted to a rectangle.
#[derive(Debug, Clone, Copy, Default)]
pub struct CornerSelector {
    config: FeatureConfig,
}

impl CornerSelector {
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    /// The strongest corner inside `rect`, in frame coordinates.
    pub fn select(&self, luma: &Plane, rect: &Rect) -> Option<Point2> {
        self.corners(luma, rect, 1).into_iter().next()
    }

    /// Up to `max_corners` corners inside `rect`, strongest first.
    pub fn corners(&self, luma: &Plane, rect: &Rect, max_corners: usize) -> Vec<Point2> {
        let Some(area) = rect.intersection(&Rect::new(
            0,
            0,
            luma.width() as i32,
            luma.height() as i32,
        )) else {
            return Vec::new();
        };

        let response = self.response(luma, &area);
        let best = response.iter().fold(0.0f32, |m, &r| m.max(r));
        if best <= MIN_RESPONSE {
            return Vec::new();
        }
        let threshold = (best * self.config.quality_level).max(MIN_RESPONSE);

        let (w, h) = (area.width as usize, area.height as usize);
        let at = |x: isize, y: isize| -> f32 {
            if x < 0 || y < 0 || x >= w as isize || y >= h as isize {
                0.0
            } else {
                response[y as usize * w + x as usize]
            }
        };

        let mut candidates: Vec<(f32, usize, usize)> = Vec::new();
        for y in 0..h {
            for x in 0..w {
                let r = response[y * w + x];
                if r < threshold {
                    continue;
                }
                let (xi, yi) = (x as isize, y as isize);
                let is_peak = (-1..=1)
                    .flat_map(|dy| (-1..=1).map(move |dx| (dx, dy)))
                    .all(|(dx, dy)| at(xi + dx, yi + dy) <= r);
                if is_peak {
                    candidates.push((r, x, y));
                }
            }
        }
        candidates.sort_by(|a, b| b.0.total_cmp(&a.0));

        let min_distance_sq = self.config.min_distance * self.config.min_distance;
        let mut chosen: Vec<Point2> = Vec::new();
        for (_, x, y) in candidates {
            if chosen.len() >= max_corners {
                break;
            }
            let point = Point2::new((area.x + x as i32) as f32, (area.y + y as i32) as f32);
            let crowded = chosen.iter().any(|c| {
                let (dx, dy) = c.displacement_to(point);
                dx * dx + dy * dy < min_distance_sq
            });
            if !crowded {
                chosen.push(point);
            }
        }
        chosen
    }

    /// Min-eigenvalue response for every pixel of `area` (row-major over `area`).
    fn response(&self, luma: &Plane, area: &Rect) -> Vec<f32> {
        let radius = (self.config.block_size.max(1) / 2) as isize;
        let (w, h) = (area.width as usize, area.height as usize);
        let pad = radius + 1;

        // Gradient products over the area plus a margin, border-replicated.
        let (pw, ph) = (w + 2 * pad as usize, h + 2 * pad as usize);
        let sample = |x: usize, y: usize| {
            luma.get_clamped(area.x as isize + x as isize - pad, area.y as isize + y as isize - pad)
        };
        let patch = Plane::from_fn(pw, ph, sample);
        let (gx, gy) = patch.gradients();
        let xx = Plane::from_fn(pw, ph, |x, y| gx.get(x, y) * gx.get(x, y));
        let yy = Plane::from_fn(pw, ph, |x, y| gy.get(x, y) * gy.get(x, y));
        let xy = Plane::from_fn(pw, ph, |x, y| gx.get(x, y) * gy.get(x, y));

        let mut response = Vec::with_capacity(w * h);
        for y in 0..h {
            for x in 0..w {
                let (cx, cy) = (x as isize + pad, y as isize + pad);
                let (mut a, mut b, mut c) = (0.0f32, 0.0f32, 0.0f32);
                for dy in -radius..=radius {
                    for dx in -radius..=radius {
                        let (sx, sy) = ((cx + dx) as usize, (cy + dy) as usize);
                        a += xx.get(sx, sy);
                        b += xy.get(sx, sy);
                        c += yy.get(sx, sy);
                    }
                }
                // λmin = det / λmax, exact zero on ideal edges.
                let lambda_max = 0.5 * (a + c) + (0.25 * (a - c) * (a - c) + b * b).sqrt();
                let lambda_min = if lambda_max > 0.0 {
                    (a * c - b * b) / lambda_max
                } else {
                    0.0
                };
                response.push(lambda_min);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Dark background with one bright square whose corners are the only features.
    fn square(size: usize, left: usize, top: usize, side: usize) -> Plane {
        Plane::from_fn(size, size, |x, y| {
            if x >= left && x < left + side && y >= top && y < top + side {
                200.0
            } else {
                20.0
            }
        })
    }

    #[test]
    fn flat_region_has_no_corner() {
        let plane = Plane::from_fn(40, 40, |_, _| 90.0);
        let selector = CornerSelector::default();
        assert_eq!(selector.select(&plane, &Rect::new(5, 5, 30, 30)), None);
    }

    #[test]
    fn straight_edge_has_no_corner() {
        let plane = Plane::from_fn(40, 40, |x, _| if x < 20 { 10.0 } else { 220.0 });
        let selector = CornerSelector::default();
        assert_eq!(selector.select(&plane, &Rect::new(5, 5, 30, 30)), None);
    }

    #[test]
    fn corner_is_found_near_square_vertex() {
        let plane = square(60, 20, 20, 20);
        let selector = CornerSelector::default();
        let corner = selector.select(&plane, &Rect::new(10, 10, 40, 40)).unwrap();

        let vertices = [(20.0, 20.0), (39.0, 20.0), (20.0, 39.0), (39.0, 39.0)];
        assert!(vertices
            .iter()
            .any(|&(vx, vy)| (corner.x - vx).abs() <= 3.0 && (corner.y - vy).abs() <= 3.0));
    }

    #[test]
    fn corners_are_reported_in_frame_coordinates_and_spaced() {
        let plane = square(80, 30, 30, 20);
        let selector = CornerSelector::default();
        let rect = Rect::new(20, 20, 40, 40);
        let corners = selector.corners(&plane, &rect, 4);

        assert_eq!(corners.len(), 4);
        for (i, a) in corners.iter().enumerate() {
            assert!(rect.contains_point(*a));
            for b in &corners[i + 1..] {
                let (dx, dy) = a.displacement_to(*b);
                assert!(dx * dx + dy * dy >= 49.0);
            }
        }
    }

    #[test]
    fn rect_outside_plane_yields_nothing() {
        let plane = square(30, 5, 5, 10);
        let selector = CornerSelector::default();
        assert!(selector.corners(&plane, &Rect::new(40, 40, 10, 10), 1).is_empty());
    }
}
