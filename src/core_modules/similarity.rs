// THEORY:
// The similarity engine decides which pair of adjacent regions selective search
// merges next. It scores a pair with three cheap terms, each in [0, 1]:
//
// - colour: histogram intersection, high when the two regions look alike;
// - size:   1 - (|a| + |b|) / image area, high while both regions are small, so
//           small regions are absorbed before large ones grow further;
// - fill:   1 - (|bbox(a ∪ b)| - |a| - |b|) / image area, high when the two regions
//           fit snugly into their joint bounding box.
//
// The total lies in [0, 3]. All inputs are read from the regions themselves (the
// pixel counts are stored on every region), so scoring a pair is O(bins).

use crate::core_modules::region::Region;

/// The three similarity terms of one region pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Similarity {
    pub color: f32,
    pub size: f32,
    pub fill: f32,
}

impl Similarity {
    pub fn between(a: &Region, b: &Region, image_area: f64) -> Self {
        let combined = (a.pixel_count + b.pixel_count) as f64;
        let bbox = a.bounds.union(&b.bounds).area() as f64;
        Self {
            color: a.histogram.intersection(&b.histogram),
            size: (1.0 - combined / image_area) as f32,
            fill: (1.0 - (bbox - combined) / image_area) as f32,
        }
    }

    pub fn total(&self) -> f32 {
        self.color + self.size + self.fill
    }
}

/// Combined similarity score of two regions, in roughly [0, 3].
pub fn similarity(a: &Region, b: &Region, image_area: f64) -> f32 {
    Similarity::between(a, b, image_area).total()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::geometry::Rect;
    use crate::core_modules::histogram::ColorHistogram;
    use crate::core_modules::region::RegionKind;

    fn region(id: usize, bounds: Rect, colour: [u8; 3]) -> Region {
        let pixels: Vec<(u32, u32)> = (bounds.y..bounds.bottom())
            .flat_map(|y| (bounds.x..bounds.right()).map(move |x| (x as u32, y as u32)))
            .collect();
        let mut histogram = ColorHistogram::new(25);
        pixels.iter().for_each(|_| histogram.add_sample(colour));
        histogram.normalize();
        Region {
            id,
            bounds,
            histogram,
            pixel_count: pixels.len() as u64,
            kind: RegionKind::Leaf { pixels },
        }
    }

    #[test]
    fn similarity_is_symmetric() {
        let a = region(0, Rect::new(0, 0, 10, 10), [20, 100, 100]);
        let b = region(1, Rect::new(10, 0, 5, 20), [22, 180, 40]);
        let area = 1000.0;
        assert_eq!(similarity(&a, &b, area), similarity(&b, &a, area));
    }

    #[test]
    fn identical_small_neighbours_score_near_maximum() {
        let a = region(0, Rect::new(0, 0, 4, 4), [50, 50, 50]);
        let b = region(1, Rect::new(4, 0, 4, 4), [50, 50, 50]);
        let breakdown = Similarity::between(&a, &b, 10_000.0);

        assert!((breakdown.color - 1.0).abs() < 1e-5);
        assert!(breakdown.size > 0.99);
        assert!((breakdown.fill - 1.0).abs() < 1e-6);
        assert!(breakdown.total() > 2.99);
    }

    #[test]
    fn loose_bounding_box_lowers_fill() {
        let a = region(0, Rect::new(0, 0, 2, 2), [50, 50, 50]);
        let b = region(1, Rect::new(8, 8, 2, 2), [50, 50, 50]);
        let breakdown = Similarity::between(&a, &b, 100.0);
        // joint box is 10x10 = 100, covered pixels 8
        assert!((breakdown.fill - (1.0 - 92.0 / 100.0)).abs() < 1e-6);
    }
}
