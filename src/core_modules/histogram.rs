//! Colour histograms over byte-packed HSV samples.

use crate::core_modules::pixel::pixel::{HUE_RANGE, SV_RANGE};

/// Per-channel HSV histogram, L1-normalized over all `3 * bins` entries.
///
/// Layout is `[hue bins | saturation bins | value bins]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorHistogram {
    bins: usize,
    values: Vec<f32>,
}

impl ColorHistogram {
    pub fn new(bins: usize) -> Self {
        Self {
            bins,
            values: vec![0.0; bins * 3],
        }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Counts one HSV sample.
    pub fn add_sample(&mut self, hsv: [u8; 3]) {
        let bin = |value: u8, range: f32| -> usize {
            (((value as f32) * self.bins as f32 / range) as usize).min(self.bins - 1)
        };
        let (h, s, v) = (
            bin(hsv[0], HUE_RANGE),
            bin(hsv[1], SV_RANGE),
            bin(hsv[2], SV_RANGE),
        );
        self.values[h] += 1.0;
        self.values[self.bins + s] += 1.0;
        self.values[2 * self.bins + v] += 1.0;
    }

    /// Scales the histogram so its entries sum to 1. An empty histogram stays zero.
    pub fn normalize(&mut self) {
        let total: f32 = self.values.iter().sum();
        if total > 0.0 {
            self.values.iter_mut().for_each(|v| *v /= total);
        }
    }

    /// Histogram intersection: sum of bin-wise minima, in [0, 1] for normalized inputs.
    pub fn intersection(&self, other: &ColorHistogram) -> f32 {
        self.values
            .iter()
            .zip(&other.values)
            .map(|(a, b)| a.min(*b))
            .sum()
    }

    /// Pixel-count-weighted average of two normalized histograms.
    pub fn merged(a: &ColorHistogram, size_a: u64, b: &ColorHistogram, size_b: u64) -> Self {
        let total = (size_a + size_b) as f32;
        let mut merged = ColorHistogram::new(a.bins);
        if total == 0.0 {
            return merged;
        }
        for (out, (va, vb)) in merged.values.iter_mut().zip(a.values.iter().zip(&b.values)) {
            *out = (size_a as f32 * va + size_b as f32 * vb) / total;
        }
        merged
    }

    /// Drops the bin storage. A released histogram intersects to 0 with anything.
    pub fn release(&mut self) {
        self.values = Vec::new();
    }

    pub fn is_released(&self) -> bool {
        self.values.is_empty()
    }
}
