// THEORY:
// The `segmenter` module seeds selective search with its leaf regions. It turns an
// image into a per-pixel label map in which each label is a small, colour-coherent
// component. The rest of the engine only depends on the `Segmenter` trait, so any
// over-segmentation primitive can be plugged in; `GraphSegmenter` is the built-in
// one.
//
// `GraphSegmenter` is the classic graph-based segmentation of Felzenszwalb and
// Huttenlocher:
// 1.  **Smoothing**: each channel is blurred with a Gaussian of width `sigma` to
//     suppress sensor noise and JPEG artefacts.
// 2.  **Grid graph**: every pixel is connected to its 8 neighbours; the edge weight
//     is the Euclidean distance between the two smoothed colour samples.
// 3.  **Kruskal-order merging**: edges are visited in increasing weight. Two
//     components are joined when the edge is no heavier than either component's
//     internal difference plus `k / |C|`. Large `k` favours larger components.
// 4.  **Cleanup**: components smaller than `min_size` are absorbed by a neighbour.

use serde::{Deserialize, Serialize};

use crate::core_modules::frame::HsvImage;
use crate::error::CollaboratorError;

/// Parameters of the pixel-level segmentation that seeds the leaf regions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationParams {
    /// Gaussian smoothing applied before segmentation.
    pub sigma: f32,
    /// Scale parameter; larger values produce larger components.
    pub k: f32,
    /// Components smaller than this many pixels are merged away.
    pub min_size: usize,
}

impl Default for SegmentationParams {
    fn default() -> Self {
        Self {
            sigma: 0.8,
            k: 200.0,
            min_size: 200,
        }
    }
}

/// A per-pixel label map with compact labels `0..component_count`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segmentation {
    pub width: usize,
    pub height: usize,
    pub labels: Vec<u32>,
    pub component_count: usize,
}

/// Pixel-level over-segmentation primitive.
pub trait Segmenter: Send + Sync {
    fn segment(
        &self,
        image: &HsvImage,
        params: &SegmentationParams,
    ) -> Result<Segmentation, CollaboratorError>;
}

/// Disjoint-set forest with union by rank, tracking component sizes and the
/// adaptive merge threshold of each component root.
struct Universe {
    parent: Vec<usize>,
    rank: Vec<u8>,
    size: Vec<usize>,
}

impl Universe {
    fn new(count: usize) -> Self {
        Self {
            parent: (0..count).collect(),
            rank: vec![0; count],
            size: vec![1; count],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        while self.parent[x] != root {
            let next = self.parent[x];
            self.parent[x] = root;
            x = next;
        }
        root
    }

    /// Joins two roots and returns the surviving root.
    fn join(&mut self, a: usize, b: usize) -> usize {
        let (root, child) = if self.rank[a] >= self.rank[b] {
            (a, b)
        } else {
            (b, a)
        };
        self.parent[child] = root;
        self.size[root] += self.size[child];
        if self.rank[a] == self.rank[b] {
            self.rank[root] += 1;
        }
        root
    }

    fn size(&self, root: usize) -> usize {
        self.size[root]
    }
}

struct Edge {
    a: usize,
    b: usize,
    weight: f32,
}

/// Felzenszwalb-Huttenlocher graph-based segmentation.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphSegmenter;

impl GraphSegmenter {
    pub fn new() -> Self {
        Self
    }

    fn build_edges(image: &HsvImage, sigma: f32) -> Vec<Edge> {
        let [c0, c1, c2] = image.channel_planes().map(|plane| plane.gaussian_blur(sigma));
        let (width, height) = (image.width, image.height);
        let distance = |x0: usize, y0: usize, x1: usize, y1: usize| -> f32 {
            let d0 = c0.get(x0, y0) - c0.get(x1, y1);
            let d1 = c1.get(x0, y0) - c1.get(x1, y1);
            let d2 = c2.get(x0, y0) - c2.get(x1, y1);
            (d0 * d0 + d1 * d1 + d2 * d2).sqrt()
        };

        let mut edges = Vec::with_capacity(width * height * 4);
        for y in 0..height {
            for x in 0..width {
                let index = y * width + x;
                let mut push = |nx: usize, ny: usize| {
                    edges.push(Edge {
                        a: index,
                        b: ny * width + nx,
                        weight: distance(x, y, nx, ny),
                    });
                };
                if x + 1 < width {
                    push(x + 1, y);
                }
                if y + 1 < height {
                    push(x, y + 1);
                }
                if x + 1 < width && y + 1 < height {
                    push(x + 1, y + 1);
                }
                if x + 1 < width && y > 0 {
                    push(x + 1, y - 1);
                }
            }
        }
        edges
    }
}

impl Segmenter for GraphSegmenter {
    fn segment(
        &self,
        image: &HsvImage,
        params: &SegmentationParams,
    ) -> Result<Segmentation, CollaboratorError> {
        let pixel_count = image.width * image.height;
        if pixel_count == 0 || image.samples.len() != pixel_count {
            return Err(format!(
                "cannot segment a {}x{} image with {} samples",
                image.width,
                image.height,
                image.samples.len()
            )
            .into());
        }

        let mut edges = Self::build_edges(image, params.sigma);
        edges.sort_by(|a, b| a.weight.total_cmp(&b.weight));

        let mut universe = Universe::new(pixel_count);
        let mut threshold = vec![params.k; pixel_count];
        for edge in &edges {
            let a = universe.find(edge.a);
            let b = universe.find(edge.b);
            if a != b && edge.weight <= threshold[a] && edge.weight <= threshold[b] {
                let root = universe.join(a, b);
                threshold[root] = edge.weight + params.k / universe.size(root) as f32;
            }
        }

        for edge in &edges {
            let a = universe.find(edge.a);
            let b = universe.find(edge.b);
            if a != b && (universe.size(a) < params.min_size || universe.size(b) < params.min_size)
            {
                universe.join(a, b);
            }
        }

        let mut compact = vec![u32::MAX; pixel_count];
        let mut next_label = 0u32;
        let mut labels = Vec::with_capacity(pixel_count);
        for index in 0..pixel_count {
            let root = universe.find(index);
            if compact[root] == u32::MAX {
                compact[root] = next_label;
                next_label += 1;
            }
            labels.push(compact[root]);
        }

        Ok(Segmentation {
            width: image.width,
            height: image.height,
            labels,
            component_count: next_label as usize,
        })
    }
}
