// THEORY:
// The `region` module owns the raw material of selective search: every region of one
// segmentation run, and the graph saying which of them touch.
//
// Key architectural principles:
// 1.  **Arena of regions**: regions live in a `Vec` and are addressed by their index
//     (`RegionId`). Leaves come first, in the order their label was first seen in a
//     row-major scan; every merge appends one internal node. Walking the arena in
//     order is therefore walking the hierarchy bottom-up.
// 2.  **Leaf or merge node, never both**: `RegionKind` is either the list of owned
//     pixel coordinates or the pair of child ids. The pixel count is stored on every
//     region when it is created, so size queries never recurse into the hierarchy.
// 3.  **Canonical adjacency**: the `NeighborGraph` stores each undirected edge once,
//     under the larger of its two ids. Lookups consult both directions, and removing
//     a region purges it from every set, so a consumed region can never come back as
//     somebody's neighbour.
// 4.  **Short-lived**: a registry belongs to exactly one proposal pass and is
//     dropped as soon as its proposals have been enumerated.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::core_modules::frame::HsvImage;
use crate::core_modules::geometry::Rect;
use crate::core_modules::histogram::ColorHistogram;
use crate::core_modules::segmenter::Segmentation;
use crate::error::{Error, Result};

pub type RegionId = usize;

/// Either the pixels a leaf owns or the two regions a merge node consumed.
#[derive(Debug, Clone, PartialEq)]
pub enum RegionKind {
    Leaf { pixels: Vec<(u32, u32)> },
    Merged { children: (RegionId, RegionId) },
}

/// One node of the region hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub id: RegionId,
    /// Pixel bounds; right and bottom edges are exclusive.
    pub bounds: Rect,
    /// Normalized colour histogram. Released once the region has been merged.
    pub histogram: ColorHistogram,
    /// Number of image pixels covered, fixed at creation.
    pub pixel_count: u64,
    pub kind: RegionKind,
}

impl Region {
    pub fn children(&self) -> Option<(RegionId, RegionId)> {
        match self.kind {
            RegionKind::Merged { children } => Some(children),
            RegionKind::Leaf { .. } => None,
        }
    }
}

/// Undirected adjacency stored once per edge, keyed by the larger id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NeighborGraph {
    neighbours: BTreeMap<RegionId, BTreeSet<RegionId>>,
}

impl NeighborGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_relation(&mut self, a: RegionId, b: RegionId) {
        if a == b {
            return;
        }
        let (larger, smaller) = if a > b { (a, b) } else { (b, a) };
        self.neighbours.entry(larger).or_default().insert(smaller);
    }

    /// Every region adjacent to `id`, whichever side the edge is stored on.
    pub fn neighbours_of(&self, id: RegionId) -> BTreeSet<RegionId> {
        let mut result = self.neighbours.get(&id).cloned().unwrap_or_default();
        result.extend(
            self.neighbours
                .range(id + 1..)
                .filter(|(_, set)| set.contains(&id))
                .map(|(&larger, _)| larger),
        );
        result
    }

    /// Drops a region and every edge touching it.
    pub fn remove(&mut self, id: RegionId) {
        self.neighbours.remove(&id);
        for set in self.neighbours.values_mut() {
            set.remove(&id);
        }
        self.neighbours.retain(|_, set| !set.is_empty());
    }

    /// Each stored edge once, as `(smaller, larger)`, in ascending order of the larger id.
    pub fn edges(&self) -> impl Iterator<Item = (RegionId, RegionId)> + '_ {
        self.neighbours
            .iter()
            .flat_map(|(&larger, set)| set.iter().map(move |&smaller| (smaller, larger)))
    }
}

/// All regions of one segmentation run plus their adjacency.
#[derive(Debug, Clone)]
pub struct RegionRegistry {
    regions: Vec<Region>,
    graph: NeighborGraph,
    leaf_count: usize,
    image_area: f64,
}

impl RegionRegistry {
    /// Builds the leaf regions from a label map and samples their histograms from `hsv`.
    pub fn from_segmentation(
        segmentation: &Segmentation,
        hsv: &HsvImage,
        histogram_bins: usize,
    ) -> Result<Self> {
        let (width, height) = (segmentation.width, segmentation.height);
        let expected = width * height;
        if segmentation.labels.len() != expected {
            return Err(Error::LabelMap {
                expected,
                actual: segmentation.labels.len(),
            });
        }
        if hsv.width != width || hsv.height != height {
            return Err(Error::InvalidInput(format!(
                "label map is {width}x{height} but the image is {}x{}",
                hsv.width, hsv.height
            )));
        }

        let mut compact: HashMap<u32, RegionId> = HashMap::new();
        let mut pixels: Vec<Vec<(u32, u32)>> = Vec::new();
        let mut graph = NeighborGraph::new();
        let mut ids = Vec::with_capacity(expected);

        for y in 0..height {
            for x in 0..width {
                let label = segmentation.labels[y * width + x];
                let id = *compact.entry(label).or_insert_with(|| {
                    pixels.push(Vec::new());
                    pixels.len() - 1
                });
                pixels[id].push((x as u32, y as u32));
                ids.push(id);

                if y > 0 {
                    let up = ids[(y - 1) * width + x];
                    if up != id {
                        graph.add_relation(up, id);
                    }
                }
                if x > 0 {
                    let left = ids[y * width + x - 1];
                    if left != id {
                        graph.add_relation(left, id);
                    }
                }
            }
        }

        let regions: Vec<Region> = pixels
            .into_iter()
            .enumerate()
            .map(|(id, pixels)| Self::leaf(id, pixels, hsv, histogram_bins))
            .collect();

        Ok(Self {
            leaf_count: regions.len(),
            regions,
            graph,
            image_area: expected as f64,
        })
    }

    fn leaf(id: RegionId, pixels: Vec<(u32, u32)>, hsv: &HsvImage, bins: usize) -> Region {
        let (mut left, mut top) = (u32::MAX, u32::MAX);
        let (mut right, mut bottom) = (0u32, 0u32);
        let mut histogram = ColorHistogram::new(bins);
        for &(x, y) in &pixels {
            left = left.min(x);
            top = top.min(y);
            right = right.max(x);
            bottom = bottom.max(y);
            histogram.add_sample(hsv.get(x as usize, y as usize));
        }
        histogram.normalize();

        Region {
            id,
            bounds: Rect::from_edges(left as i32, top as i32, right as i32 + 1, bottom as i32 + 1),
            histogram,
            pixel_count: pixels.len() as u64,
            kind: RegionKind::Leaf { pixels },
        }
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    pub fn image_area(&self) -> f64 {
        self.image_area
    }

    pub fn region(&self, id: RegionId) -> Option<&Region> {
        self.regions.get(id)
    }

    /// Regions in id order: leaves first, then merge nodes in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter()
    }

    pub fn graph(&self) -> &NeighborGraph {
        &self.graph
    }

    /// Creates the merge node of `a` and `b`, rewires the neighbour graph around it and
    /// releases both children's histograms. Returns the new id.
    ///
    /// Returns `None` when either id is unknown or the two ids are equal.
    pub fn merge(&mut self, a: RegionId, b: RegionId) -> Option<RegionId> {
        if a == b {
            return None;
        }
        let (region_a, region_b) = (self.regions.get(a)?, self.regions.get(b)?);
        let id = self.regions.len();
        let merged = Region {
            id,
            bounds: region_a.bounds.union(&region_b.bounds),
            histogram: ColorHistogram::merged(
                &region_a.histogram,
                region_a.pixel_count,
                &region_b.histogram,
                region_b.pixel_count,
            ),
            pixel_count: region_a.pixel_count + region_b.pixel_count,
            kind: RegionKind::Merged { children: (a, b) },
        };

        let mut neighbours = self.graph.neighbours_of(a);
        neighbours.extend(self.graph.neighbours_of(b));
        neighbours.remove(&a);
        neighbours.remove(&b);
        self.graph.remove(a);
        self.graph.remove(b);
        for &n in &neighbours {
            self.graph.add_relation(n, id);
        }

        self.regions[a].histogram.release();
        self.regions[b].histogram.release();
        self.regions.push(merged);
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 4x2 image, labels:
    /// 7 7 3 3
    /// 7 5 5 3
    fn small_registry() -> RegionRegistry {
        let segmentation = Segmentation {
            width: 4,
            height: 2,
            labels: vec![7, 7, 3, 3, 7, 5, 5, 3],
            component_count: 3,
        };
        let hsv = HsvImage {
            width: 4,
            height: 2,
            samples: vec![[10, 10, 10]; 8],
        };
        RegionRegistry::from_segmentation(&segmentation, &hsv, 25).unwrap()
    }

    #[test]
    fn leaves_get_compact_ids_in_scan_order() {
        let registry = small_registry();
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.leaf_count(), 3);

        let first = registry.region(0).unwrap();
        assert_eq!(first.pixel_count, 3);
        assert_eq!(first.bounds, Rect::new(0, 0, 2, 2));

        let second = registry.region(1).unwrap();
        assert_eq!(second.bounds, Rect::new(2, 0, 2, 2));
        assert_eq!(registry.region(2).unwrap().bounds, Rect::new(1, 1, 2, 1));
    }

    #[test]
    fn adjacency_is_symmetric_in_effect() {
        let registry = small_registry();
        let graph = registry.graph();
        // Each edge is stored once, under its larger id.
        assert_eq!(graph.edges().collect::<Vec<_>>(), vec![(0, 1), (0, 2), (1, 2)]);
        assert_eq!(graph.neighbours_of(0), BTreeSet::from([1, 2]));
        assert_eq!(graph.neighbours_of(2), BTreeSet::from([0, 1]));
    }

    #[test]
    fn merge_rewires_graph_and_releases_children() {
        let mut registry = small_registry();
        let merged = registry.merge(0, 2).unwrap();
        assert_eq!(merged, 3);

        let node = registry.region(merged).unwrap();
        assert_eq!(node.children(), Some((0, 2)));
        assert_eq!(node.pixel_count, 5);
        assert_eq!(node.bounds, Rect::new(0, 0, 3, 2));
        assert!(!node.histogram.is_released());

        assert!(registry.region(0).unwrap().histogram.is_released());
        assert!(registry.region(2).unwrap().histogram.is_released());

        let graph = registry.graph();
        assert_eq!(graph.neighbours_of(3), BTreeSet::from([1]));
        assert!(graph.neighbours_of(0).is_empty());
        assert!(graph.neighbours_of(2).is_empty());
        assert_eq!(graph.neighbours_of(1), BTreeSet::from([3]));
    }

    #[test]
    fn short_label_map_is_rejected() {
        let segmentation = Segmentation {
            width: 3,
            height: 3,
            labels: vec![0; 4],
            component_count: 1,
        };
        let hsv = HsvImage {
            width: 3,
            height: 3,
            samples: vec![[0, 0, 0]; 9],
        };
        assert!(matches!(
            RegionRegistry::from_segmentation(&segmentation, &hsv, 25),
            Err(Error::LabelMap {
                expected: 9,
                actual: 4
            })
        ));
    }
}
