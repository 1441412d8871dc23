// THEORY:
// The `merge_scheduler` builds the region hierarchy of selective search. It is a
// greedy, single-pass state machine over a working list of similarity records:
//
// 1.  **Seeding**: every adjacent pair in the neighbour graph is scored once.
// 2.  **Greedy step**: the best-scoring record is popped and its two regions are
//     merged into a new node appended to the registry.
// 3.  **Eviction**: every record that mentions either merged region is dropped, not
//     just the popped pair. Those comparisons are stale now that both regions have
//     been consumed.
// 4.  **Rescoring**: the new node is scored against each of its neighbours and the
//     fresh records are inserted in order.
//
// The loop ends when no records are left or the registry has grown past the region
// cap. Records are kept sorted ascending with a stable order, so among equal scores
// the most recently inserted record is popped first; the resulting hierarchy is
// fully deterministic for a given label map.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::core_modules::region::{RegionId, RegionRegistry};
use crate::core_modules::similarity::similarity;

/// Tunables of the selective-search hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectiveSearchConfig {
    /// Merging stops once the registry holds more than this many regions.
    pub region_cap: usize,
    /// Histogram bins per HSV channel.
    pub histogram_bins: usize,
}

impl Default for SelectiveSearchConfig {
    fn default() -> Self {
        Self {
            region_cap: 2000,
            histogram_bins: 25,
        }
    }
}

/// A scored pair of adjacent regions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityRecord {
    pub a: RegionId,
    pub b: RegionId,
    pub score: f32,
}

impl SimilarityRecord {
    fn touches(&self, id: RegionId) -> bool {
        self.a == id || self.b == id
    }
}

/// Outcome of one merge run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeSummary {
    pub merges: usize,
    pub capped: bool,
}

/// Greedy hierarchical merging over a `RegionRegistry`.
pub struct MergeScheduler {
    region_cap: usize,
    records: Vec<SimilarityRecord>,
}

impl MergeScheduler {
    pub fn new(region_cap: usize) -> Self {
        Self {
            region_cap,
            records: Vec::new(),
        }
    }

    /// Pending records, sorted ascending by score.
    pub fn records(&self) -> &[SimilarityRecord] {
        &self.records
    }

    /// Scores every adjacent pair of the registry's neighbour graph.
    pub fn seed(&mut self, registry: &RegionRegistry) {
        self.records.clear();
        let area = registry.image_area();
        for (a, b) in registry.graph().edges() {
            if let (Some(ra), Some(rb)) = (registry.region(a), registry.region(b)) {
                self.records.push(SimilarityRecord {
                    a,
                    b,
                    score: similarity(ra, rb, area),
                });
            }
        }
        self.records.sort_by(|x, y| x.score.total_cmp(&y.score));
    }

    /// Inserts a record after every record with a lower or equal score.
    fn insert(&mut self, record: SimilarityRecord) {
        let at = self
            .records
            .partition_point(|r| r.score.total_cmp(&record.score).is_le());
        self.records.insert(at, record);
    }

    /// Performs a single greedy merge. Returns the new region id, or `None` when the
    /// loop has terminated (no records left, or the region cap was exceeded).
    pub fn step(&mut self, registry: &mut RegionRegistry) -> Option<RegionId> {
        if registry.len() > self.region_cap {
            return None;
        }
        let best = self.records.pop()?;
        let merged = registry.merge(best.a, best.b)?;
        trace!(a = best.a, b = best.b, score = best.score, merged, "merged regions");

        self.records
            .retain(|r| !r.touches(best.a) && !r.touches(best.b));

        let area = registry.image_area();
        let neighbours = registry.graph().neighbours_of(merged);
        if let Some(node) = registry.region(merged) {
            let fresh: Vec<SimilarityRecord> = neighbours
                .into_iter()
                .filter_map(|n| {
                    registry.region(n).map(|other| SimilarityRecord {
                        a: n,
                        b: merged,
                        score: similarity(other, node, area),
                    })
                })
                .collect();
            fresh.into_iter().for_each(|record| self.insert(record));
        }
        Some(merged)
    }

    /// Seeds the record list and merges until termination.
    pub fn run(&mut self, registry: &mut RegionRegistry) -> MergeSummary {
        self.seed(registry);
        let mut summary = MergeSummary::default();
        while self.step(registry).is_some() {
            summary.merges += 1;
        }
        summary.capped = registry.len() > self.region_cap;
        summary
    }
}
