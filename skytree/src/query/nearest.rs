use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::{NodeSource, SpatialQuery};
use crate::disk_rtree::{Entry, Node};
use crate::errors::{IndexError, IndexResult};
use crate::record::RecordId;
use crate::store::RecordStore;

/// A candidate neighbour; ordered by distance so the heap top is the farthest.
#[derive(Debug, Clone, Copy)]
struct Neighbour {
    distance: f64,
    id: RecordId,
}

impl PartialEq for Neighbour {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Neighbour {}

impl PartialOrd for Neighbour {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Neighbour {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// The `k` records closest to a point by Euclidean distance, nearest first.
#[derive(Debug, Clone)]
pub struct NearestNeighbourQuery {
    point: Vec<f64>,
    k: usize,
}

impl NearestNeighbourQuery {
    /// Fails with [`IndexError::InvalidK`] for a negative `k`. A `k` of zero
    /// is valid and matches nothing.
    pub fn new(point: Vec<f64>, k: i64) -> IndexResult<Self> {
        let k = usize::try_from(k).map_err(|_| IndexError::InvalidK(k))?;
        Ok(Self { point, k })
    }

    pub fn point(&self) -> &[f64] {
        &self.point
    }

    pub fn k(&self) -> usize {
        self.k
    }

    fn radius(&self, heap: &BinaryHeap<Neighbour>) -> Option<f64> {
        if heap.len() < self.k {
            None
        } else {
            heap.peek().map(|n| n.distance)
        }
    }

    fn visit(
        &self,
        index: &dyn NodeSource,
        node: Node,
        heap: &mut BinaryHeap<Neighbour>,
    ) -> IndexResult<()> {
        let mut ranked: Vec<(f64, Entry)> = node
            .entries
            .into_iter()
            .map(|entry| (entry.bbox().min_point_distance(&self.point), entry))
            .collect();
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0));

        for (distance, entry) in ranked {
            if self.radius(heap).is_some_and(|radius| distance > radius) {
                break;
            }
            match entry {
                Entry::Leaf { record_id, .. } => offer(
                    heap,
                    self.k,
                    Neighbour {
                        distance,
                        id: record_id,
                    },
                ),
                Entry::Pointer { child, .. } => {
                    let child = index.read_node(child)?;
                    self.visit(index, child, heap)?;
                }
            }
        }
        Ok(())
    }
}

/// Keeps the `k` smallest neighbours by `(distance, id)`, so records tied
/// at the k-th distance resolve the same way however they are visited.
fn offer(heap: &mut BinaryHeap<Neighbour>, k: usize, candidate: Neighbour) {
    if heap.len() < k {
        heap.push(candidate);
    } else if let Some(mut farthest) = heap.peek_mut() {
        if candidate < *farthest {
            *farthest = candidate;
        }
    }
}

impl SpatialQuery for NearestNeighbourQuery {
    fn search_index(&self, index: &dyn NodeSource) -> IndexResult<Vec<RecordId>> {
        if self.k == 0 {
            return Ok(Vec::new());
        }
        let mut heap = BinaryHeap::with_capacity(self.k + 1);
        self.visit(index, index.read_root()?, &mut heap)?;
        Ok(heap.into_sorted_vec().into_iter().map(|n| n.id).collect())
    }

    fn scan_records(&self, records: &RecordStore) -> IndexResult<Vec<RecordId>> {
        if self.k == 0 {
            return Ok(Vec::new());
        }
        let mut heap: BinaryHeap<Neighbour> = BinaryHeap::with_capacity(self.k + 1);
        for batch in records.scan() {
            let (_, batch) = batch?;
            for record in batch {
                let candidate = Neighbour {
                    distance: record.distance_to(&self.point),
                    id: record.id,
                };
                offer(&mut heap, self.k, candidate);
            }
        }
        Ok(heap.into_sorted_vec().into_iter().map(|n| n.id).collect())
    }
}
