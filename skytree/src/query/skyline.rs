use super::{NodeSource, SpatialQuery};
use crate::disk_rtree::{Entry, Node};
use crate::errors::IndexResult;
use crate::record::RecordId;
use crate::store::RecordStore;

/// `a` dominates `b` when it is no larger in every dimension and smaller in
/// at least one.
pub fn dominates(a: &[f64], b: &[f64]) -> bool {
    let mut strictly = false;
    for (x, y) in a.iter().zip(b) {
        if x > y {
            return false;
        }
        if x < y {
            strictly = true;
        }
    }
    strictly
}

/// Records that no other record dominates.
///
/// Without a reference point the coordinates are compared directly. With one,
/// each record is compared by its per-dimension distance to that point.
#[derive(Debug, Clone, Default)]
pub struct SkylineQuery {
    reference: Option<Vec<f64>>,
}

/// Running skyline: each member with the vector it is compared by.
type Skyline = Vec<(Vec<f64>, RecordId)>;

impl SkylineQuery {
    pub fn new() -> Self {
        Self { reference: None }
    }

    pub fn relative_to(point: Vec<f64>) -> Self {
        Self {
            reference: Some(point),
        }
    }

    pub fn reference(&self) -> Option<&[f64]> {
        self.reference.as_deref()
    }

    /// The best vector any point under `entry` can have.
    fn representative(&self, entry: &Entry) -> Vec<f64> {
        match &self.reference {
            Some(point) => entry.bbox().axis_distances(point),
            None => entry.bbox().lower_corner(),
        }
    }

    fn transform(&self, coordinates: &[f64]) -> Vec<f64> {
        match &self.reference {
            Some(point) => coordinates
                .iter()
                .zip(point)
                .map(|(x, q)| (x - q).abs())
                .collect(),
            None => coordinates.to_vec(),
        }
    }

    fn visit(&self, index: &dyn NodeSource, node: Node, skyline: &mut Skyline) -> IndexResult<()> {
        let mut ranked: Vec<(f64, Vec<f64>, Entry)> = node
            .entries
            .into_iter()
            .map(|entry| {
                let vector = self.representative(&entry);
                (vector.iter().sum(), vector, entry)
            })
            .collect();
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0));

        for (_, vector, entry) in ranked {
            match entry {
                Entry::Leaf { record_id, .. } => admit(skyline, vector, record_id),
                Entry::Pointer { child, .. } => {
                    if skyline.iter().any(|(member, _)| dominates(member, &vector)) {
                        continue;
                    }
                    let child = index.read_node(child)?;
                    self.visit(index, child, skyline)?;
                }
            }
        }
        Ok(())
    }
}

/// Adds a candidate to the running skyline unless a member dominates it, and
/// drops the members it dominates.
fn admit(skyline: &mut Skyline, vector: Vec<f64>, id: RecordId) {
    skyline.retain(|(member, _)| !dominates(&vector, member));
    if skyline.iter().any(|(member, _)| dominates(member, &vector)) {
        return;
    }
    skyline.push((vector, id));
}

impl SpatialQuery for SkylineQuery {
    fn search_index(&self, index: &dyn NodeSource) -> IndexResult<Vec<RecordId>> {
        let mut skyline = Skyline::new();
        self.visit(index, index.read_root()?, &mut skyline)?;
        Ok(skyline.into_iter().map(|(_, id)| id).collect())
    }

    fn scan_records(&self, records: &RecordStore) -> IndexResult<Vec<RecordId>> {
        let mut skyline = Skyline::new();
        for batch in records.scan() {
            let (_, batch) = batch?;
            for record in batch {
                admit(&mut skyline, self.transform(&record.coordinates), record.id);
            }
        }
        Ok(skyline.into_iter().map(|(_, id)| id).collect())
    }
}
