use super::{NodeSource, SpatialQuery};
use crate::bounding_box::{overlaps, BoundingBox};
use crate::disk_rtree::{Entry, Node};
use crate::errors::IndexResult;
use crate::record::RecordId;
use crate::store::RecordStore;

/// All records inside or on the border of a box.
#[derive(Debug, Clone)]
pub struct RangeQuery {
    search: BoundingBox,
}

impl RangeQuery {
    pub fn new(search: BoundingBox) -> Self {
        Self { search }
    }

    pub fn search_box(&self) -> &BoundingBox {
        &self.search
    }

    fn collect(&self, index: &dyn NodeSource, node: Node, out: &mut Vec<RecordId>) -> IndexResult<()> {
        for entry in node.entries {
            if !overlaps(entry.bbox(), &self.search) {
                continue;
            }
            match entry {
                Entry::Leaf { record_id, .. } => out.push(record_id),
                Entry::Pointer { child, .. } => {
                    let child = index.read_node(child)?;
                    self.collect(index, child, out)?;
                }
            }
        }
        Ok(())
    }
}

impl SpatialQuery for RangeQuery {
    fn search_index(&self, index: &dyn NodeSource) -> IndexResult<Vec<RecordId>> {
        let mut out = Vec::new();
        self.collect(index, index.read_root()?, &mut out)?;
        Ok(out)
    }

    fn scan_records(&self, records: &RecordStore) -> IndexResult<Vec<RecordId>> {
        let mut out = Vec::new();
        for batch in records.scan() {
            let (_, batch) = batch?;
            out.extend(
                batch
                    .iter()
                    .filter(|r| self.search.contains_point(&r.coordinates))
                    .map(|r| r.id),
            );
        }
        Ok(out)
    }
}
