//! Query engines over the R*-tree and over the raw record store.
//!
//! Each query answers the same question two ways: by walking the index from
//! the root and pruning on entry boxes, or by scanning every data block in
//! store order. The two must agree, which is what the sequential form is for.

mod nearest;
mod range;
mod skyline;

pub use nearest::NearestNeighbourQuery;
pub use range::RangeQuery;
pub use skyline::{dominates, SkylineQuery};

use crate::disk_rtree::rtree_storage::NodeStore;
use crate::disk_rtree::Node;
use crate::errors::IndexResult;
use crate::record::RecordId;
use crate::store::{BlockId, RecordStore};

/// Read access to the nodes of a tree.
pub trait NodeSource {
    fn read_root(&self) -> IndexResult<Node>;
    fn read_node(&self, id: BlockId) -> IndexResult<Node>;
}

impl NodeSource for NodeStore {
    fn read_root(&self) -> IndexResult<Node> {
        NodeStore::read_root(self)
    }

    fn read_node(&self, id: BlockId) -> IndexResult<Node> {
        NodeStore::read_node(self, id)
    }
}

/// A query with an indexed and a sequential evaluation.
pub trait SpatialQuery {
    /// Evaluates the query by traversing the tree.
    fn search_index(&self, index: &dyn NodeSource) -> IndexResult<Vec<RecordId>>;

    /// Evaluates the query by scanning every record.
    fn scan_records(&self, records: &RecordStore) -> IndexResult<Vec<RecordId>>;
}
