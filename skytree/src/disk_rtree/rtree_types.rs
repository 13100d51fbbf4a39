//! Node and entry model of the R*-tree.
//!
//! Nodes reference their children by block id only; there is no in-memory
//! graph. A node lives as decoded bytes for the duration of one operation and
//! is written back through the node store when it changes.

use serde::{Deserialize, Serialize};

use crate::bounding_box::{minimum_bounding_box, BoundingBox};
use crate::record::RecordId;
use crate::store::BlockId;

// ============================================================================
// Entries
// ============================================================================

/// One slot of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Entry {
    /// Internal entry; `bbox` encloses everything stored beneath `child`.
    Pointer { bbox: BoundingBox, child: BlockId },
    /// Leaf entry for one record, `bbox` being the degenerate box at its point.
    Leaf {
        bbox: BoundingBox,
        record_id: RecordId,
        data_block: BlockId,
    },
}

impl Entry {
    pub fn pointer(bbox: BoundingBox, child: BlockId) -> Self {
        Entry::Pointer { bbox, child }
    }

    pub fn leaf(bbox: BoundingBox, record_id: RecordId, data_block: BlockId) -> Self {
        Entry::Leaf {
            bbox,
            record_id,
            data_block,
        }
    }

    pub fn bbox(&self) -> &BoundingBox {
        match self {
            Entry::Pointer { bbox, .. } | Entry::Leaf { bbox, .. } => bbox,
        }
    }

    /// Child block of a pointer entry.
    pub fn child(&self) -> Option<BlockId> {
        match self {
            Entry::Pointer { child, .. } => Some(*child),
            Entry::Leaf { .. } => None,
        }
    }

    pub fn record_id(&self) -> Option<RecordId> {
        match self {
            Entry::Leaf { record_id, .. } => Some(*record_id),
            Entry::Pointer { .. } => None,
        }
    }

    fn set_bbox(&mut self, new_bbox: BoundingBox) {
        match self {
            Entry::Pointer { bbox, .. } | Entry::Leaf { bbox, .. } => *bbox = new_bbox,
        }
    }

    /// Replaces the box with the minimum box of `entries`. An empty slice
    /// leaves the box untouched.
    pub fn adjust_to_entries(&mut self, entries: &[Entry]) {
        if let Some(mbb) = minimum_bounding_box(entries.iter().map(Entry::bbox)) {
            self.set_bbox(mbb);
        }
    }

    /// Grows the box to also cover `other`.
    pub fn enlarge_to(&mut self, other: &BoundingBox) {
        let merged = self.bbox().merge(other);
        self.set_bbox(merged);
    }
}

// ============================================================================
// Nodes
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// 1 for leaves, the tree height for the root.
    pub level: u32,
    /// Assigned from the block the node was read from or written to.
    #[serde(skip)]
    pub block_id: BlockId,
    pub entries: Vec<Entry>,
}

impl Node {
    pub fn new(level: u32, entries: Vec<Entry>) -> Self {
        Self {
            level,
            block_id: 0,
            entries,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.level == super::rtree_constants::LEAF_LEVEL
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Minimum box of all entries, `None` for an empty node.
    pub fn bbox(&self) -> Option<BoundingBox> {
        minimum_bounding_box(self.entries.iter().map(Entry::bbox))
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Structural counters of a tree, accumulated since it was opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    pub height: u32,
    /// Splits of non-root nodes.
    pub node_splits: u64,
    /// Splits of the root, each of which grew the tree by one level.
    pub root_splits: u64,
    /// Forced reinsertion passes.
    pub forced_reinsertions: u64,
    /// Entries moved by forced reinsertion.
    pub reinserted_entries: u64,
}
