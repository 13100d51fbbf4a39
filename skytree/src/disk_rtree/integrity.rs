//! Structural integrity checking for the R*-tree.

use std::collections::{HashMap, HashSet};

use super::rtree_constants::{LEAF_LEVEL, ROOT_BLOCK_ID};
use super::rtree_storage::NodeStore;
use super::rtree_types::{Entry, Node};
use crate::config::StoreConfig;
use crate::errors::{IndexError, IndexResult};
use crate::record::RecordId;
use crate::store::{BlockId, RecordStore};

/// Result of an integrity check
#[derive(Debug, Clone)]
pub struct IntegrityReport {
    /// Nodes visited from the root
    pub nodes_checked: u64,
    pub leaf_nodes: u64,
    /// Leaf entries, i.e. indexed records
    pub leaf_entries: u64,
    /// Height recorded by the tree
    pub height: u32,
    /// Node count per level, leaves first
    pub nodes_per_level: Vec<u64>,
    /// Non-root nodes below the minimum fill
    pub underfull_nodes: Vec<BlockId>,
    /// Nodes above the maximum fill
    pub overfull_nodes: Vec<BlockId>,
    /// Pointer entries whose box is not the minimum box of their child
    pub mismatched_boxes: Vec<BlockId>,
    /// Leaf entries whose data block does not hold their record
    pub misplaced_records: u64,
    /// Allocated index blocks not reachable from the root
    pub unreachable_blocks: Vec<BlockId>,
    /// Whether no problem was found
    pub is_valid: bool,
    /// Detailed error messages
    pub errors: Vec<String>,
}

impl IntegrityReport {
    pub fn new() -> Self {
        Self {
            nodes_checked: 0,
            leaf_nodes: 0,
            leaf_entries: 0,
            height: 0,
            nodes_per_level: Vec::new(),
            underfull_nodes: Vec::new(),
            overfull_nodes: Vec::new(),
            mismatched_boxes: Vec::new(),
            misplaced_records: 0,
            unreachable_blocks: Vec::new(),
            is_valid: true,
            errors: Vec::new(),
        }
    }

    fn fail(&mut self, message: String) {
        self.is_valid = false;
        self.errors.push(message);
    }
}

impl Default for IntegrityReport {
    fn default() -> Self {
        Self::new()
    }
}

struct Walk<'a> {
    nodes: &'a NodeStore,
    records: &'a RecordStore,
    config: &'a StoreConfig,
    report: IntegrityReport,
    visited: HashSet<BlockId>,
    data_blocks: HashMap<BlockId, HashSet<RecordId>>,
}

/// Walks every node reachable from the root.
///
/// Undecodable blocks and broken invariants are recorded in the report; only
/// I/O failures are returned as errors.
pub(crate) fn check_tree(
    nodes: &NodeStore,
    records: &RecordStore,
    config: &StoreConfig,
    height: u32,
) -> IndexResult<IntegrityReport> {
    let mut walk = Walk {
        nodes,
        records,
        config,
        report: IntegrityReport::new(),
        visited: HashSet::new(),
        data_blocks: HashMap::new(),
    };
    walk.report.height = height;
    walk.report.nodes_per_level = vec![0; height as usize];

    match nodes.read_root() {
        Ok(root) => {
            if root.level != height {
                walk.report.fail(format!(
                    "root level {} differs from tree height {}",
                    root.level, height
                ));
            }
            walk.visit(root, None)?;
        }
        Err(IndexError::CorruptIndex(message)) => walk.report.fail(message),
        Err(e) => return Err(e),
    }

    let block_count = nodes.metadata().block_count;
    for id in ROOT_BLOCK_ID..block_count {
        if !walk.visited.contains(&id) {
            walk.report.unreachable_blocks.push(id);
        }
    }
    if !walk.report.unreachable_blocks.is_empty() {
        let count = walk.report.unreachable_blocks.len();
        walk.report.fail(format!("{count} index blocks are unreachable from the root"));
    }

    let report = walk.report;
    log::debug!(
        "Integrity check visited {} nodes, {} leaf entries, valid: {}",
        report.nodes_checked,
        report.leaf_entries,
        report.is_valid
    );
    Ok(report)
}

impl Walk<'_> {
    fn visit(&mut self, node: Node, expected_level: Option<u32>) -> IndexResult<()> {
        let id = node.block_id;
        if !self.visited.insert(id) {
            self.report.fail(format!("block {id} is referenced more than once"));
            return Ok(());
        }
        self.report.nodes_checked += 1;

        if let Some(expected) = expected_level {
            if node.level != expected {
                self.report.fail(format!(
                    "node {id} has level {} but its parent expects {expected}",
                    node.level
                ));
            }
        }
        if let Some(count) = (node.level as usize)
            .checked_sub(LEAF_LEVEL as usize)
            .and_then(|index| self.report.nodes_per_level.get_mut(index))
        {
            *count += 1;
        }

        self.check_occupancy(&node);

        if node.is_leaf() {
            self.report.leaf_nodes += 1;
            for entry in &node.entries {
                self.check_leaf_entry(id, entry)?;
            }
            return Ok(());
        }

        for entry in node.entries {
            let Entry::Pointer { bbox, child } = entry else {
                self.report.fail(format!("internal node {id} holds a leaf entry"));
                continue;
            };
            let child_node = match self.nodes.read_node(child) {
                Ok(child_node) => child_node,
                Err(IndexError::CorruptIndex(message)) => {
                    self.report.fail(message);
                    continue;
                }
                Err(e) => return Err(e),
            };
            if child_node.bbox().as_ref() != Some(&bbox) {
                self.report.mismatched_boxes.push(child);
                self.report.fail(format!(
                    "entry for block {child} in node {id} has box {bbox}, children span {}",
                    child_node
                        .bbox()
                        .map_or_else(|| "nothing".to_string(), |b| b.to_string())
                ));
            }
            self.visit(child_node, Some(node.level - 1))?;
        }
        Ok(())
    }

    fn check_occupancy(&mut self, node: &Node) {
        let id = node.block_id;
        let len = node.len();
        if len > self.config.max_entries {
            self.report.overfull_nodes.push(id);
            self.report
                .fail(format!("node {id} holds {len} entries, above {}", self.config.max_entries));
        }
        if id != ROOT_BLOCK_ID && len < self.config.min_entries {
            self.report.underfull_nodes.push(id);
            self.report
                .fail(format!("node {id} holds {len} entries, below {}", self.config.min_entries));
        }
        if id == ROOT_BLOCK_ID && !node.is_leaf() && len < 2 {
            self.report
                .fail(format!("internal root holds {len} entries, expected at least 2"));
        }
    }

    fn check_leaf_entry(&mut self, node_id: BlockId, entry: &Entry) -> IndexResult<()> {
        let Entry::Leaf {
            record_id,
            data_block,
            ..
        } = entry
        else {
            self.report.fail(format!("leaf node {node_id} holds a pointer entry"));
            return Ok(());
        };
        self.report.leaf_entries += 1;

        if !self.data_blocks.contains_key(data_block) {
            let ids = match self.records.read_block(*data_block) {
                Ok(records) => records.into_iter().map(|r| r.id).collect(),
                Err(IndexError::CorruptIndex(_)) => HashSet::new(),
                Err(e) => return Err(e),
            };
            self.data_blocks.insert(*data_block, ids);
        }
        let found = self
            .data_blocks
            .get(data_block)
            .is_some_and(|ids| ids.contains(record_id));
        if !found {
            self.report.misplaced_records += 1;
            self.report.fail(format!(
                "record {record_id} in leaf {node_id} is not in data block {data_block}"
            ));
        }
        Ok(())
    }
}
