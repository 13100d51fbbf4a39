//! Node persistence on top of a [`BlockStore`].
//!
//! Every node read is one block read and every node write is one block
//! write. Nothing is cached; the tree re-reads a node whenever it needs a
//! fresh copy.

use super::rtree_constants::ROOT_BLOCK_ID;
use super::rtree_types::Node;
use crate::errors::{IndexError, IndexResult};
use crate::store::{decode_frame, encode_frame, BlockId, BlockStore, Metadata, StoreStats};

pub(crate) struct NodeStore {
    blocks: Box<dyn BlockStore>,
    max_entries: usize,
}

impl NodeStore {
    pub(crate) fn new(blocks: Box<dyn BlockStore>, max_entries: usize) -> Self {
        Self {
            blocks,
            max_entries,
        }
    }

    pub(crate) fn initialize(&self, dimensions: usize, reset: bool) -> IndexResult<Metadata> {
        self.blocks.initialize(dimensions, reset)
    }

    /// Reads the node stored in block `id`.
    pub(crate) fn read_node(&self, id: BlockId) -> IndexResult<Node> {
        let block = self
            .blocks
            .read_block(id)?
            .ok_or_else(|| IndexError::CorruptIndex(format!("index block {id} is missing")))?;
        let mut node: Node = decode_frame(&block)
            .map_err(|e| IndexError::CorruptIndex(format!("index block {id}: {e}")))?;
        node.block_id = id;
        Ok(node)
    }

    pub(crate) fn read_root(&self) -> IndexResult<Node> {
        self.read_node(ROOT_BLOCK_ID)
    }

    /// Appends `node` as a new block and records the block id on it.
    pub(crate) fn write_new_node(&self, node: &mut Node) -> IndexResult<BlockId> {
        let frame = self.encode(node)?;
        let id = self.blocks.write_new_block(&frame)?;
        node.block_id = id;
        Ok(id)
    }

    /// Rewrites the block `node` was read from.
    pub(crate) fn update_node(&self, node: &Node) -> IndexResult<()> {
        let frame = self.encode(node)?;
        self.blocks.update_block(node.block_id, &frame)
    }

    fn encode(&self, node: &Node) -> IndexResult<Vec<u8>> {
        if node.len() > self.max_entries {
            return Err(IndexError::InvariantViolation(format!(
                "refusing to persist node at level {} with {} entries (max {})",
                node.level,
                node.len(),
                self.max_entries
            )));
        }
        encode_frame(node)
    }

    pub(crate) fn metadata(&self) -> Metadata {
        self.blocks.metadata()
    }

    pub(crate) fn set_height(&self, height: u32) -> IndexResult<()> {
        self.blocks.set_tree_height(height)
    }

    pub(crate) fn sync(&self) -> IndexResult<()> {
        self.blocks.sync()
    }

    pub(crate) fn stats(&self) -> StoreStats {
        self.blocks.stats()
    }
}
