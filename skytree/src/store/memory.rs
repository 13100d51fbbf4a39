use parking_lot::RwLock;

use super::codec::{decode_frame, encode_frame};
use super::{
    check_payload, check_updatable, BlockId, BlockStore, IoCounters, Metadata, StoreStats,
    METADATA_BLOCK_ID,
};
use crate::errors::{IndexError, IndexResult};

/// Block store kept entirely in memory.
///
/// Blocks are held unpadded but obey the same size limit and metadata rules
/// as [`super::FileBlockStore`], so a tree built on it has the same shape.
pub struct MemoryBlockStore {
    blocks: RwLock<Vec<Vec<u8>>>,
    block_size: usize,
    metadata: RwLock<Metadata>,
    counters: IoCounters,
}

impl MemoryBlockStore {
    pub fn new(block_size: usize) -> Self {
        Self {
            blocks: RwLock::new(Vec::new()),
            block_size,
            metadata: RwLock::new(Metadata::uninitialized()),
            counters: IoCounters::default(),
        }
    }

    fn write_metadata(&self, metadata: &Metadata) -> IndexResult<()> {
        let frame = encode_frame(metadata)?;
        check_payload(&frame, self.block_size)?;
        let mut blocks = self.blocks.write();
        if blocks.is_empty() {
            blocks.push(frame);
        } else {
            blocks[METADATA_BLOCK_ID as usize] = frame;
        }
        self.counters.record_write();
        *self.metadata.write() = metadata.clone();
        Ok(())
    }

    fn current(&self) -> IndexResult<Metadata> {
        let metadata = self.metadata.read().clone();
        if metadata.block_count == 0 {
            return Err(IndexError::InvariantViolation(
                "memory block store used before initialization".to_string(),
            ));
        }
        Ok(metadata)
    }
}

impl BlockStore for MemoryBlockStore {
    fn initialize(&self, dimensions: usize, reset: bool) -> IndexResult<Metadata> {
        if reset {
            self.blocks.write().clear();
            let fresh = Metadata::fresh(dimensions, self.block_size)?;
            self.write_metadata(&fresh)?;
            return Ok(fresh);
        }

        let existing: Metadata = {
            let blocks = self.blocks.read();
            let block = blocks.first().ok_or_else(|| {
                IndexError::CorruptIndex("memory block store has no metadata block".to_string())
            })?;
            decode_frame(block)?
        };
        self.counters.record_read();
        existing.validate(dimensions, self.block_size)?;
        *self.metadata.write() = existing.clone();
        Ok(existing)
    }

    fn metadata(&self) -> Metadata {
        self.metadata.read().clone()
    }

    fn block_size(&self) -> usize {
        self.block_size
    }

    fn read_block(&self, id: BlockId) -> IndexResult<Option<Vec<u8>>> {
        let block = self.blocks.read().get(id as usize).cloned();
        if block.is_some() {
            self.counters.record_read();
        }
        Ok(block)
    }

    fn write_new_block(&self, payload: &[u8]) -> IndexResult<BlockId> {
        check_payload(payload, self.block_size)?;
        let mut metadata = self.current()?;
        let id = {
            let mut blocks = self.blocks.write();
            blocks.push(payload.to_vec());
            (blocks.len() - 1) as BlockId
        };
        self.counters.record_write();
        metadata.block_count = id + 1;
        self.write_metadata(&metadata)?;
        Ok(id)
    }

    fn update_block(&self, id: BlockId, payload: &[u8]) -> IndexResult<()> {
        check_payload(payload, self.block_size)?;
        check_updatable(id, self.current()?.block_count)?;
        self.blocks.write()[id as usize] = payload.to_vec();
        self.counters.record_write();
        Ok(())
    }

    fn set_tree_height(&self, height: u32) -> IndexResult<()> {
        let mut metadata = self.current()?;
        metadata.tree_height = height;
        self.write_metadata(&metadata)
    }

    fn sync(&self) -> IndexResult<()> {
        Ok(())
    }

    fn stats(&self) -> StoreStats {
        self.counters.snapshot()
    }
}
