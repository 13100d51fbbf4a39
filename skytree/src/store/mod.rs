//! Fixed-size block storage.
//!
//! A block store is a sequence of equally sized blocks addressed by a
//! [`BlockId`]. Block 0 always holds the store [`Metadata`]; payload blocks
//! start at 1 and are only ever appended or rewritten in place. Every block
//! access goes straight to the backing medium, one block at a time.

mod codec;
mod file;
mod memory;
mod record_store;

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::errors::{IndexError, IndexResult};

pub use codec::{decode_frame, encode_frame, framed_len, LENGTH_PREFIX};
pub use file::FileBlockStore;
pub use memory::MemoryBlockStore;
pub use record_store::RecordStore;

/// Identifier of a block inside one store.
pub type BlockId = u64;

/// Block 0 is reserved for the store metadata.
pub const METADATA_BLOCK_ID: BlockId = 0;

/// Magic number identifying a skytree block store ("SKYT").
pub const STORE_MAGIC: u32 = 0x534B_5954;

/// Block store format version.
pub const STORE_VERSION: u32 = 1;

/// Contents of block 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub magic: u32,
    pub version: u32,
    pub dimensions: u32,
    pub block_size: u32,
    /// Number of blocks in the store, block 0 included.
    pub block_count: u64,
    /// Height of the tree kept in the store; 0 for stores without a tree.
    pub tree_height: u32,
}

impl Metadata {
    pub(crate) fn fresh(dimensions: usize, block_size: usize) -> IndexResult<Self> {
        Ok(Self {
            magic: STORE_MAGIC,
            version: STORE_VERSION,
            dimensions: to_u32(dimensions, "dimensions")?,
            block_size: to_u32(block_size, "block size")?,
            block_count: 1,
            tree_height: 0,
        })
    }

    /// Placeholder held by a store before initialization; `block_count` 0
    /// marks it as unusable.
    pub(crate) fn uninitialized() -> Self {
        Self {
            magic: STORE_MAGIC,
            version: STORE_VERSION,
            dimensions: 0,
            block_size: 0,
            block_count: 0,
            tree_height: 0,
        }
    }

    /// Checks metadata read back from block 0 against what the caller expects.
    pub(crate) fn validate(&self, dimensions: usize, block_size: usize) -> IndexResult<()> {
        if self.magic != STORE_MAGIC {
            return Err(IndexError::CorruptIndex(format!(
                "bad magic number {:#010x}",
                self.magic
            )));
        }
        if self.version != STORE_VERSION {
            return Err(IndexError::CorruptIndex(format!(
                "unsupported store version {}",
                self.version
            )));
        }
        if self.block_size as usize != block_size {
            return Err(IndexError::InvalidConfiguration(format!(
                "store was written with block size {}, opened with {}",
                self.block_size, block_size
            )));
        }
        if self.block_count == 0 {
            return Err(IndexError::CorruptIndex(
                "metadata reports no blocks".to_string(),
            ));
        }
        crate::errors::ensure_dimensions(self.dimensions as usize, dimensions)
    }
}

fn to_u32(value: usize, what: &str) -> IndexResult<u32> {
    u32::try_from(value)
        .map_err(|_| IndexError::InvalidConfiguration(format!("{what} {value} is too large")))
}

/// Snapshot of the I/O counters of one store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub blocks_read: u64,
    pub blocks_written: u64,
}

impl StoreStats {
    /// Counters accumulated since `earlier` was taken.
    pub fn since(&self, earlier: &StoreStats) -> StoreStats {
        StoreStats {
            blocks_read: self.blocks_read.saturating_sub(earlier.blocks_read),
            blocks_written: self.blocks_written.saturating_sub(earlier.blocks_written),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct IoCounters {
    reads: AtomicU64,
    writes: AtomicU64,
}

impl IoCounters {
    pub(crate) fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> StoreStats {
        StoreStats {
            blocks_read: self.reads.load(Ordering::Relaxed),
            blocks_written: self.writes.load(Ordering::Relaxed),
        }
    }
}

/// A keyed store of fixed-size blocks.
///
/// Payloads handed to a store are already framed (see [`encode_frame`]); a
/// payload longer than [`BlockStore::block_size`] is rejected with
/// [`IndexError::BlockOverflow`].
pub trait BlockStore: Send + Sync {
    /// Prepares the store for use. With `reset` every block is discarded and a
    /// fresh metadata block is written; otherwise block 0 is read and checked
    /// against `dimensions` and the configured block size.
    fn initialize(&self, dimensions: usize, reset: bool) -> IndexResult<Metadata>;

    /// Current metadata, as last written to block 0.
    fn metadata(&self) -> Metadata;

    fn block_size(&self) -> usize;

    /// Reads one block; `None` when the block does not exist.
    fn read_block(&self, id: BlockId) -> IndexResult<Option<Vec<u8>>>;

    /// Appends a block and returns its id.
    fn write_new_block(&self, payload: &[u8]) -> IndexResult<BlockId>;

    /// Rewrites an existing payload block in place.
    fn update_block(&self, id: BlockId, payload: &[u8]) -> IndexResult<()>;

    /// Records the tree height in the metadata block.
    fn set_tree_height(&self, height: u32) -> IndexResult<()>;

    fn sync(&self) -> IndexResult<()>;

    fn stats(&self) -> StoreStats;
}

pub(crate) fn check_payload(payload: &[u8], block_size: usize) -> IndexResult<()> {
    if payload.len() > block_size {
        Err(IndexError::BlockOverflow {
            size: payload.len(),
            block_size,
        })
    } else {
        Ok(())
    }
}

pub(crate) fn check_updatable(id: BlockId, block_count: u64) -> IndexResult<()> {
    if id == METADATA_BLOCK_ID {
        return Err(IndexError::InvariantViolation(
            "block 0 is reserved for metadata".to_string(),
        ));
    }
    if id >= block_count {
        return Err(IndexError::InvariantViolation(format!(
            "block {id} does not exist (store holds {block_count} blocks)"
        )));
    }
    Ok(())
}
