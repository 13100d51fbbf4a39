//! File-backed block store.
//!
//! One file per store, block `i` at byte offset `i * block_size`. Every block
//! is padded to the full block size, so the file length is always a multiple
//! of it. Each read or write is exactly one seek plus one transfer.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use super::codec::{decode_frame, encode_frame};
use super::{
    check_payload, check_updatable, BlockId, BlockStore, IoCounters, Metadata, StoreStats,
    METADATA_BLOCK_ID,
};
use crate::errors::{IndexError, IndexResult};

pub struct FileBlockStore {
    file: RwLock<File>,
    path: PathBuf,
    block_size: usize,
    metadata: RwLock<Metadata>,
    counters: IoCounters,
}

impl FileBlockStore {
    /// Opens `path`, creating an empty file when it does not exist. The store
    /// is unusable until [`BlockStore::initialize`] has been called.
    pub fn open(path: impl AsRef<Path>, block_size: usize) -> IndexResult<Self> {
        let path = path.as_ref();
        log::debug!("Opening block store at {:?} (block size {})", path, block_size);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        Ok(Self {
            file: RwLock::new(file),
            path: path.to_path_buf(),
            block_size,
            metadata: RwLock::new(Metadata::uninitialized()),
            counters: IoCounters::default(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_raw(&self, id: BlockId) -> IndexResult<Option<Vec<u8>>> {
        let offset = id * self.block_size as u64;
        let mut file = self.file.write();
        let length = file.metadata()?.len();
        if offset + self.block_size as u64 > length {
            return Ok(None);
        }
        file.seek(SeekFrom::Start(offset))?;
        let mut buffer = vec![0u8; self.block_size];
        file.read_exact(&mut buffer)?;
        self.counters.record_read();
        Ok(Some(buffer))
    }

    fn write_raw(&self, id: BlockId, payload: &[u8]) -> IndexResult<()> {
        check_payload(payload, self.block_size)?;
        let mut padded = payload.to_vec();
        padded.resize(self.block_size, 0);

        let offset = id * self.block_size as u64;
        let mut file = self.file.write();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&padded)?;
        self.counters.record_write();
        Ok(())
    }

    fn write_metadata(&self, metadata: &Metadata) -> IndexResult<()> {
        let frame = encode_frame(metadata)?;
        self.write_raw(METADATA_BLOCK_ID, &frame)
    }

    fn current(&self) -> IndexResult<Metadata> {
        let metadata = self.metadata.read().clone();
        if metadata.block_count == 0 {
            return Err(IndexError::InvariantViolation(format!(
                "block store {:?} used before initialization",
                self.path
            )));
        }
        Ok(metadata)
    }
}

impl BlockStore for FileBlockStore {
    fn initialize(&self, dimensions: usize, reset: bool) -> IndexResult<Metadata> {
        let metadata = if reset {
            log::debug!("Resetting block store at {:?}", self.path);
            self.file.write().set_len(0)?;
            let fresh = Metadata::fresh(dimensions, self.block_size)?;
            self.write_metadata(&fresh)?;
            fresh
        } else {
            let block = self.read_raw(METADATA_BLOCK_ID)?.ok_or_else(|| {
                IndexError::CorruptIndex(format!("{:?} has no metadata block", self.path))
            })?;
            let existing: Metadata = decode_frame(&block)?;
            existing.validate(dimensions, self.block_size)?;
            let length = self.file.read().metadata()?.len();
            if existing.block_count * self.block_size as u64 > length {
                return Err(IndexError::CorruptIndex(format!(
                    "{:?} is truncated: metadata reports {} blocks but the file holds {} bytes",
                    self.path, existing.block_count, length
                )));
            }
            existing
        };
        *self.metadata.write() = metadata.clone();
        Ok(metadata)
    }

    fn metadata(&self) -> Metadata {
        self.metadata.read().clone()
    }

    fn block_size(&self) -> usize {
        self.block_size
    }

    fn read_block(&self, id: BlockId) -> IndexResult<Option<Vec<u8>>> {
        if id >= self.current()?.block_count {
            return Ok(None);
        }
        self.read_raw(id)
    }

    fn write_new_block(&self, payload: &[u8]) -> IndexResult<BlockId> {
        check_payload(payload, self.block_size)?;
        let mut metadata = self.current()?;
        let id = metadata.block_count;
        self.write_raw(id, payload)?;
        metadata.block_count += 1;
        self.write_metadata(&metadata)?;
        *self.metadata.write() = metadata;
        Ok(id)
    }

    fn update_block(&self, id: BlockId, payload: &[u8]) -> IndexResult<()> {
        check_updatable(id, self.current()?.block_count)?;
        self.write_raw(id, payload)
    }

    fn set_tree_height(&self, height: u32) -> IndexResult<()> {
        let mut metadata = self.current()?;
        metadata.tree_height = height;
        self.write_metadata(&metadata)?;
        *self.metadata.write() = metadata;
        Ok(())
    }

    fn sync(&self) -> IndexResult<()> {
        self.file.write().sync_all()?;
        Ok(())
    }

    fn stats(&self) -> StoreStats {
        self.counters.snapshot()
    }
}
