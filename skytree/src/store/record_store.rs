use super::codec::{decode_frame, encode_frame};
use super::{BlockId, BlockStore, StoreStats};
use crate::config::StoreConfig;
use crate::errors::{ensure_dimensions, IndexError, IndexResult};
use crate::record::Record;

/// Records packed into fixed-size blocks, in insertion order.
///
/// Each payload block holds one batch of up to `max_records_per_block`
/// records. Appending fills the last block first, rewriting it in place, and
/// only then starts a new block.
pub struct RecordStore {
    blocks: Box<dyn BlockStore>,
    dimensions: usize,
    max_records_per_block: usize,
    tail: Vec<Record>,
    tail_id: Option<BlockId>,
}

impl RecordStore {
    /// Initializes `blocks` for `config` and loads the last batch so appends
    /// can continue filling it.
    pub fn open(blocks: Box<dyn BlockStore>, config: &StoreConfig, reset: bool) -> IndexResult<Self> {
        let metadata = blocks.initialize(config.dimensions, reset)?;
        let mut store = Self {
            blocks,
            dimensions: config.dimensions,
            max_records_per_block: config.max_records_per_block,
            tail: Vec::new(),
            tail_id: None,
        };
        if metadata.block_count > 1 {
            let last = metadata.block_count - 1;
            store.tail = store.read_block(last)?;
            store.tail_id = Some(last);
        }
        Ok(store)
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Number of payload blocks.
    pub fn block_count(&self) -> u64 {
        self.blocks.metadata().block_count.saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.block_count() == 0
    }

    /// Appends one record and returns the block it landed in.
    pub fn append(&mut self, record: Record) -> IndexResult<BlockId> {
        self.push(record)?;
        self.flush_tail()
    }

    /// Appends every record, writing each block once it is full.
    ///
    /// Returns the number of records appended. A rejected record stops the
    /// append; blocks already written stay, records not yet written are
    /// dropped.
    pub fn append_all<I>(&mut self, records: I) -> IndexResult<usize>
    where
        I: IntoIterator<Item = Record>,
    {
        let mut count = 0;
        let mut dirty = false;
        for record in records {
            if let Err(e) = self.push(record) {
                self.restore_tail()?;
                return Err(e);
            }
            dirty = true;
            count += 1;
            if self.tail.len() == self.max_records_per_block {
                self.flush_tail()?;
                dirty = false;
            }
        }
        if dirty {
            self.flush_tail()?;
        }
        log::debug!(
            "Appended {} records, record store now holds {} blocks",
            count,
            self.block_count()
        );
        Ok(count)
    }

    /// Validates `record` before it touches the tail, so a rejected record
    /// never reaches a data block.
    fn push(&mut self, record: Record) -> IndexResult<()> {
        ensure_dimensions(self.dimensions, record.dimensions())?;
        record.bounding_box()?;
        if self.tail.len() == self.max_records_per_block {
            self.tail.clear();
            self.tail_id = None;
        }
        self.tail.push(record);
        Ok(())
    }

    /// Discards unwritten records by reloading the tail from its block.
    fn restore_tail(&mut self) -> IndexResult<()> {
        self.tail = match self.tail_id {
            Some(id) => self.read_block(id)?,
            None => Vec::new(),
        };
        Ok(())
    }

    /// Drops every record.
    pub fn clear(&mut self) -> IndexResult<()> {
        self.blocks.initialize(self.dimensions, true)?;
        self.tail.clear();
        self.tail_id = None;
        Ok(())
    }

    fn flush_tail(&mut self) -> IndexResult<BlockId> {
        let frame = encode_frame(&self.tail)?;
        match self.tail_id {
            Some(id) => {
                self.blocks.update_block(id, &frame)?;
                Ok(id)
            }
            None => {
                let id = self.blocks.write_new_block(&frame)?;
                self.tail_id = Some(id);
                Ok(id)
            }
        }
    }

    /// Decodes the batch stored in block `id`.
    pub fn read_block(&self, id: BlockId) -> IndexResult<Vec<Record>> {
        let block = self
            .blocks
            .read_block(id)?
            .filter(|_| id != super::METADATA_BLOCK_ID)
            .ok_or_else(|| IndexError::CorruptIndex(format!("data block {id} is missing")))?;
        decode_frame(&block)
    }

    /// Every `(block id, records)` pair in store order.
    pub fn scan(&self) -> impl Iterator<Item = IndexResult<(BlockId, Vec<Record>)>> + '_ {
        let end = self.blocks.metadata().block_count;
        (1..end).map(move |id| self.read_block(id).map(|records| (id, records)))
    }

    pub fn sync(&self) -> IndexResult<()> {
        self.blocks.sync()
    }

    pub fn stats(&self) -> StoreStats {
        self.blocks.stats()
    }
}
