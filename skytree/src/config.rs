//! Tree configuration.
//!
//! [`TreeOptions`] is what a caller fills in; [`StoreConfig`] is derived from
//! it once when a tree is opened and stays fixed for the lifetime of the tree.
//! The derived capacities come from encoding sample nodes and record batches,
//! so they always agree with what the stores can actually hold.

use crate::bounding_box::{BoundingBox, Bounds};
use crate::disk_rtree::rtree_constants::{
    DEFAULT_BLOCK_SIZE, LEAF_LEVEL, MIN_FILL_FACTOR, MIN_MAX_ENTRIES, REINSERT_FACTOR,
};
use crate::disk_rtree::{Entry, Node};
use crate::errors::{IndexError, IndexResult};
use crate::record::Record;
use crate::store::framed_len;

/// Options for opening an [`crate::RStarTree`].
///
/// # Examples
///
/// ```rust
/// use skytree::config::{StoreConfig, TreeOptions};
///
/// let options = TreeOptions::new(2).index_block_size(4096);
/// let config = StoreConfig::derive(&options).unwrap();
/// assert!(config.max_entries >= 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeOptions {
    pub(crate) dimensions: usize,
    pub(crate) index_block_size: usize,
    pub(crate) data_block_size: usize,
}

impl TreeOptions {
    /// Creates options for a dataset of `dimensions` coordinates per record.
    ///
    /// Both block sizes default to 32 KiB.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            index_block_size: DEFAULT_BLOCK_SIZE,
            data_block_size: DEFAULT_BLOCK_SIZE,
        }
    }

    /// Sets the block size of the index store.
    ///
    /// # Arguments
    ///
    /// * `size` - Block size in bytes; it must hold at least four leaf
    ///   entries, which is checked by [`StoreConfig::derive`].
    ///
    /// # Returns
    ///
    /// These options for method chaining.
    pub fn index_block_size(mut self, size: usize) -> Self {
        self.index_block_size = size;
        self
    }

    /// Sets the block size of the record store.
    ///
    /// # Arguments
    ///
    /// * `size` - Block size in bytes; it must hold at least one record.
    ///
    /// # Returns
    ///
    /// These options for method chaining.
    pub fn data_block_size(mut self, size: usize) -> Self {
        self.data_block_size = size;
        self
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Capacities derived from [`TreeOptions`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub dimensions: usize,
    pub index_block_size: usize,
    pub data_block_size: usize,
    /// Largest number of entries a node may hold.
    pub max_entries: usize,
    /// Smallest number of entries a non-root node may hold.
    pub min_entries: usize,
    /// Entries removed from an overflowing node by forced reinsertion.
    pub reinsert_count: usize,
    pub max_records_per_block: usize,
}

impl StoreConfig {
    /// Derives the node and record-batch capacities for `options`.
    ///
    /// # Errors
    ///
    /// [`IndexError::InvalidConfiguration`] when the dataset has no dimensions,
    /// an index block cannot hold four leaf entries or a data block cannot
    /// hold one record.
    pub fn derive(options: &TreeOptions) -> IndexResult<Self> {
        let dimensions = options.dimensions;
        if dimensions == 0 {
            return Err(IndexError::InvalidConfiguration(
                "dataset must have at least one dimension".to_string(),
            ));
        }

        let max_entries = max_entries_in_node(dimensions, options.index_block_size)?;
        if max_entries < MIN_MAX_ENTRIES {
            return Err(IndexError::InvalidConfiguration(format!(
                "index block size {} holds {} entries of {} dimensions, at least {} are required",
                options.index_block_size, max_entries, dimensions, MIN_MAX_ENTRIES
            )));
        }

        let max_records_per_block = max_records_in_block(dimensions, options.data_block_size)?;
        if max_records_per_block == 0 {
            return Err(IndexError::InvalidConfiguration(format!(
                "data block size {} cannot hold a record of {} dimensions",
                options.data_block_size, dimensions
            )));
        }

        Ok(Self {
            dimensions,
            index_block_size: options.index_block_size,
            data_block_size: options.data_block_size,
            max_entries,
            min_entries: (max_entries as f64 * MIN_FILL_FACTOR).floor() as usize,
            reinsert_count: (max_entries as f64 * REINSERT_FACTOR).floor() as usize,
            max_records_per_block,
        })
    }
}

/// Largest count of leaf entries whose framed node encoding fits one block.
fn max_entries_in_node(dimensions: usize, block_size: usize) -> IndexResult<usize> {
    let bbox = BoundingBox::new(vec![Bounds::point(0.0)?; dimensions]);
    let sample = Entry::leaf(bbox, 0, 0);
    largest_fitting(block_size, |count| {
        framed_len(&Node::new(LEAF_LEVEL, vec![sample.clone(); count]))
    })
}

/// Largest count of records whose framed batch encoding fits one block.
fn max_records_in_block(dimensions: usize, block_size: usize) -> IndexResult<usize> {
    let sample = Record::new(0, vec![0.0; dimensions]);
    largest_fitting(block_size, |count| framed_len(&vec![sample.clone(); count]))
}

/// Largest `count` for which `framed(count)` fits `block_size`. Encoded
/// sizes grow strictly with the count, so an exponential search followed by
/// bisection finds it without encoding every count.
fn largest_fitting<F>(block_size: usize, framed: F) -> IndexResult<usize>
where
    F: Fn(usize) -> IndexResult<usize>,
{
    if framed(1)? > block_size {
        return Ok(0);
    }
    let mut fits = 1;
    let mut overflows = 2;
    while framed(overflows)? <= block_size {
        fits = overflows;
        overflows *= 2;
    }
    while overflows - fits > 1 {
        let middle = fits + (overflows - fits) / 2;
        if framed(middle)? <= block_size {
            fits = middle;
        } else {
            overflows = middle;
        }
    }
    Ok(fits)
}
