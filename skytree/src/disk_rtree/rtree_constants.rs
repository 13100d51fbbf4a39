//! Constants for the disk-based R*-tree.

use crate::store::BlockId;

/// The root always lives in block 1, directly after the metadata block.
pub const ROOT_BLOCK_ID: BlockId = 1;

/// Level of leaf nodes; the root sits at the tree height.
pub const LEAF_LEVEL: u32 = 1;

/// Default block size (32KB) for both the index and the data store
pub const DEFAULT_BLOCK_SIZE: usize = 32 * 1024;

/// Minimum fill of a non-root node as a fraction of the maximum
pub const MIN_FILL_FACTOR: f64 = 0.4;

/// Share of an overflowing node's entries removed by forced reinsertion
pub const REINSERT_FACTOR: f64 = 0.3;

/// Candidate count for overlap-enlargement minimisation in choose-subtree
pub const CHOOSE_SUBTREE_CANDIDATES: usize = 32;

/// Smallest node capacity for which splits and reinsertion are well defined
pub const MIN_MAX_ENTRIES: usize = 4;

/// File names used by [`super::RStarTree::open_in_dir`]
pub const DATA_FILE_NAME: &str = "datafile.dat";
pub const INDEX_FILE_NAME: &str = "indexfile.dat";
