//! Disk-based R*-tree.
//!
//! Nodes are stored one per block of an index [`BlockStore`](crate::store::BlockStore)
//! and read on demand, so the tree never has to fit in memory:
//! - the root lives in block 1 and the tree grows at the root
//! - overflow is handled by forced reinsertion once per level and insertion,
//!   then by the R*-tree split
//! - records are indexed one by one or bulk loaded in Z-order

pub mod rtree_types;
pub mod rtree_constants;
pub(crate) mod rtree_storage;
mod rtree_split;
pub mod integrity;
mod rtree_impl;

pub use rtree_types::{Entry, Node, TreeStats};
pub use rtree_constants::{DATA_FILE_NAME, DEFAULT_BLOCK_SIZE, INDEX_FILE_NAME};
pub use rtree_impl::RStarTree;
pub use integrity::IntegrityReport;
