//! # Skytree - Disk-Backed R*-Tree
//!
//! This crate indexes n-dimensional points with an R*-tree whose nodes live
//! in fixed-size blocks on disk, and answers range, k-nearest-neighbour and
//! skyline queries over it. Every query also has a sequential form that scans
//! the raw record blocks, which is useful as a baseline and as a cross-check.
//!
//! ## Features
//!
//! - **Disk-Based Storage**: one node per block, read on demand
//! - **R*-Tree Insertion**: overlap-aware subtree choice, margin-driven splits
//!   and forced reinsertion
//! - **Bulk Loading**: records indexed in Z-order
//! - **Queries**: range, branch-and-bound KNN, skyline and dynamic skyline
//! - **I/O Accounting**: block reads and writes per store
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use skytree::{BoundingBox, RStarTree, Record, TreeOptions};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dir = tempfile::tempdir()?;
//! let records = vec![
//!     Record::new(1, vec![0.0, 0.0]),
//!     Record::new(2, vec![5.0, 5.0]),
//!     Record::new(3, vec![10.0, 10.0]),
//! ];
//! let tree = RStarTree::create_in_dir(dir.path(), &TreeOptions::new(2), records, true)?;
//!
//! let search = BoundingBox::from_corners(&[0.0, 0.0], &[5.0, 5.0])?;
//! assert_eq!(tree.range_query(&search)?.len(), 2);
//! assert_eq!(tree.knn(&[0.0, 0.0], 2)?, vec![1, 2]);
//! assert_eq!(tree.skyline()?, vec![1]);
//! # Ok(())
//! # }
//! ```

pub mod bounding_box;
pub mod config;
pub mod disk_rtree;
pub mod errors;
pub mod query;
pub mod record;
pub mod store;
pub mod zorder;

pub use bounding_box::{BoundingBox, Bounds};
pub use config::{StoreConfig, TreeOptions};
pub use disk_rtree::{IntegrityReport, RStarTree, TreeStats};
pub use errors::{IndexError, IndexResult};
pub use query::{NearestNeighbourQuery, RangeQuery, SkylineQuery, SpatialQuery};
pub use record::{Record, RecordId};
pub use store::{BlockStore, FileBlockStore, MemoryBlockStore, RecordStore, StoreStats};
