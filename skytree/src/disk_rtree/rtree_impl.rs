//! RStarTree implementation.

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::path::Path;
use std::time::Instant;

use super::integrity::{self, IntegrityReport};
use super::rtree_constants::{
    CHOOSE_SUBTREE_CANDIDATES, DATA_FILE_NAME, INDEX_FILE_NAME, LEAF_LEVEL, ROOT_BLOCK_ID,
};
use super::rtree_split::split_entries;
use super::rtree_storage::NodeStore;
use super::rtree_types::{Entry, Node, TreeStats};
use crate::bounding_box::{center_distance, overlap_volume, BoundingBox};
use crate::config::{StoreConfig, TreeOptions};
use crate::errors::{ensure_dimensions, IndexError, IndexResult};
use crate::query::{NearestNeighbourQuery, RangeQuery, SkylineQuery, SpatialQuery};
use crate::record::{Record, RecordId};
use crate::store::{BlockId, BlockStore, FileBlockStore, MemoryBlockStore, RecordStore, StoreStats};
use crate::zorder::ZOrderKey;

/// What an insertion below a node did to that node's subtree.
enum InsertOutcome {
    Complete,
    /// The child split; the entry points at the new sibling and belongs in
    /// the parent.
    Split(Entry),
    /// Entries were taken out for reinsertion, so boxes along the path may
    /// shrink.
    Shrunk,
}

/// A disk-backed R*-tree over the records of a [`RecordStore`].
///
/// The tree is a set of nodes in an index block store, the root always in
/// block 1. Nothing is kept in memory between calls apart from the derived
/// configuration and the tree height.
pub struct RStarTree {
    config: StoreConfig,
    nodes: NodeStore,
    records: RecordStore,
    height: u32,
    /// One flag per level, reset at the start of every top-level insertion.
    levels_reinserted: Vec<bool>,
    /// Entries removed by forced reinsertion, with the level they go back to.
    pending: VecDeque<(Entry, u32)>,
    stats: TreeStats,
}

impl RStarTree {
    /// Creates a tree over `records`.
    ///
    /// Both stores are reset. The records are packed into the data store in
    /// iteration order and then indexed, in that order or in Z-order when
    /// `bulk` is set.
    pub fn create<I>(
        options: &TreeOptions,
        index: Box<dyn BlockStore>,
        data: Box<dyn BlockStore>,
        records: I,
        bulk: bool,
    ) -> IndexResult<Self>
    where
        I: IntoIterator<Item = Record>,
    {
        let config = StoreConfig::derive(options)?;
        check_block_sizes(&config, index.as_ref(), data.as_ref())?;
        let mut record_store = RecordStore::open(data, &config, true)?;
        if let Err(e) = record_store.append_all(records) {
            record_store.clear()?;
            return Err(e);
        }

        let mut tree = Self::assemble(config, index, record_store);
        tree.rebuild(bulk)?;
        Ok(tree)
    }

    /// Opens a tree over an existing data store.
    ///
    /// With `reconstruct` the index store is reset and rebuilt from every
    /// record, in store order or in Z-order when `bulk` is set. Otherwise the
    /// existing index is used as is; it must hold a tree over the same number
    /// of dimensions.
    pub fn open(
        options: &TreeOptions,
        index: Box<dyn BlockStore>,
        data: Box<dyn BlockStore>,
        reconstruct: bool,
        bulk: bool,
    ) -> IndexResult<Self> {
        let config = StoreConfig::derive(options)?;
        check_block_sizes(&config, index.as_ref(), data.as_ref())?;
        let record_store = RecordStore::open(data, &config, false)?;

        let mut tree = Self::assemble(config, index, record_store);
        if reconstruct {
            log::warn!("Rebuilding index from {} data blocks", tree.records.block_count());
            tree.rebuild(bulk)?;
        } else {
            tree.load_existing()?;
        }
        Ok(tree)
    }

    /// An empty tree on in-memory stores.
    pub fn in_memory(options: &TreeOptions) -> IndexResult<Self> {
        Self::create(
            options,
            Box::new(MemoryBlockStore::new(options.index_block_size)),
            Box::new(MemoryBlockStore::new(options.data_block_size)),
            std::iter::empty(),
            false,
        )
    }

    /// [`RStarTree::create`] on `datafile.dat` and `indexfile.dat` in `dir`.
    pub fn create_in_dir<I>(
        dir: impl AsRef<Path>,
        options: &TreeOptions,
        records: I,
        bulk: bool,
    ) -> IndexResult<Self>
    where
        I: IntoIterator<Item = Record>,
    {
        let (index, data) = open_files(dir.as_ref(), options)?;
        Self::create(options, index, data, records, bulk)
    }

    /// [`RStarTree::open`] on `datafile.dat` and `indexfile.dat` in `dir`.
    pub fn open_in_dir(
        dir: impl AsRef<Path>,
        options: &TreeOptions,
        reconstruct: bool,
        bulk: bool,
    ) -> IndexResult<Self> {
        let (index, data) = open_files(dir.as_ref(), options)?;
        Self::open(options, index, data, reconstruct, bulk)
    }

    fn assemble(config: StoreConfig, index: Box<dyn BlockStore>, records: RecordStore) -> Self {
        let nodes = NodeStore::new(index, config.max_entries);
        Self {
            config,
            nodes,
            records,
            height: 0,
            levels_reinserted: Vec::new(),
            pending: VecDeque::new(),
            stats: TreeStats::default(),
        }
    }

    fn load_existing(&mut self) -> IndexResult<()> {
        let metadata = self.nodes.initialize(self.config.dimensions, false)?;
        if metadata.tree_height == 0 || metadata.block_count <= ROOT_BLOCK_ID {
            return Err(IndexError::CorruptIndex(
                "index store holds no tree".to_string(),
            ));
        }
        let root = self.nodes.read_root()?;
        if root.level != metadata.tree_height {
            return Err(IndexError::CorruptIndex(format!(
                "root level {} disagrees with recorded height {}",
                root.level, metadata.tree_height
            )));
        }
        self.height = metadata.tree_height;
        self.stats.height = self.height;
        log::debug!(
            "Opened existing index of height {} ({} blocks)",
            self.height,
            metadata.block_count
        );
        Ok(())
    }

    /// Resets the index store to an empty leaf root and indexes every record.
    fn rebuild(&mut self, bulk: bool) -> IndexResult<()> {
        let started = Instant::now();
        self.nodes.initialize(self.config.dimensions, true)?;
        let mut root = Node::new(LEAF_LEVEL, Vec::new());
        let root_id = self.nodes.write_new_node(&mut root)?;
        if root_id != ROOT_BLOCK_ID {
            return Err(IndexError::InvariantViolation(format!(
                "root written to block {root_id} instead of {ROOT_BLOCK_ID}"
            )));
        }
        self.stats = TreeStats::default();
        self.set_height(LEAF_LEVEL)?;

        let mut indexed = 0u64;
        if bulk {
            let mut keyed = Vec::new();
            for batch in self.records.scan() {
                let (block, records) = batch?;
                for record in records {
                    let entry = self.leaf_entry(&record, block)?;
                    keyed.push((ZOrderKey::from_point(&record.coordinates), entry));
                }
            }
            keyed.sort_by(|a, b| a.0.cmp(&b.0));
            for (_, entry) in keyed {
                self.insert_entry(entry, LEAF_LEVEL)?;
                indexed += 1;
            }
        } else {
            for block in 1..=self.records.block_count() {
                for record in self.records.read_block(block)? {
                    let entry = self.leaf_entry(&record, block)?;
                    self.insert_entry(entry, LEAF_LEVEL)?;
                    indexed += 1;
                }
            }
        }

        log::info!(
            "Indexed {} records in {:?} (height {}, bulk load: {})",
            indexed,
            started.elapsed(),
            self.height,
            bulk
        );
        Ok(())
    }

    fn leaf_entry(&self, record: &Record, data_block: BlockId) -> IndexResult<Entry> {
        ensure_dimensions(self.config.dimensions, record.dimensions())?;
        Ok(Entry::leaf(record.bounding_box()?, record.id, data_block))
    }

    fn set_height(&mut self, height: u32) -> IndexResult<()> {
        self.nodes.set_height(height)?;
        self.height = height;
        self.stats.height = height;
        Ok(())
    }

    // ========================================================================
    // Insertion
    // ========================================================================

    /// Appends `record` to the data store and indexes it.
    pub fn insert(&mut self, record: Record) -> IndexResult<()> {
        ensure_dimensions(self.config.dimensions, record.dimensions())?;
        let bbox = record.bounding_box()?;
        let record_id = record.id;
        let data_block = self.records.append(record)?;
        self.insert_entry(Entry::leaf(bbox, record_id, data_block), LEAF_LEVEL)
    }

    /// One top-level insertion: places `entry` at `level`, then every entry
    /// that forced reinsertion took out along the way.
    fn insert_entry(&mut self, entry: Entry, level: u32) -> IndexResult<()> {
        self.levels_reinserted.clear();
        self.levels_reinserted.resize(self.height as usize, false);
        self.pending.clear();
        self.pending.push_back((entry, level));
        while let Some((entry, level)) = self.pending.pop_front() {
            self.insert_at(None, entry, level)?;
        }
        Ok(())
    }

    /// Inserts `entry` into the subtree under `parent`'s entry at the given
    /// slot, or under the root when `parent` is `None`.
    ///
    /// The parent entry is enlarged and persisted before descending. A node
    /// that ends up with more than `max_entries` is never written as is; it
    /// goes to [`Self::overflow`].
    fn insert_at(
        &mut self,
        mut parent: Option<(&mut Node, usize)>,
        entry: Entry,
        level: u32,
    ) -> IndexResult<InsertOutcome> {
        let mut node = match parent.as_mut() {
            Some((parent_node, slot)) => {
                let parent_id = parent_node.block_id;
                let parent_entry = &mut parent_node.entries[*slot];
                parent_entry.enlarge_to(entry.bbox());
                let child = parent_entry.child().ok_or_else(|| {
                    IndexError::CorruptIndex(format!(
                        "leaf entry found in internal node {parent_id}"
                    ))
                })?;
                self.nodes.update_node(parent_node)?;
                self.nodes.read_node(child)?
            }
            None => self.nodes.read_root()?,
        };

        if node.level < level {
            return Err(IndexError::CorruptIndex(format!(
                "node {} at level {} lies below target level {}",
                node.block_id, node.level, level
            )));
        }

        if node.level == level {
            node.entries.push(entry);
        } else {
            let slot = self.choose_subtree(&node, entry.bbox(), level)?;
            match self.insert_at(Some((&mut node, slot)), entry, level)? {
                InsertOutcome::Complete => return Ok(InsertOutcome::Complete),
                InsertOutcome::Shrunk => {
                    if let Some((parent_node, parent_slot)) = parent {
                        parent_node.entries[parent_slot].adjust_to_entries(&node.entries);
                        self.nodes.update_node(parent_node)?;
                    }
                    return Ok(InsertOutcome::Shrunk);
                }
                InsertOutcome::Split(sibling) => node.entries.push(sibling),
            }
        }

        if node.len() > self.config.max_entries {
            return self.overflow(parent, node);
        }
        self.nodes.update_node(&node)?;
        Ok(InsertOutcome::Complete)
    }

    /// Picks the slot of `node` whose subtree should receive `bbox`.
    ///
    /// Directly above the target level the entry needing the least overlap
    /// enlargement wins, otherwise the one needing the least area
    /// enlargement. Remaining ties go to the smaller area, then to the
    /// earlier slot.
    fn choose_subtree(&self, node: &Node, bbox: &BoundingBox, level: u32) -> IndexResult<usize> {
        if node.is_empty() {
            return Err(IndexError::InvariantViolation(format!(
                "cannot descend into empty node {}",
                node.block_id
            )));
        }

        let mut area_keys = Vec::with_capacity(node.len());
        for entry in &node.entries {
            let enlargement = entry.bbox().area_enlargement(bbox);
            if enlargement < 0.0 {
                return Err(IndexError::InvariantViolation(format!(
                    "negative area enlargement {enlargement} in node {}",
                    node.block_id
                )));
            }
            area_keys.push((enlargement, entry.bbox().area()));
        }
        let by_area = |a: usize, b: usize| -> Ordering {
            area_keys[a]
                .0
                .total_cmp(&area_keys[b].0)
                .then_with(|| area_keys[a].1.total_cmp(&area_keys[b].1))
        };

        let chosen = if node.level == level + 1 {
            let mut candidates: Vec<usize> = (0..node.len()).collect();
            let limit = CHOOSE_SUBTREE_CANDIDATES;
            if node.len() > limit && (limit as f64) < 2.0 * self.config.max_entries as f64 / 3.0 {
                candidates.sort_by(|&a, &b| by_area(a, b));
                candidates.truncate(limit);
            }
            let mut keyed = Vec::with_capacity(candidates.len());
            for slot in candidates {
                keyed.push((slot, overlap_enlargement(node, slot, bbox)?));
            }
            keyed
                .into_iter()
                .min_by(|(a, overlap_a), (b, overlap_b)| {
                    overlap_a.total_cmp(overlap_b).then_with(|| by_area(*a, *b))
                })
                .map(|(slot, _)| slot)
        } else {
            (0..node.len()).min_by(|&a, &b| by_area(a, b))
        };

        chosen.ok_or_else(|| {
            IndexError::InvariantViolation(format!("no subtree chosen in node {}", node.block_id))
        })
    }

    /// Handles a node holding `max_entries + 1` entries. A non-root node whose
    /// level has not reinserted during this insertion reinserts; any other
    /// node splits.
    fn overflow(
        &mut self,
        parent: Option<(&mut Node, usize)>,
        node: Node,
    ) -> IndexResult<InsertOutcome> {
        let Some((parent_node, slot)) = parent else {
            self.split_root(node)?;
            return Ok(InsertOutcome::Complete);
        };

        let level = node.level;
        if !self.reinserted_at(level) {
            self.mark_reinserted(level);
            self.forced_reinsert(parent_node, slot, node)?;
            return Ok(InsertOutcome::Shrunk);
        }

        let block_id = node.block_id;
        let (first, second) =
            split_entries(node.entries, self.config.dimensions, self.config.min_entries)?;
        let kept = Node {
            level,
            block_id,
            entries: first.entries,
        };
        self.nodes.update_node(&kept)?;
        let mut sibling = Node::new(level, second.entries);
        let sibling_id = self.nodes.write_new_node(&mut sibling)?;

        parent_node.entries[slot] = Entry::pointer(first.bbox, block_id);
        self.nodes.update_node(parent_node)?;
        self.stats.node_splits += 1;
        log::trace!(
            "Split node {} at level {} ({} + {} entries, sibling {})",
            block_id,
            level,
            kept.len(),
            sibling.len(),
            sibling_id
        );
        Ok(InsertOutcome::Split(Entry::pointer(second.bbox, sibling_id)))
    }

    /// Splits the root into two new blocks and puts a new root one level
    /// higher into block 1.
    fn split_root(&mut self, node: Node) -> IndexResult<()> {
        let level = node.level;
        let (first, second) =
            split_entries(node.entries, self.config.dimensions, self.config.min_entries)?;

        let mut left = Node::new(level, first.entries);
        let left_id = self.nodes.write_new_node(&mut left)?;
        let mut right = Node::new(level, second.entries);
        let right_id = self.nodes.write_new_node(&mut right)?;

        let mut root = Node::new(
            level + 1,
            vec![
                Entry::pointer(first.bbox, left_id),
                Entry::pointer(second.bbox, right_id),
            ],
        );
        root.block_id = ROOT_BLOCK_ID;
        self.nodes.update_node(&root)?;
        self.set_height(level + 1)?;
        self.stats.root_splits += 1;
        log::trace!(
            "Root split into blocks {} and {}, tree height is now {}",
            left_id,
            right_id,
            self.height
        );
        Ok(())
    }

    /// Takes the `reinsert_count` entries farthest from the centre of the
    /// parent entry's box out of `node` and queues them for insertion from the
    /// root at the node's level.
    fn forced_reinsert(&mut self, parent_node: &mut Node, slot: usize, node: Node) -> IndexResult<()> {
        if node.len() != self.config.max_entries + 1 {
            return Err(IndexError::InvariantViolation(format!(
                "forced reinsertion on node {} holding {} entries, expected {}",
                node.block_id,
                node.len(),
                self.config.max_entries + 1
            )));
        }

        let level = node.level;
        let block_id = node.block_id;
        let parent_box = parent_node.entries[slot].bbox().clone();
        let mut entries = node.entries;
        entries.sort_by(|a, b| {
            center_distance(a.bbox(), &parent_box).total_cmp(&center_distance(b.bbox(), &parent_box))
        });
        let removed = entries.split_off(entries.len() - self.config.reinsert_count);

        let survivors = Node {
            level,
            block_id,
            entries,
        };
        parent_node.entries[slot].adjust_to_entries(&survivors.entries);
        self.nodes.update_node(parent_node)?;
        self.nodes.update_node(&survivors)?;

        self.stats.forced_reinsertions += 1;
        self.stats.reinserted_entries += removed.len() as u64;
        log::trace!(
            "Forced reinsertion of {} entries from node {} at level {}",
            removed.len(),
            block_id,
            level
        );
        self.pending
            .extend(removed.into_iter().map(|entry| (entry, level)));
        Ok(())
    }

    fn reinserted_at(&self, level: u32) -> bool {
        self.levels_reinserted
            .get((level - LEAF_LEVEL) as usize)
            .copied()
            .unwrap_or(false)
    }

    fn mark_reinserted(&mut self, level: u32) {
        let index = (level - LEAF_LEVEL) as usize;
        if self.levels_reinserted.len() <= index {
            self.levels_reinserted.resize(index + 1, false);
        }
        self.levels_reinserted[index] = true;
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Ids of every record inside or on the border of `search`.
    pub fn range_query(&self, search: &BoundingBox) -> IndexResult<Vec<RecordId>> {
        ensure_dimensions(self.config.dimensions, search.dimensions())?;
        RangeQuery::new(search.clone()).search_index(&self.nodes)
    }

    /// Ids of the `k` records nearest to `point`, nearest first.
    pub fn knn(&self, point: &[f64], k: i64) -> IndexResult<Vec<RecordId>> {
        let query = NearestNeighbourQuery::new(point.to_vec(), k)?;
        ensure_dimensions(self.config.dimensions, point.len())?;
        query.search_index(&self.nodes)
    }

    /// Ids of the records no other record dominates, smaller coordinates
    /// being preferred.
    pub fn skyline(&self) -> IndexResult<Vec<RecordId>> {
        SkylineQuery::new().search_index(&self.nodes)
    }

    /// Skyline of the per-dimension distances `|x - point|`.
    pub fn skyline_from(&self, point: &[f64]) -> IndexResult<Vec<RecordId>> {
        ensure_dimensions(self.config.dimensions, point.len())?;
        SkylineQuery::relative_to(point.to_vec()).search_index(&self.nodes)
    }

    /// [`Self::range_query`] computed by scanning every data block.
    pub fn seq_range_query(&self, search: &BoundingBox) -> IndexResult<Vec<RecordId>> {
        ensure_dimensions(self.config.dimensions, search.dimensions())?;
        RangeQuery::new(search.clone()).scan_records(&self.records)
    }

    /// [`Self::knn`] computed by scanning every data block.
    pub fn seq_knn(&self, point: &[f64], k: i64) -> IndexResult<Vec<RecordId>> {
        let query = NearestNeighbourQuery::new(point.to_vec(), k)?;
        ensure_dimensions(self.config.dimensions, point.len())?;
        query.scan_records(&self.records)
    }

    /// [`Self::skyline`] computed by scanning every data block.
    pub fn seq_skyline(&self) -> IndexResult<Vec<RecordId>> {
        SkylineQuery::new().scan_records(&self.records)
    }

    /// [`Self::skyline_from`] computed by scanning every data block.
    pub fn seq_skyline_from(&self, point: &[f64]) -> IndexResult<Vec<RecordId>> {
        ensure_dimensions(self.config.dimensions, point.len())?;
        SkylineQuery::relative_to(point.to_vec()).scan_records(&self.records)
    }

    /// Runs a caller-built query against the index.
    pub fn search<Q: SpatialQuery>(&self, query: &Q) -> IndexResult<Vec<RecordId>> {
        query.search_index(&self.nodes)
    }

    /// Runs a caller-built query as a sequential scan of the data store.
    pub fn scan<Q: SpatialQuery>(&self, query: &Q) -> IndexResult<Vec<RecordId>> {
        query.scan_records(&self.records)
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    pub fn tree_stats(&self) -> TreeStats {
        self.stats
    }

    /// I/O counters of the index store.
    pub fn index_stats(&self) -> StoreStats {
        self.nodes.stats()
    }

    /// I/O counters of the data store.
    pub fn data_stats(&self) -> StoreStats {
        self.records.stats()
    }

    /// Walks the whole tree and checks its structural invariants.
    pub fn check_integrity(&self) -> IndexResult<IntegrityReport> {
        integrity::check_tree(&self.nodes, &self.records, &self.config, self.height)
    }

    /// Flushes both stores to their backing medium.
    pub fn sync(&self) -> IndexResult<()> {
        self.nodes.sync()?;
        self.records.sync()
    }
}

/// Overlap enlargement of the entry at `slot` when it grows to cover `bbox`,
/// summed against every other entry of `node`.
fn overlap_enlargement(node: &Node, slot: usize, bbox: &BoundingBox) -> IndexResult<f64> {
    let current = node.entries[slot].bbox();
    let enlarged = current.merge(bbox);
    let mut before = 0.0;
    let mut after = 0.0;
    for (other_slot, other) in node.entries.iter().enumerate() {
        if other_slot == slot {
            continue;
        }
        before += overlap_volume(current, other.bbox());
        after += overlap_volume(&enlarged, other.bbox());
    }
    let enlargement = after - before;
    if enlargement < 0.0 {
        return Err(IndexError::InvariantViolation(format!(
            "negative overlap enlargement {enlargement} in node {}",
            node.block_id
        )));
    }
    Ok(enlargement)
}

fn check_block_sizes(
    config: &StoreConfig,
    index: &dyn BlockStore,
    data: &dyn BlockStore,
) -> IndexResult<()> {
    if index.block_size() != config.index_block_size {
        return Err(IndexError::InvalidConfiguration(format!(
            "index store block size {} does not match configured {}",
            index.block_size(),
            config.index_block_size
        )));
    }
    if data.block_size() != config.data_block_size {
        return Err(IndexError::InvalidConfiguration(format!(
            "data store block size {} does not match configured {}",
            data.block_size(),
            config.data_block_size
        )));
    }
    Ok(())
}

fn open_files(
    dir: &Path,
    options: &TreeOptions,
) -> IndexResult<(Box<dyn BlockStore>, Box<dyn BlockStore>)> {
    let index = FileBlockStore::open(dir.join(INDEX_FILE_NAME), options.index_block_size)?;
    let data = FileBlockStore::open(dir.join(DATA_FILE_NAME), options.data_block_size)?;
    Ok((Box::new(index), Box::new(data)))
}
