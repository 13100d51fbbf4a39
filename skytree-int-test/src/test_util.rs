use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use skytree::errors::IndexResult;
use skytree::{RStarTree, Record, TreeOptions};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::{env, fs};

/// Runs a test between a setup and a teardown step.
///
/// The teardown runs even when the test fails or panics; a panic is resumed
/// afterwards so the test harness still reports it.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> IndexResult<()> + std::panic::UnwindSafe,
    B: Fn() -> IndexResult<TestContext>,
    A: Fn(TestContext) -> IndexResult<()>,
{
    let ctx = match before() {
        Ok(ctx) => ctx,
        Err(e) => panic!("Before run failed: {:?}", e),
    };

    let test_ctx = ctx.clone();
    let result = std::panic::catch_unwind(move || test(test_ctx));
    let after_result = after(ctx);

    match result {
        Ok(Ok(())) => {
            if let Err(e) = after_result {
                panic!("After run failed: {:?}", e);
            }
        }
        Ok(Err(e)) => panic!("Test failed: {:?}", e),
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

#[derive(Clone)]
pub struct TestContext {
    path: PathBuf,
    options: TreeOptions,
}

impl TestContext {
    pub fn new(path: PathBuf, options: TreeOptions) -> Self {
        Self { path, options }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> &TreeOptions {
        &self.options
    }

    /// Creates a tree over `records` in the context directory.
    pub fn create_tree(&self, records: Vec<Record>, bulk: bool) -> IndexResult<RStarTree> {
        RStarTree::create_in_dir(&self.path, &self.options, records, bulk)
    }

    /// Opens the tree in the context directory.
    pub fn open_tree(&self, reconstruct: bool, bulk: bool) -> IndexResult<RStarTree> {
        RStarTree::open_in_dir(&self.path, &self.options, reconstruct, bulk)
    }
}

pub fn random_path() -> PathBuf {
    let id = uuid::Uuid::new_v4();
    env::temp_dir().join(format!("skytree-{id}"))
}

/// A fresh directory with small blocks, so modest datasets build deep trees.
pub fn create_test_context() -> IndexResult<TestContext> {
    create_test_context_with(TreeOptions::new(2).index_block_size(1024).data_block_size(1024))
}

pub fn create_test_context_with(options: TreeOptions) -> IndexResult<TestContext> {
    let path = random_path();
    fs::create_dir_all(&path)?;
    log::debug!("Created test directory {}", path.display());
    Ok(TestContext::new(path, options))
}

pub fn cleanup(ctx: TestContext) -> IndexResult<()> {
    if ctx.path.exists() {
        fs::remove_dir_all(&ctx.path)?;
    }
    Ok(())
}

// ============================================================================
// Datasets
// ============================================================================

/// Points drawn uniformly from `[0, 10000)` in every dimension.
pub fn uniform_records(count: u64, dimensions: usize, seed: u64) -> Vec<Record> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|id| {
            let coordinates = (0..dimensions)
                .map(|_| rng.random_range(0.0..10_000.0))
                .collect();
            Record::new(id, coordinates)
        })
        .collect()
}

/// Points gathered around a handful of random centres.
pub fn clustered_records(count: u64, dimensions: usize, seed: u64) -> Vec<Record> {
    let mut rng = StdRng::seed_from_u64(seed);
    let centres: Vec<Vec<f64>> = (0..5)
        .map(|_| {
            (0..dimensions)
                .map(|_| rng.random_range(1_000.0..9_000.0))
                .collect()
        })
        .collect();
    (0..count)
        .map(|id| {
            let centre = &centres[(id % centres.len() as u64) as usize];
            let coordinates = centre
                .iter()
                .map(|c| c + rng.random_range(-250.0..250.0))
                .collect();
            Record::new(id, coordinates)
        })
        .collect()
}

/// A `side x side` grid at integer coordinates, ids in row-major order.
pub fn grid_records(side: u64) -> Vec<Record> {
    (0..side * side)
        .map(|id| Record::new(id, vec![(id % side) as f64, (id / side) as f64]))
        .collect()
}

pub fn as_set(ids: Vec<u64>) -> HashSet<u64> {
    ids.into_iter().collect()
}
