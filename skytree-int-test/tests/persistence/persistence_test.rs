//! Trees reopened from their files.

use std::fs::OpenOptions;

use skytree::disk_rtree::{DATA_FILE_NAME, INDEX_FILE_NAME};
use skytree::{BoundingBox, IndexError, Record, TreeOptions};
use skytree_int_test::test_util::{as_set, cleanup, create_test_context, run_test, uniform_records};

#[test]
fn test_reopen_answers_same_queries() {
    run_test(
        || create_test_context(),
        |ctx| {
            let search = BoundingBox::from_corners(&[2_000.0, 2_000.0], &[6_000.0, 5_000.0])?;
            let (range, nearest, skyline, height) = {
                let tree = ctx.create_tree(uniform_records(2_000, 2, 4), false)?;
                tree.sync()?;
                (
                    as_set(tree.range_query(&search)?),
                    tree.knn(&[1_234.0, 8_765.0], 9)?,
                    as_set(tree.skyline()?),
                    tree.height(),
                )
            };

            let tree = ctx.open_tree(false, false)?;
            assert_eq!(tree.height(), height);
            assert_eq!(as_set(tree.range_query(&search)?), range);
            assert_eq!(tree.knn(&[1_234.0, 8_765.0], 9)?, nearest);
            assert_eq!(as_set(tree.skyline()?), skyline);
            assert!(tree.check_integrity()?.is_valid);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_inserts_after_reopen_are_persisted() {
    run_test(
        || create_test_context(),
        |ctx| {
            {
                let tree = ctx.create_tree(uniform_records(500, 2, 9), true)?;
                tree.sync()?;
            }
            {
                let mut tree = ctx.open_tree(false, false)?;
                for id in 500..700 {
                    tree.insert(Record::new(id, vec![id as f64, id as f64]))?;
                }
                tree.sync()?;
            }

            let tree = ctx.open_tree(false, false)?;
            let report = tree.check_integrity()?;
            assert!(report.is_valid, "{:?}", report.errors);
            assert_eq!(report.leaf_entries, 700);
            let diagonal = BoundingBox::from_corners(&[500.0, 500.0], &[699.0, 699.0])?;
            let found = as_set(tree.range_query(&diagonal)?);
            assert!((500..700).all(|id| found.contains(&id)));
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_reconstruct_rebuilds_from_data_file() {
    run_test(
        || create_test_context(),
        |ctx| {
            let records = uniform_records(1_200, 2, 17);
            let expected = {
                let tree = ctx.create_tree(records, false)?;
                tree.sync()?;
                as_set(tree.seq_skyline()?)
            };

            std::fs::remove_file(ctx.path().join(INDEX_FILE_NAME))?;
            let tree = ctx.open_tree(true, true)?;
            assert_eq!(as_set(tree.skyline()?), expected);
            assert_eq!(tree.check_integrity()?.leaf_entries, 1_200);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_truncated_index_is_corrupt() {
    run_test(
        || create_test_context(),
        |ctx| {
            {
                let tree = ctx.create_tree(uniform_records(1_000, 2, 2), false)?;
                tree.sync()?;
            }
            let index = OpenOptions::new()
                .write(true)
                .open(ctx.path().join(INDEX_FILE_NAME))?;
            index.set_len(1024 * 2)?;
            drop(index);

            match ctx.open_tree(false, false) {
                Err(IndexError::CorruptIndex(_)) => Ok(()),
                Err(e) => panic!("unexpected error {e}"),
                Ok(_) => panic!("truncated index opened"),
            }
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_dimension_change_is_rejected() {
    run_test(
        || create_test_context(),
        |ctx| {
            {
                let tree = ctx.create_tree(uniform_records(50, 2, 6), false)?;
                tree.sync()?;
            }
            let options = TreeOptions::new(3)
                .index_block_size(1024)
                .data_block_size(1024);
            let reopened = skytree::RStarTree::open_in_dir(ctx.path(), &options, false, false);
            assert!(matches!(reopened, Err(IndexError::DimensionMismatch { .. })));
            assert!(ctx.path().join(DATA_FILE_NAME).exists());
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}
