//! Tree shape under incremental inserts and bulk loading.

use skytree::{BoundingBox, IndexError, Record, TreeOptions};
use skytree_int_test::test_util::{
    as_set, cleanup, clustered_records, create_test_context, create_test_context_with, run_test,
    uniform_records,
};

#[test]
fn test_incremental_inserts_keep_invariants() {
    run_test(
        || create_test_context(),
        |ctx| {
            let mut tree = ctx.create_tree(Vec::new(), false)?;
            for (i, record) in clustered_records(3_000, 2, 31).into_iter().enumerate() {
                tree.insert(record)?;
                if (i + 1) % 1_000 == 0 {
                    let report = tree.check_integrity()?;
                    assert!(report.is_valid, "after {} inserts: {:?}", i + 1, report.errors);
                    assert_eq!(report.leaf_entries, i as u64 + 1);
                }
            }
            let stats = tree.tree_stats();
            assert!(stats.forced_reinsertions > 0);
            assert!(stats.node_splits > 0);
            assert_eq!(stats.root_splits as u32 + 1, tree.height());
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_bulk_and_incremental_agree() {
    run_test(
        || create_test_context(),
        |ctx| {
            let records = uniform_records(2_000, 2, 77);
            let incremental = ctx.create_tree(records.clone(), false)?;
            let plain_range = {
                let search = BoundingBox::from_corners(&[1_000.0, 1_000.0], &[4_000.0, 2_500.0])?;
                as_set(incremental.range_query(&search)?)
            };
            let plain_knn = incremental.knn(&[7_000.0, 3_000.0], 25)?;
            let plain_skyline = as_set(incremental.skyline()?);
            drop(incremental);

            let bulk = ctx.create_tree(records, true)?;
            let search = BoundingBox::from_corners(&[1_000.0, 1_000.0], &[4_000.0, 2_500.0])?;
            assert_eq!(as_set(bulk.range_query(&search)?), plain_range);
            assert_eq!(bulk.knn(&[7_000.0, 3_000.0], 25)?, plain_knn);
            assert_eq!(as_set(bulk.skyline()?), plain_skyline);

            let report = bulk.check_integrity()?;
            assert!(report.is_valid, "{:?}", report.errors);
            assert_eq!(report.misplaced_records, 0);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_root_split_before_any_reinsertion() {
    run_test(
        || create_test_context(),
        |ctx| {
            let mut tree = ctx.create_tree(Vec::new(), false)?;
            let max = tree.config().max_entries as u64;
            for id in 0..=max {
                tree.insert(Record::new(id, vec![id as f64, (id * 3 % 7) as f64]))?;
            }
            let stats = tree.tree_stats();
            assert_eq!(stats.root_splits, 1);
            assert_eq!(stats.forced_reinsertions, 0);
            assert_eq!(tree.height(), 2);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_higher_dimensions() {
    run_test(
        || create_test_context_with(TreeOptions::new(5).index_block_size(2048).data_block_size(2048)),
        |ctx| {
            let records = uniform_records(1_000, 5, 55);
            let tree = ctx.create_tree(records, true)?;
            assert!(tree.check_integrity()?.is_valid);

            let search = BoundingBox::from_corners(&[0.0; 5], &[6_000.0; 5])?;
            assert_eq!(
                as_set(tree.range_query(&search)?),
                as_set(tree.seq_range_query(&search)?)
            );
            let point = [5_000.0; 5];
            assert_eq!(tree.knn(&point, 10)?, tree.seq_knn(&point, 10)?);
            assert_eq!(as_set(tree.skyline()?), as_set(tree.seq_skyline()?));
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_rejects_bad_input() {
    run_test(
        || create_test_context(),
        |ctx| {
            let mut tree = ctx.create_tree(uniform_records(10, 2, 1), false)?;
            assert!(matches!(
                tree.insert(Record::new(99, vec![1.0])),
                Err(IndexError::DimensionMismatch { .. })
            ));
            assert!(matches!(
                tree.insert(Record::new(99, vec![f64::NAN, 1.0])),
                Err(IndexError::InvalidBounds { .. })
            ));
            assert!(matches!(tree.knn(&[0.0, 0.0], -3), Err(IndexError::InvalidK(-3))));
            assert!(tree.knn(&[0.0, 0.0], 0)?.is_empty());
            assert_eq!(tree.check_integrity()?.leaf_entries, 10);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}
