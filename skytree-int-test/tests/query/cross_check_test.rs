//! Indexed queries checked against their sequential scans.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use skytree::query::dominates;
use skytree::{BoundingBox, Record};
use skytree_int_test::test_util::{
    as_set, cleanup, clustered_records, create_test_context, grid_records, run_test,
    uniform_records,
};

#[test]
fn test_three_point_scenario() {
    run_test(
        || create_test_context(),
        |ctx| {
            let records = vec![
                Record::new(1, vec![0.0, 0.0]),
                Record::new(2, vec![5.0, 5.0]),
                Record::new(3, vec![10.0, 10.0]),
            ];
            let tree = ctx.create_tree(records, false)?;

            let search = BoundingBox::from_corners(&[0.0, 0.0], &[5.0, 5.0])?;
            assert_eq!(as_set(tree.range_query(&search)?), as_set(vec![1, 2]));
            assert_eq!(tree.knn(&[0.0, 0.0], 2)?, vec![1, 2]);
            assert_eq!(tree.skyline()?, vec![1]);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_range_matches_sequential() {
    run_test(
        || create_test_context(),
        |ctx| {
            let tree = ctx.create_tree(uniform_records(3_000, 2, 1), false)?;
            let mut rng = StdRng::seed_from_u64(11);
            for _ in 0..50 {
                let x = rng.random_range(0.0..10_000.0);
                let y = rng.random_range(0.0..10_000.0);
                let w = rng.random_range(10.0..3_000.0);
                let h = rng.random_range(10.0..3_000.0);
                let search = BoundingBox::from_corners(&[x, y], &[x + w, y + h])?;
                assert_eq!(
                    as_set(tree.range_query(&search)?),
                    as_set(tree.seq_range_query(&search)?),
                    "range {search}"
                );
            }
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_range_on_grid_borders() {
    run_test(
        || create_test_context(),
        |ctx| {
            let tree = ctx.create_tree(grid_records(40), true)?;
            let search = BoundingBox::from_corners(&[10.0, 10.0], &[12.0, 11.0])?;
            let expected = as_set(vec![410, 411, 412, 450, 451, 452]);
            assert_eq!(as_set(tree.range_query(&search)?), expected);
            assert_eq!(as_set(tree.seq_range_query(&search)?), expected);

            let single = BoundingBox::from_point(&[39.0, 39.0])?;
            assert_eq!(tree.range_query(&single)?, vec![1599]);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_knn_matches_sequential() {
    run_test(
        || create_test_context(),
        |ctx| {
            let records = clustered_records(2_500, 2, 3);
            let tree = ctx.create_tree(records.clone(), true)?;
            let mut rng = StdRng::seed_from_u64(5);
            for k in [1i64, 5, 17, 64] {
                let point = [rng.random_range(0.0..10_000.0), rng.random_range(0.0..10_000.0)];
                let indexed = tree.knn(&point, k)?;
                assert_eq!(indexed, tree.seq_knn(&point, k)?);
                assert_eq!(indexed.len(), k as usize);

                let distances: Vec<f64> = indexed
                    .iter()
                    .map(|id| records[*id as usize].distance_to(&point))
                    .collect();
                assert!(distances.windows(2).all(|w| w[0] <= w[1]));
            }
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_knn_on_grid_resolves_ties_by_id() {
    run_test(
        || create_test_context(),
        |ctx| {
            let plain = ctx.create_tree(grid_records(40), false)?;
            let mut answers = Vec::new();
            for point in [[10.0, 10.0], [20.5, 20.5], [0.0, 39.0], [17.0, 3.5]] {
                for k in [1i64, 2, 3, 5, 8, 13] {
                    let indexed = plain.knn(&point, k)?;
                    assert_eq!(indexed, plain.seq_knn(&point, k)?, "k = {k} at {point:?}");
                    answers.push((point, k, indexed));
                }
            }
            // (10, 10) is id 410; 370, 409, 411 and 450 all lie at distance 1.
            assert_eq!(plain.knn(&[10.0, 10.0], 2)?, vec![410, 370]);
            drop(plain);

            let bulk = ctx.create_tree(grid_records(40), true)?;
            for (point, k, expected) in answers {
                assert_eq!(bulk.knn(&point, k)?, expected, "k = {k} at {point:?}");
                assert_eq!(bulk.seq_knn(&point, k)?, expected);
            }
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_skyline_matches_sequential() {
    run_test(
        || create_test_context(),
        |ctx| {
            let records = uniform_records(2_000, 2, 8);
            let tree = ctx.create_tree(records.clone(), false)?;
            let skyline = tree.skyline()?;
            assert_eq!(as_set(skyline.clone()), as_set(tree.seq_skyline()?));

            let members: Vec<&Record> = skyline.iter().map(|id| &records[*id as usize]).collect();
            for a in &members {
                for b in &members {
                    assert!(!dominates(&a.coordinates, &b.coordinates));
                }
            }
            for record in &records {
                if !skyline.contains(&record.id) {
                    assert!(members.iter().any(|m| dominates(&m.coordinates, &record.coordinates)));
                }
            }
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_dynamic_skyline_matches_sequential() {
    run_test(
        || create_test_context(),
        |ctx| {
            let tree = ctx.create_tree(clustered_records(1_500, 2, 21), true)?;
            for point in [[5_000.0, 5_000.0], [0.0, 10_000.0], [2_500.0, 7_500.0]] {
                assert_eq!(
                    as_set(tree.skyline_from(&point)?),
                    as_set(tree.seq_skyline_from(&point)?)
                );
            }
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_small_range_reads_fewer_blocks_than_scan() {
    run_test(
        || create_test_context(),
        |ctx| {
            let tree = ctx.create_tree(uniform_records(5_000, 2, 13), true)?;
            let search = BoundingBox::from_corners(&[100.0, 100.0], &[300.0, 300.0])?;

            let index_before = tree.index_stats();
            tree.range_query(&search)?;
            let index_reads = tree.index_stats().since(&index_before).blocks_read;

            let data_before = tree.data_stats();
            tree.seq_range_query(&search)?;
            let data_reads = tree.data_stats().since(&data_before).blocks_read;

            assert!(index_reads < data_reads, "{index_reads} >= {data_reads}");
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}
