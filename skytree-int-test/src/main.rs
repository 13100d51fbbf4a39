use skytree::errors::IndexResult;
use skytree::{BoundingBox, TreeOptions};
use skytree_int_test::test_util::{cleanup, create_test_context_with, uniform_records};

fn main() -> IndexResult<()> {
    colog::init();
    println!("Starting stress test...");
    let ctx = create_test_context_with(TreeOptions::new(2))?;

    let count = 200_000;
    let records = uniform_records(count, 2, 42);

    let start = std::time::Instant::now();
    let tree = ctx.create_tree(records, true)?;
    println!(
        "Bulk loaded {} records in {:?} (height {})",
        count,
        start.elapsed(),
        tree.height()
    );

    let search = BoundingBox::from_corners(&[4_000.0, 4_000.0], &[4_200.0, 4_200.0])?;
    let before = tree.index_stats();
    let start = std::time::Instant::now();
    let found = tree.range_query(&search)?.len();
    println!(
        "Indexed range query found {} records in {:?}, {} index blocks read",
        found,
        start.elapsed(),
        tree.index_stats().since(&before).blocks_read
    );

    let before = tree.data_stats();
    let start = std::time::Instant::now();
    let found = tree.seq_range_query(&search)?.len();
    println!(
        "Sequential range query found {} records in {:?}, {} data blocks read",
        found,
        start.elapsed(),
        tree.data_stats().since(&before).blocks_read
    );

    let start = std::time::Instant::now();
    let nearest = tree.knn(&[5_000.0, 5_000.0], 100)?;
    println!("Found {} nearest neighbours in {:?}", nearest.len(), start.elapsed());

    let start = std::time::Instant::now();
    let skyline = tree.skyline()?;
    println!("Computed skyline of {} records in {:?}", skyline.len(), start.elapsed());

    drop(tree);
    cleanup(ctx)
}
