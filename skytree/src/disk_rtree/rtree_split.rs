//! R*-tree node split: axis selection by margin, then split index by overlap.

use std::ops::RangeInclusive;

use super::rtree_types::Entry;
use crate::bounding_box::{overlap_volume, BoundingBox};
use crate::errors::{IndexError, IndexResult};

/// One half of a split, with the box enclosing its entries.
#[derive(Debug)]
pub(crate) struct DistributionGroup {
    pub entries: Vec<Entry>,
    pub bbox: BoundingBox,
}

/// A candidate split of a sorted entry list at `split_at`: entries before it
/// form the first group, the rest the second.
#[derive(Debug)]
pub(crate) struct Distribution {
    split_at: usize,
    first: BoundingBox,
    second: BoundingBox,
}

impl Distribution {
    fn perimeter_sum(&self) -> f64 {
        self.first.perimeter() + self.second.perimeter()
    }

    fn overlap(&self) -> f64 {
        overlap_volume(&self.first, &self.second)
    }

    fn area_sum(&self) -> f64 {
        self.first.area() + self.second.area()
    }
}

/// Splits the entries of an overflowing node into two groups.
///
/// Every dimension is sorted by lower and by upper bound. A sorting is rated
/// by the summed perimeters of all its distributions and the first sorting
/// with the smallest total wins. Among that sorting's distributions the one
/// with the least overlap volume between its groups, then the least summed
/// area, is taken.
pub(crate) fn split_entries(
    entries: Vec<Entry>,
    dimensions: usize,
    min_entries: usize,
) -> IndexResult<(DistributionGroup, DistributionGroup)> {
    let count = entries.len();
    let min_group = min_entries.max(1);
    if count < 2 * min_group {
        return Err(IndexError::InvariantViolation(format!(
            "cannot split {count} entries into two groups of at least {min_group}"
        )));
    }
    let split_points = min_group..=count - min_group;

    let mut best: Option<(f64, Vec<Entry>)> = None;
    for dimension in 0..dimensions {
        for by_upper in [false, true] {
            let mut sorted = entries.clone();
            sorted.sort_by(|a, b| {
                axis_key(a, dimension, by_upper).total_cmp(&axis_key(b, dimension, by_upper))
            });
            let margin: f64 = distributions(&sorted, split_points.clone())
                .iter()
                .map(Distribution::perimeter_sum)
                .sum();
            if best.as_ref().map_or(true, |(lowest, _)| margin < *lowest) {
                best = Some((margin, sorted));
            }
        }
    }

    let (_, mut sorted) = best.ok_or_else(|| {
        IndexError::InvariantViolation("split over zero dimensions".to_string())
    })?;
    let chosen = distributions(&sorted, split_points)
        .into_iter()
        .min_by(|a, b| {
            a.overlap()
                .total_cmp(&b.overlap())
                .then_with(|| a.area_sum().total_cmp(&b.area_sum()))
        })
        .ok_or_else(|| IndexError::InvariantViolation("split produced no distribution".to_string()))?;

    let second = sorted.split_off(chosen.split_at);
    if sorted.is_empty() || second.is_empty() {
        return Err(IndexError::InvariantViolation(format!(
            "split of {count} entries did not yield two groups"
        )));
    }
    Ok((
        DistributionGroup {
            entries: sorted,
            bbox: chosen.first,
        },
        DistributionGroup {
            entries: second,
            bbox: chosen.second,
        },
    ))
}

fn axis_key(entry: &Entry, dimension: usize, by_upper: bool) -> f64 {
    let bounds = &entry.bbox().bounds()[dimension];
    if by_upper {
        bounds.upper()
    } else {
        bounds.lower()
    }
}

/// Every distribution of `sorted` whose split point lies in `split_points`.
/// Group boxes come from running prefix and suffix boxes, so building all
/// distributions of one sorting is linear in the entry count.
fn distributions(sorted: &[Entry], split_points: RangeInclusive<usize>) -> Vec<Distribution> {
    let prefix = running_boxes(sorted.iter());
    let mut suffix = running_boxes(sorted.iter().rev());
    suffix.reverse();

    split_points
        .map(|split_at| Distribution {
            split_at,
            first: prefix[split_at - 1].clone(),
            second: suffix[split_at].clone(),
        })
        .collect()
}

/// `result[i]` encloses the first `i + 1` entries yielded by `entries`.
fn running_boxes<'a, I>(entries: I) -> Vec<BoundingBox>
where
    I: Iterator<Item = &'a Entry>,
{
    let mut boxes: Vec<BoundingBox> = Vec::new();
    for entry in entries {
        let next = match boxes.last() {
            Some(previous) => previous.merge(entry.bbox()),
            None => entry.bbox().clone(),
        };
        boxes.push(next);
    }
    boxes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounding_box::minimum_bounding_box;

    fn entry(x: f64, y: f64, id: u64) -> Entry {
        Entry::leaf(BoundingBox::from_point(&[x, y]).unwrap(), id, 1)
    }

    fn ids(group: &DistributionGroup) -> Vec<u64> {
        let mut ids: Vec<u64> = group.entries.iter().filter_map(Entry::record_id).collect();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn test_split_separates_clusters() {
        let entries = vec![
            entry(0.0, 0.0, 1),
            entry(100.0, 1.0, 2),
            entry(1.0, 1.0, 3),
            entry(101.0, 0.0, 4),
            entry(0.5, 0.5, 5),
        ];
        let (a, b) = split_entries(entries, 2, 1).unwrap();
        let mut groups = vec![ids(&a), ids(&b)];
        groups.sort();
        assert_eq!(groups, vec![vec![1, 3, 5], vec![2, 4]]);
        assert_eq!(overlap_volume(&a.bbox, &b.bbox), 0.0);
    }

    #[test]
    fn test_group_sizes_respect_minimum() {
        let entries: Vec<_> = (0..11).map(|i| entry(i as f64, (i * 7 % 5) as f64, i)).collect();
        let (a, b) = split_entries(entries, 2, 4).unwrap();
        assert_eq!(a.entries.len() + b.entries.len(), 11);
        assert!(a.entries.len() >= 4);
        assert!(b.entries.len() >= 4);
    }

    #[test]
    fn test_group_boxes_enclose_entries() {
        let entries: Vec<_> = (0..9)
            .map(|i| entry((i * 13 % 9) as f64, (i * 5 % 7) as f64, i))
            .collect();
        let (a, b) = split_entries(entries, 2, 3).unwrap();
        for group in [&a, &b] {
            let mbb = minimum_bounding_box(group.entries.iter().map(Entry::bbox)).unwrap();
            assert_eq!(group.bbox, mbb);
        }
    }

    #[test]
    fn test_too_few_entries() {
        let entries = vec![entry(0.0, 0.0, 1), entry(1.0, 1.0, 2), entry(2.0, 2.0, 3)];
        assert!(matches!(
            split_entries(entries, 2, 2),
            Err(IndexError::InvariantViolation(_))
        ));
    }
}
