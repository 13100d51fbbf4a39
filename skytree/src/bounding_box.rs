//! Axis-aligned bounding boxes over `D` dimensions and their algebra.
//!
//! A [`BoundingBox`] is a sequence of [`Bounds`], one per dimension. Points
//! are stored as degenerate boxes whose lower and upper bounds coincide.
//! Area, perimeter and center are computed lazily and cached; boxes are never
//! mutated, a new box is built instead.

use std::cell::OnceCell;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{IndexError, IndexResult};

/// A closed interval `[lower, upper]` on one axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    lower: f64,
    upper: f64,
}

impl Bounds {
    /// Creates new bounds, failing with [`IndexError::InvalidBounds`] unless
    /// `lower <= upper`. NaN on either side is rejected as well.
    pub fn new(lower: f64, upper: f64) -> IndexResult<Self> {
        if lower <= upper {
            Ok(Self { lower, upper })
        } else {
            Err(IndexError::InvalidBounds { lower, upper })
        }
    }

    /// Degenerate bounds for a single coordinate.
    pub fn point(value: f64) -> IndexResult<Self> {
        Self::new(value, value)
    }

    pub fn lower(&self) -> f64 {
        self.lower
    }

    pub fn upper(&self) -> f64 {
        self.upper
    }

    pub fn extent(&self) -> f64 {
        self.upper - self.lower
    }

    /// Smallest bounds covering both `self` and `other`.
    pub fn merge(&self, other: &Bounds) -> Bounds {
        Bounds {
            lower: self.lower.min(other.lower),
            upper: self.upper.max(other.upper),
        }
    }

    /// Signed length of the intersection; negative when the intervals are
    /// disjoint and zero when they touch.
    fn overlap_length(&self, other: &Bounds) -> f64 {
        self.upper.min(other.upper) - self.lower.max(other.lower)
    }
}

/// An n-dimensional axis-aligned rectangle.
///
/// # Examples
///
/// ```rust
/// use skytree::bounding_box::{overlaps, BoundingBox, Bounds};
///
/// let query = BoundingBox::new(vec![
///     Bounds::new(0.0, 5.0).unwrap(),
///     Bounds::new(0.0, 5.0).unwrap(),
/// ]);
/// let point = BoundingBox::from_point(&[5.0, 5.0]).unwrap();
/// assert!(overlaps(&query, &point));
/// assert_eq!(query.area(), 25.0);
/// ```
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    bounds: Vec<Bounds>,
    #[serde(skip)]
    area: OnceCell<f64>,
    #[serde(skip)]
    perimeter: OnceCell<f64>,
    #[serde(skip)]
    center: OnceCell<Vec<f64>>,
}

impl BoundingBox {
    pub fn new(bounds: Vec<Bounds>) -> Self {
        Self {
            bounds,
            area: OnceCell::new(),
            perimeter: OnceCell::new(),
            center: OnceCell::new(),
        }
    }

    /// Degenerate box whose lower and upper corners are both `point`.
    pub fn from_point(point: &[f64]) -> IndexResult<Self> {
        let bounds = point
            .iter()
            .map(|&c| Bounds::point(c))
            .collect::<IndexResult<Vec<_>>>()?;
        Ok(Self::new(bounds))
    }

    /// Box spanning `lower` to `upper`, one coordinate per dimension.
    pub fn from_corners(lower: &[f64], upper: &[f64]) -> IndexResult<Self> {
        crate::errors::ensure_dimensions(lower.len(), upper.len())?;
        let bounds = lower
            .iter()
            .zip(upper)
            .map(|(&l, &u)| Bounds::new(l, u))
            .collect::<IndexResult<Vec<_>>>()?;
        Ok(Self::new(bounds))
    }

    pub fn bounds(&self) -> &[Bounds] {
        &self.bounds
    }

    pub fn dimensions(&self) -> usize {
        self.bounds.len()
    }

    /// Product of the extents. The absolute value keeps degenerate boxes at
    /// zero instead of negative zero.
    pub fn area(&self) -> f64 {
        *self
            .area
            .get_or_init(|| self.bounds.iter().map(Bounds::extent).product::<f64>().abs())
    }

    /// Sum of the extents.
    pub fn perimeter(&self) -> f64 {
        *self
            .perimeter
            .get_or_init(|| self.bounds.iter().map(|b| b.extent().abs()).sum())
    }

    /// Per-dimension midpoint.
    pub fn center(&self) -> &[f64] {
        self.center.get_or_init(|| {
            self.bounds
                .iter()
                .map(|b| (b.upper + b.lower) / 2.0)
                .collect()
        })
    }

    /// The corner holding every dimension's lower bound.
    pub fn lower_corner(&self) -> Vec<f64> {
        self.bounds.iter().map(Bounds::lower).collect()
    }

    /// Smallest box covering both `self` and `other`.
    pub fn merge(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox::new(
            self.bounds
                .iter()
                .zip(&other.bounds)
                .map(|(a, b)| a.merge(b))
                .collect(),
        )
    }

    /// Growth in area needed for `self` to cover `other`.
    pub fn area_enlargement(&self, other: &BoundingBox) -> f64 {
        self.merge(other).area() - self.area()
    }

    /// Euclidean distance from `point` to the nearest point of the box,
    /// zero when the point lies inside.
    pub fn min_point_distance(&self, point: &[f64]) -> f64 {
        self.bounds
            .iter()
            .zip(point)
            .map(|(b, &p)| {
                let nearest = p.clamp(b.lower, b.upper);
                (p - nearest).powi(2)
            })
            .sum::<f64>()
            .sqrt()
    }

    /// Per-dimension distance from `point` to the box, zero on axes where the
    /// point falls inside the interval.
    pub fn axis_distances(&self, point: &[f64]) -> Vec<f64> {
        self.bounds
            .iter()
            .zip(point)
            .map(|(b, &p)| (p - p.clamp(b.lower, b.upper)).abs())
            .collect()
    }

    /// True when `other` lies entirely inside `self`.
    pub fn contains(&self, other: &BoundingBox) -> bool {
        self.bounds
            .iter()
            .zip(&other.bounds)
            .all(|(a, b)| a.lower <= b.lower && b.upper <= a.upper)
    }

    pub fn contains_point(&self, point: &[f64]) -> bool {
        self.bounds
            .iter()
            .zip(point)
            .all(|(b, &p)| b.lower <= p && p <= b.upper)
    }
}

impl PartialEq for BoundingBox {
    fn eq(&self, other: &Self) -> bool {
        self.bounds == other.bounds
    }
}

impl fmt::Debug for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundingBox")
            .field("bounds", &self.bounds)
            .finish()
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BoundingBox(")?;
        for (i, b) in self.bounds.iter().enumerate() {
            if i > 0 {
                write!(f, " x ")?;
            }
            write!(f, "[{}, {}]", b.lower, b.upper)?;
        }
        write!(f, ")")
    }
}

/// True when the boxes intersect or touch on every axis.
pub fn overlaps(a: &BoundingBox, b: &BoundingBox) -> bool {
    a.bounds
        .iter()
        .zip(&b.bounds)
        .all(|(x, y)| x.overlap_length(y) >= 0.0)
}

/// Volume of the intersection of two boxes.
///
/// Touching boxes overlap according to [`overlaps`] but have zero overlap
/// volume here: any axis with an overlap length `<= 0` yields 0.
pub fn overlap_volume(a: &BoundingBox, b: &BoundingBox) -> f64 {
    let mut volume = 1.0;
    for (x, y) in a.bounds.iter().zip(&b.bounds) {
        let length = x.overlap_length(y);
        if length <= 0.0 {
            return 0.0;
        }
        volume *= length;
    }
    volume
}

/// Per-dimension minimum of lowers and maximum of uppers, `None` when there
/// are no boxes.
pub fn minimum_bounding_box<'a, I>(boxes: I) -> Option<BoundingBox>
where
    I: IntoIterator<Item = &'a BoundingBox>,
{
    let mut iter = boxes.into_iter();
    let first = iter.next()?;
    let mut bounds = first.bounds.clone();
    for next in iter {
        for (acc, b) in bounds.iter_mut().zip(&next.bounds) {
            *acc = acc.merge(b);
        }
    }
    Some(BoundingBox::new(bounds))
}

/// Euclidean distance between the centers of two boxes.
pub fn center_distance(a: &BoundingBox, b: &BoundingBox) -> f64 {
    a.center()
        .iter()
        .zip(b.center())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}
