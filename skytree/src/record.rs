use serde::{Deserialize, Serialize};

use crate::bounding_box::BoundingBox;
use crate::errors::IndexResult;

/// Identifier of an indexed record.
pub type RecordId = u64;

/// A point record: an id and one coordinate per dataset dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub coordinates: Vec<f64>,
}

impl Record {
    pub fn new(id: RecordId, coordinates: Vec<f64>) -> Self {
        Self { id, coordinates }
    }

    pub fn dimensions(&self) -> usize {
        self.coordinates.len()
    }

    /// Degenerate box at the record's coordinates.
    pub fn bounding_box(&self) -> IndexResult<BoundingBox> {
        BoundingBox::from_point(&self.coordinates)
    }

    /// Euclidean distance to `point`.
    pub fn distance_to(&self, point: &[f64]) -> f64 {
        self.coordinates
            .iter()
            .zip(point)
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>()
            .sqrt()
    }
}
