//! Error types for the R*-tree and its block stores.
//!
//! Every variant is fatal at the point it is detected. The index never retries
//! an operation; callers decide how to present the failure.

use std::io;
use thiserror::Error;

/// Errors that can occur while building or querying the index.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("invalid bounds: lower {lower} is greater than upper {upper}")]
    InvalidBounds { lower: f64, upper: f64 },

    #[error("invalid neighbour count {0}: k must not be negative")]
    InvalidK(i64),

    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("block overflow: payload of {size} bytes exceeds block size {block_size}")]
    BlockOverflow { size: usize, block_size: usize },

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<bincode::error::EncodeError> for IndexError {
    fn from(err: bincode::error::EncodeError) -> Self {
        IndexError::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for IndexError {
    fn from(err: bincode::error::DecodeError) -> Self {
        IndexError::Serialization(err.to_string())
    }
}

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;

/// Fails with [`IndexError::DimensionMismatch`] unless `actual == expected`.
pub(crate) fn ensure_dimensions(expected: usize, actual: usize) -> IndexResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(IndexError::DimensionMismatch { expected, actual })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_converts() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let err: IndexError = io_err.into();
        assert!(matches!(err, IndexError::Io(_)));
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn test_display_messages() {
        let err = IndexError::InvalidBounds { lower: 2.0, upper: 1.0 };
        assert_eq!(
            err.to_string(),
            "invalid bounds: lower 2 is greater than upper 1"
        );

        let err = IndexError::BlockOverflow { size: 40000, block_size: 32768 };
        assert!(err.to_string().contains("40000"));
        assert!(err.to_string().contains("32768"));

        let err = IndexError::InvalidK(-3);
        assert!(err.to_string().contains("-3"));
    }

    #[test]
    fn test_ensure_dimensions() {
        assert!(ensure_dimensions(2, 2).is_ok());
        let err = ensure_dimensions(2, 3).unwrap_err();
        assert!(matches!(
            err,
            IndexError::DimensionMismatch { expected: 2, actual: 3 }
        ));
    }
}
