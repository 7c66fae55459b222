//! Structured error types for shadowscope
//!
//! Using thiserror for automatic Display implementation and error chaining.

use shadowscope_common::StreamError;
use thiserror::Error;

/// Failures of the aggregation engine.
///
/// A shadow that returned one of these must be treated as corrupt and
/// discarded by the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DrawableError {
    #[error("Incompatible topology: shadow has {expected} vertices, drawable has {found}")]
    IncompatibleTopology { expected: usize, found: usize },

    #[error("Shadow is finalized; real drawables can no longer be merged into it")]
    MergeIntoFinalized,
}

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Invalid topology code: {0}")]
    InvalidTopology(i8),

    #[error("Invalid info type tag: {0:?}")]
    InvalidInfoType(char),

    #[error("Invalid drawable record tag: {0}")]
    InvalidRecordTag(u8),

    #[error("Invalid vertex count {0}")]
    InvalidVertexCount(i16),

    #[error("Negative element count {0}")]
    NegativeCount(i32),

    #[error("Shadow over [{earliest}, {latest}] must be finalized before it is written")]
    UnfinalizedShadow { earliest: f64, latest: f64 },

    #[error("Not a shadowscope container (magic {0:?})")]
    BadMagic([u8; 4]),

    #[error("Unsupported container version {0}")]
    UnsupportedVersion(i16),

    #[error("Invalid byte order flag {0}")]
    InvalidByteOrder(u8),

    #[error("{what} count {count} exceeds the {limit} limit")]
    TooMany { what: &'static str, count: usize, limit: usize },

    #[error(transparent)]
    Stream(#[from] StreamError),
}

impl From<std::io::Error> for CodecError {
    fn from(err: std::io::Error) -> Self {
        CodecError::Stream(StreamError::Io(err))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PyramidError {
    #[error("Leaf bin count must be a power of two, got {0}")]
    InvalidLeafBins(usize),

    #[error(transparent)]
    Drawable(#[from] DrawableError),
}

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Event {index} has no usable {field:?} field")]
    MissingField { index: usize, field: &'static str },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topology_error_display() {
        let err = DrawableError::IncompatibleTopology { expected: 2, found: 1 };
        assert_eq!(
            err.to_string(),
            "Incompatible topology: shadow has 2 vertices, drawable has 1"
        );
    }

    #[test]
    fn test_io_error_wraps_into_stream() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short read");
        let err = CodecError::from(io);
        assert!(matches!(err, CodecError::Stream(StreamError::Io(_))));
        assert!(err.to_string().contains("short read"));
    }

    #[test]
    fn test_missing_field_display() {
        let err = ConvertError::MissingField { index: 3, field: "ts" };
        assert!(err.to_string().contains("Event 3"));
        assert!(err.to_string().contains("\"ts\""));
    }
}
