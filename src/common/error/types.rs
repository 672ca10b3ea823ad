//! Unified error types for longan.
//!
//! Every operation of the crate reports failures through [`Error`]. The
//! variants mirror the failure taxonomy callers see at the tool boundary,
//! where an error is flattened into an [`ErrorKind`] and a message.
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Main error type for longan operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Referenced paragraph, table, note, part or path is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// An index exceeds the current structure size
    #[error("Out of bounds: {0}")]
    OutOfBounds(String),

    /// A character offset exceeds the paragraph's logical length
    #[error("Range out of bounds: {0}")]
    RangeOutOfBounds(String),

    /// Malformed offset or index pair (start after end)
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    /// A text locator matched zero or several candidates where one was required
    #[error("Ambiguous location: {0}")]
    AmbiguousLocation(String),

    /// Conflicting table merge
    #[error("Overlapping merge: {0}")]
    Overlap(String),

    /// Password does not match the stored verifier or hash
    #[error("Incorrect password")]
    BadPassword,

    /// Input is already wrapped in the encrypted container
    #[error("Package is already protected")]
    AlreadyProtected,

    /// Input carries no protection to remove
    #[error("Package is not protected: {0}")]
    NotProtected(String),

    /// Package source/sink failure
    #[error("Transfer error: {0}")]
    TransferError(String),

    /// Package source/sink did not answer in time
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// The package or one of its XML parts is structurally broken
    #[error("Corrupt package: {0}")]
    CorruptPackage(String),

    /// Caller supplied an unusable argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Feature disabled at compile time
    #[error("Feature '{0}' is disabled. Enable it with --features {0}")]
    FeatureDisabled(String),
}

/// Machine-readable classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    NotFound,
    OutOfBounds,
    RangeOutOfBounds,
    InvalidRange,
    AmbiguousLocation,
    Overlap,
    BadPassword,
    AlreadyProtected,
    NotProtected,
    TransferError,
    Timeout,
    CorruptPackage,
    InvalidArgument,
    FeatureDisabled,
}

impl Error {
    /// Get the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::OutOfBounds(_) => ErrorKind::OutOfBounds,
            Error::RangeOutOfBounds(_) => ErrorKind::RangeOutOfBounds,
            Error::InvalidRange(_) => ErrorKind::InvalidRange,
            Error::AmbiguousLocation(_) => ErrorKind::AmbiguousLocation,
            Error::Overlap(_) => ErrorKind::Overlap,
            Error::BadPassword => ErrorKind::BadPassword,
            Error::AlreadyProtected => ErrorKind::AlreadyProtected,
            Error::NotProtected(_) => ErrorKind::NotProtected,
            Error::TransferError(_) => ErrorKind::TransferError,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::CorruptPackage(_) => ErrorKind::CorruptPackage,
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::FeatureDisabled(_) => ErrorKind::FeatureDisabled,
        }
    }
}

/// Result type for longan operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(Error::BadPassword.kind(), ErrorKind::BadPassword);
        assert_eq!(
            Error::Overlap("cell (1, 1)".into()).kind(),
            ErrorKind::Overlap
        );
        assert_eq!(
            Error::Timeout(Duration::from_secs(3)).kind(),
            ErrorKind::Timeout
        );
    }

    #[test]
    fn test_kind_serializes_as_name() {
        let json = serde_json::to_string(&ErrorKind::AmbiguousLocation).unwrap();
        assert_eq!(json, "\"AmbiguousLocation\"");
    }
}
