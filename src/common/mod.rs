//! Types shared by every layer of the crate.
//!
//! - [`error`]: the unified [`Error`] and its [`ErrorKind`](error::ErrorKind)
//! - [`xml`]: a mutable element tree over quick-xml

// Submodule declarations
pub mod error;
pub mod xml;

// Re-exports for convenience
pub use error::{Error, ErrorKind, Result};
