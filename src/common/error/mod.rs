//! Unified error types for longan.
//!
//! Package-layer failures ([`crate::ooxml::opc::error::OpcError`]) and
//! third-party errors are folded into a single [`Error`] so callers see one
//! consistent taxonomy.

// Submodule declarations
pub mod conversions;
pub mod types;

// Re-exports
pub use types::{Error, ErrorKind, Result};
