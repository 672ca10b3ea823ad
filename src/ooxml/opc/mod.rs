//! Open Packaging Conventions layer.
//!
//! Reads the ZIP container into named parts, resolves relationships and
//! content types, and writes edited packages back out.

pub mod constants;
pub mod content_types;
pub mod error;
pub mod package;
pub mod packuri;
pub mod part;
pub mod phys_pkg;
pub mod rel;

pub use error::{OpcError, Result};
pub use package::OpcPackage;
pub use packuri::PackURI;
pub use part::Part;
pub use rel::Relationship;
