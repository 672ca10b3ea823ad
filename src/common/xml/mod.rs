//! XML helpers shared by all package parts.
//!
//! - `escape`: text/attribute escaping and reference resolution
//! - `tree`: the owned, mutable element tree parts are edited through

mod escape;
pub mod tree;

pub use escape::{escape_attr, escape_text, resolve_reference};
pub use tree::{XML_DECLARATION, XmlDocument, XmlElement, XmlError, XmlNode};
