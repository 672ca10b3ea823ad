//! WordprocessingML (.docx) editing over raw XML parts.
//!
//! [`Package`] loads a document and hands out the main document tree and the
//! parts related to it. The editing modules work directly on those trees:
//!
//! - [`paragraph`] splits and replaces runs without losing their formatting
//! - [`search`] finds and replaces text across run boundaries
//! - [`notes`] inserts, removes and repairs footnotes and endnotes
//! - [`table`] merges table cells
//! - [`settings`] writes editing restrictions
//! - [`properties`] reads core properties and document statistics
pub mod format;
pub mod notes;
pub mod package;
pub mod paragraph;
pub mod properties;
pub mod search;
pub mod settings;
pub mod styles;
pub mod table;

#[cfg(test)]
pub(crate) mod fixtures;

pub use format::{RunFormat, UnderlineStyle, VerticalAlign};
pub use notes::{NoteId, NoteKind, NoteManager};
pub use package::Package;
pub use paragraph::Paragraph;
pub use properties::{CoreProperties, DocumentInfo};
pub use search::{SearchOptions, TextMatch};
pub use settings::{EditingRestriction, ProtectionType};
pub use table::{TableShape, VMergeState};
