//! Named document tools with JSON arguments and results.
//!
//! [`Tools::call`] is the whole boundary: a tool name, a JSON object of
//! arguments and a [`ToolResponse`] back. Indices are 0-based. Tools that
//! write a package accept an optional `output_filename`; without it the input
//! package is updated in place.
//!
//! ```no_run
//! use longan::config::Config;
//! use longan::store::LocalStore;
//! use longan::tools::Tools;
//! use serde_json::json;
//!
//! # async fn demo() {
//! let config = Config::default();
//! let tools = Tools::new(LocalStore::new(None), &config);
//! let response = tools
//!     .call("add_footnote_after_text", json!({
//!         "filename": "report.docx",
//!         "search_text": "quarterly results",
//!         "footnote_text": "Unaudited.",
//!     }))
//!     .await;
//! println!("{}", serde_json::to_string_pretty(&response).unwrap());
//! # }
//! ```
mod document;
mod notes;
mod protection;
mod tables;
mod text;

use crate::common::error::{Error, ErrorKind, Result};
use crate::config::Config;
use crate::ooxml::docx::NoteKind;
use crate::store::{PackageStore, Workspace};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, warn};

use document::DocumentTools;
use notes::NoteTools;
use protection::ProtectionTools;
use tables::TableTools;
use text::TextTools;

/// Every tool [`Tools::call`] understands.
pub const TOOL_NAMES: &[&str] = &[
    // notes
    "add_footnote_to_document",
    "add_footnote_after_text",
    "add_footnote_before_text",
    "add_endnote_to_document",
    "add_endnote_after_text",
    "delete_footnote_from_document",
    "delete_endnote_from_document",
    "validate_document_footnotes",
    "clean_orphaned_notes",
    "list_notes",
    // text
    "find_text_in_document",
    "search_and_replace",
    // tables
    "merge_table_cells",
    "merge_table_cells_horizontal",
    "merge_table_cells_vertical",
    "get_table_shape",
    // protection
    "protect_document",
    "unprotect_document",
    "add_restricted_editing",
    "remove_restricted_editing",
    "get_protection_status",
    // document
    "get_document_text",
    "get_document_xml",
    "get_document_info",
    "list_available_documents",
    "copy_document",
];

/// Outcome of a tool call as it crosses the boundary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ToolResponse {
    Ok { result: Value },
    Error { kind: ErrorKind, message: String },
}

impl ToolResponse {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    /// The error kind, if the call failed.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Ok { .. } => None,
            Self::Error { kind, .. } => Some(*kind),
        }
    }
}

impl From<Result<Value>> for ToolResponse {
    fn from(result: Result<Value>) -> Self {
        match result {
            Ok(result) => Self::Ok { result },
            Err(e) => Self::Error {
                kind: e.kind(),
                message: e.to_string(),
            },
        }
    }
}

/// Tool executor over a package store.
#[derive(Debug)]
pub struct Tools<S> {
    workspace: Workspace<S>,
    spin_count: u32,
}

impl<S: PackageStore> Tools<S> {
    pub fn new(store: S, config: &Config) -> Self {
        Self {
            workspace: Workspace::new(store, &config.storage),
            spin_count: config.protection.spin_count,
        }
    }

    #[inline]
    pub fn workspace(&self) -> &Workspace<S> {
        &self.workspace
    }

    /// Run a tool by name.
    pub async fn call(&self, name: &str, arguments: Value) -> ToolResponse {
        info!(tool = name, "tool call");
        let result = self.dispatch(name, arguments).await;
        if let Err(e) = &result {
            warn!(tool = name, kind = ?e.kind(), error = %e, "tool failed");
        }
        result.into()
    }

    async fn dispatch(&self, name: &str, args: Value) -> Result<Value> {
        match name {
            // Notes
            "add_footnote_to_document" => self.notes().add_at_paragraph(NoteKind::Footnote, args).await,
            "add_footnote_after_text" => self.notes().add_near_text(NoteKind::Footnote, true, args).await,
            "add_footnote_before_text" => self.notes().add_near_text(NoteKind::Footnote, false, args).await,
            "add_endnote_to_document" => self.notes().add_at_paragraph(NoteKind::Endnote, args).await,
            "add_endnote_after_text" => self.notes().add_near_text(NoteKind::Endnote, true, args).await,
            "delete_footnote_from_document" => self.notes().delete(NoteKind::Footnote, args).await,
            "delete_endnote_from_document" => self.notes().delete(NoteKind::Endnote, args).await,
            "validate_document_footnotes" => self.notes().validate(args).await,
            "clean_orphaned_notes" => self.notes().clean_orphans(args).await,
            "list_notes" => self.notes().list(args).await,

            // Text
            "find_text_in_document" => self.text().find(args).await,
            "search_and_replace" => self.text().replace(args).await,

            // Tables
            "merge_table_cells" => self.tables().merge(args).await,
            "merge_table_cells_horizontal" => self.tables().merge_horizontal(args).await,
            "merge_table_cells_vertical" => self.tables().merge_vertical(args).await,
            "get_table_shape" => self.tables().shape(args).await,

            // Protection
            "protect_document" => self.protection().protect(args).await,
            "unprotect_document" => self.protection().unprotect(args).await,
            "add_restricted_editing" => self.protection().restrict(args).await,
            "remove_restricted_editing" => self.protection().unrestrict(args).await,
            "get_protection_status" => self.protection().status(args).await,

            // Document
            "get_document_text" => self.document().text(args).await,
            "get_document_xml" => self.document().xml(args).await,
            "get_document_info" => self.document().info(args).await,
            "list_available_documents" => self.document().list(args).await,
            "copy_document" => self.document().copy(args).await,

            _ => Err(Error::InvalidArgument(format!("unknown tool '{name}'"))),
        }
    }

    // Tool group accessors

    fn notes(&self) -> NoteTools<'_, S> {
        NoteTools {
            workspace: &self.workspace,
        }
    }

    fn text(&self) -> TextTools<'_, S> {
        TextTools {
            workspace: &self.workspace,
        }
    }

    fn tables(&self) -> TableTools<'_, S> {
        TableTools {
            workspace: &self.workspace,
        }
    }

    fn protection(&self) -> ProtectionTools<'_, S> {
        ProtectionTools {
            workspace: &self.workspace,
            spin_count: self.spin_count,
        }
    }

    fn document(&self) -> DocumentTools<'_, S> {
        DocumentTools {
            workspace: &self.workspace,
        }
    }
}

/// Decode tool arguments. Type mismatches and missing fields are `InvalidArgument`.
fn parse<T: DeserializeOwned>(args: Value) -> Result<T> {
    Ok(serde_json::from_value(args)?)
}

fn to_value<T: Serialize>(value: T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

const fn yes() -> bool {
    true
}

#[cfg(test)]
mod tests;
