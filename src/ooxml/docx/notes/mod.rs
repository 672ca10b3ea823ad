//! Footnotes and endnotes.
//!
//! A note is two halves: an anchor (`w:footnoteReference`) inside the main
//! document and a body (`w:footnote`) inside the notes part, joined by a
//! numeric id. [`graph::ReferenceGraph`] tracks both sides and
//! [`manager::NoteManager`] performs the edits that must keep them in step.
use crate::common::xml::{XmlDocument, XmlElement};
use crate::ooxml::opc::constants::{content_type as ct, namespace, relationship_type as rt};
use serde::{Deserialize, Serialize};

pub mod graph;
pub mod manager;

pub use graph::{NoteBodyRef, NoteState, ReferenceGraph};
pub use manager::{
    AnchorLocation, InsertOptions, NoteManager, NoteReport, NoteSelector, NoteSummary,
    RemoveOutcome, list_notes, note_report,
};

/// Note identifier as written in `w:id`.
pub type NoteId = i32;

/// Footnotes or endnotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteKind {
    Footnote,
    Endnote,
}

impl NoteKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Footnote => "footnote",
            Self::Endnote => "endnote",
        }
    }

    /// Root element of the notes part.
    pub const fn part_element(self) -> &'static str {
        match self {
            Self::Footnote => "w:footnotes",
            Self::Endnote => "w:endnotes",
        }
    }

    /// Element holding one note body.
    pub const fn body_element(self) -> &'static str {
        match self {
            Self::Footnote => "w:footnote",
            Self::Endnote => "w:endnote",
        }
    }

    /// Anchor element in the main document.
    pub const fn reference_element(self) -> &'static str {
        match self {
            Self::Footnote => "w:footnoteReference",
            Self::Endnote => "w:endnoteReference",
        }
    }

    /// Number mark at the start of a note body.
    pub const fn reference_mark(self) -> &'static str {
        match self {
            Self::Footnote => "w:footnoteRef",
            Self::Endnote => "w:endnoteRef",
        }
    }

    pub const fn reference_style(self) -> &'static str {
        match self {
            Self::Footnote => "FootnoteReference",
            Self::Endnote => "EndnoteReference",
        }
    }

    pub const fn reference_style_name(self) -> &'static str {
        match self {
            Self::Footnote => "footnote reference",
            Self::Endnote => "endnote reference",
        }
    }

    pub const fn text_style(self) -> &'static str {
        match self {
            Self::Footnote => "FootnoteText",
            Self::Endnote => "EndnoteText",
        }
    }

    pub const fn text_style_name(self) -> &'static str {
        match self {
            Self::Footnote => "footnote text",
            Self::Endnote => "endnote text",
        }
    }

    pub const fn default_part_name(self) -> &'static str {
        match self {
            Self::Footnote => "/word/footnotes.xml",
            Self::Endnote => "/word/endnotes.xml",
        }
    }

    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Footnote => ct::WML_FOOTNOTES,
            Self::Endnote => ct::WML_ENDNOTES,
        }
    }

    pub const fn rel_type(self) -> &'static str {
        match self {
            Self::Footnote => rt::FOOTNOTES,
            Self::Endnote => rt::ENDNOTES,
        }
    }

    /// A new notes part holding only the separator and continuation separator.
    pub fn empty_part(self) -> XmlDocument {
        let separator = |id: &str, note_type: &str, mark: &str| {
            XmlElement::new(self.body_element())
                .with_attr("w:type", note_type)
                .with_attr("w:id", id)
                .with_child(
                    XmlElement::new("w:p")
                        .with_child(
                            XmlElement::new("w:pPr").with_child(
                                XmlElement::new("w:spacing")
                                    .with_attr("w:after", "0")
                                    .with_attr("w:line", "240")
                                    .with_attr("w:lineRule", "auto"),
                            ),
                        )
                        .with_child(XmlElement::new("w:r").with_child(XmlElement::new(mark))),
                )
        };
        XmlDocument::new(
            XmlElement::new(self.part_element())
                .with_attr("xmlns:w", namespace::WML_MAIN)
                .with_attr("xmlns:r", namespace::OFC_RELATIONSHIPS)
                .with_child(separator("-1", "separator", "w:separator"))
                .with_child(separator(
                    "0",
                    "continuationSeparator",
                    "w:continuationSeparator",
                )),
        )
    }
}

/// The type of a note body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteType {
    /// Normal note with content
    Normal,
    Separator,
    ContinuationSeparator,
    ContinuationNotice,
}

impl NoteType {
    pub fn from_xml(s: Option<&str>) -> Self {
        match s {
            Some("separator") => Self::Separator,
            Some("continuationSeparator") => Self::ContinuationSeparator,
            Some("continuationNotice") => Self::ContinuationNotice,
            _ => Self::Normal,
        }
    }
}
