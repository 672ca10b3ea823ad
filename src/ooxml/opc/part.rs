//! A single part of an open package.
use super::error::{OpcError, Result};
use super::packuri::PackURI;
use crate::common::xml::XmlDocument;
use once_cell::unsync::OnceCell;

/// Package part. XML content is parsed on first access and only
/// re-serialized when it was borrowed mutably.
#[derive(Debug)]
pub struct Part {
    name: PackURI,
    raw: Vec<u8>,
    tree: OnceCell<XmlDocument>,
    dirty: bool,
}

impl Part {
    /// Wrap bytes read from the container.
    pub fn from_raw(name: PackURI, raw: Vec<u8>) -> Self {
        Self {
            name,
            raw,
            tree: OnceCell::new(),
            dirty: false,
        }
    }

    /// A new part that only exists as a tree.
    pub fn from_xml(name: PackURI, doc: XmlDocument) -> Self {
        Self {
            name,
            raw: Vec::new(),
            tree: OnceCell::with_value(doc),
            dirty: true,
        }
    }

    #[inline]
    pub fn name(&self) -> &PackURI {
        &self.name
    }

    /// Whether the part has been edited since it was read.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Parsed XML content.
    pub fn xml(&self) -> Result<&XmlDocument> {
        self.tree
            .get_or_try_init(|| XmlDocument::parse(&self.raw).map_err(OpcError::from))
    }

    /// Parsed XML content for editing; marks the part dirty.
    pub fn xml_mut(&mut self) -> Result<&mut XmlDocument> {
        self.xml()?;
        self.dirty = true;
        self.tree
            .get_mut()
            .ok_or_else(|| OpcError::PartNotFound(self.name.to_string()))
    }

    /// Bytes to write back into the container.
    pub fn blob(&self) -> Vec<u8> {
        match (self.dirty, self.tree.get()) {
            (true, Some(doc)) => doc.to_bytes(),
            _ => self.raw.clone(),
        }
    }
}
