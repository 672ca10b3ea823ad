//! Open package: parts, relationships and content types in memory.
//!
//! Parts keep their archive order. XML parts are parsed lazily and only
//! edited parts are re-serialized on save, so everything the caller did not
//! touch is written back byte-for-byte.
use super::constants::{part_name, relationship_type};
use super::content_types;
use super::error::{OpcError, Result};
use super::packuri::PackURI;
use super::part::Part;
use super::phys_pkg;
use super::rel::{self, Relationship};
use crate::common::xml::XmlDocument;
use std::collections::HashMap;

/// An OPC package loaded from bytes.
#[derive(Debug)]
pub struct OpcPackage {
    parts: Vec<Part>,
    index: HashMap<PackURI, usize>,
}

impl OpcPackage {
    /// Load a package from container bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut package = Self {
            parts: Vec::new(),
            index: HashMap::new(),
        };
        for (member, data) in phys_pkg::read_members(bytes)? {
            let name = PackURI::from_member(&member)?;
            package.push_part(Part::from_raw(name, data));
        }
        if !package.contains(&PackURI::new(part_name::CONTENT_TYPES)?) {
            return Err(OpcError::Malformed(
                "missing [Content_Types].xml".to_string(),
            ));
        }
        Ok(package)
    }

    /// Serialize the package back into container bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        phys_pkg::write_members(
            self.parts
                .iter()
                .map(|part| (part.name().membername(), part.blob())),
        )
    }

    fn push_part(&mut self, part: Part) {
        self.index.insert(part.name().clone(), self.parts.len());
        self.parts.push(part);
    }

    fn index_of(&self, name: &PackURI) -> Result<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| OpcError::PartNotFound(name.to_string()))
    }

    /// Whether a part exists.
    #[inline]
    pub fn contains(&self, name: &PackURI) -> bool {
        self.index.contains_key(name)
    }

    /// Part names in archive order.
    pub fn part_names(&self) -> impl Iterator<Item = &PackURI> {
        self.parts.iter().map(Part::name)
    }

    /// Borrow a part.
    pub fn part(&self, name: &PackURI) -> Result<&Part> {
        Ok(&self.parts[self.index_of(name)?])
    }

    /// Parsed XML of a part.
    pub fn xml(&self, name: &PackURI) -> Result<&XmlDocument> {
        self.part(name)?.xml()
    }

    /// Parsed XML of a part, for editing.
    pub fn xml_mut(&mut self, name: &PackURI) -> Result<&mut XmlDocument> {
        let idx = self.index_of(name)?;
        self.parts[idx].xml_mut()
    }

    /// Edit two distinct parts at once.
    pub fn xml_pair_mut(
        &mut self,
        first: &PackURI,
        second: &PackURI,
    ) -> Result<(&mut XmlDocument, &mut XmlDocument)> {
        let a = self.index_of(first)?;
        let b = self.index_of(second)?;
        if a == b {
            return Err(OpcError::InvalidPartName(format!(
                "{first} requested twice"
            )));
        }
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        let (left, right) = self.parts.split_at_mut(hi);
        let low = left[lo].xml_mut()?;
        let high = right[0].xml_mut()?;
        Ok(if a < b { (low, high) } else { (high, low) })
    }

    /// Add a new XML part and declare its content type.
    pub fn add_xml_part(
        &mut self,
        name: PackURI,
        content_type: &str,
        doc: XmlDocument,
    ) -> Result<()> {
        if self.contains(&name) {
            return Err(OpcError::InvalidPartName(format!("{name} already exists")));
        }
        let types = PackURI::new(part_name::CONTENT_TYPES)?;
        content_types::set_override(&mut self.xml_mut(&types)?.root, &name, content_type);
        self.push_part(Part::from_xml(name, doc));
        Ok(())
    }

    /// Content type declared for a part.
    pub fn content_type(&self, name: &PackURI) -> Result<Option<String>> {
        let types = self.xml(&PackURI::new(part_name::CONTENT_TYPES)?)?;
        Ok(content_types::lookup(&types.root, name).map(str::to_string))
    }

    /// Relationships whose source is `source`. Empty when it has no `.rels` part.
    pub fn relationships(&self, source: &PackURI) -> Result<Vec<Relationship>> {
        let rels_name = source.rels_uri();
        if !self.contains(&rels_name) {
            return Ok(Vec::new());
        }
        Ok(rel::read_relationships(&self.xml(&rels_name)?.root))
    }

    /// Target part of the first internal relationship of `rel_type` from `source`.
    pub fn related_part(&self, source: &PackURI, rel_type: &str) -> Result<Option<PackURI>> {
        let rels_name = source.rels_uri();
        if !self.contains(&rels_name) {
            return Ok(None);
        }
        rel::find_by_type(&self.xml(&rels_name)?.root, rel_type)
            .map(|found| PackURI::from_rel_ref(source.base_uri(), &found.target))
            .transpose()
    }

    /// Relate `source` to `target`, creating the `.rels` part if needed. Returns the rId.
    pub fn relate(&mut self, source: &PackURI, rel_type: &str, target: &PackURI) -> Result<String> {
        let rels_name = source.rels_uri();
        if !self.contains(&rels_name) {
            self.push_part(Part::from_xml(rels_name.clone(), rel::empty_relationships()));
        }
        let target_ref = target.relative_ref(source.base_uri());
        let doc = self.xml_mut(&rels_name)?;
        Ok(rel::get_or_add(&mut doc.root, rel_type, &target_ref))
    }

    /// The main document part, located through the package relationships.
    pub fn main_document(&self) -> Result<PackURI> {
        self.related_part(&PackURI::package(), relationship_type::OFFICE_DOCUMENT)?
            .filter(|name| self.contains(name))
            .ok_or_else(|| OpcError::Malformed("no main document part".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::xml::XmlElement;
    use crate::ooxml::opc::constants::content_type as ct;

    fn minimal() -> Vec<u8> {
        phys_pkg::write_members([
            (
                "[Content_Types].xml",
                content_types::default_content_types().to_bytes(),
            ),
            (
                "_rels/.rels",
                br#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#.to_vec(),
            ),
            ("word/document.xml", b"<w:document/>".to_vec()),
        ])
        .unwrap()
    }

    #[test]
    fn test_main_document_and_relate() {
        let mut pkg = OpcPackage::from_bytes(&minimal()).unwrap();
        let main = pkg.main_document().unwrap();
        assert_eq!(main.as_str(), "/word/document.xml");

        let notes = PackURI::new("/word/footnotes.xml").unwrap();
        pkg.add_xml_part(
            notes.clone(),
            ct::WML_FOOTNOTES,
            XmlDocument::new(XmlElement::new("w:footnotes")),
        )
        .unwrap();
        let r_id = pkg
            .relate(&main, relationship_type::FOOTNOTES, &notes)
            .unwrap();
        assert_eq!(r_id, "rId1");
        assert_eq!(
            pkg.related_part(&main, relationship_type::FOOTNOTES).unwrap(),
            Some(notes.clone())
        );

        let reloaded = OpcPackage::from_bytes(&pkg.to_bytes().unwrap()).unwrap();
        assert_eq!(
            reloaded.content_type(&notes).unwrap().as_deref(),
            Some(ct::WML_FOOTNOTES)
        );
        assert!(reloaded.contains(&PackURI::new("/word/_rels/document.xml.rels").unwrap()));
    }

    #[test]
    fn test_pair_mut() {
        let mut pkg = OpcPackage::from_bytes(&minimal()).unwrap();
        let main = pkg.main_document().unwrap();
        let types = PackURI::new(part_name::CONTENT_TYPES).unwrap();
        let (doc, ty) = pkg.xml_pair_mut(&main, &types).unwrap();
        doc.root.set_attr("x", "1");
        ty.root.set_attr("y", "2");
        assert!(pkg.xml_pair_mut(&main, &main).is_err());
    }

    #[test]
    fn test_missing_content_types() {
        let bytes =
            phys_pkg::write_members([("word/document.xml", b"<w:document/>".to_vec())]).unwrap();
        assert!(matches!(
            OpcPackage::from_bytes(&bytes),
            Err(OpcError::Malformed(_))
        ));
    }
}
