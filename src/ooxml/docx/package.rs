//! Word package: the main document part and the parts hanging off it.
use super::notes::{NoteId, NoteKind};
use super::paragraph::paragraph_text;
use crate::common::error::{Error, Result};
use crate::common::xml::{XmlDocument, XmlElement};
use crate::ooxml::opc::constants::{content_type as ct, namespace, relationship_type as rt};
use crate::ooxml::opc::{OpcPackage, PackURI};
use tracing::debug;

const BODY: &str = "w:body";

/// A Word (.docx) package loaded in memory.
///
/// # Examples
///
/// ```rust,no_run
/// use longan::ooxml::docx::Package;
///
/// let bytes = std::fs::read("report.docx")?;
/// let pkg = Package::from_bytes(&bytes)?;
/// println!("{}", pkg.document_text()?);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct Package {
    opc: OpcPackage,
    main: PackURI,
    /// Highest footnote and endnote ids issued or seen while loaded
    footnote_high_water: NoteId,
    endnote_high_water: NoteId,
}

impl Package {
    /// Load a package and locate its main document part.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let opc = OpcPackage::from_bytes(bytes)?;
        let main = opc.main_document()?;

        let content_type = opc.content_type(&main)?.unwrap_or_default();
        if content_type != ct::WML_DOCUMENT_MAIN && !content_type.starts_with("application/vnd.ms-word.") {
            return Err(Error::CorruptPackage(format!(
                "main part {main} has content type '{content_type}'"
            )));
        }
        let root = &opc.xml(&main)?.root;
        if !root.is("w:document") || root.child(BODY).is_none() {
            return Err(Error::CorruptPackage(format!(
                "main part {main} is not a w:document with a body"
            )));
        }
        Ok(Self {
            opc,
            main,
            footnote_high_water: 0,
            endnote_high_water: 0,
        })
    }

    /// Highest note id of `kind` handed out or observed since loading.
    ///
    /// Removing notes never lowers it, so ids are not reused while the
    /// package stays in memory.
    pub fn note_high_water(&self, kind: NoteKind) -> NoteId {
        match kind {
            NoteKind::Footnote => self.footnote_high_water,
            NoteKind::Endnote => self.endnote_high_water,
        }
    }

    pub(crate) fn raise_note_high_water(&mut self, kind: NoteKind, id: NoteId) {
        let mark = match kind {
            NoteKind::Footnote => &mut self.footnote_high_water,
            NoteKind::Endnote => &mut self.endnote_high_water,
        };
        *mark = (*mark).max(id);
    }

    /// Serialize the package.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.opc.to_bytes()?)
    }

    #[inline]
    pub fn opc(&self) -> &OpcPackage {
        &self.opc
    }

    #[inline]
    pub fn opc_mut(&mut self) -> &mut OpcPackage {
        &mut self.opc
    }

    /// Name of the main document part.
    #[inline]
    pub fn main_part(&self) -> &PackURI {
        &self.main
    }

    pub fn document(&self) -> Result<&XmlDocument> {
        Ok(self.opc.xml(&self.main)?)
    }

    pub fn document_mut(&mut self) -> Result<&mut XmlDocument> {
        Ok(self.opc.xml_mut(&self.main)?)
    }

    /// The main document tree together with another part, both mutable.
    pub fn document_and_part_mut(
        &mut self,
        other: &PackURI,
    ) -> Result<(&mut XmlDocument, &mut XmlDocument)> {
        Ok(self.opc.xml_pair_mut(&self.main, other)?)
    }

    pub fn body(&self) -> Result<&XmlElement> {
        self.document()?
            .root
            .child(BODY)
            .ok_or_else(|| Error::CorruptPackage("document has no body".to_string()))
    }

    pub fn body_mut(&mut self) -> Result<&mut XmlElement> {
        self.document_mut()?
            .root
            .child_mut(BODY)
            .ok_or_else(|| Error::CorruptPackage("document has no body".to_string()))
    }

    /// Number of paragraphs directly in the body.
    pub fn paragraph_count(&self) -> Result<usize> {
        Ok(self.body()?.elements().filter(|el| el.is("w:p")).count())
    }

    /// Text of every paragraph, including those in tables, one per line.
    pub fn document_text(&self) -> Result<String> {
        let body = self.body()?;
        let lines: Vec<String> = super::search::paragraphs(body)
            .iter()
            .filter_map(|loc| body.get(&loc.path))
            .map(paragraph_text)
            .collect();
        Ok(lines.join("\n"))
    }

    /// The main document part's XML as stored.
    pub fn document_xml(&self) -> Result<String> {
        let blob = self.opc.part(&self.main)?.blob();
        Ok(String::from_utf8_lossy(&blob).into_owned())
    }

    /// The footnotes or endnotes part, if the document has one.
    pub fn notes_part(&self, kind: NoteKind) -> Result<Option<PackURI>> {
        Ok(self
            .opc
            .related_part(&self.main, kind.rel_type())?
            .filter(|name| self.opc.contains(name)))
    }

    /// The footnotes or endnotes part, created with its separators when missing.
    pub fn ensure_notes_part(&mut self, kind: NoteKind) -> Result<PackURI> {
        if let Some(name) = self.notes_part(kind)? {
            return Ok(name);
        }
        let name = PackURI::new(kind.default_part_name())?;
        if !self.opc.contains(&name) {
            self.opc
                .add_xml_part(name.clone(), kind.content_type(), kind.empty_part())?;
        }
        let r_id = self.opc.relate(&self.main, kind.rel_type(), &name)?;
        debug!(part = %name, %r_id, "created notes part");
        Ok(name)
    }

    /// The settings part, if the document has one.
    pub fn settings_part(&self) -> Result<Option<PackURI>> {
        Ok(self
            .opc
            .related_part(&self.main, rt::SETTINGS)?
            .filter(|name| self.opc.contains(name)))
    }

    /// The settings part, created empty when missing.
    pub fn ensure_settings_part(&mut self) -> Result<PackURI> {
        if let Some(name) = self.settings_part()? {
            return Ok(name);
        }
        let name = PackURI::new("/word/settings.xml")?;
        if !self.opc.contains(&name) {
            let root = XmlElement::new("w:settings").with_attr("xmlns:w", namespace::WML_MAIN);
            self.opc
                .add_xml_part(name.clone(), ct::WML_SETTINGS, XmlDocument::new(root))?;
        }
        self.opc.relate(&self.main, rt::SETTINGS, &name)?;
        Ok(name)
    }

    /// The styles part, if the document has one.
    pub fn styles_part(&self) -> Result<Option<PackURI>> {
        Ok(self
            .opc
            .related_part(&self.main, rt::STYLES)?
            .filter(|name| self.opc.contains(name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::docx::fixtures::DocxBuilder;

    #[test]
    fn test_load_and_text() {
        let bytes = DocxBuilder::new()
            .paragraph("First")
            .paragraph("Second")
            .table(&[&["a", "b"]])
            .build();
        let pkg = Package::from_bytes(&bytes).unwrap();
        assert_eq!(pkg.paragraph_count().unwrap(), 2);
        assert_eq!(pkg.document_text().unwrap(), "First\nSecond\na\nb");
        assert!(pkg.document_xml().unwrap().contains("<w:body>"));
    }

    #[test]
    fn test_notes_part_created_once() {
        let bytes = DocxBuilder::new().paragraph("x").build();
        let mut pkg = Package::from_bytes(&bytes).unwrap();
        assert_eq!(pkg.notes_part(NoteKind::Footnote).unwrap(), None);

        let name = pkg.ensure_notes_part(NoteKind::Footnote).unwrap();
        assert_eq!(name.as_str(), "/word/footnotes.xml");
        let again = pkg.ensure_notes_part(NoteKind::Footnote).unwrap();
        assert_eq!(name, again);

        let reloaded = Package::from_bytes(&pkg.to_bytes().unwrap()).unwrap();
        assert_eq!(
            reloaded.opc().content_type(&name).unwrap().as_deref(),
            Some(ct::WML_FOOTNOTES)
        );
        let root = &reloaded.opc().xml(&name).unwrap().root;
        assert_eq!(root.elements().count(), 2);
    }

    #[test]
    fn test_rejects_non_word_package() {
        let bytes = crate::ooxml::opc::phys_pkg::write_members([(
            "[Content_Types].xml",
            b"<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\"/>".to_vec(),
        )])
        .unwrap();
        assert!(matches!(
            Package::from_bytes(&bytes),
            Err(Error::CorruptPackage(_))
        ));
        assert!(matches!(
            Package::from_bytes(b"plain text"),
            Err(Error::CorruptPackage(_))
        ));
    }
}
