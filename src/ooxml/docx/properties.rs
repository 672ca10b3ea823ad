//! Core document properties and body statistics.
use super::Package;
use super::notes::{NoteKind, list_notes};
use crate::common::error::Result;
use crate::common::xml::XmlElement;
use crate::ooxml::opc::PackURI;
use crate::ooxml::opc::constants::{content_type as ct, part_name, relationship_type as rt};
use serde::Serialize;

/// Dublin Core metadata from `docProps/core.xml`. Absent elements are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoreProperties {
    pub title: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub keywords: Option<String>,
    pub description: Option<String>,
    pub last_modified_by: Option<String>,
    pub revision: Option<String>,
    pub created: Option<String>,
    pub modified: Option<String>,
}

impl CoreProperties {
    /// Read from a `cp:coreProperties` root. Prefixes are ignored.
    pub fn from_xml(root: &XmlElement) -> Self {
        let mut props = Self::default();
        for el in root.elements() {
            let value = el.text().trim().to_string();
            if value.is_empty() {
                continue;
            }
            let slot = match el.local_name() {
                "title" => &mut props.title,
                "subject" => &mut props.subject,
                "creator" => &mut props.creator,
                "keywords" => &mut props.keywords,
                "description" => &mut props.description,
                "lastModifiedBy" => &mut props.last_modified_by,
                "revision" => &mut props.revision,
                "created" => &mut props.created,
                "modified" => &mut props.modified,
                _ => continue,
            };
            *slot = Some(value);
        }
        props
    }
}

/// Metadata and counts reported for a whole document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentInfo {
    #[serde(flatten)]
    pub core: CoreProperties,
    pub paragraph_count: usize,
    pub table_count: usize,
    pub word_count: usize,
    pub footnote_count: usize,
    pub endnote_count: usize,
}

impl Package {
    /// The core properties part, through the package relationship or at its
    /// conventional name.
    pub fn core_properties_part(&self) -> Result<Option<PackURI>> {
        let opc = self.opc();
        if let Some(name) = opc
            .related_part(&PackURI::package(), rt::CORE_PROPERTIES)?
            .filter(|name| opc.contains(name))
        {
            return Ok(Some(name));
        }
        let name = PackURI::new(part_name::CORE_PROPERTIES)?;
        let declared = opc.contains(&name)
            && opc.content_type(&name)?.as_deref() == Some(ct::OPC_CORE_PROPERTIES);
        Ok(declared.then_some(name))
    }

    /// Core properties, all `None` when the package has none.
    pub fn core_properties(&self) -> Result<CoreProperties> {
        Ok(match self.core_properties_part()? {
            Some(name) => CoreProperties::from_xml(&self.opc().xml(&name)?.root),
            None => CoreProperties::default(),
        })
    }
}

/// Core properties plus paragraph, table, word and note counts.
pub fn document_info(package: &Package) -> Result<DocumentInfo> {
    let body = package.body()?;
    Ok(DocumentInfo {
        core: package.core_properties()?,
        paragraph_count: package.paragraph_count()?,
        table_count: body.elements().filter(|el| el.is("w:tbl")).count(),
        word_count: package.document_text()?.split_whitespace().count(),
        footnote_count: list_notes(package, NoteKind::Footnote)?.len(),
        endnote_count: list_notes(package, NoteKind::Endnote)?.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::docx::fixtures::DocxBuilder;

    #[test]
    fn test_core_properties_and_counts() {
        let bytes = DocxBuilder::new()
            .with_core_properties(
                r#"<dc:title>Quarterly report</dc:title><dc:creator>Finance</dc:creator><cp:revision>4</cp:revision><dc:subject/><dcterms:created xsi:type="dcterms:W3CDTF">2024-01-02T03:04:05Z</dcterms:created>"#,
            )
            .with_footnotes(r#"<w:footnote w:id="1"><w:p><w:r><w:t>n</w:t></w:r></w:p></w:footnote>"#)
            .raw(r#"<w:p><w:r><w:t>Revenue grew</w:t><w:footnoteReference w:id="1"/></w:r></w:p>"#)
            .paragraph("Costs were flat.")
            .table(&[&["a", "b"]])
            .build();
        let pkg = Package::from_bytes(&bytes).unwrap();
        assert_eq!(
            pkg.core_properties_part().unwrap().unwrap().as_str(),
            "/docProps/core.xml"
        );

        let info = document_info(&pkg).unwrap();
        assert_eq!(info.core.title.as_deref(), Some("Quarterly report"));
        assert_eq!(info.core.creator.as_deref(), Some("Finance"));
        assert_eq!(info.core.revision.as_deref(), Some("4"));
        assert_eq!(info.core.created.as_deref(), Some("2024-01-02T03:04:05Z"));
        assert_eq!(info.core.subject, None);
        assert_eq!(info.paragraph_count, 2);
        assert_eq!(info.table_count, 1);
        assert_eq!(info.word_count, 7);
        assert_eq!((info.footnote_count, info.endnote_count), (1, 0));

        let value = serde_json::to_value(&info).unwrap();
        assert_eq!(value["title"], "Quarterly report");
        assert_eq!(value["keywords"], serde_json::Value::Null);
    }

    #[test]
    fn test_missing_core_properties() {
        let pkg = Package::from_bytes(&DocxBuilder::new().paragraph("x").build()).unwrap();
        assert_eq!(pkg.core_properties_part().unwrap(), None);
        assert_eq!(pkg.core_properties().unwrap(), CoreProperties::default());
    }
}
