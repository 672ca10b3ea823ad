//! In-memory `.docx` fixtures for tests.
use std::io::{Cursor, Write};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const R_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Builds a minimal Word package body element by element.
#[derive(Default)]
pub struct DocxBuilder {
    body: String,
    styles: Option<String>,
    settings: Option<String>,
    footnotes: Option<String>,
    endnotes: Option<String>,
    core: Option<String>,
}

impl DocxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single-run paragraph.
    pub fn paragraph(mut self, text: &str) -> Self {
        self.body.push_str(&format!(
            r#"<w:p><w:r><w:t xml:space="preserve">{text}</w:t></w:r></w:p>"#
        ));
        self
    }

    /// A paragraph with one run per `(text, bold)` pair.
    pub fn runs(mut self, runs: &[(&str, bool)]) -> Self {
        self.body.push_str("<w:p>");
        for (text, bold) in runs {
            self.body.push_str("<w:r>");
            if *bold {
                self.body.push_str("<w:rPr><w:b/></w:rPr>");
            }
            self.body
                .push_str(&format!(r#"<w:t xml:space="preserve">{text}</w:t></w:r>"#));
        }
        self.body.push_str("</w:p>");
        self
    }

    /// Raw body markup.
    pub fn raw(mut self, xml: &str) -> Self {
        self.body.push_str(xml);
        self
    }

    /// A table with a grid of single-paragraph cells, 2000 dxa wide each.
    pub fn table(mut self, rows: &[&[&str]]) -> Self {
        let cols = rows.first().map_or(0, |r| r.len());
        self.body.push_str("<w:tbl><w:tblPr><w:tblW w:w=\"0\" w:type=\"auto\"/></w:tblPr><w:tblGrid>");
        for _ in 0..cols {
            self.body.push_str(r#"<w:gridCol w:w="2000"/>"#);
        }
        self.body.push_str("</w:tblGrid>");
        for row in rows {
            self.body.push_str("<w:tr>");
            for cell in row.iter() {
                self.body.push_str(r#"<w:tc><w:tcPr><w:tcW w:w="2000" w:type="dxa"/></w:tcPr><w:p>"#);
                if !cell.is_empty() {
                    self.body
                        .push_str(&format!("<w:r><w:t>{cell}</w:t></w:r>"));
                }
                self.body.push_str("</w:p></w:tc>");
            }
            self.body.push_str("</w:tr>");
        }
        self.body.push_str("</w:tbl>");
        self
    }

    /// Add a styles part with the default paragraph styles.
    pub fn with_styles(mut self) -> Self {
        self.styles = Some(format!(
            r#"<w:styles xmlns:w="{W_NS}"><w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/></w:style><w:style w:type="character" w:default="1" w:styleId="DefaultParagraphFont"><w:name w:val="Default Paragraph Font"/></w:style></w:styles>"#
        ));
        self
    }

    /// Add a settings part with the given inner markup.
    pub fn with_settings(mut self, inner: &str) -> Self {
        self.settings = Some(format!(r#"<w:settings xmlns:w="{W_NS}">{inner}</w:settings>"#));
        self
    }

    /// Add a footnotes part with the given note bodies (separators included).
    pub fn with_footnotes(mut self, inner: &str) -> Self {
        self.footnotes = Some(format!(
            r#"<w:footnotes xmlns:w="{W_NS}" xmlns:r="{R_NS}"><w:footnote w:type="separator" w:id="-1"><w:p><w:r><w:separator/></w:r></w:p></w:footnote><w:footnote w:type="continuationSeparator" w:id="0"><w:p><w:r><w:continuationSeparator/></w:r></w:p></w:footnote>{inner}</w:footnotes>"#
        ));
        self
    }

    /// Add an endnotes part with the given note bodies.
    pub fn with_endnotes(mut self, inner: &str) -> Self {
        self.endnotes = Some(format!(
            r#"<w:endnotes xmlns:w="{W_NS}" xmlns:r="{R_NS}">{inner}</w:endnotes>"#
        ));
        self
    }

    /// Add a `docProps/core.xml` part with the given inner markup.
    pub fn with_core_properties(mut self, inner: &str) -> Self {
        self.core = Some(format!(
            r#"<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">{inner}</cp:coreProperties>"#
        ));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut overrides = String::from(
            r#"<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>"#,
        );
        let mut rels = String::new();
        let mut extra: Vec<(&str, String)> = Vec::new();
        let optional = [
            ("styles", self.styles, "styles+xml"),
            ("settings", self.settings, "settings+xml"),
            ("footnotes", self.footnotes, "footnotes+xml"),
            ("endnotes", self.endnotes, "endnotes+xml"),
        ];
        for (i, (name, xml, ct)) in optional.into_iter().enumerate() {
            let Some(xml) = xml else {
                continue;
            };
            overrides.push_str(&format!(
                r#"<Override PartName="/word/{name}.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.{ct}"/>"#
            ));
            rels.push_str(&format!(
                r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/{name}" Target="{name}.xml"/>"#,
                i + 1
            ));
            let member = match name {
                "styles" => "word/styles.xml",
                "settings" => "word/settings.xml",
                "footnotes" => "word/footnotes.xml",
                _ => "word/endnotes.xml",
            };
            extra.push((member, xml));
        }

        let mut package_rels = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>"#,
        );
        if let Some(core) = self.core {
            overrides.push_str(
                r#"<Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/>"#,
            );
            package_rels.push_str(
                r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/>"#,
            );
            extra.push(("docProps/core.xml", core));
        }
        package_rels.push_str("</Relationships>");
        let content_types = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/>{overrides}</Types>"#
        );
        let document = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="{W_NS}" xmlns:r="{R_NS}"><w:body>{}<w:sectPr/></w:body></w:document>"#,
            self.body
        );
        let document_rels = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{rels}</Relationships>"#
        );

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        let mut add = |name: &str, data: &str| {
            zip.start_file(name, options).unwrap();
            zip.write_all(data.as_bytes()).unwrap();
        };
        add("[Content_Types].xml", &content_types);
        add("_rels/.rels", &package_rels);
        add("word/document.xml", &document);
        add("word/_rels/document.xml.rels", &document_rels);
        for (member, xml) in &extra {
            add(member, xml);
        }
        zip.finish().unwrap().into_inner()
    }
}
