//! Style definitions needed by inserted content.
use super::notes::NoteKind;
use crate::common::xml::XmlElement;

/// Kind of a style definition (`w:type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleType {
    Paragraph,
    Character,
}

impl StyleType {
    const fn to_xml(self) -> &'static str {
        match self {
            Self::Paragraph => "paragraph",
            Self::Character => "character",
        }
    }
}

/// Whether a style with this id is defined.
pub fn has_style(styles: &XmlElement, style_id: &str) -> bool {
    styles
        .elements()
        .any(|el| el.is("w:style") && el.attr("w:styleId") == Some(style_id))
}

fn style(style_type: StyleType, id: &str, name: &str, based_on: &str) -> XmlElement {
    XmlElement::new("w:style")
        .with_attr("w:type", style_type.to_xml())
        .with_attr("w:styleId", id)
        .with_child(XmlElement::new("w:name").with_attr("w:val", name))
        .with_child(XmlElement::new("w:basedOn").with_attr("w:val", based_on))
        .with_child(XmlElement::new("w:uiPriority").with_attr("w:val", "99"))
        .with_child(XmlElement::new("w:semiHidden"))
        .with_child(XmlElement::new("w:unhideWhenUsed"))
}

/// Add the note text and note reference styles if they are missing.
///
/// Returns the ids that were added.
pub fn ensure_note_styles(styles: &mut XmlElement, kind: NoteKind) -> Vec<&'static str> {
    let mut added = Vec::new();

    let text_id = kind.text_style();
    if !has_style(styles, text_id) {
        let text = style(StyleType::Paragraph, text_id, kind.text_style_name(), "Normal")
            .with_child(
                XmlElement::new("w:pPr").with_child(
                    XmlElement::new("w:spacing")
                        .with_attr("w:after", "0")
                        .with_attr("w:line", "240")
                        .with_attr("w:lineRule", "auto"),
                ),
            )
            .with_child(
                XmlElement::new("w:rPr")
                    .with_child(XmlElement::new("w:sz").with_attr("w:val", "20"))
                    .with_child(XmlElement::new("w:szCs").with_attr("w:val", "20")),
            );
        styles.push(text);
        added.push(text_id);
    }

    let ref_id = kind.reference_style();
    if !has_style(styles, ref_id) {
        let reference = style(
            StyleType::Character,
            ref_id,
            kind.reference_style_name(),
            "DefaultParagraphFont",
        )
        .with_child(
            XmlElement::new("w:rPr")
                .with_child(XmlElement::new("w:vertAlign").with_attr("w:val", "superscript")),
        );
        styles.push(reference);
        added.push(ref_id);
    }
    added
}
