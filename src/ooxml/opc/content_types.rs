//! `[Content_Types].xml` lookups and overrides.
use super::constants::namespace;
use super::packuri::PackURI;
use crate::common::xml::{XmlDocument, XmlElement};

/// A minimal content types document with the `rels` and `xml` defaults.
pub fn default_content_types() -> XmlDocument {
    XmlDocument::new(
        XmlElement::new("Types")
            .with_attr("xmlns", namespace::OPC_CONTENT_TYPES)
            .with_child(
                XmlElement::new("Default")
                    .with_attr("Extension", "rels")
                    .with_attr("ContentType", super::constants::content_type::OPC_RELATIONSHIPS),
            )
            .with_child(
                XmlElement::new("Default")
                    .with_attr("Extension", "xml")
                    .with_attr("ContentType", super::constants::content_type::XML),
            ),
    )
}

/// Content type of a part: its override if any, otherwise the extension default.
///
/// Part names and extensions compare ASCII case-insensitively.
pub fn lookup<'a>(types: &'a XmlElement, partname: &PackURI) -> Option<&'a str> {
    let overridden = types
        .elements()
        .filter(|el| el.local_name() == "Override")
        .find(|el| {
            el.attr("PartName")
                .is_some_and(|name| name.eq_ignore_ascii_case(partname.as_str()))
        })
        .and_then(|el| el.attr("ContentType"));

    overridden.or_else(|| {
        let ext = partname.ext();
        types
            .elements()
            .filter(|el| el.local_name() == "Default")
            .find(|el| {
                el.attr("Extension")
                    .is_some_and(|e| e.eq_ignore_ascii_case(ext))
            })
            .and_then(|el| el.attr("ContentType"))
    })
}

/// Declare (or replace) the override for a part.
pub fn set_override(types: &mut XmlElement, partname: &PackURI, content_type: &str) {
    if let Some(existing) = types.elements_mut().find(|el| {
        el.local_name() == "Override"
            && el
                .attr("PartName")
                .is_some_and(|name| name.eq_ignore_ascii_case(partname.as_str()))
    }) {
        existing.set_attr("ContentType", content_type);
        return;
    }
    types.push(
        XmlElement::new("Override")
            .with_attr("PartName", partname.as_str())
            .with_attr("ContentType", content_type),
    );
}

/// Drop the override for a part. Returns whether one existed.
pub fn remove_override(types: &mut XmlElement, partname: &PackURI) -> bool {
    types.remove_elements(|el| {
        el.local_name() == "Override"
            && el
                .attr("PartName")
                .is_some_and(|name| name.eq_ignore_ascii_case(partname.as_str()))
    }) > 0
}
