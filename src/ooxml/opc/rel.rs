//! Relationship parts (`*.rels`).
//!
//! Relationships are read from and written to the part's XML tree directly so
//! unknown attributes and ordering survive a save untouched.
use super::constants::namespace;
use crate::common::xml::{XmlDocument, XmlElement};

const RELATIONSHIP: &str = "Relationship";

/// One `<Relationship>` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub r_id: String,
    pub rel_type: String,
    pub target: String,
    pub external: bool,
}

impl Relationship {
    fn from_element(el: &XmlElement) -> Option<Self> {
        Some(Self {
            r_id: el.attr("Id")?.to_string(),
            rel_type: el.attr("Type")?.to_string(),
            target: el.attr("Target")?.to_string(),
            external: el.attr("TargetMode") == Some("External"),
        })
    }
}

/// An empty `<Relationships>` document.
pub fn empty_relationships() -> XmlDocument {
    XmlDocument::new(XmlElement::new("Relationships").with_attr("xmlns", namespace::OPC_RELATIONSHIPS))
}

/// All relationships declared under a `<Relationships>` root.
pub fn read_relationships(root: &XmlElement) -> Vec<Relationship> {
    root.elements()
        .filter(|el| el.local_name() == RELATIONSHIP)
        .filter_map(Relationship::from_element)
        .collect()
}

/// First internal relationship of the given type.
pub fn find_by_type(root: &XmlElement, rel_type: &str) -> Option<Relationship> {
    read_relationships(root)
        .into_iter()
        .find(|rel| rel.rel_type == rel_type && !rel.external)
}

/// Return the id of an existing relationship with this type and target, or add one.
pub fn get_or_add(root: &mut XmlElement, rel_type: &str, target: &str) -> String {
    if let Some(rel) = read_relationships(root)
        .into_iter()
        .find(|rel| rel.rel_type == rel_type && rel.target == target)
    {
        return rel.r_id;
    }
    let r_id = next_r_id(root);
    root.push(
        XmlElement::new(RELATIONSHIP)
            .with_attr("Id", r_id.as_str())
            .with_attr("Type", rel_type)
            .with_attr("Target", target),
    );
    r_id
}

/// Remove a relationship by id. Returns whether one was removed.
pub fn remove(root: &mut XmlElement, r_id: &str) -> bool {
    root.remove_elements(|el| el.local_name() == RELATIONSHIP && el.attr("Id") == Some(r_id)) > 0
}

/// Lowest unused `rIdN`, filling gaps left by removed relationships.
pub fn next_r_id(root: &XmlElement) -> String {
    let mut used: Vec<u32> = root
        .elements()
        .filter_map(|el| el.attr("Id"))
        .filter_map(|id| id.strip_prefix("rId"))
        .filter_map(|num| atoi_simd::parse::<u32>(num.as_bytes()).ok())
        .collect();
    used.sort_unstable();

    let mut next = 1u32;
    for num in used {
        if num == next {
            next += 1;
        } else if num > next {
            break;
        }
    }
    format!("rId{next}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rels(ids: &[&str]) -> XmlElement {
        let mut root = empty_relationships().root;
        for id in ids {
            root.push(
                XmlElement::new(RELATIONSHIP)
                    .with_attr("Id", *id)
                    .with_attr("Type", "t")
                    .with_attr("Target", format!("{id}.xml")),
            );
        }
        root
    }

    #[test]
    fn test_next_r_id_fills_gaps() {
        assert_eq!(next_r_id(&rels(&[])), "rId1");
        assert_eq!(next_r_id(&rels(&["rId1", "rId2"])), "rId3");
        assert_eq!(next_r_id(&rels(&["rId1", "rId3"])), "rId2");
        assert_eq!(next_r_id(&rels(&["rId2", "custom"])), "rId1");
    }

    #[test]
    fn test_get_or_add_reuses() {
        let mut root = rels(&["rId1"]);
        let first = get_or_add(&mut root, "footnotes", "footnotes.xml");
        assert_eq!(first, "rId2");
        let again = get_or_add(&mut root, "footnotes", "footnotes.xml");
        assert_eq!(again, first);
        assert_eq!(read_relationships(&root).len(), 2);

        let found = find_by_type(&root, "footnotes").unwrap();
        assert_eq!(found.target, "footnotes.xml");

        assert!(remove(&mut root, "rId2"));
        assert!(find_by_type(&root, "footnotes").is_none());
    }

    #[test]
    fn test_external_targets_are_skipped_by_type_lookup() {
        let mut root = empty_relationships().root;
        root.push(
            XmlElement::new(RELATIONSHIP)
                .with_attr("Id", "rId1")
                .with_attr("Type", "hyperlink")
                .with_attr("Target", "https://example.com")
                .with_attr("TargetMode", "External"),
        );
        assert!(read_relationships(&root)[0].external);
        assert!(find_by_type(&root, "hyperlink").is_none());
    }
}
