//! Anchor/body bookkeeping for one note kind.
use super::{NoteId, NoteKind, NoteType};
use crate::common::error::{Error, Result};
use crate::common::xml::{XmlElement, XmlNode};
use crate::ooxml::docx::format::{RunFormat, VerticalAlign};
use crate::ooxml::docx::paragraph::build_run;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Position of a note body inside the notes part root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteBodyRef {
    pub id: NoteId,
    /// Index into the notes root's children
    pub index: usize,
}

/// Lifecycle of a note id. Removed ids are simply absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteState {
    /// Body registered, no anchor written yet
    Unattached,
    /// Body and at least one anchor present
    Attached,
}

/// What an unlink removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Unlinked {
    pub anchors: usize,
    pub body: bool,
}

/// Anchors in the main document and bodies in the notes part, by id.
///
/// Ids handed out by [`ReferenceGraph::register`] only grow, even across
/// removals, for the lifetime of the graph. [`ReferenceGraph::raise_high_water`]
/// carries the mark over from an earlier graph of the same package.
#[derive(Debug, Clone)]
pub struct ReferenceGraph {
    kind: NoteKind,
    anchors: BTreeMap<NoteId, usize>,
    bodies: BTreeMap<NoteId, usize>,
    high_water: NoteId,
}

fn parse_id(el: &XmlElement) -> Option<NoteId> {
    el.attr("w:id")?.trim().parse().ok()
}

/// Run properties shared by anchors and body number marks.
pub(crate) fn reference_rpr(kind: NoteKind) -> XmlElement {
    RunFormat {
        style: Some(kind.reference_style().to_string()),
        vert_align: Some(VerticalAlign::Superscript),
        ..Default::default()
    }
    .to_rpr()
}

/// The run placed in the document for a note anchor.
pub(crate) fn anchor_run(kind: NoteKind, id: NoteId) -> XmlElement {
    let mut buf = itoa::Buffer::new();
    XmlElement::new("w:r")
        .with_child(reference_rpr(kind))
        .with_child(XmlElement::new(kind.reference_element()).with_attr("w:id", buf.format(id)))
}

/// A note body: the number mark followed by the text, or just the mark.
pub(crate) fn note_body(kind: NoteKind, id: NoteId, text: &str) -> XmlElement {
    let mut p = XmlElement::new("w:p")
        .with_child(
            XmlElement::new("w:pPr")
                .with_child(XmlElement::new("w:pStyle").with_attr("w:val", kind.text_style())),
        )
        .with_child(
            XmlElement::new("w:r")
                .with_child(reference_rpr(kind))
                .with_child(XmlElement::new(kind.reference_mark())),
        );
    if !text.is_empty() {
        p.push(build_run(&format!(" {text}"), None));
    }
    let mut buf = itoa::Buffer::new();
    XmlElement::new(kind.body_element())
        .with_attr("w:id", buf.format(id))
        .with_child(p)
}

impl ReferenceGraph {
    /// Scan a document root and an optional notes root.
    pub fn build(kind: NoteKind, document: &XmlElement, notes: Option<&XmlElement>) -> Self {
        let mut graph = Self {
            kind,
            anchors: BTreeMap::new(),
            bodies: BTreeMap::new(),
            high_water: 0,
        };
        graph.rebuild(document, notes);
        graph
    }

    /// Rescan after a mutation. The high-water mark never decreases.
    pub fn rebuild(&mut self, document: &XmlElement, notes: Option<&XmlElement>) {
        self.anchors.clear();
        self.bodies.clear();
        let mut seen = self.high_water;

        collect_anchors(document, self.kind.reference_element(), &mut self.anchors);
        if let Some(&max) = self.anchors.keys().next_back() {
            seen = seen.max(max);
        }

        if let Some(notes) = notes {
            for (index, node) in notes.children.iter().enumerate() {
                let Some(el) = node.as_element() else {
                    continue;
                };
                if !el.is(self.kind.body_element()) {
                    continue;
                }
                let Some(id) = parse_id(el) else {
                    continue;
                };
                seen = seen.max(id);
                if NoteType::from_xml(el.attr("w:type")) == NoteType::Normal {
                    self.bodies.insert(id, index);
                }
            }
        }
        self.high_water = seen;
    }

    /// Highest id seen or handed out so far.
    #[inline]
    pub fn high_water(&self) -> NoteId {
        self.high_water
    }

    /// Never hand out ids at or below `floor`.
    pub fn raise_high_water(&mut self, floor: NoteId) {
        self.high_water = self.high_water.max(floor);
    }

    #[inline]
    pub fn kind(&self) -> NoteKind {
        self.kind
    }

    /// Ids with at least one anchor.
    pub fn anchor_ids(&self) -> impl Iterator<Item = NoteId> + '_ {
        self.anchors.keys().copied()
    }

    /// Ids with a normal body.
    pub fn body_ids(&self) -> impl Iterator<Item = NoteId> + '_ {
        self.bodies.keys().copied()
    }

    pub fn anchor_count(&self, id: NoteId) -> usize {
        self.anchors.get(&id).copied().unwrap_or(0)
    }

    pub fn has_body(&self, id: NoteId) -> bool {
        self.bodies.contains_key(&id)
    }

    /// Resolve an anchor id to its body.
    pub fn locate(&self, id: NoteId) -> Result<NoteBodyRef> {
        if !self.anchors.contains_key(&id) {
            return Err(Error::NotFound(format!("no {} anchor with id {id}", self.kind.label())));
        }
        self.bodies
            .get(&id)
            .map(|&index| NoteBodyRef { id, index })
            .ok_or_else(|| {
                Error::NotFound(format!("{} {id} has an anchor but no body", self.kind.label()))
            })
    }

    pub fn state(&self, id: NoteId) -> Option<NoteState> {
        match (self.bodies.contains_key(&id), self.anchors.contains_key(&id)) {
            (true, true) => Some(NoteState::Attached),
            (true, false) => Some(NoteState::Unattached),
            _ => None,
        }
    }

    /// Id the next registration will use.
    pub fn next_id(&self) -> NoteId {
        self.high_water.max(0) + 1
    }

    /// Append a new body to the notes root and return its id.
    pub fn register(&mut self, notes: &mut XmlElement, text: &str) -> NoteId {
        let id = self.next_id();
        notes.push(note_body(self.kind, id, text));
        self.bodies.insert(id, notes.children.len() - 1);
        self.high_water = id;
        debug!(kind = self.kind.label(), id, "registered note body");
        id
    }

    /// Record an anchor written for `id`.
    pub fn attach(&mut self, id: NoteId) {
        *self.anchors.entry(id).or_insert(0) += 1;
    }

    /// Remove every anchor and the body of `id`.
    ///
    /// Either side alone is removed as well, which repairs orphans.
    pub fn unlink(
        &mut self,
        id: NoteId,
        document: &mut XmlElement,
        mut notes: Option<&mut XmlElement>,
    ) -> Result<Unlinked> {
        if !self.anchors.contains_key(&id) && !self.bodies.contains_key(&id) {
            return Err(Error::NotFound(format!("no {} with id {id}", self.kind.label())));
        }

        let anchors = remove_anchors(document, self.kind.reference_element(), id);
        let mut body = false;
        if let Some(notes) = notes.as_deref_mut() {
            let body_element = self.kind.body_element();
            body = notes.remove_elements(|el| {
                el.is(body_element)
                    && parse_id(el) == Some(id)
                    && NoteType::from_xml(el.attr("w:type")) == NoteType::Normal
            }) > 0;
        }
        self.rebuild(document, notes.as_deref());
        debug!(kind = self.kind.label(), id, anchors, body, "unlinked note");
        Ok(Unlinked { anchors, body })
    }

    /// Ids present on exactly one side.
    pub fn scan_orphans(&self) -> BTreeSet<NoteId> {
        let anchors: BTreeSet<_> = self.anchors.keys().copied().collect();
        let bodies: BTreeSet<_> = self.bodies.keys().copied().collect();
        anchors.symmetric_difference(&bodies).copied().collect()
    }

    /// Anchors without a body.
    pub fn orphan_anchors(&self) -> Vec<NoteId> {
        self.anchor_ids().filter(|id| !self.has_body(*id)).collect()
    }

    /// Bodies without an anchor.
    pub fn orphan_bodies(&self) -> Vec<NoteId> {
        self.body_ids()
            .filter(|id| !self.anchors.contains_key(id))
            .collect()
    }

    /// Ids referenced by more than one anchor.
    pub fn duplicate_anchors(&self) -> Vec<NoteId> {
        self.anchors
            .iter()
            .filter(|(_, count)| **count > 1)
            .map(|(id, _)| *id)
            .collect()
    }
}

fn collect_anchors(el: &XmlElement, reference: &str, out: &mut BTreeMap<NoteId, usize>) {
    for child in el.elements() {
        if child.is(reference) {
            if let Some(id) = parse_id(child) {
                *out.entry(id).or_insert(0) += 1;
            }
        } else {
            collect_anchors(child, reference, out);
        }
    }
}

fn is_reference(el: &XmlElement, reference: &str, id: NoteId) -> bool {
    el.is(reference) && parse_id(el) == Some(id)
}

/// Remove anchors for `id`. A run holding only the reference goes with it.
fn remove_anchors(el: &mut XmlElement, reference: &str, id: NoteId) -> usize {
    let mut removed = 0;
    let mut i = 0;
    while i < el.children.len() {
        let XmlNode::Element(child) = &mut el.children[i] else {
            i += 1;
            continue;
        };
        if child.is("w:r") && child.elements().any(|c| is_reference(c, reference, id)) {
            let only_reference = child
                .elements()
                .all(|c| c.is("w:rPr") || is_reference(c, reference, id));
            if only_reference {
                el.children.remove(i);
                removed += 1;
                continue;
            }
            removed += child.remove_elements(|c| is_reference(c, reference, id));
        } else {
            removed += remove_anchors(child, reference, id);
        }
        i += 1;
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::xml::XmlDocument;

    fn parse(xml: &str) -> XmlElement {
        XmlDocument::parse(xml.as_bytes()).unwrap().root
    }

    fn document() -> XmlElement {
        parse(
            r#"<w:document><w:body>
<w:p><w:r><w:t>One</w:t></w:r><w:r><w:rPr><w:rStyle w:val="FootnoteReference"/></w:rPr><w:footnoteReference w:id="1"/></w:r></w:p>
<w:p><w:r><w:t>Two</w:t><w:footnoteReference w:id="3"/></w:r></w:p>
</w:body></w:document>"#,
        )
    }

    fn notes() -> XmlElement {
        parse(
            r#"<w:footnotes><w:footnote w:type="separator" w:id="-1"/><w:footnote w:type="continuationSeparator" w:id="0"/><w:footnote w:id="1"><w:p/></w:footnote><w:footnote w:id="2"><w:p/></w:footnote></w:footnotes>"#,
        )
    }

    #[test]
    fn test_build_and_orphans() {
        let graph = ReferenceGraph::build(NoteKind::Footnote, &document(), Some(&notes()));
        assert_eq!(graph.anchor_ids().collect::<Vec<_>>(), [1, 3]);
        assert_eq!(graph.body_ids().collect::<Vec<_>>(), [1, 2]);
        assert_eq!(graph.orphan_anchors(), [3]);
        assert_eq!(graph.orphan_bodies(), [2]);
        assert_eq!(graph.scan_orphans().into_iter().collect::<Vec<_>>(), [2, 3]);
        assert_eq!(graph.next_id(), 4);

        assert!(graph.locate(1).is_ok());
        assert!(matches!(graph.locate(3), Err(Error::NotFound(_))));
        assert!(matches!(graph.locate(2), Err(Error::NotFound(_))));
        assert_eq!(graph.state(1), Some(NoteState::Attached));
        assert_eq!(graph.state(2), Some(NoteState::Unattached));
        assert_eq!(graph.state(3), None);
    }

    #[test]
    fn test_register_attach_unlink() {
        let mut doc = document();
        let mut notes = notes();
        let mut graph = ReferenceGraph::build(NoteKind::Footnote, &doc, Some(&notes));

        let id = graph.register(&mut notes, "Source: archive");
        assert_eq!(id, 4);
        assert_eq!(graph.state(id), Some(NoteState::Unattached));
        graph.attach(id);
        assert_eq!(graph.state(id), Some(NoteState::Attached));

        let unlinked = graph.unlink(1, &mut doc, Some(&mut notes)).unwrap();
        assert_eq!(unlinked, Unlinked { anchors: 1, body: true });
        assert!(doc.find_all("w:footnoteReference").iter().all(|r| r.attr("w:id") != Some("1")));

        // The reference shares its run with text, so only the reference goes.
        let unlinked = graph.unlink(3, &mut doc, Some(&mut notes)).unwrap();
        assert_eq!(unlinked, Unlinked { anchors: 1, body: false });
        assert_eq!(doc.find_all("w:t").len(), 2);

        assert!(matches!(
            graph.unlink(3, &mut doc, Some(&mut notes)),
            Err(Error::NotFound(_))
        ));
        // Ids are never reused after removal.
        assert_eq!(graph.next_id(), 5);
    }

    #[test]
    fn test_separators_are_not_orphans() {
        let graph = ReferenceGraph::build(
            NoteKind::Footnote,
            &parse("<w:document><w:body/></w:document>"),
            Some(&notes()),
        );
        assert!(!graph.scan_orphans().contains(&-1));
        assert!(!graph.scan_orphans().contains(&0));
    }

    #[test]
    fn test_duplicate_anchors() {
        let doc = parse(
            r#"<w:body><w:p><w:r><w:footnoteReference w:id="1"/></w:r><w:r><w:footnoteReference w:id="1"/></w:r></w:p></w:body>"#,
        );
        let graph = ReferenceGraph::build(NoteKind::Footnote, &doc, None);
        assert_eq!(graph.duplicate_anchors(), [1]);
        assert_eq!(graph.anchor_count(1), 2);
    }
}
