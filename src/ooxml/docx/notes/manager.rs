//! Footnote/endnote insertion, removal and repair.
//!
//! Every operation resolves and validates its target before touching the
//! package, so a failed call leaves both parts as they were.
use super::graph::{ReferenceGraph, anchor_run};
use super::{NoteId, NoteKind, NoteType};
use crate::common::error::{Error, Result};
use crate::common::xml::XmlElement;
use crate::ooxml::docx::Package;
use crate::ooxml::docx::paragraph::{Paragraph, paragraph_text};
use crate::ooxml::docx::search::{self, SearchOptions};
use crate::ooxml::docx::styles;
use serde::Serialize;
use tracing::{debug, info, warn};

const BODY: &str = "w:body";

/// Where a new anchor goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnchorLocation {
    /// Right after a match of the text
    AfterText(String),
    /// Right before a match of the text
    BeforeText(String),
    /// Body paragraph by index; `offset` defaults to the end of its text
    Paragraph { index: usize, offset: Option<usize> },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InsertOptions {
    /// Require exactly one text match
    pub validate_location: bool,
    /// Remove existing orphans before inserting
    pub auto_repair: bool,
}

/// Which notes to remove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteSelector {
    Id(NoteId),
    /// Every anchor in paragraphs whose text contains this string
    Text(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RemoveOutcome {
    pub removed: Vec<NoteId>,
    pub cleaned_orphans: Vec<NoteId>,
}

/// Consistency report between anchors and bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteReport {
    pub kind: NoteKind,
    pub anchor_ids: Vec<NoteId>,
    pub body_ids: Vec<NoteId>,
    pub orphan_anchors: Vec<NoteId>,
    pub orphan_bodies: Vec<NoteId>,
    pub duplicate_anchors: Vec<NoteId>,
}

impl NoteReport {
    pub fn is_consistent(&self) -> bool {
        self.orphan_anchors.is_empty()
            && self.orphan_bodies.is_empty()
            && self.duplicate_anchors.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteSummary {
    pub id: NoteId,
    pub text: String,
}

/// Notes of one kind in one package.
pub struct NoteManager<'a> {
    package: &'a mut Package,
    kind: NoteKind,
}

impl<'a> NoteManager<'a> {
    pub fn new(package: &'a mut Package, kind: NoteKind) -> Self {
        Self { package, kind }
    }

    fn graph(&self) -> Result<ReferenceGraph> {
        build_graph(self.package, self.kind)
    }

    /// Run `f` over the document root and the notes root (when present).
    fn edit<R>(
        &mut self,
        f: impl FnOnce(&mut XmlElement, Option<&mut XmlElement>) -> Result<R>,
    ) -> Result<R> {
        match self.package.notes_part(self.kind)? {
            Some(name) => {
                let (document, notes) = self.package.document_and_part_mut(&name)?;
                f(&mut document.root, Some(&mut notes.root))
            },
            None => f(&mut self.package.document_mut()?.root, None),
        }
    }

    /// Resolve a location to a paragraph path (relative to the body) and a char offset.
    fn resolve(
        &self,
        location: &AnchorLocation,
        options: InsertOptions,
    ) -> Result<(Vec<usize>, usize)> {
        let body = self.package.body()?;
        match location {
            AnchorLocation::Paragraph { index, offset } => {
                let locations = search::paragraphs(body);
                let top: Vec<_> = locations.iter().filter(|l| l.top_level.is_some()).collect();
                let loc = top.get(*index).ok_or_else(|| {
                    Error::OutOfBounds(format!(
                        "paragraph index {index}, document has {}",
                        top.len()
                    ))
                })?;
                let p = body
                    .get(&loc.path)
                    .ok_or_else(|| Error::OutOfBounds(format!("paragraph index {index}")))?;
                let len = paragraph_text(p).chars().count();
                let offset = offset.unwrap_or(len);
                if offset > len {
                    return Err(Error::RangeOutOfBounds(format!(
                        "offset {offset} past paragraph length {len}"
                    )));
                }
                Ok((loc.path.clone(), offset))
            },
            AnchorLocation::AfterText(needle) | AnchorLocation::BeforeText(needle) => {
                let after = matches!(location, AnchorLocation::AfterText(_));
                if needle.is_empty() {
                    return Err(Error::InvalidArgument("anchor text is empty".to_string()));
                }
                let mut hits = Vec::new();
                for loc in search::paragraphs(body) {
                    let Some(p) = body.get(&loc.path) else {
                        continue;
                    };
                    let text = paragraph_text(p);
                    for (start, end) in search::find_in_text(&text, needle, SearchOptions::default()) {
                        hits.push((loc.path.clone(), if after { end } else { start }));
                    }
                }
                if options.validate_location && hits.len() != 1 {
                    return Err(Error::AmbiguousLocation(format!(
                        "'{needle}' matches {} places, expected exactly one",
                        hits.len()
                    )));
                }
                hits.into_iter()
                    .next()
                    .ok_or_else(|| Error::NotFound(format!("text '{needle}' not found")))
            },
        }
    }

    /// Insert a note anchored at `location` and return its id.
    pub fn insert(
        &mut self,
        location: &AnchorLocation,
        text: &str,
        options: InsertOptions,
    ) -> Result<NoteId> {
        let (path, offset) = self.resolve(location, options)?;
        let kind = self.kind;

        let notes_name = self.package.ensure_notes_part(kind)?;
        if let Some(styles_name) = self.package.styles_part()? {
            let root = &self.package.opc().xml(&styles_name)?.root;
            let missing = !styles::has_style(root, kind.text_style())
                || !styles::has_style(root, kind.reference_style());
            if missing {
                let root = &mut self.package.opc_mut().xml_mut(&styles_name)?.root;
                let added = styles::ensure_note_styles(root, kind);
                debug!(?added, "added note styles");
            }
        }

        let floor = self.package.note_high_water(kind);
        let (document, notes) = self.package.document_and_part_mut(&notes_name)?;
        let mut graph = ReferenceGraph::build(kind, &document.root, Some(&notes.root));
        graph.raise_high_water(floor);
        if options.auto_repair {
            for orphan in graph.scan_orphans() {
                graph.unlink(orphan, &mut document.root, Some(&mut notes.root))?;
                warn!(kind = kind.label(), id = orphan, "removed orphaned note");
            }
        }

        let id = graph.register(&mut notes.root, text);
        let paragraph = document
            .root
            .child_mut(BODY)
            .and_then(|body| body.get_mut(&path))
            .ok_or_else(|| Error::CorruptPackage("anchor paragraph disappeared".to_string()))?;
        Paragraph::new(paragraph).insert_run_at(offset, anchor_run(kind, id))?;
        graph.attach(id);
        self.package.raise_note_high_water(kind, graph.high_water());

        info!(kind = kind.label(), id, offset, "inserted note");
        Ok(id)
    }

    /// Remove notes by id or by surrounding text.
    pub fn remove(&mut self, selector: &NoteSelector, clean_orphans: bool) -> Result<RemoveOutcome> {
        let kind = self.kind;
        let graph = self.graph()?;
        self.package.raise_note_high_water(kind, graph.high_water());
        let ids: Vec<NoteId> = match selector {
            NoteSelector::Id(id) => {
                if graph.anchor_count(*id) == 0 && !graph.has_body(*id) {
                    return Err(Error::NotFound(format!("no {} with id {id}", kind.label())));
                }
                vec![*id]
            },
            NoteSelector::Text(needle) => {
                if needle.is_empty() {
                    return Err(Error::InvalidArgument("selector text is empty".to_string()));
                }
                let ids = anchors_near_text(self.package.body()?, kind, needle);
                if ids.is_empty() {
                    return Err(Error::NotFound(format!(
                        "no {} anchors in paragraphs containing '{needle}'",
                        kind.label()
                    )));
                }
                ids
            },
        };

        self.edit(move |document, mut notes| {
            let mut graph = graph;
            let mut outcome = RemoveOutcome::default();
            for id in ids {
                graph.unlink(id, document, notes.as_deref_mut())?;
                outcome.removed.push(id);
            }
            if clean_orphans {
                for orphan in graph.scan_orphans() {
                    graph.unlink(orphan, document, notes.as_deref_mut())?;
                    warn!(kind = kind.label(), id = orphan, "removed orphaned note");
                    outcome.cleaned_orphans.push(orphan);
                }
            }
            info!(kind = kind.label(), removed = ?outcome.removed, "removed notes");
            Ok(outcome)
        })
    }

    /// Compare anchors against bodies.
    pub fn validate(&self) -> Result<NoteReport> {
        note_report(self.package, self.kind)
    }

    /// Remove every anchor without a body and every body without an anchor.
    pub fn clean_orphans(&mut self) -> Result<Vec<NoteId>> {
        let graph = self.graph()?;
        self.package.raise_note_high_water(self.kind, graph.high_water());
        let orphans: Vec<NoteId> = graph.scan_orphans().into_iter().collect();
        if orphans.is_empty() {
            return Ok(orphans);
        }
        let kind = self.kind;
        self.edit(move |document, mut notes| {
            let mut graph = graph;
            for &id in &orphans {
                graph.unlink(id, document, notes.as_deref_mut())?;
                warn!(kind = kind.label(), id, "removed orphaned note");
            }
            Ok(orphans)
        })
    }

    /// Every normal note body with its text.
    pub fn list(&self) -> Result<Vec<NoteSummary>> {
        list_notes(self.package, self.kind)
    }
}

fn build_graph(package: &Package, kind: NoteKind) -> Result<ReferenceGraph> {
    let document = &package.document()?.root;
    let notes = match package.notes_part(kind)? {
        Some(name) => Some(&package.opc().xml(&name)?.root),
        None => None,
    };
    let mut graph = ReferenceGraph::build(kind, document, notes);
    graph.raise_high_water(package.note_high_water(kind));
    Ok(graph)
}

/// Consistency report for a package that is only being read.
pub fn note_report(package: &Package, kind: NoteKind) -> Result<NoteReport> {
    let graph = build_graph(package, kind)?;
    Ok(NoteReport {
        kind,
        anchor_ids: graph.anchor_ids().collect(),
        body_ids: graph.body_ids().collect(),
        orphan_anchors: graph.orphan_anchors(),
        orphan_bodies: graph.orphan_bodies(),
        duplicate_anchors: graph.duplicate_anchors(),
    })
}

/// Normal note bodies of `kind` with their text.
pub fn list_notes(package: &Package, kind: NoteKind) -> Result<Vec<NoteSummary>> {
    let Some(name) = package.notes_part(kind)? else {
        return Ok(Vec::new());
    };
    let notes = &package.opc().xml(&name)?.root;
    let summaries = notes
        .elements()
        .filter(|el| {
            el.is(kind.body_element()) && NoteType::from_xml(el.attr("w:type")) == NoteType::Normal
        })
        .filter_map(|el| {
            let id = el.attr("w:id")?.trim().parse().ok()?;
            let text = el
                .find_all("w:p")
                .into_iter()
                .map(paragraph_text)
                .collect::<Vec<_>>()
                .join("\n");
            Some(NoteSummary {
                id,
                text: text.trim().to_string(),
            })
        })
        .collect();
    Ok(summaries)
}

/// Anchor ids inside paragraphs whose text contains `needle`, in document order.
fn anchors_near_text(body: &XmlElement, kind: NoteKind, needle: &str) -> Vec<NoteId> {
    let mut ids = Vec::new();
    for loc in search::paragraphs(body) {
        let Some(p) = body.get(&loc.path) else {
            continue;
        };
        if !paragraph_text(p).contains(needle) {
            continue;
        }
        for reference in p.find_all(kind.reference_element()) {
            if let Some(id) = reference.attr("w:id").and_then(|v| v.trim().parse().ok())
                && !ids.contains(&id)
            {
                ids.push(id);
            }
        }
    }
    ids
}
