//! Paragraph text and run segmentation.
//!
//! A paragraph's logical text is the concatenation of its runs' text, where
//! runs may sit inside hyperlinks, insertions, smart tags and similar
//! containers. All offsets here count chars of that logical text.
//!
//! Edits never touch text character by character. They split runs at range
//! boundaries (both halves keep the original `w:rPr`) and then replace or
//! insert whole runs.
use super::format::RunFormat;
use crate::common::error::{Error, Result};
use crate::common::xml::{XmlElement, XmlNode};
use smallvec::SmallVec;
use tracing::debug;

/// Path of child indices from the paragraph to a `w:r`.
pub type RunPath = SmallVec<[usize; 4]>;

const RUN: &str = "w:r";
const RPR: &str = "w:rPr";
const TEXT: &str = "w:t";

/// Elements whose runs belong to the enclosing paragraph's text.
const RUN_CONTAINERS: &[&str] = &[
    "w:hyperlink",
    "w:ins",
    "w:smartTag",
    "w:customXml",
    "w:fldSimple",
    "w:sdt",
    "w:sdtContent",
];

/// Portion of one run covered by a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSpan {
    pub run_index: usize,
    pub local_start: usize,
    pub local_end: usize,
}

/// Paths to every run of a paragraph, in document order.
pub fn run_paths(paragraph: &XmlElement) -> Vec<RunPath> {
    let mut paths = Vec::new();
    collect_runs(paragraph, &mut RunPath::new(), &mut paths);
    paths
}

fn collect_runs(el: &XmlElement, prefix: &mut RunPath, out: &mut Vec<RunPath>) {
    for (i, node) in el.children.iter().enumerate() {
        let XmlNode::Element(child) = node else {
            continue;
        };
        prefix.push(i);
        if child.is(RUN) {
            out.push(prefix.clone());
        } else if RUN_CONTAINERS.contains(&child.name.as_str()) {
            collect_runs(child, prefix, out);
        }
        prefix.pop();
    }
}

fn content_len(node: &XmlNode) -> usize {
    match node {
        XmlNode::Element(el) => match el.name.as_str() {
            TEXT => el.text().chars().count(),
            "w:tab" | "w:br" | "w:cr" => 1,
            _ => 0,
        },
        _ => 0,
    }
}

fn push_content_text(node: &XmlNode, out: &mut String) {
    if let XmlNode::Element(el) = node {
        match el.name.as_str() {
            TEXT => out.push_str(&el.text()),
            "w:tab" => out.push('\t'),
            "w:br" | "w:cr" => out.push('\n'),
            _ => {},
        }
    }
}

/// Logical text of a run.
pub fn run_text(run: &XmlElement) -> String {
    let mut out = String::new();
    for node in &run.children {
        push_content_text(node, &mut out);
    }
    out
}

/// Length of a run's logical text in chars.
pub fn run_len(run: &XmlElement) -> usize {
    run.children.iter().map(content_len).sum()
}

/// Logical text of a paragraph.
pub fn paragraph_text(paragraph: &XmlElement) -> String {
    let mut out = String::new();
    for path in run_paths(paragraph) {
        if let Some(run) = paragraph.get(&path) {
            for node in &run.children {
                push_content_text(node, &mut out);
            }
        }
    }
    out
}

/// Build a run from plain text: `\t` and `\n` become `w:tab` and `w:br`.
pub fn build_run(text: &str, rpr: Option<XmlElement>) -> XmlElement {
    let mut run = XmlElement::new(RUN);
    if let Some(rpr) = rpr {
        run.push(rpr);
    }
    let mut pending = String::new();
    let flush = |pending: &mut String, run: &mut XmlElement| {
        if !pending.is_empty() {
            run.push(text_element(&XmlElement::new(TEXT), pending));
            pending.clear();
        }
    };
    for ch in text.chars() {
        match ch {
            '\t' => {
                flush(&mut pending, &mut run);
                run.push(XmlElement::new("w:tab"));
            },
            '\n' => {
                flush(&mut pending, &mut run);
                run.push(XmlElement::new("w:br"));
            },
            c => pending.push(c),
        }
    }
    flush(&mut pending, &mut run);
    run
}

fn text_element(template: &XmlElement, text: &str) -> XmlElement {
    let mut t = XmlElement {
        name: TEXT.to_string(),
        attributes: template.attributes.clone(),
        children: Vec::new(),
    };
    t.set_attr("xml:space", "preserve");
    t.children.push(XmlNode::Text(text.to_string()));
    t
}

/// Byte index of the `n`th char.
fn char_to_byte(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map_or(s.len(), |(i, _)| i)
}

/// Split a run into two runs with the same properties at a local char offset.
///
/// Zero-length content (references, drawings) sitting exactly at the offset
/// goes to the right half.
fn split_run(run: &XmlElement, offset: usize) -> (XmlElement, XmlElement) {
    let mut left = XmlElement {
        name: run.name.clone(),
        attributes: run.attributes.clone(),
        children: Vec::new(),
    };
    let mut right = left.clone();
    if let Some(rpr) = run.child(RPR) {
        left.push(rpr.clone());
        right.push(rpr.clone());
    }

    let mut consumed = 0;
    let mut done = false;
    for node in &run.children {
        if node.as_element().is_some_and(|el| el.is(RPR)) {
            continue;
        }
        if done || consumed == offset {
            done = true;
            right.children.push(node.clone());
            continue;
        }
        let len = content_len(node);
        if consumed + len > offset
            && let XmlNode::Element(t) = node
        {
            let text = t.text();
            let at = char_to_byte(&text, offset - consumed);
            left.push(text_element(t, &text[..at]));
            right.push(text_element(t, &text[at..]));
            done = true;
            continue;
        }
        left.children.push(node.clone());
        consumed += len;
    }
    (left, right)
}

/// Drop the text-bearing children of a run. Returns whether anything other
/// than `w:rPr` is left.
fn strip_text(run: &mut XmlElement) -> bool {
    run.children.retain(|node| {
        node.as_element()
            .is_some_and(|el| !matches!(el.name.as_str(), TEXT | "w:tab" | "w:br" | "w:cr"))
    });
    run.children.iter().any(|node| node.as_element().is_some_and(|el| !el.is(RPR)))
}

/// Mutable view of one `w:p` element.
pub struct Paragraph<'a> {
    el: &'a mut XmlElement,
}

impl<'a> Paragraph<'a> {
    pub fn new(el: &'a mut XmlElement) -> Self {
        Self { el }
    }

    /// Logical text.
    pub fn text(&self) -> String {
        paragraph_text(self.el)
    }

    /// Logical length in chars.
    pub fn len(&self) -> usize {
        self.runs().iter().map(|(_, len)| len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run paths with their lengths.
    fn runs(&self) -> Vec<(RunPath, usize)> {
        run_paths(self.el)
            .into_iter()
            .map(|path| {
                let len = self.el.get(&path).map_or(0, run_len);
                (path, len)
            })
            .collect()
    }

    /// Number of runs.
    pub fn run_count(&self) -> usize {
        run_paths(self.el).len()
    }

    /// Borrow a run by index.
    pub fn run(&self, run_index: usize) -> Option<&XmlElement> {
        let path = run_paths(self.el).into_iter().nth(run_index)?;
        self.el.get(&path)
    }

    /// Text and formatting of every run, in order.
    pub fn run_summary(&self) -> Vec<(String, RunFormat)> {
        run_paths(self.el)
            .iter()
            .filter_map(|path| self.el.get(path))
            .map(|run| {
                let format = run.child(RPR).map(RunFormat::from_rpr).unwrap_or_default();
                (run_text(run), format)
            })
            .collect()
    }

    /// Runs overlapping `[start, end)`.
    ///
    /// For an empty range the run containing the position is returned (the
    /// last run when the position is the end of the text).
    pub fn locate_range(&self, start: usize, end: usize) -> Result<Vec<RunSpan>> {
        let runs = self.runs();
        let total: usize = runs.iter().map(|(_, len)| len).sum();
        check_range(start, end, total)?;

        let mut spans = Vec::new();
        let mut pos = 0;
        for (run_index, (_, len)) in runs.iter().enumerate() {
            let (run_start, run_end) = (pos, pos + len);
            pos = run_end;
            if start == end {
                if *len > 0 && run_start <= start && (start < run_end || start == total) {
                    spans.clear();
                    spans.push(RunSpan {
                        run_index,
                        local_start: start - run_start,
                        local_end: start - run_start,
                    });
                    if start < run_end {
                        break;
                    }
                }
                continue;
            }
            let lo = start.max(run_start);
            let hi = end.min(run_end);
            if lo < hi {
                spans.push(RunSpan {
                    run_index,
                    local_start: lo - run_start,
                    local_end: hi - run_start,
                });
            }
        }
        Ok(spans)
    }

    /// Split one run at a local char offset. No-op at an existing boundary.
    pub fn apply_split(&mut self, run_index: usize, local_offset: usize) -> Result<()> {
        let runs = self.runs();
        let (path, len) = runs
            .get(run_index)
            .ok_or_else(|| Error::OutOfBounds(format!("run index {run_index} of {}", runs.len())))?;
        if local_offset > *len {
            return Err(Error::RangeOutOfBounds(format!(
                "offset {local_offset} past run length {len}"
            )));
        }
        if local_offset == 0 || local_offset == *len {
            return Ok(());
        }

        let (parent_path, idx) = path.split_at(path.len() - 1);
        let idx = idx[0];
        let parent = self
            .el
            .get_mut(parent_path)
            .ok_or_else(|| Error::OutOfBounds(format!("run index {run_index}")))?;
        let Some(XmlNode::Element(run)) = parent.children.get(idx) else {
            return Err(Error::OutOfBounds(format!("run index {run_index}")));
        };
        let (left, right) = split_run(run, local_offset);
        parent.children[idx] = XmlNode::Element(left);
        parent.children.insert(idx + 1, XmlNode::Element(right));
        debug!(run_index, local_offset, "split run");
        Ok(())
    }

    /// Make `offset` a run boundary.
    fn split_at(&mut self, offset: usize) -> Result<()> {
        let mut pos = 0;
        for (run_index, (_, len)) in self.runs().into_iter().enumerate() {
            if offset > pos && offset < pos + len {
                return self.apply_split(run_index, offset - pos);
            }
            pos += len;
        }
        Ok(())
    }

    /// Position where a run starting at `offset` belongs: the parent path and
    /// child index, plus the neighbouring text run whose formatting applies.
    fn insertion_point(&self, offset: usize) -> (RunPath, usize, Option<RunPath>) {
        let runs = self.runs();
        let mut pos = 0;
        let mut before: Option<&RunPath> = None;
        for (path, len) in &runs {
            if *len == 0 {
                continue;
            }
            if pos >= offset {
                let (parent, idx) = path.split_at(path.len() - 1);
                return match before {
                    Some(prev) if pos == offset && offset > 0 => {
                        let (pp, pi) = prev.split_at(prev.len() - 1);
                        (RunPath::from_slice(pp), pi[0] + 1, Some(prev.clone()))
                    },
                    _ => (RunPath::from_slice(parent), idx[0], Some(path.clone())),
                };
            }
            pos += len;
            before = Some(path);
        }
        match before {
            Some(prev) => {
                let (pp, pi) = prev.split_at(prev.len() - 1);
                (RunPath::from_slice(pp), pi[0] + 1, Some(prev.clone()))
            },
            None => (RunPath::new(), self.el.children.len(), None),
        }
    }

    /// Replace `[start, end)` with `new_text` in a single run.
    ///
    /// The new run takes `format` when given, otherwise the properties of the
    /// first covered run. Empty `new_text` deletes the range. Zero-length
    /// content inside the range (note references, drawings, field characters)
    /// is kept in its run, after the new text.
    pub fn replace_range(
        &mut self,
        start: usize,
        end: usize,
        new_text: &str,
        format: Option<&RunFormat>,
    ) -> Result<()> {
        check_range(start, end, self.len())?;
        if let Some(format) = format {
            format.validate()?;
        }

        self.split_at(end)?;
        self.split_at(start)?;

        let runs = self.runs();
        let mut pos = 0;
        let mut covered: Vec<RunPath> = Vec::new();
        for (path, len) in &runs {
            if *len > 0 && pos >= start && pos + len <= end {
                covered.push(path.clone());
            }
            pos += len;
        }

        let (parent_path, index, template) = match covered.first() {
            Some(first) => {
                let (pp, pi) = first.split_at(first.len() - 1);
                (RunPath::from_slice(pp), pi[0], Some(first.clone()))
            },
            None => self.insertion_point(start),
        };
        let inherited = template
            .as_ref()
            .and_then(|path| self.el.get(path))
            .and_then(|run| run.child(RPR))
            .cloned();

        let mut kept = 0;
        for path in covered.iter().rev() {
            let Some(run) = self.el.get_mut(path) else {
                continue;
            };
            if strip_text(run) {
                kept += 1;
                continue;
            }
            let (pp, pi) = path.split_at(path.len() - 1);
            if let Some(parent) = self.el.get_mut(pp) {
                parent.children.remove(pi[0]);
            }
        }

        if !new_text.is_empty() {
            let rpr = match format {
                Some(f) => Some(f.to_rpr()),
                None => inherited,
            };
            let parent = self
                .el
                .get_mut(&parent_path)
                .ok_or_else(|| Error::OutOfBounds("insertion point".to_string()))?;
            let index = index.min(parent.children.len());
            parent.insert(index, build_run(new_text, rpr));
        }
        debug!(start, end, covered = covered.len(), kept, "replaced range");
        Ok(())
    }

    /// Insert a run at a char offset without replacing text.
    pub fn insert_run_at(&mut self, offset: usize, run: XmlElement) -> Result<()> {
        check_range(offset, offset, self.len())?;
        self.split_at(offset)?;
        let (parent_path, index, _) = self.insertion_point(offset);
        let parent = self
            .el
            .get_mut(&parent_path)
            .ok_or_else(|| Error::OutOfBounds("insertion point".to_string()))?;
        let index = index.min(parent.children.len());
        parent.insert(index, run);
        Ok(())
    }
}

fn check_range(start: usize, end: usize, total: usize) -> Result<()> {
    if start > end {
        return Err(Error::InvalidRange(format!("start {start} > end {end}")));
    }
    if end > total {
        return Err(Error::RangeOutOfBounds(format!(
            "end {end} past text length {total}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::xml::XmlDocument;
    use proptest::prelude::*;

    fn para(xml: &str) -> XmlElement {
        XmlDocument::parse(xml.as_bytes()).unwrap().root
    }

    fn hello_world() -> XmlElement {
        para(
            r#"<w:p><w:pPr><w:jc w:val="left"/></w:pPr><w:r><w:t xml:space="preserve">Hello </w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t>World</w:t></w:r></w:p>"#,
        )
    }

    fn bold() -> RunFormat {
        RunFormat {
            bold: Some(true),
            ..Default::default()
        }
    }

    #[test]
    fn test_text_through_containers() {
        let p = para(
            r#"<w:p><w:r><w:t>a</w:t><w:tab/></w:r><w:hyperlink r:id="rId3"><w:r><w:t>b</w:t></w:r></w:hyperlink><w:del><w:r><w:delText>x</w:delText></w:r></w:del><w:r><w:br/><w:t>c</w:t></w:r></w:p>"#,
        );
        assert_eq!(paragraph_text(&p), "a\tb\nc");
        assert_eq!(run_paths(&p).len(), 3);
    }

    #[test]
    fn test_replace_keeps_first_run_formatting() {
        let mut p = hello_world();
        let mut paragraph = Paragraph::new(&mut p);
        paragraph.replace_range(6, 11, "Earth", None).unwrap();
        assert_eq!(
            paragraph.run_summary(),
            vec![
                ("Hello ".to_string(), RunFormat::default()),
                ("Earth".to_string(), bold()),
            ]
        );
    }

    #[test]
    fn test_replace_across_runs() {
        let mut p = hello_world();
        let mut paragraph = Paragraph::new(&mut p);
        paragraph.replace_range(3, 8, "p, wo", None).unwrap();
        assert_eq!(paragraph.text(), "Help, world");
        let summary = paragraph.run_summary();
        assert_eq!(summary[0], ("Hel".to_string(), RunFormat::default()));
        assert_eq!(summary[1], ("p, wo".to_string(), RunFormat::default()));
        assert_eq!(summary[2], ("rld".to_string(), bold()));
    }

    #[test]
    fn test_replace_with_explicit_format_and_delete() {
        let mut p = hello_world();
        let mut paragraph = Paragraph::new(&mut p);
        let red = RunFormat {
            color: Some("FF0000".into()),
            ..Default::default()
        };
        paragraph.replace_range(0, 5, "Howdy", Some(&red)).unwrap();
        assert_eq!(paragraph.run_summary()[0], ("Howdy".to_string(), red));

        paragraph.replace_range(5, 6, "", None).unwrap();
        assert_eq!(paragraph.text(), "HowdyWorld");
    }

    #[test]
    fn test_range_errors() {
        let mut p = hello_world();
        let mut paragraph = Paragraph::new(&mut p);
        assert!(matches!(
            paragraph.replace_range(5, 2, "x", None),
            Err(Error::InvalidRange(_))
        ));
        assert!(matches!(
            paragraph.locate_range(0, 12),
            Err(Error::RangeOutOfBounds(_))
        ));
        assert!(matches!(
            paragraph.apply_split(7, 1),
            Err(Error::OutOfBounds(_))
        ));
        assert!(matches!(
            paragraph.apply_split(1, 6),
            Err(Error::RangeOutOfBounds(_))
        ));
    }

    #[test]
    fn test_locate_range() {
        let mut p = hello_world();
        let paragraph = Paragraph::new(&mut p);
        let spans = paragraph.locate_range(4, 8).unwrap();
        assert_eq!(
            spans,
            vec![
                RunSpan {
                    run_index: 0,
                    local_start: 4,
                    local_end: 6
                },
                RunSpan {
                    run_index: 1,
                    local_start: 0,
                    local_end: 2
                },
            ]
        );
        let at_end = paragraph.locate_range(11, 11).unwrap();
        assert_eq!(at_end[0].run_index, 1);
        assert_eq!(at_end[0].local_start, 5);
    }

    #[test]
    fn test_zero_length_runs_survive_replace() {
        let mut p = para(
            r#"<w:p><w:r><w:t>ab</w:t></w:r><w:r><w:footnoteReference w:id="1"/></w:r><w:r><w:t>cd</w:t></w:r></w:p>"#,
        );
        let mut paragraph = Paragraph::new(&mut p);
        paragraph.replace_range(1, 3, "X", None).unwrap();
        assert_eq!(paragraph.text(), "aXd");
        assert_eq!(p.find_all("w:footnoteReference").len(), 1);
    }

    #[test]
    fn test_reference_inside_text_run_survives_replace() {
        let mut p = para(
            r#"<w:p><w:r><w:rPr><w:i/></w:rPr><w:t>ab</w:t><w:footnoteReference w:id="1"/><w:t>cd</w:t></w:r></w:p>"#,
        );
        let mut paragraph = Paragraph::new(&mut p);
        paragraph.replace_range(1, 3, "X", None).unwrap();
        assert_eq!(paragraph.text(), "aXd");

        let paths = run_paths(&p);
        assert_eq!(paths.len(), 4);
        assert_eq!(run_text(p.get(&paths[1]).unwrap()), "X");
        let anchor = p.get(&paths[2]).unwrap();
        assert!(anchor.child("w:footnoteReference").is_some());
        assert!(anchor.child("w:t").is_none());
        assert!(anchor.child(RPR).and_then(|rpr| rpr.child("w:i")).is_some());
        assert_eq!(p.find_all("w:footnoteReference").len(), 1);
    }

    #[test]
    fn test_deleting_range_keeps_field_characters() {
        let mut p = para(
            r#"<w:p><w:r><w:t>one </w:t><w:fldChar w:fldCharType="begin"/><w:t>two</w:t></w:r></w:p>"#,
        );
        let mut paragraph = Paragraph::new(&mut p);
        paragraph.replace_range(0, 7, "", None).unwrap();
        assert_eq!(paragraph.text(), "");
        assert_eq!(p.find_all("w:fldChar").len(), 1);
    }

    #[test]
    fn test_insert_run_after_text() {
        let mut p = hello_world();
        let mut paragraph = Paragraph::new(&mut p);
        let anchor = XmlElement::new("w:r").with_child(XmlElement::new("w:footnoteReference"));
        paragraph.insert_run_at(5, anchor).unwrap();
        let paths = run_paths(&p);
        assert_eq!(paths.len(), 4);
        let second = p.get(&paths[1]).unwrap();
        assert!(second.child("w:footnoteReference").is_some());
        assert_eq!(paragraph_text(&p), "Hello World");
    }

    #[test]
    fn test_insert_into_empty_paragraph() {
        let mut p = para("<w:p><w:pPr/></w:p>");
        let mut paragraph = Paragraph::new(&mut p);
        paragraph.replace_range(0, 0, "new", None).unwrap();
        assert_eq!(paragraph.text(), "new");
    }

    #[test]
    fn test_tabs_and_breaks_in_new_text() {
        let run = build_run("a\tb\nc", None);
        let names: Vec<_> = run.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["w:t", "w:tab", "w:t", "w:br", "w:t"]);
    }

    proptest! {
        #[test]
        fn prop_split_is_idempotent(offset in 0usize..=6) {
            let mut once = hello_world();
            Paragraph::new(&mut once).apply_split(0, offset).unwrap();

            let mut twice = hello_world();
            let mut paragraph = Paragraph::new(&mut twice);
            paragraph.apply_split(0, offset).unwrap();
            paragraph.apply_split(0, offset).unwrap();

            prop_assert_eq!(&once, &twice);
            prop_assert_eq!(paragraph_text(&once), "Hello World");
        }

        #[test]
        fn prop_replacement_formatting(start in 0usize..11, len in 0usize..11, text in "[a-z]{1,8}", explicit in any::<bool>()) {
            let end = (start + len).min(11);
            let mut p = hello_world();
            let mut paragraph = Paragraph::new(&mut p);
            let format = RunFormat { italic: Some(true), ..Default::default() };
            paragraph
                .replace_range(start, end, &text, explicit.then_some(&format))
                .unwrap();

            // An empty range inherits from the run before the insertion point.
            let plain = if start < end { start < 6 } else { start <= 6 };
            let expected = if explicit {
                format.clone()
            } else if plain {
                RunFormat::default()
            } else {
                bold()
            };
            let mut pos = 0;
            let mut inserted = None;
            for (t, f) in paragraph.run_summary() {
                if pos == start && t == text {
                    inserted = Some(f);
                    break;
                }
                pos += t.chars().count();
            }
            prop_assert_eq!(inserted, Some(expected));
        }
    }
}
