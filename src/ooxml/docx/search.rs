//! Text search and replacement across run boundaries.
use super::format::RunFormat;
use super::paragraph::{Paragraph, paragraph_text};
use crate::common::error::{Error, Result};
use crate::common::xml::XmlElement;
use memchr::memmem;
use serde::{Deserialize, Serialize};
use tracing::debug;

const PARAGRAPH: &str = "w:p";

/// Matching options.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    pub match_case: bool,
    pub whole_word: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            match_case: true,
            whole_word: false,
        }
    }
}

/// A paragraph reachable from the body.
#[derive(Debug, Clone)]
pub struct ParagraphLocation {
    /// Child-index path from the body element
    pub path: Vec<usize>,
    /// Index among the body's direct paragraphs, when it is one
    pub top_level: Option<usize>,
}

/// One occurrence of the needle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextMatch {
    /// Ordinal of the paragraph among all scanned paragraphs
    pub paragraph: usize,
    /// Index among the body's direct paragraphs
    pub top_level_paragraph: Option<usize>,
    /// Char offset of the match start
    pub start: usize,
    /// Char offset one past the match end
    pub end: usize,
    /// Full text of the paragraph
    pub context: String,
}

/// Every paragraph in document order: body paragraphs, table cells and
/// content controls. Paragraphs nested inside runs (text boxes) are skipped.
pub fn paragraphs(body: &XmlElement) -> Vec<ParagraphLocation> {
    let mut out = Vec::new();
    let mut top_level = 0;
    for (i, child) in body.children.iter().enumerate() {
        let Some(el) = child.as_element() else {
            continue;
        };
        if el.is(PARAGRAPH) {
            out.push(ParagraphLocation {
                path: vec![i],
                top_level: Some(top_level),
            });
            top_level += 1;
        } else {
            collect_nested(el, &mut vec![i], &mut out);
        }
    }
    out
}

fn collect_nested(el: &XmlElement, prefix: &mut Vec<usize>, out: &mut Vec<ParagraphLocation>) {
    if el.is("w:r") {
        return;
    }
    for (i, child) in el.children.iter().enumerate() {
        let Some(child) = child.as_element() else {
            continue;
        };
        prefix.push(i);
        if child.is(PARAGRAPH) {
            out.push(ParagraphLocation {
                path: prefix.clone(),
                top_level: None,
            });
        } else {
            collect_nested(child, prefix, out);
        }
        prefix.pop();
    }
}

/// Char offsets of non-overlapping matches, left to right.
pub fn find_in_text(haystack: &str, needle: &str, options: SearchOptions) -> Vec<(usize, usize)> {
    if needle.is_empty() {
        return Vec::new();
    }
    let hay: Vec<char> = haystack.chars().collect();
    let needle_len = needle.chars().count();

    let candidates: Vec<usize> = if options.match_case {
        // Byte offsets from memmem, mapped back to chars.
        let mut char_of_byte = vec![0usize; haystack.len() + 1];
        for (ci, (bi, _)) in haystack.char_indices().enumerate() {
            char_of_byte[bi] = ci;
        }
        memmem::find_iter(haystack.as_bytes(), needle.as_bytes())
            .map(|b| char_of_byte[b])
            .collect()
    } else {
        let fold = |c: char| c.to_lowercase().next().unwrap_or(c);
        let hay_folded: Vec<char> = hay.iter().copied().map(fold).collect();
        let needle_folded: Vec<char> = needle.chars().map(fold).collect();
        (0..hay_folded.len().saturating_sub(needle_len - 1))
            .filter(|&i| hay_folded[i..i + needle_len] == needle_folded[..])
            .collect()
    };

    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let mut matches = Vec::new();
    let mut next_free = 0;
    for start in candidates {
        let end = start + needle_len;
        if start < next_free {
            continue;
        }
        if options.whole_word {
            let before = start.checked_sub(1).map(|i| hay[i]);
            let after = hay.get(end).copied();
            if before.is_some_and(is_word) || after.is_some_and(is_word) {
                continue;
            }
        }
        matches.push((start, end));
        next_free = end;
    }
    matches
}

/// Find every occurrence of `needle` in the body.
pub fn find_text(body: &XmlElement, needle: &str, options: SearchOptions) -> Result<Vec<TextMatch>> {
    if needle.is_empty() {
        return Err(Error::InvalidArgument("search text is empty".to_string()));
    }
    let mut found = Vec::new();
    for (ordinal, loc) in paragraphs(body).into_iter().enumerate() {
        let Some(p) = body.get(&loc.path) else {
            continue;
        };
        let text = paragraph_text(p);
        for (start, end) in find_in_text(&text, needle, options) {
            found.push(TextMatch {
                paragraph: ordinal,
                top_level_paragraph: loc.top_level,
                start,
                end,
                context: text.clone(),
            });
        }
    }
    Ok(found)
}

/// Replace every occurrence of `needle`, preserving the formatting of the
/// first run each match covers unless `format` is given. Returns the count.
pub fn replace_text(
    body: &mut XmlElement,
    needle: &str,
    replacement: &str,
    format: Option<&RunFormat>,
    options: SearchOptions,
) -> Result<usize> {
    if needle.is_empty() {
        return Err(Error::InvalidArgument("search text is empty".to_string()));
    }
    if let Some(format) = format {
        format.validate()?;
    }

    let mut count = 0;
    for loc in paragraphs(body) {
        let Some(p) = body.get_mut(&loc.path) else {
            continue;
        };
        let text = paragraph_text(p);
        let matches = find_in_text(&text, needle, options);
        if matches.is_empty() {
            continue;
        }
        let mut paragraph = Paragraph::new(p);
        for &(start, end) in matches.iter().rev() {
            paragraph.replace_range(start, end, replacement, format)?;
        }
        count += matches.len();
    }
    debug!(needle, count, "replaced text");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::xml::XmlDocument;

    fn body() -> XmlElement {
        XmlDocument::parse(
            br#"<w:body>
<w:p><w:r><w:t xml:space="preserve">The cat </w:t></w:r><w:r><w:rPr><w:i/></w:rPr><w:t>sat</w:t></w:r><w:r><w:t xml:space="preserve"> on the Cat-mat.</w:t></w:r></w:p>
<w:tbl><w:tr><w:tc><w:p><w:r><w:t>cat in a cell</w:t></w:r></w:p></w:tc></w:tr></w:tbl>
<w:p><w:r><w:t>concatenate</w:t></w:r></w:p>
<w:sectPr/>
</w:body>"#,
        )
        .unwrap()
        .root
    }

    #[test]
    fn test_paragraph_order() {
        let locs = paragraphs(&body());
        assert_eq!(locs.len(), 3);
        assert_eq!(locs[0].top_level, Some(0));
        assert_eq!(locs[1].top_level, None);
        assert_eq!(locs[2].top_level, Some(1));
    }

    #[test]
    fn test_find_case_and_words() {
        let body = body();
        let hits = find_text(&body, "cat", SearchOptions::default()).unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!((hits[0].start, hits[0].end), (4, 7));

        let insensitive = SearchOptions {
            match_case: false,
            whole_word: true,
        };
        let hits = find_text(&body, "CAT", insensitive).unwrap();
        assert_eq!(hits.len(), 3);
        assert!(hits.iter().all(|m| m.context != "concatenate"));
    }

    #[test]
    fn test_find_across_runs() {
        let hits = find_text(&body(), "cat sat on", SearchOptions::default()).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].top_level_paragraph, Some(0));
    }

    #[test]
    fn test_replace_everywhere() {
        let mut body = body();
        let n = replace_text(&mut body, "cat", "dog", None, SearchOptions::default()).unwrap();
        assert_eq!(n, 3);
        let texts: Vec<_> = paragraphs(&body)
            .iter()
            .map(|loc| paragraph_text(body.get(&loc.path).unwrap()))
            .collect();
        assert_eq!(texts[0], "The dog sat on the Cat-mat.");
        assert_eq!(texts[1], "dog in a cell");
        assert_eq!(texts[2], "condogenate");
    }

    #[test]
    fn test_replace_spanning_runs_keeps_first_format() {
        let mut body = body();
        replace_text(&mut body, "sat on", "lay by", None, SearchOptions::default()).unwrap();
        let p = body.get_mut(&[1]).unwrap();
        let summary = Paragraph::new(p).run_summary();
        let (_, format) = summary.iter().find(|(t, _)| t == "lay by").unwrap();
        assert_eq!(format.italic, Some(true));
    }

    #[test]
    fn test_replace_over_note_anchor_keeps_anchor() {
        let mut body = XmlDocument::parse(
            br#"<w:body><w:p><w:r><w:t>ab</w:t><w:footnoteReference w:id="1"/><w:t>cd</w:t></w:r></w:p></w:body>"#,
        )
        .unwrap()
        .root;
        let hits = find_text(&body, "bc", SearchOptions::default()).unwrap();
        assert_eq!(hits.len(), 1);

        let n = replace_text(&mut body, "bc", "X", None, SearchOptions::default()).unwrap();
        assert_eq!(n, 1);
        let p = body.child("w:p").unwrap();
        assert_eq!(paragraph_text(p), "aXd");
        let anchors = body.find_all("w:footnoteReference");
        assert_eq!(anchors.len(), 1);
        assert_eq!(anchors[0].attr("w:id"), Some("1"));
    }

    #[test]
    fn test_empty_needle() {
        assert!(matches!(
            find_text(&body(), "", SearchOptions::default()),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_overlapping_candidates() {
        let hits = find_in_text("aaaa", "aa", SearchOptions::default());
        assert_eq!(hits, vec![(0, 2), (2, 4)]);
        let hits = find_in_text("AAAA", "aa", SearchOptions { match_case: false, whole_word: false });
        assert_eq!(hits, vec![(0, 2), (2, 4)]);
    }
}
