use aho_corasick::AhoCorasick;
use once_cell::sync::Lazy;

// Static initialization: automata are built only once, thread-safe
static TEXT_ESCAPER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .build(["&", "<", ">"])
        .expect("Failed to build XML text escaper")
});

static ATTR_ESCAPER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .build(["&", "<", ">", "\"", "\r", "\n", "\t"])
        .expect("Failed to build XML attribute escaper")
});

/// Escape character data for use between tags.
///
/// # Examples
///
/// ```
/// use longan::common::xml::escape_text;
/// assert_eq!(escape_text("a & b"), "a &amp; b");
/// assert_eq!(escape_text("\"quoted\""), "\"quoted\"");
/// ```
#[inline]
pub fn escape_text(s: &str) -> String {
    TEXT_ESCAPER.replace_all(s, &["&amp;", "&lt;", "&gt;"])
}

/// Escape an attribute value for use inside double quotes.
///
/// Whitespace control characters are written as character references so
/// attribute-value normalization does not fold them on the next read.
///
/// # Examples
///
/// ```
/// use longan::common::xml::escape_attr;
/// assert_eq!(escape_attr("say \"hi\""), "say &quot;hi&quot;");
/// ```
#[inline]
pub fn escape_attr(s: &str) -> String {
    ATTR_ESCAPER.replace_all(
        s,
        &["&amp;", "&lt;", "&gt;", "&quot;", "&#xD;", "&#xA;", "&#x9;"],
    )
}

/// Resolve the body of an entity or character reference (`amp`, `#x20`, `#65`).
///
/// Returns `None` for entities that are not predefined by XML.
pub fn resolve_reference(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let num = name.strip_prefix('#')?;
            let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse::<u32>().ok()?,
            };
            char::from_u32(code)
        },
    }
}
