//! Part names inside a package.
//!
//! A [`PackURI`] is an absolute, slash-separated part name such as
//! `/word/footnotes.xml`. Relationship targets are relative to the source
//! part's directory and are resolved through [`PackURI::from_rel_ref`].
use super::error::{OpcError, Result};
use std::fmt;

/// Absolute part name within a package.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackURI(String);

impl PackURI {
    /// The package pseudo-part used as the source of package-level relationships.
    pub fn package() -> Self {
        PackURI("/".to_string())
    }

    /// Validate and wrap a part name. It must start with `/`.
    pub fn new(uri: impl Into<String>) -> Result<Self> {
        let uri = uri.into();
        if !uri.starts_with('/') {
            return Err(OpcError::InvalidPartName(format!(
                "part name must begin with '/': {uri}"
            )));
        }
        Ok(PackURI(uri))
    }

    /// Build a part name from a ZIP member name (no leading slash).
    pub fn from_member(member: &str) -> Result<Self> {
        Self::new(format!("/{}", member.trim_start_matches('/')))
    }

    /// Resolve a relationship target against the directory of its source part.
    ///
    /// Absolute targets (`/word/styles.xml`) are taken as they are.
    pub fn from_rel_ref(base_uri: &str, target: &str) -> Result<Self> {
        if target.starts_with('/') {
            return Self::new(normalize(target));
        }
        let joined = if base_uri.ends_with('/') {
            format!("{base_uri}{target}")
        } else {
            format!("{base_uri}/{target}")
        };
        Self::new(normalize(&joined))
    }

    /// Directory portion, `/word` for `/word/document.xml`.
    pub fn base_uri(&self) -> &str {
        match self.0.rfind('/') {
            Some(0) | None => "/",
            Some(pos) => &self.0[..pos],
        }
    }

    /// Final path segment, `document.xml` for `/word/document.xml`.
    pub fn filename(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or("")
    }

    /// Extension without the dot.
    pub fn ext(&self) -> &str {
        let filename = self.filename();
        filename.rfind('.').map_or("", |pos| &filename[pos + 1..])
    }

    /// ZIP member name: the part name without its leading slash.
    #[inline]
    pub fn membername(&self) -> &str {
        &self.0[1..]
    }

    /// Relative reference from `base_uri` to this part, as written in a `.rels` target.
    pub fn relative_ref(&self, base_uri: &str) -> String {
        let from: Vec<&str> = base_uri.split('/').filter(|s| !s.is_empty()).collect();
        let to: Vec<&str> = self.0.split('/').filter(|s| !s.is_empty()).collect();
        let common = from
            .iter()
            .zip(to.iter())
            .take_while(|(a, b)| a == b)
            .count();

        let mut segments: Vec<&str> = std::iter::repeat_n("..", from.len() - common).collect();
        segments.extend_from_slice(&to[common..]);
        segments.join("/")
    }

    /// Part name of the relationships part belonging to this part.
    ///
    /// `/word/_rels/document.xml.rels` for `/word/document.xml`, `/_rels/.rels`
    /// for the package itself.
    pub fn rels_uri(&self) -> PackURI {
        let base = self.base_uri();
        let filename = self.filename();
        if base == "/" {
            PackURI(format!("/_rels/{filename}.rels"))
        } else {
            PackURI(format!("{base}/_rels/{filename}.rels"))
        }
    }

    /// Whether this part is a relationships part.
    #[inline]
    pub fn is_rels(&self) -> bool {
        self.0.ends_with(".rels")
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackURI {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PackURI {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Collapse `.` and `..` segments.
fn normalize(path: &str) -> String {
    let mut stack: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {},
            ".." => {
                stack.pop();
            },
            s => stack.push(s),
        }
    }
    format!("/{}", stack.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_components() {
        let uri = PackURI::new("/word/footnotes.xml").unwrap();
        assert_eq!(uri.base_uri(), "/word");
        assert_eq!(uri.filename(), "footnotes.xml");
        assert_eq!(uri.ext(), "xml");
        assert_eq!(uri.membername(), "word/footnotes.xml");
        assert_eq!(uri.rels_uri().as_str(), "/word/_rels/footnotes.xml.rels");
    }

    #[test]
    fn test_package_rels() {
        assert_eq!(PackURI::package().rels_uri().as_str(), "/_rels/.rels");
        assert_eq!(PackURI::package().base_uri(), "/");
    }

    #[test]
    fn test_rel_ref_resolution() {
        let uri = PackURI::from_rel_ref("/word", "footnotes.xml").unwrap();
        assert_eq!(uri.as_str(), "/word/footnotes.xml");

        let uri = PackURI::from_rel_ref("/word", "../customXml/item1.xml").unwrap();
        assert_eq!(uri.as_str(), "/customXml/item1.xml");

        let uri = PackURI::from_rel_ref("/", "word/document.xml").unwrap();
        assert_eq!(uri.as_str(), "/word/document.xml");

        let uri = PackURI::from_rel_ref("/word", "/word/styles.xml").unwrap();
        assert_eq!(uri.as_str(), "/word/styles.xml");
    }

    #[test]
    fn test_relative_ref() {
        let uri = PackURI::new("/word/endnotes.xml").unwrap();
        assert_eq!(uri.relative_ref("/word"), "endnotes.xml");
        assert_eq!(uri.relative_ref("/"), "word/endnotes.xml");
        let uri = PackURI::new("/customXml/item1.xml").unwrap();
        assert_eq!(uri.relative_ref("/word"), "../customXml/item1.xml");
    }

    #[test]
    fn test_rejects_relative() {
        assert!(PackURI::new("word/document.xml").is_err());
    }
}
