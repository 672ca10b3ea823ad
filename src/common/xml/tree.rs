//! Mutable element tree for package XML parts.
//!
//! Parts are read with `quick-xml` into a small owned tree that managers can
//! edit in place (insert, split, remove elements) and written back with the
//! minimal escaping Word expects. Qualified names are kept verbatim
//! (`w:p`, `w:r`), namespace declarations stay ordinary attributes.
use super::escape::{escape_attr, escape_text, resolve_reference};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::fmt::Write as FmtWrite;
use thiserror::Error;

/// Declaration written at the top of every serialized part.
pub const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n";

/// Failure to read an XML part into a tree.
#[derive(Error, Debug)]
pub enum XmlError {
    /// The tokenizer rejected the input
    #[error("XML syntax error at byte {position}: {message}")]
    Syntax { position: u64, message: String },

    /// Tags, entities or encoding are inconsistent
    #[error("XML structure error: {0}")]
    Structure(String),
}

/// A node in an element's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
    CData(String),
    Comment(String),
}

impl XmlNode {
    /// Get the element if this node is one.
    #[inline]
    pub fn as_element(&self) -> Option<&XmlElement> {
        match self {
            XmlNode::Element(el) => Some(el),
            _ => None,
        }
    }

    /// Get the element mutably if this node is one.
    #[inline]
    pub fn as_element_mut(&mut self) -> Option<&mut XmlElement> {
        match self {
            XmlNode::Element(el) => Some(el),
            _ => None,
        }
    }
}

/// An XML element with ordered attributes and children.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlElement {
    /// Qualified name, e.g. `w:tc`
    pub name: String,
    /// Attributes in document order, keys qualified
    pub attributes: Vec<(String, String)>,
    /// Child nodes in document order
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    /// Create an empty element.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder form of [`XmlElement::set_attr`].
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Builder form of [`XmlElement::push`].
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.push(child);
        self
    }

    /// Builder that appends a text node.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(text.into()));
        self
    }

    /// Get the name without its prefix.
    #[inline]
    pub fn local_name(&self) -> &str {
        self.name.rsplit(':').next().unwrap_or(&self.name)
    }

    /// Check the qualified name.
    #[inline]
    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    /// Get an attribute value by qualified key.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, replacing an existing value in place.
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    /// Remove an attribute, returning its value.
    pub fn remove_attr(&mut self, key: &str) -> Option<String> {
        let pos = self.attributes.iter().position(|(k, _)| k == key)?;
        Some(self.attributes.remove(pos).1)
    }

    /// Iterate over child elements.
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(XmlNode::as_element)
    }

    /// Iterate mutably over child elements.
    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut XmlElement> {
        self.children.iter_mut().filter_map(XmlNode::as_element_mut)
    }

    /// First child element with the given name.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.elements().find(|el| el.is(name))
    }

    /// First child element with the given name, mutably.
    pub fn child_mut(&mut self, name: &str) -> Option<&mut XmlElement> {
        self.elements_mut().find(|el| el.is(name))
    }

    /// Index in `children` of the first child element with the given name.
    pub fn child_position(&self, name: &str) -> Option<usize> {
        self.children
            .iter()
            .position(|node| node.as_element().is_some_and(|el| el.is(name)))
    }

    /// Append a child element.
    #[inline]
    pub fn push(&mut self, child: XmlElement) {
        self.children.push(XmlNode::Element(child));
    }

    /// Insert a child element at a `children` index.
    #[inline]
    pub fn insert(&mut self, index: usize, child: XmlElement) {
        self.children.insert(index, XmlNode::Element(child));
    }

    /// Remove every child element matching the predicate. Returns how many were removed.
    pub fn remove_elements(&mut self, mut pred: impl FnMut(&XmlElement) -> bool) -> usize {
        let before = self.children.len();
        self.children
            .retain(|node| !node.as_element().is_some_and(&mut pred));
        before - self.children.len()
    }

    /// Concatenated direct text and CDATA content.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            match node {
                XmlNode::Text(t) | XmlNode::CData(t) => out.push_str(t),
                _ => {},
            }
        }
        out
    }

    /// Replace all children with a single text node.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children.clear();
        self.children.push(XmlNode::Text(text.into()));
    }

    /// Follow a path of `children` indices.
    pub fn get(&self, path: &[usize]) -> Option<&XmlElement> {
        let mut current = self;
        for &idx in path {
            current = current.children.get(idx)?.as_element()?;
        }
        Some(current)
    }

    /// Follow a path of `children` indices, mutably.
    pub fn get_mut(&mut self, path: &[usize]) -> Option<&mut XmlElement> {
        let mut current = self;
        for &idx in path {
            current = current.children.get_mut(idx)?.as_element_mut()?;
        }
        Some(current)
    }

    /// All descendant elements with the given name, in document order.
    pub fn find_all<'a>(&'a self, name: &str) -> Vec<&'a XmlElement> {
        let mut found = Vec::new();
        self.collect_named(name, &mut found);
        found
    }

    fn collect_named<'a>(&'a self, name: &str, found: &mut Vec<&'a XmlElement>) {
        for el in self.elements() {
            if el.is(name) {
                found.push(el);
            }
            el.collect_named(name, found);
        }
    }

    fn write_to(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attributes {
            let _ = write!(out, " {}=\"{}\"", key, escape_attr(value));
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for node in &self.children {
            match node {
                XmlNode::Element(el) => el.write_to(out),
                XmlNode::Text(t) => out.push_str(&escape_text(t)),
                XmlNode::CData(t) => {
                    out.push_str("<![CDATA[");
                    out.push_str(t);
                    out.push_str("]]>");
                },
                XmlNode::Comment(c) => {
                    out.push_str("<!--");
                    out.push_str(c);
                    out.push_str("-->");
                },
            }
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }

    /// Serialize this element alone, without a declaration.
    pub fn to_xml_string(&self) -> String {
        let mut out = String::with_capacity(256);
        self.write_to(&mut out);
        out
    }
}

/// A parsed XML part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    pub root: XmlElement,
}

impl XmlDocument {
    /// Wrap a root element.
    pub fn new(root: XmlElement) -> Self {
        Self { root }
    }

    /// Parse a complete XML document.
    ///
    /// Whitespace-only text is kept so untouched regions round-trip as they were.
    pub fn parse(xml: &[u8]) -> Result<Self, XmlError> {
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(false);

        let mut buf = Vec::with_capacity(1024);
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| XmlError::Syntax {
                    position: reader.buffer_position() as u64,
                    message: e.to_string(),
                })?;

            match event {
                Event::Start(e) => stack.push(element_from_start(&e)?),
                Event::Empty(e) => {
                    let el = element_from_start(&e)?;
                    attach(&mut stack, &mut root, el)?;
                },
                Event::End(_) => {
                    let el = stack
                        .pop()
                        .ok_or_else(|| XmlError::Structure("unbalanced end tag".to_string()))?;
                    attach(&mut stack, &mut root, el)?;
                },
                Event::Text(e) => {
                    if let Some(parent) = stack.last_mut() {
                        let raw = std::str::from_utf8(&e)
                            .map_err(|e| XmlError::Structure(e.to_string()))?;
                        push_text(parent, &unescape(raw)?);
                    }
                },
                Event::GeneralRef(e) => {
                    if let Some(parent) = stack.last_mut() {
                        let name = std::str::from_utf8(&e)
                            .map_err(|e| XmlError::Structure(e.to_string()))?;
                        let ch = resolve_reference(name).ok_or_else(|| {
                            XmlError::Structure(format!("undefined entity &{name};"))
                        })?;
                        push_text(parent, ch.encode_utf8(&mut [0u8; 4]));
                    }
                },
                Event::CData(e) => {
                    if let Some(parent) = stack.last_mut() {
                        parent
                            .children
                            .push(XmlNode::CData(String::from_utf8_lossy(&e).into_owned()));
                    }
                },
                Event::Comment(e) => {
                    if let Some(parent) = stack.last_mut() {
                        parent
                            .children
                            .push(XmlNode::Comment(String::from_utf8_lossy(&e).into_owned()));
                    }
                },
                Event::Eof => break,
                _ => {},
            }
            buf.clear();
        }

        if let Some(open) = stack.last() {
            return Err(XmlError::Structure(format!(
                "element <{}> is never closed",
                open.name
            )));
        }
        root.map(Self::new)
            .ok_or_else(|| XmlError::Structure("document has no root element".to_string()))
    }

    /// Serialize with the standard declaration.
    pub fn to_xml_string(&self) -> String {
        let mut out = String::with_capacity(4096);
        out.push_str(XML_DECLARATION);
        self.root.write_to(&mut out);
        out
    }

    /// Serialize to UTF-8 bytes.
    #[inline]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_xml_string().into_bytes()
    }
}

fn element_from_start(start: &BytesStart<'_>) -> Result<XmlElement, XmlError> {
    let name = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| XmlError::Structure(e.to_string()))?
        .to_string();
    let mut el = XmlElement::new(name);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| XmlError::Structure(e.to_string()))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| XmlError::Structure(e.to_string()))?
            .to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| XmlError::Structure(e.to_string()))?
            .into_owned();
        el.attributes.push((key, value));
    }
    Ok(el)
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    el: XmlElement,
) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(parent) => parent.push(el),
        None if root.is_none() => *root = Some(el),
        None => {
            return Err(XmlError::Structure(
                "more than one root element".to_string(),
            ));
        },
    }
    Ok(())
}

fn push_text(parent: &mut XmlElement, text: &str) {
    if let Some(XmlNode::Text(last)) = parent.children.last_mut() {
        last.push_str(text);
    } else {
        parent.children.push(XmlNode::Text(text.to_string()));
    }
}

/// Resolve references left inside a text event.
fn unescape(raw: &str) -> Result<String, XmlError> {
    if !raw.contains('&') {
        return Ok(raw.to_string());
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let semi = after
            .find(';')
            .ok_or_else(|| XmlError::Structure("unterminated reference".to_string()))?;
        let name = &after[..semi];
        let ch = resolve_reference(name)
            .ok_or_else(|| XmlError::Structure(format!("undefined entity &{name};")))?;
        out.push(ch);
        rest = &after[semi + 1..];
    }
    out.push_str(rest);
    Ok(out)
}
