//! Minimal owned XML tree built on `quick-xml`.
//!
//! Package parts in a workbook are small enough to materialize, and working on a tree
//! keeps the part parsers declarative. Element and attribute names are kept exactly as
//! written (including any prefix); lookups go through the local name.

use std::borrow::Cow;

use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum XmlDomError {
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("xml attribute error: {0}")]
    Attr(#[from] AttrError),
    #[error("utf-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("document has no root element")]
    MissingRoot,
    #[error("unbalanced end tag </{0}>")]
    Unbalanced(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct XmlElement {
    /// Qualified name as written (`x14:id`, `c`).
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

fn local_part(name: &str) -> &str {
    name.rsplit_once(':').map(|(_, local)| local).unwrap_or(name)
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Parse a complete document and return its root element.
    pub fn parse(bytes: &[u8]) -> Result<Self, XmlDomError> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        let mut reader = Reader::from_reader(bytes);
        reader.config_mut().trim_text(false);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(start) => stack.push(element_from_start(&start)?),
                Event::Empty(start) => {
                    let el = element_from_start(&start)?;
                    attach(&mut stack, &mut root, el);
                }
                Event::End(end) => {
                    let Some(el) = stack.pop() else {
                        let name = std::str::from_utf8(end.name().as_ref())?.to_string();
                        return Err(XmlDomError::Unbalanced(name));
                    };
                    attach(&mut stack, &mut root, el);
                }
                Event::Text(text) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = text.unescape()?;
                        push_text(parent, text);
                    }
                }
                Event::CData(data) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = std::str::from_utf8(data.as_ref())?;
                        push_text(parent, Cow::Borrowed(text));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if let Some(open) = stack.pop() {
            return Err(XmlDomError::Unbalanced(open.name));
        }
        root.ok_or(XmlDomError::MissingRoot)
    }

    pub fn local_name(&self) -> &str {
        local_part(&self.name)
    }

    /// Attribute value by exact (qualified) name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Attribute value for a prefixed attribute with the given local name (`r:id`).
    pub fn prefixed_attr(&self, local: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| {
                k.split_once(':')
                    .is_some_and(|(prefix, l)| prefix != "xmlns" && l == local)
            })
            .map(|(_, v)| v.as_str())
    }

    pub fn attr_bool(&self, name: &str) -> Option<bool> {
        self.attr(name)
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
    }

    pub fn attr_parse<T: std::str::FromStr>(&self, name: &str) -> Option<T> {
        self.attr(name).and_then(|v| v.trim().parse().ok())
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value,
            None => self.attrs.push((name.to_string(), value)),
        }
    }

    /// Builder-style [`XmlElement::set_attr`].
    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn push_child(&mut self, child: XmlElement) {
        self.children.push(XmlNode::Element(child));
    }

    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|c| match c {
            XmlNode::Element(el) => Some(el),
            XmlNode::Text(_) => None,
        })
    }

    /// First child element with the given local name.
    pub fn child(&self, local: &str) -> Option<&XmlElement> {
        self.elements().find(|el| el.local_name() == local)
    }

    pub fn children_by_local<'a>(
        &'a self,
        local: &'a str,
    ) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.elements().filter(move |el| el.local_name() == local)
    }

    /// Concatenated direct text content.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            if let XmlNode::Text(t) = child {
                out.push_str(t);
            }
        }
        out
    }

    /// Serialize this element (without an XML declaration).
    pub fn to_xml_string(&self) -> String {
        let mut out = String::new();
        self.write_into(&mut out);
        out
    }

    /// Serialize as a standalone part with an XML declaration.
    pub fn to_document_bytes(&self) -> Vec<u8> {
        let mut out = String::from(XML_DECLARATION);
        out.push('\n');
        self.write_into(&mut out);
        out.into_bytes()
    }

    fn write_into(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (k, v) in &self.attrs {
            out.push(' ');
            out.push_str(k);
            out.push_str("=\"");
            out.push_str(&escape_xml(v));
            out.push('"');
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            match child {
                XmlNode::Element(el) => el.write_into(out),
                XmlNode::Text(t) => out.push_str(&escape_xml(t)),
            }
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

fn element_from_start(start: &BytesStart<'_>) -> Result<XmlElement, XmlDomError> {
    let name = std::str::from_utf8(start.name().as_ref())?.to_string();
    let mut attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr?;
        let key = std::str::from_utf8(attr.key.as_ref())?.to_string();
        let value = attr.unescape_value()?.into_owned();
        attrs.push((key, value));
    }
    Ok(XmlElement {
        name,
        attrs,
        children: Vec::new(),
    })
}

fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, el: XmlElement) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(XmlNode::Element(el)),
        None => {
            if root.is_none() {
                *root = Some(el);
            }
        }
    }
}

fn push_text(parent: &mut XmlElement, text: Cow<'_, str>) {
    if let Some(XmlNode::Text(existing)) = parent.children.last_mut() {
        existing.push_str(&text);
    } else {
        parent.children.push(XmlNode::Text(text.into_owned()));
    }
}

pub fn escape_xml(s: &str) -> Cow<'_, str> {
    if !s.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(s);
    }
    Cow::Owned(
        s.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
            .replace('\'', "&apos;"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_nested_elements_text_and_entities() {
        let xml = br#"<?xml version="1.0"?>
<root xmlns:r="urn:r"><a r:id="rId1" v="x &amp; y"/><t xml:space="preserve"> a&lt;b </t></root>"#;
        let root = XmlElement::parse(xml).unwrap();
        assert_eq!(root.local_name(), "root");
        let a = root.child("a").unwrap();
        assert_eq!(a.prefixed_attr("id"), Some("rId1"));
        assert_eq!(a.attr("v"), Some("x & y"));
        assert_eq!(root.child("t").unwrap().text(), " a<b ");
    }

    #[test]
    fn serializes_back_with_escaping() {
        let mut el = XmlElement::new("dxf");
        let mut font = XmlElement::new("font");
        font.push_child(XmlElement::new("b"));
        el.push_child(font);
        el.set_attr("note", "a\"b");
        assert_eq!(el.to_xml_string(), r#"<dxf note="a&quot;b"><font><b/></font></dxf>"#);
    }

    #[test]
    fn rejects_unbalanced_documents() {
        assert!(matches!(
            XmlElement::parse(b"<a><b></a>"),
            Err(XmlDomError::Xml(_)) | Err(XmlDomError::Unbalanced(_))
        ));
        assert!(matches!(
            XmlElement::parse(b"   "),
            Err(XmlDomError::MissingRoot)
        ));
    }
}
