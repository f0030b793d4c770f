use std::collections::HashMap;
use std::fmt::Write as _;

use crate::xml::{escape_xml, XmlDomError, XmlElement, XML_DECLARATION};

/// Shared strings table (`xl/sharedStrings.xml`), flattened to plain text.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SharedStrings {
    pub values: Vec<String>,
    index: HashMap<String, u32>,
}

impl SharedStrings {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&str> {
        self.values.get(idx).map(String::as_str)
    }

    /// Index of `value`, appending it on first use.
    pub fn intern(&mut self, value: &str) -> u32 {
        if let Some(idx) = self.index.get(value) {
            return *idx;
        }
        let idx = self.values.len() as u32;
        self.values.push(value.to_string());
        self.index.insert(value.to_string(), idx);
        idx
    }
}

pub fn parse_shared_strings_xml(xml: &[u8]) -> Result<SharedStrings, XmlDomError> {
    let root = XmlElement::parse(xml)?;
    let mut shared = SharedStrings::default();
    for si in root.children_by_local("si") {
        // Duplicates are legal in the part; indices must stay positional.
        shared.values.push(rich_text(si));
    }
    Ok(shared)
}

/// Plain text of a string item (`<si>`, `<is>`, comment `<text>`): the direct `<t>` or
/// the concatenated `<r><t>` runs. Phonetic runs (`<rPh>`) are not part of the value.
pub(crate) fn rich_text(item: &XmlElement) -> String {
    let mut out = String::new();
    for child in item.elements() {
        match child.local_name() {
            "t" => out.push_str(&child.text()),
            "r" => {
                for t in child.children_by_local("t") {
                    out.push_str(&t.text());
                }
            }
            _ => {}
        }
    }
    decode_escapes(&out)
}

/// Decode SpreadsheetML `_xHHHH_` escapes (used for control characters).
pub(crate) fn decode_escapes(s: &str) -> String {
    if !s.contains("_x") {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(pos) = rest.find("_x") {
        out.push_str(&rest[..pos]);
        let candidate = &rest[pos..];
        let decoded = candidate
            .get(2..6)
            .filter(|_| candidate.as_bytes().get(6) == Some(&b'_'))
            .and_then(|hex| u32::from_str_radix(hex, 16).ok())
            .and_then(char::from_u32);
        match decoded {
            Some(ch) => {
                out.push(ch);
                rest = &candidate[7..];
            }
            None => {
                out.push_str("_x");
                rest = &candidate[2..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Inverse of [`decode_escapes`]: control characters and literal `_xHHHH_` sequences
/// are escaped so they survive a read.
pub(crate) fn encode_escapes(s: &str) -> String {
    let needs = s
        .chars()
        .any(|c| (c < ' ' && !matches!(c, '\t' | '\n' | '\r')) || c == '_');
    if !needs {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    for (i, c) in s.char_indices() {
        if c < ' ' && !matches!(c, '\t' | '\n' | '\r') {
            let _ = write!(out, "_x{:04X}_", c as u32);
        } else if c == '_' && looks_like_escape(&s[i..]) {
            out.push_str("_x005F_");
        } else {
            out.push(c);
        }
    }
    out
}

fn looks_like_escape(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() >= 7
        && b[1] == b'x'
        && b[6] == b'_'
        && b[2..6].iter().all(|c| c.is_ascii_hexdigit())
}

/// `<t>` element text, marking significant surrounding whitespace.
pub(crate) fn t_element(value: &str) -> String {
    let encoded = encode_escapes(value);
    let preserve = encoded.starts_with(char::is_whitespace)
        || encoded.ends_with(char::is_whitespace)
        || encoded.contains('\n');
    if preserve {
        format!(r#"<t xml:space="preserve">{}</t>"#, escape_xml(&encoded))
    } else {
        format!("<t>{}</t>", escape_xml(&encoded))
    }
}

pub fn shared_strings_xml(shared: &SharedStrings, total_refs: usize) -> String {
    let unique = shared.values.len();
    let mut xml = String::new();
    xml.push_str(XML_DECLARATION);
    xml.push('\n');
    let _ = write!(
        xml,
        r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{total_refs}" uniqueCount="{unique}">"#
    );
    for value in &shared.values {
        xml.push_str("<si>");
        xml.push_str(&t_element(value));
        xml.push_str("</si>");
    }
    xml.push_str("</sst>");
    xml
}
