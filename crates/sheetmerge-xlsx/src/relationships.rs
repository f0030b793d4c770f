use std::fmt::Write as _;

use crate::xml::{escape_xml, XmlDomError, XmlElement, XML_DECLARATION};

pub const RELATIONSHIPS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

pub const REL_TYPE_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
pub const REL_TYPE_WORKSHEET: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
pub const REL_TYPE_STYLES: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
pub const REL_TYPE_SHARED_STRINGS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings";
pub const REL_TYPE_THEME: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme";
pub const REL_TYPE_HYPERLINK: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";
pub const REL_TYPE_COMMENTS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/comments";
pub const REL_TYPE_VML_DRAWING: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/vmlDrawing";
pub const REL_TYPE_VBA_PROJECT: &str =
    "http://schemas.microsoft.com/office/2006/relationships/vbaProject";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub type_: String,
    pub target: String,
    /// `External` for hyperlinks and other out-of-package targets.
    pub target_mode: Option<String>,
}

impl Relationship {
    pub fn new(id: impl Into<String>, type_: &str, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_: type_.to_string(),
            target: target.into(),
            target_mode: None,
        }
    }

    pub fn external(id: impl Into<String>, type_: &str, target: impl Into<String>) -> Self {
        Self {
            target_mode: Some("External".to_string()),
            ..Self::new(id, type_, target)
        }
    }

    pub fn is_external(&self) -> bool {
        self.target_mode
            .as_deref()
            .is_some_and(|mode| mode.eq_ignore_ascii_case("external"))
    }
}

pub fn parse_relationships(xml: &[u8]) -> Result<Vec<Relationship>, XmlDomError> {
    let root = XmlElement::parse(xml)?;
    let mut rels = Vec::new();
    for node in root.children_by_local("Relationship") {
        let Some(id) = node.attr("Id") else {
            continue;
        };
        rels.push(Relationship {
            id: id.to_string(),
            type_: node.attr("Type").unwrap_or_default().to_string(),
            target: node.attr("Target").unwrap_or_default().to_string(),
            target_mode: node.attr("TargetMode").map(str::to_string),
        });
    }
    Ok(rels)
}

pub fn render_relationships_xml(rels: &[Relationship]) -> String {
    let mut xml = String::new();
    xml.push_str(XML_DECLARATION);
    xml.push('\n');
    let _ = write!(xml, r#"<Relationships xmlns="{RELATIONSHIPS_NS}">"#);
    for rel in rels {
        let _ = write!(
            xml,
            r#"<Relationship Id="{}" Type="{}" Target="{}""#,
            escape_xml(&rel.id),
            escape_xml(&rel.type_),
            escape_xml(&rel.target)
        );
        if let Some(mode) = &rel.target_mode {
            let _ = write!(xml, r#" TargetMode="{}""#, escape_xml(mode));
        }
        xml.push_str("/>");
    }
    xml.push_str("</Relationships>");
    xml
}
