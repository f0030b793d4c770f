//! Legacy cell notes: `xl/commentsN.xml` plus the VML drawing Excel uses to render
//! the note boxes.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use sheetmerge_model::{CellRef, Comment};

use crate::shared_strings::{rich_text, t_element};
use crate::xml::{escape_xml, XmlDomError, XmlElement, XML_DECLARATION};

pub(crate) const COMMENTS_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.comments+xml";
pub(crate) const VML_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.vmlDrawing";

pub fn parse_comments_xml(bytes: &[u8]) -> Result<Vec<Comment>, XmlDomError> {
    let root = XmlElement::parse(bytes)?;
    let authors: Vec<String> = root
        .child("authors")
        .map(|a| a.children_by_local("author").map(|el| el.text()).collect())
        .unwrap_or_default();

    let mut comments = Vec::new();
    let Some(list) = root.child("commentList") else {
        return Ok(comments);
    };
    for comment in list.children_by_local("comment") {
        let Some(cell) = comment.attr("ref").and_then(|a1| CellRef::from_a1(a1).ok()) else {
            continue;
        };
        let author = comment
            .attr_parse::<usize>("authorId")
            .and_then(|idx| authors.get(idx).cloned())
            .unwrap_or_default();
        let text = comment.child("text").map(rich_text).unwrap_or_default();
        comments.push(Comment {
            cell,
            author,
            text,
            visible: false,
        });
    }
    Ok(comments)
}

/// Cells whose note shape is marked `<x:Visible/>` in a VML drawing.
///
/// VML written by older producers is frequently not well-formed XML, so this scans
/// the text instead of building a tree.
pub fn parse_vml_visible_cells(bytes: &[u8]) -> Vec<CellRef> {
    let xml = String::from_utf8_lossy(bytes);
    let mut out = Vec::new();

    let mut cursor = 0usize;
    while let Some(rel) = xml[cursor..].find("<x:ClientData") {
        let start = cursor + rel;
        let Some(end_rel) = xml[start..].find("</x:ClientData>") else {
            break;
        };
        let end = start + end_rel + "</x:ClientData>".len();
        let client = &xml[start..end];
        cursor = end;

        if !client.contains(r#"ObjectType="Note""#) || !client.contains("<x:Visible") {
            continue;
        }
        let row = tag_text(client, "x:Row").and_then(|t| t.trim().parse::<u32>().ok());
        let col = tag_text(client, "x:Column").and_then(|t| t.trim().parse::<u32>().ok());
        if let (Some(row), Some(col)) = (row, col) {
            out.push(CellRef::new(row, col));
        }
    }
    out
}

fn tag_text<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = xml.find(&open)? + open.len();
    let end = xml[start..].find(&close)? + start;
    Some(&xml[start..end])
}

pub fn write_comments_xml(comments: &[Comment]) -> String {
    let mut authors = Vec::new();
    let mut author_index = BTreeMap::<&str, usize>::new();
    for comment in comments {
        if !author_index.contains_key(comment.author.as_str()) {
            author_index.insert(comment.author.as_str(), authors.len());
            authors.push(comment.author.as_str());
        }
    }

    let mut xml = String::new();
    xml.push_str(XML_DECLARATION);
    xml.push('\n');
    xml.push_str(r#"<comments xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#);
    xml.push_str("<authors>");
    for author in &authors {
        let _ = write!(xml, "<author>{}</author>", escape_xml(author));
    }
    xml.push_str("</authors><commentList>");
    for comment in comments {
        let author_id = author_index
            .get(comment.author.as_str())
            .copied()
            .unwrap_or(0);
        let _ = write!(
            xml,
            r#"<comment ref="{}" authorId="{author_id}"><text><r>{}</r></text></comment>"#,
            comment.cell.to_a1(),
            t_element(&comment.text)
        );
    }
    xml.push_str("</commentList></comments>");
    xml
}

/// VML note shapes for `comments`. `sheet_number` (1-based) keeps shape ids unique
/// across the workbook.
pub fn write_vml_drawing(comments: &[Comment], sheet_number: usize) -> String {
    let mut xml = String::new();
    xml.push_str(
        r#"<xml xmlns:v="urn:schemas-microsoft-com:vml" xmlns:o="urn:schemas-microsoft-com:office:office" xmlns:x="urn:schemas-microsoft-com:office:excel">"#,
    );
    let _ = write!(
        xml,
        r#"<o:shapelayout v:ext="edit"><o:idmap v:ext="edit" data="{sheet_number}"/></o:shapelayout>"#
    );
    xml.push_str(
        r##"<v:shapetype id="_x0000_t202" coordsize="21600,21600" o:spt="202" path="m,l,21600r21600,l21600,xe"><v:stroke joinstyle="miter"/><v:path gradientshapeok="t" o:connecttype="rect"/></v:shapetype>"##,
    );

    for (idx, comment) in comments.iter().enumerate() {
        let shape_id = sheet_number * 1024 + idx + 1;
        let CellRef { row, col } = comment.cell;
        let visibility = if comment.visible { "visible" } else { "hidden" };
        let _ = write!(
            xml,
            r##"<v:shape id="_x0000_s{shape_id}" type="#_x0000_t202" style="position:absolute;margin-left:59.25pt;margin-top:1.5pt;width:108pt;height:59.25pt;z-index:{z};visibility:{visibility}" fillcolor="#ffffe1" o:insetmode="auto">"##,
            z = idx + 1
        );
        xml.push_str(
            r##"<v:fill color2="#ffffe1"/><v:shadow on="t" color="black" obscured="t"/><v:path o:connecttype="none"/><v:textbox style="mso-direction-alt:auto"><div style="text-align:left"></div></v:textbox>"##,
        );
        let _ = write!(
            xml,
            r#"<x:ClientData ObjectType="Note"><x:MoveWithCells/><x:SizeWithCells/><x:Anchor>{}, 15, {}, 2, {}, 15, {}, 16</x:Anchor><x:AutoFill>False</x:AutoFill><x:Row>{row}</x:Row><x:Column>{col}</x:Column>"#,
            col + 1,
            row.saturating_sub(1),
            col + 3,
            row + 3
        );
        if comment.visible {
            xml.push_str("<x:Visible/>");
        }
        xml.push_str("</x:ClientData></v:shape>");
    }
    xml.push_str("</xml>");
    xml
}
