use std::collections::HashMap;
use std::io::{Read, Seek};

use sheetmerge_model::{DateSystem, SheetError, SheetVisibility, Workbook};
use thiserror::Error;

use crate::comments::{parse_comments_xml, parse_vml_visible_cells};
use crate::package::{
    rels_for_part, resolve_target, Package, PackageError, PackageLimits, WorkbookKind,
};
use crate::relationships::{
    parse_relationships, Relationship, REL_TYPE_COMMENTS, REL_TYPE_OFFICE_DOCUMENT,
    REL_TYPE_SHARED_STRINGS, REL_TYPE_STYLES, REL_TYPE_THEME, REL_TYPE_VBA_PROJECT,
    REL_TYPE_VML_DRAWING,
};
use crate::shared_strings::{parse_shared_strings_xml, SharedStrings};
use crate::styles::{StylesPart, StylesPartError};
use crate::worksheet::read::{parse_worksheet, SheetContext};
use crate::xml::{XmlDomError, XmlElement};

pub(crate) const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
pub(crate) const ROOT_RELS_PART: &str = "_rels/.rels";
const DEFAULT_WORKBOOK_PART: &str = "xl/workbook.xml";

#[derive(Debug, Error)]
pub enum ReadError {
    #[error(transparent)]
    Package(#[from] PackageError),
    #[error(transparent)]
    Xml(#[from] XmlDomError),
    #[error(transparent)]
    Styles(#[from] StylesPartError),
    #[error("missing required part: {0}")]
    MissingPart(String),
    #[error("not a spreadsheet package: {0}")]
    NotASpreadsheet(String),
    #[error(transparent)]
    InvalidSheet(#[from] SheetError),
    #[error("invalid cell reference: {0}")]
    InvalidCellRef(String),
    #[error("invalid range reference: {0}")]
    InvalidRangeRef(String),
}

/// A decoded workbook together with the package flavour it was stored as.
#[derive(Clone, Debug, PartialEq)]
pub struct XlsxDocument {
    pub workbook: Workbook,
    pub kind: WorkbookKind,
}

pub fn load_from_bytes(bytes: &[u8]) -> Result<XlsxDocument, ReadError> {
    load_from_package(&Package::from_bytes(bytes)?)
}

pub fn load_from_reader<R: Read + Seek>(reader: R) -> Result<XlsxDocument, ReadError> {
    load_from_package(&Package::from_reader(reader, PackageLimits::default())?)
}

pub fn read_workbook_from_bytes(bytes: &[u8]) -> Result<Workbook, ReadError> {
    Ok(load_from_bytes(bytes)?.workbook)
}

pub fn read_workbook_from_reader<R: Read + Seek>(reader: R) -> Result<Workbook, ReadError> {
    Ok(load_from_reader(reader)?.workbook)
}

/// Part name -> content type, from the `Override` entries of `[Content_Types].xml`.
fn content_type_overrides(package: &Package) -> Result<HashMap<String, String>, ReadError> {
    let bytes = package
        .part(CONTENT_TYPES_PART)
        .ok_or_else(|| ReadError::NotASpreadsheet(format!("no {CONTENT_TYPES_PART}")))?;
    let root = XmlElement::parse(bytes)?;
    Ok(root
        .children_by_local("Override")
        .filter_map(|o| {
            let part = o.attr("PartName")?;
            let content_type = o.attr("ContentType")?;
            Some((
                part.trim_start_matches('/').to_string(),
                content_type.to_string(),
            ))
        })
        .collect())
}

fn optional_rels(package: &Package, part: &str) -> Result<Vec<Relationship>, ReadError> {
    match package.part(&rels_for_part(part)) {
        Some(bytes) => Ok(parse_relationships(bytes)?),
        None => Ok(Vec::new()),
    }
}

fn target_of<'a>(rels: &'a [Relationship], type_: &str) -> Option<&'a Relationship> {
    rels.iter().find(|r| r.type_ == type_ && !r.is_external())
}

struct SheetEntry {
    name: String,
    visibility: SheetVisibility,
    part: String,
}

pub fn load_from_package(package: &Package) -> Result<XlsxDocument, ReadError> {
    let overrides = content_type_overrides(package)?;

    let root_rels = match package.part(ROOT_RELS_PART) {
        Some(bytes) => parse_relationships(bytes)?,
        None => Vec::new(),
    };
    let workbook_part = target_of(&root_rels, REL_TYPE_OFFICE_DOCUMENT)
        .map(|r| resolve_target("", &r.target))
        .unwrap_or_else(|| DEFAULT_WORKBOOK_PART.to_string());
    let workbook_xml = package
        .part(&workbook_part)
        .ok_or_else(|| ReadError::MissingPart(workbook_part.clone()))?;

    let kind = match overrides.get(&workbook_part) {
        Some(content_type) => WorkbookKind::from_content_type(content_type)
            .ok_or_else(|| ReadError::NotASpreadsheet(content_type.clone()))?,
        None => WorkbookKind::default(),
    };

    let workbook_rels = optional_rels(package, &workbook_part)?;
    let part_for = |type_: &str| {
        target_of(&workbook_rels, type_).map(|r| resolve_target(&workbook_part, &r.target))
    };

    let styles = match part_for(REL_TYPE_STYLES).and_then(|p| package.part(&p)) {
        Some(bytes) => StylesPart::parse(bytes)?,
        None => StylesPart::default(),
    };
    let shared_strings = match part_for(REL_TYPE_SHARED_STRINGS).and_then(|p| package.part(&p)) {
        Some(bytes) => parse_shared_strings_xml(bytes)?,
        None => SharedStrings::default(),
    };

    let root = XmlElement::parse(workbook_xml)?;
    if root.local_name() != "workbook" {
        return Err(ReadError::NotASpreadsheet(format!(
            "{workbook_part} has root <{}>",
            root.name
        )));
    }

    let mut workbook = Workbook::new();
    if root
        .child("workbookPr")
        .and_then(|pr| pr.attr_bool("date1904"))
        .unwrap_or(false)
    {
        workbook.date_system = DateSystem::Excel1904;
    }

    let mut entries = Vec::new();
    if let Some(sheets) = root.child("sheets") {
        for sheet in sheets.children_by_local("sheet") {
            let Some(name) = sheet.attr("name") else {
                continue;
            };
            let rel = sheet
                .prefixed_attr("id")
                .and_then(|id| workbook_rels.iter().find(|r| r.id == id))
                .ok_or_else(|| ReadError::MissingPart(format!("worksheet part for {name:?}")))?;
            entries.push(SheetEntry {
                name: name.to_string(),
                visibility: match sheet.attr("state") {
                    Some("hidden") => SheetVisibility::Hidden,
                    Some("veryHidden") => SheetVisibility::VeryHidden,
                    _ => SheetVisibility::Visible,
                },
                part: resolve_target(&workbook_part, &rel.target),
            });
        }
    }

    for entry in &entries {
        let sheet_xml = package
            .part(&entry.part)
            .ok_or_else(|| ReadError::MissingPart(entry.part.clone()))?;
        let sheet_root = XmlElement::parse(sheet_xml)?;
        let sheet_rels = optional_rels(package, &entry.part)?;

        let ws = workbook.add_sheet(&entry.name)?;
        ws.visibility = entry.visibility;
        let ctx = SheetContext {
            shared_strings: &shared_strings,
            styles: &styles,
            rels: &sheet_rels,
        };
        parse_worksheet(ws, &sheet_root, &ctx)?;

        // Notes are best-effort: a broken comments part loses the notes, not the sheet.
        if let Some(rel) = target_of(&sheet_rels, REL_TYPE_COMMENTS) {
            let part = resolve_target(&entry.part, &rel.target);
            match package.part(&part).map(parse_comments_xml) {
                Some(Ok(comments)) => ws.comments = comments,
                Some(Err(err)) => log::warn!("skipping malformed comments part {part}: {err}"),
                None => log::warn!("comments part {part} is missing"),
            }
        }
        if let Some(rel) = target_of(&sheet_rels, REL_TYPE_VML_DRAWING) {
            let part = resolve_target(&entry.part, &rel.target);
            if let Some(bytes) = package.part(&part) {
                let visible = parse_vml_visible_cells(bytes);
                for comment in &mut ws.comments {
                    comment.visible = visible.contains(&comment.cell);
                }
            }
        }
    }

    workbook.active_sheet = root
        .child("bookViews")
        .and_then(|v| v.child("workbookView"))
        .and_then(|v| v.attr_parse::<usize>("activeTab"))
        .unwrap_or(0)
        .min(workbook.sheet_count().saturating_sub(1));

    workbook.theme = part_for(REL_TYPE_THEME)
        .and_then(|p| package.part(&p))
        .map(<[u8]>::to_vec);
    workbook.vba_project = part_for(REL_TYPE_VBA_PROJECT)
        .and_then(|p| package.part(&p))
        .or_else(|| package.part("xl/vbaProject.bin"))
        .map(<[u8]>::to_vec);
    workbook.styles = styles.table;

    log::debug!(
        "loaded {} workbook with {} sheets",
        kind.file_extension(),
        workbook.sheet_count()
    );
    Ok(XlsxDocument { workbook, kind })
}
