use std::fmt::Write as _;
use std::io::{Cursor, Seek, Write};

use sheetmerge_model::{validate_sheet_name, SheetVisibility, Workbook, Worksheet};
use thiserror::Error;

use crate::comments::{write_comments_xml, write_vml_drawing, COMMENTS_CONTENT_TYPE, VML_CONTENT_TYPE};
use crate::package::{
    relative_target, rels_for_part, Package, PackageError, WorkbookKind, VBA_PROJECT_CONTENT_TYPE,
};
use crate::read::{CONTENT_TYPES_PART, ROOT_RELS_PART};
use crate::relationships::{
    render_relationships_xml, Relationship, REL_TYPE_OFFICE_DOCUMENT, REL_TYPE_SHARED_STRINGS,
    REL_TYPE_STYLES, REL_TYPE_THEME, REL_TYPE_VBA_PROJECT, REL_TYPE_WORKSHEET,
};
use crate::shared_strings::{shared_strings_xml, SharedStrings};
use crate::styles::{write_styles_xml, DxfTable};
use crate::worksheet::write::{write_worksheet_xml, SheetWriteContext};
use crate::xml::{escape_xml, XML_DECLARATION};

const WORKBOOK_PART: &str = "xl/workbook.xml";
const STYLES_PART: &str = "xl/styles.xml";
const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";
const THEME_PART: &str = "xl/theme/theme1.xml";
const VBA_PROJECT_PART: &str = "xl/vbaProject.bin";

const WORKSHEET_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";
const STYLES_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml";
const SHARED_STRINGS_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml";
const THEME_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.theme+xml";
const RELS_CONTENT_TYPE: &str = "application/vnd.openxmlformats-package.relationships+xml";

#[derive(Debug, Error)]
pub enum XlsxWriteError {
    #[error(transparent)]
    Package(#[from] PackageError),
    #[error("invalid workbook: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteOptions {
    /// Package flavour to emit. `None` picks the macro-enabled flavour exactly when the
    /// workbook carries a VBA project.
    pub kind: Option<WorkbookKind>,
    /// Ask the consuming application to recalculate every formula on open.
    pub full_calc_on_load: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            kind: None,
            full_calc_on_load: true,
        }
    }
}

impl WriteOptions {
    pub fn with_kind(kind: WorkbookKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }
}

pub fn write_workbook_to_vec(
    workbook: &Workbook,
    options: &WriteOptions,
) -> Result<Vec<u8>, XlsxWriteError> {
    Ok(write_workbook_to_writer(workbook, Cursor::new(Vec::new()), options)?.into_inner())
}

pub fn write_workbook_to_writer<W: Write + Seek>(
    workbook: &Workbook,
    writer: W,
    options: &WriteOptions,
) -> Result<W, XlsxWriteError> {
    let package = build_package(workbook, options)?;
    Ok(package.write_to(
        writer,
        &[CONTENT_TYPES_PART, ROOT_RELS_PART, WORKBOOK_PART],
    )?)
}

/// Structural checks the model cannot enforce on its public fields.
fn validate(workbook: &Workbook) -> Result<(), XlsxWriteError> {
    if workbook.sheet_count() == 0 {
        return Err(XlsxWriteError::Invalid(
            "a workbook needs at least one sheet".to_string(),
        ));
    }
    if workbook
        .sheets()
        .iter()
        .all(|s| s.visibility != SheetVisibility::Visible)
    {
        return Err(XlsxWriteError::Invalid(
            "a workbook needs at least one visible sheet".to_string(),
        ));
    }

    let style_count = workbook.styles.len() as u32;
    for sheet in workbook.sheets() {
        validate_sheet_name(sheet.name())
            .map_err(|e| XlsxWriteError::Invalid(format!("sheet {:?}: {e}", sheet.name())))?;
        sheet
            .merges
            .validate()
            .map_err(|e| XlsxWriteError::Invalid(format!("sheet {:?}: {e}", sheet.name())))?;
        if let Some(style_id) = unknown_style_id(sheet, style_count) {
            return Err(XlsxWriteError::Invalid(format!(
                "sheet {:?} references unknown style id {style_id}",
                sheet.name()
            )));
        }
    }
    Ok(())
}

fn unknown_style_id(sheet: &Worksheet, style_count: u32) -> Option<u32> {
    let cells = sheet.iter_cells().map(|(_, c)| c.style_id);
    let rows = sheet.row_props.values().filter_map(|p| p.style_id);
    let cols = sheet.col_props.values().filter_map(|p| p.style_id);
    cells.chain(rows).chain(cols).find(|id| *id >= style_count)
}

fn resolve_kind(workbook: &Workbook, options: &WriteOptions) -> WorkbookKind {
    options.kind.unwrap_or(if workbook.vba_project.is_some() {
        WorkbookKind::MacroEnabledWorkbook
    } else {
        WorkbookKind::Workbook
    })
}

fn build_package(workbook: &Workbook, options: &WriteOptions) -> Result<Package, XlsxWriteError> {
    validate(workbook)?;
    let kind = resolve_kind(workbook, options);

    let mut package = Package::new();
    let mut overrides: Vec<(String, &str)> = vec![(
        WORKBOOK_PART.to_string(),
        kind.workbook_content_type(),
    )];
    let mut workbook_rels = Vec::new();

    let mut shared_strings = SharedStrings::default();
    let mut dxfs = DxfTable::default();
    let mut ctx = SheetWriteContext {
        shared_strings: &mut shared_strings,
        shared_string_refs: 0,
        dxfs: &mut dxfs,
        date_system: workbook.date_system,
    };

    let mut has_vml = false;
    let mut comment_parts = 0usize;
    for (idx, sheet) in workbook.sheets().iter().enumerate() {
        let number = idx + 1;
        let part = format!("xl/worksheets/sheet{number}.xml");

        let notes = if sheet.comments.is_empty() {
            None
        } else {
            comment_parts += 1;
            Some((
                format!("xl/comments{comment_parts}.xml"),
                format!("xl/drawings/vmlDrawing{comment_parts}.vml"),
            ))
        };
        let targets = notes.as_ref().map(|(comments, vml)| {
            (
                format!("../{}", comments.trim_start_matches("xl/")),
                format!("../{}", vml.trim_start_matches("xl/")),
            )
        });

        let written = write_worksheet_xml(
            sheet,
            &mut ctx,
            idx == workbook.active_sheet,
            targets.as_ref().map(|(c, v)| (c.as_str(), v.as_str())),
        );
        if let Some((comments_part, vml_part)) = notes {
            package.set_part(comments_part.clone(), write_comments_xml(&sheet.comments).into_bytes());
            package.set_part(vml_part, write_vml_drawing(&sheet.comments, number).into_bytes());
            overrides.push((comments_part, COMMENTS_CONTENT_TYPE));
            has_vml = true;
        }
        if !written.rels.is_empty() {
            package.set_part(
                rels_for_part(&part),
                render_relationships_xml(&written.rels).into_bytes(),
            );
        }
        package.set_part(part.clone(), written.xml.into_bytes());

        workbook_rels.push(Relationship::new(
            format!("rId{number}"),
            REL_TYPE_WORKSHEET,
            relative_target("xl", &part),
        ));
        overrides.push((part, WORKSHEET_CONTENT_TYPE));
    }
    let shared_string_refs = ctx.shared_string_refs;

    let mut next_rel = workbook.sheet_count() + 1;
    let mut push_rel = |rels: &mut Vec<Relationship>, type_: &str, part: &str| {
        rels.push(Relationship::new(
            format!("rId{next_rel}"),
            type_,
            relative_target("xl", part),
        ));
        next_rel += 1;
    };

    package.set_part(STYLES_PART, write_styles_xml(&workbook.styles, &dxfs).into_bytes());
    push_rel(&mut workbook_rels, REL_TYPE_STYLES, STYLES_PART);
    overrides.push((STYLES_PART.to_string(), STYLES_CONTENT_TYPE));

    if !shared_strings.is_empty() {
        package.set_part(
            SHARED_STRINGS_PART,
            shared_strings_xml(&shared_strings, shared_string_refs).into_bytes(),
        );
        push_rel(&mut workbook_rels, REL_TYPE_SHARED_STRINGS, SHARED_STRINGS_PART);
        overrides.push((SHARED_STRINGS_PART.to_string(), SHARED_STRINGS_CONTENT_TYPE));
    }

    if let Some(theme) = &workbook.theme {
        package.set_part(THEME_PART, theme.clone());
        push_rel(&mut workbook_rels, REL_TYPE_THEME, THEME_PART);
        overrides.push((THEME_PART.to_string(), THEME_CONTENT_TYPE));
    }

    let mut has_vba = false;
    match (&workbook.vba_project, kind.supports_macros()) {
        (Some(vba), true) => {
            package.set_part(VBA_PROJECT_PART, vba.clone());
            push_rel(&mut workbook_rels, REL_TYPE_VBA_PROJECT, VBA_PROJECT_PART);
            has_vba = true;
        }
        (Some(_), false) => {
            log::warn!("dropping VBA project: output package is not macro-enabled");
        }
        (None, _) => {}
    }

    package.set_part(WORKBOOK_PART, workbook_xml(workbook, options).into_bytes());
    package.set_part(
        rels_for_part(WORKBOOK_PART),
        render_relationships_xml(&workbook_rels).into_bytes(),
    );
    package.set_part(
        ROOT_RELS_PART,
        render_relationships_xml(&[Relationship::new(
            "rId1",
            REL_TYPE_OFFICE_DOCUMENT,
            WORKBOOK_PART,
        )])
        .into_bytes(),
    );
    package.set_part(
        CONTENT_TYPES_PART,
        content_types_xml(&overrides, has_vml, has_vba).into_bytes(),
    );

    log::debug!(
        "encoded {} package: {} sheets, {} shared strings, {} styles",
        kind.file_extension(),
        workbook.sheet_count(),
        shared_strings.len(),
        workbook.styles.len()
    );
    Ok(package)
}

fn workbook_xml(workbook: &Workbook, options: &WriteOptions) -> String {
    let mut xml = String::new();
    xml.push_str(XML_DECLARATION);
    xml.push('\n');
    xml.push_str(r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#);
    if workbook.date_system == sheetmerge_model::DateSystem::Excel1904 {
        xml.push_str(r#"<workbookPr date1904="1"/>"#);
    } else {
        xml.push_str("<workbookPr/>");
    }
    let active = workbook.active_sheet.min(workbook.sheet_count().saturating_sub(1));
    let _ = write!(
        xml,
        r#"<bookViews><workbookView activeTab="{active}"/></bookViews>"#
    );
    xml.push_str("<sheets>");
    for (idx, sheet) in workbook.sheets().iter().enumerate() {
        let _ = write!(
            xml,
            r#"<sheet name="{}" sheetId="{}""#,
            escape_xml(sheet.name()),
            idx + 1
        );
        match sheet.visibility {
            SheetVisibility::Visible => {}
            SheetVisibility::Hidden => xml.push_str(r#" state="hidden""#),
            SheetVisibility::VeryHidden => xml.push_str(r#" state="veryHidden""#),
        }
        let _ = write!(xml, r#" r:id="rId{}"/>"#, idx + 1);
    }
    xml.push_str("</sheets>");
    if options.full_calc_on_load {
        xml.push_str(r#"<calcPr calcId="191029" fullCalcOnLoad="1"/>"#);
    } else {
        xml.push_str(r#"<calcPr calcId="191029"/>"#);
    }
    xml.push_str("</workbook>");
    xml
}

fn content_types_xml(overrides: &[(String, &str)], has_vml: bool, has_vba: bool) -> String {
    let mut xml = String::new();
    xml.push_str(XML_DECLARATION);
    xml.push('\n');
    xml.push_str(
        r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    );
    let _ = write!(
        xml,
        r#"<Default Extension="rels" ContentType="{RELS_CONTENT_TYPE}"/><Default Extension="xml" ContentType="application/xml"/>"#
    );
    if has_vml {
        let _ = write!(xml, r#"<Default Extension="vml" ContentType="{VML_CONTENT_TYPE}"/>"#);
    }
    if has_vba {
        let _ = write!(
            xml,
            r#"<Default Extension="bin" ContentType="{VBA_PROJECT_CONTENT_TYPE}"/>"#
        );
    }
    for (part, content_type) in overrides {
        let _ = write!(
            xml,
            r#"<Override PartName="/{part}" ContentType="{content_type}"/>"#
        );
    }
    xml.push_str("</Types>");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sheetmerge_model::{CellRef, Range};

    #[test]
    fn empty_workbook_is_rejected() {
        let err = write_workbook_to_vec(&Workbook::new(), &WriteOptions::default()).unwrap_err();
        assert!(matches!(err, XlsxWriteError::Invalid(_)), "{err}");
    }

    #[test]
    fn unknown_style_ids_are_rejected() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_sheet("S").unwrap();
        sheet.set_value(CellRef::new(0, 0), 1.0);
        sheet.set_style_id(CellRef::new(0, 0), 7);
        let err = write_workbook_to_vec(&workbook, &WriteOptions::default()).unwrap_err();
        assert!(err.to_string().contains("unknown style id 7"), "{err}");
    }

    #[test]
    fn overlapping_merges_are_rejected() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_sheet("S").unwrap();
        sheet.merges = serde_overlapping_merges();
        let err = write_workbook_to_vec(&workbook, &WriteOptions::default()).unwrap_err();
        assert!(matches!(err, XlsxWriteError::Invalid(_)), "{err}");
    }

    // `MergedRegions::add` refuses overlaps; a deserialized model can still carry them.
    fn serde_overlapping_merges() -> sheetmerge_model::MergedRegions {
        let ranges = vec![
            Range::from_a1("A1:B2").unwrap(),
            Range::from_a1("B2:C3").unwrap(),
        ];
        serde_json::from_value(serde_json::to_value(ranges).unwrap()).unwrap()
    }

    #[test]
    fn workbook_part_lists_sheets_and_calc_settings() {
        let mut workbook = Workbook::new();
        workbook.add_sheet("First").unwrap();
        workbook.add_sheet("A & B").unwrap().visibility = SheetVisibility::Hidden;
        let xml = workbook_xml(&workbook, &WriteOptions::default());
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let names: Vec<_> = doc
            .descendants()
            .filter(|n| n.has_tag_name("sheet"))
            .map(|n| (n.attribute("name").unwrap(), n.attribute("state")))
            .collect();
        assert_eq!(names, vec![("First", None), ("A & B", Some("hidden"))]);
        let calc = doc.descendants().find(|n| n.has_tag_name("calcPr")).unwrap();
        assert_eq!(calc.attribute("fullCalcOnLoad"), Some("1"));
    }
}
