use std::fmt::Write as _;

use sheetmerge_model::{
    format_sqref, CellRef, CellValue, ColProperties, DataValidationKind, DateSystem, FormulaKind,
    HyperlinkTarget, Orientation, Worksheet,
};

use crate::relationships::{
    Relationship, REL_TYPE_COMMENTS, REL_TYPE_HYPERLINK, REL_TYPE_VML_DRAWING,
};
use crate::shared_strings::SharedStrings;
use crate::styles::{build_color_element, DxfTable};
use crate::xml::{escape_xml, XML_DECLARATION};

const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Excel's width for columns without an explicit width (Calibri 11).
const DEFAULT_COL_WIDTH: f64 = 9.140625;
pub(crate) const DEFAULT_ROW_HEIGHT: f64 = 15.0;

/// Workbook-wide tables filled while worksheets are serialized.
pub(crate) struct SheetWriteContext<'a> {
    pub shared_strings: &'a mut SharedStrings,
    /// Number of `t="s"` cells written so far (the `count` of `sharedStrings.xml`).
    pub shared_string_refs: usize,
    pub dxfs: &'a mut DxfTable,
    pub date_system: DateSystem,
}

pub(crate) struct SheetParts {
    pub xml: String,
    pub rels: Vec<Relationship>,
}

/// Serialize one worksheet. `comment_parts` carries the relationship targets of the
/// sheet's comments and VML parts when the sheet has notes. Only the workbook's
/// active sheet is written as selected.
pub(crate) fn write_worksheet_xml(
    sheet: &Worksheet,
    ctx: &mut SheetWriteContext<'_>,
    active: bool,
    comment_parts: Option<(&str, &str)>,
) -> SheetParts {
    let mut rels = Vec::new();
    let mut xml = String::new();
    xml.push_str(XML_DECLARATION);
    xml.push('\n');
    let _ = write!(xml, r#"<worksheet xmlns="{NS_MAIN}" xmlns:r="{NS_REL}">"#);

    write_sheet_pr(&mut xml, sheet);
    let dimension = sheet
        .used_range()
        .map(|r| r.to_string())
        .unwrap_or_else(|| "A1".to_string());
    let _ = write!(xml, r#"<dimension ref="{dimension}"/>"#);
    write_sheet_views(&mut xml, sheet, active);
    write_sheet_format(&mut xml, sheet);
    write_cols(&mut xml, sheet);
    write_sheet_data(&mut xml, sheet, ctx);

    if !sheet.merges.is_empty() {
        let _ = write!(xml, r#"<mergeCells count="{}">"#, sheet.merges.len());
        for merge in sheet.merges.iter() {
            let _ = write!(xml, r#"<mergeCell ref="{merge}"/>"#);
        }
        xml.push_str("</mergeCells>");
    }

    write_conditional_formatting(&mut xml, sheet, ctx);
    write_data_validations(&mut xml, sheet);
    write_hyperlinks(&mut xml, sheet, &mut rels);
    write_print_settings(&mut xml, sheet);

    if let Some((comments_target, vml_target)) = comment_parts {
        let comments_id = format!("rId{}", rels.len() + 1);
        rels.push(Relationship::new(comments_id, REL_TYPE_COMMENTS, comments_target));
        let vml_id = format!("rId{}", rels.len() + 1);
        rels.push(Relationship::new(vml_id.clone(), REL_TYPE_VML_DRAWING, vml_target));
        let _ = write!(xml, r#"<legacyDrawing r:id="{vml_id}"/>"#);
    }

    xml.push_str("</worksheet>");
    SheetParts { xml, rels }
}

fn bool_attr(xml: &mut String, name: &str, value: bool) {
    if value {
        let _ = write!(xml, r#" {name}="1""#);
    }
}

fn write_sheet_pr(xml: &mut String, sheet: &Worksheet) {
    if sheet.tab_color.is_none() && !sheet.page_setup.fit_to_page {
        return;
    }
    xml.push_str("<sheetPr>");
    if let Some(color) = sheet.tab_color {
        xml.push_str(&build_color_element("tabColor", color).to_xml_string());
    }
    if sheet.page_setup.fit_to_page {
        xml.push_str(r#"<pageSetUpPr fitToPage="1"/>"#);
    }
    xml.push_str("</sheetPr>");
}

fn write_sheet_views(xml: &mut String, sheet: &Worksheet, active: bool) {
    let view = &sheet.view;
    xml.push_str("<sheetViews><sheetView");
    bool_attr(xml, "tabSelected", active);
    if !view.show_grid_lines {
        xml.push_str(r#" showGridLines="0""#);
    }
    if !view.show_row_col_headers {
        xml.push_str(r#" showRowColHeaders="0""#);
    }
    if !view.show_zeros {
        xml.push_str(r#" showZeros="0""#);
    }
    bool_attr(xml, "rightToLeft", view.right_to_left);
    if let Some(zoom) = view.zoom_scale {
        let _ = write!(xml, r#" zoomScale="{zoom}" zoomScaleNormal="{zoom}""#);
    }
    xml.push_str(r#" workbookViewId="0""#);

    let frozen = view.frozen.filter(|f| f.rows > 0 || f.cols > 0);
    if frozen.is_none() && view.active_cell.is_none() {
        xml.push_str("/></sheetViews>");
        return;
    }
    xml.push('>');

    let mut pane_name = None;
    if let Some(frozen) = frozen {
        let pane = match (frozen.rows > 0, frozen.cols > 0) {
            (true, true) => "bottomRight",
            (true, false) => "bottomLeft",
            _ => "topRight",
        };
        let top_left = CellRef::new(frozen.rows, frozen.cols).to_a1();
        xml.push_str("<pane");
        if frozen.cols > 0 {
            let _ = write!(xml, r#" xSplit="{}""#, frozen.cols);
        }
        if frozen.rows > 0 {
            let _ = write!(xml, r#" ySplit="{}""#, frozen.rows);
        }
        let _ = write!(
            xml,
            r#" topLeftCell="{top_left}" activePane="{pane}" state="frozen"/>"#
        );
        pane_name = Some(pane);
    }
    if let Some(active) = view.active_cell {
        let a1 = active.to_a1();
        xml.push_str("<selection");
        if let Some(pane) = pane_name {
            let _ = write!(xml, r#" pane="{pane}""#);
        }
        let _ = write!(xml, r#" activeCell="{a1}" sqref="{a1}"/>"#);
    }
    xml.push_str("</sheetView></sheetViews>");
}

fn write_sheet_format(xml: &mut String, sheet: &Worksheet) {
    let format = &sheet.format;
    xml.push_str("<sheetFormatPr");
    if let Some(base) = format.base_col_width {
        let _ = write!(xml, r#" baseColWidth="{base}""#);
    }
    if let Some(width) = format.default_col_width {
        let _ = write!(xml, r#" defaultColWidth="{width}""#);
    }
    let _ = write!(
        xml,
        r#" defaultRowHeight="{}""#,
        format.default_row_height.unwrap_or(DEFAULT_ROW_HEIGHT)
    );
    bool_attr(xml, "customHeight", format.custom_height);
    bool_attr(xml, "zeroHeight", format.zero_height);
    xml.push_str("/>");
}

/// Collapse per-column properties into `<col min max>` spans of identical entries.
fn col_spans(sheet: &Worksheet) -> Vec<(u32, u32, &ColProperties)> {
    let mut spans: Vec<(u32, u32, &ColProperties)> = Vec::new();
    for (&col, props) in &sheet.col_props {
        if props.is_default() {
            continue;
        }
        match spans.last_mut() {
            Some((_, max, last)) if *max + 1 == col && *last == props => *max = col,
            _ => spans.push((col, col, props)),
        }
    }
    spans
}

fn write_cols(xml: &mut String, sheet: &Worksheet) {
    let spans = col_spans(sheet);
    if spans.is_empty() {
        return;
    }
    let default_width = sheet.format.default_col_width.unwrap_or(DEFAULT_COL_WIDTH);
    xml.push_str("<cols>");
    for (min, max, props) in spans {
        let _ = write!(xml, r#"<col min="{}" max="{}""#, min + 1, max + 1);
        match props.width {
            Some(width) => {
                let _ = write!(xml, r#" width="{width}" customWidth="1""#);
            }
            None => {
                let _ = write!(xml, r#" width="{default_width}""#);
            }
        }
        if let Some(style) = props.style_id {
            let _ = write!(xml, r#" style="{style}""#);
        }
        bool_attr(xml, "hidden", props.hidden);
        bool_attr(xml, "bestFit", props.best_fit);
        if props.outline_level > 0 {
            let _ = write!(xml, r#" outlineLevel="{}""#, props.outline_level);
        }
        bool_attr(xml, "collapsed", props.collapsed);
        xml.push_str("/>");
    }
    xml.push_str("</cols>");
}

fn write_sheet_data(xml: &mut String, sheet: &Worksheet, ctx: &mut SheetWriteContext<'_>) {
    xml.push_str("<sheetData>");

    let mut cells = sheet.iter_cells().peekable();
    let mut props = sheet.row_props.iter().peekable();
    loop {
        // Rows are emitted for any index with cells or explicit properties.
        let next_cell_row = cells.peek().map(|(at, _)| at.row);
        let next_prop_row = props.peek().map(|(row, _)| **row);
        let row = match (next_cell_row, next_prop_row) {
            (None, None) => break,
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) => a,
            (None, Some(b)) => b,
        };

        let _ = write!(xml, r#"<row r="{}""#, row + 1);
        if next_prop_row == Some(row) {
            if let Some((_, p)) = props.next() {
                if let Some(style) = p.style_id {
                    let _ = write!(xml, r#" s="{style}" customFormat="1""#);
                }
                if let Some(height) = p.height {
                    let _ = write!(xml, r#" ht="{height}" customHeight="1""#);
                }
                bool_attr(xml, "hidden", p.hidden);
                if p.outline_level > 0 {
                    let _ = write!(xml, r#" outlineLevel="{}""#, p.outline_level);
                }
                bool_attr(xml, "collapsed", p.collapsed);
            }
        }

        let mut wrote_open = false;
        while let Some((at, cell)) = cells.next_if(|(at, _)| at.row == row) {
            if !wrote_open {
                xml.push('>');
                wrote_open = true;
            }
            write_cell(xml, at, cell, ctx);
        }
        if wrote_open {
            xml.push_str("</row>");
        } else {
            xml.push_str("/>");
        }
    }

    xml.push_str("</sheetData>");
}

fn number_text(value: f64) -> Option<String> {
    value.is_finite().then(|| value.to_string())
}

fn write_cell(
    xml: &mut String,
    at: CellRef,
    cell: &sheetmerge_model::Cell,
    ctx: &mut SheetWriteContext<'_>,
) {
    let _ = write!(xml, r#"<c r="{}""#, at.to_a1());
    if cell.style_id != 0 {
        let _ = write!(xml, r#" s="{}""#, cell.style_id);
    }

    // (type attribute, <v> payload)
    let (t, v): (Option<&str>, Option<String>) = match (&cell.value, cell.formula.is_some()) {
        (CellValue::Empty, _) => (None, None),
        (CellValue::Number(n), _) => match number_text(*n) {
            Some(text) => (None, Some(text)),
            None => (Some("e"), Some("#NUM!".to_string())),
        },
        (CellValue::DateTime(dt), _) => (None, number_text(ctx.date_system.to_serial(*dt))),
        (CellValue::Boolean(b), _) => (Some("b"), Some(if *b { "1" } else { "0" }.to_string())),
        (CellValue::Error(e), _) => (Some("e"), Some(e.clone())),
        (CellValue::String(s), true) => (Some("str"), Some(s.clone())),
        (CellValue::String(s), false) => {
            let idx = ctx.shared_strings.intern(s);
            ctx.shared_string_refs += 1;
            (Some("s"), Some(idx.to_string()))
        }
    };
    if let Some(t) = t {
        let _ = write!(xml, r#" t="{t}""#);
    }

    if cell.formula.is_none() && v.is_none() {
        xml.push_str("/>");
        return;
    }
    xml.push('>');
    if let Some(formula) = &cell.formula {
        match &formula.kind {
            FormulaKind::Normal => {
                let _ = write!(xml, "<f>{}</f>", escape_xml(&formula.text));
            }
            FormulaKind::Array { range } => {
                let _ = write!(
                    xml,
                    r#"<f t="array" ref="{range}">{}</f>"#,
                    escape_xml(&formula.text)
                );
            }
        }
    }
    if let Some(v) = v {
        let _ = write!(xml, "<v>{}</v>", escape_xml(&v));
    }
    xml.push_str("</c>");
}

fn write_conditional_formatting(
    xml: &mut String,
    sheet: &Worksheet,
    ctx: &mut SheetWriteContext<'_>,
) {
    for block in &sheet.conditional_formats {
        if block.ranges.is_empty() || block.rules.is_empty() {
            continue;
        }
        let _ = write!(
            xml,
            r#"<conditionalFormatting sqref="{}""#,
            format_sqref(&block.ranges)
        );
        bool_attr(xml, "pivot", block.pivot);
        xml.push('>');
        for rule in &block.rules {
            let _ = write!(xml, r#"<cfRule type="{}""#, escape_xml(&rule.rule_type));
            if let Some(dxf) = &rule.dxf {
                let _ = write!(xml, r#" dxfId="{}""#, ctx.dxfs.intern(dxf));
            }
            let _ = write!(xml, r#" priority="{}""#, rule.priority);
            bool_attr(xml, "stopIfTrue", rule.stop_if_true);
            if let Some(op) = &rule.operator {
                let _ = write!(xml, r#" operator="{}""#, escape_xml(op));
            }
            for (key, value) in &rule.attributes {
                let _ = write!(xml, r#" {key}="{}""#, escape_xml(value));
            }
            if rule.formulas.is_empty() && rule.extra_xml.is_empty() {
                xml.push_str("/>");
                continue;
            }
            xml.push('>');
            for formula in &rule.formulas {
                let _ = write!(xml, "<formula>{}</formula>", escape_xml(formula));
            }
            for extra in &rule.extra_xml {
                xml.push_str(extra);
            }
            xml.push_str("</cfRule>");
        }
        xml.push_str("</conditionalFormatting>");
    }
}

fn write_data_validations(xml: &mut String, sheet: &Worksheet) {
    let validations: Vec<_> = sheet
        .data_validations
        .iter()
        .filter(|dv| !dv.ranges.is_empty())
        .collect();
    if validations.is_empty() {
        return;
    }
    let _ = write!(xml, r#"<dataValidations count="{}">"#, validations.len());
    for dv in validations {
        xml.push_str("<dataValidation");
        if dv.kind != DataValidationKind::Any {
            let _ = write!(xml, r#" type="{}""#, dv.kind.as_ooxml());
        }
        if let Some(style) = dv.error_style {
            let _ = write!(xml, r#" errorStyle="{}""#, style.as_ooxml());
        }
        if let Some(op) = dv.operator {
            let _ = write!(xml, r#" operator="{}""#, op.as_ooxml());
        }
        bool_attr(xml, "allowBlank", dv.allow_blank);
        bool_attr(xml, "showDropDown", dv.suppress_drop_down);
        bool_attr(xml, "showInputMessage", dv.show_input_message);
        bool_attr(xml, "showErrorMessage", dv.show_error_message);
        for (name, value) in [
            ("errorTitle", &dv.error_title),
            ("error", &dv.error),
            ("promptTitle", &dv.prompt_title),
            ("prompt", &dv.prompt),
        ] {
            if let Some(value) = value {
                let _ = write!(xml, r#" {name}="{}""#, escape_xml(value));
            }
        }
        let _ = write!(xml, r#" sqref="{}">"#, format_sqref(&dv.ranges));
        if let Some(f) = &dv.formula1 {
            let _ = write!(xml, "<formula1>{}</formula1>", escape_xml(f));
        }
        if let Some(f) = &dv.formula2 {
            let _ = write!(xml, "<formula2>{}</formula2>", escape_xml(f));
        }
        xml.push_str("</dataValidation>");
    }
    xml.push_str("</dataValidations>");
}

fn write_hyperlinks(xml: &mut String, sheet: &Worksheet, rels: &mut Vec<Relationship>) {
    if sheet.hyperlinks.is_empty() {
        return;
    }
    xml.push_str("<hyperlinks>");
    for link in &sheet.hyperlinks {
        let _ = write!(xml, r#"<hyperlink ref="{}""#, link.range);
        match &link.target {
            HyperlinkTarget::ExternalUrl { uri } => {
                let id = format!("rId{}", rels.len() + 1);
                let _ = write!(xml, r#" r:id="{id}""#);
                rels.push(Relationship::external(id, REL_TYPE_HYPERLINK, uri.clone()));
            }
            HyperlinkTarget::Internal { location } => {
                let _ = write!(xml, r#" location="{}""#, escape_xml(location));
            }
        }
        if let Some(display) = &link.display {
            let _ = write!(xml, r#" display="{}""#, escape_xml(display));
        }
        if let Some(tooltip) = &link.tooltip {
            let _ = write!(xml, r#" tooltip="{}""#, escape_xml(tooltip));
        }
        xml.push_str("/>");
    }
    xml.push_str("</hyperlinks>");
}

fn write_print_settings(xml: &mut String, sheet: &Worksheet) {
    let setup = &sheet.page_setup;
    if setup.print_grid_lines
        || setup.print_headings
        || setup.center_horizontally
        || setup.center_vertically
    {
        xml.push_str("<printOptions");
        bool_attr(xml, "horizontalCentered", setup.center_horizontally);
        bool_attr(xml, "verticalCentered", setup.center_vertically);
        bool_attr(xml, "headings", setup.print_headings);
        bool_attr(xml, "gridLines", setup.print_grid_lines);
        xml.push_str("/>");
    }

    let margins = setup.margins.clone().unwrap_or_default();
    let _ = write!(
        xml,
        r#"<pageMargins left="{}" right="{}" top="{}" bottom="{}" header="{}" footer="{}"/>"#,
        margins.left, margins.right, margins.top, margins.bottom, margins.header, margins.footer
    );

    let mut attrs = String::new();
    if let Some(paper) = setup.paper_size {
        let _ = write!(attrs, r#" paperSize="{paper}""#);
    }
    if let Some(scale) = setup.scale {
        let _ = write!(attrs, r#" scale="{scale}""#);
    }
    if let Some(width) = setup.fit_to_width {
        let _ = write!(attrs, r#" fitToWidth="{width}""#);
    }
    if let Some(height) = setup.fit_to_height {
        let _ = write!(attrs, r#" fitToHeight="{height}""#);
    }
    if let Some(orientation) = setup.orientation {
        let value = match orientation {
            Orientation::Portrait => "portrait",
            Orientation::Landscape => "landscape",
        };
        let _ = write!(attrs, r#" orientation="{value}""#);
    }
    if !attrs.is_empty() {
        let _ = write!(xml, "<pageSetup{attrs}/>");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sheetmerge_model::{Cell, Formula, Range, RowProperties};

    fn write(sheet: &Worksheet) -> (String, SharedStrings, usize) {
        let mut shared = SharedStrings::default();
        let mut dxfs = DxfTable::default();
        let mut ctx = SheetWriteContext {
            shared_strings: &mut shared,
            shared_string_refs: 0,
            dxfs: &mut dxfs,
            date_system: DateSystem::Excel1900,
        };
        let parts = write_worksheet_xml(sheet, &mut ctx, true, None);
        let refs = ctx.shared_string_refs;
        (parts.xml, shared, refs)
    }

    fn at(a1: &str) -> CellRef {
        CellRef::from_a1(a1).unwrap()
    }

    #[test]
    fn rows_and_cells_are_emitted_in_order() {
        let mut sheet = Worksheet::new("S");
        sheet.set_value(at("B2"), "x");
        sheet.set_value(at("A2"), "x");
        sheet.set_value(at("A1"), 1.0);
        sheet.set_formula(at("C2"), Formula::new("=A1*2"));
        sheet.row_props.insert(
            4,
            RowProperties {
                hidden: true,
                ..RowProperties::default()
            },
        );

        let (xml, shared, refs) = write(&sheet);
        assert_eq!(shared.values, vec!["x".to_string()]);
        assert_eq!(refs, 2);

        let doc = roxmltree::Document::parse(&xml).unwrap();
        let rows: Vec<_> = doc
            .descendants()
            .filter(|n| n.has_tag_name("row"))
            .map(|n| n.attribute("r").unwrap().to_string())
            .collect();
        assert_eq!(rows, vec!["1", "2", "5"]);
        let refs: Vec<_> = doc
            .descendants()
            .filter(|n| n.has_tag_name("c"))
            .map(|n| n.attribute("r").unwrap().to_string())
            .collect();
        assert_eq!(refs, vec!["A1", "A2", "B2", "C2"]);
        let f = doc.descendants().find(|n| n.has_tag_name("f")).unwrap();
        assert_eq!(f.text(), Some("A1*2"));
        let dim = doc.descendants().find(|n| n.has_tag_name("dimension")).unwrap();
        assert_eq!(dim.attribute("ref"), Some("A1:C2"));
    }

    #[test]
    fn array_formulas_keep_their_range() {
        let mut sheet = Worksheet::new("S");
        sheet.set_cell(
            at("A1"),
            Cell::with_formula(Formula::array("{=B1:B2*2}", Range::from_a1("A1:A2").unwrap())),
        );
        let (xml, _, _) = write(&sheet);
        assert!(xml.contains(r#"<f t="array" ref="A1:A2">B1:B2*2</f>"#), "{xml}");
    }

    #[test]
    fn identical_adjacent_columns_coalesce() {
        let mut sheet = Worksheet::new("S");
        let wide = ColProperties {
            width: Some(20.0),
            ..ColProperties::default()
        };
        for col in [1, 2, 3, 5] {
            sheet.col_props.insert(col, wide.clone());
        }
        let (xml, _, _) = write(&sheet);
        assert!(xml.contains(r#"<col min="2" max="4" width="20" customWidth="1"/>"#), "{xml}");
        assert!(xml.contains(r#"<col min="6" max="6" width="20" customWidth="1"/>"#), "{xml}");
    }

    #[test]
    fn gridlines_off_and_frozen_pane() {
        let mut sheet = Worksheet::new("S");
        sheet.view.show_grid_lines = false;
        sheet.view.frozen = Some(sheetmerge_model::FrozenPane { rows: 1, cols: 0 });
        let (xml, _, _) = write(&sheet);
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let view = doc.descendants().find(|n| n.has_tag_name("sheetView")).unwrap();
        assert_eq!(view.attribute("showGridLines"), Some("0"));
        let pane = doc.descendants().find(|n| n.has_tag_name("pane")).unwrap();
        assert_eq!(pane.attribute("ySplit"), Some("1"));
        assert_eq!(pane.attribute("activePane"), Some("bottomLeft"));
    }
}
