use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use sheetmerge_model::{
    normalize_formula_text, shift_formula_references, Cell, CellRef, CellValue, CfRule,
    ColProperties, ConditionalFormatting, DataValidation, DataValidationErrorStyle,
    DataValidationKind, DataValidationOperator, Formula, FrozenPane, Hyperlink,
    HyperlinkTarget, Orientation, PageMargins, Range, RowProperties, Worksheet, EXCEL_MAX_COLS,
};

use crate::read::ReadError;
use crate::relationships::Relationship;
use crate::shared_strings::{rich_text, SharedStrings};
use crate::styles::{parse_color, StylesPart};
use crate::worksheet::write::DEFAULT_ROW_HEIGHT;
use crate::xml::XmlElement;

/// Workbook-level state a worksheet part is decoded against.
pub(crate) struct SheetContext<'a> {
    pub shared_strings: &'a SharedStrings,
    pub styles: &'a StylesPart,
    /// The worksheet part's own relationships (hyperlink targets).
    pub rels: &'a [Relationship],
}

pub(crate) fn parse_worksheet(
    sheet: &mut Worksheet,
    root: &XmlElement,
    ctx: &SheetContext<'_>,
) -> Result<(), ReadError> {
    if let Some(sheet_pr) = root.child("sheetPr") {
        sheet.tab_color = sheet_pr.child("tabColor").and_then(parse_color);
        sheet.page_setup.fit_to_page = sheet_pr
            .child("pageSetUpPr")
            .and_then(|p| p.attr_bool("fitToPage"))
            .unwrap_or(false);
    }
    if let Some(view) = root.child("sheetViews").and_then(|v| v.child("sheetView")) {
        parse_sheet_view(sheet, view);
    }
    if let Some(format) = root.child("sheetFormatPr") {
        sheet.format.default_row_height = format
            .attr_parse::<f64>("defaultRowHeight")
            .filter(|h| *h != DEFAULT_ROW_HEIGHT);
        sheet.format.default_col_width = format.attr_parse("defaultColWidth");
        sheet.format.base_col_width = format.attr_parse("baseColWidth");
        sheet.format.custom_height = format.attr_bool("customHeight").unwrap_or(false);
        sheet.format.zero_height = format.attr_bool("zeroHeight").unwrap_or(false);
    }
    if let Some(cols) = root.child("cols") {
        parse_cols(sheet, cols, ctx);
    }
    if let Some(sheet_data) = root.child("sheetData") {
        parse_sheet_data(sheet, sheet_data, ctx)?;
    }
    if let Some(merges) = root.child("mergeCells") {
        for merge in merges.children_by_local("mergeCell") {
            let Some(a1) = merge.attr("ref") else {
                continue;
            };
            let range = parse_range(a1)?;
            if let Err(err) = sheet.merge_range(range) {
                log::warn!("sheet {:?}: skipping merge {a1}: {err}", sheet.name());
            }
        }
    }
    for cf in root.children_by_local("conditionalFormatting") {
        if let Some(block) = parse_conditional_formatting(cf, ctx)? {
            sheet.conditional_formats.push(block);
        }
    }
    if let Some(dvs) = root.child("dataValidations") {
        for dv in dvs.children_by_local("dataValidation") {
            sheet.data_validations.push(parse_data_validation(dv)?);
        }
    }
    if let Some(links) = root.child("hyperlinks") {
        for link in links.children_by_local("hyperlink") {
            if let Some(link) = parse_hyperlink(link, ctx)? {
                sheet.hyperlinks.push(link);
            }
        }
    }
    if let Some(options) = root.child("printOptions") {
        let setup = &mut sheet.page_setup;
        setup.print_grid_lines = options.attr_bool("gridLines").unwrap_or(false);
        setup.print_headings = options.attr_bool("headings").unwrap_or(false);
        setup.center_horizontally = options.attr_bool("horizontalCentered").unwrap_or(false);
        setup.center_vertically = options.attr_bool("verticalCentered").unwrap_or(false);
    }
    if let Some(margins) = root.child("pageMargins") {
        let default = PageMargins::default();
        let parsed = PageMargins {
            left: margins.attr_parse("left").unwrap_or(default.left),
            right: margins.attr_parse("right").unwrap_or(default.right),
            top: margins.attr_parse("top").unwrap_or(default.top),
            bottom: margins.attr_parse("bottom").unwrap_or(default.bottom),
            header: margins.attr_parse("header").unwrap_or(default.header),
            footer: margins.attr_parse("footer").unwrap_or(default.footer),
        };
        sheet.page_setup.margins = (parsed != default).then_some(parsed);
    }
    if let Some(setup) = root.child("pageSetup") {
        let page = &mut sheet.page_setup;
        page.orientation = match setup.attr("orientation") {
            Some("landscape") => Some(Orientation::Landscape),
            Some("portrait") => Some(Orientation::Portrait),
            _ => None,
        };
        page.paper_size = setup.attr_parse("paperSize");
        page.scale = setup.attr_parse::<u32>("scale").filter(|s| *s != 100);
        page.fit_to_width = setup.attr_parse("fitToWidth");
        page.fit_to_height = setup.attr_parse("fitToHeight");
    }
    Ok(())
}

fn parse_sheet_view(sheet: &mut Worksheet, view: &XmlElement) {
    let v = &mut sheet.view;
    v.show_grid_lines = view.attr_bool("showGridLines").unwrap_or(true);
    v.show_row_col_headers = view.attr_bool("showRowColHeaders").unwrap_or(true);
    v.show_zeros = view.attr_bool("showZeros").unwrap_or(true);
    v.right_to_left = view.attr_bool("rightToLeft").unwrap_or(false);
    v.zoom_scale = view.attr_parse::<u32>("zoomScale").filter(|z| *z != 100);

    if let Some(pane) = view.child("pane") {
        let state = pane.attr("state").unwrap_or("split");
        if state == "frozen" || state == "frozenSplit" {
            let cols = pane.attr_parse::<f64>("xSplit").unwrap_or(0.0) as u32;
            let rows = pane.attr_parse::<f64>("ySplit").unwrap_or(0.0) as u32;
            if rows > 0 || cols > 0 {
                v.frozen = Some(FrozenPane { rows, cols });
            }
        }
    }
    // With panes there is one selection per pane; the last one is the active pane's.
    v.active_cell = view
        .children_by_local("selection")
        .last()
        .and_then(|s| s.attr("activeCell"))
        .and_then(|a1| CellRef::from_a1(a1).ok());
}

fn parse_cols(sheet: &mut Worksheet, cols: &XmlElement, ctx: &SheetContext<'_>) {
    for col in cols.children_by_local("col") {
        let (Some(min), Some(max)) = (col.attr_parse::<u32>("min"), col.attr_parse::<u32>("max"))
        else {
            continue;
        };
        if min == 0 || max < min {
            continue;
        }
        let props = ColProperties {
            width: col
                .attr_parse::<f64>("width")
                .filter(|_| col.attr_bool("customWidth").unwrap_or(false)),
            hidden: col.attr_bool("hidden").unwrap_or(false),
            style_id: col
                .attr_parse::<u32>("style")
                .map(|xf| ctx.styles.style_id_for_xf(xf))
                .filter(|id| *id != 0),
            outline_level: col.attr_parse("outlineLevel").unwrap_or(0),
            collapsed: col.attr_bool("collapsed").unwrap_or(false),
            best_fit: col.attr_bool("bestFit").unwrap_or(false),
        };
        if props.is_default() {
            continue;
        }
        for idx in min..=max.min(EXCEL_MAX_COLS) {
            sheet.col_props.insert(idx - 1, props.clone());
        }
    }
}

struct SharedFormula {
    anchor: CellRef,
    text: String,
}

fn parse_sheet_data(
    sheet: &mut Worksheet,
    sheet_data: &XmlElement,
    ctx: &SheetContext<'_>,
) -> Result<(), ReadError> {
    let mut shared_formulas: HashMap<u32, SharedFormula> = HashMap::new();
    let mut next_row: u32 = 0;

    for row in sheet_data.children_by_local("row") {
        let row_idx = match row.attr_parse::<u32>("r") {
            Some(r) if r > 0 => r - 1,
            _ => next_row,
        };
        next_row = row_idx + 1;

        let props = RowProperties {
            height: row
                .attr_parse::<f64>("ht")
                .filter(|_| row.attr_bool("customHeight").unwrap_or(false)),
            hidden: row.attr_bool("hidden").unwrap_or(false),
            style_id: row
                .attr_parse::<u32>("s")
                .filter(|_| row.attr_bool("customFormat").unwrap_or(false))
                .map(|xf| ctx.styles.style_id_for_xf(xf))
                .filter(|id| *id != 0),
            outline_level: row.attr_parse("outlineLevel").unwrap_or(0),
            collapsed: row.attr_bool("collapsed").unwrap_or(false),
        };
        if !props.is_default() {
            sheet.row_props.insert(row_idx, props);
        }

        let mut next_col: u32 = 0;
        for c in row.children_by_local("c") {
            let at = match c.attr("r") {
                Some(a1) => CellRef::from_a1(a1)
                    .map_err(|_| ReadError::InvalidCellRef(a1.to_string()))?,
                None => CellRef::new(row_idx, next_col),
            };
            next_col = at.col + 1;

            let cell = parse_cell(c, at, ctx, &mut shared_formulas)?;
            sheet.set_cell(at, cell);
        }
    }
    Ok(())
}

fn parse_cell(
    c: &XmlElement,
    at: CellRef,
    ctx: &SheetContext<'_>,
    shared_formulas: &mut HashMap<u32, SharedFormula>,
) -> Result<Cell, ReadError> {
    let style_id = c
        .attr_parse::<u32>("s")
        .map(|xf| ctx.styles.style_id_for_xf(xf))
        .unwrap_or(0);
    let raw = c.child("v").map(|v| v.text());

    let value = match c.attr("t").unwrap_or("n") {
        "s" => raw
            .as_deref()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .and_then(|idx| ctx.shared_strings.get(idx))
            .map(|s| CellValue::String(s.to_string()))
            .unwrap_or_default(),
        "inlineStr" => c
            .child("is")
            .map(|is| CellValue::String(rich_text(is)))
            .unwrap_or_default(),
        "str" => raw.map(CellValue::String).unwrap_or_default(),
        "b" => raw
            .map(|v| CellValue::Boolean(v.trim() == "1" || v.trim().eq_ignore_ascii_case("true")))
            .unwrap_or_default(),
        "e" => raw
            .map(|v| CellValue::Error(v.trim().to_string()))
            .unwrap_or_default(),
        "d" => raw
            .as_deref()
            .and_then(parse_iso_datetime)
            .map(CellValue::DateTime)
            .unwrap_or_default(),
        _ => raw
            .as_deref()
            .and_then(|v| v.trim().parse::<f64>().ok())
            .map(CellValue::Number)
            .unwrap_or_default(),
    };

    let formula = match c.child("f") {
        Some(f) => parse_formula(f, at, shared_formulas)?,
        None => None,
    };

    Ok(Cell {
        value,
        formula,
        style_id,
    })
}

fn parse_formula(
    f: &XmlElement,
    at: CellRef,
    shared_formulas: &mut HashMap<u32, SharedFormula>,
) -> Result<Option<Formula>, ReadError> {
    let text = normalize_formula_text(&f.text());
    match f.attr("t").unwrap_or("normal") {
        "array" => {
            let range = match f.attr("ref") {
                Some(a1) => parse_range(a1)?,
                None => Range::new(at, at),
            };
            Ok(Some(Formula::array(&text, range)))
        }
        "shared" => {
            let Some(si) = f.attr_parse::<u32>("si") else {
                return Ok(non_empty_formula(&text));
            };
            if !text.is_empty() {
                shared_formulas.insert(
                    si,
                    SharedFormula {
                        anchor: at,
                        text: text.clone(),
                    },
                );
                return Ok(Some(Formula::new(&text)));
            }
            Ok(shared_formulas.get(&si).map(|master| {
                let shifted = shift_formula_references(
                    &master.text,
                    i64::from(at.row) - i64::from(master.anchor.row),
                    i64::from(at.col) - i64::from(master.anchor.col),
                );
                Formula::new(&shifted)
            }))
        }
        // Data-table formulas (`t="dataTable"`) have no text of their own.
        _ => Ok(non_empty_formula(&text)),
    }
}

fn non_empty_formula(text: &str) -> Option<Formula> {
    (!text.is_empty()).then(|| Formula::new(text))
}

/// Parse a `t="d"` cell value (ISO 8601 date, date-time or time).
fn parse_iso_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim().trim_end_matches('Z');
    const FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

pub(crate) fn parse_range(a1: &str) -> Result<Range, ReadError> {
    Range::from_a1(a1).map_err(|_| ReadError::InvalidRangeRef(a1.to_string()))
}

fn parse_sqref(sqref: &str) -> Result<Vec<Range>, ReadError> {
    Range::list_from_a1(sqref).map_err(|_| ReadError::InvalidRangeRef(sqref.to_string()))
}

fn parse_conditional_formatting(
    cf: &XmlElement,
    ctx: &SheetContext<'_>,
) -> Result<Option<ConditionalFormatting>, ReadError> {
    let Some(sqref) = cf.attr("sqref") else {
        return Ok(None);
    };
    let ranges = parse_sqref(sqref)?;

    let mut rules = Vec::new();
    for rule in cf.children_by_local("cfRule") {
        let mut out = CfRule {
            rule_type: rule.attr("type").unwrap_or_default().to_string(),
            priority: rule.attr_parse("priority").unwrap_or(1),
            operator: rule.attr("operator").map(str::to_string),
            stop_if_true: rule.attr_bool("stopIfTrue").unwrap_or(false),
            dxf: rule
                .attr_parse::<usize>("dxfId")
                .and_then(|idx| ctx.styles.dxf(idx))
                .cloned(),
            ..CfRule::default()
        };
        for (key, value) in &rule.attrs {
            if !matches!(
                key.as_str(),
                "type" | "priority" | "operator" | "stopIfTrue" | "dxfId"
            ) && !key.starts_with("xmlns")
            {
                out.attributes.push((key.clone(), value.clone()));
            }
        }
        for child in rule.elements() {
            match child.local_name() {
                "formula" => out.formulas.push(normalize_formula_text(&child.text())),
                // Extension payloads point at worksheet-level `x14` blocks that are not carried.
                "extLst" => {}
                _ => out.extra_xml.push(child.to_xml_string()),
            }
        }
        rules.push(out);
    }

    Ok(Some(ConditionalFormatting {
        ranges,
        pivot: cf.attr_bool("pivot").unwrap_or(false),
        rules,
    }))
}

fn parse_data_validation(dv: &XmlElement) -> Result<DataValidation, ReadError> {
    let ranges = match dv.attr("sqref") {
        Some(sqref) => parse_sqref(sqref)?,
        None => Vec::new(),
    };
    let formula = |name: &str| {
        dv.child(name)
            .map(|f| normalize_formula_text(&f.text()))
            .filter(|f| !f.is_empty())
    };
    Ok(DataValidation {
        ranges,
        kind: dv
            .attr("type")
            .and_then(DataValidationKind::from_ooxml)
            .unwrap_or_default(),
        operator: dv.attr("operator").and_then(DataValidationOperator::from_ooxml),
        formula1: formula("formula1"),
        formula2: formula("formula2"),
        allow_blank: dv.attr_bool("allowBlank").unwrap_or(false),
        show_input_message: dv.attr_bool("showInputMessage").unwrap_or(false),
        show_error_message: dv.attr_bool("showErrorMessage").unwrap_or(false),
        suppress_drop_down: dv.attr_bool("showDropDown").unwrap_or(false),
        error_style: dv.attr("errorStyle").and_then(DataValidationErrorStyle::from_ooxml),
        error_title: dv.attr("errorTitle").map(str::to_string),
        error: dv.attr("error").map(str::to_string),
        prompt_title: dv.attr("promptTitle").map(str::to_string),
        prompt: dv.attr("prompt").map(str::to_string),
    })
}

fn parse_hyperlink(
    link: &XmlElement,
    ctx: &SheetContext<'_>,
) -> Result<Option<Hyperlink>, ReadError> {
    let Some(a1) = link.attr("ref") else {
        return Ok(None);
    };
    let range = parse_range(a1)?;

    let target = match (link.prefixed_attr("id"), link.attr("location")) {
        (Some(rel_id), location) => {
            let Some(rel) = ctx.rels.iter().find(|r| r.id == rel_id) else {
                log::warn!("hyperlink {a1}: relationship {rel_id} not found");
                return Ok(None);
            };
            let uri = match location {
                Some(loc) if !loc.is_empty() => format!("{}#{loc}", rel.target),
                _ => rel.target.clone(),
            };
            HyperlinkTarget::ExternalUrl { uri }
        }
        (None, Some(location)) => HyperlinkTarget::Internal {
            location: location.to_string(),
        },
        (None, None) => return Ok(None),
    };

    Ok(Some(Hyperlink {
        range,
        target,
        display: link.attr("display").map(str::to_string),
        tooltip: link.attr("tooltip").map(str::to_string),
    }))
}
