//! Table-driven edits applied to composed sheets after copying.
//!
//! A [`SheetPatch`] names an output sheet and a list of [`PatchOp`]s. Ops that cannot
//! find their anchor (missing sheet, no matching label) are reported and skipped;
//! only an invalid op definition is an error.

use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sheetmerge_model::{Cell, CellRef, CellValue, Workbook};

use crate::error::ComposeError;
use crate::report::ComposeEvent;

/// Signed distance from a matched label cell to the cell that gets written.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellOffset {
    #[serde(default)]
    pub rows: i64,
    #[serde(default)]
    pub cols: i64,
}

/// How a label cell is recognized. Only string values are considered.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelMatch {
    /// Whole text, ignoring surrounding whitespace.
    Exact(String),
    Contains(String),
    Regex(String),
}

enum Matcher<'a> {
    Exact(&'a str),
    Contains(&'a str),
    Regex(Regex),
}

impl LabelMatch {
    fn matcher(&self) -> Result<Matcher<'_>, ComposeError> {
        Ok(match self {
            LabelMatch::Exact(text) => Matcher::Exact(text.trim()),
            LabelMatch::Contains(text) => Matcher::Contains(text),
            LabelMatch::Regex(pattern) => Matcher::Regex(Regex::new(pattern).map_err(|err| {
                ComposeError::InvalidConfig(format!("label pattern {pattern:?}: {err}"))
            })?),
        })
    }
}

impl Matcher<'_> {
    fn is_match(&self, text: &str) -> bool {
        match self {
            Matcher::Exact(expected) => text.trim() == *expected,
            Matcher::Contains(needle) => text.contains(needle),
            Matcher::Regex(re) => re.is_match(text),
        }
    }
}

/// Value written by [`PatchOp::StampLabel`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StampValue {
    /// The composition date at midnight.
    Today,
    Now,
    Fixed(CellValue),
}

impl StampValue {
    pub fn produce(&self, now: NaiveDateTime) -> CellValue {
        match self {
            StampValue::Today => {
                CellValue::DateTime(now.date().and_hms_opt(0, 0, 0).unwrap_or(now))
            }
            StampValue::Now => CellValue::DateTime(now),
            StampValue::Fixed(value) => value.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchOp {
    /// Find the first cell (row-major) whose text matches `label` and write `value`
    /// at `offset` from it. The target keeps its style, with `number_format`
    /// applied on top when given.
    StampLabel {
        label: LabelMatch,
        #[serde(default)]
        offset: CellOffset,
        value: StampValue,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        number_format: Option<String>,
    },
    ShowGridLines(bool),
    /// Zoom percentage (10-400).
    SetZoom(u32),
}

impl PatchOp {
    pub fn name(&self) -> &'static str {
        match self {
            PatchOp::StampLabel { .. } => "stamp_label",
            PatchOp::ShowGridLines(_) => "show_grid_lines",
            PatchOp::SetZoom(_) => "set_zoom",
        }
    }

    pub fn validate(&self) -> Result<(), ComposeError> {
        match self {
            PatchOp::StampLabel { label, .. } => label.matcher().map(|_| ()),
            PatchOp::SetZoom(zoom) if !(10..=400).contains(zoom) => Err(
                ComposeError::InvalidConfig(format!("zoom {zoom} is outside 10..=400")),
            ),
            _ => Ok(()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SheetPatch {
    pub sheet: String,
    pub ops: Vec<PatchOp>,
}

/// Apply `patches` to `workbook`, returning one event per op.
pub fn apply_patches(
    workbook: &mut Workbook,
    patches: &[SheetPatch],
    now: NaiveDateTime,
) -> Result<Vec<ComposeEvent>, ComposeError> {
    let mut events = Vec::new();
    for patch in patches {
        for op in &patch.ops {
            let event = match apply_op(workbook, &patch.sheet, op, now)? {
                Ok(cell) => ComposeEvent::Patched {
                    sheet: patch.sheet.clone(),
                    op: op.name(),
                    cell,
                },
                Err(reason) => {
                    log::warn!("patch {} on {:?} skipped: {reason}", op.name(), patch.sheet);
                    ComposeEvent::PatchSkipped {
                        sheet: patch.sheet.clone(),
                        op: op.name(),
                        reason,
                    }
                }
            };
            events.push(event);
        }
    }
    Ok(events)
}

/// Outer error: bad op definition. Inner error: reason the op was skipped.
fn apply_op(
    workbook: &mut Workbook,
    sheet_name: &str,
    op: &PatchOp,
    now: NaiveDateTime,
) -> Result<Result<Option<CellRef>, String>, ComposeError> {
    let Some(sheet_index) = workbook.sheet_index(sheet_name) else {
        return Ok(Err("sheet is not part of the output".to_string()));
    };

    match op {
        PatchOp::StampLabel {
            label,
            offset,
            value,
            number_format,
        } => {
            let matcher = label.matcher()?;
            let Some(sheet) = workbook.sheet(sheet_index) else {
                return Ok(Err("sheet is not part of the output".to_string()));
            };
            let Some(anchor) =
                sheet.find_cell(|c| c.value.as_str().is_some_and(|t| matcher.is_match(t)))
            else {
                return Ok(Err(format!("no cell matches {label:?}")));
            };
            let Some(target) = anchor.offset(offset.rows, offset.cols) else {
                return Ok(Err(format!("offset from {anchor} leaves the grid")));
            };

            let mut style_id = sheet.cell(target).map(|c| c.style_id).unwrap_or(0);
            if let Some(code) = number_format {
                let mut style = workbook.styles.get(style_id).cloned().unwrap_or_default();
                style.number_format = Some(code.clone());
                style_id = workbook.intern_style(style);
            }
            if let Some(sheet) = workbook.sheet_mut(sheet_index) {
                sheet.set_cell(
                    target,
                    Cell {
                        value: value.produce(now),
                        formula: None,
                        style_id,
                    },
                );
            }
            Ok(Ok(Some(target)))
        }
        PatchOp::ShowGridLines(show) => {
            if let Some(sheet) = workbook.sheet_mut(sheet_index) {
                sheet.view.show_grid_lines = *show;
            }
            Ok(Ok(None))
        }
        PatchOp::SetZoom(zoom) => {
            op.validate()?;
            if let Some(sheet) = workbook.sheet_mut(sheet_index) {
                sheet.view.zoom_scale = Some(*zoom);
            }
            Ok(Ok(None))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use sheetmerge_model::Style;

    fn at(a1: &str) -> CellRef {
        CellRef::from_a1(a1).unwrap()
    }

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 30)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap()
    }

    fn stamp(label: LabelMatch) -> PatchOp {
        PatchOp::StampLabel {
            label,
            offset: CellOffset { rows: 0, cols: 2 },
            value: StampValue::Today,
            number_format: Some("yyyy-mm-dd".to_string()),
        }
    }

    fn model_workbook() -> Workbook {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_sheet("Model").unwrap();
        sheet.set_value(at("A1"), "DCF");
        sheet.set_value(at("A10"), "Valuation Date:");
        workbook
    }

    #[test]
    fn stamp_writes_today_next_to_the_label() {
        let mut workbook = model_workbook();
        let patches = vec![SheetPatch {
            sheet: "Model".to_string(),
            ops: vec![
                stamp(LabelMatch::Contains("Valuation Date".to_string())),
                PatchOp::ShowGridLines(false),
            ],
        }];

        let events = apply_patches(&mut workbook, &patches, noon()).unwrap();
        assert_eq!(
            events[0],
            ComposeEvent::Patched {
                sheet: "Model".to_string(),
                op: "stamp_label",
                cell: Some(at("C10")),
            }
        );

        let sheet = workbook.sheet_by_name("Model").unwrap();
        let cell = sheet.cell(at("C10")).unwrap();
        assert_eq!(
            cell.value,
            CellValue::DateTime(
                NaiveDate::from_ymd_opt(2024, 6, 30)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap()
            )
        );
        assert_eq!(
            workbook.styles.get(cell.style_id).unwrap().number_format.as_deref(),
            Some("yyyy-mm-dd")
        );
        assert!(!sheet.view.show_grid_lines);
    }

    #[test]
    fn stamp_keeps_the_target_style() {
        let mut workbook = model_workbook();
        let locked = workbook.intern_style(Style {
            protection: Some(Default::default()),
            ..Style::default()
        });
        workbook
            .sheet_by_name_mut("Model")
            .unwrap()
            .set_style_id(at("C10"), locked);

        let patches = vec![SheetPatch {
            sheet: "Model".to_string(),
            ops: vec![stamp(LabelMatch::Regex(r"^Valuation\s+Date".to_string()))],
        }];
        apply_patches(&mut workbook, &patches, noon()).unwrap();

        let cell = workbook
            .sheet_by_name("Model")
            .unwrap()
            .cell(at("C10"))
            .unwrap()
            .clone();
        let style = workbook.styles.get(cell.style_id).unwrap();
        assert!(style.protection.is_some());
        assert_eq!(style.number_format.as_deref(), Some("yyyy-mm-dd"));
    }

    #[test]
    fn unmatched_labels_and_missing_sheets_are_skipped() {
        let mut workbook = model_workbook();
        let patches = vec![
            SheetPatch {
                sheet: "Model".to_string(),
                ops: vec![stamp(LabelMatch::Exact("Valuation Date".to_string()))],
            },
            SheetPatch {
                sheet: "Elsewhere".to_string(),
                ops: vec![PatchOp::SetZoom(85)],
            },
        ];

        let events = apply_patches(&mut workbook, &patches, noon()).unwrap();
        assert_eq!(events.len(), 2);
        assert!(events
            .iter()
            .all(|e| matches!(e, ComposeEvent::PatchSkipped { .. })));
        assert_eq!(workbook.sheet_by_name("Model").unwrap().cell_count(), 2);
    }

    #[test]
    fn invalid_ops_are_errors() {
        let mut workbook = model_workbook();
        let patches = vec![SheetPatch {
            sheet: "Model".to_string(),
            ops: vec![stamp(LabelMatch::Regex("(".to_string()))],
        }];
        assert!(matches!(
            apply_patches(&mut workbook, &patches, noon()),
            Err(ComposeError::InvalidConfig(_))
        ));
        assert!(PatchOp::SetZoom(5).validate().is_err());
    }
}
