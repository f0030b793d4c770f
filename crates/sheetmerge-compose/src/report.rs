use std::fmt;

use serde::Serialize;
use sheetmerge_model::{CellRef, FormulaLocation};

use crate::error::SourceRole;
use crate::plan::EntryState;

/// Why a plan entry was dropped before copying.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// The optional workbook was not supplied.
    SourceAbsent,
    /// The optional workbook could not be decoded.
    SourceUnreadable { message: String },
    /// The workbook decoded but has no sheet of that name.
    SheetMissing,
}

/// Something the composer did that a caller may want to surface.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ComposeEvent {
    EntrySkipped {
        role: SourceRole,
        sheet: String,
        reason: SkipReason,
    },
    /// A later entry removed a sheet written by an earlier one.
    SheetReplaced {
        sheet: String,
        replaced: SourceRole,
        by: SourceRole,
    },
    /// A source carried a VBA project the output does not inherit.
    MacrosDropped { role: SourceRole },
    Patched {
        sheet: String,
        op: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        cell: Option<CellRef>,
    },
    PatchSkipped {
        sheet: String,
        op: &'static str,
        reason: String,
    },
}

/// A sheet reference left as written because it maps to more than one output sheet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RewriteDiagnostic {
    /// Output sheet holding the formula.
    pub sheet: String,
    pub location: FormulaLocation,
    /// The sheet name as referenced.
    pub reference: String,
    pub candidates: Vec<String>,
}

/// Final state of one plan entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EntryOutcome {
    pub role: SourceRole,
    pub source_sheet: String,
    pub target_sheet: String,
    pub state: EntryState,
}

/// Structured account of one composition, returned alongside the output.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ComposeReport {
    pub entries: Vec<EntryOutcome>,
    pub events: Vec<ComposeEvent>,
    pub diagnostics: Vec<RewriteDiagnostic>,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::SourceAbsent => f.write_str("workbook not supplied"),
            SkipReason::SourceUnreadable { message } => write!(f, "workbook unreadable: {message}"),
            SkipReason::SheetMissing => f.write_str("sheet not found"),
        }
    }
}

impl fmt::Display for ComposeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComposeEvent::EntrySkipped {
                role,
                sheet,
                reason,
            } => write!(f, "skipped {role} sheet {sheet:?}: {reason}"),
            ComposeEvent::SheetReplaced { sheet, replaced, by } => {
                write!(f, "{by} sheet {sheet:?} replaced the {replaced} copy")
            }
            ComposeEvent::MacrosDropped { role } => {
                write!(f, "dropped the {role} workbook's VBA project")
            }
            ComposeEvent::Patched {
                sheet,
                op,
                cell: Some(cell),
            } => write!(f, "{op} on {sheet:?} at {cell}"),
            ComposeEvent::Patched {
                sheet,
                op,
                cell: None,
            } => write!(f, "{op} on {sheet:?}"),
            ComposeEvent::PatchSkipped { sheet, op, reason } => {
                write!(f, "{op} on {sheet:?} skipped: {reason}")
            }
        }
    }
}

impl fmt::Display for RewriteDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let at = match &self.location {
            FormulaLocation::Cell(cell) => cell.to_string(),
            FormulaLocation::DataValidation(range) => format!("data validation {range}"),
            FormulaLocation::ConditionalFormat(range) => format!("conditional format {range}"),
            FormulaLocation::Hyperlink(range) => format!("hyperlink {range}"),
        };
        write!(
            f,
            "{:?} {at}: reference to {:?} is ambiguous ({})",
            self.sheet,
            self.reference,
            self.candidates.join(", ")
        )
    }
}

impl ComposeReport {
    pub fn replacements(&self) -> impl Iterator<Item = &ComposeEvent> {
        self.events
            .iter()
            .filter(|e| matches!(e, ComposeEvent::SheetReplaced { .. }))
    }

    pub fn skipped(&self) -> impl Iterator<Item = &ComposeEvent> {
        self.events
            .iter()
            .filter(|e| matches!(e, ComposeEvent::EntrySkipped { .. }))
    }

    pub fn output_sheets(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|e| e.state == EntryState::Patched)
            .map(|e| e.target_sheet.as_str())
    }
}
