//! Helpers for working with formula strings across layers (file formats, composition).
//!
//! # Invariant
//!
//! The canonical formula representation stored in [`Formula::text`] is:
//! - trimmed
//! - **without** a leading `'='`
//! - **without** the `{=...}` wrapper some writers use for array formulas
//!
//! SpreadsheetML stores formulas in `<f>` elements without a leading `'='`, while
//! most UIs display formulas with one.

use serde::{Deserialize, Serialize};

use crate::Range;

/// How a formula is anchored in the grid.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FormulaKind {
    #[default]
    Normal,
    /// Legacy CSE array formula whose result spans `range`. Stored on the anchor cell.
    Array { range: Range },
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Formula {
    pub text: String,
    #[serde(default, skip_serializing_if = "is_normal")]
    pub kind: FormulaKind,
}

fn is_normal(kind: &FormulaKind) -> bool {
    matches!(kind, FormulaKind::Normal)
}

impl Formula {
    /// Build a normal formula from display (`=A1`) or canonical (`A1`) text.
    pub fn new(text: &str) -> Self {
        Self {
            text: normalize_formula_text(&strip_array_braces(text)),
            kind: FormulaKind::Normal,
        }
    }

    pub fn array(text: &str, range: Range) -> Self {
        Self {
            text: normalize_formula_text(&strip_array_braces(text)),
            kind: FormulaKind::Array { range },
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, FormulaKind::Array { .. })
    }

    /// The formula as typed in the formula bar (`=...`).
    pub fn display(&self) -> String {
        display_formula_text(&self.text)
    }
}

/// Normalize formula text into the canonical representation.
///
/// - Trims leading/trailing whitespace.
/// - Strips a single leading `'='` if present.
///
/// This does not attempt to validate formula syntax.
pub fn normalize_formula_text(s: &str) -> String {
    let mut trimmed = s.trim();
    if let Some(rest) = trimmed.strip_prefix('=') {
        trimmed = rest.trim();
    }
    trimmed.to_string()
}

/// Convert formula text into its display form (leading `'='`), or empty.
pub fn display_formula_text(s: &str) -> String {
    let normalized = normalize_formula_text(s);
    if normalized.is_empty() {
        String::new()
    } else {
        format!("={normalized}")
    }
}

/// Remove the `{=...}` wrapper used when array formulas are rendered as text.
///
/// Array constants (`{1,2,3}`) have no `=` after the brace and are left alone.
pub fn strip_array_braces(s: &str) -> String {
    let trimmed = s.trim();
    match trimmed
        .strip_prefix("{=")
        .and_then(|rest| rest.strip_suffix('}'))
    {
        Some(inner) => format!("={}", inner.trim()),
        None => trimmed.to_string(),
    }
}
