//! `sheetmerge-model` defines the in-memory spreadsheet data structures shared by the
//! package codec and the composition engine.
//!
//! Everything here is value-typed: styles are interned by structural equality in a
//! per-workbook [`StyleTable`], and no record is shared between two workbooks.

#[macro_use]
mod macros;

mod address;
mod cell;
mod comments;
mod conditional_formatting;
mod data_validation;
mod date_system;
mod formula;
pub mod formula_refs;
mod hyperlinks;
mod merge;
mod sheet_name;
mod style;
mod value;
mod workbook;
mod worksheet;

pub use address::{
    col_to_name, format_sqref, name_to_col, A1ParseError, CellRef, Range, RangeParseError,
};
pub use cell::{Cell, CellKey, EXCEL_MAX_COLS, EXCEL_MAX_ROWS};
pub use comments::Comment;
pub use conditional_formatting::{CfRule, ConditionalFormatting, DifferentialFormat};
pub use data_validation::{
    DataValidation, DataValidationErrorStyle, DataValidationKind, DataValidationOperator,
};
pub use date_system::DateSystem;
pub use formula::{
    display_formula_text, normalize_formula_text, strip_array_braces, Formula, FormulaKind,
};
pub use formula_refs::{rewrite_sheet_names_in_formula, shift_formula_references};
pub use hyperlinks::{Hyperlink, HyperlinkTarget};
pub use merge::{MergeError, MergedRegions};
pub use sheet_name::{
    format_sheet_prefix, quote_sheet_name, sheet_name_eq_case_insensitive,
    sheet_name_needs_quotes, validate_sheet_name, SheetNameError, EXCEL_MAX_SHEET_NAME_LEN,
};
pub use style::{
    parse_argb_hex_color, Alignment, Border, BorderEdge, BorderStyle, Color, Fill, FillPattern,
    Font, GradientFill, GradientStop, HorizontalAlignment, Protection, Style, StyleTable,
    Underline, VerticalAlignment, VerticalTextAlignment,
};
pub use value::CellValue;
pub use workbook::{SheetError, Workbook};
pub use worksheet::{
    ColProperties, FormulaLocation, FrozenPane, Orientation, PageMargins, PageSetup,
    RowProperties, SheetFormat, SheetView, SheetVisibility, Worksheet,
};

pub use ordered_float::OrderedFloat;
