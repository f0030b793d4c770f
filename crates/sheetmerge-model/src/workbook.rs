use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sheet_name::{sheet_name_eq_case_insensitive, validate_sheet_name, SheetNameError};
use crate::{DateSystem, Style, StyleTable, Worksheet};

/// Errors raised by sheet-level workbook operations.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SheetError {
    #[error("sheet not found: {0:?}")]
    SheetNotFound(String),
    #[error("duplicate sheet name: {0:?}")]
    DuplicateSheetName(String),
    #[error(transparent)]
    InvalidName(#[from] SheetNameError),
    #[error("sheet position {index} is out of range for {len} sheets")]
    PositionOutOfRange { index: usize, len: usize },
}

/// An in-memory workbook: ordered worksheets sharing one style table.
///
/// Sheet names are looked up case-sensitively and never collide: inserting a name
/// that is already taken fails with [`SheetError::DuplicateSheetName`] instead of
/// replacing the existing sheet. Names that differ only by case also collide, since
/// spreadsheet applications refuse to open such packages.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Workbook {
    #[serde(default)]
    sheets: Vec<Worksheet>,
    #[serde(default)]
    pub styles: StyleTable,
    #[serde(default)]
    pub date_system: DateSystem,
    /// Index of the sheet shown when the file is opened.
    #[serde(default)]
    pub active_sheet: usize,
    /// Opaque `xl/theme/theme1.xml` payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<Vec<u8>>,
    /// Opaque `xl/vbaProject.bin` payload. Never parsed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vba_project: Option<Vec<u8>>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sheets(&self) -> &[Worksheet] {
        &self.sheets
    }

    /// Mutable access to the sheets. Names are fixed once a sheet is attached.
    pub fn sheets_mut(&mut self) -> impl Iterator<Item = &mut Worksheet> {
        self.sheets.iter_mut()
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name()).collect()
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    pub fn sheet_index(&self, name: &str) -> Option<usize> {
        self.sheets.iter().position(|s| s.name() == name)
    }

    /// Index of a sheet whose name collides with `name`.
    ///
    /// Uniqueness is case-insensitive, as in Excel: `Grid` and `grid` cannot both
    /// exist even though lookups by name are exact.
    pub fn conflicting_sheet_index(&self, name: &str) -> Option<usize> {
        self.sheets
            .iter()
            .position(|s| sheet_name_eq_case_insensitive(s.name(), name))
    }

    pub fn sheet(&self, index: usize) -> Option<&Worksheet> {
        self.sheets.get(index)
    }

    pub fn sheet_mut(&mut self, index: usize) -> Option<&mut Worksheet> {
        self.sheets.get_mut(index)
    }

    pub fn sheet_by_name(&self, name: &str) -> Result<&Worksheet, SheetError> {
        self.sheets
            .iter()
            .find(|s| s.name() == name)
            .ok_or_else(|| SheetError::SheetNotFound(name.to_string()))
    }

    pub fn sheet_by_name_mut(&mut self, name: &str) -> Result<&mut Worksheet, SheetError> {
        self.sheets
            .iter_mut()
            .find(|s| s.name() == name)
            .ok_or_else(|| SheetError::SheetNotFound(name.to_string()))
    }

    fn check_new_name(&self, name: &str) -> Result<(), SheetError> {
        validate_sheet_name(name)?;
        match self.conflicting_sheet_index(name) {
            Some(_) => Err(SheetError::DuplicateSheetName(name.to_string())),
            None => Ok(()),
        }
    }

    /// Append a new empty sheet.
    pub fn add_sheet(&mut self, name: &str) -> Result<&mut Worksheet, SheetError> {
        self.insert_sheet(self.sheets.len(), name)
    }

    /// Create a new empty sheet at `index` (`0..=sheet_count()`).
    pub fn insert_sheet(&mut self, index: usize, name: &str) -> Result<&mut Worksheet, SheetError> {
        self.insert_worksheet(index, Worksheet::new(name))
    }

    /// Attach a fully built sheet at `index`. Fails without modifying the workbook
    /// when the name is invalid or already taken.
    pub fn insert_worksheet(
        &mut self,
        index: usize,
        sheet: Worksheet,
    ) -> Result<&mut Worksheet, SheetError> {
        if index > self.sheets.len() {
            return Err(SheetError::PositionOutOfRange {
                index,
                len: self.sheets.len(),
            });
        }
        self.check_new_name(sheet.name())?;
        if index <= self.active_sheet && !self.sheets.is_empty() {
            self.active_sheet += 1;
        }
        self.sheets.insert(index, sheet);
        Ok(&mut self.sheets[index])
    }

    pub fn push_worksheet(&mut self, sheet: Worksheet) -> Result<&mut Worksheet, SheetError> {
        self.insert_worksheet(self.sheets.len(), sheet)
    }

    /// Detach a sheet by name and return it.
    pub fn remove_sheet(&mut self, name: &str) -> Result<Worksheet, SheetError> {
        let index = self
            .sheet_index(name)
            .ok_or_else(|| SheetError::SheetNotFound(name.to_string()))?;
        let sheet = self.sheets.remove(index);
        if self.active_sheet > index || self.active_sheet >= self.sheets.len() {
            self.active_sheet = self.active_sheet.saturating_sub(1);
        }
        Ok(sheet)
    }

    pub fn intern_style(&mut self, style: Style) -> u32 {
        self.styles.intern(style)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CellRef;
    use pretty_assertions::assert_eq;

    #[test]
    fn duplicate_names_are_rejected_not_overwritten() {
        let mut wb = Workbook::new();
        wb.add_sheet("Data").unwrap().set_value(CellRef::new(0, 0), 1.0);
        assert_eq!(
            wb.add_sheet("Data").unwrap_err(),
            SheetError::DuplicateSheetName("Data".to_string())
        );
        assert_eq!(
            wb.add_sheet("DATA").unwrap_err(),
            SheetError::DuplicateSheetName("DATA".to_string())
        );
        assert_eq!(wb.sheet_count(), 1);
        assert_eq!(wb.sheet_by_name("Data").unwrap().cell_count(), 1);
    }

    #[test]
    fn lookups_are_case_sensitive() {
        let mut wb = Workbook::new();
        wb.add_sheet("Model").unwrap();
        assert!(wb.sheet_by_name("Model").is_ok());
        assert_eq!(
            wb.sheet_by_name("model").unwrap_err(),
            SheetError::SheetNotFound("model".to_string())
        );
    }

    #[test]
    fn insert_at_position_and_remove() {
        let mut wb = Workbook::new();
        wb.add_sheet("A").unwrap();
        wb.add_sheet("C").unwrap();
        wb.insert_sheet(1, "B").unwrap();
        assert_eq!(wb.sheet_names(), vec!["A", "B", "C"]);
        assert!(matches!(
            wb.insert_sheet(9, "D"),
            Err(SheetError::PositionOutOfRange { index: 9, len: 3 })
        ));

        let removed = wb.remove_sheet("B").unwrap();
        assert_eq!(removed.name(), "B");
        assert_eq!(wb.sheet_names(), vec!["A", "C"]);
        assert!(matches!(wb.remove_sheet("B"), Err(SheetError::SheetNotFound(_))));
    }

    #[test]
    fn invalid_names_are_rejected() {
        let mut wb = Workbook::new();
        assert!(matches!(
            wb.add_sheet("a[b]"),
            Err(SheetError::InvalidName(_))
        ));
    }
}
