use serde::{Deserialize, Deserializer, Serialize};

use crate::{CellRef, CellValue, Formula};

/// Rows in an Excel grid.
pub const EXCEL_MAX_ROWS: u32 = 1_048_576;

/// Columns in an Excel grid (`A`..=`XFD`).
pub const EXCEL_MAX_COLS: u32 = 16_384;

/// Map key for sparse cell storage: the row in the high half, the column in the low
/// half, so keys sort in `<sheetData>` order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CellKey(u64);

impl CellKey {
    #[inline]
    pub const fn new(row: u32, col: u32) -> Self {
        Self(((row as u64) << 32) | col as u64)
    }

    #[inline]
    pub const fn row(self) -> u32 {
        (self.0 >> 32) as u32
    }

    #[inline]
    pub const fn col(self) -> u32 {
        self.0 as u32
    }

    #[inline]
    pub const fn to_ref(self) -> CellRef {
        CellRef::new(self.row(), self.col())
    }

    #[inline]
    pub const fn from_ref(cell: CellRef) -> Self {
        Self::new(cell.row, cell.col)
    }
}

impl From<CellRef> for CellKey {
    fn from(cell: CellRef) -> Self {
        Self::from_ref(cell)
    }
}

impl<'de> Deserialize<'de> for CellKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let key = CellKey(u64::deserialize(deserializer)?);
        if key.row() >= EXCEL_MAX_ROWS || key.col() >= EXCEL_MAX_COLS {
            return Err(serde::de::Error::custom(format!(
                "cell key {} is outside the sheet grid",
                key.0
            )));
        }
        Ok(key)
    }
}

/// One stored cell. Cells with no value, no formula and style 0 are not stored.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// Literal value, or the cached result of `formula`.
    #[serde(default)]
    pub value: CellValue,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<Formula>,

    #[serde(default)]
    pub style_id: u32,
}

impl Cell {
    pub fn new(value: CellValue) -> Self {
        Self {
            value,
            ..Self::default()
        }
    }

    /// A formula cell with no cached value.
    pub fn with_formula(formula: Formula) -> Self {
        Self {
            formula: Some(formula),
            ..Self::default()
        }
    }

    pub fn is_truly_empty(&self) -> bool {
        self.value.is_empty() && self.formula.is_none() && self.style_id == 0
    }
}
