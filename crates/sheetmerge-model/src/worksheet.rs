use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    Cell, CellKey, CellRef, CellValue, Color, Comment, ConditionalFormatting, DataValidation,
    Formula, Hyperlink, HyperlinkTarget, MergeError, MergedRegions, Range,
};

/// Sheet visibility as stored in `workbook.xml` (`state` attribute).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetVisibility {
    #[default]
    Visible,
    Hidden,
    VeryHidden,
}

/// Explicit formatting for a single row (`<row>` attributes).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RowProperties {
    /// Height in points; `None` uses the sheet default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default)]
    pub hidden: bool,
    /// Row-level style applied to cells without their own style.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_id: Option<u32>,
    #[serde(default)]
    pub outline_level: u8,
    #[serde(default)]
    pub collapsed: bool,
}

impl RowProperties {
    pub fn is_default(&self) -> bool {
        self == &RowProperties::default()
    }
}

/// Explicit formatting for a single column (expanded from `<col min max>` spans).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ColProperties {
    /// Width in character units; `None` uses the sheet default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_id: Option<u32>,
    #[serde(default)]
    pub outline_level: u8,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(default)]
    pub best_fit: bool,
}

impl ColProperties {
    pub fn is_default(&self) -> bool {
        self == &ColProperties::default()
    }
}

/// A frozen pane: the first `rows` rows and `cols` columns stay on screen.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrozenPane {
    pub rows: u32,
    pub cols: u32,
}

/// `<sheetView>` flags.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetView {
    #[serde(default = "default_true")]
    pub show_grid_lines: bool,
    #[serde(default = "default_true")]
    pub show_row_col_headers: bool,
    #[serde(default = "default_true")]
    pub show_zeros: bool,
    #[serde(default)]
    pub right_to_left: bool,
    /// Zoom percentage; `None` is 100%.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zoom_scale: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frozen: Option<FrozenPane>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_cell: Option<CellRef>,
}

impl Default for SheetView {
    fn default() -> Self {
        Self {
            show_grid_lines: true,
            show_row_col_headers: true,
            show_zeros: true,
            right_to_left: false,
            zoom_scale: None,
            frozen: None,
            active_cell: None,
        }
    }
}

/// `<sheetFormatPr>` defaults.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SheetFormat {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_row_height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_col_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_col_width: Option<u32>,
    #[serde(default)]
    pub custom_height: bool,
    #[serde(default)]
    pub zero_height: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Portrait,
    Landscape,
}

/// Page margins in inches.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PageMargins {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
    pub header: f64,
    pub footer: f64,
}

impl Default for PageMargins {
    fn default() -> Self {
        Self {
            left: 0.7,
            right: 0.7,
            top: 0.75,
            bottom: 0.75,
            header: 0.3,
            footer: 0.3,
        }
    }
}

/// Printing setup (`<pageSetup>`, `<pageMargins>`, `<printOptions>`, `fitToPage`).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PageSetup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orientation: Option<Orientation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paper_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
    #[serde(default)]
    pub fit_to_page: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fit_to_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fit_to_height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margins: Option<PageMargins>,
    #[serde(default)]
    pub print_grid_lines: bool,
    #[serde(default)]
    pub print_headings: bool,
    #[serde(default)]
    pub center_horizontally: bool,
    #[serde(default)]
    pub center_vertically: bool,
}

/// Where a formula lives inside a worksheet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "at", rename_all = "snake_case")]
pub enum FormulaLocation {
    Cell(CellRef),
    /// A data-validation rule, identified by its first target range.
    DataValidation(Range),
    /// A conditional-formatting rule, identified by its first target range.
    ConditionalFormat(Range),
    /// An internal hyperlink's `location`.
    Hyperlink(Range),
}

fn default_true() -> bool {
    true
}

/// A single worksheet grid and everything attached to it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Worksheet {
    pub(crate) name: String,
    #[serde(default)]
    pub visibility: SheetVisibility,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_color: Option<Color>,
    #[serde(default)]
    cells: BTreeMap<CellKey, Cell>,
    #[serde(default)]
    pub row_props: BTreeMap<u32, RowProperties>,
    #[serde(default)]
    pub col_props: BTreeMap<u32, ColProperties>,
    #[serde(default)]
    pub merges: MergedRegions,
    #[serde(default)]
    pub hyperlinks: Vec<Hyperlink>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub data_validations: Vec<DataValidation>,
    #[serde(default)]
    pub conditional_formats: Vec<ConditionalFormatting>,
    #[serde(default)]
    pub view: SheetView,
    #[serde(default)]
    pub format: SheetFormat,
    #[serde(default)]
    pub page_setup: PageSetup,
}

impl Worksheet {
    /// A detached, empty sheet. Attach it with [`crate::Workbook::insert_worksheet`],
    /// which enforces name rules.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visibility: SheetVisibility::default(),
            tab_color: None,
            cells: BTreeMap::new(),
            row_props: BTreeMap::new(),
            col_props: BTreeMap::new(),
            merges: MergedRegions::new(),
            hyperlinks: Vec::new(),
            comments: Vec::new(),
            data_validations: Vec::new(),
            conditional_formats: Vec::new(),
            view: SheetView::default(),
            format: SheetFormat::default(),
            page_setup: PageSetup::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cell(&self, cell: CellRef) -> Option<&Cell> {
        self.cells.get(&CellKey::from_ref(cell))
    }

    pub fn cell_mut(&mut self, cell: CellRef) -> Option<&mut Cell> {
        self.cells.get_mut(&CellKey::from_ref(cell))
    }

    /// Store `cell`, or remove the entry when it is truly empty.
    pub fn set_cell(&mut self, at: CellRef, cell: Cell) {
        let key = CellKey::from_ref(at);
        if cell.is_truly_empty() {
            self.cells.remove(&key);
        } else {
            self.cells.insert(key, cell);
        }
    }

    /// Set a literal value, keeping the existing style and dropping any formula.
    pub fn set_value(&mut self, at: CellRef, value: impl Into<CellValue>) {
        let style_id = self.cell(at).map(|c| c.style_id).unwrap_or(0);
        self.set_cell(
            at,
            Cell {
                value: value.into(),
                formula: None,
                style_id,
            },
        );
    }

    /// Set a formula, keeping the existing style. The cached value is cleared.
    pub fn set_formula(&mut self, at: CellRef, formula: Formula) {
        let style_id = self.cell(at).map(|c| c.style_id).unwrap_or(0);
        self.set_cell(
            at,
            Cell {
                value: CellValue::Empty,
                formula: Some(formula),
                style_id,
            },
        );
    }

    pub fn set_style_id(&mut self, at: CellRef, style_id: u32) {
        let mut cell = self.cell(at).cloned().unwrap_or_default();
        cell.style_id = style_id;
        self.set_cell(at, cell);
    }

    pub fn remove_cell(&mut self, at: CellRef) -> Option<Cell> {
        self.cells.remove(&CellKey::from_ref(at))
    }

    /// Cells in row-major order.
    pub fn iter_cells(&self) -> impl Iterator<Item = (CellRef, &Cell)> {
        self.cells.iter().map(|(k, c)| (k.to_ref(), c))
    }

    pub fn iter_cells_mut(&mut self) -> impl Iterator<Item = (CellRef, &mut Cell)> {
        self.cells.iter_mut().map(|(k, c)| (k.to_ref(), c))
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// First cell (row-major) for which `pred` holds.
    pub fn find_cell<F>(&self, mut pred: F) -> Option<CellRef>
    where
        F: FnMut(&Cell) -> bool,
    {
        self.iter_cells().find(|(_, c)| pred(c)).map(|(at, _)| at)
    }

    pub fn merge_range(&mut self, range: Range) -> Result<(), MergeError> {
        self.merges.add(range)
    }

    /// Bounding box of stored cells and merged regions.
    pub fn used_range(&self) -> Option<Range> {
        let mut bounds: Option<Range> = None;
        let mut extend = |r: Range| {
            bounds = Some(match bounds {
                None => r,
                Some(b) => Range::new(
                    CellRef::new(b.start.row.min(r.start.row), b.start.col.min(r.start.col)),
                    CellRef::new(b.end.row.max(r.end.row), b.end.col.max(r.end.col)),
                ),
            });
        };
        for (at, _) in self.iter_cells() {
            extend(Range::new(at, at));
        }
        for merge in self.merges.iter() {
            extend(*merge);
        }
        bounds
    }

    /// Visit every formula text stored on the sheet, allowing in-place edits.
    ///
    /// Covers cell formulas, data-validation formulas, conditional-formatting formulas
    /// and internal hyperlink locations.
    pub fn for_each_formula_mut<F>(&mut self, mut visit: F)
    where
        F: FnMut(FormulaLocation, &mut String),
    {
        for (key, cell) in self.cells.iter_mut() {
            if let Some(formula) = cell.formula.as_mut() {
                visit(FormulaLocation::Cell(key.to_ref()), &mut formula.text);
            }
        }
        for dv in &mut self.data_validations {
            let Some(anchor) = dv.ranges.first().copied() else {
                continue;
            };
            for formula in [dv.formula1.as_mut(), dv.formula2.as_mut()]
                .into_iter()
                .flatten()
            {
                visit(FormulaLocation::DataValidation(anchor), formula);
            }
        }
        for cf in &mut self.conditional_formats {
            let Some(anchor) = cf.ranges.first().copied() else {
                continue;
            };
            for rule in &mut cf.rules {
                for formula in &mut rule.formulas {
                    visit(FormulaLocation::ConditionalFormat(anchor), formula);
                }
            }
        }
        for link in &mut self.hyperlinks {
            if let HyperlinkTarget::Internal { location } = &mut link.target {
                visit(FormulaLocation::Hyperlink(link.range), location);
            }
        }
    }
}
