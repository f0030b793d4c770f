use sheetmerge_model::{
    validate_sheet_name, Cell, CellValue, DateSystem, Formula, FormulaKind, Range, SheetError,
    Workbook, Worksheet,
};
use sheetmerge_xlsx::styles::is_date_format;

use crate::config::ArrayFormulaPolicy;
use crate::error::ComposeError;
use crate::style_resolver::StyleResolver;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CopyOptions {
    /// Only cells, dimensions and attachments inside this bound are copied.
    /// `None` copies the whole sheet.
    pub region: Option<Range>,
    pub array_formulas: ArrayFormulaPolicy,
}

impl CopyOptions {
    fn includes(&self, range: &Range) -> bool {
        self.region.map_or(true, |region| region.contains_range(range))
    }
}

/// What a single [`SheetCopier::copy`] carried over.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CopyStats {
    pub cells: usize,
    pub merges: usize,
    /// Merges not fully inside the region.
    pub dropped_merges: usize,
    pub hyperlinks: usize,
    pub comments: usize,
    pub data_validations: usize,
    pub conditional_formats: usize,
}

/// Copies sheets out of one source workbook into target workbooks.
///
/// Cells keep their coordinates and formula text. Styles go through a
/// [`StyleResolver`], so the copier should be reused for every sheet taken from the
/// same source into the same target.
pub struct SheetCopier<'a> {
    source: &'a Workbook,
    styles: StyleResolver<'a>,
}

impl<'a> SheetCopier<'a> {
    pub fn new(source: &'a Workbook) -> Self {
        Self {
            source,
            styles: StyleResolver::new(&source.styles),
        }
    }

    pub fn source(&self) -> &'a Workbook {
        self.source
    }

    /// Copy `source_sheet` into `target` as a new last sheet named `target_name`.
    ///
    /// Fails without touching `target` when the source sheet does not exist or the
    /// name is invalid or already taken; removing a previous sheet of that name is up
    /// to the caller.
    pub fn copy<'t>(
        &mut self,
        source_sheet: &str,
        target: &'t mut Workbook,
        target_name: &str,
        options: &CopyOptions,
    ) -> Result<(&'t mut Worksheet, CopyStats), ComposeError> {
        let sheet = self.source.sheet_by_name(source_sheet)?;
        validate_sheet_name(target_name).map_err(SheetError::from)?;
        if target.conflicting_sheet_index(target_name).is_some() {
            return Err(SheetError::DuplicateSheetName(target_name.to_string()).into());
        }

        let mut out = Worksheet::new(target_name);
        let mut stats = CopyStats::default();
        let convert_dates = self.source.date_system != target.date_system;

        for (at, cell) in sheet.iter_cells() {
            if !options.includes(&Range::new(at, at)) {
                continue;
            }
            let mut value = cell.value.clone();
            if convert_dates {
                value = self.convert_date_serial(value, cell.style_id, target.date_system);
            }
            out.set_cell(
                at,
                Cell {
                    value,
                    formula: cell
                        .formula
                        .as_ref()
                        .map(|f| carry_formula(f, options)),
                    style_id: self.styles.resolve(cell.style_id, &mut target.styles),
                },
            );
            stats.cells += 1;
        }

        for (row, props) in &sheet.row_props {
            let in_region = options.region.map_or(true, |r| r.contains_row(*row));
            if props.is_default() || !in_region {
                continue;
            }
            let mut props = props.clone();
            props.style_id = props
                .style_id
                .map(|id| self.styles.resolve(id, &mut target.styles));
            out.row_props.insert(*row, props);
        }
        for (col, props) in &sheet.col_props {
            let in_region = options.region.map_or(true, |r| r.contains_col(*col));
            if props.is_default() || !in_region {
                continue;
            }
            let mut props = props.clone();
            props.style_id = props
                .style_id
                .map(|id| self.styles.resolve(id, &mut target.styles));
            out.col_props.insert(*col, props);
        }

        for merge in sheet.merges.iter() {
            if !options.includes(merge) {
                stats.dropped_merges += 1;
                continue;
            }
            match out.merge_range(*merge) {
                Ok(()) => stats.merges += 1,
                Err(err) => {
                    log::warn!("{source_sheet:?}: dropping merge {merge}: {err}");
                    stats.dropped_merges += 1;
                }
            }
        }

        out.hyperlinks = sheet
            .hyperlinks
            .iter()
            .filter(|link| options.includes(&link.range))
            .cloned()
            .collect();
        out.comments = sheet
            .comments
            .iter()
            .filter(|c| options.includes(&Range::new(c.cell, c.cell)))
            .cloned()
            .collect();
        out.data_validations = sheet
            .data_validations
            .iter()
            .filter(|dv| options.region.map_or(true, |r| dv.is_within(&r)))
            .cloned()
            .collect();
        out.conditional_formats = sheet
            .conditional_formats
            .iter()
            .filter(|cf| options.region.map_or(true, |r| cf.is_within(&r)))
            .cloned()
            .collect();
        stats.hyperlinks = out.hyperlinks.len();
        stats.comments = out.comments.len();
        stats.data_validations = out.data_validations.len();
        stats.conditional_formats = out.conditional_formats.len();

        out.visibility = sheet.visibility;
        out.tab_color = sheet.tab_color.clone();
        out.view = sheet.view.clone();
        if let Some(active) = out.view.active_cell {
            if !options.includes(&Range::new(active, active)) {
                out.view.active_cell = None;
            }
        }
        out.format = sheet.format.clone();
        out.page_setup = sheet.page_setup.clone();

        log::debug!(
            "copied {source_sheet:?} -> {target_name:?}: {} cells, {} merges ({} dropped)",
            stats.cells,
            stats.merges,
            stats.dropped_merges
        );
        Ok((target.push_worksheet(out)?, stats))
    }

    /// Re-express a date serial in the target's date system. Only numbers under a
    /// date format are dates; everything else passes through.
    fn convert_date_serial(&self, value: CellValue, style_id: u32, to: DateSystem) -> CellValue {
        let CellValue::Number(serial) = value else {
            return value;
        };
        let is_date = self
            .styles
            .source_style(style_id)
            .and_then(|s| s.number_format.as_deref())
            .is_some_and(is_date_format);
        if !is_date {
            return value;
        }
        match self.source.date_system.from_serial(serial) {
            Some(at) => CellValue::Number(to.to_serial(at)),
            None => value,
        }
    }
}

fn carry_formula(formula: &Formula, options: &CopyOptions) -> Formula {
    match (&formula.kind, options.array_formulas) {
        (FormulaKind::Array { range }, ArrayFormulaPolicy::Preserve) if options.includes(range) => {
            Formula::array(&formula.text, *range)
        }
        _ => Formula::new(&formula.text),
    }
}
