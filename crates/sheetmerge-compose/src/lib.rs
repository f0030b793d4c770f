//! Compose one spreadsheet package from a template, a required primary workbook and
//! an optional secondary workbook.
//!
//! The pipeline is:
//! 1. [`Sources::load`] decodes the inputs (a malformed optional input is recorded,
//!    not fatal).
//! 2. [`PlanBuilder`] expands the [`ComposeConfig`] into a [`CompositionPlan`], which
//!    [`CompositionPlan::validate`] checks against the sources before anything is
//!    copied.
//! 3. [`Composer::compose`] copies each entry with a [`SheetCopier`] (styles interned
//!    through a [`StyleResolver`]), replaces earlier sheets of the same name, rewrites
//!    sheet references that changed, and applies the patch table.
//! 4. The result is encoded as the same package flavour as the template.
//!
//! [`compose_packages`] runs all of it on byte buffers.

mod composer;
mod config;
mod copier;
mod error;
mod patch;
mod plan;
mod report;
mod rewrite;
mod sources;
mod style_resolver;

use chrono::{Local, NaiveDateTime};
use sheetmerge_xlsx::{write_workbook_to_vec, WorkbookKind, WriteOptions};

pub use composer::{Composer, Composition};
pub use config::{
    ArrayFormulaPolicy, ComposeConfig, ConflictRule, MissingSheetPolicy, SheetSelection,
    SheetSpec, DEFAULT_DATE_FORMAT, DEFAULT_SECONDARY_SHEET, DEFAULT_STAMP_LABEL,
    DEFAULT_TEMPLATE_SHEET,
};
pub use copier::{CopyOptions, CopyStats, SheetCopier};
pub use error::{ComposeError, MissingSheet, SourceRole};
pub use patch::{apply_patches, CellOffset, LabelMatch, PatchOp, SheetPatch, StampValue};
pub use plan::{CompositionPlan, EntryState, PlanBuilder, PlanEntry};
pub use report::{ComposeEvent, ComposeReport, EntryOutcome, RewriteDiagnostic, SkipReason};
pub use rewrite::{rewrite_sheet_references, Resolution, SheetRenameMap};
pub use sources::{ComposeInputs, OptionalSource, Sources, Template};
pub use style_resolver::StyleResolver;

/// An encoded composition.
#[derive(Clone, Debug, PartialEq)]
pub struct ComposeOutput {
    pub bytes: Vec<u8>,
    /// Always the template's flavour.
    pub kind: WorkbookKind,
    pub report: ComposeReport,
}

/// Compose `inputs` into a new package, stamping dates with the local clock.
pub fn compose_packages(
    inputs: &ComposeInputs<'_>,
    config: &ComposeConfig,
) -> Result<ComposeOutput, ComposeError> {
    compose_packages_at(inputs, config, Local::now().naive_local())
}

/// [`compose_packages`] with an explicit clock.
pub fn compose_packages_at(
    inputs: &ComposeInputs<'_>,
    config: &ComposeConfig,
    now: NaiveDateTime,
) -> Result<ComposeOutput, ComposeError> {
    config.validate()?;
    let sources = Sources::load(inputs)?;
    let composer = Composer::new(config).at(now);
    let plan = composer.plan(&sources)?;
    let Composition { workbook, report } = composer.compose(plan, &sources)?;

    let kind = sources.template_kind();
    let bytes = write_workbook_to_vec(&workbook, &WriteOptions::with_kind(kind))?;
    log::debug!("encoded composed .{} package ({} bytes)", kind.file_extension(), bytes.len());
    Ok(ComposeOutput {
        bytes,
        kind,
        report,
    })
}
