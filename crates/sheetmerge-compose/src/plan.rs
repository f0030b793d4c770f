use serde::Serialize;
use sheetmerge_model::{sheet_name_eq_case_insensitive, Range};

use crate::config::{ComposeConfig, ConflictRule, MissingSheetPolicy, SheetSelection, SheetSpec};
use crate::error::{ComposeError, MissingSheet, SourceRole};
use crate::report::{ComposeEvent, SkipReason};
use crate::sources::Sources;

/// Lifecycle of a plan entry. Entries only move forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    Pending,
    Validated,
    /// Copied, but later replaced by another entry or not yet patched.
    Copied,
    Patched,
}

/// One sheet to copy: where it comes from, what it is called in the output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlanEntry {
    pub role: SourceRole,
    pub source_sheet: String,
    pub target_sheet: String,
    pub region: Option<Range>,
    pub required: bool,
    pub conflict: ConflictRule,
    pub state: EntryState,
}

impl PlanEntry {
    fn from_spec(
        role: SourceRole,
        spec: &SheetSpec,
        config: &ComposeConfig,
    ) -> Result<Self, ComposeError> {
        Ok(Self {
            role,
            source_sheet: spec.source.clone(),
            target_sheet: spec.target_name().to_string(),
            region: spec.parsed_region()?,
            required: role.is_required() && !spec.optional,
            conflict: spec.conflict.unwrap_or(config.conflict),
            state: EntryState::Pending,
        })
    }
}

/// Ordered list of sheets to copy, built before anything is written.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompositionPlan {
    entries: Vec<PlanEntry>,
    /// Entries and sources dropped during validation.
    skipped: Vec<ComposeEvent>,
}

impl CompositionPlan {
    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    pub fn skipped(&self) -> &[ComposeEvent] {
        &self.skipped
    }

    pub fn is_validated(&self) -> bool {
        self.entries
            .iter()
            .all(|e| e.state >= EntryState::Validated)
    }

    pub(crate) fn into_parts(self) -> (Vec<PlanEntry>, Vec<ComposeEvent>) {
        (self.entries, self.skipped)
    }

    /// Dry run: check every entry against the loaded sources without copying.
    ///
    /// A required entry whose sheet is missing aborts at once. Optional entries that
    /// cannot be satisfied are dropped and recorded; with
    /// [`MissingSheetPolicy::Fail`] every missing optional sheet is reported together.
    /// Two entries from the same source writing the same output name, or a collision
    /// on an entry that rejects conflicts, is a defective plan.
    pub fn validate(
        &mut self,
        sources: &Sources,
        policy: MissingSheetPolicy,
    ) -> Result<(), ComposeError> {
        let mut kept: Vec<PlanEntry> = Vec::with_capacity(self.entries.len());
        let mut missing = Vec::new();
        let mut unavailable_reported: Vec<SourceRole> = Vec::new();

        for mut entry in std::mem::take(&mut self.entries) {
            if entry.state >= EntryState::Validated {
                kept.push(entry);
                continue;
            }
            let workbook = match sources.availability(entry.role) {
                Ok(workbook) => workbook,
                Err(reason) if !entry.required => {
                    if !unavailable_reported.contains(&entry.role) {
                        log::info!("{} workbook unavailable, skipping its sheets", entry.role);
                        unavailable_reported.push(entry.role);
                    }
                    self.skip(&entry, reason);
                    continue;
                }
                Err(_) => {
                    return Err(ComposeError::SheetNotFound {
                        role: entry.role,
                        sheet: entry.source_sheet,
                    })
                }
            };

            if workbook.sheet_index(&entry.source_sheet).is_none() {
                if entry.required {
                    return Err(ComposeError::SheetNotFound {
                        role: entry.role,
                        sheet: entry.source_sheet,
                    });
                }
                log::info!(
                    "{} workbook has no sheet {:?}",
                    entry.role,
                    entry.source_sheet
                );
                missing.push(MissingSheet {
                    role: entry.role,
                    sheet: entry.source_sheet.clone(),
                });
                self.skip(&entry, SkipReason::SheetMissing);
                continue;
            }

            if let Some(earlier) = kept
                .iter()
                .find(|e| sheet_name_eq_case_insensitive(&e.target_sheet, &entry.target_sheet))
            {
                if earlier.role == entry.role || entry.conflict == ConflictRule::Reject {
                    return Err(ComposeError::DuplicateSheetName(entry.target_sheet));
                }
            }

            entry.state = EntryState::Validated;
            kept.push(entry);
        }

        if policy == MissingSheetPolicy::Fail && !missing.is_empty() {
            return Err(ComposeError::MissingOptionalSheets(missing));
        }
        self.entries = kept;
        Ok(())
    }

    fn skip(&mut self, entry: &PlanEntry, reason: SkipReason) {
        self.skipped.push(ComposeEvent::EntrySkipped {
            role: entry.role,
            sheet: entry.source_sheet.clone(),
            reason,
        });
    }
}

/// Expands a [`ComposeConfig`] into a [`CompositionPlan`] for concrete sources.
pub struct PlanBuilder<'c> {
    config: &'c ComposeConfig,
}

impl<'c> PlanBuilder<'c> {
    pub fn new(config: &'c ComposeConfig) -> Self {
        Self { config }
    }

    /// Pending entries in output order. [`SheetSelection::All`] lists the source's
    /// sheets in workbook order, or nothing when the source is unavailable.
    pub fn build(&self, sources: &Sources) -> Result<CompositionPlan, ComposeError> {
        let mut plan = CompositionPlan::default();
        for &role in &self.config.order {
            match self.config.selection(role) {
                SheetSelection::None => {}
                SheetSelection::All => {
                    let Some(workbook) = sources.workbook(role) else {
                        continue;
                    };
                    for name in workbook.sheet_names() {
                        plan.entries.push(PlanEntry::from_spec(
                            role,
                            &SheetSpec::named(name),
                            self.config,
                        )?);
                    }
                }
                SheetSelection::Only(specs) => {
                    for spec in specs {
                        plan.entries
                            .push(PlanEntry::from_spec(role, spec, self.config)?);
                    }
                }
            }
        }
        Ok(plan)
    }
}
