use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use chrono::{Local, NaiveDateTime};
use sheetmerge_model::{StyleTable, Workbook};

use crate::config::ComposeConfig;
use crate::copier::{CopyOptions, SheetCopier};
use crate::error::{ComposeError, SourceRole};
use crate::patch::apply_patches;
use crate::plan::{CompositionPlan, EntryState, PlanBuilder, PlanEntry};
use crate::report::{ComposeEvent, ComposeReport, EntryOutcome};
use crate::rewrite::{rewrite_sheet_references, SheetRenameMap};
use crate::sources::Sources;

/// The composed workbook, not yet encoded.
#[derive(Clone, Debug, PartialEq)]
pub struct Composition {
    pub workbook: Workbook,
    pub report: ComposeReport,
}

/// An output sheet and the plan entry that wrote it.
struct Owner {
    sheet: String,
    entry: usize,
    role: SourceRole,
}

/// Runs a [`CompositionPlan`] against loaded [`Sources`].
///
/// The output inherits the template's base font, date system, theme and VBA
/// project. Sources are only read.
pub struct Composer<'c> {
    config: &'c ComposeConfig,
    now: NaiveDateTime,
}

impl<'c> Composer<'c> {
    pub fn new(config: &'c ComposeConfig) -> Self {
        Self {
            config,
            now: Local::now().naive_local(),
        }
    }

    /// Pin the clock used by date-producing patches.
    pub fn at(mut self, now: NaiveDateTime) -> Self {
        self.now = now;
        self
    }

    /// Build and validate a plan without copying anything.
    pub fn plan(&self, sources: &Sources) -> Result<CompositionPlan, ComposeError> {
        let mut plan = PlanBuilder::new(self.config).build(sources)?;
        plan.validate(sources, self.config.missing_sheet_policy)?;
        Ok(plan)
    }

    /// Copy every entry in plan order, then rewrite renamed sheet references and
    /// apply the patch table. Any error discards the partial output.
    pub fn compose(
        &self,
        mut plan: CompositionPlan,
        sources: &Sources,
    ) -> Result<Composition, ComposeError> {
        if !plan.is_validated() {
            plan.validate(sources, self.config.missing_sheet_policy)?;
        }
        let (mut entries, skipped) = plan.into_parts();
        let mut report = ComposeReport {
            events: skipped,
            ..ComposeReport::default()
        };

        let template = sources.template();
        let mut output = Workbook::new();
        output.styles = StyleTable::with_base_font(template.styles.base_font.clone());
        output.date_system = template.date_system;
        output.theme = template.theme.clone();
        output.vba_project = template.vba_project.clone();

        for role in [SourceRole::Primary, SourceRole::Secondary] {
            let contributes = entries.iter().any(|e| e.role == role);
            let has_macros = sources
                .workbook(role)
                .is_some_and(|w| w.vba_project.is_some());
            if contributes && has_macros {
                log::info!("{role} workbook carries a VBA project that is not copied");
                report.events.push(ComposeEvent::MacrosDropped { role });
            }
        }

        let owners = self.copy_entries(&mut entries, sources, &mut output, &mut report)?;

        let renames = self.rename_maps(&entries, &owners);
        for owner in &owners {
            let Some(map) = renames.get(&owner.role) else {
                continue;
            };
            let sheet = output.sheet_by_name_mut(&owner.sheet)?;
            report
                .diagnostics
                .extend(rewrite_sheet_references(sheet, map));
        }

        report
            .events
            .extend(apply_patches(&mut output, &self.config.patches, self.now)?);
        for owner in &owners {
            entries[owner.entry].state = EntryState::Patched;
        }

        report.entries = entries
            .into_iter()
            .map(|e| EntryOutcome {
                role: e.role,
                source_sheet: e.source_sheet,
                target_sheet: e.target_sheet,
                state: e.state,
            })
            .collect();
        log::info!(
            "composed {} sheets ({} events, {} rewrite diagnostics)",
            output.sheet_count(),
            report.events.len(),
            report.diagnostics.len()
        );
        Ok(Composition {
            workbook: output,
            report,
        })
    }

    /// Copy phase. Returns the surviving output sheets in output order.
    fn copy_entries(
        &self,
        entries: &mut [PlanEntry],
        sources: &Sources,
        output: &mut Workbook,
        report: &mut ComposeReport,
    ) -> Result<Vec<Owner>, ComposeError> {
        let mut owners: Vec<Owner> = Vec::new();
        let mut copiers: BTreeMap<SourceRole, SheetCopier<'_>> = BTreeMap::new();

        for (idx, entry) in entries.iter_mut().enumerate() {
            if let Some(existing) = output.conflicting_sheet_index(&entry.target_sheet) {
                let existing_name = output
                    .sheet(existing)
                    .map(|s| s.name().to_string())
                    .unwrap_or_default();
                output.remove_sheet(&existing_name)?;
                let replaced = owners
                    .iter()
                    .position(|o| o.sheet == existing_name)
                    .map(|pos| owners.remove(pos));
                let replaced_role = replaced.map_or(entry.role, |o| o.role);
                log::info!(
                    "{existing_name:?} from the {replaced_role} workbook replaced by the {} workbook's {:?}",
                    entry.role,
                    entry.source_sheet
                );
                report.events.push(ComposeEvent::SheetReplaced {
                    sheet: existing_name,
                    replaced: replaced_role,
                    by: entry.role,
                });
            }

            let copier = match copiers.entry(entry.role) {
                Entry::Occupied(slot) => slot.into_mut(),
                Entry::Vacant(slot) => {
                    let source = sources.workbook(entry.role).ok_or_else(|| {
                        ComposeError::SheetNotFound {
                            role: entry.role,
                            sheet: entry.source_sheet.clone(),
                        }
                    })?;
                    slot.insert(SheetCopier::new(source))
                }
            };
            let options = CopyOptions {
                region: entry.region,
                array_formulas: self.config.array_formulas,
            };
            copier.copy(&entry.source_sheet, output, &entry.target_sheet, &options)?;
            entry.state = EntryState::Copied;
            owners.push(Owner {
                sheet: entry.target_sheet.clone(),
                entry: idx,
                role: entry.role,
            });
        }
        Ok(owners)
    }

    /// Per source: the output names its sheet references may now mean. Every
    /// surviving entry maps its source name to its output name; configured aliases
    /// map to every output sheet of their source.
    fn rename_maps(
        &self,
        entries: &[PlanEntry],
        owners: &[Owner],
    ) -> BTreeMap<SourceRole, SheetRenameMap> {
        let mut maps: BTreeMap<SourceRole, SheetRenameMap> = BTreeMap::new();
        for owner in owners {
            let entry = &entries[owner.entry];
            maps.entry(owner.role)
                .or_default()
                .insert(entry.source_sheet.as_str(), entry.target_sheet.as_str());
        }
        for (alias, alias_role) in &self.config.formula_aliases {
            let targets: Vec<&str> = owners
                .iter()
                .filter(|o| o.role == *alias_role)
                .map(|o| o.sheet.as_str())
                .collect();
            for role in SourceRole::ALL {
                let map = maps.entry(role).or_default();
                for target in &targets {
                    map.insert(alias.as_str(), *target);
                }
            }
        }
        maps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use sheetmerge_model::{CellRef, CellValue, Formula, FormulaLocation};
    use sheetmerge_xlsx::WorkbookKind;

    use crate::config::{SheetSelection, SheetSpec};
    use crate::report::RewriteDiagnostic;
    use crate::sources::OptionalSource;

    fn at(a1: &str) -> CellRef {
        CellRef::from_a1(a1).unwrap()
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_opt(9, 15, 0)
            .unwrap()
    }

    fn template() -> Workbook {
        let mut workbook = Workbook::new();
        let model = workbook.add_sheet("DCF Model").unwrap();
        model.set_formula(at("B2"), Formula::new("=Consensus!B2*2"));
        model.set_formula(at("B3"), Formula::new("='Public Company'!A1"));
        model.set_value(at("A10"), "Valuation Date");
        workbook.add_sheet("Consensus").unwrap().set_value(at("A1"), "placeholder");
        workbook
    }

    fn primary() -> Workbook {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_sheet("Estimates").unwrap();
        sheet.set_value(at("B2"), 250.0);
        workbook.add_sheet("Prices").unwrap().set_value(at("A1"), 10.0);
        workbook
    }

    fn profile() -> Workbook {
        let mut workbook = Workbook::new();
        workbook
            .add_sheet("Public Company")
            .unwrap()
            .set_value(at("A1"), "ACME");
        workbook.vba_project = Some(b"vba".to_vec());
        workbook
    }

    fn sources(secondary: OptionalSource) -> Sources {
        Sources::new(template(), WorkbookKind::Workbook, primary(), secondary)
    }

    fn compose(config: &ComposeConfig, sources: &Sources) -> Composition {
        let composer = Composer::new(config).at(now());
        let plan = composer.plan(sources).unwrap();
        composer.compose(plan, sources).unwrap()
    }

    #[test]
    fn default_plan_composes_and_patches_the_model() {
        let config = ComposeConfig::default();
        let sources = sources(OptionalSource::Loaded(profile()));
        let Composition { workbook, report } = compose(&config, &sources);

        assert_eq!(
            workbook.sheet_names(),
            vec!["Estimates", "Prices", "Public Company", "DCF Model"]
        );
        let model = workbook.sheet_by_name("DCF Model").unwrap();
        assert_eq!(
            model.cell(at("C10")).unwrap().value,
            CellValue::DateTime(
                NaiveDate::from_ymd_opt(2025, 3, 14)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap()
            )
        );
        assert!(!model.view.show_grid_lines);
        assert!(report
            .entries
            .iter()
            .all(|e| e.state == EntryState::Patched));
        assert!(report
            .events
            .contains(&ComposeEvent::MacrosDropped { role: SourceRole::Secondary }));
        assert_eq!(workbook.vba_project, None);
    }

    #[test]
    fn later_entries_replace_earlier_sheets() {
        let config = ComposeConfig {
            template: SheetSelection::Only(vec![
                SheetSpec::named("DCF Model"),
                SheetSpec::renamed("Consensus", "prices"),
            ]),
            ..ComposeConfig::default()
        };
        let sources = sources(OptionalSource::Absent);
        let Composition { workbook, report } = compose(&config, &sources);

        assert_eq!(workbook.sheet_names(), vec!["Estimates", "DCF Model", "prices"]);
        assert_eq!(
            workbook.sheet_by_name("prices").unwrap().cell(at("A1")).unwrap().value,
            CellValue::String("placeholder".to_string())
        );
        assert_eq!(
            report.replacements().collect::<Vec<_>>(),
            vec![&ComposeEvent::SheetReplaced {
                sheet: "Prices".to_string(),
                replaced: SourceRole::Primary,
                by: SourceRole::Template,
            }]
        );
        let replaced = report
            .entries
            .iter()
            .find(|e| e.source_sheet == "Prices")
            .unwrap();
        assert_eq!(replaced.state, EntryState::Copied);
    }

    #[test]
    fn aliases_point_template_formulas_at_the_uploaded_sheet() {
        let mut config = ComposeConfig {
            primary: SheetSelection::Only(vec![SheetSpec::named("Estimates")]),
            ..ComposeConfig::default()
        };
        config
            .formula_aliases
            .insert("Consensus".to_string(), SourceRole::Primary);
        let sources = sources(OptionalSource::Absent);
        let Composition { workbook, report } = compose(&config, &sources);

        let model = workbook.sheet_by_name("DCF Model").unwrap();
        assert_eq!(
            model.cell(at("B2")).unwrap().formula,
            Some(Formula::new("Estimates!B2*2"))
        );
        assert_eq!(
            model.cell(at("B3")).unwrap().formula,
            Some(Formula::new("'Public Company'!A1"))
        );
        assert!(report.diagnostics.is_empty());
        assert_eq!(report.skipped().count(), 1);
    }

    #[test]
    fn ambiguous_aliases_are_reported_not_guessed() {
        let mut config = ComposeConfig::default();
        config
            .formula_aliases
            .insert("Consensus".to_string(), SourceRole::Primary);
        let sources = sources(OptionalSource::Absent);
        let Composition { workbook, report } = compose(&config, &sources);

        let model = workbook.sheet_by_name("DCF Model").unwrap();
        assert_eq!(
            model.cell(at("B2")).unwrap().formula,
            Some(Formula::new("Consensus!B2*2"))
        );
        assert_eq!(
            report.diagnostics,
            vec![RewriteDiagnostic {
                sheet: "DCF Model".to_string(),
                location: FormulaLocation::Cell(at("B2")),
                reference: "Consensus".to_string(),
                candidates: vec!["Estimates".to_string(), "Prices".to_string()],
            }]
        );
    }

    #[test]
    fn template_settings_carry_into_the_output() {
        let mut template = template();
        template.date_system = sheetmerge_model::DateSystem::Excel1904;
        template.vba_project = Some(b"template macros".to_vec());
        template.theme = Some(b"<a:theme/>".to_vec());
        let sources = Sources::new(
            template,
            WorkbookKind::MacroEnabledWorkbook,
            primary(),
            OptionalSource::Absent,
        );
        let Composition { workbook, .. } = compose(&ComposeConfig::default(), &sources);

        assert_eq!(workbook.date_system, sheetmerge_model::DateSystem::Excel1904);
        assert_eq!(workbook.vba_project.as_deref(), Some(&b"template macros"[..]));
        assert_eq!(workbook.theme.as_deref(), Some(&b"<a:theme/>"[..]));
    }
}
