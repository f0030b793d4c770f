use sheetmerge_model::{rewrite_sheet_names_in_formula, sheet_name_eq_case_insensitive, Worksheet};

use crate::report::RewriteDiagnostic;

/// Sheet names that changed during composition: old name -> candidate output names.
///
/// Lookups ignore case, like sheet references in formulas. A name with more than one
/// candidate is ambiguous and is never rewritten.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SheetRenameMap {
    entries: Vec<(String, Vec<String>)>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution<'a> {
    Unchanged,
    Renamed(&'a str),
    Ambiguous(&'a [String]),
}

impl SheetRenameMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that references to `old` may now mean `new`.
    pub fn insert(&mut self, old: impl Into<String>, new: impl Into<String>) {
        let old = old.into();
        let new = new.into();
        match self
            .entries
            .iter_mut()
            .find(|(name, _)| sheet_name_eq_case_insensitive(name, &old))
        {
            Some((_, candidates)) => {
                if !candidates.contains(&new) {
                    candidates.push(new);
                }
            }
            None => self.entries.push((old, vec![new])),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn resolve(&self, name: &str) -> Resolution<'_> {
        let Some((_, candidates)) = self
            .entries
            .iter()
            .find(|(old, _)| sheet_name_eq_case_insensitive(old, name))
        else {
            return Resolution::Unchanged;
        };
        match candidates.as_slice() {
            [only] if only == name => Resolution::Unchanged,
            [only] => Resolution::Renamed(only),
            _ => Resolution::Ambiguous(candidates),
        }
    }
}

/// Rewrite sheet-qualified references in every formula of `sheet`.
///
/// Unqualified references are left alone. Ambiguous names keep their original text
/// and produce one diagnostic per formula location.
pub fn rewrite_sheet_references(
    sheet: &mut Worksheet,
    renames: &SheetRenameMap,
) -> Vec<RewriteDiagnostic> {
    let mut diagnostics: Vec<RewriteDiagnostic> = Vec::new();
    if renames.is_empty() {
        return diagnostics;
    }
    let sheet_name = sheet.name().to_string();

    sheet.for_each_formula_mut(|location, text| {
        let rewritten = rewrite_sheet_names_in_formula(text, |name| match renames.resolve(name) {
            Resolution::Unchanged => None,
            Resolution::Renamed(new) => Some(new.to_string()),
            Resolution::Ambiguous(candidates) => {
                let seen = diagnostics
                    .iter()
                    .any(|d| d.location == location && d.reference == name);
                if !seen {
                    log::warn!(
                        "{sheet_name:?}: reference to {name:?} is ambiguous ({}), left as written",
                        candidates.join(", ")
                    );
                    diagnostics.push(RewriteDiagnostic {
                        sheet: sheet_name.clone(),
                        location,
                        reference: name.to_string(),
                        candidates: candidates.to_vec(),
                    });
                }
                None
            }
        });
        if rewritten != *text {
            *text = rewritten;
        }
    });
    diagnostics
}
