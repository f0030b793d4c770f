//! Composition settings: well-known sheet names, source order, policies and the patch
//! table. Loaded from JSON; [`ComposeConfig::default`] describes the DCF workbook
//! assembled from a consensus export, a company profile and the model template.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sheetmerge_model::{validate_sheet_name, Range};

use crate::error::{ComposeError, SourceRole};
use crate::patch::{CellOffset, LabelMatch, PatchOp, SheetPatch, StampValue};

pub const DEFAULT_TEMPLATE_SHEET: &str = "DCF Model";
pub const DEFAULT_SECONDARY_SHEET: &str = "Public Company";
pub const DEFAULT_STAMP_LABEL: &str = "Valuation Date";
pub const DEFAULT_DATE_FORMAT: &str = "yyyy-mm-dd";

/// What happens when a valid optional workbook lacks a configured sheet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingSheetPolicy {
    /// Drop the entry, record it in the report and keep composing.
    #[default]
    Skip,
    /// Abort, listing every missing optional sheet.
    Fail,
}

/// How legacy CSE array formulas are carried into the output.
///
/// Either way the stored text never carries the `{=...}` display wrapper.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrayFormulaPolicy {
    /// Keep the array kind when its whole result range is copied.
    #[default]
    Preserve,
    /// Demote to a normal formula on the anchor cell.
    Flatten,
}

/// What to do when an entry targets a sheet name another source already wrote.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictRule {
    /// Remove the earlier sheet and record the replacement (last writer wins).
    #[default]
    Replace,
    /// Treat the collision as a defective plan.
    Reject,
}

/// One sheet to pull from a source.
///
/// Deserializes from a bare sheet name or from an object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SheetSpecRepr")]
pub struct SheetSpec {
    pub source: String,
    /// Output name; defaults to `source`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// A1 bound on the copied cells, e.g. `"A1:H60"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Optional entries are skipped instead of aborting when they cannot be copied.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict: Option<ConflictRule>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SheetSpecRepr {
    Name(String),
    Full {
        source: String,
        #[serde(default)]
        target: Option<String>,
        #[serde(default)]
        region: Option<String>,
        #[serde(default)]
        optional: bool,
        #[serde(default)]
        conflict: Option<ConflictRule>,
    },
}

impl From<SheetSpecRepr> for SheetSpec {
    fn from(repr: SheetSpecRepr) -> Self {
        match repr {
            SheetSpecRepr::Name(source) => SheetSpec::named(source),
            SheetSpecRepr::Full {
                source,
                target,
                region,
                optional,
                conflict,
            } => SheetSpec {
                source,
                target,
                region,
                optional,
                conflict,
            },
        }
    }
}

impl SheetSpec {
    pub fn named(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: None,
            region: None,
            optional: false,
            conflict: None,
        }
    }

    pub fn renamed(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            ..Self::named(source)
        }
    }

    pub fn target_name(&self) -> &str {
        self.target.as_deref().unwrap_or(&self.source)
    }

    pub fn parsed_region(&self) -> Result<Option<Range>, ComposeError> {
        self.region
            .as_deref()
            .map(|a1| {
                Range::from_a1(a1).map_err(|err| {
                    ComposeError::InvalidConfig(format!(
                        "region {a1:?} for sheet {:?}: {err}",
                        self.source
                    ))
                })
            })
            .transpose()
    }
}

/// Which sheets a source contributes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetSelection {
    /// Every sheet, in workbook order, under its own name.
    #[default]
    All,
    Only(Vec<SheetSpec>),
    None,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ComposeConfig {
    /// Output order of the sources. Roles left out contribute nothing.
    pub order: Vec<SourceRole>,
    pub primary: SheetSelection,
    pub secondary: SheetSelection,
    pub template: SheetSelection,
    pub missing_sheet_policy: MissingSheetPolicy,
    pub array_formulas: ArrayFormulaPolicy,
    /// Default for entries without their own `conflict`.
    pub conflict: ConflictRule,
    /// Sheet names that formulas use for "the sheet contributed by this source",
    /// e.g. a template that refers to `Consensus` for whatever the uploaded
    /// primary sheet is called.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub formula_aliases: BTreeMap<String, SourceRole>,
    pub patches: Vec<SheetPatch>,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            order: vec![
                SourceRole::Primary,
                SourceRole::Secondary,
                SourceRole::Template,
            ],
            primary: SheetSelection::All,
            secondary: SheetSelection::Only(vec![SheetSpec::named(DEFAULT_SECONDARY_SHEET)]),
            template: SheetSelection::Only(vec![SheetSpec::named(DEFAULT_TEMPLATE_SHEET)]),
            missing_sheet_policy: MissingSheetPolicy::default(),
            array_formulas: ArrayFormulaPolicy::default(),
            conflict: ConflictRule::default(),
            formula_aliases: BTreeMap::new(),
            patches: vec![SheetPatch {
                sheet: DEFAULT_TEMPLATE_SHEET.to_string(),
                ops: vec![
                    PatchOp::StampLabel {
                        label: LabelMatch::Contains(DEFAULT_STAMP_LABEL.to_string()),
                        offset: CellOffset { rows: 0, cols: 2 },
                        value: StampValue::Today,
                        number_format: Some(DEFAULT_DATE_FORMAT.to_string()),
                    },
                    PatchOp::ShowGridLines(false),
                ],
            }],
        }
    }
}

impl ComposeConfig {
    pub fn from_json(json: &str) -> Result<Self, ComposeError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|err| ComposeError::InvalidConfig(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn selection(&self, role: SourceRole) -> &SheetSelection {
        match role {
            SourceRole::Primary => &self.primary,
            SourceRole::Secondary => &self.secondary,
            SourceRole::Template => &self.template,
        }
    }

    /// Static checks that need no input workbook.
    pub fn validate(&self) -> Result<(), ComposeError> {
        for (i, role) in self.order.iter().enumerate() {
            if self.order[..i].contains(role) {
                return Err(ComposeError::InvalidConfig(format!(
                    "source {role} appears more than once in `order`"
                )));
            }
        }
        for role in SourceRole::ALL {
            if role.is_required() && !self.order.contains(&role) {
                return Err(ComposeError::InvalidConfig(format!(
                    "required source {role} is missing from `order`"
                )));
            }
            if let SheetSelection::Only(specs) = self.selection(role) {
                for spec in specs {
                    spec.parsed_region()?;
                    validate_sheet_name(spec.target_name()).map_err(|err| {
                        ComposeError::InvalidConfig(format!(
                            "target name {:?}: {err}",
                            spec.target_name()
                        ))
                    })?;
                }
            }
        }
        for patch in &self.patches {
            for op in &patch.ops {
                op.validate()?;
            }
        }
        Ok(())
    }
}
