use serde::{Deserialize, Serialize};

use crate::Range;

/// A differential format (`<dxf>`) carried inline with the rule that uses it.
///
/// The payload is the serialized `<dxf>` element. Keeping it by value (rather than as an
/// index into a workbook-level table) lets rules move between workbooks without fixups;
/// the writer deduplicates identical payloads into `styles.xml`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DifferentialFormat {
    pub xml: String,
}

/// One `<cfRule>`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CfRule {
    /// SpreadsheetML rule type (`cellIs`, `expression`, `colorScale`, ...).
    pub rule_type: String,
    pub priority: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(default)]
    pub stop_if_true: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dxf: Option<DifferentialFormat>,
    /// `<formula>` children, canonical text without `=`.
    #[serde(default)]
    pub formulas: Vec<String>,
    /// Remaining rule attributes (`text`, `rank`, `timePeriod`, ...), in document order.
    #[serde(default)]
    pub attributes: Vec<(String, String)>,
    /// Non-formula children (`colorScale`, `dataBar`, `iconSet`, `extLst`) as serialized XML.
    #[serde(default)]
    pub extra_xml: Vec<String>,
}

/// A `<conditionalFormatting>` block: a set of rules sharing the same target ranges.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionalFormatting {
    pub ranges: Vec<Range>,
    #[serde(default)]
    pub pivot: bool,
    pub rules: Vec<CfRule>,
}

impl ConditionalFormatting {
    /// True when every target range lies inside `region`.
    pub fn is_within(&self, region: &Range) -> bool {
        !self.ranges.is_empty() && self.ranges.iter().all(|r| region.contains_range(r))
    }
}
