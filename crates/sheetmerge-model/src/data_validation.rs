use serde::{Deserialize, Serialize};

use crate::Range;

ooxml_enum! {
    /// What kind of input a validation accepts.
    pub enum DataValidationKind {
        Any => "none",
        Whole => "whole",
        Decimal => "decimal",
        List => "list",
        Date => "date",
        Time => "time",
        TextLength => "textLength",
        Custom => "custom",
    }
}

impl Default for DataValidationKind {
    fn default() -> Self {
        DataValidationKind::Any
    }
}

ooxml_enum! {
    pub enum DataValidationOperator {
        Between => "between",
        NotBetween => "notBetween",
        Equal => "equal",
        NotEqual => "notEqual",
        GreaterThan => "greaterThan",
        LessThan => "lessThan",
        GreaterThanOrEqual => "greaterThanOrEqual",
        LessThanOrEqual => "lessThanOrEqual",
    }
}

ooxml_enum! {
    pub enum DataValidationErrorStyle {
        Stop => "stop",
        Warning => "warning",
        Information => "information",
    }
}

/// A `<dataValidation>` rule and the ranges it applies to.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataValidation {
    pub ranges: Vec<Range>,
    #[serde(default)]
    pub kind: DataValidationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<DataValidationOperator>,
    /// Formula text without a leading `=` (list sources may be a quoted literal list).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula2: Option<String>,
    #[serde(default)]
    pub allow_blank: bool,
    #[serde(default)]
    pub show_input_message: bool,
    #[serde(default)]
    pub show_error_message: bool,
    /// SpreadsheetML's inverted `showDropDown` flag: `true` hides the in-cell list arrow.
    #[serde(default)]
    pub suppress_drop_down: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_style: Option<DataValidationErrorStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

impl DataValidation {
    /// True when every range lies inside `region`.
    pub fn is_within(&self, region: &Range) -> bool {
        !self.ranges.is_empty() && self.ranges.iter().all(|r| region.contains_range(r))
    }
}
