use std::fmt;

use serde::{Deserialize, Serialize};
use sheetmerge_model::SheetError;
use sheetmerge_xlsx::{ReadError, XlsxWriteError};
use thiserror::Error;

/// Which input workbook a sheet comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceRole {
    /// Required data workbook (the "consensus" export).
    Primary,
    /// Optional data workbook (the company profile).
    Secondary,
    /// Required workbook whose package flavour and theme the output inherits.
    Template,
}

impl SourceRole {
    pub const ALL: [SourceRole; 3] = [
        SourceRole::Primary,
        SourceRole::Secondary,
        SourceRole::Template,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SourceRole::Primary => "primary",
            SourceRole::Secondary => "secondary",
            SourceRole::Template => "template",
        }
    }

    /// Whether a failure to load this source aborts the whole composition.
    pub fn is_required(self) -> bool {
        !matches!(self, SourceRole::Secondary)
    }
}

impl fmt::Display for SourceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sheet named by the configuration that its source does not contain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingSheet {
    pub role: SourceRole,
    pub sheet: String,
}

impl fmt::Display for MissingSheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{:?}", self.role, self.sheet)
    }
}

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("failed to parse {role} workbook: {source}")]
    Parse {
        role: SourceRole,
        #[source]
        source: ReadError,
    },
    #[error("{role} workbook has no sheet named {sheet:?}")]
    SheetNotFound { role: SourceRole, sheet: String },
    #[error("optional sheets not found: {}", format_missing(.0))]
    MissingOptionalSheets(Vec<MissingSheet>),
    #[error("composition plan writes sheet {0:?} more than once")]
    DuplicateSheetName(String),
    #[error(transparent)]
    Sheet(#[from] SheetError),
    #[error("failed to encode composed workbook: {0}")]
    Encode(#[from] XlsxWriteError),
    #[error("invalid compose configuration: {0}")]
    InvalidConfig(String),
}

fn format_missing(missing: &[MissingSheet]) -> String {
    missing
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl ComposeError {
    /// Parse failure of the input workbook playing `role`.
    pub fn parse(role: SourceRole, source: ReadError) -> Self {
        ComposeError::Parse { role, source }
    }
}
