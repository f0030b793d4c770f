use serde::{Deserialize, Serialize};

use crate::Range;

/// Where a hyperlink points.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HyperlinkTarget {
    /// External URI stored in the worksheet relationships part.
    ExternalUrl { uri: String },
    /// In-workbook location such as `'Summary'!A1` or a defined name.
    Internal { location: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hyperlink {
    /// Cell (or cells) the link is attached to.
    pub range: Range,
    pub target: HyperlinkTarget,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
}
