use serde::{Deserialize, Serialize};

use crate::CellRef;

/// A legacy cell note (`xl/commentsN.xml`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub cell: CellRef,
    #[serde(default)]
    pub author: String,
    /// Plain text of the note; rich-text runs are flattened.
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub visible: bool,
}
