//! Worksheet parts (`xl/worksheets/sheetN.xml`).

pub(crate) mod read;
pub(crate) mod write;
