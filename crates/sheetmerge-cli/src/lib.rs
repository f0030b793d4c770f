//! The `sheetmerge` command line: compose, dry-run check, and inspect workbooks.

pub mod cli;
