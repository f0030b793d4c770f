//! XLSX/XLSM package codec for [`sheetmerge_model::Workbook`].
//!
//! - [`Package`]: the OPC ZIP container, fully inflated (part name -> bytes) with
//!   bounded reads. Opaque payloads such as `xl/vbaProject.bin` are kept byte-for-byte.
//! - [`load_from_bytes`]/[`read_workbook_from_bytes`]: decode a package into the
//!   model, reporting which [`WorkbookKind`] it was stored as.
//! - [`write_workbook_to_vec`]/[`write_workbook_to_writer`]: encode a model as a
//!   fresh package. Styles, shared strings and relationship ids are regenerated
//!   deterministically, so encoding the same workbook twice yields identical parts.

pub mod comments;
mod package;
mod read;
pub mod relationships;
pub mod shared_strings;
pub mod styles;
mod worksheet;
mod write;
pub mod xml;

pub use package::{
    rels_for_part, resolve_target, Package, PackageError, PackageLimits, WorkbookKind,
    DEFAULT_MAX_PART_BYTES, DEFAULT_MAX_TOTAL_BYTES, MACRO_WORKBOOK_CONTENT_TYPE,
    VBA_PROJECT_CONTENT_TYPE, WORKBOOK_CONTENT_TYPE,
};
pub use read::{
    load_from_bytes, load_from_package, load_from_reader, read_workbook_from_bytes,
    read_workbook_from_reader, ReadError, XlsxDocument,
};
pub use write::{write_workbook_to_vec, write_workbook_to_writer, WriteOptions, XlsxWriteError};
