use std::io::{Cursor, Write};

use pretty_assertions::assert_eq;
use sheetmerge_model::{CellRef, Workbook};
use sheetmerge_xlsx::{
    load_from_bytes, write_workbook_to_vec, Package, ReadError, WorkbookKind, WriteOptions,
};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const VBA_BLOB: &[u8] = b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1not-really-a-cfb";

fn workbook_with_macros() -> Workbook {
    let mut workbook = Workbook::new();
    workbook
        .add_sheet("Macros")
        .unwrap()
        .set_value(CellRef::new(0, 0), "run me");
    workbook.vba_project = Some(VBA_BLOB.to_vec());
    workbook
}

#[test]
fn macro_variant_keeps_the_vba_blob_byte_for_byte() {
    let bytes = write_workbook_to_vec(
        &workbook_with_macros(),
        &WriteOptions::with_kind(WorkbookKind::MacroEnabledWorkbook),
    )
    .unwrap();

    let doc = load_from_bytes(&bytes).unwrap();
    assert_eq!(doc.kind, WorkbookKind::MacroEnabledWorkbook);
    assert_eq!(doc.workbook.vba_project.as_deref(), Some(VBA_BLOB));

    let package = Package::from_bytes(&bytes).unwrap();
    let rels = std::str::from_utf8(package.part("xl/_rels/workbook.xml.rels").unwrap()).unwrap();
    assert!(rels.contains("relationships/vbaProject"), "{rels}");
}

#[test]
fn plain_variant_drops_the_vba_blob() {
    let bytes = write_workbook_to_vec(
        &workbook_with_macros(),
        &WriteOptions::with_kind(WorkbookKind::Workbook),
    )
    .unwrap();

    let doc = load_from_bytes(&bytes).unwrap();
    assert_eq!(doc.kind, WorkbookKind::Workbook);
    assert_eq!(doc.workbook.vba_project, None);
    assert!(Package::from_bytes(&bytes)
        .unwrap()
        .part("xl/vbaProject.bin")
        .is_none());
}

#[test]
fn unspecified_kind_follows_the_vba_payload() {
    let bytes = write_workbook_to_vec(&workbook_with_macros(), &WriteOptions::default()).unwrap();
    assert_eq!(
        load_from_bytes(&bytes).unwrap().kind,
        WorkbookKind::MacroEnabledWorkbook
    );
}

#[test]
fn non_spreadsheet_inputs_are_parse_errors() {
    let err = load_from_bytes(b"definitely not a zip").unwrap_err();
    assert!(matches!(err, ReadError::Package(_)), "{err}");

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::<()>::default().compression_method(CompressionMethod::Deflated);
    zip.start_file("word/document.xml", options).unwrap();
    zip.write_all(b"<document/>").unwrap();
    let bytes = zip.finish().unwrap().into_inner();
    let err = load_from_bytes(&bytes).unwrap_err();
    assert!(matches!(err, ReadError::NotASpreadsheet(_)), "{err}");
}
