use std::io::{Cursor, Write};

use pretty_assertions::assert_eq;
use sheetmerge_model::{CellRef, CellValue, FormulaKind, Range, Workbook};
use sheetmerge_xlsx::{load_from_bytes, write_workbook_to_vec, WorkbookKind, WriteOptions};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/worksheets/sheet2.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/><Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/><Override PartName="/docProps/app.xml" ContentType="application/vnd.openxmlformats-officedocument.extended-properties+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties" Target="docProps/app.xml"/><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const APP: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties"><Application>Microsoft Excel</Application></Properties>"#;

const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:mc="http://schemas.openxmlformats.org/markup-compatibility/2006" mc:Ignorable="x15" xmlns:x15="http://schemas.microsoft.com/office/spreadsheetml/2010/11/main"><fileVersion appName="xl" lastEdited="7" lowestEdited="7" rupBuild="27328"/><workbookPr defaultThemeVersion="166925"/><bookViews><workbookView xWindow="-120" yWindow="-120" windowWidth="29040" windowHeight="15840" activeTab="1"/></bookViews><sheets><sheet name="Data" sheetId="1" r:id="rId1"/><sheet name="Summary" sheetId="2" r:id="rId2"/></sheets><calcPr calcId="191029"/></workbook>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet2.xml"/><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId4" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/></Relationships>"#;

const SHARED_STRINGS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="3" uniqueCount="3"><si><r><rPr><b/><sz val="11"/><color theme="1"/><rFont val="Calibri"/><family val="2"/><scheme val="minor"/></rPr><t>Revenue</t></r><r><rPr><sz val="11"/><color theme="1"/><rFont val="Calibri"/><family val="2"/><scheme val="minor"/></rPr><t xml:space="preserve"> (USD m)</t></r></si><si><t>R&amp;D</t><rPh sb="0" eb="3"><t>アールアンドディー</t></rPh></si><si><t>Total</t></si></sst>"#;

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:mc="http://schemas.openxmlformats.org/markup-compatibility/2006" mc:Ignorable="x14ac" xmlns:x14ac="http://schemas.microsoft.com/office/spreadsheetml/2009/9/ac"><numFmts count="1"><numFmt numFmtId="164" formatCode="0.0%"/></numFmts><fonts count="2" x14ac:knownFonts="1"><font><sz val="11"/><color theme="1"/><name val="Calibri"/><family val="2"/><scheme val="minor"/></font><font><b/><sz val="11"/><color theme="1"/><name val="Calibri"/><family val="2"/><scheme val="minor"/></font></fonts><fills count="3"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill><fill><patternFill patternType="solid"><fgColor rgb="FFDDEBF7"/><bgColor indexed="64"/></patternFill></fill></fills><borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders><cellStyleXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/><xf numFmtId="4" fontId="0" fillId="0" borderId="0" applyNumberFormat="0"/></cellStyleXfs><cellXfs count="4"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="14" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/><xf numFmtId="4" fontId="1" fillId="0" borderId="0" xfId="1" applyNumberFormat="1" applyFont="1"/><xf numFmtId="164" fontId="0" fillId="2" borderId="0" xfId="0" applyNumberFormat="1" applyFill="1"/></cellXfs><cellStyles count="2"><cellStyle name="Comma" xfId="1" builtinId="3"/><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles><dxfs count="0"/><tableStyles count="0" defaultTableStyle="TableStyleMedium2" defaultPivotStyle="PivotStyleLight16"/></styleSheet>"#;

const DATA_SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:mc="http://schemas.openxmlformats.org/markup-compatibility/2006" mc:Ignorable="x14ac" xmlns:x14ac="http://schemas.microsoft.com/office/spreadsheetml/2009/9/ac"><dimension ref="A1:C4"/><sheetViews><sheetView workbookViewId="0"/></sheetViews><sheetFormatPr defaultRowHeight="15" x14ac:dyDescent="0.25"/><cols><col min="1" max="16384" width="9.140625" style="2"/></cols><sheetData><row r="1" spans="1:3" x14ac:dyDescent="0.25"><c r="A1" s="3"><v>0.25</v></c><c r="B1" t="s"><v>1</v></c></row><row r="2" spans="1:3" x14ac:dyDescent="0.25"><c r="A2" s="2"><v>10</v></c><c r="B2" s="2"><v>20</v></c><c r="C2" s="2"><v>30</v></c></row><row r="3" spans="1:3" x14ac:dyDescent="0.25"><c r="A3" s="2"><v>1</v></c><c r="B3" s="2"><v>2</v></c><c r="C3" s="2"><v>3</v></c></row><row r="4" spans="1:3" x14ac:dyDescent="0.25"><c r="A4" s="2"><v>5</v></c></row></sheetData><pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/></worksheet>"#;

const SUMMARY_SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:mc="http://schemas.openxmlformats.org/markup-compatibility/2006" mc:Ignorable="x14ac" xmlns:x14ac="http://schemas.microsoft.com/office/spreadsheetml/2009/9/ac"><dimension ref="A1:D7"/><sheetViews><sheetView tabSelected="1" workbookViewId="0"><selection activeCell="B3" sqref="B3"/></sheetView></sheetViews><sheetFormatPr defaultRowHeight="15" x14ac:dyDescent="0.25"/><cols><col min="1" max="1" width="24.7109375" customWidth="1"/></cols><sheetData><row r="1" spans="1:4" x14ac:dyDescent="0.25"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>2</v></c></row><row r="2" spans="1:4" x14ac:dyDescent="0.25"><c r="A2" s="1"><v>45292</v></c><c r="B2" s="2"><f t="shared" ref="B2:B4" si="0">SUM(Data!2:2)</f><v>60</v></c><c r="C2" s="3"><f t="shared" ref="C2:D2" si="1">Data!A2/Data!$A$1</f><v>40</v></c><c r="D2" s="3"><f t="shared" si="1"/><v>80</v></c></row><row r="3" spans="1:4" x14ac:dyDescent="0.25"><c r="A3" s="1"><v>45323</v></c><c r="B3" s="2"><f t="shared" si="0"/><v>6</v></c></row><row r="4" spans="1:4" x14ac:dyDescent="0.25"><c r="A4" s="1"><v>45352</v></c><c r="B4" s="2"><f t="shared" si="0"/><v>5</v></c></row><row r="6" spans="1:4" x14ac:dyDescent="0.25"><c r="A6"><f t="array" ref="A6:A7">{=SUM(Data!A2:C2*2)}</f><v>120</v></c></row></sheetData><pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/></worksheet>"#;

fn excel_package() -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::<()>::default().compression_method(CompressionMethod::Deflated);
    for (name, body) in [
        ("[Content_Types].xml", CONTENT_TYPES),
        ("_rels/.rels", ROOT_RELS),
        ("docProps/app.xml", APP),
        ("xl/workbook.xml", WORKBOOK),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS),
        ("xl/styles.xml", STYLES),
        ("xl/sharedStrings.xml", SHARED_STRINGS),
        ("xl/worksheets/sheet1.xml", DATA_SHEET),
        ("xl/worksheets/sheet2.xml", SUMMARY_SHEET),
    ] {
        zip.start_file(name, options).unwrap();
        zip.write_all(body.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

fn at(a1: &str) -> CellRef {
    CellRef::from_a1(a1).unwrap()
}

fn formula_text(workbook: &Workbook, sheet: &str, a1: &str) -> String {
    workbook
        .sheet_by_name(sheet)
        .unwrap()
        .cell(at(a1))
        .and_then(|c| c.formula.as_ref())
        .map(|f| f.text.clone())
        .unwrap()
}

#[test]
fn decodes_a_package_written_by_excel() {
    let doc = load_from_bytes(&excel_package()).unwrap();
    assert_eq!(doc.kind, WorkbookKind::Workbook);
    let workbook = doc.workbook;
    assert_eq!(workbook.sheet_names(), vec!["Data", "Summary"]);
    assert_eq!(workbook.active_sheet, 1);

    let summary = workbook.sheet_by_name("Summary").unwrap();
    let value = |a1: &str| summary.cell(at(a1)).unwrap().value.clone();
    assert_eq!(value("A1"), CellValue::String("Revenue (USD m)".into()));
    assert_eq!(value("B1"), CellValue::String("Total".into()));
    assert_eq!(
        workbook.sheet_by_name("Data").unwrap().cell(at("B1")).unwrap().value,
        CellValue::String("R&D".into())
    );

    // Shared formulas are expanded per cell, whole-row ranges included.
    assert_eq!(formula_text(&workbook, "Summary", "B2"), "SUM(Data!2:2)");
    assert_eq!(formula_text(&workbook, "Summary", "B3"), "SUM(Data!3:3)");
    assert_eq!(formula_text(&workbook, "Summary", "B4"), "SUM(Data!4:4)");
    assert_eq!(formula_text(&workbook, "Summary", "D2"), "Data!B2/Data!$A$1");

    let array = summary.cell(at("A6")).unwrap().formula.clone().unwrap();
    assert_eq!(array.text, "SUM(Data!A2:C2*2)");
    assert_eq!(
        array.kind,
        FormulaKind::Array {
            range: Range::from_a1("A6:A7").unwrap()
        }
    );

    let style = |a1: &str| {
        workbook
            .styles
            .get(summary.cell(at(a1)).unwrap().style_id)
            .unwrap()
            .clone()
    };
    assert_eq!(style("A2").number_format.as_deref(), Some("mm-dd-yy"));
    assert_eq!(style("A2").font, None);
    assert_eq!(style("B2").number_format.as_deref(), Some("#,##0.00"));
    assert!(style("B2").font.unwrap().bold);
    assert_eq!(style("C2").number_format.as_deref(), Some("0.0%"));
    assert!(style("C2").fill.is_some());
    assert_eq!(value("A2"), CellValue::Number(45292.0));

    let data = workbook.sheet_by_name("Data").unwrap();
    assert_eq!(data.col_props.len(), 16_384);
    let column_style = summary.cell(at("B2")).unwrap().style_id;
    assert!(data
        .col_props
        .values()
        .all(|props| props.style_id == Some(column_style) && props.width.is_none()));
    assert_eq!(summary.col_props[&0].width, Some(24.7109375));
    assert_eq!(summary.view.active_cell, Some(at("B3")));
}

#[test]
fn excel_package_survives_encode_and_decode() {
    let first = load_from_bytes(&excel_package()).unwrap();
    let bytes = write_workbook_to_vec(&first.workbook, &WriteOptions::with_kind(first.kind)).unwrap();
    let second = load_from_bytes(&bytes).unwrap();

    assert_eq!(second.kind, first.kind);
    assert_eq!(second.workbook, first.workbook);
    assert_eq!(formula_text(&second.workbook, "Summary", "B3"), "SUM(Data!3:3)");
}
