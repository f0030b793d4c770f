use pretty_assertions::assert_eq;
use sheetmerge_model::{
    Border, BorderEdge, BorderStyle, CellRef, CellValue, Color, Fill, Font, Formula, Range, Style,
    Workbook,
};

#[test]
fn workbook_survives_a_json_roundtrip() {
    let mut wb = Workbook::new();
    let style_id = wb.intern_style(Style {
        font: Some(Font {
            bold: true,
            color: Some(Color::argb(0xFF1F4E79)),
            ..Font::default()
        }),
        fill: Some(Fill::solid(Color::Theme {
            theme: 4,
            tint: Some(0.3999.into()),
        })),
        border: Some(Border {
            bottom: BorderEdge {
                style: BorderStyle::Double,
                color: None,
            },
            ..Border::default()
        }),
        number_format: Some("#,##0.00".to_string()),
        ..Style::default()
    });

    let sheet = wb.add_sheet("Model").unwrap();
    sheet.set_value(CellRef::new(0, 0), "Revenue");
    sheet.set_style_id(CellRef::new(0, 0), style_id);
    sheet.set_formula(CellRef::new(1, 1), Formula::new("='Primary'!A1*2"));
    sheet.merge_range(Range::from_a1("A3:C3").unwrap()).unwrap();
    sheet.view.show_grid_lines = false;
    sheet.row_props.entry(0).or_default().height = Some(24.0);

    let json = serde_json::to_string(&wb).unwrap();
    let back: Workbook = serde_json::from_str(&json).unwrap();
    assert_eq!(back, wb);

    let model = back.sheet_by_name("Model").unwrap();
    assert_eq!(
        model.cell(CellRef::new(0, 0)).map(|c| &c.value),
        Some(&CellValue::String("Revenue".to_string()))
    );
    assert_eq!(back.styles.get(style_id), wb.styles.get(style_id));
}
