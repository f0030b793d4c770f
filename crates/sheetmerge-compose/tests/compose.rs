use chrono::{NaiveDate, NaiveDateTime};
use pretty_assertions::assert_eq;
use sheetmerge_compose::{
    compose_packages_at, ComposeConfig, ComposeError, ComposeEvent, ComposeInputs,
    ComposeOutput, MissingSheet, MissingSheetPolicy, PatchOp, SheetPatch, SheetSelection,
    SheetSpec, SkipReason, SourceRole, Template,
};
use sheetmerge_model::{
    CellRef, CellValue, Color, DateSystem, Fill, Formula, Range, Style, Workbook,
};
use sheetmerge_xlsx::{
    load_from_bytes, read_workbook_from_bytes, write_workbook_to_vec, Package, ReadError,
    WorkbookKind, WriteOptions,
};

fn at(a1: &str) -> CellRef {
    CellRef::from_a1(a1).unwrap()
}

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 11, 5)
        .unwrap()
        .and_hms_opt(16, 45, 0)
        .unwrap()
}

fn today_serial() -> f64 {
    DateSystem::Excel1900.to_serial(now().date().and_hms_opt(0, 0, 0).unwrap())
}

fn encode(workbook: &Workbook) -> Vec<u8> {
    write_workbook_to_vec(workbook, &WriteOptions::default()).unwrap()
}

fn dcf_template() -> Workbook {
    let mut workbook = Workbook::new();
    let model = workbook.add_sheet("DCF Model").unwrap();
    model.set_formula(at("B4"), Formula::new("=SUM(Estimates!B2:B5)"));
    model.set_value(at("A12"), "Valuation Date");
    model.merge_range(Range::from_a1("A1:D1").unwrap()).unwrap();
    workbook.add_sheet("Scratch").unwrap();
    workbook
}

fn consensus() -> Workbook {
    let mut workbook = Workbook::new();
    let header = workbook.intern_style(Style {
        fill: Some(Fill::solid(Color::argb(0xFF1F4E78))),
        ..Style::default()
    });
    let money = workbook.intern_style(Style {
        number_format: Some("#,##0.00".to_string()),
        ..Style::default()
    });
    let estimates = workbook.add_sheet("Estimates").unwrap();
    estimates.set_value(at("A1"), "Metric");
    estimates.set_style_id(at("A1"), header);
    for row in 1..5 {
        estimates.set_value(CellRef::new(row, 1), f64::from(row) * 100.0);
        estimates.set_style_id(CellRef::new(row, 1), money);
    }
    workbook
        .add_sheet("Prices")
        .unwrap()
        .set_value(at("A1"), 42.5);
    workbook
}

fn profile() -> Workbook {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_sheet("Public Company").unwrap();
    sheet.set_value(at("A1"), "Ticker");
    sheet.set_value(at("B1"), "ACME");
    workbook
}

fn run(
    template: &Template,
    primary: &[u8],
    secondary: Option<&[u8]>,
    config: &ComposeConfig,
) -> Result<ComposeOutput, ComposeError> {
    compose_packages_at(
        &ComposeInputs {
            template,
            primary,
            secondary,
        },
        config,
        now(),
    )
}

#[test]
fn valuation_date_is_stamped_and_references_are_kept() {
    let mut template = Workbook::new();
    let model = template.add_sheet("Model").unwrap();
    model.set_formula(at("B2"), Formula::new("='Primary'!A1*2"));
    model.set_value(at("A10"), "Valuation Date");
    let mut primary = Workbook::new();
    primary.add_sheet("Primary").unwrap().set_value(at("A1"), 100.0);

    let config = ComposeConfig {
        template: SheetSelection::Only(vec![SheetSpec::named("Model")]),
        patches: vec![SheetPatch {
            sheet: "Model".to_string(),
            ..ComposeConfig::default().patches.remove(0)
        }],
        ..ComposeConfig::default()
    };
    let output = run(
        &Template::new(encode(&template)),
        &encode(&primary),
        None,
        &config,
    )
    .unwrap();

    let workbook = read_workbook_from_bytes(&output.bytes).unwrap();
    assert_eq!(workbook.sheet_names(), vec!["Primary", "Model"]);
    let model = workbook.sheet_by_name("Model").unwrap();
    assert_eq!(
        model.cell(at("B2")).unwrap().formula,
        Some(Formula::new("'Primary'!A1*2"))
    );
    let stamped = model.cell(at("C10")).unwrap();
    assert_eq!(stamped.value, CellValue::Number(today_serial()));
    assert_eq!(
        workbook
            .styles
            .get(stamped.style_id)
            .unwrap()
            .number_format
            .as_deref(),
        Some("yyyy-mm-dd")
    );
    assert!(!model.view.show_grid_lines);
    assert!(output.report.diagnostics.is_empty());
}

#[test]
fn default_configuration_builds_the_dcf_workbook() {
    let output = run(
        &Template::new(encode(&dcf_template())),
        &encode(&consensus()),
        Some(&encode(&profile())),
        &ComposeConfig::default(),
    )
    .unwrap();

    assert_eq!(output.kind, WorkbookKind::Workbook);
    let workbook = read_workbook_from_bytes(&output.bytes).unwrap();
    assert_eq!(
        workbook.sheet_names(),
        vec!["Estimates", "Prices", "Public Company", "DCF Model"]
    );
    let model = workbook.sheet_by_name("DCF Model").unwrap();
    assert_eq!(
        model.merges.iter().copied().collect::<Vec<_>>(),
        vec![Range::from_a1("A1:D1").unwrap()]
    );
    assert_eq!(
        model.cell(at("C12")).unwrap().value,
        CellValue::Number(today_serial())
    );

    let source = consensus();
    let estimates = workbook.sheet_by_name("Estimates").unwrap();
    for (cell_ref, cell) in source.sheet_by_name("Estimates").unwrap().iter_cells() {
        let copied = estimates.cell(cell_ref).unwrap();
        assert_eq!(copied.value, cell.value);
        assert_eq!(
            workbook.styles.get(copied.style_id),
            source.styles.get(cell.style_id),
            "style of {cell_ref}"
        );
    }
}

#[test]
fn unreadable_profile_does_not_block_composition() {
    let output = run(
        &Template::new(encode(&dcf_template())),
        &encode(&consensus()),
        Some(&b"PK\x03\x04 definitely truncated"[..]),
        &ComposeConfig {
            missing_sheet_policy: MissingSheetPolicy::Fail,
            ..ComposeConfig::default()
        },
    )
    .unwrap();

    let workbook = read_workbook_from_bytes(&output.bytes).unwrap();
    assert_eq!(
        workbook.sheet_names(),
        vec!["Estimates", "Prices", "DCF Model"]
    );
    let skipped: Vec<_> = output.report.skipped().collect();
    assert_eq!(skipped.len(), 1);
    assert!(matches!(
        skipped[0],
        ComposeEvent::EntrySkipped {
            role: SourceRole::Secondary,
            reason: SkipReason::SourceUnreadable { .. },
            ..
        }
    ));
}

#[test]
fn missing_profile_sheets_are_reported_together_when_fatal() {
    let config = ComposeConfig {
        secondary: SheetSelection::Only(vec![
            SheetSpec::named("Public Company"),
            SheetSpec::named("Peers"),
        ]),
        missing_sheet_policy: MissingSheetPolicy::Fail,
        ..ComposeConfig::default()
    };
    let mut renamed_profile = Workbook::new();
    renamed_profile.add_sheet("Company").unwrap();

    let err = run(
        &Template::new(encode(&dcf_template())),
        &encode(&consensus()),
        Some(&encode(&renamed_profile)),
        &config,
    )
    .unwrap_err();
    match err {
        ComposeError::MissingOptionalSheets(missing) => assert_eq!(
            missing,
            vec![
                MissingSheet {
                    role: SourceRole::Secondary,
                    sheet: "Public Company".to_string(),
                },
                MissingSheet {
                    role: SourceRole::Secondary,
                    sheet: "Peers".to_string(),
                },
            ]
        ),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn required_inputs_fail_fast() {
    let template = Template::new(encode(&dcf_template()));

    let err = run(&template, b"not a package", None, &ComposeConfig::default()).unwrap_err();
    assert!(
        matches!(
            &err,
            ComposeError::Parse {
                role: SourceRole::Primary,
                source: ReadError::Package(_)
            }
        ),
        "{err}"
    );

    let config = ComposeConfig {
        template: SheetSelection::Only(vec![SheetSpec::named("Valuation")]),
        ..ComposeConfig::default()
    };
    let err = run(&template, &encode(&consensus()), None, &config).unwrap_err();
    assert!(
        matches!(&err, ComposeError::SheetNotFound { role: SourceRole::Template, .. }),
        "{err}"
    );
}

#[test]
fn last_writer_wins_across_sources() {
    let mut template = dcf_template();
    template
        .add_sheet("Prices")
        .unwrap()
        .set_value(at("A1"), "from template");
    let config = ComposeConfig {
        template: SheetSelection::Only(vec![
            SheetSpec::named("DCF Model"),
            SheetSpec::named("Prices"),
        ]),
        ..ComposeConfig::default()
    };

    let output = run(
        &Template::new(encode(&template)),
        &encode(&consensus()),
        None,
        &config,
    )
    .unwrap();
    let workbook = read_workbook_from_bytes(&output.bytes).unwrap();

    assert_eq!(
        workbook
            .sheet_names()
            .iter()
            .filter(|name| **name == "Prices")
            .count(),
        1
    );
    assert_eq!(
        workbook.sheet_by_name("Prices").unwrap().cell(at("A1")).unwrap().value,
        CellValue::String("from template".to_string())
    );
    assert_eq!(output.report.replacements().count(), 1);
}

#[test]
fn composing_twice_gives_identical_parts() {
    let template = Template::new(encode(&dcf_template()));
    let primary = encode(&consensus());
    let secondary = encode(&profile());
    let config = ComposeConfig::default();

    let first = run(&template, &primary, Some(&secondary), &config).unwrap();
    let second = run(&template, &primary, Some(&secondary), &config).unwrap();
    assert_eq!(first.report, second.report);

    let first = Package::from_bytes(&first.bytes).unwrap();
    let second = Package::from_bytes(&second.bytes).unwrap();
    assert_eq!(
        first.part_names().collect::<Vec<_>>(),
        second.part_names().collect::<Vec<_>>()
    );
    for name in first.part_names() {
        assert_eq!(first.part(name), second.part(name), "{name}");
    }
}

#[test]
fn one_sheet_copied_twice_does_not_grow_the_style_table() {
    let template = Template::new(encode(&dcf_template()));
    let primary = encode(&consensus());
    let once = ComposeConfig {
        primary: SheetSelection::Only(vec![SheetSpec::named("Estimates")]),
        patches: Vec::new(),
        ..ComposeConfig::default()
    };
    let twice = ComposeConfig {
        primary: SheetSelection::Only(vec![
            SheetSpec::named("Estimates"),
            SheetSpec::renamed("Estimates", "Estimates (2)"),
        ]),
        ..once.clone()
    };

    let once = read_workbook_from_bytes(&run(&template, &primary, None, &once).unwrap().bytes)
        .unwrap();
    let twice = read_workbook_from_bytes(&run(&template, &primary, None, &twice).unwrap().bytes)
        .unwrap();
    assert_eq!(twice.sheet_count(), once.sheet_count() + 1);
    assert_eq!(twice.styles.len(), once.styles.len());
}

#[test]
fn output_flavour_follows_the_template() {
    let mut template = dcf_template();
    template.vba_project = Some(b"template-vba".to_vec());
    let template = write_workbook_to_vec(
        &template,
        &WriteOptions::with_kind(WorkbookKind::MacroEnabledWorkbook),
    )
    .unwrap();
    let mut primary = consensus();
    primary.vba_project = Some(b"user-vba".to_vec());

    let output = run(
        &Template::new(template),
        &write_workbook_to_vec(
            &primary,
            &WriteOptions::with_kind(WorkbookKind::MacroEnabledWorkbook),
        )
        .unwrap(),
        None,
        &ComposeConfig::default(),
    )
    .unwrap();

    assert_eq!(output.kind, WorkbookKind::MacroEnabledWorkbook);
    let doc = load_from_bytes(&output.bytes).unwrap();
    assert_eq!(doc.kind, WorkbookKind::MacroEnabledWorkbook);
    assert_eq!(doc.workbook.vba_project.as_deref(), Some(&b"template-vba"[..]));
    assert!(output
        .report
        .events
        .contains(&ComposeEvent::MacrosDropped {
            role: SourceRole::Primary
        }));
}

#[test]
fn gridline_patch_targets_only_the_named_sheet() {
    let config = ComposeConfig {
        patches: vec![SheetPatch {
            sheet: "Prices".to_string(),
            ops: vec![PatchOp::ShowGridLines(false), PatchOp::SetZoom(80)],
        }],
        ..ComposeConfig::default()
    };
    let output = run(
        &Template::new(encode(&dcf_template())),
        &encode(&consensus()),
        None,
        &config,
    )
    .unwrap();
    let workbook = read_workbook_from_bytes(&output.bytes).unwrap();

    let prices = workbook.sheet_by_name("Prices").unwrap();
    assert!(!prices.view.show_grid_lines);
    assert_eq!(prices.view.zoom_scale, Some(80));
    assert!(workbook.sheet_by_name("DCF Model").unwrap().view.show_grid_lines);
}

#[test]
fn stamped_cell_is_written_as_a_styled_serial() {
    let output = run(
        &Template::new(encode(&dcf_template())),
        &encode(&consensus()),
        None,
        &ComposeConfig::default(),
    )
    .unwrap();
    let package = Package::from_bytes(&output.bytes).unwrap();
    // Estimates, Prices, DCF Model
    let xml = std::str::from_utf8(package.part("xl/worksheets/sheet3.xml").unwrap()).unwrap();
    let doc = roxmltree::Document::parse(xml).unwrap();

    let view = doc
        .descendants()
        .find(|n| n.has_tag_name("sheetView"))
        .unwrap();
    assert_eq!(view.attribute("showGridLines"), Some("0"));

    let stamp = doc
        .descendants()
        .find(|n| n.has_tag_name("c") && n.attribute("r") == Some("C12"))
        .unwrap();
    assert_eq!(stamp.attribute("t"), None);
    assert!(stamp.attribute("s").is_some_and(|s| s != "0"));
    let value = stamp
        .children()
        .find(|n| n.has_tag_name("v"))
        .and_then(|v| v.text())
        .unwrap();
    assert_eq!(value.parse::<f64>().unwrap(), today_serial());
}
