use proptest::prelude::*;
use sheetmerge_model::formula_refs::{segments, Segment};
use sheetmerge_model::{rewrite_sheet_names_in_formula, shift_formula_references};

fn joined(formula: &str) -> String {
    segments(formula)
        .iter()
        .map(|s| match s {
            Segment::Text(t) | Segment::Name(t) => t.to_string(),
            Segment::SheetPrefix(p) => p.raw.to_string(),
        })
        .collect()
}

proptest! {
    #[test]
    fn segments_are_lossless(formula in "[A-Za-z0-9 '!:$\"#\\[\\]()+*,._-]{0,40}") {
        prop_assert_eq!(joined(&formula), formula);
    }

    #[test]
    fn declining_every_rename_is_identity(formula in "[A-Za-z0-9 '!:$\"#\\[\\]()+*,._-]{0,40}") {
        prop_assert_eq!(rewrite_sheet_names_in_formula(&formula, |_| None), formula);
    }

    #[test]
    fn zero_shift_is_identity(formula in "[A-Za-z0-9 '!:$\"()+*,.]{0,40}") {
        prop_assert_eq!(shift_formula_references(&formula, 0, 0), formula);
    }

    #[test]
    fn shifting_there_and_back_restores_in_grid_references(
        row in 5u32..1000,
        col in 5u32..500,
        dr in -4i64..4,
        dc in -4i64..4,
    ) {
        let a1 = sheetmerge_model::CellRef::new(row, col).to_a1();
        let formula = format!("SUM({a1}:$B$2)*'My Sheet'!{a1}");
        let there = shift_formula_references(&formula, dr, dc);
        prop_assert_eq!(shift_formula_references(&there, -dr, -dc), formula);
    }

    #[test]
    fn whole_row_ranges_shift_like_their_cells(
        top in 5u32..1000,
        span in 0u32..50,
        dr in -4i64..4,
        anchored in any::<bool>(),
    ) {
        let bottom = top + span;
        let anchor = if anchored { "$" } else { "" };
        let formula = format!("SUM({anchor}{top}:{bottom})+A{top}");
        let shifted = shift_formula_references(&formula, dr, 0);

        let moved = |row: u32| (i64::from(row) + dr).to_string();
        let first = if anchored { top.to_string() } else { moved(top) };
        prop_assert_eq!(
            &shifted,
            &format!("SUM({anchor}{first}:{})+A{}", moved(bottom), moved(top))
        );
        prop_assert_eq!(shift_formula_references(&shifted, -dr, 0), formula);
    }
}
