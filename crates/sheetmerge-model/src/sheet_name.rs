use thiserror::Error;
use unicode_normalization::UnicodeNormalization as _;

use crate::CellRef;

/// Excel's maximum sheet name length (UTF-16 code units).
pub const EXCEL_MAX_SHEET_NAME_LEN: usize = 31;

const FORBIDDEN_SHEET_NAME_CHARS: [char; 7] = [':', '\\', '/', '?', '*', '[', ']'];

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SheetNameError {
    #[error("sheet name is empty")]
    Empty,
    #[error("sheet name exceeds {EXCEL_MAX_SHEET_NAME_LEN} characters: {0:?}")]
    TooLong(String),
    #[error("sheet name {name:?} contains forbidden character {ch:?}")]
    ForbiddenCharacter { name: String, ch: char },
    #[error("sheet name {0:?} cannot begin or end with an apostrophe")]
    LeadingOrTrailingApostrophe(String),
}

/// Check a sheet name against Excel's naming rules.
pub fn validate_sheet_name(name: &str) -> Result<(), SheetNameError> {
    if name.trim().is_empty() {
        return Err(SheetNameError::Empty);
    }
    if name.encode_utf16().count() > EXCEL_MAX_SHEET_NAME_LEN {
        return Err(SheetNameError::TooLong(name.to_string()));
    }
    if let Some(ch) = name.chars().find(|c| FORBIDDEN_SHEET_NAME_CHARS.contains(c)) {
        return Err(SheetNameError::ForbiddenCharacter {
            name: name.to_string(),
            ch,
        });
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        return Err(SheetNameError::LeadingOrTrailingApostrophe(name.to_string()));
    }
    Ok(())
}

/// Excel compares sheet names case-insensitively across Unicode, not ASCII.
///
/// Approximated by normalizing both inputs with Unicode NFKC and then applying
/// Unicode uppercasing.
pub fn sheet_name_eq_case_insensitive(a: &str, b: &str) -> bool {
    a.nfkc()
        .flat_map(|c| c.to_uppercase())
        .eq(b.nfkc().flat_map(|c| c.to_uppercase()))
}

fn is_ident_char(c: char) -> bool {
    matches!(c, '_' | '\\' | '.' | 'A'..='Z' | 'a'..='z' | '0'..='9')
}

/// True if `name` must be wrapped in single quotes when used as a reference prefix.
pub fn sheet_name_needs_quotes(name: &str) -> bool {
    if name.is_empty() {
        return true;
    }

    let starts_like_number = matches!(name.chars().next(), Some('0'..='9' | '.'));
    let starts_like_r1c1 = matches!(name.chars().next(), Some('R' | 'r' | 'C' | 'c'))
        && matches!(name.chars().nth(1), None | Some('0'..='9' | '['));
    let looks_like_a1 = CellRef::from_a1(name).is_ok();
    let looks_like_bool =
        name.eq_ignore_ascii_case("TRUE") || name.eq_ignore_ascii_case("FALSE");

    starts_like_number
        || starts_like_r1c1
        || looks_like_a1
        || looks_like_bool
        || name.chars().any(|c| !is_ident_char(c))
}

/// Quote a sheet name for use in a formula, only when needed.
pub fn quote_sheet_name(name: &str) -> String {
    if !sheet_name_needs_quotes(name) {
        return name.to_string();
    }
    let escaped = name.replace('\'', "''");
    format!("'{escaped}'")
}

/// Format the `Sheet!` prefix for a single sheet or a 3-D `First:Last!` span.
pub fn format_sheet_prefix(first: &str, last: Option<&str>) -> String {
    match last {
        None => format!("{}!", quote_sheet_name(first)),
        Some(last) => {
            if sheet_name_needs_quotes(first) || sheet_name_needs_quotes(last) {
                format!(
                    "'{}:{}'!",
                    first.replace('\'', "''"),
                    last.replace('\'', "''")
                )
            } else {
                format!("{first}:{last}!")
            }
        }
    }
}
