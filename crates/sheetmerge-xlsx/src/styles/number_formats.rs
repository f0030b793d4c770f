/// First id available for workbook-defined number formats.
pub const FIRST_CUSTOM_NUM_FMT_ID: u16 = 164;

/// Format code for a built-in number format id (en-US rendering for the
/// locale-dependent currency ids).
pub fn builtin_format_code(id: u16) -> Option<&'static str> {
    match id {
        0 => Some("General"),
        1 => Some("0"),
        2 => Some("0.00"),
        3 => Some("#,##0"),
        4 => Some("#,##0.00"),
        5 => Some(r##""$"#,##0_);\("$"#,##0\)"##),
        6 => Some(r##""$"#,##0_);[Red]\("$"#,##0\)"##),
        7 => Some(r##""$"#,##0.00_);\("$"#,##0.00\)"##),
        8 => Some(r##""$"#,##0.00_);[Red]\("$"#,##0.00\)"##),
        9 => Some("0%"),
        10 => Some("0.00%"),
        11 => Some("0.00E+00"),
        12 => Some("# ?/?"),
        13 => Some("# ??/??"),
        14 => Some("mm-dd-yy"),
        15 => Some("d-mmm-yy"),
        16 => Some("d-mmm"),
        17 => Some("mmm-yy"),
        18 => Some("h:mm AM/PM"),
        19 => Some("h:mm:ss AM/PM"),
        20 => Some("h:mm"),
        21 => Some("h:mm:ss"),
        22 => Some("m/d/yy h:mm"),
        37 => Some("#,##0 ;(#,##0)"),
        38 => Some("#,##0 ;[Red](#,##0)"),
        39 => Some("#,##0.00;(#,##0.00)"),
        40 => Some("#,##0.00;[Red](#,##0.00)"),
        45 => Some("mm:ss"),
        46 => Some("[h]:mm:ss"),
        47 => Some("mmss.0"),
        48 => Some("##0.0E+0"),
        49 => Some("@"),
        _ => None,
    }
}

/// Built-in id for a format code, so common formats are written without a
/// `<numFmt>` entry.
pub fn builtin_format_id(code: &str) -> Option<u16> {
    (0..=49).find(|id| builtin_format_code(*id) == Some(code))
}

/// True when the first section of `code` renders a date or time.
///
/// Quoted literals, escaped characters and bracketed modifiers (`[Red]`, `[$-409]`)
/// are skipped; elapsed-time sections (`[h]:mm`) count as time.
pub fn is_date_format(code: &str) -> bool {
    let section = code.split(';').next().unwrap_or_default();
    let mut chars = section.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                for c in chars.by_ref() {
                    if c == '"' {
                        break;
                    }
                }
            }
            '\\' | '_' | '*' => {
                chars.next();
            }
            '[' => {
                let inner: String = chars.by_ref().take_while(|c| *c != ']').collect();
                let inner = inner.to_ascii_lowercase();
                if !inner.is_empty() && inner.chars().all(|c| matches!(c, 'h' | 'm' | 's')) {
                    return true;
                }
            }
            'd' | 'D' | 'm' | 'M' | 'y' | 'Y' | 'h' | 'H' | 's' | 'S' => return true,
            _ => {}
        }
    }
    false
}
