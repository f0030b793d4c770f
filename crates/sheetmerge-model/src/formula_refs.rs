//! Lightweight lexical view of formula text.
//!
//! This is not a formula parser. It splits canonical formula text into runs of
//! untouched text, sheet-qualified reference prefixes (`Sheet1!`, `'My Sheet'!`,
//! `Jan:Mar!`) and bare name tokens (`A1`, `$B$2`, `2:3`, `SUM`, `Table1`). That is enough to
//! rename sheets and to shift relative A1 references without disturbing string
//! literals, error literals, external workbook references or structured references.

use crate::address::{col_to_name, name_to_col};
use crate::sheet_name::format_sheet_prefix;
use crate::{CellRef, EXCEL_MAX_COLS, EXCEL_MAX_ROWS};

/// A sheet-qualified reference prefix, including the trailing `!`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SheetPrefix<'a> {
    /// The prefix exactly as written (e.g. `'Public Company'!`).
    pub raw: &'a str,
    /// Unquoted, unescaped first sheet name.
    pub first: String,
    /// Last sheet of a 3-D span (`Jan:Mar!`).
    pub last: Option<String>,
    pub quoted: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    SheetPrefix(SheetPrefix<'a>),
    /// Identifier-like token: cell reference, whole-row range (`2:3`), function name,
    /// defined name.
    Name(&'a str),
}

/// Split `formula` into [`Segment`]s. Concatenating the raw text of every segment
/// reproduces the input exactly.
pub fn segments<'a>(formula: &'a str) -> Vec<Segment<'a>> {
    let mut out = Vec::new();
    let mut i = 0usize;
    let mut text_start = 0usize;

    let flush = |out: &mut Vec<Segment<'a>>, start: usize, end: usize| {
        if start < end {
            out.push(Segment::Text(&formula[start..end]));
        }
    };

    while let Some(c) = formula[i..].chars().next() {
        if let Some(end) = scan_row_range(formula, i) {
            flush(&mut out, text_start, i);
            out.push(Segment::Name(&formula[i..end]));
            i = end;
            text_start = i;
            continue;
        }
        match c {
            '"' => i = skip_string_literal(formula, i),
            '#' => i = skip_error_literal(formula, i),
            '\'' => {
                let Some((end, inner)) = read_quoted_name(formula, i) else {
                    i = formula.len();
                    continue;
                };
                if formula[end..].starts_with('!') && !inner.starts_with('[') {
                    flush(&mut out, text_start, i);
                    let (first, last) = split_three_d(&inner);
                    out.push(Segment::SheetPrefix(SheetPrefix {
                        raw: &formula[i..end + 1],
                        first,
                        last,
                        quoted: true,
                    }));
                    i = end + 1;
                    text_start = i;
                } else if formula[end..].starts_with('!') {
                    // External workbook reference (`'[Book.xlsx]Sheet'!A1`).
                    i = end + 1;
                } else {
                    i = end;
                }
            }
            '[' => {
                i = skip_brackets(formula, i);
                // `[1]Sheet1!A1` style external prefix.
                let j = scan_name_end(formula, i);
                if j > i && formula[j..].starts_with('!') {
                    i = j + 1;
                }
            }
            c if is_name_start(c) && !follows_number(formula, i) => {
                let start = i;
                let end = scan_name_end(formula, i);
                if formula[end..].starts_with('!') {
                    flush(&mut out, text_start, start);
                    out.push(Segment::SheetPrefix(SheetPrefix {
                        raw: &formula[start..end + 1],
                        first: formula[start..end].to_string(),
                        last: None,
                        quoted: false,
                    }));
                    i = end + 1;
                    text_start = i;
                    continue;
                }
                if formula[end..].starts_with(':') {
                    let last_end = scan_name_end(formula, end + 1);
                    if last_end > end + 1 && formula[last_end..].starts_with('!') {
                        flush(&mut out, text_start, start);
                        out.push(Segment::SheetPrefix(SheetPrefix {
                            raw: &formula[start..last_end + 1],
                            first: formula[start..end].to_string(),
                            last: Some(formula[end + 1..last_end].to_string()),
                            quoted: false,
                        }));
                        i = last_end + 1;
                        text_start = i;
                        continue;
                    }
                }
                flush(&mut out, text_start, start);
                out.push(Segment::Name(&formula[start..end]));
                i = end;
                text_start = i;
            }
            c => i += c.len_utf8(),
        }
    }
    flush(&mut out, text_start, formula.len());
    out
}

/// Rewrite sheet-qualified prefixes.
///
/// `rename` receives each referenced sheet name and returns the replacement, or
/// `None` to leave that name as written. Prefixes that are not renamed are copied
/// verbatim (including their original quoting).
pub fn rewrite_sheet_names_in_formula<F>(formula: &str, mut rename: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    let mut out = String::with_capacity(formula.len());
    for segment in segments(formula) {
        match segment {
            Segment::Text(text) | Segment::Name(text) => out.push_str(text),
            Segment::SheetPrefix(prefix) => {
                let first = rename(&prefix.first);
                let last = prefix.last.as_deref().map(&mut rename);
                let changed = first.is_some() || last.as_ref().is_some_and(Option::is_some);
                if !changed {
                    out.push_str(prefix.raw);
                    continue;
                }
                let first = first.unwrap_or_else(|| prefix.first.clone());
                let last = match (last, &prefix.last) {
                    (Some(Some(new)), _) => Some(new),
                    (_, Some(old)) => Some(old.clone()),
                    _ => None,
                };
                out.push_str(&format_sheet_prefix(&first, last.as_deref()));
            }
        }
    }
    out
}

/// Shift the relative parts of every A1 reference by `(rows, cols)`.
///
/// Used to materialize shared formulas: the master formula is written once and each
/// dependent cell stores only the anchor. Absolute (`$`) components are kept. A
/// reference pushed off the grid becomes `#REF!`, matching Excel.
pub fn shift_formula_references(formula: &str, rows: i64, cols: i64) -> String {
    if rows == 0 && cols == 0 {
        return formula.to_string();
    }

    let segments = segments(formula);
    let mut out = String::with_capacity(formula.len());
    for (idx, segment) in segments.iter().enumerate() {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::SheetPrefix(prefix) => out.push_str(prefix.raw),
            Segment::Name(name) => {
                if let Some(rows_ref) = parse_row_range(name) {
                    out.push_str(&shift_row_range(rows_ref, rows));
                    continue;
                }
                let next = segments.get(idx + 1);
                let prev = idx.checked_sub(1).and_then(|i| segments.get(i));
                let is_call = matches!(next, Some(Segment::Text(t)) if t.starts_with('('));
                if is_call {
                    out.push_str(name);
                    continue;
                }
                let in_col_range = matches!(next, Some(Segment::Text(t)) if t.starts_with(':'))
                    || matches!(prev, Some(Segment::Text(t)) if t.ends_with(':'));
                match shift_a1_token(name, rows, cols, in_col_range) {
                    Some(shifted) => out.push_str(&shifted),
                    None => out.push_str(name),
                }
            }
        }
    }
    out
}

/// Shift a single `$?COL$?ROW` (or `$?COL` inside a column range) token.
///
/// Returns `None` when the token is not a reference.
fn shift_a1_token(token: &str, rows: i64, cols: i64, allow_col_only: bool) -> Option<String> {
    let bytes = token.as_bytes();
    let mut idx = 0usize;
    let col_abs = bytes.first() == Some(&b'$');
    if col_abs {
        idx += 1;
    }
    let col_start = idx;
    while idx < bytes.len() && bytes[idx].is_ascii_alphabetic() {
        idx += 1;
    }
    if idx == col_start || idx - col_start > 3 {
        return None;
    }
    let col = name_to_col(&token[col_start..idx]).ok()?;
    if col >= EXCEL_MAX_COLS {
        return None;
    }

    let new_col = if col_abs {
        Some(col)
    } else {
        let shifted = i64::from(col) + cols;
        (0..i64::from(EXCEL_MAX_COLS))
            .contains(&shifted)
            .then_some(shifted as u32)
    };

    if idx == bytes.len() {
        if !allow_col_only {
            return None;
        }
        return Some(match new_col {
            Some(col) => format!("{}{}", if col_abs { "$" } else { "" }, col_to_name(col)),
            None => "#REF!".to_string(),
        });
    }

    let row_abs = bytes.get(idx) == Some(&b'$');
    if row_abs {
        idx += 1;
    }
    let row_start = idx;
    while idx < bytes.len() && bytes[idx].is_ascii_digit() {
        idx += 1;
    }
    if idx == row_start || idx != bytes.len() {
        return None;
    }
    let cell = CellRef::from_a1(token).ok()?;

    let new_row = if row_abs {
        Some(cell.row)
    } else {
        let shifted = i64::from(cell.row) + rows;
        (0..i64::from(EXCEL_MAX_ROWS))
            .contains(&shifted)
            .then_some(shifted as u32)
    };

    Some(match (new_col, new_row) {
        (Some(col), Some(row)) => format!(
            "{}{}{}{}",
            if col_abs { "$" } else { "" },
            col_to_name(col),
            if row_abs { "$" } else { "" },
            row + 1
        ),
        _ => "#REF!".to_string(),
    })
}

/// One side of a whole-row range: `$`-anchored flag and 0-based row.
type RowPart = (bool, u32);

/// Match `$?ROW:$?ROW` at `start`. Both sides must be in-grid row numbers and the
/// match must not sit inside a longer name or number.
fn scan_row_range(formula: &str, start: usize) -> Option<usize> {
    let bytes = formula.as_bytes();
    if !matches!(bytes.get(start), Some(b'$' | b'0'..=b'9')) {
        return None;
    }
    if formula[..start].chars().next_back().is_some_and(is_name_char) {
        return None;
    }
    let first_end = scan_row_part(bytes, start)?;
    if bytes.get(first_end) != Some(&b':') {
        return None;
    }
    let end = scan_row_part(bytes, first_end + 1)?;
    if formula[end..]
        .chars()
        .next()
        .is_some_and(|c| is_name_char(c) || matches!(c, '(' | '!' | ':'))
    {
        return None;
    }
    parse_row_range(&formula[start..end]).map(|_| end)
}

fn scan_row_part(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start;
    if bytes.get(i) == Some(&b'$') {
        i += 1;
    }
    let digits = i;
    while bytes.get(i).is_some_and(u8::is_ascii_digit) {
        i += 1;
    }
    (i > digits).then_some(i)
}

fn parse_row_range(token: &str) -> Option<[RowPart; 2]> {
    let (first, last) = token.split_once(':')?;
    Some([parse_row_part(first)?, parse_row_part(last)?])
}

fn parse_row_part(part: &str) -> Option<RowPart> {
    let (abs, digits) = match part.strip_prefix('$') {
        Some(rest) => (true, rest),
        None => (false, part),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let row: u32 = digits.parse().ok()?;
    (1..=EXCEL_MAX_ROWS).contains(&row).then_some((abs, row - 1))
}

/// Shift the relative sides of a whole-row range. Either side leaving the grid turns
/// the whole reference into `#REF!`.
fn shift_row_range(parts: [RowPart; 2], rows: i64) -> String {
    let mut shifted = Vec::with_capacity(2);
    for (abs, row) in parts {
        let row = if abs {
            i64::from(row)
        } else {
            i64::from(row) + rows
        };
        if !(0..i64::from(EXCEL_MAX_ROWS)).contains(&row) {
            return "#REF!".to_string();
        }
        shifted.push(format!("{}{}", if abs { "$" } else { "" }, row + 1));
    }
    shifted.join(":")
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || matches!(c, '_' | '\\' | '$')
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '\\' | '.' | '$' | '?')
}

/// Exponent markers (`1E5`) and similar must not be read as names.
fn follows_number(formula: &str, i: usize) -> bool {
    formula[..i]
        .chars()
        .next_back()
        .is_some_and(|c| c.is_ascii_digit() || c == '.')
}

fn scan_name_end(formula: &str, start: usize) -> usize {
    let mut end = start;
    for c in formula[start..].chars() {
        if !is_name_char(c) {
            break;
        }
        end += c.len_utf8();
    }
    end
}

fn skip_string_literal(formula: &str, start: usize) -> usize {
    let bytes = formula.as_bytes();
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == b'"' {
            if bytes.get(i + 1) == Some(&b'"') {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

fn skip_error_literal(formula: &str, start: usize) -> usize {
    let bytes = formula.as_bytes();
    let mut i = start + 1;
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || matches!(bytes[i], b'/' | b'_'))
    {
        i += 1;
    }
    if matches!(bytes.get(i), Some(b'!' | b'?')) {
        i += 1;
    }
    i
}

fn skip_brackets(formula: &str, start: usize) -> usize {
    let bytes = formula.as_bytes();
    let mut depth = 0usize;
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'[' => depth += 1,
            b']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return i + 1;
                }
            }
            // `'` escapes the next character inside structured references.
            b'\'' => i += 1,
            _ => {}
        }
        i += 1;
    }
    bytes.len()
}

/// Read a `'...'` name starting at `start`. Returns the index just past the closing
/// quote and the unescaped contents.
fn read_quoted_name(formula: &str, start: usize) -> Option<(usize, String)> {
    let mut inner = String::new();
    let mut chars = formula[start + 1..].char_indices().peekable();
    while let Some((offset, c)) = chars.next() {
        if c == '\'' {
            if matches!(chars.peek(), Some((_, '\''))) {
                inner.push('\'');
                chars.next();
                continue;
            }
            return Some((start + 1 + offset + 1, inner));
        }
        inner.push(c);
    }
    None
}

fn split_three_d(inner: &str) -> (String, Option<String>) {
    match inner.split_once(':') {
        Some((first, last)) => (first.to_string(), Some(last.to_string())),
        None => (inner.to_string(), None),
    }
}
