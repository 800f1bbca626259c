//! A1-style reference arithmetic for spreadsheet formulas.
//!
//! A shared formula is stored once on its anchor cell; every other cell in
//! its range reads as the anchor's text with relative references moved by
//! the cell's offset from the anchor.

use std::sync::LazyLock;

use regex::{Captures, Regex};

pub const MAX_COLUMN: usize = 16_384;
pub const MAX_ROW: u32 = 1_048_576;

/// `[$]COL[$]ROW`. Word boundaries are checked separately since the regex
/// crate has no lookaround.
static CELL_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\$?)([A-Za-z]{1,3})(\$?)([0-9]{1,7})").unwrap());

/// 1-based column of an A1-style reference (`"C7"` -> 3).
pub fn column_number(reference: &str) -> Option<usize> {
    let letters = reference
        .bytes()
        .take_while(u8::is_ascii_alphabetic)
        .collect::<Vec<_>>();
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    Some(letters.iter().fold(0usize, |acc, b| {
        acc * 26 + usize::from(b.to_ascii_uppercase() - b'A' + 1)
    }))
}

/// 1-based row of an A1-style reference (`"C7"` -> 7).
pub fn row_number(reference: &str) -> Option<u32> {
    reference
        .trim_start_matches(|c: char| c.is_ascii_alphabetic())
        .parse()
        .ok()
        .filter(|row| (1..=MAX_ROW).contains(row))
}

fn column_letters(mut column: usize) -> String {
    let mut letters = Vec::new();
    while column > 0 {
        let rem = (column - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        column = (column - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Rewrite `formula`, written for its anchor cell, as it reads `rows` rows
/// down and `columns` columns right of the anchor.
///
/// `$`-fixed parts stay put, and text inside string literals or quoted sheet
/// names is never touched. A reference pushed off the sheet becomes `#REF!`.
pub fn shift_formula(formula: &str, rows: i64, columns: i64) -> String {
    if rows == 0 && columns == 0 {
        return formula.to_string();
    }

    let mut shifted = String::with_capacity(formula.len());
    let mut rest = formula;
    while let Some(start) = rest.find(|c: char| c == '"' || c == '\'') {
        shifted.push_str(&shift_segment(&rest[..start], rows, columns));
        let end = start + quoted_len(&rest[start..]);
        shifted.push_str(&rest[start..end]);
        rest = &rest[end..];
    }
    shifted.push_str(&shift_segment(rest, rows, columns));
    shifted
}

/// Length of the quoted run at the start of `text`, closing quote included.
/// A doubled quote is an escaped quote, not the end.
fn quoted_len(text: &str) -> usize {
    let bytes = text.as_bytes();
    let quote = bytes[0];
    let mut i = 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

fn shift_segment(segment: &str, rows: i64, columns: i64) -> String {
    CELL_REFERENCE
        .replace_all(segment, |caps: &Captures<'_>| {
            let Some(whole) = caps.get(0) else {
                return String::new();
            };
            if !stands_alone(segment, whole.start(), whole.end()) {
                return whole.as_str().to_string();
            }
            match shift_reference(caps, rows, columns) {
                Shifted::Moved(reference) => reference,
                Shifted::OffSheet => "#REF!".to_string(),
                Shifted::NotAReference => whole.as_str().to_string(),
            }
        })
        .into_owned()
}

/// A match is a reference only when it is not part of a longer name, a
/// function call (`LOG10(`), or a sheet prefix (`Q1!`).
fn stands_alone(text: &str, start: usize, end: usize) -> bool {
    let name_char = |c: char| c.is_alphanumeric() || c == '_' || c == '.';
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(name_char) && !after.is_some_and(|c| name_char(c) || c == '(' || c == '!')
}

enum Shifted {
    Moved(String),
    OffSheet,
    NotAReference,
}

fn shift_reference(caps: &Captures<'_>, rows: i64, columns: i64) -> Shifted {
    let column_fixed = !caps[1].is_empty();
    let row_fixed = !caps[3].is_empty();
    let (Some(column), Some(row)) = (column_number(&caps[2]), row_number(&caps[4])) else {
        return Shifted::NotAReference;
    };
    if column > MAX_COLUMN {
        return Shifted::NotAReference;
    }

    let column = if column_fixed { column as i64 } else { column as i64 + columns };
    let row = if row_fixed { i64::from(row) } else { i64::from(row) + rows };
    if !(1..=MAX_COLUMN as i64).contains(&column) || !(1..=i64::from(MAX_ROW)).contains(&row) {
        return Shifted::OffSheet;
    }

    Shifted::Moved(format!(
        "{}{}{}{}",
        &caps[1],
        column_letters(column as usize),
        &caps[3],
        row
    ))
}
