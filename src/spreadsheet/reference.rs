//! Conversions between zero-based (row, column) indexes and A1-style references.

use regex::Regex;
use std::sync::LazyLock;

static REFERENCE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\$?([A-Za-z]{1,3})\$?(\d+)$").expect("Hardcode regex pattern"));

/// Largest zero-based column index in the xlsx grid (XFD)
pub const MAX_COLUMN: usize = 16_383;
/// Largest zero-based row index in the xlsx grid
pub const MAX_ROW: usize = 1_048_575;

/// Converts column letters ("A", "AB") to a zero-based column index.
pub(crate) fn col_to_index(letters: &str) -> Option<usize> {
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    letters
        .to_ascii_uppercase()
        .bytes()
        .map(|letter| (letter - b'A') as usize + 1)
        .reduce(|index, digit| index * 26 + digit)
        .map(|column| column - 1)
}

/// Converts a one-based row number ("5") to a zero-based row index.
pub(crate) fn row_to_index(number: &str) -> Option<usize> {
    number
        .parse()
        .ok()
        .filter(|row| *row > 0)
        .map(|row: usize| row - 1)
}

/// Converts a zero-based column index to its letters.
pub(crate) fn index_to_col(mut col: usize) -> String {
    let mut letters = Vec::with_capacity(3);
    col += 1;
    while col > 0 {
        col -= 1;
        letters.push(char::from(b'A' + (col % 26) as u8));
        col /= 26;
    }
    letters.iter().rev().collect()
}

/// Converts zero-based indexes to an A1-style reference.
pub(crate) fn index_to_reference(row: usize, col: usize) -> String {
    format!("{}{}", index_to_col(col), row + 1)
}

/// Parses an A1-style reference (absolute markers allowed) to zero-based indexes.
pub(crate) fn reference_to_index(reference: &str) -> Option<(usize, usize)> {
    let captures = REFERENCE_PATTERN.captures(reference)?;
    let col = col_to_index(captures.get(1)?.as_str())?;
    let row = row_to_index(captures.get(2)?.as_str())?;
    (row <= MAX_ROW && col <= MAX_COLUMN).then_some((row, col))
}

/// Formats an inclusive rectangle as "A1:E20"
pub(crate) fn area_to_reference(first: (usize, usize), last: (usize, usize)) -> String {
    format!("{}:{}", index_to_reference(first.0, first.1), index_to_reference(last.0, last.1))
}
