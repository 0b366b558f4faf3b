//! Conversions between numeric cell coordinates and spreadsheet-style references.
//!
//! Column numbers use bijective base-26 with the letters `A`..`Z`: there is no
//! zero digit, so `Z` (26) rolls over to `AA` (27).

use crate::error::SheetDbError;
use thiserror::Error;

/// Errors related to column letter conversion.
#[derive(Error, Debug, PartialEq)]
pub enum ColumnError {
    #[error("Invalid column name '{0}'")]
    InvalidFormat(String),

    #[error("Invalid column number {0}, column numbers start at 1")]
    InvalidNumber(usize),
}

/// Converts a 1-indexed column number to its alphabetic name (1 = "A", 27 = "AA").
pub fn number_to_name(number: usize) -> Result<String, SheetDbError> {
    if number == 0 {
        Err(ColumnError::InvalidNumber(number))?;
    }
    Ok(index_to_name(number - 1))
}

/// Converts an alphabetic column name to its 1-indexed column number ("A" = 1, "AA" = 27).
/// Letters are accepted in either case.
pub fn name_to_number(name: &str) -> Result<usize, SheetDbError> {
    if name.is_empty() {
        Err(ColumnError::InvalidFormat(name.to_owned()))?;
    }
    let mut number: usize = 0;
    for letter in name.chars() {
        if !letter.is_ascii_alphabetic() {
            Err(ColumnError::InvalidFormat(name.to_owned()))?;
        }
        let digit = letter.to_ascii_uppercase() as usize - 'A' as usize + 1;
        number = number
            .checked_mul(26)
            .and_then(|number| number.checked_add(digit))
            .ok_or_else(|| ColumnError::InvalidFormat(name.to_owned()))?;
    }
    Ok(number)
}

/// Converts a 0-based column index to its alphabetic name (0 = "A").
pub(crate) fn index_to_name(index: usize) -> String {
    let mut column = index + 1;
    let mut name = String::new();
    while column > 0 {
        column -= 1;
        let digit = char::from(b'A' + (column % 26) as u8);
        column /= 26;
        name.insert(0, digit);
    }
    name
}

/// Parses column letters to a 0-based column index; `None` for empty or invalid text.
pub(crate) fn col_to_index(letters: &str) -> Option<usize> {
    name_to_number(letters).ok().map(|number| number - 1)
}

/// Parses a 1-based row number to a 0-based row index; `None` for empty, zero or invalid text.
pub(crate) fn row_to_index(number: &str) -> Option<usize> {
    number
        .parse()
        .ok()
        .filter(|row| *row > 0)
        .map(|row: usize| row - 1)
}

/// Quotes a sheet title for use in an A1 range, doubling embedded single quotes.
pub(crate) fn quote_sheet_title(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

/// Reverses [`quote_sheet_title`]; unquoted titles are returned unchanged.
pub(crate) fn unquote_sheet_title(text: &str) -> String {
    match text.strip_prefix('\'').and_then(|text| text.strip_suffix('\'')) {
        Some(inner) => inner.replace("''", "'"),
        None => text.to_owned(),
    }
}
