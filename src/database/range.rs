use crate::error::SheetDbError;
use crate::spreadsheet::reference::col_to_index;
use crate::spreadsheet::reference::index_to_name;
use crate::spreadsheet::reference::quote_sheet_title;
use crate::spreadsheet::reference::row_to_index;
use crate::spreadsheet::reference::unquote_sheet_title;
use regex::Regex;
use std::fmt::Display;
use thiserror::Error;

/// Errors related to ranges and row/column bounds.
#[derive(Error, Debug, PartialEq)]
pub enum RangeError {
    #[error("Invalid range format '{0}'")]
    FormatError(String),

    #[error("Row index {index} is out of range, table has {count} rows")]
    RowIndexOutOfRange { index: usize, count: usize },

    #[error("Row range [{start}, {end}) is empty")]
    EmptyRowRange { start: usize, end: usize },

    #[error("Row has {count} values but the table only has {limit} columns")]
    TooManyValues { count: usize, limit: usize },
}

/// Represents an A1-style cell range with optional boundaries.
///
/// All bounds are 0-based and inclusive.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Range {
    /// Lower row bound, None for unbounded
    pub row_lower_bound: Option<usize>,
    /// Upper row bound, None for unbounded
    pub row_upper_bound: Option<usize>,
    /// Lower column bound, None for unbounded
    pub col_lower_bound: Option<usize>,
    /// Upper column bound, None for unbounded
    pub col_upper_bound: Option<usize>,
}

impl Range {
    /// A fully bounded rectangle from `(row_lower, col_lower)` to `(row_upper, col_upper)`.
    pub fn cells(row_lower: usize, col_lower: usize, row_upper: usize, col_upper: usize) -> Self {
        Range {
            row_lower_bound: Some(row_lower),
            row_upper_bound: Some(row_upper),
            col_lower_bound: Some(col_lower),
            col_upper_bound: Some(col_upper),
        }
    }

    /// A single cell.
    pub fn cell(row: usize, col: usize) -> Self {
        Range {
            row_lower_bound: Some(row),
            row_upper_bound: None,
            col_lower_bound: Some(col),
            col_upper_bound: None,
        }
    }

    /// Returns true if the cell lies inside this range; unbounded sides accept everything.
    pub fn contains(&self, row: usize, col: usize) -> bool {
        let lower_row = self.row_lower_bound.unwrap_or(0);
        let lower_col = self.col_lower_bound.unwrap_or(0);
        let upper_row = self.row_upper_bound.or(self.single_row()).unwrap_or(usize::MAX);
        let upper_col = self.col_upper_bound.or(self.single_col()).unwrap_or(usize::MAX);
        row >= lower_row && row <= upper_row && col >= lower_col && col <= upper_col
    }

    /// Resolves the range against a grid of the given size. Returns
    /// `(row_start, row_end, col_start, col_end)` with exclusive ends, clamped
    /// to the grid; the spans are empty when the range lies outside it.
    pub(crate) fn clamp(&self, row_count: usize, column_count: usize) -> (usize, usize, usize, usize) {
        let row_start = self.row_lower_bound.unwrap_or(0).min(row_count);
        let col_start = self.col_lower_bound.unwrap_or(0).min(column_count);
        let row_end = self
            .row_upper_bound
            .or(self.single_row())
            .map_or(row_count, |row| row.saturating_add(1).min(row_count))
            .max(row_start);
        let col_end = self
            .col_upper_bound
            .or(self.single_col())
            .map_or(column_count, |col| col.saturating_add(1).min(column_count))
            .max(col_start);
        (row_start, row_end, col_start, col_end)
    }

    /// A range written as a single cell ("B3") has no upper bounds of its own.
    fn is_single_cell(&self) -> bool {
        self.row_upper_bound.is_none() && self.col_upper_bound.is_none()
    }

    fn single_row(&self) -> Option<usize> {
        self.row_lower_bound.filter(|_| self.is_single_cell())
    }

    fn single_col(&self) -> Option<usize> {
        self.col_lower_bound.filter(|_| self.is_single_cell())
    }
}

impl TryFrom<&str> for Range {
    type Error = SheetDbError;

    /// Parses an A1-style range string (e.g., "A1", "B2:C5", "A:C", "A2:C").
    /// Supports single cells, ranges, and partial ranges (columns or rows only).
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let pattern = Regex::new(r"^([A-Z]*)(\d*)(:([A-Z]*)(\d*))?$").expect("Hardcode regex pattern");
        let value = value.to_ascii_uppercase();
        let captures = pattern
            .captures(value.as_str())
            .ok_or(RangeError::FormatError(value.to_owned()))?;
        Ok(Range {
            col_lower_bound: captures
                .get(1)
                .map(|matcher| matcher.as_str())
                .and_then(col_to_index),
            row_lower_bound: captures
                .get(2)
                .map(|matcher| matcher.as_str())
                .and_then(row_to_index),
            col_upper_bound: captures
                .get(4)
                .map(|matcher| matcher.as_str())
                .and_then(col_to_index),
            row_upper_bound: captures
                .get(5)
                .map(|matcher| matcher.as_str())
                .and_then(row_to_index),
        })
    }
}

impl Display for Range {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn corner(f: &mut std::fmt::Formatter<'_>, row: Option<usize>, col: Option<usize>) -> std::fmt::Result {
            if let Some(col) = col {
                write!(f, "{}", index_to_name(col))?;
            }
            if let Some(row) = row {
                write!(f, "{}", row + 1)?;
            }
            Ok(())
        }
        corner(f, self.row_lower_bound, self.col_lower_bound)?;
        if !self.is_single_cell() {
            write!(f, ":")?;
            corner(f, self.row_upper_bound, self.col_upper_bound)?;
        }
        Ok(())
    }
}

/// A range qualified with the title of the sheet it addresses (e.g. `'People'!A1:C10`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SheetRange {
    /// Unquoted sheet title, None when the range is not qualified
    pub sheet: Option<String>,
    pub range: Range,
}

impl SheetRange {
    pub fn new(sheet: &str, range: Range) -> Self {
        SheetRange {
            sheet: Some(sheet.to_owned()),
            range,
        }
    }
}

impl TryFrom<&str> for SheetRange {
    type Error = SheetDbError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.rfind('!') {
            Some(index) => {
                let sheet = unquote_sheet_title(&value[..index]);
                if sheet.is_empty() {
                    Err(RangeError::FormatError(value.to_owned()))?;
                }
                Ok(SheetRange {
                    sheet: Some(sheet),
                    range: Range::try_from(&value[index + 1..])?,
                })
            }
            None => Ok(SheetRange {
                sheet: None,
                range: Range::try_from(value)?,
            }),
        }
    }
}

impl Display for SheetRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.sheet {
            Some(sheet) => write!(f, "{}!{}", quote_sheet_title(sheet), self.range),
            None => write!(f, "{}", self.range),
        }
    }
}

/// Half-open `[start, end)` span of row indices.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct RowRange {
    pub start: usize,
    pub end: usize,
}

impl RowRange {
    pub fn new(start: usize, end: usize) -> Self {
        RowRange { start, end }
    }

    /// Number of rows covered.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the same span moved down by `offset` rows.
    pub fn offset(&self, offset: usize) -> Self {
        RowRange::new(self.start + offset, self.end + offset)
    }
}

impl Display for RowRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}
