use crate::spreadsheet::cell::CellValue;
use serde::Deserialize;
use serde::Serialize;

/// Remote identifier of a sheet inside its spreadsheet document.
pub type SheetId = i64;

/// One row of cell values; `None` marks a cell without a value.
pub type ValueRow = Vec<Option<CellValue>>;

/// Dimensions of a sheet's grid.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridProperties {
    /// Number of rows in the grid, header row included
    pub row_count: usize,
    /// Number of columns in the grid
    pub column_count: usize,
}

/// Properties of a sheet as reported by the remote resource.
///
/// The remote side owns this record: a table replaces its copy wholesale
/// whenever a new one arrives and never merges individual fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetProperties {
    pub sheet_id: SheetId,
    pub title: String,
    /// Position of the sheet among its siblings (0-based)
    pub index: usize,
    pub grid_properties: GridProperties,
}

/// A rectangular block of values anchored at a 0-based grid coordinate.
///
/// Rows may be shorter than the block's width and the block may have fewer
/// rows than requested; missing positions are cells without a value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueBlock {
    #[serde(default)]
    pub start_row: usize,
    #[serde(default)]
    pub start_column: usize,
    #[serde(default)]
    pub rows: Vec<ValueRow>,
}

impl ValueBlock {
    /// Creates a block anchored at the top-left cell of the grid.
    pub fn new(rows: Vec<ValueRow>) -> Self {
        ValueBlock {
            start_row: 0,
            start_column: 0,
            rows,
        }
    }

    /// Creates a block anchored at the given 0-based coordinate.
    pub fn at(start_row: usize, start_column: usize, rows: Vec<ValueRow>) -> Self {
        ValueBlock {
            start_row,
            start_column,
            rows,
        }
    }

    /// Returns the value at a block-relative coordinate.
    pub fn get(&self, row: usize, col: usize) -> Option<&CellValue> {
        self.rows.get(row)?.get(col)?.as_ref()
    }

    /// Returns true if the block carries no rows at all.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A sheet descriptor: properties plus whatever value blocks were requested.
///
/// An empty `data` vector means no values were fetched, which is different
/// from a fetched block that happens to have no rows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sheet {
    pub properties: SheetProperties,
    #[serde(default)]
    pub data: Vec<ValueBlock>,
}
