use crate::database::row::Record;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::sheet::ValueBlock;
use crate::spreadsheet::sheet::ValueRow;

/// Local copy of one sheet's cell values.
///
/// Row 0 holds the header values; records start at row 1. The cache is dense
/// up to the sheet's declared dimensions and every cell defaults to absent.
#[derive(Clone, Debug)]
pub(crate) struct GridCache {
    /// Cell values, `row_count` rows of `column_count` cells
    cells: Vec<ValueRow>,
    /// Declared column count of the last fill or resize
    column_count: usize,
    /// Highest record row holding any value during the last fill, 0 when there is none
    last_row_with_values: usize,
    /// Column names, never longer than `column_count` once loaded
    column_names: Vec<String>,
    /// Whether the cache may differ from the remote sheet
    fetch_pending: bool,
    /// Whether a fill has ever happened
    loaded: bool,
}

impl GridCache {
    pub(crate) fn new() -> Self {
        GridCache {
            cells: Vec::new(),
            column_count: 0,
            last_row_with_values: 0,
            column_names: Vec::new(),
            fetch_pending: true,
            loaded: false,
        }
    }

    /// Replaces the cache with the given blocks, which together describe the
    /// complete current remote range.
    ///
    /// Without blocks nothing is touched and the cache is flagged as pending:
    /// stale data is kept rather than replaced by wrong data.
    pub(crate) fn fill(&mut self, blocks: &[ValueBlock], row_count: usize, column_count: usize) {
        if blocks.is_empty() {
            self.fetch_pending = true;
            return;
        }
        self.fetch_pending = false;
        self.loaded = true;
        self.column_count = column_count;
        self.column_names.truncate(column_count);
        self.cells = vec![vec![None; column_count]; row_count];
        self.last_row_with_values = 0;

        for block in blocks {
            for (offset, values) in block.rows.iter().enumerate() {
                let row = block.start_row + offset;
                if row >= row_count {
                    break;
                }
                for (col_offset, value) in values.iter().enumerate() {
                    let col = block.start_column + col_offset;
                    if col >= column_count {
                        break;
                    }
                    if let Some(value) = value {
                        self.cells[row][col] = Some(value.clone());
                        if row > self.last_row_with_values {
                            self.last_row_with_values = row;
                        }
                    }
                }
            }
        }
    }

    /// Overwrites a `height` × `width` rectangle with values confirmed by the
    /// remote side; positions missing from the block become absent.
    /// Rows beyond the cache are ignored and the watermark is left alone.
    pub(crate) fn patch(&mut self, block: &ValueBlock, height: usize, width: usize) {
        for offset in 0..height {
            let row = block.start_row + offset;
            let Some(cells) = self.cells.get_mut(row) else {
                break;
            };
            for col_offset in 0..width {
                let col = block.start_column + col_offset;
                if let Some(cell) = cells.get_mut(col) {
                    *cell = block.get(offset, col_offset).cloned();
                }
            }
        }
    }

    /// Rewrites the header row from column names; cells past the names are cleared.
    pub(crate) fn patch_header(&mut self, names: &[String]) {
        if self.cells.is_empty() {
            self.cells.push(vec![None; self.column_count]);
        }
        let header = &mut self.cells[0];
        for (col, cell) in header.iter_mut().enumerate() {
            *cell = names
                .get(col)
                .filter(|name| !name.is_empty())
                .map(|name| CellValue::Text(name.to_owned()));
        }
    }

    /// Changes the local dimensions after a remote resize, keeping the values
    /// that still fit. The watermark is clamped to the new row count.
    pub(crate) fn resize(&mut self, row_count: usize, column_count: usize) {
        self.cells.resize(row_count, vec![None; column_count]);
        for row in self.cells.iter_mut() {
            row.resize(column_count, None);
        }
        self.column_count = column_count;
        self.column_names.truncate(column_count);
        self.last_row_with_values = self.last_row_with_values.min(row_count.saturating_sub(1));
    }

    pub(crate) fn mark_pending(&mut self) {
        self.fetch_pending = true;
    }

    pub(crate) fn is_fetch_pending(&self) -> bool {
        self.fetch_pending
    }

    pub(crate) fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub(crate) fn last_row_with_values(&self) -> usize {
        self.last_row_with_values
    }

    pub(crate) fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub(crate) fn set_column_names(&mut self, names: Vec<String>) {
        self.column_names = names;
    }

    /// Value at a cache coordinate (row 0 is the header).
    #[cfg(test)]
    pub(crate) fn get(&self, row: usize, col: usize) -> Option<&CellValue> {
        self.cells.get(row)?.get(col)?.as_ref()
    }

    /// Values of a cache row limited to the named columns.
    pub(crate) fn row_array(&self, row: usize) -> ValueRow {
        let width = self.column_names.len();
        let mut values: ValueRow = self
            .cells
            .get(row)
            .map(|cells| cells.iter().take(width).cloned().collect())
            .unwrap_or_default();
        values.resize(width, None);
        values
    }

    /// A cache row as a record keyed by column name.
    pub(crate) fn record(&self, row: usize) -> Record {
        Record::from_row(&self.column_names, &self.row_array(row))
    }

    /// Every record row from 1 up to the watermark.
    pub(crate) fn records(&self) -> Vec<Record> {
        (1..=self.last_row_with_values).map(|row| self.record(row)).collect()
    }

    /// Every record row from 1 up to the watermark, positionally.
    pub(crate) fn row_arrays(&self) -> Vec<ValueRow> {
        (1..=self.last_row_with_values).map(|row| self.row_array(row)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(value: &str) -> Option<CellValue> {
        Some(CellValue::from(value))
    }

    fn filled() -> GridCache {
        let mut grid = GridCache::new();
        grid.set_column_names(vec!["id".to_owned(), "name".to_owned()]);
        grid.fill(
            &[ValueBlock::new(vec![
                vec![text("id"), text("name")],
                vec![Some(CellValue::from(0)), text("zero")],
                vec![None, None],
                vec![Some(CellValue::from(false))],
            ])],
            10,
            3,
        );
        grid
    }

    #[test]
    fn new_cache_is_pending_and_unloaded() {
        let grid = GridCache::new();
        assert!(grid.is_fetch_pending());
        assert!(!grid.is_loaded());
        assert!(grid.records().is_empty());
    }

    #[test]
    fn fill_tracks_watermark_with_falsy_values() {
        let grid = filled();
        assert!(!grid.is_fetch_pending());
        assert_eq!(grid.last_row_with_values(), 3);
        assert_eq!(grid.get(1, 0), Some(&CellValue::Number(0.0)));
        assert_eq!(grid.get(3, 0), Some(&CellValue::Boolean(false)));
        assert_eq!(grid.get(2, 1), None);
        assert_eq!(grid.records().len(), 3);
    }

    #[test]
    fn fill_without_blocks_keeps_stale_values() {
        let mut grid = filled();
        grid.fill(&[], 10, 3);
        assert!(grid.is_fetch_pending());
        assert_eq!(grid.get(1, 1), Some(&CellValue::from("zero")));
        assert_eq!(grid.last_row_with_values(), 3);
    }

    #[test]
    fn fill_recomputes_watermark() {
        let mut grid = filled();
        grid.fill(&[ValueBlock::new(vec![vec![text("id"), text("name")]])], 10, 3);
        assert_eq!(grid.last_row_with_values(), 0);
        assert_eq!(grid.get(1, 1), None);
        assert!(grid.records().is_empty());
    }

    #[test]
    fn fill_ignores_cells_beyond_dimensions() {
        let mut grid = GridCache::new();
        grid.fill(
            &[ValueBlock::at(1, 1, vec![vec![text("a"), text("b")], vec![text("c")]])],
            2,
            2,
        );
        assert_eq!(grid.get(1, 1), Some(&CellValue::from("a")));
        assert_eq!(grid.get(1, 2), None);
        assert_eq!(grid.last_row_with_values(), 1);
    }

    #[test]
    fn fill_with_fewer_columns_truncates_names() {
        let mut grid = filled();
        grid.fill(&[ValueBlock::new(vec![vec![text("id")]])], 10, 1);
        assert_eq!(grid.column_names(), ["id".to_owned()]);
        assert_eq!(grid.row_array(0), vec![text("id")]);
    }

    #[test]
    fn patch_overwrites_rectangle() {
        let mut grid = filled();
        grid.patch(&ValueBlock::at(1, 0, vec![vec![Some(CellValue::from(5))]]), 1, 2);
        assert_eq!(grid.get(1, 0), Some(&CellValue::Number(5.0)));
        assert_eq!(grid.get(1, 1), None);
        assert!(!grid.is_fetch_pending());
    }

    #[test]
    fn header_patch_and_resize() {
        let mut grid = filled();
        grid.patch_header(&["key".to_owned()]);
        assert_eq!(grid.get(0, 0), Some(&CellValue::from("key")));
        assert_eq!(grid.get(0, 1), None);

        grid.resize(3, 1);
        assert_eq!(grid.last_row_with_values(), 2);
        assert_eq!(grid.column_names(), ["id".to_owned()]);
        assert_eq!(grid.get(1, 1), None);
    }

    #[test]
    fn row_views_follow_column_names() {
        let grid = filled();
        assert_eq!(grid.row_array(1), vec![Some(CellValue::from(0)), text("zero")]);
        let record = grid.record(1);
        assert_eq!(record.get("name"), Some(&CellValue::from("zero")));
        assert_eq!(grid.row_arrays().len(), 3);
    }
}
