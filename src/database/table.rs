//! # Table
//!
//! A [`Table`] maps one remote sheet onto named columns and row-indexed
//! records. Row 1 of the sheet holds the column names; record `0` lives on
//! sheet row 2.
//!
//! Every mutation is sent to the remote side first. Afterwards the cache is
//! either reloaded, patched from values the remote side echoed back, or
//! flagged as pending when the caller asked to skip the reload. Reads never
//! fail because the cache is pending; they return what was last loaded.
use crate::database::coalesce::coalesce_rows;
use crate::database::column::normalize_header_row;
use crate::database::column::validate_column_names;
use crate::database::column::validate_name;
use crate::database::column::ValidationError;
use crate::database::grid::GridCache;
use crate::database::range::Range;
use crate::database::range::RangeError;
use crate::database::range::RowRange;
use crate::database::range::SheetRange;
use crate::database::row::Record;
use crate::database::row::RowInput;
use crate::database::row::Rows;
use crate::error::RemoteContext;
use crate::error::Result;
use crate::remote::BatchReply;
use crate::remote::RangeWrite;
use crate::remote::Request;
use crate::remote::Transport;
use crate::spreadsheet::cell::CellPatch;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::reference::quote_sheet_title;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::sheet::SheetId;
use crate::spreadsheet::sheet::SheetProperties;
use crate::spreadsheet::sheet::ValueRow;
use std::fmt::Debug;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use tracing::info;
use tracing::warn;

/// Errors raised when an operation needs state the table does not have.
#[derive(Error, Debug, PartialEq)]
pub enum StateError {
    #[error("Table '{0}' has not been loaded yet")]
    NotLoaded(String),

    #[error("Table '{0}' has no column names")]
    ColumnNamesNotLoaded(String),

    #[error("Table '{0}' has been dropped")]
    Dropped(String),

    #[error("No table named '{0}'")]
    NoSuchTable(String),
}

/// Receives table lifecycle changes. Called synchronously, before the
/// triggering operation returns.
pub trait TableObserver: Send + Sync {
    fn table_renamed(&self, sheet_id: SheetId, old_title: &str, new_title: &str);

    fn table_dropped(&self, sheet_id: SheetId, title: &str);
}

/// One remote sheet viewed as a table, with its local cell cache.
pub struct Table {
    transport: Arc<dyn Transport>,
    properties: SheetProperties,
    grid: GridCache,
    observer: Option<Arc<dyn TableObserver>>,
    dropped: bool,
}

impl Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("properties", &self.properties)
            .field("column_names", &self.grid.column_names())
            .field("last_row_with_values", &self.grid.last_row_with_values())
            .field("fetch_pending", &self.grid.is_fetch_pending())
            .field("dropped", &self.dropped)
            .finish()
    }
}

impl Table {
    /// Creates a table from a sheet descriptor, filling the cache from its data if any.
    pub fn new(transport: Arc<dyn Transport>, sheet: Sheet) -> Self {
        let mut table = Table {
            transport,
            properties: sheet.properties.clone(),
            grid: GridCache::new(),
            observer: None,
            dropped: false,
        };
        table.absorb(sheet);
        table
    }

    /// Registers the observer notified on rename and drop.
    pub fn set_observer(&mut self, observer: Arc<dyn TableObserver>) {
        self.observer = Some(observer);
    }

    /// Takes a sheet descriptor addressed to this table: properties are
    /// replaced wholesale and the cache is filled from the data blocks.
    /// Descriptors of other sheets are ignored.
    pub(crate) fn absorb(&mut self, sheet: Sheet) {
        if sheet.properties.sheet_id != self.properties.sheet_id {
            warn!(
                sheet_id = self.properties.sheet_id,
                foreign_sheet_id = sheet.properties.sheet_id,
                "ignoring data of another sheet"
            );
            return;
        }
        self.properties = sheet.properties;
        let grid = self.properties.grid_properties;
        self.grid.fill(&sheet.data, grid.row_count, grid.column_count);
    }

    // Properties

    pub fn properties(&self) -> &SheetProperties {
        &self.properties
    }

    pub fn sheet_id(&self) -> SheetId {
        self.properties.sheet_id
    }

    pub fn title(&self) -> &str {
        &self.properties.title
    }

    /// Same as [`Table::title`].
    pub fn name(&self) -> &str {
        self.title()
    }

    /// Position of the sheet among its siblings.
    pub fn index(&self) -> usize {
        self.properties.index
    }

    /// Grid rows, header row included.
    pub fn row_count(&self) -> usize {
        self.properties.grid_properties.row_count
    }

    pub fn column_count(&self) -> usize {
        self.properties.grid_properties.column_count
    }

    /// The title quoted for A1 ranges, e.g. `'Bob''s'`.
    pub fn a1_sheet_name(&self) -> String {
        quote_sheet_title(self.title())
    }

    /// The quoted title encoded for use in a URL query.
    pub fn encoded_a1_sheet_name(&self) -> String {
        url::form_urlencoded::byte_serialize(self.a1_sheet_name().as_bytes()).collect()
    }

    pub fn column_names(&self) -> &[String] {
        self.grid.column_names()
    }

    /// Highest sheet row index (0 = header) holding a value in the last fill.
    pub fn last_row_with_values(&self) -> usize {
        self.grid.last_row_with_values()
    }

    /// Number of records in the cache.
    pub fn record_count(&self) -> usize {
        self.grid.last_row_with_values()
    }

    /// Whether the cache may differ from the remote sheet.
    pub fn is_fetch_pending(&self) -> bool {
        self.grid.is_fetch_pending()
    }

    pub fn is_dropped(&self) -> bool {
        self.dropped
    }

    // Reads

    /// Returns the record at `index` (0-based, header excluded).
    pub fn get_row(&self, index: usize) -> Result<Record> {
        self.ensure_loaded()?;
        self.check_row(index)?;
        Ok(self.grid.record(index + 1))
    }

    /// Returns the values of the record at `index` in column order.
    pub fn get_row_array(&self, index: usize) -> Result<ValueRow> {
        self.ensure_loaded()?;
        self.check_row(index)?;
        Ok(self.grid.row_array(index + 1))
    }

    /// Returns every record, possibly stale when a fetch is pending.
    pub fn get_data(&self) -> Result<Vec<Record>> {
        self.ensure_loaded()?;
        Ok(self.grid.records())
    }

    /// Returns every record as values in column order.
    pub fn get_data_array(&self) -> Result<Vec<ValueRow>> {
        self.ensure_loaded()?;
        Ok(self.grid.row_arrays())
    }

    // Synchronization

    /// Reads the whole sheet and replaces the cache and the properties.
    pub async fn reload(&mut self) -> Result<()> {
        self.ensure_live()?;
        let range = self.full_range();
        debug!(sheet_id = self.sheet_id(), range = %range, "reload");
        match self.transport.fetch_range(&range).await.during("reload")? {
            Some(sheet) if sheet.properties.sheet_id == self.sheet_id() => self.absorb(sheet),
            Some(sheet) => {
                warn!(
                    sheet_id = self.sheet_id(),
                    foreign_sheet_id = sheet.properties.sheet_id,
                    "reload returned another sheet"
                );
                self.grid.mark_pending();
            }
            None => {
                warn!(sheet_id = self.sheet_id(), range = %range, "reload returned no data");
                self.grid.mark_pending();
            }
        }
        Ok(())
    }

    /// Reads the header row and adopts its trimmed values as column names.
    ///
    /// With `enforce_headers` a missing or entirely blank header row is an
    /// error; without it a missing row leaves the column names untouched.
    pub async fn load_column_names(&mut self, enforce_headers: bool) -> Result<()> {
        self.ensure_live()?;
        let width = self.column_count().max(1);
        let range = self.header_range(width);
        debug!(sheet_id = self.sheet_id(), range = %range, "load column names");
        let sheet = self
            .transport
            .fetch_range(&range)
            .await
            .during("load_column_names")?
            .filter(|sheet| sheet.properties.sheet_id == self.sheet_id());

        let Some(values) = sheet.as_ref().and_then(|sheet| header_values(sheet, width)) else {
            if enforce_headers {
                Err(ValidationError::MissingHeaderRow)?;
            }
            warn!(sheet_id = self.sheet_id(), "no header row, keeping column names");
            return Ok(());
        };

        let mut names = normalize_header_row(values);
        if names.is_empty() && enforce_headers {
            Err(ValidationError::BlankHeaders)?;
        }
        if let Some(sheet) = sheet {
            self.properties = sheet.properties;
            if self.grid.is_loaded() {
                self.grid.resize(self.row_count(), self.column_count());
            }
        }
        names.truncate(self.column_count());
        self.adopt_column_names(names);
        Ok(())
    }

    /// Writes a new header row.
    ///
    /// The grid grows first when there are more names than columns; it never
    /// shrinks on its own. Short input clears the remaining header cells.
    /// With `shrink_table`, a sheet wider than the names is afterwards cut to
    /// exactly the names and the current records plus one spare row.
    pub async fn set_column_names<S: AsRef<str>>(&mut self, names: &[S], shrink_table: bool) -> Result<()> {
        self.ensure_live()?;
        let names = validate_column_names(names)?;

        if names.len() > self.column_count() {
            info!(
                sheet_id = self.sheet_id(),
                from = self.column_count(),
                to = names.len(),
                "growing sheet to fit column names"
            );
            let request = Request::resize_sheet(self.sheet_id(), self.row_count().max(1), names.len());
            self.mutate_structure(vec![request], "set_column_names").await?;
        }

        let width = self.column_count();
        let mut cells: Vec<CellPatch> = names
            .iter()
            .map(|name| match name.is_empty() {
                true => CellPatch::Clear,
                false => CellPatch::Set(CellValue::Text(name.to_owned())),
            })
            .collect();
        cells.resize(width, CellPatch::Clear);
        let write = RangeWrite {
            range: self.header_range(width),
            rows: vec![cells],
        };
        debug!(sheet_id = self.sheet_id(), range = %write.range, "write column names");
        let echo = self
            .transport
            .write_range(write, true)
            .await
            .during("set_column_names")?;

        let adopted = match echo {
            Some(block) => normalize_header_row(
                (0..width).map(|col| block.get(0, col).map(ToString::to_string).unwrap_or_default()),
            ),
            None => normalize_header_row(names.iter().cloned()),
        };
        self.adopt_column_names(adopted);

        if shrink_table && names.len() < self.column_count() {
            let rows = self.grid.last_row_with_values() + 2;
            self.resize(rows, names.len()).await?;
        }
        Ok(())
    }

    /// Resizes the sheet to the column names and the current records plus one spare row.
    pub async fn shrink_sheet_to_fit_table(&mut self) -> Result<()> {
        self.ensure_loaded()?;
        let columns = self.grid.column_names().len();
        if columns == 0 {
            Err(StateError::ColumnNamesNotLoaded(self.title().to_owned()))?;
        }
        let rows = self.grid.last_row_with_values() + 2;
        self.resize(rows, columns).await
    }

    /// Changes the grid dimensions of the sheet. Values outside the new grid are lost.
    pub async fn resize(&mut self, row_count: usize, column_count: usize) -> Result<()> {
        self.ensure_live()?;
        info!(sheet_id = self.sheet_id(), row_count, column_count, "resizing sheet");
        let request = Request::resize_sheet(self.sheet_id(), row_count, column_count);
        let reply = self.mutate_structure(vec![request], "resize").await?;
        if reply.updated_sheet(self.sheet_id()).is_none() {
            self.properties.grid_properties.row_count = row_count;
            self.properties.grid_properties.column_count = column_count;
        }
        self.grid.resize(self.row_count(), self.column_count());
        Ok(())
    }

    // Row mutations

    /// Appends one or more rows after the last record.
    ///
    /// Keyed rows are laid out by column name and missing keys stay empty.
    /// With `refetch` the table is reloaded afterwards, otherwise the cache is
    /// left as it was and flagged as pending.
    pub async fn insert(&mut self, rows: impl Into<Rows>, refetch: bool) -> Result<()> {
        self.ensure_live()?;
        let Rows(rows) = rows.into();
        let values = rows
            .iter()
            .map(|row| row.to_positional(self.grid.column_names(), self.column_count()))
            .collect::<Result<Vec<ValueRow>>>()?;
        if values.is_empty() {
            return Ok(());
        }
        let range = self.columns_range();
        debug!(sheet_id = self.sheet_id(), range = %range, rows = values.len(), "append rows");
        self.transport
            .append_rows(&range, values)
            .await
            .during("insert")?;
        self.resync(refetch).await
    }

    /// Deletes the record at `index`.
    pub async fn delete_row(&mut self, index: usize, refetch: bool) -> Result<()> {
        self.ensure_loaded()?;
        let end = index.checked_add(1).ok_or(RangeError::RowIndexOutOfRange {
            index,
            count: self.grid.last_row_with_values(),
        })?;
        self.delete_row_range(index, end, refetch).await
    }

    /// Deletes the records in `[start, end)`.
    pub async fn delete_row_range(&mut self, start: usize, end: usize, refetch: bool) -> Result<()> {
        self.ensure_loaded()?;
        if start >= end {
            Err(RangeError::EmptyRowRange { start, end })?;
        }
        self.check_row(end - 1)?;
        let rows = RowRange::new(start, end).offset(1);
        debug!(sheet_id = self.sheet_id(), rows = %rows, "delete rows");
        self.transport
            .batch_mutate(vec![Request::delete_rows(self.sheet_id(), rows)], false)
            .await
            .during("delete_row_range")?;
        self.resync(refetch).await
    }

    /// Deletes the records at the given indices with one batch of range
    /// deletions, then reloads the table.
    pub async fn delete_rows(&mut self, indices: &[usize], sorted: bool) -> Result<()> {
        self.ensure_loaded()?;
        if indices.is_empty() {
            return Ok(());
        }
        for index in indices {
            self.check_row(*index)?;
        }
        let requests: Vec<Request> = coalesce_rows(indices, sorted)
            .into_iter()
            .map(|range| Request::delete_rows(self.sheet_id(), range.offset(1)))
            .collect();
        debug!(sheet_id = self.sheet_id(), ranges = requests.len(), "delete scattered rows");
        self.transport
            .batch_mutate(requests, false)
            .await
            .during("delete_rows")?;
        self.reload().await
    }

    /// Deletes every record the predicate accepts.
    pub async fn delete_rows_where<F>(&mut self, predicate: F) -> Result<()>
    where
        F: Fn(&Record) -> bool,
    {
        let indices: Vec<usize> = self
            .get_data()?
            .iter()
            .enumerate()
            .filter(|(_, record)| predicate(*record))
            .map(|(index, _)| index)
            .collect();
        self.delete_rows(&indices, true).await
    }

    /// Updates the record at `index`.
    ///
    /// Positional input overwrites the positions it covers; keyed input only
    /// the named columns. The cache is patched from the values the remote side
    /// confirms, without a reload.
    pub async fn update_row(&mut self, index: usize, row: RowInput) -> Result<()> {
        self.update_rows(&[index], |_| row.clone()).await
    }

    /// Updates several records with one batched write. The generator receives
    /// the current cached record and returns the changes for it.
    pub async fn update_rows<F>(&mut self, indices: &[usize], mut generator: F) -> Result<()>
    where
        F: FnMut(&Record) -> RowInput,
    {
        self.ensure_loaded()?;
        for index in indices {
            self.check_row(*index)?;
        }
        let mut writes = Vec::with_capacity(indices.len());
        for index in indices {
            let record = self.grid.record(*index + 1);
            let cells = generator(&record).to_patch(self.grid.column_names(), self.column_count())?;
            if cells.is_empty() {
                continue;
            }
            writes.push(RangeWrite {
                range: self.row_range(*index, cells.len()),
                rows: vec![cells],
            });
        }
        if writes.is_empty() {
            return Ok(());
        }

        let shapes: Vec<(usize, usize)> = writes
            .iter()
            .map(|write| (write.range.range.row_lower_bound.unwrap_or(0), write.rows[0].len()))
            .collect();
        debug!(sheet_id = self.sheet_id(), rows = writes.len(), "update rows");
        let echoes = self
            .transport
            .write_ranges(writes, true)
            .await
            .during("update_rows")?;

        if echoes.len() != shapes.len() {
            warn!(sheet_id = self.sheet_id(), "update echo does not match the writes");
            self.grid.mark_pending();
            return Ok(());
        }
        for ((row, width), echo) in shapes.into_iter().zip(echoes) {
            match echo {
                Some(mut block) => {
                    block.start_row = row;
                    block.start_column = 0;
                    self.grid.patch(&block, 1, width);
                }
                None => self.grid.mark_pending(),
            }
        }
        Ok(())
    }

    /// Removes every record value, keeping the header row.
    pub async fn clear(&mut self, refetch: bool) -> Result<()> {
        self.ensure_live()?;
        let range = self.data_range();
        debug!(sheet_id = self.sheet_id(), range = %range, "clear");
        self.transport.clear_range(&range).await.during("clear")?;
        self.resync(refetch).await
    }

    // Lifecycle

    /// Renames the sheet and notifies the observer.
    pub async fn rename(&mut self, new_title: &str) -> Result<()> {
        self.ensure_live()?;
        validate_name(new_title)?;
        if new_title == self.title() {
            return Ok(());
        }
        let old_title = self.title().to_owned();
        let reply = self
            .mutate_structure(vec![Request::rename_sheet(self.sheet_id(), new_title)], "rename")
            .await?;
        if reply.updated_sheet(self.sheet_id()).is_none() {
            self.properties.title = new_title.to_owned();
        }
        info!(sheet_id = self.sheet_id(), from = %old_title, to = new_title, "table renamed");
        if let Some(observer) = &self.observer {
            observer.table_renamed(self.sheet_id(), &old_title, new_title);
        }
        Ok(())
    }

    /// Deletes the sheet and notifies the observer. Every later operation fails.
    pub async fn drop(&mut self) -> Result<()> {
        self.ensure_live()?;
        self.transport
            .batch_mutate(vec![Request::delete_sheet(self.sheet_id())], false)
            .await
            .during("drop")?;
        self.dropped = true;
        self.grid.mark_pending();
        info!(sheet_id = self.sheet_id(), title = self.title(), "table dropped");
        if let Some(observer) = &self.observer {
            observer.table_dropped(self.sheet_id(), self.title());
        }
        Ok(())
    }

    // Helpers

    /// Sends structural requests asking for an echo and takes this sheet's new state from it.
    async fn mutate_structure(&mut self, requests: Vec<Request>, operation: &'static str) -> Result<BatchReply> {
        debug!(sheet_id = self.sheet_id(), requests = requests.len(), operation, "batch update");
        let reply = self
            .transport
            .batch_mutate(requests, true)
            .await
            .during(operation)?;
        if let Some(sheet) = reply.updated_sheet(self.sheet_id()) {
            self.absorb(sheet.clone());
        }
        Ok(reply)
    }

    /// Reloads after a mutation, or flags the cache as pending.
    async fn resync(&mut self, refetch: bool) -> Result<()> {
        if refetch {
            self.reload().await
        } else {
            self.grid.mark_pending();
            Ok(())
        }
    }

    fn adopt_column_names(&mut self, names: Vec<String>) {
        if self.grid.is_loaded() {
            self.grid.patch_header(&names);
        }
        self.grid.set_column_names(names);
    }

    fn ensure_live(&self) -> Result<()> {
        if self.dropped {
            Err(StateError::Dropped(self.title().to_owned()))?;
        }
        Ok(())
    }

    fn ensure_loaded(&self) -> Result<()> {
        self.ensure_live()?;
        if !self.grid.is_loaded() {
            Err(StateError::NotLoaded(self.title().to_owned()))?;
        }
        Ok(())
    }

    fn check_row(&self, index: usize) -> Result<()> {
        let count = self.grid.last_row_with_values();
        if index >= count {
            Err(RangeError::RowIndexOutOfRange { index, count })?;
        }
        Ok(())
    }

    fn last_col(&self) -> usize {
        self.column_count().max(1) - 1
    }

    /// Every row of the table's columns, e.g. `'people'!A1:C`. Open ended so
    /// rows added remotely since the last fetch are included.
    fn full_range(&self) -> SheetRange {
        self.rows_from(0)
    }

    /// The header row over `width` columns, e.g. `'people'!A1:C1`.
    fn header_range(&self, width: usize) -> SheetRange {
        SheetRange::new(self.title(), Range::cells(0, 0, 0, width.max(1) - 1))
    }

    /// Every record row, e.g. `'people'!A2:C`.
    fn data_range(&self) -> SheetRange {
        self.rows_from(1)
    }

    fn rows_from(&self, row: usize) -> SheetRange {
        let range = Range {
            row_lower_bound: Some(row),
            row_upper_bound: None,
            col_lower_bound: Some(0),
            col_upper_bound: Some(self.last_col()),
        };
        SheetRange::new(self.title(), range)
    }

    /// Whole columns of the table, e.g. `'people'!A:C`.
    fn columns_range(&self) -> SheetRange {
        let range = Range {
            row_lower_bound: None,
            row_upper_bound: None,
            col_lower_bound: Some(0),
            col_upper_bound: Some(self.last_col()),
        };
        SheetRange::new(self.title(), range)
    }

    /// One record row over `width` columns.
    fn row_range(&self, index: usize, width: usize) -> SheetRange {
        let row = index + 1;
        SheetRange::new(self.title(), Range::cells(row, 0, row, width.max(1) - 1))
    }
}

/// Header cells of the first row in a fetched sheet, as text. `None` when the
/// response carries no rows at all.
fn header_values(sheet: &Sheet, width: usize) -> Option<Vec<String>> {
    let blocks: Vec<_> = sheet
        .data
        .iter()
        .filter(|block| block.start_row == 0 && !block.is_empty())
        .collect();
    if blocks.is_empty() {
        return None;
    }
    Some(
        (0..width)
            .map(|col| {
                blocks
                    .iter()
                    .find_map(|block| col.checked_sub(block.start_column).and_then(|offset| block.get(0, offset)))
                    .map(ToString::to_string)
                    .unwrap_or_default()
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SheetDbError;
    use crate::remote::memory::MemoryTransport;
    use crate::remote::RemoteErrorKind;
    use parking_lot::Mutex;

    fn number(value: i32) -> Option<CellValue> {
        Some(CellValue::from(value))
    }

    fn text(value: &str) -> Option<CellValue> {
        Some(CellValue::from(value))
    }

    /// A sheet `letters` with header `index, letter, rowNo` and six records.
    fn seeded() -> Arc<MemoryTransport> {
        let mut rows = vec![vec![text("index"), text("letter"), text("rowNo")]];
        for number_value in 0..6 {
            rows.push(vec![
                number(number_value),
                Some(CellValue::from(format!("row{number_value}"))),
                number(number_value + 1),
            ]);
        }
        Arc::new(MemoryTransport::new("document").with_sheet("letters", rows, 20, 3))
    }

    async fn open(transport: &Arc<MemoryTransport>) -> Table {
        let listing = transport.fetch_spreadsheet(true).await.unwrap();
        let sheet = listing.sheets.into_iter().next().unwrap();
        let mut table = Table::new(transport.clone(), sheet);
        table.load_column_names(true).await.unwrap();
        table
    }

    fn indices(table: &Table) -> Vec<f64> {
        table
            .get_data()
            .unwrap()
            .iter()
            .map(|record| record.get("index").and_then(CellValue::as_number).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn loads_records_keyed_by_column_names() {
        let transport = seeded();
        let table = open(&transport).await;
        assert_eq!(table.column_names(), ["index", "letter", "rowNo"]);
        assert_eq!(table.record_count(), 6);
        assert!(!table.is_fetch_pending());

        let record = table.get_row(0).unwrap();
        assert_eq!(record.get("index"), Some(&CellValue::Number(0.0)));
        assert_eq!(record.get("letter"), Some(&CellValue::from("row0")));
        assert_eq!(table.get_data_array().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn property_accessors() {
        let transport = seeded();
        let table = open(&transport).await;
        assert_eq!(table.title(), "letters");
        assert_eq!(table.name(), "letters");
        assert_eq!(table.index(), 0);
        assert_eq!(table.row_count(), 20);
        assert_eq!(table.column_count(), 3);
        assert_eq!(table.a1_sheet_name(), "'letters'");
        assert_eq!(table.encoded_a1_sheet_name(), "%27letters%27");
    }

    #[tokio::test]
    async fn get_row_out_of_range() {
        let transport = seeded();
        let table = open(&transport).await;
        assert!(matches!(
            table.get_row(6),
            Err(SheetDbError::Range(RangeError::RowIndexOutOfRange { index: 6, count: 6 }))
        ));
    }

    #[tokio::test]
    async fn reading_before_any_fill_is_a_state_error() {
        let transport = seeded();
        let listing = transport.fetch_spreadsheet(false).await.unwrap();
        let table = Table::new(transport.clone(), listing.sheets[0].clone());
        assert!(table.is_fetch_pending());
        assert!(matches!(
            table.get_data(),
            Err(SheetDbError::State(StateError::NotLoaded(_)))
        ));
    }

    #[tokio::test]
    async fn load_column_names_is_idempotent() {
        let transport = seeded();
        let mut table = open(&transport).await;
        let first = table.column_names().to_vec();
        table.load_column_names(false).await.unwrap();
        assert_eq!(table.column_names(), first.as_slice());
    }

    #[tokio::test]
    async fn missing_header_row() {
        let transport = Arc::new(MemoryTransport::new("document").with_sheet("empty", vec![], 10, 2));
        let listing = transport.fetch_spreadsheet(true).await.unwrap();
        let mut table = Table::new(transport.clone(), listing.sheets[0].clone());

        assert!(matches!(
            table.load_column_names(true).await,
            Err(SheetDbError::Validation(ValidationError::MissingHeaderRow))
        ));
        table.load_column_names(false).await.unwrap();
        assert!(table.column_names().is_empty());
    }

    #[tokio::test]
    async fn blank_header_row() {
        let transport = Arc::new(MemoryTransport::new("document").with_sheet(
            "blank",
            vec![vec![text("  "), text("")]],
            10,
            2,
        ));
        let listing = transport.fetch_spreadsheet(true).await.unwrap();
        let mut table = Table::new(transport.clone(), listing.sheets[0].clone());
        assert!(matches!(
            table.load_column_names(true).await,
            Err(SheetDbError::Validation(ValidationError::BlankHeaders))
        ));
    }

    #[tokio::test]
    async fn header_values_are_trimmed() {
        let transport = Arc::new(MemoryTransport::new("document").with_sheet(
            "padded",
            vec![vec![text(" id "), text("name  ")]],
            10,
            4,
        ));
        let listing = transport.fetch_spreadsheet(true).await.unwrap();
        let mut table = Table::new(transport.clone(), listing.sheets[0].clone());
        table.load_column_names(true).await.unwrap();
        assert_eq!(table.column_names(), ["id", "name"]);
    }

    #[tokio::test]
    async fn insert_with_refetch_shows_the_new_row() {
        let transport = seeded();
        let mut table = open(&transport).await;
        table.insert(RowInput::values([CellValue::from(6), "letter6".into(), 7.into()]), true).await.unwrap();
        assert_eq!(table.record_count(), 7);
        assert_eq!(table.get_row(6).unwrap().get("letter"), Some(&CellValue::from("letter6")));

        table.insert(RowInput::keyed([("rowNo", CellValue::from(101)), ("index", 100.into())]), true).await.unwrap();
        let last = table.get_row(7).unwrap();
        assert_eq!(last.get("index"), Some(&CellValue::Number(100.0)));
        assert_eq!(last.get("letter"), None);
    }

    #[tokio::test]
    async fn insert_many_rows_at_once() {
        let transport = seeded();
        let mut table = open(&transport).await;
        let rows = vec![
            RowInput::keyed([("index", CellValue::from(500)), ("letter", "object".into())]),
            RowInput::values([CellValue::from(501), "array".into(), 501.into()]),
        ];
        table.insert(rows, true).await.unwrap();
        let data = table.get_data().unwrap();
        assert_eq!(data.len(), 8);
        assert_eq!(data[7].get("letter"), Some(&CellValue::from("array")));
    }

    #[tokio::test]
    async fn insert_without_refetch_leaves_cache_pending() {
        let transport = seeded();
        let mut table = open(&transport).await;
        table.insert(RowInput::values([7, 7, 7]), false).await.unwrap();
        assert!(table.is_fetch_pending());
        assert_eq!(table.get_data().unwrap().len(), 6);

        table.reload().await.unwrap();
        assert!(!table.is_fetch_pending());
        assert_eq!(table.get_data().unwrap().len(), 7);
    }

    #[tokio::test]
    async fn insert_validates_before_calling_remote() {
        let transport = seeded();
        let mut table = open(&transport).await;
        let calls = transport.call_count();
        let result = table.insert(RowInput::keyed([("unknown", 1)]), true).await;
        assert!(matches!(
            result,
            Err(SheetDbError::Validation(ValidationError::UnknownColumn(_)))
        ));
        assert_eq!(transport.call_count(), calls);
    }

    #[tokio::test]
    async fn delete_single_row_and_range() {
        let transport = seeded();
        let mut table = open(&transport).await;
        table.delete_row(4, true).await.unwrap();
        assert_eq!(indices(&table), vec![0.0, 1.0, 2.0, 3.0, 5.0]);

        table.delete_row_range(0, 3, true).await.unwrap();
        assert_eq!(indices(&table), vec![3.0, 5.0]);
    }

    #[tokio::test]
    async fn delete_range_is_checked_against_watermark() {
        let transport = seeded();
        let mut table = open(&transport).await;
        let calls = transport.call_count();
        assert!(matches!(
            table.delete_row_range(4, 7, true).await,
            Err(SheetDbError::Range(RangeError::RowIndexOutOfRange { index: 6, count: 6 }))
        ));
        assert!(matches!(
            table.delete_row_range(3, 3, true).await,
            Err(SheetDbError::Range(RangeError::EmptyRowRange { start: 3, end: 3 }))
        ));
        assert_eq!(transport.call_count(), calls);
    }

    #[tokio::test]
    async fn delete_without_refetch_marks_pending() {
        let transport = seeded();
        let mut table = open(&transport).await;
        table.delete_row(0, false).await.unwrap();
        assert!(table.is_fetch_pending());
        assert_eq!(table.record_count(), 6);
    }

    #[tokio::test]
    async fn delete_scattered_rows_in_one_batch() {
        let transport = seeded();
        let mut table = open(&transport).await;
        let calls = transport.call_count();
        table.delete_rows(&[5, 0, 2, 1], false).await.unwrap();
        assert_eq!(indices(&table), vec![3.0, 4.0]);
        // one batch plus one reload
        assert_eq!(transport.call_count(), calls + 2);
        assert!(!table.is_fetch_pending());
    }

    #[tokio::test]
    async fn delete_rows_where_predicate() {
        let transport = seeded();
        let mut table = open(&transport).await;
        table
            .delete_rows_where(|record| {
                record
                    .get("index")
                    .and_then(CellValue::as_number)
                    .map(|index| index as i64 % 2 == 0)
                    .unwrap_or(false)
            })
            .await
            .unwrap();
        assert_eq!(indices(&table), vec![1.0, 3.0, 5.0]);
    }

    #[tokio::test]
    async fn update_row_positional_and_keyed() {
        let transport = seeded();
        let mut table = open(&transport).await;
        let calls = transport.call_count();

        table.update_row(0, RowInput::Positional(vec![number(1), None])).await.unwrap();
        let record = table.get_row(0).unwrap();
        assert_eq!(record.get("index"), Some(&CellValue::Number(1.0)));
        assert_eq!(record.get("letter"), None);
        assert_eq!(record.get("rowNo"), Some(&CellValue::Number(1.0)));

        table.update_row(0, RowInput::keyed([("letter", "changed")])).await.unwrap();
        let record = table.get_row(0).unwrap();
        assert_eq!(record.get("letter"), Some(&CellValue::from("changed")));
        assert_eq!(record.get("index"), Some(&CellValue::Number(1.0)));

        // patched from the echo, no reload
        assert_eq!(transport.call_count(), calls + 2);
        assert!(!table.is_fetch_pending());
        assert_eq!(
            transport.sheet_values("letters").unwrap()[1],
            vec![number(1), text("changed"), number(1)]
        );
    }

    #[tokio::test]
    async fn update_rows_from_generator() {
        let transport = seeded();
        let mut table = open(&transport).await;
        table
            .update_rows(&[0, 1, 2], |record| {
                let index = record.get("index").cloned();
                let mut keyed = std::collections::HashMap::new();
                keyed.insert("letter".to_owned(), index);
                RowInput::Keyed(keyed)
            })
            .await
            .unwrap();
        let letters: Vec<_> = table
            .get_data()
            .unwrap()
            .iter()
            .take(3)
            .map(|record| record.get("letter").cloned())
            .collect();
        assert_eq!(letters, vec![number(0), number(1), number(2)]);
    }

    #[tokio::test]
    async fn clear_keeps_headers() {
        let transport = seeded();
        let mut table = open(&transport).await;
        table.clear(true).await.unwrap();
        assert!(table.get_data().unwrap().is_empty());
        assert_eq!(table.column_names(), ["index", "letter", "rowNo"]);
        assert_eq!(transport.sheet_values("letters").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn set_column_names_grows_columns() {
        let transport = seeded();
        let mut table = open(&transport).await;
        table.set_column_names(&["index", "letter", "rowNo", "extra"], false).await.unwrap();
        assert_eq!(table.column_count(), 4);
        assert_eq!(table.column_names(), ["index", "letter", "rowNo", "extra"]);
        assert_eq!(table.get_row(0).unwrap().get("extra"), None);
    }

    #[tokio::test]
    async fn set_column_names_clears_trailing_headers() {
        let transport = seeded();
        let mut table = open(&transport).await;
        table.set_column_names(&["a", "b"], false).await.unwrap();
        assert_eq!(table.column_count(), 3);
        assert_eq!(table.column_names(), ["a", "b"]);
        assert_eq!(
            transport.sheet_values("letters").unwrap()[0],
            vec![text("a"), text("b"), None]
        );
    }

    #[tokio::test]
    async fn set_column_names_with_shrink() {
        let transport = seeded();
        let mut table = open(&transport).await;
        table.set_column_names(&["a", "b"], true).await.unwrap();
        assert_eq!(table.column_count(), 2);
        assert_eq!(table.row_count(), table.last_row_with_values() + 2);
        assert_eq!(table.row_count(), 8);
        assert_eq!(table.column_names(), ["a", "b"]);
    }

    #[tokio::test]
    async fn set_column_names_rejects_bad_headers() {
        let transport = seeded();
        let mut table = open(&transport).await;
        let calls = transport.call_count();
        assert!(matches!(
            table.set_column_names(&["header@1", "header2"], false).await,
            Err(SheetDbError::Validation(ValidationError::InvalidName(_)))
        ));
        assert!(matches!(
            table.set_column_names(&["a", "a "], false).await,
            Err(SheetDbError::Validation(ValidationError::DuplicateHeader(_)))
        ));
        assert_eq!(transport.call_count(), calls);
    }

    #[tokio::test]
    async fn shrink_to_fit() {
        let transport = seeded();
        let mut table = open(&transport).await;
        table.shrink_sheet_to_fit_table().await.unwrap();
        assert_eq!(table.row_count(), 8);
        assert_eq!(table.column_count(), 3);
        assert_eq!(table.get_data().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn remote_errors_carry_the_operation() {
        let transport = seeded();
        let mut table = open(&transport).await;
        transport.fail_next(RemoteErrorKind::RateLimited);
        let error = table.reload().await.unwrap_err();
        assert_eq!(error.remote_kind(), Some(RemoteErrorKind::RateLimited));
        assert!(matches!(error, SheetDbError::Remote { operation: "reload", .. }));
        assert!(!table.is_fetch_pending());
    }

    struct Recorder(Mutex<Vec<String>>);

    impl TableObserver for Recorder {
        fn table_renamed(&self, _: SheetId, old_title: &str, new_title: &str) {
            self.0.lock().push(format!("renamed {old_title} {new_title}"));
        }

        fn table_dropped(&self, _: SheetId, title: &str) {
            self.0.lock().push(format!("dropped {title}"));
        }
    }

    #[tokio::test]
    async fn lifecycle_notifies_observer() {
        let transport = seeded();
        let mut table = open(&transport).await;
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        table.set_observer(recorder.clone());

        table.rename("digits").await.unwrap();
        assert_eq!(table.title(), "digits");
        assert!(transport.sheet_properties("digits").is_some());

        assert!(matches!(
            table.rename("bad name!").await,
            Err(SheetDbError::Validation(ValidationError::InvalidName(_)))
        ));

        table.drop().await.unwrap();
        assert!(table.is_dropped());
        assert!(transport.sheet_properties("digits").is_none());
        assert!(matches!(
            table.reload().await,
            Err(SheetDbError::State(StateError::Dropped(_)))
        ));
        assert_eq!(*recorder.0.lock(), vec!["renamed letters digits", "dropped digits"]);
    }

    #[tokio::test]
    async fn insert_into_a_full_grid_grows_and_reloads() {
        let rows = vec![
            vec![text("index")],
            vec![number(0)],
            vec![number(1)],
            vec![number(2)],
        ];
        let transport = Arc::new(MemoryTransport::new("document").with_sheet("full", rows, 4, 1));
        let mut table = open(&transport).await;
        assert_eq!(table.row_count(), 4);

        table.insert(RowInput::values([99]), true).await.unwrap();
        assert_eq!(table.row_count(), 5);
        assert_eq!(table.record_count(), 4);
        assert!(!table.is_fetch_pending());
        assert_eq!(table.get_row(3).unwrap().get("index"), Some(&CellValue::Number(99.0)));
    }

    #[tokio::test]
    async fn clear_reaches_rows_added_since_the_last_fetch() {
        let transport = seeded();
        let mut table = open(&transport).await;
        assert_eq!(table.full_range().to_string(), "'letters'!A1:C");
        assert_eq!(table.data_range().to_string(), "'letters'!A2:C");
        let letters = transport.sheet_properties("letters").unwrap().sheet_id;
        transport
            .batch_mutate(vec![Request::resize_sheet(letters, 30, 3)], false)
            .await
            .unwrap();
        transport.set_cell("letters", 25, 0, number(25));

        table.clear(true).await.unwrap();
        assert_eq!(transport.sheet_values("letters").unwrap().len(), 1);
        assert_eq!(table.row_count(), 30);
        assert!(table.get_data().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_rows_ignores_a_wrong_sorted_hint() {
        let transport = seeded();
        let mut table = open(&transport).await;
        table.delete_rows(&[3, 1], true).await.unwrap();
        assert_eq!(indices(&table), vec![0.0, 2.0, 4.0, 5.0]);

        table.delete_rows(&[3, 0], true).await.unwrap();
        assert_eq!(indices(&table), vec![2.0, 4.0]);
    }

    #[tokio::test]
    async fn delete_row_at_the_largest_index_is_out_of_range() {
        let transport = seeded();
        let mut table = open(&transport).await;
        let calls = transport.call_count();
        assert!(matches!(
            table.delete_row(usize::MAX, true).await,
            Err(SheetDbError::Range(RangeError::RowIndexOutOfRange { index: usize::MAX, count: 6 }))
        ));
        assert_eq!(transport.call_count(), calls);
    }

    #[tokio::test]
    async fn external_shrink_keeps_names_within_columns() {
        let transport = seeded();
        let mut table = open(&transport).await;
        let letters = transport.sheet_properties("letters").unwrap().sheet_id;
        transport
            .batch_mutate(vec![Request::resize_sheet(letters, 20, 2)], false)
            .await
            .unwrap();

        table.load_column_names(true).await.unwrap();
        assert_eq!(table.column_count(), 2);
        assert_eq!(table.column_names(), ["index", "letter"]);
        assert_eq!(table.get_row_array(0).unwrap().len(), 2);

        table.set_column_names(&["index", "letter"], false).await.unwrap();
        transport
            .batch_mutate(vec![Request::resize_sheet(letters, 20, 1)], false)
            .await
            .unwrap();
        table.reload().await.unwrap();
        assert_eq!(table.column_count(), 1);
        assert_eq!(table.column_names(), ["index"]);
    }

    #[tokio::test]
    async fn records_round_trip_through_updates() {
        let transport = Arc::new(MemoryTransport::new("document").with_sheet(
            "gaps",
            vec![
                vec![text("id"), None, text("name")],
                vec![number(1), text("hidden"), text("ada")],
            ],
            10,
            3,
        ));
        let mut table = open(&transport).await;
        assert_eq!(table.column_names(), ["id", "", "name"]);

        let record = table.get_row(0).unwrap();
        assert_eq!(record.get("name"), Some(&CellValue::from("ada")));
        table.update_row(0, record.into()).await.unwrap();
        assert_eq!(
            transport.sheet_values("gaps").unwrap()[1],
            vec![number(1), text("hidden"), text("ada")]
        );

        let record = Record::from_row(table.column_names(), &[number(2), None, text("grace")]);
        table.update_row(0, record.into()).await.unwrap();
        assert_eq!(
            transport.sheet_values("gaps").unwrap()[1],
            vec![number(2), text("hidden"), text("grace")]
        );
    }

    #[tokio::test]
    async fn zero_and_false_are_not_absent() {
        let transport = Arc::new(MemoryTransport::new("document").with_sheet(
            "falsy",
            vec![
                vec![text("n"), text("b")],
                vec![number(0), Some(CellValue::from(false))],
                vec![None, None],
                vec![None, Some(CellValue::from(""))],
            ],
            10,
            2,
        ));
        let mut table = open(&transport).await;
        assert_eq!(table.record_count(), 3);
        assert_eq!(table.get_row(0).unwrap().get("n"), Some(&CellValue::Number(0.0)));
        assert_eq!(table.get_row(2).unwrap().get("b"), Some(&CellValue::from("")));
        table.reload().await.unwrap();
        assert_eq!(table.record_count(), 3);
    }
}
