use crate::database::range::Range;
use crate::database::range::SheetRange;
use crate::remote::request::AddSheetReply;
use crate::remote::request::Dimension;
use crate::remote::BatchReply;
use crate::remote::RangeWrite;
use crate::remote::RemoteErrorKind;
use crate::remote::Reply;
use crate::remote::Request;
use crate::remote::Transport;
use crate::remote::TransportError;
use crate::spreadsheet::cell::CellPatch;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::sheet::GridProperties;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::sheet::SheetId;
use crate::spreadsheet::sheet::SheetProperties;
use crate::spreadsheet::sheet::ValueBlock;
use crate::spreadsheet::sheet::ValueRow;
use crate::spreadsheet::Spreadsheet;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use tracing::trace;

fn malformed(message: String) -> TransportError {
    TransportError::msg(RemoteErrorKind::MalformedRequest, message)
}

/// A sheet with dense cells, `row_count` rows of `column_count` cells.
#[derive(Clone, Debug)]
struct MemorySheet {
    properties: SheetProperties,
    cells: Vec<ValueRow>,
}

impl MemorySheet {
    fn new(properties: SheetProperties) -> Self {
        let GridProperties {
            row_count,
            column_count,
        } = properties.grid_properties;
        MemorySheet {
            properties,
            cells: vec![vec![None; column_count]; row_count],
        }
    }

    fn row_count(&self) -> usize {
        self.properties.grid_properties.row_count
    }

    fn column_count(&self) -> usize {
        self.properties.grid_properties.column_count
    }

    fn resize(&mut self, row_count: usize, column_count: usize) {
        self.cells.resize(row_count, vec![None; column_count]);
        for row in self.cells.iter_mut() {
            row.resize(column_count, None);
        }
        self.properties.grid_properties = GridProperties {
            row_count,
            column_count,
        };
    }

    fn last_row_with_values(&self) -> Option<usize> {
        self.cells
            .iter()
            .rposition(|row| row.iter().any(Option::is_some))
    }

    /// Values inside the range the way the remote API reports them: trailing
    /// empty cells and trailing empty rows are left out.
    fn block(&self, range: &Range) -> ValueBlock {
        let (row_start, row_end, col_start, col_end) = range.clamp(self.row_count(), self.column_count());
        let mut rows: Vec<ValueRow> = self.cells[row_start..row_end]
            .iter()
            .map(|row| {
                let mut values = row[col_start..col_end].to_vec();
                while values.last().is_some_and(Option::is_none) {
                    values.pop();
                }
                values
            })
            .collect();
        while rows.last().is_some_and(Vec::is_empty) {
            rows.pop();
        }
        ValueBlock::at(row_start, col_start, rows)
    }

    fn describe(&self, range: Option<&Range>) -> Sheet {
        Sheet {
            properties: self.properties.clone(),
            data: range.map(|range| self.block(range)).into_iter().collect(),
        }
    }
}

#[derive(Clone, Debug)]
struct Document {
    title: String,
    /// Ordered by sheet index
    sheets: Vec<MemorySheet>,
    next_sheet_id: SheetId,
}

impl Document {
    fn position_by_title(&self, title: Option<&str>) -> Result<usize, TransportError> {
        match title {
            None if !self.sheets.is_empty() => Ok(0),
            None => Err(malformed("document has no sheets".to_owned())),
            Some(title) => self
                .sheets
                .iter()
                .position(|sheet| sheet.properties.title == title)
                .ok_or_else(|| malformed(format!("Unable to parse range: no sheet '{title}'"))),
        }
    }

    fn position_by_id(&self, sheet_id: SheetId) -> Result<usize, TransportError> {
        self.sheets
            .iter()
            .position(|sheet| sheet.properties.sheet_id == sheet_id)
            .ok_or_else(|| malformed(format!("No grid with id: {sheet_id}")))
    }

    fn check_title_free(&self, title: &str, except: Option<SheetId>) -> Result<(), TransportError> {
        let taken = self.sheets.iter().any(|sheet| {
            Some(sheet.properties.sheet_id) != except && sheet.properties.title.eq_ignore_ascii_case(title)
        });
        if taken {
            return Err(malformed(format!("A sheet with the name '{title}' already exists")));
        }
        Ok(())
    }

    fn add_sheet(&mut self, title: &str, row_count: usize, column_count: usize) -> Result<SheetProperties, TransportError> {
        self.check_title_free(title, None)?;
        let properties = SheetProperties {
            sheet_id: self.next_sheet_id,
            title: title.to_owned(),
            index: self.sheets.len(),
            grid_properties: GridProperties {
                row_count,
                column_count,
            },
        };
        self.next_sheet_id += 1;
        self.sheets.push(MemorySheet::new(properties.clone()));
        Ok(properties)
    }

    fn apply(&mut self, request: Request) -> Result<Reply, TransportError> {
        match request {
            Request::AddSheet(add) => {
                let grid = add.properties.grid_properties;
                let properties = self.add_sheet(&add.properties.title, grid.row_count, grid.column_count)?;
                Ok(Reply::AddSheet(AddSheetReply { properties }))
            }
            Request::DeleteSheet(delete) => {
                let position = self.position_by_id(delete.sheet_id)?;
                self.sheets.remove(position);
                for (index, sheet) in self.sheets.iter_mut().enumerate() {
                    sheet.properties.index = index;
                }
                Ok(Reply::Empty)
            }
            Request::UpdateSheetProperties(update) => {
                let update = update.properties;
                let position = self.position_by_id(update.sheet_id)?;
                if let Some(title) = &update.title {
                    self.check_title_free(title, Some(update.sheet_id))?;
                    self.sheets[position].properties.title = title.to_owned();
                }
                if let Some(grid) = update.grid_properties {
                    if grid.row_count == 0 || grid.column_count == 0 {
                        return Err(malformed("grid dimensions must be positive".to_owned()));
                    }
                    self.sheets[position].resize(grid.row_count, grid.column_count);
                }
                Ok(Reply::Empty)
            }
            Request::DeleteDimension(delete) => {
                let range = delete.range;
                let position = self.position_by_id(range.sheet_id)?;
                let sheet = &mut self.sheets[position];
                let limit = match range.dimension {
                    Dimension::Rows => sheet.row_count(),
                    Dimension::Columns => sheet.column_count(),
                };
                if range.start_index >= range.end_index || range.end_index > limit {
                    return Err(malformed(format!(
                        "Invalid dimension range [{}, {}) for {limit} entries",
                        range.start_index, range.end_index
                    )));
                }
                let removed = range.end_index - range.start_index;
                match range.dimension {
                    Dimension::Rows => {
                        sheet.cells.drain(range.start_index..range.end_index);
                        sheet.properties.grid_properties.row_count -= removed;
                    }
                    Dimension::Columns => {
                        for row in sheet.cells.iter_mut() {
                            row.drain(range.start_index..range.end_index);
                        }
                        sheet.properties.grid_properties.column_count -= removed;
                    }
                }
                Ok(Reply::Empty)
            }
        }
    }

    fn listing(&self, include_data: bool) -> Vec<Sheet> {
        let everything = Range::default();
        self.sheets
            .iter()
            .map(|sheet| sheet.describe(include_data.then_some(&everything)))
            .collect()
    }
}

/// A spreadsheet document kept in memory.
///
/// Behaves like the remote service as far as the tables can tell: ranges are
/// resolved against sheet titles, batches are applied atomically, echoes carry
/// the state after the mutation and reads leave out trailing empty cells.
/// Failures can be injected with [`MemoryTransport::fail_next`].
pub struct MemoryTransport {
    document: Mutex<Document>,
    calls: AtomicUsize,
    failure: Mutex<Option<RemoteErrorKind>>,
}

impl MemoryTransport {
    pub fn new(title: &str) -> Self {
        MemoryTransport {
            document: Mutex::new(Document {
                title: title.to_owned(),
                sheets: Vec::new(),
                next_sheet_id: 1,
            }),
            calls: AtomicUsize::new(0),
            failure: Mutex::new(None),
        }
    }

    /// Adds a sheet holding `rows` from its top-left cell and returns the transport.
    pub fn with_sheet(self, title: &str, rows: Vec<ValueRow>, row_count: usize, column_count: usize) -> Self {
        self.add_sheet(title, rows, row_count, column_count);
        self
    }

    /// Adds a sheet holding `rows` from its top-left cell. The grid grows to fit the rows.
    pub fn add_sheet(&self, title: &str, rows: Vec<ValueRow>, row_count: usize, column_count: usize) -> SheetId {
        let row_count = row_count.max(rows.len()).max(1);
        let column_count = column_count
            .max(rows.iter().map(Vec::len).max().unwrap_or(0))
            .max(1);
        let mut document = self.document.lock();
        let sheet_id = document.next_sheet_id;
        document.next_sheet_id += 1;
        let mut sheet = MemorySheet::new(SheetProperties {
            sheet_id,
            title: title.to_owned(),
            index: document.sheets.len(),
            grid_properties: GridProperties {
                row_count,
                column_count,
            },
        });
        for (row, values) in rows.into_iter().enumerate() {
            for (col, value) in values.into_iter().enumerate() {
                sheet.cells[row][col] = value;
            }
        }
        document.sheets.push(sheet);
        sheet_id
    }

    /// Changes one cell behind the tables' back.
    pub fn set_cell(&self, title: &str, row: usize, col: usize, value: Option<CellValue>) {
        let mut document = self.document.lock();
        if let Ok(position) = document.position_by_title(Some(title)) {
            if let Some(cell) = document.sheets[position]
                .cells
                .get_mut(row)
                .and_then(|cells| cells.get_mut(col))
            {
                *cell = value;
            }
        }
    }

    /// Rows of a sheet up to the last one holding values, full width.
    pub fn sheet_values(&self, title: &str) -> Option<Vec<ValueRow>> {
        let document = self.document.lock();
        let sheet = &document.sheets[document.position_by_title(Some(title)).ok()?];
        let rows = sheet.last_row_with_values().map_or(0, |row| row + 1);
        Some(sheet.cells[..rows].to_vec())
    }

    pub fn sheet_properties(&self, title: &str) -> Option<SheetProperties> {
        let document = self.document.lock();
        let position = document.position_by_title(Some(title)).ok()?;
        Some(document.sheets[position].properties.clone())
    }

    /// Number of transport calls made so far, failed ones included.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Makes the next call fail with the given category.
    pub fn fail_next(&self, kind: RemoteErrorKind) {
        *self.failure.lock() = Some(kind);
    }

    fn begin(&self, operation: &str) -> Result<(), TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        trace!(operation, "memory transport call");
        match self.failure.lock().take() {
            Some(kind) => Err(TransportError::msg(kind, format!("injected failure in {operation}"))),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn fetch_spreadsheet(&self, include_data: bool) -> Result<Spreadsheet, TransportError> {
        self.begin("fetch_spreadsheet")?;
        let document = self.document.lock();
        Ok(Spreadsheet {
            title: document.title.clone(),
            sheets: document.listing(include_data),
        })
    }

    async fn fetch_range(&self, range: &SheetRange) -> Result<Option<Sheet>, TransportError> {
        self.begin("fetch_range")?;
        let document = self.document.lock();
        let position = document.position_by_title(range.sheet.as_deref())?;
        Ok(Some(document.sheets[position].describe(Some(&range.range))))
    }

    async fn batch_mutate(&self, requests: Vec<Request>, want_echo: bool) -> Result<BatchReply, TransportError> {
        self.begin("batch_mutate")?;
        let mut document = self.document.lock();
        let mut draft = document.clone();
        let replies = requests
            .into_iter()
            .map(|request| draft.apply(request))
            .collect::<Result<Vec<Reply>, TransportError>>()?;
        *document = draft;
        Ok(BatchReply {
            replies,
            updated_sheets: match want_echo {
                true => document.listing(true),
                false => Vec::new(),
            },
        })
    }

    async fn write_ranges(&self, writes: Vec<RangeWrite>, echo: bool) -> Result<Vec<Option<ValueBlock>>, TransportError> {
        self.begin("write_ranges")?;
        let mut document = self.document.lock();
        let mut draft = document.clone();
        let mut written = Vec::with_capacity(writes.len());
        for write in writes {
            let position = draft.position_by_title(write.range.sheet.as_deref())?;
            let sheet = &mut draft.sheets[position];
            let row_start = write.range.range.row_lower_bound.unwrap_or(0);
            let col_start = write.range.range.col_lower_bound.unwrap_or(0);
            let width = write.rows.iter().map(Vec::len).max().unwrap_or(0);
            if row_start + write.rows.len() > sheet.row_count() || col_start + width > sheet.column_count() {
                return Err(malformed(format!("Range {} exceeds grid limits", write.range)));
            }
            let height = write.rows.len();
            for (row_offset, patches) in write.rows.into_iter().enumerate() {
                for (col_offset, patch) in patches.into_iter().enumerate() {
                    let cell = &mut sheet.cells[row_start + row_offset][col_start + col_offset];
                    match patch {
                        CellPatch::Keep => {}
                        CellPatch::Clear => *cell = None,
                        CellPatch::Set(value) => *cell = Some(value),
                    }
                }
            }
            let rectangle = Range::cells(
                row_start,
                col_start,
                row_start + height.max(1) - 1,
                col_start + width.max(1) - 1,
            );
            written.push((position, rectangle));
        }
        *document = draft;
        Ok(written
            .into_iter()
            .map(|(position, rectangle)| echo.then(|| document.sheets[position].block(&rectangle)))
            .collect())
    }

    async fn append_rows(&self, range: &SheetRange, rows: Vec<ValueRow>) -> Result<(), TransportError> {
        self.begin("append_rows")?;
        let mut document = self.document.lock();
        let position = document.position_by_title(range.sheet.as_deref())?;
        let sheet = &mut document.sheets[position];
        let col_start = range.range.col_lower_bound.unwrap_or(0);
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        if col_start + width > sheet.column_count() {
            return Err(malformed(format!("Range {range} exceeds grid limits")));
        }
        let row_start = sheet.last_row_with_values().map_or(0, |row| row + 1);
        let needed = row_start + rows.len();
        if needed > sheet.row_count() {
            let column_count = sheet.column_count();
            sheet.resize(needed, column_count);
        }
        for (offset, values) in rows.into_iter().enumerate() {
            for (col, value) in values.into_iter().enumerate() {
                sheet.cells[row_start + offset][col_start + col] = value;
            }
        }
        Ok(())
    }

    async fn clear_range(&self, range: &SheetRange) -> Result<(), TransportError> {
        self.begin("clear_range")?;
        let mut document = self.document.lock();
        let position = document.position_by_title(range.sheet.as_deref())?;
        let sheet = &mut document.sheets[position];
        let (row_start, row_end, col_start, col_end) = range.range.clamp(sheet.row_count(), sheet.column_count());
        for row in sheet.cells[row_start..row_end].iter_mut() {
            for cell in row[col_start..col_end].iter_mut() {
                *cell = None;
            }
        }
        Ok(())
    }
}
