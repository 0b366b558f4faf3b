//! # Collection
//!
//! The document level view: every sheet of one remote spreadsheet as a named
//! [`Table`]. Tables are keyed by sheet id; a registry keeps the name index in
//! step with renames and drops, including ones made directly on a table.
use crate::database::column::validate_column_names;
use crate::database::column::validate_name;
use crate::database::column::ValidationError;
use crate::database::table::StateError;
use crate::database::table::Table;
use crate::database::table::TableObserver;
use crate::error::RemoteContext;
use crate::error::Result;
use crate::remote::Reply;
use crate::remote::Request;
use crate::remote::Transport;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::sheet::SheetId;
use glob::Pattern;
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;
use tracing::info;

/// Options of a [`Collection`].
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// Row count of new tables when the caller gives none, header included.
    pub default_row_count: usize,

    /// Fail when a table's header row is missing or blank.
    pub enforce_headers: bool,

    /// Fetch cell values together with the table listing.
    pub include_grid_data: bool,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        CollectionConfig {
            default_row_count: 20,
            enforce_headers: true,
            include_grid_data: true,
        }
    }
}

/// Name index of the live tables, kept current by table notifications.
#[derive(Debug, Default)]
struct Registry {
    names: Mutex<BTreeMap<String, SheetId>>,
}

impl Registry {
    fn lookup(&self, name: &str) -> Option<SheetId> {
        self.names.lock().get(name).copied()
    }

    fn rebuild<'a>(&self, tables: impl Iterator<Item = &'a Table>) {
        let mut names = self.names.lock();
        names.clear();
        for table in tables.filter(|table| !table.is_dropped()) {
            names.insert(table.title().to_owned(), table.sheet_id());
        }
    }
}

impl TableObserver for Registry {
    fn table_renamed(&self, sheet_id: SheetId, old_title: &str, new_title: &str) {
        let mut names = self.names.lock();
        if names.get(old_title) == Some(&sheet_id) {
            names.remove(old_title);
        }
        names.insert(new_title.to_owned(), sheet_id);
        debug!(sheet_id, from = old_title, to = new_title, "registry renamed table");
    }

    fn table_dropped(&self, sheet_id: SheetId, title: &str) {
        let mut names = self.names.lock();
        if names.get(title) == Some(&sheet_id) {
            names.remove(title);
        }
        debug!(sheet_id, title, "registry forgot table");
    }
}

/// The tables of one remote spreadsheet document, looked up by name.
pub struct Collection {
    transport: Arc<dyn Transport>,
    config: CollectionConfig,
    title: Option<String>,
    tables: BTreeMap<SheetId, Table>,
    registry: Arc<Registry>,
}

impl Collection {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_config(transport, CollectionConfig::default())
    }

    pub fn with_config(transport: Arc<dyn Transport>, config: CollectionConfig) -> Self {
        Collection {
            transport,
            config,
            title: None,
            tables: BTreeMap::new(),
            registry: Arc::new(Registry::default()),
        }
    }

    pub fn config(&self) -> &CollectionConfig {
        &self.config
    }

    /// Title of the document, known after the first [`Collection::fetch_tables`].
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Lists the document and brings every table up to date.
    ///
    /// New sheets become tables, known ones take the fresh properties and
    /// values, and tables whose sheet no longer exists are forgotten. The
    /// column names of every table are then read from its header row.
    pub async fn fetch_tables(&mut self) -> Result<()> {
        let listing = self
            .transport
            .fetch_spreadsheet(self.config.include_grid_data)
            .await
            .during("fetch_tables")?;
        info!(title = %listing.title, sheets = listing.sheets.len(), "fetched table listing");
        self.title = Some(listing.title);

        let mut seen = HashSet::new();
        for sheet in listing.sheets {
            seen.insert(sheet.properties.sheet_id);
            self.observe(sheet);
        }
        self.tables
            .retain(|sheet_id, table| seen.contains(sheet_id) && !table.is_dropped());
        self.registry.rebuild(self.tables.values());

        let enforce_headers = self.config.enforce_headers;
        for table in self.tables.values_mut() {
            table.load_column_names(enforce_headers).await?;
        }
        Ok(())
    }

    /// Live tables ordered by their position in the document.
    pub fn list_tables(&self) -> Vec<&Table> {
        let mut tables: Vec<&Table> = self
            .tables
            .values()
            .filter(|table| !table.is_dropped())
            .collect();
        tables.sort_by_key(|table| table.index());
        tables
    }

    /// Names of the live tables ordered by position.
    pub fn table_names(&self) -> Vec<String> {
        self.list_tables()
            .into_iter()
            .map(|table| table.title().to_owned())
            .collect()
    }

    /// Live tables whose name matches any of the glob patterns; every table when none are given.
    pub fn tables_matching<S: AsRef<str>>(&self, patterns: &[S]) -> Result<Vec<&Table>> {
        let patterns = patterns
            .iter()
            .map(|pattern| {
                Pattern::new(pattern.as_ref()).map_err(|error| ValidationError::InvalidPattern(error.to_string()))
            })
            .collect::<std::result::Result<Vec<Pattern>, ValidationError>>()?;
        Ok(self
            .list_tables()
            .into_iter()
            .filter(|table| patterns.is_empty() || patterns.iter().any(|pattern| pattern.matches(table.title())))
            .collect())
    }

    pub fn table(&self, name: &str) -> Result<&Table> {
        self.registry
            .lookup(name)
            .and_then(|sheet_id| self.tables.get(&sheet_id))
            .filter(|table| !table.is_dropped())
            .ok_or_else(|| StateError::NoSuchTable(name.to_owned()).into())
    }

    pub fn table_mut(&mut self, name: &str) -> Result<&mut Table> {
        self.registry
            .lookup(name)
            .and_then(|sheet_id| self.tables.get_mut(&sheet_id))
            .filter(|table| !table.is_dropped())
            .ok_or_else(|| StateError::NoSuchTable(name.to_owned()).into())
    }

    pub fn table_by_id(&self, sheet_id: SheetId) -> Option<&Table> {
        self.tables.get(&sheet_id).filter(|table| !table.is_dropped())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table(name).is_ok()
    }

    /// Number of live tables.
    pub fn len(&self) -> usize {
        self.tables.values().filter(|table| !table.is_dropped()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Creates a sheet with the given header row and returns its table.
    ///
    /// Names and headers are checked before anything is sent. The new sheet
    /// starts with one column per header and `row_count` rows, or the
    /// configured default.
    pub async fn add_table<S: AsRef<str>>(
        &mut self,
        name: &str,
        column_names: &[S],
        row_count: Option<usize>,
    ) -> Result<&mut Table> {
        validate_name(name)?;
        if self.contains(name) {
            Err(ValidationError::DuplicateTable(name.to_owned()))?;
        }
        let column_names = validate_column_names(column_names)?;
        let row_count = row_count.unwrap_or(self.config.default_row_count).max(1);

        let reply = self
            .transport
            .batch_mutate(vec![Request::add_sheet(name, row_count, column_names.len())], true)
            .await
            .during("add_table")?;
        let properties = match reply.replies.first() {
            Some(Reply::AddSheet(added)) => added.properties.clone(),
            _ => Err(StateError::NoSuchTable(name.to_owned()))?,
        };
        let sheet_id = properties.sheet_id;
        info!(sheet_id, name, row_count, columns = column_names.len(), "table added");

        for sheet in reply.updated_sheets {
            self.observe(sheet);
        }
        if !self.tables.contains_key(&sheet_id) {
            self.observe(Sheet {
                properties,
                data: Vec::new(),
            });
        }
        self.registry.rebuild(self.tables.values());

        let table = self
            .tables
            .get_mut(&sheet_id)
            .ok_or_else(|| StateError::NoSuchTable(name.to_owned()))?;
        if table.is_fetch_pending() {
            table.reload().await?;
        }
        table.set_column_names(&column_names, true).await?;
        Ok(table)
    }

    /// Deletes the sheet of a table and forgets the table.
    pub async fn drop_table(&mut self, name: &str) -> Result<()> {
        let table = self.table_mut(name)?;
        let sheet_id = table.sheet_id();
        table.drop().await?;
        self.tables.remove(&sheet_id);
        Ok(())
    }

    /// Renames a table; the new name must be free.
    pub async fn rename_table(&mut self, name: &str, new_name: &str) -> Result<()> {
        validate_name(new_name)?;
        if name != new_name && self.contains(new_name) {
            Err(ValidationError::DuplicateTable(new_name.to_owned()))?;
        }
        self.table_mut(name)?.rename(new_name).await
    }

    /// Creates the table of a sheet descriptor, or passes the descriptor to the existing one.
    fn observe(&mut self, sheet: Sheet) {
        let sheet_id = sheet.properties.sheet_id;
        match self.tables.get_mut(&sheet_id) {
            Some(table) => table.absorb(sheet),
            None => {
                debug!(sheet_id, title = %sheet.properties.title, "new table");
                let mut table = Table::new(self.transport.clone(), sheet);
                table.set_observer(self.registry.clone());
                self.tables.insert(sheet_id, table);
            }
        }
    }
}
