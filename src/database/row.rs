//! Record views of cached rows and the inputs accepted by row mutations.

use crate::database::column::ValidationError;
use crate::database::range::RangeError;
use crate::error::SheetDbError;
use crate::spreadsheet::cell::CellPatch;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::sheet::ValueRow;
use std::collections::HashMap;

/// One table row keyed by column name, in column order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Option<CellValue>)>,
}

impl Record {
    /// Pairs column names with positional values; missing values are absent.
    pub(crate) fn from_row(columns: &[String], values: &[Option<CellValue>]) -> Self {
        Record {
            fields: columns
                .iter()
                .enumerate()
                .map(|(col, name)| (name.clone(), values.get(col).cloned().flatten()))
                .collect(),
        }
    }

    /// Returns the value of a column, `None` if the column is unknown or the cell is absent.
    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .and_then(|(_, value)| value.as_ref())
    }

    pub fn contains_column(&self, column: &str) -> bool {
        self.fields.iter().any(|(name, _)| name == column)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&CellValue>)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_ref()))
    }

    /// Values in column order.
    pub fn values(&self) -> ValueRow {
        self.fields.iter().map(|(_, value)| value.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A row supplied by the caller, either by position or by column name.
#[derive(Clone, Debug, PartialEq)]
pub enum RowInput {
    /// Values in column order
    Positional(ValueRow),
    /// Values for the named columns only
    Keyed(HashMap<String, Option<CellValue>>),
}

impl RowInput {
    /// Builds a positional row where every value is present.
    pub fn values<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<CellValue>,
    {
        RowInput::Positional(values.into_iter().map(|value| Some(value.into())).collect())
    }

    /// Builds a keyed row where every value is present.
    pub fn keyed<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<CellValue>,
    {
        RowInput::Keyed(
            pairs
                .into_iter()
                .map(|(key, value)| (key.into(), Some(value.into())))
                .collect(),
        )
    }

    /// Canonical positional form for appending: one slot per column name,
    /// missing keys and missing trailing positions are absent.
    pub(crate) fn to_positional(&self, columns: &[String], column_count: usize) -> Result<ValueRow, SheetDbError> {
        match self {
            RowInput::Positional(values) => {
                if values.len() > column_count {
                    Err(RangeError::TooManyValues {
                        count: values.len(),
                        limit: column_count,
                    })?;
                }
                let mut row = values.clone();
                if row.len() < columns.len() {
                    row.resize(columns.len(), None);
                }
                Ok(row)
            }
            RowInput::Keyed(values) => {
                Self::check_keys(values, columns)?;
                Ok(columns
                    .iter()
                    .map(|name| values.get(name).cloned().flatten())
                    .collect())
            }
        }
    }

    /// Canonical patch form for updates. Positional input overwrites every
    /// position it covers (an absent value clears the cell); keyed input only
    /// touches the named columns. Everything else is left unchanged.
    pub(crate) fn to_patch(&self, columns: &[String], column_count: usize) -> Result<Vec<CellPatch>, SheetDbError> {
        match self {
            RowInput::Positional(values) => {
                if values.len() > column_count {
                    Err(RangeError::TooManyValues {
                        count: values.len(),
                        limit: column_count,
                    })?;
                }
                let width = columns.len().max(values.len());
                Ok((0..width)
                    .map(|col| match values.get(col) {
                        Some(value) => CellPatch::from(value.clone()),
                        None => CellPatch::Keep,
                    })
                    .collect())
            }
            RowInput::Keyed(values) => {
                Self::check_keys(values, columns)?;
                Ok(columns
                    .iter()
                    .map(|name| match values.get(name) {
                        Some(value) => CellPatch::from(value.clone()),
                        None => CellPatch::Keep,
                    })
                    .collect())
            }
        }
    }

    fn check_keys(values: &HashMap<String, Option<CellValue>>, columns: &[String]) -> Result<(), ValidationError> {
        match values
            .keys()
            .find(|key| key.is_empty() || !columns.contains(key))
        {
            Some(key) => Err(ValidationError::UnknownColumn(key.to_owned())),
            None => Ok(()),
        }
    }
}

/// Unnamed columns are left out, so they are kept as they are on update.
impl From<Record> for RowInput {
    fn from(record: Record) -> Self {
        RowInput::Keyed(
            record
                .fields
                .into_iter()
                .filter(|(name, _)| !name.is_empty())
                .collect(),
        )
    }
}

impl From<ValueRow> for RowInput {
    fn from(values: ValueRow) -> Self {
        RowInput::Positional(values)
    }
}

/// One row or many rows, for operations that accept either.
#[derive(Clone, Debug, PartialEq)]
pub struct Rows(pub Vec<RowInput>);

impl From<RowInput> for Rows {
    fn from(row: RowInput) -> Self {
        Rows(vec![row])
    }
}

impl From<Vec<RowInput>> for Rows {
    fn from(rows: Vec<RowInput>) -> Self {
        Rows(rows)
    }
}

impl From<Record> for Rows {
    fn from(record: Record) -> Self {
        Rows(vec![record.into()])
    }
}
