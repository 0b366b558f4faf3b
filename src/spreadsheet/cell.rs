use serde::Deserialize;
use serde::Serialize;
use std::fmt::Display;

/// A typed scalar stored in a spreadsheet cell.
///
/// An unset cell is represented as `None` of `Option<CellValue>` everywhere in
/// this crate, so `Number(0.0)`, `Boolean(false)` and `Text("")` are all values
/// that were observed, distinct from a cell that never held anything.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    /// Numeric values (the remote grid stores every number as a double)
    Number(f64),
    /// String values
    Text(String),
    /// Boolean values (TRUE/FALSE)
    Boolean(bool),
}

impl CellValue {
    /// Returns the numeric value, if this is a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the string value, if this is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Returns the boolean value, if this is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CellValue::Boolean(value) => Some(*value),
            _ => None,
        }
    }
}

impl Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Number(value) => write!(f, "{}", value),
            CellValue::Text(value) => write!(f, "{}", value),
            CellValue::Boolean(true) => write!(f, "TRUE"),
            CellValue::Boolean(false) => write!(f, "FALSE"),
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Number(value as f64)
    }
}

impl From<i32> for CellValue {
    fn from(value: i32) -> Self {
        CellValue::Number(value as f64)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Boolean(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_owned())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

/// What a range write does to one cell.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum CellPatch {
    /// Leave the remote cell as it is
    #[default]
    Keep,
    /// Remove the remote cell's value
    Clear,
    /// Overwrite the remote cell
    Set(CellValue),
}

impl From<Option<CellValue>> for CellPatch {
    fn from(value: Option<CellValue>) -> Self {
        match value {
            Some(value) => CellPatch::Set(value),
            None => CellPatch::Clear,
        }
    }
}

impl From<CellValue> for CellPatch {
    fn from(value: CellValue) -> Self {
        CellPatch::Set(value)
    }
}
