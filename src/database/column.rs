use regex::Regex;
use std::collections::HashSet;
use thiserror::Error;

/// Errors raised by name and header checks before any remote call is made.
#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Invalid name '{0}', names can only consist of letters, numbers and underscores")]
    InvalidName(String),

    #[error("Duplicate column name '{0}'")]
    DuplicateHeader(String),

    #[error("All header values are blank")]
    BlankHeaders,

    #[error("Missing header row")]
    MissingHeaderRow,

    #[error("Unknown column '{0}'")]
    UnknownColumn(String),

    #[error("A table named '{0}' already exists")]
    DuplicateTable(String),

    #[error("Invalid table name pattern: {0}")]
    InvalidPattern(String),
}

/// Checks that a table or column name consists only of ASCII letters, digits and underscores.
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    let pattern = Regex::new(r"^[A-Za-z0-9_]+$").expect("Hardcode regex pattern");
    if pattern.is_match(name) {
        Ok(())
    } else {
        Err(ValidationError::InvalidName(name.to_owned()))
    }
}

/// Validates a header row and returns the trimmed names.
///
/// A blank entry is a placeholder for an unnamed column and skips the name
/// check. It still counts toward duplicates, and at least one entry must be
/// non-blank.
pub fn validate_column_names<S: AsRef<str>>(names: &[S]) -> Result<Vec<String>, ValidationError> {
    let names: Vec<String> = names
        .iter()
        .map(|name| name.as_ref().trim().to_owned())
        .collect();
    if names.iter().all(|name| name.is_empty()) {
        return Err(ValidationError::BlankHeaders);
    }
    {
        let mut seen = HashSet::new();
        for name in names.iter() {
            if !name.is_empty() {
                validate_name(name)?;
            }
            if !seen.insert(name.as_str()) {
                return Err(ValidationError::DuplicateHeader(name.to_owned()));
            }
        }
    }
    Ok(names)
}

/// Trims header cells and drops trailing blanks, which only pad the grid width.
pub(crate) fn normalize_header_row<I: IntoIterator<Item = String>>(values: I) -> Vec<String> {
    let mut names: Vec<String> = values
        .into_iter()
        .map(|value| value.trim().to_owned())
        .collect();
    while names.last().map(|name| name.is_empty()).unwrap_or(false) {
        names.pop();
    }
    names
}
