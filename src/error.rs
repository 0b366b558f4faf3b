use crate::database::column::ValidationError;
use crate::database::range::RangeError;
use crate::database::table::StateError;
use crate::remote::RemoteErrorKind;
use crate::remote::TransportError;
use crate::spreadsheet::reference::ColumnError;
use thiserror::Error;

/// Main error type of the crate.
/// Aggregates the errors of every module; remote failures keep the name of the
/// operation that triggered them.
#[derive(Error, Debug)]
pub enum SheetDbError {
    // Raised before any remote call
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Range(#[from] RangeError),

    #[error("{0}")]
    Column(#[from] ColumnError),

    #[error("{0}")]
    State(#[from] StateError),

    // Passed through from the transport
    #[error("{operation} failed: {source}")]
    Remote {
        operation: &'static str,
        #[source]
        source: TransportError,
    },
}

impl SheetDbError {
    /// Category of a remote failure, None for local errors.
    pub fn remote_kind(&self) -> Option<RemoteErrorKind> {
        match self {
            SheetDbError::Remote { source, .. } => Some(source.kind),
            _ => None,
        }
    }

    /// Returns true for errors raised before any remote interaction.
    pub fn is_local(&self) -> bool {
        !matches!(self, SheetDbError::Remote { .. })
    }
}

pub type Result<T, E = SheetDbError> = std::result::Result<T, E>;

/// Annotates transport failures with the operation that caused them.
pub(crate) trait RemoteContext<T> {
    fn during(self, operation: &'static str) -> Result<T>;
}

impl<T> RemoteContext<T> for std::result::Result<T, TransportError> {
    fn during(self, operation: &'static str) -> Result<T> {
        self.map_err(|source| SheetDbError::Remote { operation, source })
    }
}
