//! # Remote Collaborator Contract
//!
//! The tables never talk to the network themselves. Everything they need from
//! the remote spreadsheet goes through [`Transport`]: range reads, batched
//! structural mutations, value writes, appends and clears. HTTP, retries,
//! authentication and wire serialization belong to the implementation.
//!
//! [`memory::MemoryTransport`] implements the contract in memory.
use crate::database::range::SheetRange;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::sheet::ValueBlock;
use crate::spreadsheet::sheet::ValueRow;
use crate::spreadsheet::CellPatch;
use crate::spreadsheet::Spreadsheet;
use async_trait::async_trait;
use std::fmt::Display;
use thiserror::Error;

pub mod memory;
pub mod request;

pub use request::BatchReply;
pub use request::Reply;
pub use request::Request;

/// Category of a transport failure. The core never inspects error bodies,
/// only this category.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RemoteErrorKind {
    PermissionDenied,
    RateLimited,
    Transient,
    MalformedRequest,
    Unauthenticated,
}

impl RemoteErrorKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "permission denied",
            Self::RateLimited => "rate limited",
            Self::Transient => "transient failure",
            Self::MalformedRequest => "malformed request",
            Self::Unauthenticated => "unauthenticated",
        }
    }

    /// Returns true if repeating the same call later may succeed.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Transient)
    }
}

impl Display for RemoteErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A failure reported by the transport: a category plus an opaque cause.
#[derive(Error, Debug)]
#[error("{kind}: {source}")]
pub struct TransportError {
    pub kind: RemoteErrorKind,
    #[source]
    pub source: anyhow::Error,
}

impl TransportError {
    pub fn new<E>(kind: RemoteErrorKind, source: E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        TransportError {
            kind,
            source: source.into(),
        }
    }

    /// Creates an error from a plain message.
    pub fn msg<M>(kind: RemoteErrorKind, message: M) -> Self
    where
        M: Display + std::fmt::Debug + Send + Sync + 'static,
    {
        TransportError {
            kind,
            source: anyhow::Error::msg(message),
        }
    }
}

/// Values to write into one range. Each row is laid out from the range's
/// top-left cell.
#[derive(Clone, Debug, PartialEq)]
pub struct RangeWrite {
    pub range: SheetRange,
    pub rows: Vec<Vec<CellPatch>>,
}

/// The remote spreadsheet as seen by the tables.
///
/// Calls are independent: the transport keeps no per-table state and applies
/// no ordering beyond the order of requests inside one batch.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Lists the document title and every sheet, with grid values when `include_data` is set.
    async fn fetch_spreadsheet(&self, include_data: bool) -> Result<Spreadsheet, TransportError>;

    /// Reads the values of one range together with the properties of the
    /// sheet it belongs to. `None` means the remote returned nothing.
    async fn fetch_range(&self, range: &SheetRange) -> Result<Option<Sheet>, TransportError>;

    /// Applies structural requests in order. With `want_echo` the reply
    /// carries every sheet of the document, grid values included.
    async fn batch_mutate(&self, requests: Vec<Request>, want_echo: bool) -> Result<BatchReply, TransportError>;

    /// Writes several ranges at once. With `echo` every range's values after
    /// the write come back, in request order.
    async fn write_ranges(&self, writes: Vec<RangeWrite>, echo: bool) -> Result<Vec<Option<ValueBlock>>, TransportError>;

    /// Appends rows after the last row holding values in the range's table,
    /// overwriting whatever empty cells are there.
    async fn append_rows(&self, range: &SheetRange, rows: Vec<ValueRow>) -> Result<(), TransportError>;

    /// Removes every value in the range.
    async fn clear_range(&self, range: &SheetRange) -> Result<(), TransportError>;

    /// Writes a single range.
    async fn write_range(&self, write: RangeWrite, echo: bool) -> Result<Option<ValueBlock>, TransportError> {
        let blocks = self.write_ranges(vec![write], echo).await?;
        Ok(blocks.into_iter().next().flatten())
    }
}
