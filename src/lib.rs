//! # Sheet Database
//!
//! Treats a remote spreadsheet document as a small database: every sheet is a
//! table, its first row holds the column names and every following row is a
//! record.
//!
//! ## Features
//!
//! - **Record access**: Read rows by index or all at once, keyed by column name
//!   or in column order
//! - **Row mutations**: Insert, update, clear and delete rows, including
//!   scattered deletions coalesced into one batch
//! - **Table lifecycle**: Add, rename and drop tables while the collection's
//!   name index follows along
//! - **Local cache**: Reads are served from the values of the last fetch, with
//!   an explicit pending flag when the remote side may have moved on
//! - **Pluggable transport**: Network access goes through the [`Transport`]
//!   trait; [`MemoryTransport`] keeps a document in memory
//!
//! ## Example
//!
//! ```no_run
//! use rusty_sheet_db::{CellValue, Collection, MemoryTransport, RowInput};
//! use std::sync::Arc;
//!
//! # async fn run() -> rusty_sheet_db::Result<()> {
//! let mut collection = Collection::new(Arc::new(MemoryTransport::new("library")));
//! collection.fetch_tables().await?;
//! let books = collection.add_table("books", &["id", "title"], None).await?;
//! books.insert(RowInput::keyed([("id", CellValue::from(1)), ("title", "Dune".into())]), true).await?;
//! assert_eq!(books.get_data()?.len(), 1);
//! # Ok(())
//! # }
//! ```
pub mod database;
pub mod error;
pub mod remote;
pub mod spreadsheet;

pub use database::collection::Collection;
pub use database::collection::CollectionConfig;
pub use database::column::ValidationError;
pub use database::range::RangeError;
pub use database::range::RowRange;
pub use database::range::SheetRange;
pub use database::row::Record;
pub use database::row::RowInput;
pub use database::row::Rows;
pub use database::table::StateError;
pub use database::table::Table;
pub use database::table::TableObserver;
pub use error::Result;
pub use error::SheetDbError;
pub use remote::memory::MemoryTransport;
pub use remote::RemoteErrorKind;
pub use remote::Transport;
pub use remote::TransportError;
pub use spreadsheet::CellValue;
pub use spreadsheet::ColumnError;
