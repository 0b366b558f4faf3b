//! # Spreadsheet Model
//!
//! Types describing the remote spreadsheet document as the transport reports
//! it: cell values, sheet properties, value blocks and the document listing.
//! Conversions between column numbers and A1 references live in [`reference`].
use serde::Deserialize;
use serde::Serialize;

pub mod cell;
pub mod reference;
pub mod sheet;

pub use cell::CellPatch;
pub use cell::CellValue;
pub use reference::ColumnError;
pub use sheet::GridProperties;
pub use sheet::Sheet;
pub use sheet::SheetId;
pub use sheet::SheetProperties;
pub use sheet::ValueBlock;
pub use sheet::ValueRow;

/// A spreadsheet document listing: its title and every sheet it contains.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Spreadsheet {
    pub title: String,
    pub sheets: Vec<Sheet>,
}
