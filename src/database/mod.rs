//! # Tables over Sheets
//!
//! Everything between the remote sheet model and the caller's records:
//! A1 ranges, name checks, the local cell cache, row deletion planning and the
//! [`table::Table`] and [`collection::Collection`] types built on them.
pub mod coalesce;
pub mod collection;
pub mod column;
pub(crate) mod grid;
pub mod range;
pub mod row;
pub mod table;
