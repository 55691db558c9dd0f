//! procmap core - driver abstractions and shared value types
//!
//! This crate provides the types that the procedure runtime and every
//! database driver agree on. It defines:
//!
//! - `DbConnection` / `RowCursor` - Traits drivers implement to run procedures
//! - `DbCommand` / `DbParameter` - The command and parameter objects sent to a driver
//! - `DatabaseFacade` - Connection plus ambient transaction lookup
//! - `SqlType` - Conversion between Rust types and driver values
//! - Common types like `Value`, `ValueKind`, `Row` and `TypeInfo`

mod command;
mod connection;
mod database;
mod error;
mod parameter;
mod sql_type;
mod types;

pub use command::*;
pub use connection::*;
pub use database::*;
pub use error::*;
pub use parameter::*;
pub use sql_type::*;
pub use types::*;
