//! In-memory database driver
//!
//! Procedures are scripted with handlers that inspect the bound parameters,
//! write output values and return either a scalar or a row set. Every call is
//! recorded so tests can assert on what reached the driver.

mod connection;
mod cursor;
mod native;

pub use connection::{CallRecord, MemoryConnection, MemoryResponse, MemoryTransaction};
pub use cursor::MemoryCursor;
pub use native::{NativeHandle, NativeTracker};
