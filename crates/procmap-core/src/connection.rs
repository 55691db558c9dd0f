//! Connection, row cursor and transaction traits implemented by drivers

use crate::{DbCommand, DriverError, DriverResult, Value};
use async_trait::async_trait;
use std::fmt;
use uuid::Uuid;

/// Whether a connection is currently usable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Open,
}

/// A database connection capable of running stored procedures and functions
#[async_trait]
pub trait DbConnection: Send + Sync {
    /// Get the driver name (e.g., "memory", "postgresql")
    fn driver_name(&self) -> &str;

    fn state(&self) -> ConnectionState;

    async fn open(&self) -> DriverResult<()>;

    async fn close(&self) -> DriverResult<()>;

    /// Execute a command for a single scalar value.
    ///
    /// Output, input/output and return-value parameters attached to the
    /// command are updated in place.
    async fn execute_scalar(&self, command: &mut DbCommand) -> DriverResult<Value>;

    /// Execute a command and return a forward-only cursor over its first
    /// result set
    async fn execute_reader(&self, command: &mut DbCommand) -> DriverResult<Box<dyn RowCursor>>;
}

/// Forward-only handle over a result set
#[async_trait]
pub trait RowCursor: Send {
    /// Advance to the next row. Returns `false` once the result set is exhausted.
    async fn read(&mut self) -> DriverResult<bool>;

    /// Number of columns in the result set
    fn field_count(&self) -> usize;

    /// Ordinal of a column, matched case-insensitively
    fn ordinal(&self, name: &str) -> DriverResult<usize>;

    /// Raw value of a column in the current row
    fn value(&self, ordinal: usize) -> DriverResult<Value>;

    fn is_null(&self, ordinal: usize) -> DriverResult<bool> {
        Ok(self.value(ordinal)?.is_null())
    }

    fn value_by_name(&self, name: &str) -> DriverResult<Value> {
        let ordinal = self.ordinal(name)?;
        self.value(ordinal)
    }

    /// Release the cursor before it is dropped
    async fn close(&mut self) -> DriverResult<()> {
        Ok(())
    }
}

/// An ambient transaction a command can be enlisted in
pub trait DbTransaction: Send + Sync + fmt::Debug {
    fn id(&self) -> Uuid;
}

/// Error for reads outside the current row
pub fn column_out_of_range(ordinal: usize, field_count: usize) -> DriverError {
    DriverError::UnknownColumn(format!(
        "ordinal {} is out of range for a result set with {} columns",
        ordinal, field_count
    ))
}
