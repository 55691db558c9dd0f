//! Memory connection implementation

use crate::cursor::MemoryCursor;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use procmap_core::{
    CommandKind, ConnectionState, DbCommand, DbConnection, DbTransaction, DriverError,
    DriverResult, ParameterDirection, RowCursor, Value,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use uuid::Uuid;

/// What a scripted procedure returns
#[derive(Debug, Clone, PartialEq)]
pub enum MemoryResponse {
    Scalar(Value),
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    },
}

impl MemoryResponse {
    pub fn scalar(value: Value) -> Self {
        MemoryResponse::Scalar(value)
    }

    pub fn rows(columns: &[&str], rows: Vec<Vec<Value>>) -> Self {
        MemoryResponse::Rows {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
        }
    }

    pub fn empty(columns: &[&str]) -> Self {
        Self::rows(columns, Vec::new())
    }
}

type Handler = Arc<dyn Fn(&mut DbCommand) -> DriverResult<MemoryResponse> + Send + Sync>;

/// One command as it reached the driver
#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    pub procedure: String,
    pub kind: CommandKind,
    /// Attached parameters with the values sent to the database
    pub parameters: Vec<(String, ParameterDirection, Value)>,
    pub transaction: Option<Uuid>,
}

impl CallRecord {
    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters
            .iter()
            .find(|(n, _, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, _, v)| v)
    }

    pub fn parameter_names(&self) -> Vec<&str> {
        self.parameters.iter().map(|(n, _, _)| n.as_str()).collect()
    }
}

/// An ambient transaction of the memory driver
#[derive(Debug, Clone)]
pub struct MemoryTransaction {
    id: Uuid,
}

impl MemoryTransaction {
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }
}

impl Default for MemoryTransaction {
    fn default() -> Self {
        Self::new()
    }
}

impl DbTransaction for MemoryTransaction {
    fn id(&self) -> Uuid {
        self.id
    }
}

/// A connection whose procedures are Rust closures
pub struct MemoryConnection {
    handlers: RwLock<HashMap<String, Handler>>,
    state: Mutex<ConnectionState>,
    latency: Mutex<Option<Duration>>,
    open_error: Mutex<Option<DriverError>>,
    calls: Mutex<Vec<CallRecord>>,
    opens: AtomicUsize,
}

impl MemoryConnection {
    /// Create a closed connection with no procedures
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            state: Mutex::new(ConnectionState::Closed),
            latency: Mutex::new(None),
            open_error: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            opens: AtomicUsize::new(0),
        }
    }

    /// Script a procedure. Names are matched case-insensitively.
    pub fn with_procedure<F>(self, name: &str, handler: F) -> Self
    where
        F: Fn(&mut DbCommand) -> DriverResult<MemoryResponse> + Send + Sync + 'static,
    {
        self.register(name, handler);
        self
    }

    pub fn register<F>(&self, name: &str, handler: F)
    where
        F: Fn(&mut DbCommand) -> DriverResult<MemoryResponse> + Send + Sync + 'static,
    {
        tracing::debug!(procedure = %name, "scripting memory procedure");
        self.handlers
            .write()
            .insert(name.to_lowercase(), Arc::new(handler));
    }

    /// Delay every command by `latency`
    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.lock() = Some(latency);
        self
    }

    /// Make the next `open()` fail with `error`
    pub fn fail_next_open(&self, error: DriverError) {
        *self.open_error.lock() = Some(error);
    }

    pub fn calls(&self) -> Vec<CallRecord> {
        self.calls.lock().clone()
    }

    pub fn last_call(&self) -> Option<CallRecord> {
        self.calls.lock().last().cloned()
    }

    /// Number of times the connection was opened
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    async fn dispatch(&self, command: &mut DbCommand) -> DriverResult<MemoryResponse> {
        if *self.state.lock() != ConnectionState::Open {
            return Err(DriverError::Connection("Connection is not open".into()));
        }

        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        self.calls.lock().push(CallRecord {
            procedure: command.text.clone(),
            kind: command.kind,
            parameters: command
                .parameters
                .iter()
                .map(|p| (p.name.clone(), p.direction, p.value.clone()))
                .collect(),
            transaction: command.transaction.as_ref().map(|t| t.id()),
        });

        let handler = self.handlers.read().get(&command.text.to_lowercase()).cloned();
        let Some(handler) = handler else {
            tracing::warn!(procedure = %command.text, "memory procedure not scripted");
            return Err(DriverError::Query(format!(
                "Could not find stored procedure '{}'",
                command.text
            )));
        };
        handler(command)
    }
}

impl Default for MemoryConnection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DbConnection for MemoryConnection {
    fn driver_name(&self) -> &str {
        "memory"
    }

    fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    async fn open(&self) -> DriverResult<()> {
        if let Some(error) = self.open_error.lock().take() {
            return Err(error);
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        *self.state.lock() = ConnectionState::Open;
        tracing::debug!("memory connection opened");
        Ok(())
    }

    async fn close(&self) -> DriverResult<()> {
        *self.state.lock() = ConnectionState::Closed;
        Ok(())
    }

    async fn execute_scalar(&self, command: &mut DbCommand) -> DriverResult<Value> {
        match self.dispatch(command).await? {
            MemoryResponse::Scalar(value) => Ok(value),
            MemoryResponse::Rows { rows, .. } => Ok(rows
                .into_iter()
                .next()
                .and_then(|row| row.into_iter().next())
                .unwrap_or(Value::Null)),
        }
    }

    async fn execute_reader(&self, command: &mut DbCommand) -> DriverResult<Box<dyn RowCursor>> {
        let (columns, rows) = match self.dispatch(command).await? {
            MemoryResponse::Rows { columns, rows } => (columns, rows),
            MemoryResponse::Scalar(value) => (vec!["value".to_string()], vec![vec![value]]),
        };
        Ok(Box::new(MemoryCursor::new(columns, rows)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use procmap_core::{DbParameter, ValueKind};
    use pretty_assertions::assert_eq;

    fn connection() -> MemoryConnection {
        MemoryConnection::new().with_procedure("dbo.Double", |command| {
            let input = command
                .parameter("Input")
                .and_then(|p| p.value.as_i64())
                .unwrap_or_default();
            if let Some(output) = command.parameter_mut("Output") {
                output.value = Value::Int64(input * 2);
            }
            Ok(MemoryResponse::scalar(Value::Int32(0)))
        })
    }

    fn double_command(input: i64) -> DbCommand {
        let mut command = DbCommand::stored_procedure("dbo.Double");
        command.add_parameter(
            DbParameter::new("Input", ParameterDirection::Input, ValueKind::Int64)
                .with_value(Value::Int64(input)),
        );
        command.add_parameter(DbParameter::new(
            "Output",
            ParameterDirection::Output,
            ValueKind::Int64,
        ));
        command
    }

    #[tokio::test]
    async fn test_closed_connection_rejects_commands() {
        let conn = connection();
        let err = conn.execute_scalar(&mut double_command(1)).await.unwrap_err();
        assert!(matches!(err, DriverError::Connection(_)));
    }

    #[tokio::test]
    async fn test_handler_writes_outputs() {
        let conn = connection();
        conn.open().await.unwrap();

        let mut command = double_command(21);
        let scalar = conn.execute_scalar(&mut command).await.unwrap();

        assert_eq!(scalar, Value::Int32(0));
        assert_eq!(
            command.parameter("Output").map(|p| p.value.clone()),
            Some(Value::Int64(42))
        );
        let call = conn.last_call().unwrap();
        assert_eq!(call.procedure, "dbo.Double");
        assert_eq!(call.parameter("input"), Some(&Value::Int64(21)));
    }

    #[tokio::test]
    async fn test_unknown_procedure_is_query_error() {
        let conn = MemoryConnection::new();
        conn.open().await.unwrap();

        let err = conn
            .execute_scalar(&mut DbCommand::stored_procedure("dbo.Missing"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DriverError::Query("Could not find stored procedure 'dbo.Missing'".into())
        );
    }

    #[tokio::test]
    async fn test_failed_open() {
        let conn = connection();
        conn.fail_next_open(DriverError::Connection("refused".into()));

        assert!(conn.open().await.is_err());
        assert_eq!(conn.state(), ConnectionState::Closed);
        conn.open().await.unwrap();
        assert_eq!(conn.open_count(), 1);
    }

    #[tokio::test]
    async fn test_reader_over_rows() {
        let conn = MemoryConnection::new().with_procedure("ListIds", |_| {
            Ok(MemoryResponse::rows(
                &["id"],
                vec![vec![Value::Int32(1)], vec![Value::Int32(2)]],
            ))
        });
        conn.open().await.unwrap();

        let mut cursor = conn
            .execute_reader(&mut DbCommand::stored_procedure("listids"))
            .await
            .unwrap();
        let mut ids = Vec::new();
        while cursor.read().await.unwrap() {
            ids.push(cursor.value(0).unwrap());
        }
        assert_eq!(ids, vec![Value::Int32(1), Value::Int32(2)]);
    }
}
