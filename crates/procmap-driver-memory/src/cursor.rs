//! Row cursor over materialized rows

use async_trait::async_trait;
use procmap_core::{DriverError, DriverResult, Row, RowCursor, Value, column_out_of_range};

/// Forward-only cursor over rows held in memory
#[derive(Debug)]
pub struct MemoryCursor {
    columns: Vec<String>,
    rows: std::vec::IntoIter<Row>,
    current: Option<Row>,
    closed: bool,
}

impl MemoryCursor {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let rows: Vec<Row> = rows
            .into_iter()
            .map(|values| Row::new(columns.clone(), values))
            .collect();
        Self {
            columns,
            rows: rows.into_iter(),
            current: None,
            closed: false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn current(&self) -> DriverResult<&Row> {
        self.current
            .as_ref()
            .ok_or_else(|| DriverError::Other("No current row; call read() first".into()))
    }
}

#[async_trait]
impl RowCursor for MemoryCursor {
    async fn read(&mut self) -> DriverResult<bool> {
        if self.closed {
            return Err(DriverError::Other("Cursor is closed".into()));
        }
        self.current = self.rows.next();
        Ok(self.current.is_some())
    }

    fn field_count(&self) -> usize {
        self.columns.len()
    }

    fn ordinal(&self, name: &str) -> DriverResult<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .or_else(|| self.columns.iter().position(|c| c.eq_ignore_ascii_case(name)))
            .ok_or_else(|| DriverError::UnknownColumn(name.to_string()))
    }

    fn value(&self, ordinal: usize) -> DriverResult<Value> {
        let row = self.current()?;
        row.get(ordinal)
            .cloned()
            .ok_or_else(|| column_out_of_range(ordinal, self.columns.len()))
    }

    async fn close(&mut self) -> DriverResult<()> {
        self.closed = true;
        self.current = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn users() -> MemoryCursor {
        MemoryCursor::new(
            vec!["Id".into(), "Name".into()],
            vec![
                vec![Value::Int32(1), Value::String("Ada".into())],
                vec![Value::Int32(2), Value::Null],
            ],
        )
    }

    #[tokio::test]
    async fn test_reads_rows_in_order() {
        let mut cursor = users();

        assert!(cursor.read().await.unwrap());
        assert_eq!(cursor.value_by_name("name").unwrap(), Value::String("Ada".into()));
        assert!(cursor.read().await.unwrap());
        assert!(cursor.is_null(1).unwrap());
        assert!(!cursor.read().await.unwrap());
    }

    #[tokio::test]
    async fn test_value_before_read_is_error() {
        let cursor = users();
        assert!(cursor.value(0).is_err());
    }

    #[tokio::test]
    async fn test_unknown_column() {
        let cursor = users();
        assert_eq!(
            cursor.ordinal("email"),
            Err(DriverError::UnknownColumn("email".into()))
        );
    }

    #[tokio::test]
    async fn test_closed_cursor_cannot_read() {
        let mut cursor = users();
        cursor.close().await.unwrap();
        assert!(cursor.is_closed());
        assert!(cursor.read().await.is_err());
    }
}
