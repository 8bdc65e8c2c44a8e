use indexmap::IndexMap;
use serde::Serialize;

use crate::udbc::value::Value;

/// One result row: column name to value, in the order the statement declared the columns.
pub type Row = IndexMap<String, Value>;

/// Raw rows as returned by a connection, aligned to `columns`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_rows(self) -> Vec<Row> {
        let columns = self.columns;
        self.rows
            .into_iter()
            .map(|values| columns.iter().cloned().zip(values).collect())
            .collect()
    }

    pub fn into_first_row(self) -> Option<Row> {
        let mut rows = self.rows.into_iter();
        rows.next()
            .map(|values| self.columns.into_iter().zip(values).collect())
    }
}

/// Outcome of a write statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExecStatus {
    pub rows_affected: u64,
    pub last_insert_id: Option<u64>,
}

/// Outcome of a committed statement batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransactionSummary {
    pub statements: usize,
    pub rows_affected: u64,
}

/// Tabular fetch result. Failures are carried in `error` instead of being raised.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub error: Option<String>,
}

impl Table {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Values of one column by name, in row order.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().filter_map(|r| r.get(idx)).collect())
    }
}

impl From<ResultSet> for Table {
    fn from(rs: ResultSet) -> Self {
        Self {
            columns: rs.columns,
            rows: rs.rows,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ResultSet {
        ResultSet::new(
            vec!["id".into(), "name".into()],
            vec![
                vec![Value::I64(2), Value::from("b")],
                vec![Value::I64(1), Value::from("a")],
            ],
        )
    }

    #[test]
    fn test_into_rows_keeps_column_order() {
        let rows = sample().into_rows();
        assert_eq!(rows.len(), 2);
        let keys: Vec<_> = rows[0].keys().cloned().collect();
        assert_eq!(keys, vec!["id", "name"]);
        assert_eq!(rows[1]["name"], Value::from("a"));
    }

    #[test]
    fn test_first_row() {
        let row = sample().into_first_row().unwrap();
        assert_eq!(row["id"], Value::I64(2));
        assert!(ResultSet::default().into_first_row().is_none());
    }

    #[test]
    fn test_table_column() {
        let table = Table::from(sample());
        assert!(table.is_ok());
        assert_eq!(
            table.column("id").unwrap(),
            vec![&Value::I64(2), &Value::I64(1)]
        );
        assert!(table.column("missing").is_none());

        let failed = Table::failed("boom");
        assert!(!failed.is_ok());
        assert_eq!(failed.row_count(), 0);
    }
}
