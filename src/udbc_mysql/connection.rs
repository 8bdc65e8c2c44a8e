use async_trait::async_trait;
use mysql_async::prelude::Queryable;
use mysql_async::{Column, Conn, Params, Row as MyRow};

use crate::error::DbError;
use crate::udbc::connection::Connection;
use crate::udbc::row::{ExecStatus, ResultSet};
use crate::udbc::value::Value;
use crate::udbc_mysql::value_codec::{from_mysql_value, to_mysql_value};

pub struct MysqlConnection {
    conn: Conn,
    in_tx: bool,
    broken: bool,
}

impl MysqlConnection {
    pub fn new(conn: Conn) -> Self {
        Self {
            conn,
            in_tx: false,
            broken: false,
        }
    }

    fn params(args: &[Value]) -> Params {
        if args.is_empty() {
            Params::Empty
        } else {
            Params::Positional(args.iter().map(to_mysql_value).collect())
        }
    }

    /// Column names come from the result metadata, so an empty result keeps its header.
    fn result_set(columns: &[Column], rows: &[MyRow]) -> ResultSet {
        ResultSet::new(
            columns.iter().map(|c| c.name_str().to_string()).collect(),
            rows.iter().map(Self::map_row).collect(),
        )
    }

    fn map_row(row: &MyRow) -> Vec<Value> {
        (0..row.len())
            .map(|i| row.as_ref(i).map(from_mysql_value).unwrap_or(Value::Null))
            .collect()
    }

    /// Server errors leave the session usable; anything else poisons it.
    fn track(&mut self, e: mysql_async::Error) -> DbError {
        if !matches!(e, mysql_async::Error::Server(_)) {
            self.broken = true;
        }
        e.into()
    }
}

#[async_trait]
impl Connection for MysqlConnection {
    async fn query(&mut self, sql: &str, args: &[Value]) -> Result<ResultSet, DbError> {
        let conn = &mut self.conn;
        let fetched = async {
            let result = conn.exec_iter(sql, Self::params(args)).await?;
            let columns = result.columns_ref().to_vec();
            let rows: Vec<MyRow> = result.collect_and_drop().await?;
            Ok::<_, mysql_async::Error>((columns, rows))
        }
        .await;
        match fetched {
            Ok((columns, rows)) => Ok(Self::result_set(&columns, &rows)),
            Err(e) => Err(self.track(e)),
        }
    }

    async fn execute(&mut self, sql: &str, args: &[Value]) -> Result<ExecStatus, DbError> {
        if let Err(e) = self.conn.exec_drop(sql, Self::params(args)).await {
            return Err(self.track(e));
        }
        Ok(ExecStatus {
            rows_affected: self.conn.affected_rows(),
            last_insert_id: self.conn.last_insert_id(),
        })
    }

    async fn begin(&mut self) -> Result<(), DbError> {
        // dirty until proven otherwise
        self.in_tx = true;
        if let Err(e) = self.conn.query_drop("BEGIN").await {
            return Err(self.track(e));
        }
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), DbError> {
        if let Err(e) = self.conn.query_drop("COMMIT").await {
            return Err(self.track(e));
        }
        self.in_tx = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DbError> {
        if let Err(e) = self.conn.query_drop("ROLLBACK").await {
            return Err(self.track(e));
        }
        self.in_tx = false;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.in_tx
    }

    async fn ping(&mut self) -> Result<(), DbError> {
        if let Err(e) = self.conn.ping().await {
            return Err(self.track(e));
        }
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), DbError> {
        self.conn.disconnect().await?;
        Ok(())
    }

    fn is_broken(&self) -> bool {
        self.broken
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mysql_async::consts::ColumnType;

    #[test]
    fn test_empty_result_keeps_declared_columns() {
        let columns = [
            Column::new(ColumnType::MYSQL_TYPE_LONGLONG).with_name(b"id"),
            Column::new(ColumnType::MYSQL_TYPE_VARCHAR).with_name(b"name"),
        ];
        let result = MysqlConnection::result_set(&columns, &[]);
        assert_eq!(result.columns, vec!["id".to_string(), "name".to_string()]);
        assert!(result.is_empty());
    }
}
