use async_trait::async_trait;
use mysql_async::{Conn, Opts, OptsBuilder};

use crate::error::DbError;
use crate::models::db_config::PoolOptions;
use crate::udbc::connection::Connection;
use crate::udbc::driver::Driver;
use crate::udbc_mysql::connection::MysqlConnection;

const MYSQL_TYPE: &str = "mysql";

/// Opens single `mysql_async` sessions; pooling is done by `ConnectionPool`.
pub struct MysqlDriver {
    opts: Opts,
}

impl MysqlDriver {
    pub fn new(options: &PoolOptions) -> Self {
        let mut builder = OptsBuilder::default()
            .ip_or_hostname(options.host.clone())
            .tcp_port(options.port)
            .user(Some(options.user.clone()))
            .db_name(Some(options.database_name.clone()));
        if !options.password.is_empty() {
            builder = builder.pass(Some(options.password.clone()));
        }
        Self {
            opts: builder.into(),
        }
    }
}

#[async_trait]
impl Driver for MysqlDriver {
    fn name(&self) -> &str {
        MYSQL_TYPE
    }

    fn placeholder(&self, _param_seq: usize, _param_name: &str) -> String {
        "?".to_string()
    }

    async fn connect(&self) -> Result<Box<dyn Connection>, DbError> {
        let conn = Conn::new(self.opts.clone()).await?;
        Ok(Box::new(MysqlConnection::new(conn)))
    }
}
