pub mod value;

pub mod connection;
pub mod driver;
pub mod row;
pub mod serializer;

pub use connection::Connection;
pub use driver::Driver;
pub use row::{ExecStatus, ResultSet, Row, Table, TransactionSummary};
pub use value::Value;

pub const DEFAULT_BACKEND: &str = "mysql";
