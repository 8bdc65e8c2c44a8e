//! MySQL backend built on `mysql_async`

pub mod connection;
pub mod driver;
pub mod value_codec;

pub use driver::MysqlDriver;
