use crate::error::DbError;
use crate::udbc::connection::Connection;
use async_trait::async_trait;

/// Opens sessions against one backing store.
#[async_trait]
pub trait Driver: Send + Sync {
    fn name(&self) -> &str;

    /// Placeholder text for the `param_seq`-th (1-based) bound parameter.
    fn placeholder(&self, param_seq: usize, param_name: &str) -> String;

    async fn connect(&self) -> Result<Box<dyn Connection>, DbError>;
}
