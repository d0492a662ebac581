//! The external datasource collaborator (§6): an abstract backend a
//! concrete SQL/HTTP/etc. integration would implement. Out of scope per
//! spec §1 — this crate defines only the trait surface.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("datasource error: {0}")]
    Backend(String),
}

/// A mapping from a table/collection name to the row/identifier list the
/// backend reports as affected by a `set`/`delete` call.
pub type AffectedRows = HashMap<String, Vec<i64>>;

/// A concrete storage backend a tree can be wired to. Connection
/// management, querying and watch registration are all async since a real
/// backend does I/O; per the concurrency model, datasources must do any
/// blocking off the tree's own locks.
#[async_trait]
pub trait Datasource: Send + Sync {
    async fn connect(&self) -> Result<(), Error>;
    async fn disconnect(&self) -> Result<(), Error>;

    async fn get(&self, query: &Value) -> Result<Value, Error>;
    async fn set(&self, query: &Value) -> Result<AffectedRows, Error>;
    async fn delete(&self, query: &Value) -> Result<AffectedRows, Error>;
    async fn clear(&self) -> Result<(), Error>;
    async fn watch(&self, query: &Value, watcher_id: &str) -> Result<Value, Error>;
}
