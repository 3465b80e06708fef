pub mod postgres;
pub mod sqlite;

pub use postgres::PostgresEngine;
pub use sqlite::SqliteEngine;

use crate::catalog::ColumnDescriptor;
use crate::error::{CenQueryError, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

/// tabular result of a read statement, capped by the caller's row limit
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    /// more rows existed than were returned
    pub truncated: bool,
}

impl QueryRows {
    /// rows as `column -> value` objects
    pub fn records(&self) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }
}

/// relational engine the pipeline executes against.
///
/// failures come back as `CenQueryError::Database` carrying the engine's own
/// message text, which the healer inspects.
#[async_trait]
pub trait SqlEngine: Send + Sync {
    fn name(&self) -> &str;

    /// run a read statement, returning at most `max_rows` rows
    async fn query(&self, sql: &str, max_rows: usize) -> Result<QueryRows>;

    /// run a data-modifying statement in its own transaction
    async fn execute_mutation(&self, sql: &str) -> Result<u64>;

    /// every user table with its columns in declaration order
    async fn describe_tables(&self) -> Result<Vec<(String, Vec<ColumnDescriptor>)>>;
}

/// open an engine from a connection url: `postgres://`, `postgresql://` or `sqlite:<path>`
pub async fn connect(url: &str) -> Result<Arc<dyn SqlEngine>> {
    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        return Ok(Arc::new(PostgresEngine::connect(url).await?));
    }

    if let Some(path) = url.strip_prefix("sqlite://").or_else(|| url.strip_prefix("sqlite:")) {
        let engine = if path.is_empty() || path == ":memory:" {
            SqliteEngine::open_in_memory()?
        } else {
            SqliteEngine::open(path)?
        };
        return Ok(Arc::new(engine));
    }

    Err(CenQueryError::Config(format!(
        "unsupported database url scheme: {}",
        url.split(':').next().unwrap_or(url)
    )))
}
