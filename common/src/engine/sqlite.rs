use crate::catalog::ColumnDescriptor;
use crate::engine::{QueryRows, SqlEngine};
use crate::error::{CenQueryError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const DESCRIBE_SQL: &str = "SELECT m.name, p.name, p.type \
     FROM sqlite_master m JOIN pragma_table_info(m.name) p \
     WHERE m.type = 'table' AND m.name NOT LIKE 'sqlite_%' \
     ORDER BY m.name, p.cid";

/// embedded engine; statements run on the blocking pool
pub struct SqliteEngine {
    conn: Arc<Mutex<Connection>>,
}

/// flags the blocking task when the awaiting future is dropped (timeout),
/// so a pending mutation rolls back instead of committing
struct CancelOnDrop {
    flag: Arc<AtomicBool>,
    armed: bool,
}

impl CancelOnDrop {
    fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if self.armed {
            self.flag.store(true, Ordering::SeqCst);
        }
    }
}

impl SqliteEngine {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_connection(Connection::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// run setup sql (several statements allowed) outside the pipeline
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn.lock().execute_batch(sql)?;
        Ok(())
    }

    async fn blocking<T, F>(&self, job: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || job(&mut *conn.lock()))
            .await
            .map_err(|e| CenQueryError::Database(format!("task join error: {}", e)))?
    }
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(format!("<blob {} bytes>", bytes.len())),
    }
}

fn run_query(conn: &Connection, sql: &str, max_rows: usize) -> Result<QueryRows> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

    let mut result = QueryRows {
        columns,
        ..QueryRows::default()
    };

    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        if result.rows.len() >= max_rows {
            result.truncated = true;
            break;
        }
        let values = (0..result.columns.len())
            .map(|i| row.get_ref(i).map(to_json))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        result.rows.push(values);
    }

    Ok(result)
}

#[async_trait]
impl SqlEngine for SqliteEngine {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn query(&self, sql: &str, max_rows: usize) -> Result<QueryRows> {
        let sql = sql.to_string();
        self.blocking(move |conn| run_query(conn, &sql, max_rows)).await
    }

    async fn execute_mutation(&self, sql: &str) -> Result<u64> {
        let sql = sql.to_string();
        let mut cancel = CancelOnDrop::new();
        let cancelled = Arc::clone(&cancel.flag);

        let result = self
            .blocking(move |conn| {
                let tx = conn.transaction()?;
                let affected = tx.execute(&sql, [])?;
                if cancelled.load(Ordering::SeqCst) {
                    // dropping the transaction rolls it back
                    return Err(CenQueryError::Database("statement cancelled".to_string()));
                }
                tx.commit()?;
                Ok(affected as u64)
            })
            .await;

        cancel.disarm();
        result
    }

    async fn describe_tables(&self) -> Result<Vec<(String, Vec<ColumnDescriptor>)>> {
        self.blocking(|conn| {
            let mut stmt = conn.prepare(DESCRIBE_SQL)?;
            let mut tables: BTreeMap<String, Vec<ColumnDescriptor>> = BTreeMap::new();

            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
            })?;
            for row in rows {
                let (table, column, data_type) = row?;
                tables
                    .entry(table)
                    .or_default()
                    .push(ColumnDescriptor::new(column, data_type));
            }

            Ok(tables.into_iter().collect())
        })
        .await
    }
}
