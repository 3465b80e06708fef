//! Append-only CSV records of generations and executions.

use crate::error::Result;
use parking_lot::Mutex;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const GENERATION_LOG: &str = "generation_log.csv";
pub const METRICS_LOG: &str = "metrics_log.csv";

#[derive(Debug, Serialize)]
struct GenerationRecord {
    question: String,
    generated_sql_query: String,
    schema_selected: String,
}

#[derive(Debug, Serialize)]
struct MetricsRecord {
    question: String,
    sql_query: String,
    latency_ms: f64,
    status: String,
    healed: bool,
}

pub struct AuditLog {
    generation_path: PathBuf,
    metrics_path: PathBuf,
    // one writer at a time per file pair
    lock: Arc<Mutex<()>>,
}

impl AuditLog {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        Ok(Self {
            generation_path: dir.join(GENERATION_LOG),
            metrics_path: dir.join(METRICS_LOG),
            lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn generation_path(&self) -> &Path {
        &self.generation_path
    }

    pub fn metrics_path(&self) -> &Path {
        &self.metrics_path
    }

    pub async fn record_generation(&self, question: &str, sql: &str, schema_selected: &str) {
        let record = GenerationRecord {
            question: question.to_string(),
            generated_sql_query: sql.to_string(),
            schema_selected: schema_selected.to_string(),
        };
        self.write(&self.generation_path, record).await;
    }

    pub async fn record_execution(
        &self,
        question: &str,
        sql: &str,
        latency_ms: f64,
        status: &str,
        healed: bool,
    ) {
        let record = MetricsRecord {
            question: question.to_string(),
            sql_query: sql.to_string(),
            latency_ms,
            status: status.to_string(),
            healed,
        };
        self.write(&self.metrics_path, record).await;
    }

    /// file i/o runs on the blocking pool; failures are logged, never returned
    async fn write<T>(&self, path: &Path, record: T)
    where
        T: Serialize + Send + 'static,
    {
        let lock = Arc::clone(&self.lock);
        let target = path.to_path_buf();

        let result = tokio::task::spawn_blocking(move || {
            let _guard = lock.lock();
            append(&target, &record)
        })
        .await;

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to write audit record")
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "audit write task failed")
            }
        }
    }
}

/// append one row, writing the header first when the file is new or empty
fn append<T: Serialize>(path: &Path, record: &T) -> Result<()> {
    let is_new = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(is_new)
        .from_writer(file);
    writer.serialize(record)?;
    writer.flush()?;
    Ok(())
}
