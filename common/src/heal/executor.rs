use crate::catalog::SchemaCatalog;
use crate::config::PipelineConfig;
use crate::engine::{QueryRows, SqlEngine};
use crate::error::CenQueryError;
use crate::heal::repair::{heal, Repair};
use crate::sql::{is_mutating, NormalizedSql};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// first attempt plus at most one healed retry
pub const MAX_ATTEMPTS: usize = 2;

/// what the engine gave back for the final attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Rows(QueryRows),
    Affected { rows_affected: u64 },
    Error { message: String },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, Outcome::Error { .. })
    }
}

/// final statement, outcome and the repair that led to it
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub sql: NormalizedSql,
    pub outcome: Outcome,
    pub attempts: usize,
    pub repair: Option<Repair>,
}

/// runs a statement, and on a missing-column failure retries once with a
/// repaired statement derived from the catalog's column index
pub struct SelfHealingExecutor {
    engine: Arc<dyn SqlEngine>,
    max_rows: usize,
    statement_timeout: Duration,
    similarity_floor: f64,
}

impl SelfHealingExecutor {
    pub fn new(engine: Arc<dyn SqlEngine>, config: &PipelineConfig) -> Self {
        Self {
            engine,
            max_rows: config.max_rows,
            statement_timeout: config.statement_timeout,
            similarity_floor: config.similarity_floor,
        }
    }

    pub fn engine(&self) -> &Arc<dyn SqlEngine> {
        &self.engine
    }

    #[tracing::instrument(skip_all, fields(engine = self.engine.name()))]
    pub async fn run(&self, sql: NormalizedSql, catalog: &SchemaCatalog) -> Execution {
        let message = match self.attempt(&sql).await {
            Ok(outcome) => {
                tracing::debug!(state = "succeeded", attempt = 1);
                return Execution {
                    sql,
                    outcome,
                    attempts: 1,
                    repair: None,
                };
            }
            Err(message) => message,
        };

        tracing::warn!(state = "failed", attempt = 1, error = %message, "statement failed");

        let healed = heal(&sql, &message, catalog.column_index(), self.similarity_floor)
            .filter(|h| h.sql != sql);
        let Some(healed) = healed else {
            tracing::debug!(state = "unrecoverable", "no repair available");
            return Execution {
                sql,
                outcome: Outcome::Error { message },
                attempts: 1,
                repair: None,
            };
        };

        tracing::info!(
            state = "retrying",
            repair = %healed.repair,
            sql = %healed.sql,
            "retrying with healed statement"
        );

        let outcome = match self.attempt(&healed.sql).await {
            Ok(outcome) => {
                tracing::info!(state = "succeeded", attempt = MAX_ATTEMPTS, "healed statement succeeded");
                outcome
            }
            Err(message) => {
                tracing::warn!(state = "failed", attempt = MAX_ATTEMPTS, error = %message, "healed statement failed");
                Outcome::Error { message }
            }
        };

        Execution {
            sql: healed.sql,
            outcome,
            attempts: MAX_ATTEMPTS,
            repair: Some(healed.repair),
        }
    }

    /// one bounded engine call; errors are flattened to the engine's message
    async fn attempt(&self, sql: &NormalizedSql) -> Result<Outcome, String> {
        let call = async {
            if is_mutating(sql.as_str()) {
                self.engine
                    .execute_mutation(sql.as_str())
                    .await
                    .map(|rows_affected| Outcome::Affected { rows_affected })
            } else {
                self.engine
                    .query(sql.as_str(), self.max_rows)
                    .await
                    .map(Outcome::Rows)
            }
        };

        match tokio::time::timeout(self.statement_timeout, call).await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(CenQueryError::Database(message))) => Err(message),
            Ok(Err(other)) => Err(other.to_string()),
            Err(_) => Err(CenQueryError::Timeout {
                operation: "statement",
                after: self.statement_timeout,
            }
            .to_string()),
        }
    }
}
