use crate::agent::{build_generation_prompt, SqlGenerator};
use crate::audit::AuditLog;
use crate::catalog::{SchemaCatalog, SharedCatalog};
use crate::config::PipelineConfig;
use crate::engine::SqlEngine;
use crate::error::{CenQueryError, Result};
use crate::heal::{Outcome, SelfHealingExecutor};
use crate::routing::{Router, Scope};
use crate::sql::{normalize, HeuristicPatcher, NormalizedSql};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// which entry point produced a statement; both share routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationKind {
    Select,
    Other,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedSql {
    pub question: String,
    pub sql: NormalizedSql,
    pub kind: GenerationKind,
    pub tables: Vec<String>,
    pub intents: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Success => "success",
            Status::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    /// statement as finally executed
    pub sql: String,
    pub outcome: Outcome,
    pub latency_ms: f64,
    pub healed: bool,
    pub status: Status,
    pub attempts: usize,
    /// patch rule names, then the healer's repair if any
    pub repairs: Vec<String>,
}

impl ExecutionReport {
    fn failed(sql: String, message: String, started: Instant) -> Self {
        Self {
            sql,
            outcome: Outcome::Error { message },
            latency_ms: elapsed_ms(started),
            healed: false,
            status: Status::Error,
            attempts: 0,
            repairs: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub generated: GeneratedSql,
    pub report: ExecutionReport,
}

fn elapsed_ms(started: Instant) -> f64 {
    let ms = started.elapsed().as_secs_f64() * 1000.0;
    (ms * 100.0).round() / 100.0
}

/// question → scoped prompt → generated sql → patched, self-healing execution
pub struct QueryService {
    config: PipelineConfig,
    router: Router,
    patcher: HeuristicPatcher,
    catalog: SharedCatalog,
    executor: SelfHealingExecutor,
    generator: Option<Arc<dyn SqlGenerator>>,
    audit: Option<AuditLog>,
}

impl QueryService {
    /// census routing and patch rules; no generator or audit log attached
    pub fn new(config: PipelineConfig, catalog: SchemaCatalog, engine: Arc<dyn SqlEngine>) -> Self {
        Self {
            router: Router::census(config.max_optional_tables),
            patcher: HeuristicPatcher::census(config.patch_length_limit),
            catalog: SharedCatalog::new(catalog),
            executor: SelfHealingExecutor::new(engine, &config),
            generator: None,
            audit: None,
            config,
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn SqlGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_router(mut self, router: Router) -> Self {
        self.router = router;
        self
    }

    pub fn with_patcher(mut self, patcher: HeuristicPatcher) -> Self {
        self.patcher = patcher;
        self
    }

    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn catalog(&self) -> Arc<SchemaCatalog> {
        self.catalog.snapshot()
    }

    /// swap in a new catalog; in-flight requests keep their snapshot
    pub fn refresh_catalog(&self, catalog: SchemaCatalog) {
        let previous = self.catalog.replace(catalog);
        tracing::debug!(previous_tables = previous.len(), "previous catalog released");
    }

    /// intents, tables and rendered schema without calling the backend
    pub fn scope(&self, question: &str) -> Result<Scope> {
        self.router.scope(question, &self.catalog.snapshot())
    }

    pub async fn generate_select_sql(&self, question: &str) -> Result<GeneratedSql> {
        self.generate(question, GenerationKind::Select).await
    }

    pub async fn generate_other_sql(&self, question: &str) -> Result<GeneratedSql> {
        self.generate(question, GenerationKind::Other).await
    }

    #[tracing::instrument(skip(self))]
    async fn generate(&self, question: &str, kind: GenerationKind) -> Result<GeneratedSql> {
        let scope = self.scope(question)?;

        let generator = self.generator.as_ref().ok_or_else(|| {
            CenQueryError::Config("no generation backend configured".to_string())
        })?;

        let prompt = build_generation_prompt(&scope.question, &scope.schema);
        tracing::info!(
            backend = generator.name(),
            tables = scope.selection.tables.len(),
            "sending prompt to generation backend"
        );

        let raw = bounded(
            "generation",
            self.config.generation_timeout,
            generator.generate(&prompt),
        )
        .await?;

        let normalized = normalize(&raw);
        if normalized.sql.is_empty() {
            return Err(CenQueryError::Generation(
                "backend returned no sql".to_string(),
            ));
        }

        let tables: Vec<String> = scope.selection.tables.iter().cloned().collect();
        if let Some(audit) = &self.audit {
            audit
                .record_generation(&scope.question, normalized.sql.as_str(), &tables.join(", "))
                .await;
        }

        tracing::info!(sql = %normalized.sql, "received sql from generation backend");

        Ok(GeneratedSql {
            question: scope.question,
            sql: normalized.sql,
            kind,
            tables,
            intents: scope.intents.into_iter().collect(),
        })
    }

    /// normalize, patch and run a statement; failures come back inside the report
    #[tracing::instrument(skip(self, sql))]
    pub async fn execute_sql(&self, sql: &str, question: Option<&str>) -> ExecutionReport {
        let started = Instant::now();

        let normalized = normalize(sql);
        let report = if normalized.sql.is_empty() {
            ExecutionReport::failed(String::new(), "empty statement".to_string(), started)
        } else {
            let patched = self.patcher.apply(&normalized.sql);
            let catalog = self.catalog.snapshot();
            let execution = self.executor.run(patched.sql.clone(), &catalog).await;

            let mut repairs: Vec<String> = patched.applied.iter().map(|r| r.to_string()).collect();
            if let Some(repair) = &execution.repair {
                repairs.push(repair.to_string());
            }

            let status = if execution.outcome.is_success() {
                Status::Success
            } else {
                Status::Error
            };

            ExecutionReport {
                sql: execution.sql.into_string(),
                outcome: execution.outcome,
                latency_ms: elapsed_ms(started),
                healed: !repairs.is_empty(),
                status,
                attempts: execution.attempts,
                repairs,
            }
        };

        tracing::info!(
            status = report.status.as_str(),
            healed = report.healed,
            latency_ms = report.latency_ms,
            "execution finished"
        );

        if let Some(audit) = &self.audit {
            audit
                .record_execution(
                    question.unwrap_or("Direct Execution"),
                    &report.sql,
                    report.latency_ms,
                    report.status.as_str(),
                    report.healed,
                )
                .await;
        }

        report
    }

    /// generate then execute
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        let generated = self.generate_select_sql(question).await?;
        let report = self
            .execute_sql(generated.sql.as_str(), Some(generated.question.as_str()))
            .await;
        Ok(Answer { generated, report })
    }
}

async fn bounded<T>(
    operation: &'static str,
    after: Duration,
    fut: impl std::future::Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(after, fut)
        .await
        .map_err(|_| CenQueryError::Timeout { operation, after })?
}
