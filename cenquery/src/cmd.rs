use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use common::agent::HttpGenerator;
use common::audit::AuditLog;
use common::catalog::SchemaCatalog;
use common::engine::{self, SqlEngine};
use common::routing::Router;
use common::telemetry::init_tracing;
use common::{PipelineConfig, QueryService};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "cenquery")]
#[command(about = "self-healing text-to-sql over the census database", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    conn: ConnectionArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConnectionArgs {
    /// Database URL (postgres://..., postgresql://... or sqlite:<path>)
    #[arg(long, global = true, env = "CENQUERY_DATABASE_URL")]
    database_url: Option<String>,

    /// Generation backend base URL; /generate is appended when missing
    #[arg(long, global = true, env = "CENQUERY_LLM_URL")]
    llm_url: Option<String>,

    /// Schema description JSON (default: introspect the database)
    #[arg(long, global = true, env = "CENQUERY_SCHEMA_FILE")]
    schema_file: Option<PathBuf>,

    /// Directory for generation_log.csv and metrics_log.csv
    #[arg(long, global = true, env = "CENQUERY_AUDIT_DIR")]
    audit_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show detected intents, selected tables and the schema slice for a question
    Scope {
        #[arg(short, long)]
        question: String,
    },
    /// Generate SQL for a question without executing it
    Generate {
        #[arg(short, long)]
        question: String,

        /// Route as a data-modifying request
        #[arg(long, default_value = "false")]
        other: bool,
    },
    /// Normalize, patch and execute a SQL statement
    Execute {
        #[arg(short, long)]
        sql: String,

        /// Question the statement answers, recorded in the metrics log
        #[arg(short, long)]
        question: Option<String>,
    },
    /// Generate SQL for a question and execute it
    Ask {
        #[arg(short, long)]
        question: String,
    },
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let _guard = init_tracing("cenquery")?;
        let config = PipelineConfig::from_env()?;

        match self.command {
            Commands::Scope { question } => {
                let catalog = match &self.conn.schema_file {
                    Some(path) => SchemaCatalog::from_json_file(path)?,
                    None => {
                        let engine = self.conn.engine().await?;
                        SchemaCatalog::from_engine(engine.as_ref()).await?
                    }
                };
                let scope = Router::census(config.max_optional_tables).scope(&question, &catalog)?;
                print_json(&scope)
            }
            Commands::Generate { question, other } => {
                let service = self.conn.service(config).await?;
                let generated = if other {
                    service.generate_other_sql(&question).await?
                } else {
                    service.generate_select_sql(&question).await?
                };
                print_json(&generated)
            }
            Commands::Execute { sql, question } => {
                let service = self.conn.service(config).await?;
                let report = service.execute_sql(&sql, question.as_deref()).await;
                print_json(&report)?;
                if !report.is_success() {
                    anyhow::bail!("statement failed after {} attempt(s)", report.attempts);
                }
                Ok(())
            }
            Commands::Ask { question } => {
                let service = self.conn.service(config).await?;
                let answer = service.ask(&question).await?;
                print_json(&answer)?;
                if !answer.report.is_success() {
                    anyhow::bail!("statement failed after {} attempt(s)", answer.report.attempts);
                }
                Ok(())
            }
        }
    }
}

impl ConnectionArgs {
    async fn engine(&self) -> Result<Arc<dyn SqlEngine>> {
        let url = self
            .database_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .context("no database url: pass --database-url or set CENQUERY_DATABASE_URL")?;

        Ok(engine::connect(url).await?)
    }

    async fn service(&self, config: PipelineConfig) -> Result<QueryService> {
        let engine = self.engine().await?;

        let catalog = match &self.schema_file {
            Some(path) => SchemaCatalog::from_json_file(path)?,
            None => SchemaCatalog::from_engine(engine.as_ref()).await?,
        };

        let mut service = QueryService::new(config, catalog, engine);

        match self.llm_url.as_deref().filter(|u| !u.trim().is_empty()) {
            Some(url) => service = service.with_generator(Arc::new(HttpGenerator::new(url)?)),
            None => tracing::debug!("no generation backend configured"),
        }

        if let Some(dir) = &self.audit_dir {
            service = service.with_audit(AuditLog::new(dir)?);
        }

        Ok(service)
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
