use crate::error::{CenQueryError, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_MAX_OPTIONAL_TABLES: usize = 6;
const DEFAULT_MAX_ROWS: usize = 1000;
const DEFAULT_PATCH_LENGTH_LIMIT: usize = 2000;
const DEFAULT_SIMILARITY_FLOOR: f64 = 0.5;
const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 60;
const DEFAULT_STATEMENT_TIMEOUT_SECS: u64 = 30;

/// tunables shared by every stage of the pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// cap on intent-driven tables added on top of the core set
    pub max_optional_tables: usize,
    /// rows returned from a read statement before truncation
    pub max_rows: usize,
    /// statements longer than this are never patched
    pub patch_length_limit: usize,
    /// minimum similarity ratio for a column-name repair
    pub similarity_floor: f64,
    pub generation_timeout: Duration,
    pub statement_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_optional_tables: DEFAULT_MAX_OPTIONAL_TABLES,
            max_rows: DEFAULT_MAX_ROWS,
            patch_length_limit: DEFAULT_PATCH_LENGTH_LIMIT,
            similarity_floor: DEFAULT_SIMILARITY_FLOOR,
            generation_timeout: Duration::from_secs(DEFAULT_GENERATION_TIMEOUT_SECS),
            statement_timeout: Duration::from_secs(DEFAULT_STATEMENT_TIMEOUT_SECS),
        }
    }
}

impl PipelineConfig {
    /// defaults overridden by any non-empty `CENQUERY_*` variable
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            max_optional_tables: env_or("CENQUERY_MAX_OPTIONAL_TABLES", defaults.max_optional_tables)?,
            max_rows: env_or("CENQUERY_MAX_ROWS", defaults.max_rows)?,
            patch_length_limit: env_or("CENQUERY_PATCH_LENGTH_LIMIT", defaults.patch_length_limit)?,
            similarity_floor: env_or("CENQUERY_SIMILARITY_FLOOR", defaults.similarity_floor)?,
            generation_timeout: Duration::from_secs(env_or(
                "CENQUERY_GENERATION_TIMEOUT_SECS",
                DEFAULT_GENERATION_TIMEOUT_SECS,
            )?),
            statement_timeout: Duration::from_secs(env_or(
                "CENQUERY_STATEMENT_TIMEOUT_SECS",
                DEFAULT_STATEMENT_TIMEOUT_SECS,
            )?),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_rows == 0 {
            return Err(CenQueryError::Config("max_rows must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.similarity_floor) {
            return Err(CenQueryError::Config(format!(
                "similarity_floor must be within [0, 1], got {}",
                self.similarity_floor
            )));
        }
        if self.generation_timeout.is_zero() || self.statement_timeout.is_zero() {
            return Err(CenQueryError::Config("timeouts must be non-zero".to_string()));
        }
        Ok(())
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key).ok().filter(|s| !s.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| CenQueryError::Config(format!("invalid value for {}: {:?}", key, raw))),
        None => Ok(default),
    }
}
