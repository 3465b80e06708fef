use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CenQueryError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("question must not be empty")]
    EmptyQuestion,

    #[error("generation backend failed: {0}")]
    Generation(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("schema rendering failed: {0}")]
    SchemaRender(String),

    #[error("catalog error: {0}")]
    Catalog(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("audit log error: {0}")]
    Audit(String),

    #[error("tracing initialization failed: {0}")]
    Tracing(String),
}

impl From<reqwest::Error> for CenQueryError {
    fn from(e: reqwest::Error) -> Self {
        CenQueryError::Generation(e.to_string())
    }
}

impl From<rusqlite::Error> for CenQueryError {
    fn from(e: rusqlite::Error) -> Self {
        CenQueryError::Database(e.to_string())
    }
}

impl From<tokio_postgres::Error> for CenQueryError {
    fn from(e: tokio_postgres::Error) -> Self {
        // prefer the bare server message, it is what the healer inspects
        match e.as_db_error() {
            Some(db) => CenQueryError::Database(db.message().to_string()),
            None => CenQueryError::Database(e.to_string()),
        }
    }
}

impl From<csv::Error> for CenQueryError {
    fn from(e: csv::Error) -> Self {
        CenQueryError::Audit(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CenQueryError>;
