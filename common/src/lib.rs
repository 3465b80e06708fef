pub mod error;
pub mod config;
pub mod catalog;
pub mod routing;
pub mod agent;
pub mod sql;
pub mod heal;
pub mod engine;
pub mod audit;
pub mod service;
pub mod telemetry;

pub use config::PipelineConfig;
pub use error::{CenQueryError, Result};
pub use service::{Answer, ExecutionReport, GeneratedSql, QueryService, Status};
