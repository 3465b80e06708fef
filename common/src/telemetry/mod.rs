pub mod init;

pub use init::{init_tracing, OtelGuard, ENABLE_TRACING_VAR};
