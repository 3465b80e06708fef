//! Execution with a single corrective retry.

pub mod executor;
pub mod repair;
pub mod similarity;

pub use executor::{Execution, Outcome, SelfHealingExecutor, MAX_ATTEMPTS};
pub use repair::{heal, is_missing_column_error, missing_column, Healed, Repair};
