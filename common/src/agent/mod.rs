pub mod generator;
pub mod prompt;

pub use generator::{HttpGenerator, SqlGenerator};
pub use prompt::{build_generation_prompt, GENERATION_DIRECTIVES, SQL_HEADER};
