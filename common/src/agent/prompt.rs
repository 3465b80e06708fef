/// fixed directive block appended to every generation prompt
pub const GENERATION_DIRECTIVES: [&str; 3] = [
    "Output ONLY the SQL query.",
    "Use ILIKE for text comparisons.",
    "IMPORTANT: If a column name contains dots (e.g. col.1), you MUST enclose it in double quotes (e.g. \"col.1\").",
];

/// header the prompt ends on; the backend completes after it
pub const SQL_HEADER: &str = "### SQL";

pub fn build_generation_prompt(question: &str, schema: &str) -> String {
    let directives = GENERATION_DIRECTIVES
        .iter()
        .map(|d| format!("- {}", d))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "### Task\n\
         Generate a SQL query to answer the following question:\n\
         `{}`\n\n\
         ### Database Schema\n\
         {}\n\n\
         ### Instructions\n\
         {}\n\n\
         {}\n",
        question, schema, directives, SQL_HEADER
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = "CREATE TABLE regions (state INTEGER, area_name TEXT);";

    #[test]
    fn test_build_generation_prompt_sections() {
        let prompt = build_generation_prompt("How many states are there?", SCHEMA);

        assert!(prompt.starts_with("### Task\n"));
        assert!(prompt.contains("`How many states are there?`"));
        assert!(prompt.contains("### Database Schema\nCREATE TABLE regions"));
        assert!(prompt.contains("- Use ILIKE for text comparisons."));
    }

    #[test]
    fn test_build_generation_prompt_ends_on_sql_header() {
        let prompt = build_generation_prompt("q", SCHEMA);
        assert!(prompt.ends_with("### SQL\n"));
        assert_eq!(prompt.matches(SQL_HEADER).count(), 1);
    }

    #[test]
    fn test_build_generation_prompt_is_deterministic() {
        assert_eq!(
            build_generation_prompt("q", SCHEMA),
            build_generation_prompt("q", SCHEMA)
        );
    }
}
