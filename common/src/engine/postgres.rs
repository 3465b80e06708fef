use crate::catalog::ColumnDescriptor;
use crate::engine::{QueryRows, SqlEngine};
use crate::error::Result;
use crate::sql::lexer::tokenize;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use tokio_postgres::{Client, NoTls, SimpleQueryMessage};

const DESCRIBE_SQL: &str = "SELECT table_name::text, column_name::text, data_type::text \
     FROM information_schema.columns \
     WHERE table_schema = 'public' \
     ORDER BY table_name, ordinal_position";

const CURSOR: &str = "cenquery_rows";

pub struct PostgresEngine {
    client: Mutex<Client>,
}

impl PostgresEngine {
    #[tracing::instrument(skip_all)]
    pub async fn connect(url: &str) -> Result<Self> {
        let (client, connection) = tokio_postgres::connect(url, NoTls).await?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "postgres connection error");
            }
        });

        tracing::info!("database connection established");
        Ok(Self {
            client: Mutex::new(client),
        })
    }
}

/// simple-protocol values arrive as text; numbers are recovered where they parse
fn text_value(raw: Option<&str>) -> Value {
    match raw {
        None => Value::Null,
        Some(s) => {
            if let Ok(i) = s.parse::<i64>() {
                Value::from(i)
            } else if let Some(n) = s.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
                Value::Number(n)
            } else {
                Value::String(s.to_string())
            }
        }
    }
}

/// reads that can sit behind a cursor, without the trailing terminator.
/// anything else (SHOW, EXPLAIN) is loaded whole and capped afterwards.
fn cursor_body(sql: &str) -> Option<&str> {
    let tokens = tokenize(sql);
    let first = tokens.iter().find(|t| !t.is_trivia())?;
    if !["select", "with", "values", "table"]
        .iter()
        .any(|keyword| first.is_word(keyword))
    {
        return None;
    }

    let body = sql.trim_end().trim_end_matches(';').trim_end();
    (!body.is_empty()).then_some(body)
}

fn collect_rows(messages: Vec<SimpleQueryMessage>, max_rows: usize) -> QueryRows {
    let mut result = QueryRows::default();
    for message in messages {
        let SimpleQueryMessage::Row(row) = message else {
            continue;
        };
        if result.columns.is_empty() {
            result.columns = row.columns().iter().map(|c| c.name().to_string()).collect();
        }
        if result.rows.len() >= max_rows {
            result.truncated = true;
            break;
        }
        result.rows.push((0..row.len()).map(|i| text_value(row.get(i))).collect());
    }
    result
}

#[async_trait]
impl SqlEngine for PostgresEngine {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn query(&self, sql: &str, max_rows: usize) -> Result<QueryRows> {
        let mut client = self.client.lock().await;

        let Some(body) = cursor_body(sql) else {
            return Ok(collect_rows(client.simple_query(sql).await?, max_rows));
        };

        // at most max_rows + 1 rows leave the server; the extra one flags truncation
        let tx = client.build_transaction().read_only(true).start().await?;
        tx.simple_query(&format!("DECLARE {} NO SCROLL CURSOR FOR {}", CURSOR, body))
            .await?;
        let messages = tx
            .simple_query(&format!("FETCH FORWARD {} FROM {}", max_rows + 1, CURSOR))
            .await?;
        tx.commit().await?;

        Ok(collect_rows(messages, max_rows))
    }

    async fn execute_mutation(&self, sql: &str) -> Result<u64> {
        let mut client = self.client.lock().await;
        // rolled back on drop unless committed
        let tx = client.transaction().await?;
        let affected = tx.execute(sql, &[]).await?;
        tx.commit().await?;
        Ok(affected)
    }

    async fn describe_tables(&self) -> Result<Vec<(String, Vec<ColumnDescriptor>)>> {
        let client = self.client.lock().await;
        let rows = client.query(DESCRIBE_SQL, &[]).await?;

        let mut tables: BTreeMap<String, Vec<ColumnDescriptor>> = BTreeMap::new();
        for row in rows {
            let table: String = row.get(0);
            let column: String = row.get(1);
            let data_type: String = row.get(2);
            tables
                .entry(table)
                .or_default()
                .push(ColumnDescriptor::new(column, data_type));
        }

        Ok(tables.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_value() {
        assert_eq!(text_value(None), Value::Null);
        assert_eq!(text_value(Some("42")), json!(42));
        assert_eq!(text_value(Some("0.5")), json!(0.5));
        assert_eq!(text_value(Some("Kerala")), json!("Kerala"));
    }

    #[test]
    fn test_cursor_body_strips_terminator() {
        assert_eq!(
            cursor_body("SELECT area_name FROM regions;\n"),
            Some("SELECT area_name FROM regions")
        );
        assert_eq!(
            cursor_body("  with t AS (SELECT 1) SELECT * FROM t ;"),
            Some("with t AS (SELECT 1) SELECT * FROM t")
        );
        assert_eq!(
            cursor_body("-- totals\nVALUES (1), (2)"),
            Some("-- totals\nVALUES (1), (2)")
        );
    }

    #[test]
    fn test_cursor_body_skips_utility_statements() {
        assert_eq!(cursor_body("SHOW search_path;"), None);
        assert_eq!(cursor_body("EXPLAIN SELECT 1;"), None);
        assert_eq!(cursor_body(";"), None);
    }
}
