use crate::error::{CenQueryError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// text-to-sql backend; returns the raw completion for a prompt
#[async_trait]
pub trait SqlGenerator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    sql: String,
}

/// inference service speaking `POST /generate {"prompt"} -> {"sql"}`
pub struct HttpGenerator {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpGenerator {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = base_url.trim();
        if base_url.is_empty() {
            return Err(CenQueryError::Config(
                "generation backend url is empty".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            endpoint: generate_endpoint(base_url),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn generate_endpoint(base_url: &str) -> String {
    if base_url.ends_with("/generate") {
        base_url.to_string()
    } else {
        format!("{}/generate", base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl SqlGenerator for HttpGenerator {
    fn name(&self) -> &str {
        "http"
    }

    #[tracing::instrument(skip_all, fields(endpoint = %self.endpoint, prompt_len = prompt.len()))]
    async fn generate(&self, prompt: &str) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&GenerateRequest { prompt })
            .send()
            .await?
            .error_for_status()?;

        let body: GenerateResponse = response.json().await?;
        tracing::debug!(sql_len = body.sql.len(), "received completion");
        Ok(body.sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_endpoint_appends_path() {
        assert_eq!(generate_endpoint("http://llm:8000"), "http://llm:8000/generate");
        assert_eq!(generate_endpoint("http://llm:8000/"), "http://llm:8000/generate");
    }

    #[test]
    fn test_generate_endpoint_keeps_existing_path() {
        assert_eq!(
            generate_endpoint("http://llm:8000/generate"),
            "http://llm:8000/generate"
        );
    }

    #[test]
    fn test_new_rejects_empty_url() {
        assert!(matches!(HttpGenerator::new("  "), Err(CenQueryError::Config(_))));
    }

    #[test]
    fn test_response_without_sql_field_is_empty() {
        let body: GenerateResponse = serde_json::from_str(r#"{"other": 1}"#).unwrap();
        assert!(body.sql.is_empty());
    }
}
