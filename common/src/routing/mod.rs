//! Question routing: intents, table scoping and the rendered schema slice.

pub mod intent;
pub mod selector;

pub use intent::{Intent, IntentClassifier, KeywordClassifier, KeywordClassifierBuilder, MatchMode};
pub use selector::{TableSelection, TableSelectionRule, TableSelector, CENSUS_CORE_TABLES};

use crate::catalog::{render_schema, SchemaCatalog};
use crate::error::{CenQueryError, Result};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

/// everything known about a question before the backend is called
#[derive(Debug, Clone, Serialize)]
pub struct Scope {
    pub question: String,
    pub intents: BTreeSet<String>,
    pub selection: TableSelection,
    pub schema: String,
}

pub struct Router {
    classifier: Arc<dyn IntentClassifier>,
    selector: TableSelector,
}

impl Router {
    pub fn new(classifier: Arc<dyn IntentClassifier>, selector: TableSelector) -> Self {
        Self {
            classifier,
            selector,
        }
    }

    pub fn census(max_optional_tables: usize) -> Self {
        Self::new(
            Arc::new(KeywordClassifier::census()),
            TableSelector::census(max_optional_tables),
        )
    }

    pub fn selector(&self) -> &TableSelector {
        &self.selector
    }

    /// classify, select and render; fails when nothing selected is in the catalog
    #[tracing::instrument(skip_all)]
    pub fn scope(&self, question: &str, catalog: &SchemaCatalog) -> Result<Scope> {
        let question = question.trim();
        if question.is_empty() {
            return Err(CenQueryError::EmptyQuestion);
        }
        if catalog.is_empty() {
            return Err(CenQueryError::SchemaRender("schema catalog is empty".to_string()));
        }

        let intents = self.classifier.classify(question);
        let selection = self.selector.select(&intents);
        let schema = render_schema(catalog, &selection.tables);

        if schema.is_empty() {
            return Err(CenQueryError::SchemaRender(format!(
                "none of the selected tables are in the catalog: {}",
                selection.tables.iter().cloned().collect::<Vec<_>>().join(", ")
            )));
        }

        tracing::info!(
            intents = ?intents,
            tables = selection.tables.len(),
            "question scoped"
        );

        Ok(Scope {
            question: question.to_string(),
            intents,
            selection,
            schema,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ColumnDescriptor;

    fn catalog() -> SchemaCatalog {
        SchemaCatalog::new([
            (
                "regions".to_string(),
                vec![
                    ColumnDescriptor::new("state", "INTEGER"),
                    ColumnDescriptor::new("area_name", "TEXT"),
                ],
            ),
            (
                "population_stats".to_string(),
                vec![
                    ColumnDescriptor::new("state", "INTEGER"),
                    ColumnDescriptor::new("total_person", "BIGINT"),
                ],
            ),
        ])
    }

    #[test]
    fn test_scope_renders_selected_tables() {
        let scope = Router::census(6)
            .scope("What is the total population in rural Kerala?", &catalog())
            .unwrap();

        assert!(scope.intents.contains("population"));
        assert!(scope.selection.tables.contains("population_stats"));
        assert_eq!(
            scope.schema,
            "CREATE TABLE population_stats (state INTEGER, total_person BIGINT);\n\
             CREATE TABLE regions (state INTEGER, area_name TEXT);"
        );
    }

    #[test]
    fn test_scope_rejects_empty_question() {
        let result = Router::census(6).scope("   ", &catalog());
        assert!(matches!(result, Err(CenQueryError::EmptyQuestion)));
    }

    #[test]
    fn test_scope_fails_when_nothing_renders() {
        // agriculture isolates crop_stats, which this catalog lacks
        let result = Router::census(6).scope("rice production", &catalog());
        assert!(matches!(result, Err(CenQueryError::SchemaRender(_))));
    }

    #[test]
    fn test_scope_fails_on_empty_catalog() {
        let result = Router::census(6).scope("people", &SchemaCatalog::default());
        assert!(matches!(result, Err(CenQueryError::SchemaRender(_))));
    }
}
