use crate::catalog::index::ColumnIndex;
use crate::engine::SqlEngine;
use crate::error::{CenQueryError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// one column of a catalog table, in declaration order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<String>,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            constraints: Vec::new(),
        }
    }
}

/// on-disk schema description: `{ "table": { "columns": [...] } }`
#[derive(Debug, Deserialize)]
struct TableDescription {
    #[serde(default)]
    columns: Vec<ColumnDescriptor>,
}

/// table name -> ordered columns, plus the column index built from the same snapshot
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    tables: BTreeMap<String, Vec<ColumnDescriptor>>,
    index: ColumnIndex,
}

impl SchemaCatalog {
    pub fn new<I>(tables: I) -> Self
    where
        I: IntoIterator<Item = (String, Vec<ColumnDescriptor>)>,
    {
        let tables: BTreeMap<String, Vec<ColumnDescriptor>> = tables.into_iter().collect();
        let index = ColumnIndex::from_names(
            tables.values().flatten().map(|column| column.name.as_str()),
        );

        Self { tables, index }
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let raw: BTreeMap<String, TableDescription> = serde_json::from_str(text)?;
        Ok(Self::new(
            raw.into_iter().map(|(table, desc)| (table, desc.columns)),
        ))
    }

    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CenQueryError::Catalog(format!(
                "schema file not found at {}",
                path.display()
            )));
        }

        let text = std::fs::read_to_string(path)?;
        let catalog = Self::from_json_str(&text)?;
        tracing::info!(
            tables = catalog.len(),
            columns = catalog.index.len(),
            "schema catalog built from file"
        );
        Ok(catalog)
    }

    /// live introspection through the engine's metadata
    pub async fn from_engine(engine: &dyn SqlEngine) -> Result<Self> {
        let tables = engine.describe_tables().await?;
        let catalog = Self::new(tables);
        tracing::info!(
            engine = engine.name(),
            tables = catalog.len(),
            "schema catalog built from live introspection"
        );
        Ok(catalog)
    }

    pub fn table(&self, name: &str) -> Option<&[ColumnDescriptor]> {
        self.tables.get(name).map(Vec::as_slice)
    }

    pub fn contains_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn column_index(&self) -> &ColumnIndex {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "education_stats": {
            "columns": [
                {"name": "state", "type": "INTEGER", "constraints": ["FK -> regions(state)"]},
                {"name": "illiterate_persons", "type": "BIGINT"},
                {"name": "col.1", "type": "TEXT"}
            ],
            "primary_key": ["id"]
        },
        "regions": {
            "columns": [
                {"name": "state", "type": "INTEGER"},
                {"name": "area_name", "type": "TEXT"}
            ]
        }
    }"#;

    #[test]
    fn test_from_json_str_preserves_column_order() {
        let catalog = SchemaCatalog::from_json_str(SAMPLE).unwrap();
        let columns = catalog.table("education_stats").unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(columns[0].name, "state");
        assert_eq!(columns[0].constraints, vec!["FK -> regions(state)"]);
        assert_eq!(columns[2].name, "col.1");
    }

    #[test]
    fn test_index_is_deduplicated_union() {
        let catalog = SchemaCatalog::from_json_str(SAMPLE).unwrap();
        let index = catalog.column_index();

        // "state" appears in both tables
        assert_eq!(index.len(), 4);
        assert!(index.contains("area_name"));
        assert!(index.contains("col.1"));
    }

    #[test]
    fn test_from_json_file_missing_fails() {
        let result = SchemaCatalog::from_json_file("/definitely/not/here.json");
        assert!(matches!(result, Err(CenQueryError::Catalog(_))));
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let catalog = SchemaCatalog::from_json_file(file.path()).unwrap();
        assert!(catalog.contains_table("regions"));
        assert_eq!(catalog.table_names().collect::<Vec<_>>(), vec!["education_stats", "regions"]);
    }
}
