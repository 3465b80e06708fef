use crate::catalog::schema::SchemaCatalog;
use crate::sql::quote_identifier;
use std::collections::BTreeSet;

/// DDL-style description of the selected tables, sorted by table name.
/// tables missing from the catalog are skipped.
#[tracing::instrument(skip_all, fields(requested = tables.len()))]
pub fn render_schema(catalog: &SchemaCatalog, tables: &BTreeSet<String>) -> String {
    let mut ddl = Vec::new();

    for table in tables {
        let Some(columns) = catalog.table(table) else {
            tracing::debug!(table = %table, "table not in catalog, skipping");
            continue;
        };

        let cols: Vec<String> = columns
            .iter()
            .map(|c| format!("{} {}", quote_identifier(&c.name), c.data_type))
            .collect();

        ddl.push(format!("CREATE TABLE {} ({});", table, cols.join(", ")));
    }

    ddl.join("\n")
}
