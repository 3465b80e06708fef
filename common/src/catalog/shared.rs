use crate::catalog::schema::SchemaCatalog;
use parking_lot::RwLock;
use std::sync::Arc;

/// process-wide catalog handle. readers take a snapshot per request,
/// a refresh swaps catalog and index together.
#[derive(Debug, Default)]
pub struct SharedCatalog {
    current: RwLock<Arc<SchemaCatalog>>,
}

impl SharedCatalog {
    pub fn new(catalog: SchemaCatalog) -> Self {
        Self {
            current: RwLock::new(Arc::new(catalog)),
        }
    }

    pub fn snapshot(&self) -> Arc<SchemaCatalog> {
        self.current.read().clone()
    }

    /// install a new catalog, returning the previous one
    pub fn replace(&self, catalog: SchemaCatalog) -> Arc<SchemaCatalog> {
        let next = Arc::new(catalog);
        tracing::info!(tables = next.len(), "schema catalog replaced");
        std::mem::replace(&mut *self.current.write(), next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::schema::ColumnDescriptor;

    #[test]
    fn test_snapshot_survives_replace() {
        let shared = SharedCatalog::new(SchemaCatalog::new([(
            "regions".to_string(),
            vec![ColumnDescriptor::new("state", "INTEGER")],
        )]));

        let before = shared.snapshot();
        let old = shared.replace(SchemaCatalog::default());

        assert!(before.contains_table("regions"));
        assert!(old.contains_table("regions"));
        assert!(shared.snapshot().is_empty());
        assert!(shared.snapshot().column_index().is_empty());
    }
}
