use std::{collections::HashMap, path::Path, sync::Arc};

use shared::domain::{CatalogRecord, ProgramId};
use tracing::info;

use crate::error::CatalogError;

/// Immutable program catalog, loaded once per session. Records are shared so
/// views and ranked search results never copy them.
#[derive(Debug, Clone)]
pub struct Catalog {
    records: Arc<[Arc<CatalogRecord>]>,
    index: Arc<HashMap<ProgramId, usize>>,
}

impl Catalog {
    pub fn from_records(records: Vec<CatalogRecord>) -> Result<Self, CatalogError> {
        let mut index = HashMap::with_capacity(records.len());
        for (position, record) in records.iter().enumerate() {
            if index.insert(record.id, position).is_some() {
                return Err(CatalogError::DuplicateId(record.id));
            }
        }
        Ok(Self {
            records: records.into_iter().map(Arc::new).collect(),
            index: Arc::new(index),
        })
    }

    /// Parses the JSON array format served alongside the search index.
    pub fn from_json_str(raw: &str) -> Result<Self, CatalogError> {
        let records: Vec<CatalogRecord> = serde_json::from_str(raw)?;
        Self::from_records(records)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| CatalogError::Io {
                path: path.display().to_string(),
                source,
            })?;
        let catalog = Self::from_json_str(&raw)?;
        info!(path = %path.display(), records = catalog.len(), "catalog: loaded");
        Ok(catalog)
    }

    pub fn records(&self) -> &[Arc<CatalogRecord>] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: ProgramId) -> Option<&Arc<CatalogRecord>> {
        self.index
            .get(&id)
            .and_then(|position| self.records.get(*position))
    }

    /// Maps records returned by a search collaborator onto the catalog's own
    /// instances, keeping rank order. Unknown records are kept as returned.
    pub fn resolve(&self, results: Vec<CatalogRecord>) -> Vec<Arc<CatalogRecord>> {
        results
            .into_iter()
            .map(|record| match self.get(record.id) {
                Some(known) => Arc::clone(known),
                None => Arc::new(record),
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "tests/catalog_tests.rs"]
mod tests;
