use std::fs;
use std::path::Path;

use async_trait::async_trait;
use hypersight_core::Ticket;

use crate::query::TicketQuery;
use crate::{RowStore, StoreError};

pub const JSON_BACKEND_NAME: &str = "json";
pub const MEMORY_BACKEND_NAME: &str = "memory";

/// Rows held in memory and queried with [`TicketQuery::apply`].
#[derive(Debug, Clone)]
pub struct MemoryRowStore {
    rows: Vec<Ticket>,
    backend_name: &'static str,
}

impl MemoryRowStore {
    pub fn new(rows: Vec<Ticket>) -> Self {
        Self {
            rows,
            backend_name: MEMORY_BACKEND_NAME,
        }
    }

    /// Load a JSON array of ticket rows, e.g. a saved PostgREST response.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let raw = fs::read_to_string(path)?;
        let rows: Vec<Ticket> = serde_json::from_str(&raw)?;
        Ok(Self {
            rows,
            backend_name: JSON_BACKEND_NAME,
        })
    }

    pub fn rows(&self) -> &[Ticket] {
        &self.rows
    }
}

#[async_trait]
impl RowStore for MemoryRowStore {
    fn backend_name(&self) -> &'static str {
        self.backend_name
    }

    async fn select(&self, query: &TicketQuery) -> Result<Vec<Ticket>, StoreError> {
        Ok(query.apply(&self.rows))
    }
}

#[cfg(test)]
mod tests {
    use hypersight_core::TicketColumn;
    use serde_json::json;
    use tempfile::tempdir;

    use super::*;

    #[tokio::test]
    async fn json_file_rows_are_queried_in_memory() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("tickets.json");
        let rows = json!([
            {"id": 1, "category": "Batterier", "issue": "Range loss"},
            {"id": 2, "category": "Elnät", "issue": null},
            {"id": 3, "category": null, "issue": "Unknown"}
        ]);
        fs::write(&path, rows.to_string()).expect("write json");

        let store = MemoryRowStore::from_json_file(&path).expect("load json");
        assert_eq!(store.backend_name(), JSON_BACKEND_NAME);
        assert_eq!(store.rows().len(), 3);

        let categories = store
            .select(&TicketQuery::columns([TicketColumn::Category]).not_null(TicketColumn::Category))
            .await
            .expect("select");
        let labels: Vec<&str> = categories
            .iter()
            .filter_map(|row| row.category.as_deref())
            .collect();
        assert_eq!(labels, vec!["Batterier", "Elnät"]);
    }

    #[test]
    fn malformed_json_is_an_error() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("tickets.json");
        fs::write(&path, "{not json").expect("write json");

        assert!(matches!(
            MemoryRowStore::from_json_file(&path),
            Err(StoreError::Json(_))
        ));
    }
}
