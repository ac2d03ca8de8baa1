mod memory;
mod postgrest;
mod query;
mod sqlite;

use std::env;
use std::path::Path;

use async_trait::async_trait;
use hypersight_config::{
    DEFAULT_JSON_FILE_NAME, DEFAULT_SQLITE_FILE_NAME, StoreBackendKind, StoreConfig,
    resolve_workspace_path,
};
use hypersight_core::{Ticket, TicketColumn};
use thiserror::Error;

pub use memory::{JSON_BACKEND_NAME, MEMORY_BACKEND_NAME, MemoryRowStore};
pub use postgrest::{POSTGREST_BACKEND_NAME, PostgrestRowStore, postgrest_params};
pub use query::{Predicate, TicketQuery};
pub use sqlite::{SQLITE_BACKEND_NAME, SqliteRowStore};

/// Columns sent to the assistant as grounding context.
pub const CONTEXT_COLUMNS: [TicketColumn; 7] = [
    TicketColumn::Summary,
    TicketColumn::Issue,
    TicketColumn::CommonIssue,
    TicketColumn::Category,
    TicketColumn::Subcategory,
    TicketColumn::Link,
    TicketColumn::ResponsibleDepartmentJustification,
];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("store rejected the query with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("missing store API key, set {0}")]
    MissingApiKey(String),
    #[error("store.url is not configured")]
    MissingUrl,
    #[error("table name '{0}' is not a plain identifier")]
    InvalidTable(String),
}

/// Read access to the ticket table.
#[async_trait]
pub trait RowStore: Send + Sync {
    fn backend_name(&self) -> &'static str;
    async fn select(&self, query: &TicketQuery) -> Result<Vec<Ticket>, StoreError>;
}

pub struct LoadedRowStore {
    pub store: Box<dyn RowStore>,
    pub backend: StoreBackendKind,
    /// URL or file the rows come from, for log lines.
    pub source: String,
}

pub fn load_row_store(
    workspace_root: impl AsRef<Path>,
    config: &StoreConfig,
) -> Result<LoadedRowStore, StoreError> {
    let workspace_root = workspace_root.as_ref();

    let loaded = match config.backend {
        StoreBackendKind::Postgrest => {
            let store = PostgrestRowStore::from_config(config)?;
            LoadedRowStore {
                source: store.endpoint(),
                store: Box::new(store),
                backend: config.backend,
            }
        }
        StoreBackendKind::Sqlite => {
            let path = resolve_workspace_path(
                workspace_root,
                config.sqlite_path.as_deref(),
                DEFAULT_SQLITE_FILE_NAME,
            );
            let store = SqliteRowStore::open(&path, &config.table)?;
            LoadedRowStore {
                source: path.display().to_string(),
                store: Box::new(store),
                backend: config.backend,
            }
        }
        StoreBackendKind::Json => {
            let path = resolve_workspace_path(
                workspace_root,
                config.json_path.as_deref(),
                DEFAULT_JSON_FILE_NAME,
            );
            let store = MemoryRowStore::from_json_file(&path)?;
            LoadedRowStore {
                source: path.display().to_string(),
                store: Box::new(store),
                backend: config.backend,
            }
        }
    };

    tracing::debug!(backend = loaded.backend.as_str(), source = %loaded.source, "row store loaded");
    Ok(loaded)
}

/// The dashboard's initial load: every column, newest first, capped.
pub async fn fetch_ticket_rows(
    store: &dyn RowStore,
    row_limit: usize,
) -> Result<Vec<Ticket>, StoreError> {
    let rows = store
        .select(&TicketQuery::all().order_by_created_desc().limit(row_limit))
        .await?;
    tracing::debug!(backend = store.backend_name(), rows = rows.len(), "ticket rows fetched");
    Ok(rows)
}

/// The category chart's load: category column only, categorised rows only.
pub async fn fetch_category_rows(store: &dyn RowStore) -> Result<Vec<Ticket>, StoreError> {
    store
        .select(
            &TicketQuery::columns([TicketColumn::Category]).not_null(TicketColumn::Category),
        )
        .await
}

/// Issued when a chart segment is picked: the issues filed under `category`.
pub async fn fetch_issue_rows_for_category(
    store: &dyn RowStore,
    category: &str,
) -> Result<Vec<Ticket>, StoreError> {
    let rows = store
        .select(
            &TicketQuery::columns([TicketColumn::Issue])
                .eq(TicketColumn::Category, category)
                .not_null(TicketColumn::Issue),
        )
        .await?;
    tracing::debug!(category, rows = rows.len(), "issue rows fetched for category");
    Ok(rows)
}

pub async fn fetch_context_rows(store: &dyn RowStore) -> Result<Vec<Ticket>, StoreError> {
    store.select(&TicketQuery::columns(CONTEXT_COLUMNS)).await
}

pub(crate) fn read_env_non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}
