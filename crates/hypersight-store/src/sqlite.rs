use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use hypersight_core::{Ticket, TicketColumn};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, params_from_iter};

use crate::query::{Predicate, TicketQuery};
use crate::{RowStore, StoreError};

pub const SQLITE_BACKEND_NAME: &str = "sqlite";

/// Read-only access to an exported copy of the ticket table.
pub struct SqliteRowStore {
    sqlite_path: PathBuf,
    table: String,
}

impl SqliteRowStore {
    pub fn open(sqlite_path: impl AsRef<Path>, table: &str) -> Result<Self, StoreError> {
        if !hypersight_config::is_plain_identifier(table) {
            return Err(StoreError::InvalidTable(table.to_owned()));
        }

        let store = Self {
            sqlite_path: sqlite_path.as_ref().to_path_buf(),
            table: table.to_owned(),
        };
        drop(store.connection()?);
        Ok(store)
    }

    pub fn sqlite_path(&self) -> &Path {
        &self.sqlite_path
    }

    fn connection(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open_with_flags(
            &self.sqlite_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(conn)
    }

    fn select_sync(&self, query: &TicketQuery) -> Result<Vec<Ticket>, StoreError> {
        let (sql, bindings) = build_select_sql(&self.table, query);
        tracing::debug!(sql = %sql, "sqlite select");

        let conn = self.connection()?;
        let mut stmt = conn.prepare(&sql)?;
        let columns: Vec<Option<TicketColumn>> = stmt
            .column_names()
            .into_iter()
            .map(|name| name.parse().ok())
            .collect();

        let rows = stmt.query_map(params_from_iter(bindings.iter()), |row| {
            let mut ticket = Ticket::default();
            for (index, column) in columns.iter().enumerate() {
                if let Some(column) = column {
                    ticket.set(*column, value_to_string(row.get_ref(index)?));
                }
            }
            Ok(ticket)
        })?;

        let tickets = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(tickets)
    }
}

#[async_trait]
impl RowStore for SqliteRowStore {
    fn backend_name(&self) -> &'static str {
        SQLITE_BACKEND_NAME
    }

    async fn select(&self, query: &TicketQuery) -> Result<Vec<Ticket>, StoreError> {
        self.select_sync(query)
    }
}

/// Build the SELECT for `query`. Column names come from [`TicketColumn`] and
/// the table name is checked on open, so only predicate values are bound.
fn build_select_sql(table: &str, query: &TicketQuery) -> (String, Vec<String>) {
    let projection = match query.projection() {
        Some(columns) => columns
            .iter()
            .map(|column| column.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        None => "*".to_owned(),
    };

    let mut sql = format!("SELECT {projection} FROM \"{table}\"");
    let mut bindings = Vec::new();
    let mut clauses = Vec::new();
    for predicate in query.predicates() {
        match predicate {
            Predicate::Eq(column, value) => {
                bindings.push(value.clone());
                clauses.push(format!("{} = ?{}", column.as_str(), bindings.len()));
            }
            Predicate::NotNull(column) => clauses.push(format!("{} IS NOT NULL", column.as_str())),
        }
    }
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    if query.is_ordered_by_created_desc() {
        sql.push_str(" ORDER BY created_at IS NULL DESC, created_at DESC");
    }
    if let Some(limit) = query.row_limit() {
        sql.push_str(&format!(" LIMIT {limit}"));
    }

    (sql, bindings)
}

fn value_to_string(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(number) => Some(number.to_string()),
        ValueRef::Real(number) => Some(number.to_string()),
        ValueRef::Text(text) | ValueRef::Blob(text) => {
            Some(String::from_utf8_lossy(text).into_owned())
        }
    }
}
