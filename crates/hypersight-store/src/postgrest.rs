use async_trait::async_trait;
use hypersight_config::StoreConfig;
use hypersight_core::Ticket;
use serde::Deserialize;

use crate::query::{Predicate, TicketQuery};
use crate::{RowStore, StoreError, read_env_non_empty};

pub const POSTGREST_BACKEND_NAME: &str = "postgrest";

/// Ticket table served over the PostgREST query surface (Supabase `rest/v1`).
#[derive(Debug, Clone)]
pub struct PostgrestRowStore {
    client: reqwest::Client,
    base_url: String,
    table: String,
    api_key: String,
}

impl PostgrestRowStore {
    pub fn new(
        base_url: impl Into<String>,
        table: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let table = table.into();
        if !hypersight_config::is_plain_identifier(&table) {
            return Err(StoreError::InvalidTable(table));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            table,
            api_key: api_key.into(),
        })
    }

    pub fn from_config(config: &StoreConfig) -> Result<Self, StoreError> {
        let base_url = config.url.clone().ok_or(StoreError::MissingUrl)?;
        let api_key = read_env_non_empty(&config.api_key_env)
            .ok_or_else(|| StoreError::MissingApiKey(config.api_key_env.clone()))?;
        Self::new(base_url, config.table.clone(), api_key)
    }

    pub fn endpoint(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }
}

#[async_trait]
impl RowStore for PostgrestRowStore {
    fn backend_name(&self) -> &'static str {
        POSTGREST_BACKEND_NAME
    }

    async fn select(&self, query: &TicketQuery) -> Result<Vec<Ticket>, StoreError> {
        let params = postgrest_params(query);
        tracing::debug!(table = %self.table, params = ?params, "postgrest select");

        let response = self
            .client
            .get(self.endpoint())
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .query(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Rejected {
                status: status.as_u16(),
                message: rejection_message(&body, status.canonical_reason()),
            });
        }

        Ok(response.json::<Vec<Ticket>>().await?)
    }
}

/// Render a query as PostgREST URL parameters.
pub fn postgrest_params(query: &TicketQuery) -> Vec<(String, String)> {
    let select = match query.projection() {
        Some(columns) => columns
            .iter()
            .map(|column| column.as_str())
            .collect::<Vec<_>>()
            .join(","),
        None => "*".to_owned(),
    };

    let mut params = vec![("select".to_owned(), select)];
    for predicate in query.predicates() {
        let column = predicate.column().as_str().to_owned();
        match predicate {
            Predicate::Eq(_, value) => params.push((column, format!("eq.{value}"))),
            Predicate::NotNull(_) => params.push((column, "not.is.null".to_owned())),
        }
    }
    if query.is_ordered_by_created_desc() {
        params.push(("order".to_owned(), "created_at.desc".to_owned()));
    }
    if let Some(limit) = query.row_limit() {
        params.push(("limit".to_owned(), limit.to_string()));
    }
    params
}

#[derive(Debug, Deserialize)]
struct PostgrestErrorBody {
    message: Option<String>,
}

fn rejection_message(body: &str, reason: Option<&str>) -> String {
    serde_json::from_str::<PostgrestErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.message)
        .filter(|message| !message.trim().is_empty())
        .or_else(|| {
            let body = body.trim();
            (!body.is_empty()).then(|| body.to_owned())
        })
        .unwrap_or_else(|| reason.unwrap_or("request rejected").to_owned())
}

#[cfg(test)]
mod tests {
    use hypersight_core::TicketColumn;

    use super::*;

    fn pairs(params: &[(String, String)]) -> Vec<(&str, &str)> {
        params
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect()
    }

    #[test]
    fn select_all_query_renders_star_order_and_limit() {
        let query = TicketQuery::all().order_by_created_desc().limit(10_000);

        assert_eq!(
            pairs(&postgrest_params(&query)),
            vec![
                ("select", "*"),
                ("order", "created_at.desc"),
                ("limit", "10000"),
            ]
        );
    }

    #[test]
    fn scoped_query_renders_projection_and_predicates() {
        let query = TicketQuery::columns([TicketColumn::Issue])
            .eq(TicketColumn::Category, "Batterier")
            .not_null(TicketColumn::Issue);

        assert_eq!(
            pairs(&postgrest_params(&query)),
            vec![
                ("select", "issue"),
                ("category", "eq.Batterier"),
                ("issue", "not.is.null"),
            ]
        );
    }

    #[test]
    fn rejection_message_prefers_json_message_field() {
        assert_eq!(
            rejection_message(r#"{"message":"permission denied","code":"42501"}"#, Some("Unauthorized")),
            "permission denied"
        );
        assert_eq!(rejection_message("gateway down", None), "gateway down");
        assert_eq!(rejection_message("", Some("Bad Gateway")), "Bad Gateway");
    }

    #[test]
    fn table_name_must_be_plain_identifier() {
        let err = PostgrestRowStore::new("http://localhost", "tickets; drop", "key")
            .expect_err("invalid table");
        assert!(matches!(err, StoreError::InvalidTable(_)));
    }

    #[test]
    fn endpoint_strips_trailing_slash() {
        let store = PostgrestRowStore::new("https://example.supabase.co/", "ticket_analysis", "key")
            .expect("store");
        assert_eq!(
            store.endpoint(),
            "https://example.supabase.co/rest/v1/ticket_analysis"
        );
    }
}
