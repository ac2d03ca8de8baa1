use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use hypersight_infer::{AssistantBridge, AssistantMode, AssistantProvider};
use hypersight_store::{RowStore, fetch_context_rows};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

pub const ANALYZE_TICKETS_PATH: &str = "/analyze-tickets";

pub struct ServerState {
    pub store: Box<dyn RowStore>,
    pub provider: Box<dyn AssistantProvider>,
}

type SharedState = Arc<ServerState>;

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub answer: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ErrorReply = (StatusCode, Json<ErrorResponse>);

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route(ANALYZE_TICKETS_PATH, post(analyze_tickets))
        .with_state(Arc::new(state))
        .layer(cors_layer())
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([
            AUTHORIZATION,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
            CONTENT_TYPE,
        ])
}

/// Read the context rows, ask one insights question, return the markdown.
/// Every failure, including an unreadable body, is a 500 with `{"error"}`.
async fn analyze_tickets(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<Json<AnalyzeResponse>, ErrorReply> {
    let request: AnalyzeRequest = serde_json::from_slice(&body).map_err(internal_error)?;

    let rows = fetch_context_rows(state.store.as_ref())
        .await
        .map_err(internal_error)?;
    tracing::debug!(rows = rows.len(), "analyze-tickets context loaded");

    let bridge = AssistantBridge::new(state.provider.as_ref(), AssistantMode::Insights);
    let reply = bridge
        .ask(&request.query, Some(rows.as_slice()))
        .await
        .map_err(internal_error)?;

    Ok(Json(AnalyzeResponse { answer: reply.text }))
}

fn internal_error(err: impl std::fmt::Display) -> ErrorReply {
    tracing::error!(error = %err, "analyze-tickets failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

pub async fn serve_on(listener: TcpListener, state: ServerState) -> Result<()> {
    axum::serve(listener, router(state))
        .await
        .context("HTTP server exited with error")
}

pub async fn serve(bind: &str, state: ServerState) -> Result<()> {
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    let address = listener
        .local_addr()
        .context("failed to read bound address")?;
    tracing::info!(%address, path = ANALYZE_TICKETS_PATH, "serving analyze-tickets");
    eprintln!("Listening on http://{address}{ANALYZE_TICKETS_PATH}");

    serve_on(listener, state).await
}
