//! HTTP JSON API.
//!
//! Every route answers with a JSON object carrying `status`. Bodies are read
//! as raw bytes and parsed here so malformed input gets the same JSON error
//! shape as everything else.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};

use catalog_scout::router::{RunRequest, ENGINE_HEADER};
use catalog_scout::SearchResult;

use crate::AppState;

/// Longest accepted search query, in characters.
pub const MAX_QUERY_CHARS: usize = 256;

/// Build the axum Router with all endpoints.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/categories.json", get(categories))
        .route("/search-json", post(search_json))
        .route("/api/run", post(run))
        .route("/api/health", get(health))
        .fallback(not_found)
        .layer(cors)
        .with_state(state)
}

/// Serve the API on `addr` until the process exits.
pub async fn start(addr: SocketAddr, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("REST API listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

// ── Helpers ─────────────────────────────────────────────────────

fn bad_request(message: impl Into<String>) -> Response {
    let body = json!({ "status": "error", "message": message.into() });
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

fn parse_body(body: &Bytes) -> Result<Value, Response> {
    serde_json::from_slice::<Value>(body).map_err(|e| bad_request(format!("malformed JSON body: {e}")))
}

struct SearchParams {
    product: String,
    limit: Option<usize>,
}

fn search_params(body: &Value) -> Result<SearchParams, Response> {
    let Some(obj) = body.as_object() else {
        return Err(bad_request("body must be a JSON object"));
    };

    let product = match obj.get("product") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(_) => return Err(bad_request("`product` must be a string")),
    };
    if product.chars().count() > MAX_QUERY_CHARS {
        return Err(bad_request(format!(
            "`product` is longer than {MAX_QUERY_CHARS} characters"
        )));
    }

    let limit = match obj.get("limit") {
        None | Some(Value::Null) => None,
        Some(v) => match v.as_u64().and_then(|n| usize::try_from(n).ok()) {
            Some(n) => Some(n),
            None => return Err(bad_request("`limit` must be a non-negative integer")),
        },
    };

    Ok(SearchParams { product, limit })
}

// ── Handlers ────────────────────────────────────────────────────

async fn categories(State(state): State<Arc<AppState>>) -> Json<Value> {
    let names = state.browser.taxonomy().get().await.names();
    Json(json!({
        "status": "success",
        "count": names.len(),
        "categories": names,
    }))
}

async fn search_json(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let params = match parse_body(&body).and_then(|v| search_params(&v)) {
        Ok(p) => p,
        Err(resp) => return resp,
    };

    let engine = headers.get(ENGINE_HEADER).and_then(|v| v.to_str().ok());
    let service = state.service_for(engine);

    let result = match service.search(&params.product, params.limit).await {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(
                query = %params.product,
                engine = service.engine(),
                error = %e,
                "search failed"
            );
            SearchResult::error(params.product.as_str(), "Search failed")
                .with_meta("code", e.code())
                .with_meta("detail", e.to_string())
        }
    };

    Json(result.to_value()).into_response()
}

async fn run(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let value = match parse_body(&body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let request: RunRequest = match serde_json::from_value(value) {
        Ok(r) => r,
        Err(e) => return bad_request(format!("invalid run request: {e}")),
    };

    let response = state.router.run(request).await;
    match serde_json::to_value(&response) {
        Ok(v) => Json(v).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "status": "error", "message": format!("failed to encode response: {e}") })),
        )
            .into_response(),
    }
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "engine": state.browser.engine(),
        "taxonomy": state.browser.taxonomy().status(),
    }))
}

async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "status": "error", "message": "not found" })),
    )
        .into_response()
}
