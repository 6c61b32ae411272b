//! Axum router construction.
//!
//! The [`app`] function wires the index page and the operational endpoints
//! to their handlers and returns a ready-to-serve [`axum::Router`].
//!
//! `GET /` consults the cache on every request.  An expired snapshot is
//! rebuilt inline, holding up that request (and any others that arrive
//! while the rebuild runs) until the new listing is in place.

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::SystemTime;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::cache::Cache;
use crate::errors::{generate_request_id, IndexError};
use crate::metrics::{metrics_handler, metrics_middleware};
use crate::AppState;

// -- OpenAPI specification ----------------------------------------------------

/// OpenAPI documentation for the index endpoints.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Bucket Index",
        version = "0.1.0",
        description = "Cached listing of an object storage bucket"
    ),
    paths(index, health_check),
    tags(
        (name = "Index", description = "Bucket listing"),
        (name = "Health", description = "Health check endpoints"),
    )
)]
struct ApiDoc;

/// Build the axum [`Router`] with all routes.
///
/// The returned router is ready to be passed to `axum::serve`.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/openapi.json", get(openapi))
        .with_state(state)
        .layer(middleware::from_fn(common_headers_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::HEAD]),
        )
        .layer(TraceLayer::new_for_http())
        // metrics_middleware is outermost (captures full request lifecycle).
        .layer(middleware::from_fn(metrics_middleware))
}

// -- Common headers middleware -----------------------------------------------

/// Middleware that adds `x-request-id`, `Date` and `Server` to every response.
async fn common_headers_middleware(req: Request<axum::body::Body>, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    if let Ok(id) = HeaderValue::from_str(&generate_request_id()) {
        headers.insert("x-request-id", id);
    }
    let date = httpdate::fmt_http_date(SystemTime::now());
    if let Ok(date) = HeaderValue::from_str(&date) {
        headers.insert(header::DATE, date);
    }
    headers.insert(header::SERVER, HeaderValue::from_static("bucket-index"));

    response
}

// -- Content negotiation ------------------------------------------------------

/// Whether the client prefers the JSON document over the HTML page.
///
/// The first `Accept` media range that names either representation wins;
/// anything else (including no header and `*/*`) gets HTML.
pub fn wants_json(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::ACCEPT)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|range| {
            range
                .split(';')
                .next()
                .unwrap_or("")
                .trim()
                .to_ascii_lowercase()
        })
        .find(|media| media == "application/json" || media == "text/html")
        .is_some_and(|media| media == "application/json")
}

// -- Index --------------------------------------------------------------------

/// `GET /` -- The bucket listing as HTML, or JSON when requested via `Accept`.
#[utoipa::path(
    get,
    path = "/",
    tag = "Index",
    operation_id = "GetIndex",
    responses(
        (status = 200, description = "Listing page (text/html) or document (application/json)"),
        (status = 500, description = "Refreshing the listing failed")
    )
)]
async fn index(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, IndexError> {
    let snapshot = state.cache.ensure_fresh().await?;

    let (content_type, body) = if wants_json(&headers) {
        ("application/json", snapshot.json.clone())
    } else {
        ("text/html; charset=utf-8", snapshot.html.clone())
    };
    let last_modified = httpdate::fmt_http_date(SystemTime::from(snapshot.created_at));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::LAST_MODIFIED, last_modified),
            (header::VARY, "accept".to_string()),
        ],
        body,
    )
        .into_response())
}

// -- Health check ------------------------------------------------------------

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
struct HealthReport {
    status: &'static str,
    snapshot_created_at: String,
    expires_at: String,
    entries: usize,
    groups: usize,
    last_attempt_at: Option<String>,
    last_error: Option<String>,
    consecutive_failures: u64,
}

/// `GET /health` -- Snapshot age and last refresh outcome.
///
/// Always 200 while a snapshot is being served; `status` is `stale` when
/// the most recent refresh attempt failed.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    operation_id = "HealthCheck",
    responses(
        (status = 200, description = "Health report")
    )
)]
async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.cache.current().await;
    let refresh = state.cache.status().await;

    Json(HealthReport {
        status: if refresh.last_error.is_some() {
            "stale"
        } else {
            "ok"
        },
        snapshot_created_at: snapshot.created_at.to_rfc3339(),
        expires_at: Cache::expires_at(&snapshot).to_rfc3339(),
        entries: snapshot.entry_count(),
        groups: snapshot.groups.len(),
        last_attempt_at: refresh.last_attempt_at.map(|t| t.to_rfc3339()),
        last_error: refresh.last_error,
        consecutive_failures: refresh.consecutive_failures,
    })
}

/// `GET /openapi.json` -- OpenAPI document.
async fn openapi() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

// -- Tests -------------------------------------------------------------------
