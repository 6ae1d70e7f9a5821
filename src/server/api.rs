//! HTTP surface of the reference audit server.
//!
//! ```text
//! GET  /api/health                            (no auth)
//! GET  /api/auditoria/<collection>/?search=&page=   (auth)
//! POST /api/auditoria/<collection>/           (auth)
//! GET  /api/auditoria/<collection>/<id>/      (auth)
//! ```

use axum::{
    extract::{OriginalUri, Path, Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;

use super::storage::AuditStore;
use crate::models::EntityType;

/// Rows per list page unless configured otherwise.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    store: Arc<AuditStore>,
    tokens: Arc<HashSet<String>>,
    page_size: usize,
}

impl AppState {
    pub fn new(tokens: impl IntoIterator<Item = String>) -> Self {
        Self {
            store: Arc::new(AuditStore::new()),
            tokens: Arc::new(tokens.into_iter().collect()),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

/// Builds the full router, nested under `/api`.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new().route("/health", get(health));

    let protected_routes = Router::new()
        .route(
            "/auditoria/{collection}/",
            get(list_entities).post(create_entity),
        )
        .route("/auditoria/{collection}/{id}/", get(get_entity))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new().nest(
        "/api",
        Router::new()
            .merge(public_routes)
            .merge(protected_routes)
            .with_state(state),
    )
}

// ============================================================================
// Authentication
// ============================================================================

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

async fn auth_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(h) if h.starts_with("Bearer ") => &h[7..],
        Some(_) => {
            return detail(
                StatusCode::UNAUTHORIZED,
                "Authorization header must use Bearer scheme",
            );
        }
        None => {
            return detail(
                StatusCode::UNAUTHORIZED,
                "Authentication credentials were not provided.",
            );
        }
    };

    if state.tokens.contains(token) {
        next.run(request).await
    } else {
        detail(StatusCode::UNAUTHORIZED, "Given token not valid for any token type")
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Deserialize)]
struct ListParams {
    search: Option<String>,
    page: Option<usize>,
}

/// One page of a list response. `count` is the total across pages.
#[derive(Serialize)]
struct Page {
    count: usize,
    next: Option<String>,
    previous: Option<String>,
    results: Vec<Value>,
}

fn entity_type_for(collection: &str) -> Result<EntityType, Response> {
    EntityType::SYNC_ORDER
        .into_iter()
        .find(|t| t.collection() == collection)
        .ok_or_else(|| detail(StatusCode::NOT_FOUND, "Not found."))
}

async fn list_entities(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Query(params): Query<ListParams>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Result<Json<Page>, Response> {
    let entity_type = entity_type_for(&collection)?;
    let rows = state
        .store
        .list(entity_type, params.search.as_deref())
        .await;

    let count = rows.len();
    let page = params.page.unwrap_or(1).max(1);
    let start = (page - 1).saturating_mul(state.page_size);
    let results: Vec<Value> = rows.into_iter().skip(start).take(state.page_size).collect();

    let link = |page: usize| page_link(&headers, uri.path(), params.search.as_deref(), page);
    let next = if start + results.len() < count {
        link(page + 1)
    } else {
        None
    };
    let previous = if page > 1 { link(page - 1) } else { None };

    Ok(Json(Page {
        count,
        next,
        previous,
        results,
    }))
}

/// Absolute link to another page of the same listing. Needs a `Host` header.
fn page_link(headers: &HeaderMap, path: &str, search: Option<&str>, page: usize) -> Option<String> {
    let host = headers.get(header::HOST)?.to_str().ok()?;
    let mut url = reqwest::Url::parse(&format!("http://{}{}", host, path)).ok()?;
    {
        let mut query = url.query_pairs_mut();
        if let Some(search) = search {
            query.append_pair("search", search);
        }
        query.append_pair("page", &page.to_string());
    }
    Some(url.into())
}

async fn create_entity(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), Response> {
    let entity_type = entity_type_for(&collection)?;

    match state.store.create(entity_type, body).await {
        Ok(created) => {
            tracing::info!(%entity_type, id = %created["id"], "Created entity");
            Ok((StatusCode::CREATED, Json(created)))
        }
        Err(errors) => {
            tracing::info!(%entity_type, ?errors, "Rejected entity");
            Err((StatusCode::BAD_REQUEST, Json(errors)).into_response())
        }
    }
}

async fn get_entity(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, i64)>,
) -> Result<Json<Value>, Response> {
    let entity_type = entity_type_for(&collection)?;
    state
        .store
        .get(entity_type, id)
        .await
        .map(Json)
        .ok_or_else(|| detail(StatusCode::NOT_FOUND, "Not found."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    const TOKEN: &str = "secret";
    const INSTITUTIONS: &str = "/api/auditoria/instituciones/";

    fn app() -> Router {
        router(AppState::new([TOKEN.to_string()]))
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN));
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn escuela() -> Value {
        json!({"codigo": "ESC001", "nombre": "Escuela 1", "tipo": "escuela"})
    }

    #[tokio::test]
    async fn test_health_needs_no_auth() {
        let request = Request::builder()
            .uri("/api/health")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let request = Request::builder()
            .uri(INSTITUTIONS)
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_wrong_token_is_unauthorized() {
        let request = Request::builder()
            .uri(INSTITUTIONS)
            .header(header::AUTHORIZATION, "Bearer nope")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_create_then_search() {
        let app = app();

        let (status, created) = send(&app, "POST", INSTITUTIONS, Some(escuela())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["id"], 1);

        let uri = format!("{}?search=ESC001", INSTITUTIONS);
        let (status, page) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["count"], 1);
        assert_eq!(page["results"][0]["codigo"], "ESC001");
        assert!(page["next"].is_null());

        let uri = format!("{}1/", INSTITUTIONS);
        let (status, fetched) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["nombre"], "Escuela 1");
    }

    #[tokio::test]
    async fn test_duplicate_code_returns_validation_error() {
        let app = app();
        send(&app, "POST", INSTITUTIONS, Some(escuela())).await;

        let (status, body) = send(&app, "POST", INSTITUTIONS, Some(escuela())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["codigo"][0].as_str().unwrap().contains("already exists"));
    }

    #[tokio::test]
    async fn test_list_is_paginated_with_absolute_links() {
        let app = router(AppState::new([TOKEN.to_string()]).with_page_size(2));
        for code in ["ESC001", "ESC002", "ESC003"] {
            let body = json!({"codigo": code, "nombre": code, "tipo": "escuela"});
            send(&app, "POST", INSTITUTIONS, Some(body)).await;
        }

        let request = Request::builder()
            .uri(INSTITUTIONS)
            .header(header::HOST, "audit.local:8000")
            .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let page: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(page["count"], 3);
        assert_eq!(page["results"].as_array().unwrap().len(), 2);
        assert_eq!(
            page["next"],
            "http://audit.local:8000/api/auditoria/instituciones/?page=2"
        );
        assert!(page["previous"].is_null());

        let uri = format!("{}?page=2", INSTITUTIONS);
        let (_, page) = send(&app, "GET", &uri, None).await;
        assert_eq!(page["results"][0]["codigo"], "ESC003");
        assert!(page["next"].is_null());
    }

    #[tokio::test]
    async fn test_unknown_collection_is_not_found() {
        let (status, _) = send(&app(), "GET", "/api/auditoria/escuelas/", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
