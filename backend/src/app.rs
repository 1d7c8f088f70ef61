//! Application state and HTTP router construction.
//!
//! Used by [main] and by [HttpServerService](crate::services::HttpServerService)
//! to build the Axum app.

use std::sync::Arc;

use async_graphql::http::GraphiQLSource;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::Router;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::Config;
use crate::error::SchemaError;
use crate::graphql::{AdminSchema, RequestContext};
use crate::services::{SchemaManager, ServicesManager};

/// Shared state for HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub schemas: Arc<SchemaManager>,
    pub admin: AdminSchema,
    pub services: Arc<ServicesManager>,
}

/// Build the full Axum router: /graphql, /graphql/{keyspace}, /graphql-schema,
/// /health and layers. Returns Router<()> (state fully applied) for use with
/// axum::serve.
pub fn build_app(state: AppState) -> Router<()> {
    Router::new()
        .route("/graphql", get(graphiql).post(default_keyspace_handler))
        .route("/graphql/{keyspace}", get(graphiql).post(keyspace_handler))
        .route("/graphql-schema", get(graphiql).post(admin_handler))
        .merge(crate::api::health::router())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GraphiQL for browsers, pointed at the endpoint it was served from.
async fn graphiql(uri: Uri, headers: HeaderMap) -> Response {
    let accepts_html = headers
        .get(axum::http::header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("text/html"))
        .unwrap_or(false);

    if accepts_html {
        Html(GraphiQLSource::build().endpoint(uri.path()).finish()).into_response()
    } else {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            axum::Json(serde_json::json!({
                "error": "GET requests are not supported for GraphQL queries. Use POST with Content-Type: application/json"
            })),
        )
            .into_response()
    }
}

fn request_context(state: &AppState, headers: &HeaderMap) -> RequestContext {
    RequestContext {
        acting_as: headers
            .get(state.config.acting_as_header.as_str())
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    }
}

fn keyspace_unavailable(keyspace: &str, error: &SchemaError) -> Response {
    if !matches!(error, SchemaError::KeyspaceNotFound(_)) {
        warn!(keyspace = %keyspace, error = %error, "Keyspace schema unavailable");
    }
    (
        StatusCode::NOT_FOUND,
        axum::Json(serde_json::json!({
            "error": error.to_string(),
            "keyspace": keyspace,
        })),
    )
        .into_response()
}

async fn execute_keyspace(
    state: &AppState,
    keyspace: &str,
    headers: &HeaderMap,
    req: GraphQLRequest,
) -> Response {
    let schema = match state.schemas.get(keyspace).await {
        Ok(schema) => schema,
        Err(e) => return keyspace_unavailable(keyspace, &e),
    };
    let request = req.into_inner().data(request_context(state, headers));
    GraphQLResponse::from(schema.schema.execute(request).await).into_response()
}

async fn keyspace_handler(
    State(state): State<AppState>,
    Path(keyspace): Path<String>,
    headers: HeaderMap,
    req: GraphQLRequest,
) -> Response {
    execute_keyspace(&state, &keyspace, &headers, req).await
}

async fn default_keyspace_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    req: GraphQLRequest,
) -> Response {
    let Some(keyspace) = state.config.default_keyspace.clone() else {
        return (
            StatusCode::NOT_FOUND,
            axum::Json(serde_json::json!({
                "error": "No default keyspace configured. Use /graphql/{keyspace}"
            })),
        )
            .into_response();
    };
    execute_keyspace(&state, &keyspace, &headers, req).await
}

async fn admin_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    req: GraphQLRequest,
) -> GraphQLResponse {
    let request = req.into_inner().data(request_context(&state, &headers));
    state.admin.execute(request).await.into()
}
