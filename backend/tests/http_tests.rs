//! HTTP surface tests
//!
//! Requests go through the full router with `tower::ServiceExt::oneshot`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use cqlgate::app::{AppState, build_app};
use cqlgate::config::Config;
use cqlgate::error::ExecutionError;
use cqlgate::graphql::{ExecutionDefaults, ExecutionEnv, NamingConfig, build_admin_schema};
use cqlgate::services::{SchemaManager, ServicesManager};
use cqlgate::store::{
    ColumnKind, ColumnMetadata, ExecutionRequest, MemoryStore, NativeType, ResultSet,
    StatementExecutor, TableMetadata,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tower::ServiceExt;

/// Delegates to the memory store and remembers who each statement ran as.
struct RecordingExecutor {
    store: Arc<MemoryStore>,
    acting_as: Mutex<Vec<Option<String>>>,
}

#[async_trait]
impl StatementExecutor for RecordingExecutor {
    async fn execute(&self, request: ExecutionRequest) -> Result<ResultSet, ExecutionError> {
        self.acting_as.lock().push(request.acting_as.clone());
        self.store.execute(request).await
    }
}

struct Harness {
    state: AppState,
    recorder: Arc<RecordingExecutor>,
}

fn harness(vars: &[(&str, &str)]) -> Harness {
    let store = Arc::new(MemoryStore::new());
    store.create_keyspace("shop", Default::default());
    store
        .put_table(
            "shop",
            TableMetadata::new(
                "orders",
                vec![
                    ColumnMetadata::new("id", ColumnKind::PartitionKey, NativeType::Int),
                    ColumnMetadata::new("item", ColumnKind::Regular, NativeType::Text),
                ],
            ),
        )
        .unwrap();

    let recorder = Arc::new(RecordingExecutor {
        store: store.clone(),
        acting_as: Mutex::new(Vec::new()),
    });
    let env = ExecutionEnv::new(recorder.clone(), ExecutionDefaults::default());
    let schemas = Arc::new(SchemaManager::new(store, env, NamingConfig::default()));

    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let config = Config::from_lookup(|key| vars.get(key).cloned()).unwrap();

    Harness {
        state: AppState {
            config: Arc::new(config),
            admin: build_admin_schema(schemas.clone()),
            schemas,
            services: Arc::new(ServicesManager::new()),
        },
        recorder,
    }
}

fn graphql(uri: &str, query: &str) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "query": query }).to_string()))
        .unwrap()
}

async fn send(state: &AppState, request: Request<Body>) -> (StatusCode, Value) {
    let response = build_app(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn keyspace_endpoint_executes_queries() {
    let h = harness(&[]);
    let (status, body) = send(
        &h.state,
        graphql(
            "/graphql/shop",
            r#"mutation { insertOrders(value: {id: 1, item: "lamp"}) { applied } }"#,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"data": {"insertOrders": {"applied": true}}}));

    let (status, body) = send(
        &h.state,
        graphql("/graphql/shop", "{ orders { values { id item } } }"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"data": {"orders": {"values": [{"id": 1, "item": "lamp"}]}}})
    );
}

#[tokio::test]
async fn unknown_keyspace_is_not_found() {
    let h = harness(&[]);
    let (status, body) = send(&h.state, graphql("/graphql/nowhere", "{ _keyspace }")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["keyspace"], "nowhere");

    let (status, _) = send(&h.state, graphql("/graphql/system", "{ _keyspace }")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn default_keyspace_endpoint() {
    let h = harness(&[]);
    let (status, _) = send(&h.state, graphql("/graphql", "{ orders { values { id } } }")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let h = harness(&[("DEFAULT_KEYSPACE", "shop")]);
    let (status, body) = send(&h.state, graphql("/graphql", "{ orders { values { id } } }")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"data": {"orders": {"values": []}}}));
}

#[tokio::test]
async fn acting_as_header_is_forwarded() {
    let h = harness(&[("ACTING_AS_HEADER", "X-User")]);
    let mut request = graphql("/graphql/shop", "{ orders { values { id } } }");
    request
        .headers_mut()
        .insert("x-user", "alice".parse().unwrap());
    let (status, _) = send(&h.state, request).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&h.state, graphql("/graphql/shop", "{ orders { values { id } } }")).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(
        *h.recorder.acting_as.lock(),
        vec![Some("alice".to_string()), None]
    );
}

#[tokio::test]
async fn admin_endpoint_lists_keyspaces() {
    let h = harness(&[]);
    let (status, body) = send(
        &h.state,
        graphql("/graphql-schema", "{ keyspaces { name tables { name } } }"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"data": {"keyspaces": [{"name": "shop", "tables": [{"name": "orders"}]}]}})
    );
}

#[tokio::test]
async fn get_serves_graphiql_only_to_browsers() {
    let h = harness(&[]);
    let request = Request::get("/graphql/shop")
        .header(header::ACCEPT, "text/html")
        .body(Body::empty())
        .unwrap();
    let response = build_app(h.state.clone()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(String::from_utf8_lossy(&bytes).contains("/graphql/shop"));

    let request = Request::get("/graphql-schema").body(Body::empty()).unwrap();
    let (status, body) = send(&h.state, request).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert!(body["error"].as_str().unwrap().contains("POST"));
}

#[tokio::test]
async fn health_reports_services() {
    let h = harness(&[]);
    let request = Request::get("/health").body(Body::empty()).unwrap();
    let (status, body) = send(&h.state, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["services"], json!({}));
}
