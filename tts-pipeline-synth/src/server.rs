//! HTTP surface for the synthesis trigger.
//!
//! The platform delivers each storage notification as a `POST /`. A 2xx
//! response acknowledges the event; a 5xx asks the platform to redeliver it.
//!
//! - `POST /`: handle one notification
//! - `GET /healthz`: liveness plus the languages whose engines are loaded

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::handler::{TriggerError, TriggerHandler};

/// Body returned with a non-ack.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: &'static str,
    pub transient: bool,
}

impl From<&TriggerError> for ErrorBody {
    fn from(err: &TriggerError) -> Self {
        Self {
            error: err.to_string(),
            kind: err.kind(),
            transient: err.is_transient(),
        }
    }
}

/// Body returned by the health check.
#[derive(Debug, Serialize)]
pub struct HealthBody {
    pub status: &'static str,
    pub language: String,
    pub loaded_languages: Vec<String>,
}

/// Build the router serving `handler`.
pub fn router(handler: Arc<TriggerHandler>) -> Router {
    Router::new()
        .route("/", post(handle_event))
        .route("/healthz", get(health))
        .with_state(handler)
}

async fn handle_event(State(handler): State<Arc<TriggerHandler>>, body: Bytes) -> Response {
    // An unparseable body is treated like one missing its fields.
    let payload = serde_json::from_slice::<Value>(&body).unwrap_or_else(|e| {
        debug!(error = %e, bytes = body.len(), "Request body is not JSON");
        Value::Null
    });

    match handler.handle(&payload).await {
        Ok(outcome) => {
            let status = StatusCode::from_u16(outcome.status_code()).unwrap_or(StatusCode::OK);
            (status, outcome.message()).into_response()
        }
        Err(err) => {
            warn!(kind = err.kind(), transient = err.is_transient(), "Event not acknowledged");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody::from(&err))).into_response()
        }
    }
}

async fn health(State(handler): State<Arc<TriggerHandler>>) -> Json<HealthBody> {
    Json(HealthBody {
        status: "ok",
        language: handler.settings().language.clone(),
        loaded_languages: handler.engines().loaded_languages(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::EngineCache;
    use crate::handler::TriggerSettings;
    use crate::testing::{FakeLoader, MemoryStore, StoreFailure};
    use serde_json::json;
    use std::net::SocketAddr;
    use tempfile::TempDir;

    struct TestServer {
        addr: SocketAddr,
        store: Arc<MemoryStore>,
        _scratch: TempDir,
    }

    async fn spawn_server(loader: FakeLoader) -> TestServer {
        let scratch = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let settings = TriggerSettings {
            output_bucket: "narrations".to_string(),
            language: "EN".to_string(),
            speed: 1.0,
            device: "cpu".to_string(),
            scratch_dir: scratch.path().to_path_buf(),
            max_concurrent_syntheses: None,
        };
        let engines = Arc::new(EngineCache::new(Arc::new(loader)));
        let handler = Arc::new(TriggerHandler::new(settings, store.clone(), engines));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(handler)).await.unwrap();
        });

        TestServer {
            addr,
            store,
            _scratch: scratch,
        }
    }

    fn url(server: &TestServer, path: &str) -> String {
        format!("http://{}{}", server.addr, path)
    }

    #[tokio::test]
    async fn synthesized_event_is_acknowledged() {
        let server = spawn_server(FakeLoader::new()).await;
        server.store.put("articles", "hello.txt", "Hello world.");

        let response = reqwest::Client::new()
            .post(url(&server, "/"))
            .json(&json!({ "bucket": "articles", "name": "hello.txt" }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        assert!(response.text().await.unwrap().contains("gs://narrations/hello.wav"));
        assert!(server.store.get("narrations", "hello.wav").is_some());
    }

    #[tokio::test]
    async fn skipped_event_is_acknowledged() {
        let server = spawn_server(FakeLoader::new()).await;

        let response = reqwest::Client::new()
            .post(url(&server, "/"))
            .json(&json!({ "bucket": "articles", "name": "photo.jpg" }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(response.text().await.unwrap(), "Not a TXT file, skipping.");
    }

    #[tokio::test]
    async fn non_json_body_is_malformed() {
        let server = spawn_server(FakeLoader::new()).await;

        let response = reqwest::Client::new()
            .post(url(&server, "/"))
            .body("not json")
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(response.text().await.unwrap(), "Malformed event data");
    }

    #[tokio::test]
    async fn failure_is_not_acknowledged() {
        let server = spawn_server(FakeLoader::new()).await;
        server.store.put("articles", "a.txt", "Hi.");
        server.store.fail_reads(StoreFailure::Forbidden);

        let response = reqwest::Client::new()
            .post(url(&server, "/"))
            .json(&json!({ "bucket": "articles", "name": "a.txt" }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 500);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["kind"], "store_forbidden");
        assert_eq!(body["transient"], false);
        assert!(body["error"].as_str().unwrap().contains("Permission denied"));
    }

    #[tokio::test]
    async fn engine_load_failure_is_not_acknowledged() {
        let server = spawn_server(FakeLoader::new().failing()).await;
        server.store.put("articles", "a.txt", "Hi.");

        let response = reqwest::Client::new()
            .post(url(&server, "/"))
            .json(&json!({ "bucket": "articles", "name": "a.txt" }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 500);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["kind"], "engine_load");
    }

    #[tokio::test]
    async fn health_reports_loaded_languages() {
        let server = spawn_server(FakeLoader::new()).await;
        let client = reqwest::Client::new();

        let body: Value = client.get(url(&server, "/healthz")).send().await.unwrap().json().await.unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["language"], "EN");
        assert_eq!(body["loaded_languages"], json!([]));

        server.store.put("articles", "a.txt", "Hi.");
        client
            .post(url(&server, "/"))
            .json(&json!({ "bucket": "articles", "name": "a.txt" }))
            .send()
            .await
            .unwrap();

        let body: Value = client.get(url(&server, "/healthz")).send().await.unwrap().json().await.unwrap();
        assert_eq!(body["loaded_languages"], json!(["EN"]));
    }
}
