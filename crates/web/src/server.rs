//! Task boundary HTTP server
//!
//! `POST /tasks/:name` forwards the JSON body to the dispatcher and answers
//! with the backend-native result. Failures answer with an [`ErrorBody`].

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use taskbridge_common::{BridgeError, ErrorBody, RuntimeConfig};
use taskbridge_tasks::Dispatcher;

/// Shared server state
#[derive(Clone)]
pub struct BoundaryState {
    pub dispatcher: Arc<Dispatcher>,
    pub config: Arc<RuntimeConfig>,
}

/// Error response for the boundary
pub struct ApiError(BridgeError);

impl From<BridgeError> for ApiError {
    fn from(e: BridgeError) -> Self {
        Self(e)
    }
}

/// HTTP status for an error kind
pub fn status_for(error: &BridgeError) -> StatusCode {
    match error {
        BridgeError::UnknownTask(_) => StatusCode::NOT_FOUND,
        BridgeError::UnsupportedOperation(_)
        | BridgeError::InvalidRequest(_)
        | BridgeError::Json(_) => StatusCode::BAD_REQUEST,
        BridgeError::Connection(_) | BridgeError::Backend(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            warn!("Task failed ({}): {}", status, self.0);
        } else {
            debug!("Task rejected ({}): {}", status, self.0);
        }
        (status, Json(ErrorBody::from(&self.0))).into_response()
    }
}

async fn run_task_handler(
    State(state): State<BoundaryState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    // An empty body is a null payload
    let payload = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| BridgeError::InvalidRequest(format!("request body is not JSON: {}", e)))?
    };

    let result = state.dispatcher.dispatch(&name, payload).await?;
    Ok(Json(result))
}

async fn health_handler(State(state): State<BoundaryState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "environment": state.config.environment(),
        "tasks": state.dispatcher.task_names(),
    }))
}

async fn not_found_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "not_found", "message": "no such route" })),
    )
}

/// Task boundary server
pub struct BoundaryServer {
    state: BoundaryState,
}

impl BoundaryServer {
    pub fn new(dispatcher: Dispatcher, config: Arc<RuntimeConfig>) -> Self {
        Self {
            state: BoundaryState {
                dispatcher: Arc::new(dispatcher),
                config,
            },
        }
    }

    pub fn state(&self) -> &BoundaryState {
        &self.state
    }

    /// Create router
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/tasks/:name", post(run_task_handler))
            .fallback(not_found_handler)
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Bind and serve until the process exits
    pub async fn serve(self, addr: SocketAddr) -> anyhow::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve_on(listener).await
    }

    /// Serve on an already bound listener
    pub async fn serve_on(self, listener: TcpListener) -> anyhow::Result<()> {
        info!(
            "Task boundary listening on http://{} ({})",
            listener.local_addr()?,
            self.state.config.environment()
        );
        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::collections::BTreeMap;
    use taskbridge_common::FixtureData;
    use taskbridge_tasks::task_fn;
    use test_case::test_case;
    use tower::ServiceExt;

    fn server() -> BoundaryServer {
        let mut dispatcher = Dispatcher::new();
        dispatcher
            .register("echo", task_fn(|payload: Value| async move { Ok::<_, BridgeError>(payload) }))
            .register(
                "broken",
                task_fn(|_| async {
                    Err::<Value, _>(BridgeError::Backend("Unknown column 'NAME'".to_string()))
                }),
            );
        let config = RuntimeConfig::assemble("qa", BTreeMap::new(), FixtureData::new(json!({})));
        BoundaryServer::new(dispatcher, Arc::new(config))
    }

    async fn send(request: Request<Body>) -> (StatusCode, Value) {
        let response = server().router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_task(name: &str, body: &str) -> Request<Body> {
        Request::post(format!("/tasks/{}", name))
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_result_is_returned_unchanged() {
        let (status, body) = send(post_task("echo", r#"{"sql":"SELECT ?","params":[1]}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "sql": "SELECT ?", "params": [1] }));
    }

    #[tokio::test]
    async fn test_unknown_task_is_404() {
        let (status, body) = send(post_task("queryOracle", "\"SELECT 1\"")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "unknown_task");
        assert_eq!(body["message"], "queryOracle");
    }

    #[tokio::test]
    async fn test_backend_error_keeps_native_message() {
        let (status, body) = send(post_task("broken", "null")).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body, json!({ "error": "backend", "message": "Unknown column 'NAME'" }));
    }

    #[tokio::test]
    async fn test_malformed_body_is_400() {
        let (status, body) = send(post_task("echo", "{not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_request");
    }

    #[tokio::test]
    async fn test_health_reports_environment() {
        let request = Request::get("/health").body(Body::empty()).unwrap();
        let (status, body) = send(request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["environment"], "QA");
    }

    #[test_case(BridgeError::UnknownTask("x".into()), StatusCode::NOT_FOUND ; "unknown task")]
    #[test_case(BridgeError::UnsupportedOperation("aggregate".into()), StatusCode::BAD_REQUEST ; "unsupported")]
    #[test_case(BridgeError::InvalidRequest("x".into()), StatusCode::BAD_REQUEST ; "invalid")]
    #[test_case(BridgeError::Connection("refused".into()), StatusCode::BAD_GATEWAY ; "connection")]
    #[test_case(BridgeError::Backend("syntax".into()), StatusCode::BAD_GATEWAY ; "backend")]
    #[test_case(BridgeError::Configuration("MYSQL_HOST is not set".into()), StatusCode::INTERNAL_SERVER_ERROR ; "configuration")]
    fn test_status_mapping(error: BridgeError, expected: StatusCode) {
        assert_eq!(status_for(&error), expected);
    }
}
