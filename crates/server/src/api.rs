//! `/api/v1` handlers: message definition CRUD plus health and scheduler status.
//!
//! Every response uses the same envelope:
//! `{"status": "success" | "error", "message": .., "data": ..}`.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use relay_core::{MessageDefinition, MAX_FREQUENCY_SECONDS};
use relay_scheduler::SchedulerStatus;
use relay_store::{StoreError, StoredMessage};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

use crate::state::AppState;

// ── Envelope ─────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status: &'static str,
    pub message: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    fn success(data: T) -> Json<Self> {
        Json(Self {
            status: "success",
            message: "ok".into(),
            data: Some(data),
        })
    }
}

/// Error half of every handler result.
#[derive(Debug)]
pub struct ApiError {
    code: StatusCode,
    message: String,
}

impl ApiError {
    fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<Value> {
            status: "error",
            message: self.message,
            data: None,
        };
        (self.code, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => {
                Self::new(StatusCode::NOT_FOUND, format!("message {} not found", id))
            }
            StoreError::Invalid(msg) => Self::bad_request(msg),
            other => {
                error!(error = %other, "message store failure");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(
            rejection.status(),
            format!("invalid request payload: {}", rejection.body_text()),
        )
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::new(
            rejection.status(),
            format!("invalid id: {}", rejection.body_text()),
        )
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

// ── Request types ────────────────────────────────────────────────

/// Body of `POST /messages` and `PUT /messages/{id}`.
///
/// `frequency` is signed so negative values can be rejected with a clear
/// message rather than a decode error.
#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub frequency: i64,
}

impl TryFrom<MessageRequest> for MessageDefinition {
    type Error = ApiError;

    fn try_from(req: MessageRequest) -> Result<Self, Self::Error> {
        if req.topic.trim().is_empty() {
            return Err(ApiError::bad_request("topic must not be empty"));
        }
        let frequency = u64::try_from(req.frequency)
            .map_err(|_| ApiError::bad_request("frequency must be zero or positive"))?;
        if frequency > MAX_FREQUENCY_SECONDS {
            return Err(ApiError::bad_request(format!(
                "frequency must not exceed {} seconds",
                MAX_FREQUENCY_SECONDS
            )));
        }
        Ok(MessageDefinition::new(req.topic, req.payload, frequency))
    }
}

// ── Handlers ─────────────────────────────────────────────────────

/// GET /api/v1/
pub async fn index() -> Json<ApiResponse<&'static str>> {
    ApiResponse::success("Welcome! This is the index route for the message relay.")
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub connections: usize,
    pub scheduler_running: bool,
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let connections = state.hub.connection_count().await;
    let scheduler_running = state.scheduler.borrow().running;
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        connections,
        scheduler_running,
    })
}

/// GET /api/v1/scheduler
pub async fn scheduler_status(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<SchedulerStatus>> {
    let status = state.scheduler.borrow().clone();
    ApiResponse::success(status)
}

/// GET /api/v1/messages
pub async fn messages_list(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ApiResponse<Vec<StoredMessage>>>> {
    let rows = state.store.list().await?;
    Ok(ApiResponse::success(rows))
}

/// POST /api/v1/messages
pub async fn messages_create(
    State(state): State<Arc<AppState>>,
    body: Result<Json<MessageRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ApiResponse<StoredMessage>>)> {
    let Json(req) = body?;
    let definition = MessageDefinition::try_from(req)?;
    let row = state.store.create(definition).await?;
    info!(id = row.id, topic = %row.definition.topic, "message definition created");
    Ok((StatusCode::CREATED, ApiResponse::success(row)))
}

/// GET /api/v1/messages/{id}
pub async fn messages_get(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i32>, PathRejection>,
) -> ApiResult<Json<ApiResponse<StoredMessage>>> {
    let Path(id) = path?;
    let row = state.store.get(id).await?;
    Ok(ApiResponse::success(row))
}

/// PUT /api/v1/messages/{id}
pub async fn messages_update(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i32>, PathRejection>,
    body: Result<Json<MessageRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<StoredMessage>>> {
    let Path(id) = path?;
    let Json(req) = body?;
    let definition = MessageDefinition::try_from(req)?;
    let row = state.store.update(id, definition).await?;
    info!(id, topic = %row.definition.topic, "message definition updated");
    Ok(ApiResponse::success(row))
}

/// DELETE /api/v1/messages/{id}
pub async fn messages_delete(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i32>, PathRejection>,
) -> ApiResult<Json<ApiResponse<String>>> {
    let Path(id) = path?;
    state.store.delete(id).await?;
    info!(id, "message definition deleted");
    Ok(ApiResponse::success(format!("message {} deleted", id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use http_body_util::BodyExt;
    use relay_hub::Hub;
    use relay_scheduler::{RestartSignal, SignalingStore};
    use relay_store::MemoryStore;
    use serde_json::json;
    use tokio::sync::watch;
    use tower::ServiceExt;

    use crate::live::Keepalive;
    use crate::router::build_router;

    fn test_app() -> (axum::Router, RestartSignal) {
        let restart = RestartSignal::new();
        let store = SignalingStore::new(MemoryStore::new(), restart.clone());
        let (hub, _task) = Hub::spawn(8);
        let (_tx, scheduler) = watch::channel(SchedulerStatus::default());
        let state = Arc::new(AppState {
            store: Arc::new(store),
            hub,
            scheduler,
            keepalive: Keepalive::default(),
        });
        (build_router(state, "*"), restart)
    }

    async fn call(app: &axum::Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        });
        (status, value)
    }

    #[tokio::test]
    async fn crud_lifecycle() {
        let (app, restart) = test_app();

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/v1/messages",
            Some(json!({"topic": "sensors/temp", "payload": {"value": 22, "ts": 0}, "frequency": 5})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "success");
        assert_eq!(body["data"]["id"], 1);
        assert_eq!(restart.requested(), 1);

        let (status, body) = call(&app, Method::GET, "/api/v1/messages", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["data"],
            json!([{"id": 1, "topic": "sensors/temp", "payload": {"value": 22, "ts": 0}, "frequency": 5}])
        );

        let (status, body) = call(
            &app,
            Method::PUT,
            "/api/v1/messages/1",
            Some(json!({"topic": "sensors/temp", "payload": {"value": 23}, "frequency": 0})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["frequency"], 0);
        assert_eq!(restart.requested(), 2);

        let (status, body) = call(&app, Method::GET, "/api/v1/messages/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["payload"], json!({"value": 23}));

        let (status, _) = call(&app, Method::DELETE, "/api/v1/messages/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(restart.requested(), 3);

        let (status, body) = call(&app, Method::GET, "/api/v1/messages/1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], "error");
        assert_eq!(body["data"], Value::Null);
    }

    #[tokio::test]
    async fn invalid_definitions_are_rejected() {
        let (app, restart) = test_app();

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/v1/messages",
            Some(json!({"topic": "", "payload": {}, "frequency": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "topic must not be empty");

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/v1/messages",
            Some(json!({"topic": "a", "frequency": -1})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/v1/messages",
            Some(json!({"topic": "a", "frequency": i32::MAX as i64 + 1})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
        assert!(body["message"].as_str().unwrap().contains("must not exceed"));

        let (status, body) = call(&app, Method::POST, "/api/v1/messages", Some(json!("nope"))).await;
        assert!(status.is_client_error());
        assert_eq!(body["status"], "error");

        assert_eq!(restart.requested(), 0);
    }

    #[tokio::test]
    async fn malformed_ids_use_the_error_envelope() {
        let (app, restart) = test_app();
        for (method, body) in [
            (Method::GET, None),
            (Method::PUT, Some(json!({"topic": "a", "frequency": 1}))),
            (Method::DELETE, None),
        ] {
            let (status, body) = call(&app, method, "/api/v1/messages/abc", body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["status"], "error");
            assert!(body["message"].as_str().unwrap().starts_with("invalid id"));
        }

        let (status, body) = call(&app, Method::GET, "/api/v1/messages/99999999999", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
        assert_eq!(restart.requested(), 0);
    }

    #[tokio::test]
    async fn missing_rows_are_not_found() {
        let (app, restart) = test_app();
        let (status, _) = call(
            &app,
            Method::PUT,
            "/api/v1/messages/9",
            Some(json!({"topic": "a", "frequency": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = call(&app, Method::DELETE, "/api/v1/messages/9", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(restart.requested(), 0);
    }

    #[tokio::test]
    async fn index_health_and_scheduler() {
        let (app, _) = test_app();

        let (status, body) = call(&app, Method::GET, "/api/v1/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");

        let (status, body) = call(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["connections"], 0);

        let (status, body) = call(&app, Method::GET, "/api/v1/scheduler", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["generation"], 0);
        assert_eq!(body["data"]["periodic_tasks"], 0);
    }

    #[tokio::test]
    async fn unknown_route_is_plain_404() {
        let (app, _) = test_app();
        let (status, body) = call(&app, Method::GET, "/nowhere", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, Value::String("404 - Not Found".into()));
    }
}
