//! HTTP ingress: accept-and-enqueue only
//!
//! `POST /api/v1/ask` validates nothing beyond its own shape, generates any
//! missing ids, enqueues the job, and answers 202 immediately. All real work
//! happens in the background workers.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};
use uuid::Uuid;

use crate::storage::{CallbackDetails, JobPayload, JobQueue};

/// Shared state of the ingress router
#[derive(Clone)]
pub struct AppState {
    queue: Arc<dyn JobQueue>,
}

/// Build the ingress router
pub fn router(queue: Arc<dyn JobQueue>) -> Router {
    Router::new()
        .route("/api/v1/ask", post(ask))
        .route("/health", get(health))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(AppState { queue })
}

/// Body of `POST /api/v1/ask`
#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub user_id: String,
    pub question: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub addressing_info: Option<Value>,
}

async fn ask(State(state): State<AppState>, Json(request): Json<AskRequest>) -> Response {
    let task_id = request
        .task_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let session_id = request
        .session_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let payload = JobPayload {
        task_id: task_id.clone(),
        user_id: request.user_id,
        session_id: session_id.clone(),
        user_input: request.question,
        callback_details: CallbackDetails {
            webhook_url: request.webhook_url,
            addressing_info: request.addressing_info.unwrap_or(Value::Null),
        },
    };

    if let Err(e) = state.queue.enqueue(&payload).await {
        error!(%task_id, "failed to enqueue task: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "detail": format!("Não foi possível enfileirar a tarefa para processamento: {}", e)
            })),
        )
            .into_response();
    }

    info!(%task_id, user_id = %payload.user_id, "task enqueued");

    (
        StatusCode::ACCEPTED,
        Json(json!({
            "message": "Sua requisição foi aceita e está sendo processada em segundo plano.",
            "task_id": task_id,
            "session_id": session_id,
        })),
    )
        .into_response()
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": crate::VERSION,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::inmem::InMemoryJobQueue;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_ask_enqueues_and_generates_ids() {
        let queue = Arc::new(InMemoryJobQueue::new(3));
        let app = router(queue.clone());

        let body = json!({"user_id": "alice", "question": "qual a previsão do tempo?"});
        let response = app
            .oneshot(
                axum::http::Request::post("/api/v1/ask")
                    .header("content-type", "application/json")
                    .body(axum::body::Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let reply: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(reply["task_id"].as_str().is_some());
        assert!(reply["session_id"].as_str().is_some());

        let job = queue.claim().await.unwrap().unwrap();
        assert_eq!(job.payload.user_id, "alice");
        assert_eq!(job.payload.user_input, "qual a previsão do tempo?");
    }

    #[tokio::test]
    async fn test_health() {
        let app = router(Arc::new(InMemoryJobQueue::new(3)));
        let response = app
            .oneshot(
                axum::http::Request::get("/health")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let reply: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(reply["status"], "healthy");
    }
}
