//! The inbound webhook surface.
//!
//! One route does the work: `POST /webhook` takes the document-update payload,
//! normalises it, and hands the record to the configured publish target.
//! `GET /health` exists for the platform's liveness probe.

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use ticker_publish::{parse_webhook_body, PublishError, PublishTarget};

pub struct AppState {
    pub target: Arc<dyn PublishTarget>,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhook", post(handle_webhook))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(64 * 1024))
        .with_state(state)
}

async fn handle_health() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

async fn handle_webhook(State(state): State<Arc<AppState>>, body: String) -> Response {
    tracing::info!(body_len = body.len(), "webhook received");

    let record = match parse_webhook_body(&body) {
        Ok(record) => record,
        Err(err) => {
            tracing::warn!(error = %err, "rejected webhook payload");
            return failure(StatusCode::BAD_REQUEST, &err);
        }
    };

    tracing::info!(
        target = state.target.name(),
        text_len = record.text.len(),
        has_timestamp = record.timestamp.is_some(),
        "dispatching update"
    );

    match state.target.publish(&record).await {
        Ok(receipt) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": receipt.message,
                "target": state.target.name(),
                "updated_text": record.text,
                "commit": receipt.commit_sha,
                "upstream": receipt.upstream,
                "timestamp": chrono::Utc::now().to_rfc3339(),
            })),
        )
            .into_response(),
        Err(err) => {
            tracing::error!(target = state.target.name(), error = %err, "publish failed");
            let status = match &err {
                PublishError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            failure(status, &err)
        }
    }
}

fn failure(status: StatusCode, err: &PublishError) -> Response {
    (
        status,
        Json(json!({ "success": false, "error": err.to_string() })),
    )
        .into_response()
}
