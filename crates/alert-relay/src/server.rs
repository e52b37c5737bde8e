//! HTTP server for Alertmanager webhooks.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{OriginalUri, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::alert::AlertGroup;
use crate::pipeline::NotificationPipeline;

/// Body of every response.
#[derive(Debug, Serialize)]
struct StatusResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    msg: Option<String>,
}

impl StatusResponse {
    fn ok() -> Self {
        Self {
            status: "ok",
            msg: None,
        }
    }

    fn error(msg: String) -> Self {
        Self {
            status: "error",
            msg: Some(msg),
        }
    }
}

/// Build the webhook router.
///
/// The severity may come from the path (`/alertmanager/critical`, or the
/// bare `/critical` form older deployments use) or from the alert labels.
pub fn build_router(pipeline: Arc<NotificationPipeline>) -> Router {
    Router::new()
        .route("/", get(ping_handler))
        .route("/alertmanager", post(webhook_handler))
        .route("/alertmanager/{severity}", post(severity_webhook_handler))
        .route("/{severity}", post(severity_webhook_handler))
        .fallback(not_found_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(pipeline)
}

async fn ping_handler() -> impl IntoResponse {
    Json(StatusResponse::ok())
}

async fn webhook_handler(
    State(pipeline): State<Arc<NotificationPipeline>>,
    body: Bytes,
) -> impl IntoResponse {
    process(pipeline, None, &body).await
}

async fn severity_webhook_handler(
    State(pipeline): State<Arc<NotificationPipeline>>,
    Path(severity): Path<String>,
    body: Bytes,
) -> impl IntoResponse {
    process(pipeline, Some(severity), &body).await
}

async fn not_found_handler(OriginalUri(uri): OriginalUri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(StatusResponse::error(format!("{uri} not found"))),
    )
}

/// Parse the body and run the pipeline.
///
/// Anything that parses is answered with `ok`, whatever happened downstream.
async fn process(
    pipeline: Arc<NotificationPipeline>,
    severity: Option<String>,
    body: &[u8],
) -> (StatusCode, Json<StatusResponse>) {
    let batch: AlertGroup = match serde_json::from_slice(body) {
        Ok(batch) => batch,
        Err(e) => {
            warn!(error = %e, "Rejecting malformed webhook payload");
            return (
                StatusCode::BAD_REQUEST,
                Json(StatusResponse::error(format!(
                    "malformed Alertmanager payload: {e}"
                ))),
            );
        }
    };

    info!(
        alerts = batch.alerts.len(),
        status = batch.status.as_str(),
        receiver = %batch.receiver,
        severity = severity.as_deref().unwrap_or("-"),
        "Received webhook"
    );

    // Spawned so dispatch finishes even if the client hangs up.
    let task = tokio::spawn(async move {
        pipeline.handle(batch, severity.as_deref()).await;
    });
    if let Err(e) = task.await {
        error!(error = %e, "Webhook processing task failed");
    }

    (StatusCode::OK, Json(StatusResponse::ok()))
}
