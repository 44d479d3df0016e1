use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use vakil_core::handler::InboundHandler;

use crate::payload::{extract_first_message, WebhookPayload};

#[derive(Clone)]
pub struct WebhookState {
    pub verify_token: String,
    pub handler: Arc<InboundHandler>,
}

/// Build the webhook router (shared between production startup and tests).
pub fn router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/webhook", get(verify_webhook).post(receive_webhook))
        .route("/health", get(health))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: Arc<WebhookState>) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "webhook server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Meta webhook verification handshake (`GET /webhook`).
#[derive(Debug, Deserialize)]
struct VerifyParams {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

async fn verify_webhook(
    State(state): State<Arc<WebhookState>>,
    Query(params): Query<VerifyParams>,
) -> impl IntoResponse {
    if params.mode.as_deref() == Some("subscribe")
        && params.verify_token.as_deref() == Some(state.verify_token.as_str())
    {
        info!("webhook verified");
        (StatusCode::OK, params.challenge.unwrap_or_default())
    } else {
        warn!("webhook verification failed: token mismatch");
        (
            StatusCode::FORBIDDEN,
            "verification token mismatch".to_string(),
        )
    }
}

/// Inbound event intake (`POST /webhook`).
///
/// Always acknowledges with 200: the platform retries on non-2xx, and an
/// internal failure must never trigger a redelivery storm. The body is taken
/// as a raw string so malformed JSON also gets the benign acknowledgment.
async fn receive_webhook(
    State(state): State<Arc<WebhookState>>,
    body: String,
) -> impl IntoResponse {
    let payload: WebhookPayload = match serde_json::from_str(&body) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "unparseable webhook body, acknowledging anyway");
            return Json(json!({ "status": "ignored" }));
        }
    };

    let Some(msg) = extract_first_message(&payload) else {
        info!("no messages in webhook payload");
        return Json(json!({ "status": "no messages" }));
    };

    // The pipeline runs to completion before the acknowledgment; see the
    // handler for the recovery guarantees that keep this infallible.
    let outcome = state.handler.handle(msg).await;
    info!(?outcome, "webhook event processed");
    Json(json!({ "status": "success" }))
}
