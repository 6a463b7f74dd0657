//! Asynchronous clean endpoint for push-style message buses.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::error::ApiError;
use crate::payload::{Payload, PushEnvelope};
use crate::routes::run_clean;
use crate::state::AppState;

/// `POST /pubsub`: acknowledge every well-formed envelope, then clean in a
/// detached task.
///
/// Buses redeliver on non-success forever, so a deterministic cleaning
/// failure must never surface as a delivery failure; only a malformed
/// envelope earns a 400. Redeliveries of an already-seen
/// `subscription/message_id` are acknowledged without side effects.
pub async fn handle_pubsub(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let envelope: PushEnvelope = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("failed to decode pubsub message: {e}")))?;

    let key = format!("{}/{}", envelope.subscription, envelope.message.message_id);
    if state.cache.insert(&key) {
        tracing::info!(message = %key, "already processed message");
        return Ok(StatusCode::NO_CONTENT);
    }

    if envelope.message.data.is_empty() {
        return Err(ApiError::bad_request("missing data in pubsub payload"));
    }
    let data = BASE64
        .decode(envelope.message.data.as_bytes())
        .map_err(|e| ApiError::bad_request(format!("pubsub data is not valid base64: {e}")))?;

    // Detached from the request context: a dropped connection or request
    // timeout must not cancel a long-running batch clean.
    tokio::spawn(async move {
        match serde_json::from_slice::<Payload>(&data) {
            Ok(payload) => match run_clean(&state, &payload).await {
                Ok(summary) => {
                    tracing::info!(
                        message = %key,
                        cleaned = summary.refs_by_repo.len(),
                        failed = summary.errors_by_repo.len(),
                        "asynchronous clean finished"
                    );
                }
                Err(err) => {
                    tracing::error!(message = %key, error = %err, "asynchronous clean failed");
                }
            },
            Err(err) => {
                tracing::error!(message = %key, error = %err, "failed to decode pubsub payload");
            }
        }
    });

    Ok(StatusCode::NO_CONTENT)
}
