//! Synchronous clean endpoint.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;

use crate::error::ApiError;
use crate::payload::{CleanResponse, Payload};
use crate::routes::run_clean;
use crate::state::AppState;

/// `POST /http`: decode the payload, clean every repository, answer with the
/// aggregate.
///
/// A repository failure is recorded per repository and does not abort the
/// remaining repositories; the request only fails outright when every
/// repository failed (or the payload itself was unusable).
pub async fn handle_http(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<CleanResponse>, ApiError> {
    let payload: Payload = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("failed to decode payload as JSON: {e}")))?;

    let summary = run_clean(&state, &payload).await?;

    if summary.refs_by_repo.is_empty() && !summary.errors_by_repo.is_empty() {
        return Err(summary.aggregate_error());
    }

    Ok(Json(CleanResponse::from_refs_by_repo(summary.refs_by_repo)))
}
