use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Value};

use crate::routes::{send, AppState};
use crate::services::send_service;

/// GET /email/verify/:credential_id - handshake check, no outbox writes
pub async fn verify_connection(
    State(state): State<AppState>,
    Path(credential_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, (StatusCode, String)> {
    send::authorize(&state, &headers, &credential_id).await?;

    match send_service::verify_connection(&state.pool, &state.resolver, &credential_id).await {
        Ok(ok) => Ok(Json(json!({ "ok": ok }))),
        Err(e) => {
            tracing::warn!(credential_id, error = %e, "verification failed");
            Err((e.status(), e.to_string()))
        }
    }
}
