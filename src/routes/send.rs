use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth;
use crate::models::message::NewMessage;
use crate::routes::AppState;
use crate::services::send_service;
use crate::store::credentials;

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub message: NewMessage,
}

#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub message_id: i64,
    pub status: &'static str,
}

/// POST /email/send/:credential_id - dispatch one message
pub async fn send_email(
    State(state): State<AppState>,
    Path(credential_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<SendRequest>,
) -> Result<Json<SendResponse>, (StatusCode, String)> {
    authorize(&state, &headers, &credential_id).await?;

    // Boundary validation: malformed payloads never reach the orchestrator
    // or open a transaction.
    req.message
        .validate()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    req.message
        .decode_attachments()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    tracing::info!(credential_id, to = %req.message.recipient, "send requested");

    match send_service::send_email(&state.pool, &state.resolver, &credential_id, &req.message).await
    {
        Ok(message_id) => Ok(Json(SendResponse {
            message_id,
            status: "sent",
        })),
        Err(e) => {
            tracing::error!(credential_id, error = %e, "send failed");
            Err((e.status(), e.to_string()))
        }
    }
}

/// Shared token check (delegated) plus per-credential API key compare.
pub(crate) async fn authorize(
    state: &AppState,
    headers: &HeaderMap,
    credential_id: &str,
) -> Result<(), (StatusCode, String)> {
    if let Some(authority) = &state.config.auth_authority_url {
        let token = headers
            .get("x-service-token")
            .and_then(|v| v.to_str().ok())
            .ok_or((StatusCode::UNAUTHORIZED, "missing service token".to_string()))?;
        match auth::check_service_token(&state.http, authority, token).await {
            Ok(true) => {}
            Ok(false) => {
                return Err((StatusCode::UNAUTHORIZED, "invalid service token".to_string()))
            }
            Err(e) => return Err((StatusCode::BAD_GATEWAY, e.to_string())),
        }
    }

    let key = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let ok = credentials::validate_api_key(&state.pool, credential_id, key)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    // Unknown credential ids fall through so the orchestrator can answer
    // 404 instead of leaking key-validity information.
    let exists = credentials::find_by_id(&state.pool, credential_id)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .is_some();
    if exists && !ok {
        return Err((StatusCode::UNAUTHORIZED, "invalid api key".to_string()));
    }
    Ok(())
}
