use axum::http::StatusCode;
use thiserror::Error;

/// Everything that can go wrong between accepting a send request and
/// recording its terminal outcome.
///
/// The variants split into two families the caller must be able to tell
/// apart: failures where no dispatch was attempted (the pending row is
/// rolled back) and `Dispatch`, which happens after the attempt and leaves
/// a committed `failed` row behind.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("invalid message: {0}")]
    Validation(String),

    #[error("credential not found: {0}")]
    CredentialNotFound(String),

    #[error("credential {id} is for channel '{channel}', not email")]
    InvalidCredentialType { id: String, channel: String },

    #[error("credential {0} is missing fields required by its transport")]
    IncompleteCredential(String),

    #[error("failed to construct transport: {0}")]
    TransportConstruction(String),

    #[error("attachment upload failed: {0}")]
    AttachmentUpload(String),

    #[error("dispatch failed: {0}")]
    Dispatch(anyhow::Error),

    #[error("connection verification failed: {0}")]
    Verification(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("not authorized: {0}")]
    Auth(String),
}

impl SendError {
    /// HTTP status for the route layer. 4xx means "we never attempted to
    /// send"; 502 covers both upstream-transport failures and a recorded
    /// failed attempt.
    pub fn status(&self) -> StatusCode {
        match self {
            SendError::Validation(_) => StatusCode::BAD_REQUEST,
            SendError::CredentialNotFound(_) => StatusCode::NOT_FOUND,
            SendError::InvalidCredentialType { .. } | SendError::IncompleteCredential(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            SendError::TransportConstruction(_)
            | SendError::AttachmentUpload(_)
            | SendError::Dispatch(_)
            | SendError::Verification(_) => StatusCode::BAD_GATEWAY,
            SendError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SendError::Auth(_) => StatusCode::UNAUTHORIZED,
        }
    }
}
