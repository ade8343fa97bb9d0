use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::config::Config;
use crate::transport::TransportResolver;

pub mod send;
pub mod verify;

#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::SqlitePool,
    pub resolver: Arc<TransportResolver>,
    pub http: reqwest::Client,
    pub config: Arc<Config>,
}

impl axum::extract::FromRef<AppState> for sqlx::SqlitePool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/email/send/:credential_id", post(send::send_email))
        .route("/email/verify/:credential_id", get(verify::verify_connection))
        .with_state(state)
}
