//! HTTP boundary behavior: payload validation, auth headers, and the
//! status-code split between "never attempted" and "attempted and failed".

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tower::ServiceExt;

use mailrelay::config::Config;
use mailrelay::db;
use mailrelay::error::SendError;
use mailrelay::models::credential::EmailCredential;
use mailrelay::routes::{self, AppState};
use mailrelay::transport::{MailTransport, OutboundEmail, TransportFactory, TransportResolver};

struct OkTransport;

#[async_trait]
impl MailTransport for OkTransport {
    async fn dispatch(&self, _email: &OutboundEmail) -> Result<(), SendError> {
        Ok(())
    }
    async fn verify(&self) -> Result<(), SendError> {
        Ok(())
    }
}

struct OkFactory;

#[async_trait]
impl TransportFactory for OkFactory {
    async fn build(
        &self,
        _credential: &EmailCredential,
    ) -> Result<Arc<dyn MailTransport>, SendError> {
        Ok(Arc::new(OkTransport))
    }
}

async fn setup() -> (axum::Router, SqlitePool) {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::run_migrations(&pool).await.unwrap();

    let config = Arc::new(Config {
        database_url: "sqlite::memory:".into(),
        port: 0,
        auth_authority_url: None,
        provider_api_base: "http://127.0.0.1:1".into(),
        provider_token_url: "http://127.0.0.1:1".into(),
    });
    let resolver = Arc::new(TransportResolver::new(Arc::new(OkFactory)));
    let state = AppState {
        pool: pool.clone(),
        resolver,
        http: reqwest::Client::new(),
        config,
    };
    (routes::router(state), pool)
}

async fn seed_smtp(pool: &SqlitePool, id: &str, api_key: Option<&str>) {
    sqlx::query(
        r#"INSERT INTO credentials (id, name, channel, transport, host, port, secure, api_key, username, password, created_at)
           VALUES (?, 'test smtp', 'email', 'smtp', 'smtp.example.com', 587, 0, ?, 'sender@example.com', 'pw', 0)"#,
    )
    .bind(id)
    .bind(api_key)
    .execute(pool)
    .await
    .unwrap();
}

fn send_request(credential_id: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/email/send/{credential_id}"))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn valid_body() -> Value {
    json!({
        "message": {
            "recipient": "user@example.com",
            "subject": "Welcome",
            "text": "hello"
        }
    })
}

async fn row_count(pool: &SqlitePool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM outgoing_messages")
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn healthz_responds() {
    let (app, _pool) = setup().await;
    let resp = app
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn send_returns_message_id() {
    let (app, pool) = setup().await;
    seed_smtp(&pool, "cred1", None).await;

    let resp = app.oneshot(send_request("cred1", valid_body())).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "sent");
    assert!(body["message_id"].as_i64().unwrap() > 0);
    assert_eq!(row_count(&pool).await, 1);
}

#[tokio::test]
async fn missing_body_is_400_with_no_rows() {
    let (app, pool) = setup().await;
    seed_smtp(&pool, "cred1", None).await;

    let body = json!({ "message": { "recipient": "user@example.com", "subject": "hi" } });
    let resp = app.oneshot(send_request("cred1", body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(row_count(&pool).await, 0);
}

#[tokio::test]
async fn six_attachments_is_400_with_no_rows() {
    let (app, pool) = setup().await;
    seed_smtp(&pool, "cred1", None).await;

    let attachments: Vec<Value> = (0..6)
        .map(|i| {
            json!({
                "filename": format!("f{i}.txt"),
                "content_type": "text/plain",
                "content_base64": "aGk="
            })
        })
        .collect();
    let body = json!({
        "message": {
            "recipient": "user@example.com",
            "subject": "hi",
            "text": "hello",
            "attachments": attachments
        }
    });
    let resp = app.oneshot(send_request("cred1", body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(row_count(&pool).await, 0);
}

#[tokio::test]
async fn unknown_credential_is_404() {
    let (app, pool) = setup().await;
    let resp = app.oneshot(send_request("ghost", valid_body())).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(row_count(&pool).await, 0);
}

#[tokio::test]
async fn wrong_api_key_is_401_with_no_rows() {
    let (app, pool) = setup().await;
    seed_smtp(&pool, "cred1", Some("secret")).await;

    let mut req = send_request("cred1", valid_body());
    req.headers_mut()
        .insert("x-api-key", "not-the-secret".parse().unwrap());
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(row_count(&pool).await, 0);
}

#[tokio::test]
async fn correct_api_key_is_accepted() {
    let (app, pool) = setup().await;
    seed_smtp(&pool, "cred1", Some("secret")).await;

    let mut req = send_request("cred1", valid_body());
    req.headers_mut().insert("x-api-key", "secret".parse().unwrap());
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(row_count(&pool).await, 1);
}

#[tokio::test]
async fn verify_route_reports_ok() {
    let (app, pool) = setup().await;
    seed_smtp(&pool, "cred1", None).await;

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/email/verify/cred1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["ok"], true);
    assert_eq!(row_count(&pool).await, 0);
}

#[tokio::test]
async fn non_email_credential_is_422() {
    let (app, pool) = setup().await;
    sqlx::query(
        r#"INSERT INTO credentials (id, name, channel, transport, username, password, created_at)
           VALUES ('wa1', 'whatsapp', 'whatsapp', 'api', 'u', 'p', 0)"#,
    )
    .execute(&pool)
    .await
    .unwrap();

    let resp = app.oneshot(send_request("wa1", valid_body())).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(row_count(&pool).await, 0);
}
