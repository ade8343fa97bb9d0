use anyhow::Result;
use sqlx::SqlitePool;
use std::fs;
use std::time::{SystemTime, UNIX_EPOCH};

/// Apply every `migrations/*.sql` file in sorted order. Files are plain SQL
/// with `IF NOT EXISTS` guards, so re-running on an existing database is
/// harmless.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let mut entries: Vec<_> = fs::read_dir("migrations")?.filter_map(|e| e.ok()).collect();
    entries.sort_by_key(|e| e.path());
    for e in entries {
        let p = e.path();
        if p.extension().and_then(|s| s.to_str()) == Some("sql") {
            let sql = fs::read_to_string(&p)?;
            sqlx::query(&sql).execute(pool).await?;
        }
    }
    Ok(())
}

/// Seed one SMTP credential from the environment for local development.
/// Skipped (with a logged reason) when the env vars are absent.
pub async fn seed_credential(pool: &SqlitePool) -> Result<()> {
    let host = std::env::var("SMTP_HOST")?;
    let port: i64 = std::env::var("SMTP_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(587);
    let username = std::env::var("SMTP_USERNAME").unwrap_or_default();
    let password = std::env::var("SMTP_PASSWORD").unwrap_or_default();
    let secure = std::env::var("SMTP_SECURE")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    let now = now_epoch();
    sqlx::query(
        r#"INSERT OR IGNORE INTO credentials(
            id, name, channel, transport, host, port, secure, username, password, created_at
        ) VALUES ('default', 'default smtp', 'email', 'smtp', ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&host)
    .bind(port)
    .bind(secure)
    .bind(&username)
    .bind(&password)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

pub fn now_epoch() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
