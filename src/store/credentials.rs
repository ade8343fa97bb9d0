//! Read-only boundary onto the credential store: point lookup plus
//! API-key comparison. Rows are owned and written by the provisioning
//! service, never by this one.

use sqlx::{Executor, Sqlite};

use crate::models::credential::CredentialRow;

pub async fn find_by_id<'e, E>(executor: E, id: &str) -> Result<Option<CredentialRow>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, CredentialRow>(
        r#"SELECT id, name, channel, transport, host, port, secure, api_key, username, password
           FROM credentials WHERE id = ?"#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await
}

/// Compare a caller-supplied key against the credential's stored key.
/// Unknown id counts as a mismatch. A credential with no stored key
/// accepts any caller (the shared service token is still required).
pub async fn validate_api_key<'e, E>(executor: E, id: &str, key: &str) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = find_by_id(executor, id).await?;
    Ok(match row {
        Some(cred) => match cred.api_key {
            Some(stored) if !stored.is_empty() => stored == key,
            _ => true,
        },
        None => false,
    })
}
