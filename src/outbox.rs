//! Audit trail of send attempts. Every attempt begins life as a `pending`
//! row and is moved exactly once to `sent` or `failed`. Rows are never
//! deleted.
//!
//! Both operations take the caller's connection so they run inside the
//! orchestrator's transaction; neither opens its own.

use sqlx::SqliteConnection;

use crate::db::now_epoch;
use crate::models::message::{DecodedAttachment, MessageStatus, NewMessage};

/// Terminal outcome of one dispatch attempt.
#[derive(Debug)]
pub enum Outcome {
    Sent,
    Failed(String),
}

/// Insert the pending row for an attempt and return its generated id.
pub async fn record_pending(
    conn: &mut SqliteConnection,
    credential_id: &str,
    message: &NewMessage,
) -> Result<i64, sqlx::Error> {
    let res = sqlx::query(
        r#"INSERT INTO outgoing_messages
            (credential_id, message_type, recipient, cc, bcc, reply_to,
             subject, body_text, body_html, status, created_at)
           VALUES (?, 'email', ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(credential_id)
    .bind(&message.recipient)
    .bind(message.cc.join(", "))
    .bind(message.bcc.join(", "))
    .bind(&message.reply_to)
    .bind(&message.subject)
    .bind(&message.text)
    .bind(&message.html)
    .bind(MessageStatus::Pending.as_str())
    .bind(now_epoch())
    .execute(&mut *conn)
    .await?;
    Ok(res.last_insert_rowid())
}

/// Move a pending row to its terminal status.
pub async fn record_outcome(
    conn: &mut SqliteConnection,
    message_id: i64,
    outcome: Outcome,
) -> Result<(), sqlx::Error> {
    match outcome {
        Outcome::Sent => {
            sqlx::query("UPDATE outgoing_messages SET status = ?, sent_at = ? WHERE id = ?")
                .bind(MessageStatus::Sent.as_str())
                .bind(now_epoch())
                .bind(message_id)
                .execute(&mut *conn)
                .await?;
        }
        Outcome::Failed(error) => {
            sqlx::query("UPDATE outgoing_messages SET status = ?, error_message = ? WHERE id = ?")
                .bind(MessageStatus::Failed.as_str())
                .bind(error)
                .bind(message_id)
                .execute(&mut *conn)
                .await?;
        }
    }
    Ok(())
}

/// Persist one attachment alongside its message row (SMTP path only; the
/// provider path stages content remotely instead).
pub async fn record_attachment(
    conn: &mut SqliteConnection,
    message_id: i64,
    attachment: &DecodedAttachment,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO message_attachments (message_id, filename, content_type, size_bytes, content)
           VALUES (?, ?, ?, ?, ?)"#,
    )
    .bind(message_id)
    .bind(&attachment.filename)
    .bind(&attachment.content_type)
    .bind(attachment.content.len() as i64)
    .bind(&attachment.content)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
