//! The send orchestrator: one database transaction wrapping the whole
//! attempt, reaching a consistent terminal state no matter where it fails.
//!
//! Two exits commit: a `sent` row, or a `failed` row after the dispatch
//! itself failed (the audit trail must survive the external failure).
//! Every earlier failure drops the transaction, so no `pending` row ever
//! outlives a failure where no dispatch was attempted.

use sqlx::SqlitePool;

use crate::error::SendError;
use crate::models::credential::EmailCredential;
use crate::models::message::NewMessage;
use crate::outbox::{self, Outcome};
use crate::store::credentials;
use crate::transport::{OutboundEmail, TransportResolver};

/// Attempt one send. Returns the outbox row id on success.
///
/// Exactly one external dispatch call, no retry; exactly one terminal
/// database mutation per call.
pub async fn send_email(
    pool: &SqlitePool,
    resolver: &TransportResolver,
    credential_id: &str,
    message: &NewMessage,
) -> Result<i64, SendError> {
    if credential_id.trim().is_empty() {
        return Err(SendError::Validation("credential id must not be empty".into()));
    }
    // The HTTP layer validates too, but credential-facing invariants are
    // re-checked here rather than assumed.
    message.validate()?;
    let attachments = message.decode_attachments()?;

    let mut tx = pool.begin().await?;

    // Pending row goes in before any external call, so a crash mid-send
    // still leaves a discoverable record.
    let message_id = outbox::record_pending(&mut tx, credential_id, message).await?;

    let row = credentials::find_by_id(&mut *tx, credential_id)
        .await?
        .ok_or_else(|| SendError::CredentialNotFound(credential_id.to_string()))?;
    let credential = EmailCredential::from_row(&row)?;

    // SMTP-path attachments ride along in the same transaction; the
    // provider path stages them remotely during dispatch instead.
    if matches!(credential, EmailCredential::Smtp(_)) {
        for att in &attachments {
            outbox::record_attachment(&mut tx, message_id, att).await?;
        }
    }

    let transport = resolver.resolve(credential_id, &credential).await?;

    let email = OutboundEmail {
        from: message.from.clone(),
        to: message.recipient.clone(),
        cc: message.cc.clone(),
        bcc: message.bcc.clone(),
        reply_to: message.reply_to.clone(),
        subject: message.subject.clone(),
        text: message.text.clone(),
        html: message.html.clone(),
        attachments,
    };

    match transport.dispatch(&email).await {
        Ok(()) => {
            outbox::record_outcome(&mut tx, message_id, Outcome::Sent).await?;
            tx.commit().await?;
            tracing::info!(message_id, credential_id, to = %message.recipient, "message sent");
            Ok(message_id)
        }
        Err(SendError::Dispatch(cause)) => {
            // The attempt happened; its failure is part of the audit trail
            // and must be committed, not rolled back.
            outbox::record_outcome(&mut tx, message_id, Outcome::Failed(format!("{cause:#}")))
                .await?;
            tx.commit().await?;
            tracing::error!(message_id, credential_id, error = %format!("{cause:#}"), "dispatch failed");
            Err(SendError::Dispatch(cause))
        }
        // Staging and construction failures mean no dispatch was attempted:
        // dropping the transaction rolls the pending row back.
        Err(other) => Err(other),
    }
}

/// Side-channel connection check. Always builds a disposable transport,
/// never touches the outbox tables.
pub async fn verify_connection(
    pool: &SqlitePool,
    resolver: &TransportResolver,
    credential_id: &str,
) -> Result<bool, SendError> {
    let row = credentials::find_by_id(pool, credential_id)
        .await?
        .ok_or_else(|| SendError::CredentialNotFound(credential_id.to_string()))?;
    let credential = EmailCredential::from_row(&row)?;
    resolver.verify_connection(&credential).await?;
    Ok(true)
}
