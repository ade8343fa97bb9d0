//! Provider REST API dispatch: OAuth client-credentials exchange, account
//! resolution, out-of-band attachment staging, then a JSON send call.
//!
//! The access token and account id are fetched on every send, deliberately
//! uncached; only the transport object itself is reused between sends.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures_util::future::try_join_all;
use serde::{Deserialize, Serialize};

use crate::error::SendError;
use crate::models::credential::ProviderApiCredential;
use crate::models::message::DecodedAttachment;
use crate::transport::{MailTransport, OutboundEmail};

pub struct ProviderApiMailer {
    http: reqwest::Client,
    api_base: String,
    token_url: String,
    credential: ProviderApiCredential,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct AccountList {
    data: Vec<AccountInfo>,
}

#[derive(Deserialize, Clone)]
struct AccountInfo {
    #[serde(rename = "accountId")]
    account_id: String,
    #[serde(rename = "primaryEmailAddress")]
    primary_email_address: String,
}

/// Opaque reference returned by the upload endpoint; embedded unmodified
/// in the send payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedAttachment {
    pub store_name: String,
    pub attachment_path: String,
    pub attachment_name: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    data: StagedAttachment,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendPayload<'a> {
    from_address: &'a str,
    to_address: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    cc_address: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    bcc_address: String,
    subject: &'a str,
    content: &'a str,
    mail_format: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<StagedAttachment>,
}

impl ProviderApiMailer {
    pub fn new(
        http: reqwest::Client,
        api_base: String,
        token_url: String,
        credential: ProviderApiCredential,
    ) -> Self {
        Self {
            http,
            api_base,
            token_url,
            credential,
        }
    }

    async fn fetch_token(&self) -> Result<String> {
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.credential.client_id.as_str()),
            ("client_secret", self.credential.client_secret.as_str()),
            ("scope", "mail.send"),
        ];
        let resp = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .context("token endpoint unreachable")?;
        if !resp.status().is_success() {
            return Err(anyhow!("token endpoint returned {}", resp.status()));
        }
        let token: TokenResponse = resp.json().await.context("malformed token response")?;
        Ok(token.access_token)
    }

    /// One authenticated call per send; the first listed account is the
    /// sending account.
    async fn primary_account(&self, token: &str) -> Result<AccountInfo> {
        let url = format!("{}/accounts", self.api_base);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .context("account endpoint unreachable")?;
        if !resp.status().is_success() {
            return Err(anyhow!("account endpoint returned {}", resp.status()));
        }
        let list: AccountList = resp.json().await.context("malformed account response")?;
        list.data
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("provider returned no accounts"))
    }

    async fn stage_one(
        &self,
        token: &str,
        account_id: &str,
        attachment: &DecodedAttachment,
    ) -> Result<StagedAttachment> {
        let url = format!(
            "{}/accounts/{}/messages/attachments?uploadType=multipart",
            self.api_base, account_id
        );
        let part = reqwest::multipart::Part::bytes(attachment.content.clone())
            .file_name(attachment.filename.clone())
            .mime_str(&attachment.content_type)
            .with_context(|| format!("bad content type '{}'", attachment.content_type))?;
        let form = reqwest::multipart::Form::new().part("attach", part);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
            .context("upload endpoint unreachable")?;
        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            return Err(anyhow!("upload returned {status}: {detail}"));
        }
        let upload: UploadResponse = resp
            .json()
            .await
            .context("upload response missing attachment reference")?;
        Ok(upload.data)
    }

    async fn send_message(
        &self,
        token: &str,
        account: &AccountInfo,
        email: &OutboundEmail,
        staged: Vec<StagedAttachment>,
    ) -> Result<()> {
        let from = email
            .from
            .as_deref()
            .unwrap_or(&account.primary_email_address);
        let (content, mail_format) = match (&email.html, &email.text) {
            (Some(html), _) => (html.as_str(), "html"),
            (None, Some(text)) => (text.as_str(), "plaintext"),
            (None, None) => return Err(anyhow!("message has no body")),
        };
        let payload = SendPayload {
            from_address: from,
            to_address: email.to.clone(),
            cc_address: email.cc.join(","),
            bcc_address: email.bcc.join(","),
            subject: &email.subject,
            content,
            mail_format,
            attachments: staged,
        };
        let url = format!("{}/accounts/{}/messages", self.api_base, account.account_id);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await
            .context("send endpoint unreachable")?;
        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            return Err(anyhow!("send returned {status}: {detail}"));
        }
        Ok(())
    }
}

#[async_trait]
impl MailTransport for ProviderApiMailer {
    async fn dispatch(&self, email: &OutboundEmail) -> Result<(), SendError> {
        // Token exchange and account lookup establish the send capability;
        // failing here means no attempt reached the provider, so these map
        // to construction errors and the pending row rolls back.
        let token = self
            .fetch_token()
            .await
            .map_err(|e| SendError::TransportConstruction(format!("oauth token exchange: {e:#}")))?;
        let account = self
            .primary_account(&token)
            .await
            .map_err(|e| SendError::TransportConstruction(format!("account lookup: {e:#}")))?;

        // Stage all attachments in parallel; one failure fails the attempt.
        let staged = try_join_all(email.attachments.iter().map(|att| async {
            self.stage_one(&token, &account.account_id, att)
                .await
                .map_err(|e| SendError::AttachmentUpload(format!("'{}': {e:#}", att.filename)))
        }))
        .await?;

        self.send_message(&token, &account, email, staged)
            .await
            .map_err(SendError::Dispatch)
    }

    async fn verify(&self) -> Result<(), SendError> {
        // A successful client-credentials exchange is the provider-side
        // equivalent of an SMTP handshake.
        self.fetch_token()
            .await
            .map(|_| ())
            .map_err(|e| SendError::Verification(format!("{e:#}")))
    }
}
