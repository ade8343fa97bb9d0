//! Transport resolution: mapping a validated credential onto a live
//! network resource able to dispatch one message.

pub mod provider;
pub mod smtp;

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::SendError;
use crate::models::credential::EmailCredential;
use crate::models::message::DecodedAttachment;

/// Envelope handed to a transport for a single dispatch.
#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub from: Option<String>,
    pub to: String,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub reply_to: Option<String>,
    pub subject: String,
    pub text: Option<String>,
    pub html: Option<String>,
    pub attachments: Vec<DecodedAttachment>,
}

/// A live transport bound to one credential.
///
/// `dispatch` errors carry their stage: `SendError::Dispatch` means the
/// attempt reached the wire (the orchestrator records a failed row), while
/// `SendError::TransportConstruction` (token exchange, account lookup) and
/// `SendError::AttachmentUpload` (staging) mean no send was ever attempted
/// and the orchestrator rolls the pending row back.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn dispatch(&self, email: &OutboundEmail) -> Result<(), SendError>;

    /// Protocol-level handshake check. Must not touch the outbox.
    async fn verify(&self) -> Result<(), SendError>;
}

/// Builds transports from credentials. A trait so tests can substitute
/// counting or failing factories.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn build(&self, credential: &EmailCredential) -> Result<Arc<dyn MailTransport>, SendError>;
}

/// Factory producing the two real transport kinds, selected by the
/// credential's variant.
pub struct DefaultTransportFactory {
    http: reqwest::Client,
    provider_api_base: String,
    provider_token_url: String,
}

impl DefaultTransportFactory {
    pub fn new(http: reqwest::Client, provider_api_base: String, provider_token_url: String) -> Self {
        Self {
            http,
            provider_api_base,
            provider_token_url,
        }
    }
}

#[async_trait]
impl TransportFactory for DefaultTransportFactory {
    async fn build(&self, credential: &EmailCredential) -> Result<Arc<dyn MailTransport>, SendError> {
        match credential {
            EmailCredential::Smtp(cred) => Ok(Arc::new(smtp::SmtpMailer::from_credential(cred)?)),
            EmailCredential::ProviderApi(cred) => Ok(Arc::new(provider::ProviderApiMailer::new(
                self.http.clone(),
                self.provider_api_base.clone(),
                self.provider_token_url.clone(),
                cred.clone(),
            ))),
        }
    }
}

struct CachedTransport {
    credential_id: String,
    transport: Arc<dyn MailTransport>,
}

/// Single-slot transport cache keyed by credential identity, owned by the
/// service state rather than a module global. Concurrent sends for
/// different credentials thrash the slot; reconstruction is idempotent, so
/// that costs latency, not correctness.
pub struct TransportResolver {
    factory: Arc<dyn TransportFactory>,
    slot: Mutex<Option<CachedTransport>>,
}

impl TransportResolver {
    pub fn new(factory: Arc<dyn TransportFactory>) -> Self {
        Self {
            factory,
            slot: Mutex::new(None),
        }
    }

    /// Reuse the cached transport when the credential identity matches,
    /// otherwise construct one and replace the slot.
    pub async fn resolve(
        &self,
        credential_id: &str,
        credential: &EmailCredential,
    ) -> Result<Arc<dyn MailTransport>, SendError> {
        let mut slot = self.slot.lock().await;
        if let Some(cached) = slot.as_ref() {
            if cached.credential_id == credential_id {
                return Ok(cached.transport.clone());
            }
        }
        tracing::debug!(credential_id, "constructing transport");
        let transport = self.factory.build(credential).await?;
        *slot = Some(CachedTransport {
            credential_id: credential_id.to_string(),
            transport: transport.clone(),
        });
        Ok(transport)
    }

    /// Build a disposable transport (never the cached one) and run its
    /// protocol-level verify.
    pub async fn verify_connection(&self, credential: &EmailCredential) -> Result<(), SendError> {
        let transport = self
            .factory
            .build(credential)
            .await
            .map_err(|e| SendError::Verification(e.to_string()))?;
        transport.verify().await
    }
}
