//! Direct SMTP dispatch via lettre's tokio transport.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;

use crate::error::SendError;
use crate::models::credential::SmtpCredential;
use crate::transport::{MailTransport, OutboundEmail};

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    /// Used as the From address when the message doesn't carry one.
    from_fallback: Option<String>,
}

impl SmtpMailer {
    /// `secure` follows the stored flag: true means implicit TLS from the
    /// first byte, false means plaintext with opportunistic STARTTLS.
    pub fn from_credential(cred: &SmtpCredential) -> Result<Self, SendError> {
        let mut builder = if cred.secure {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&cred.host)
                .map_err(|e| SendError::TransportConstruction(e.to_string()))?
        } else {
            let tls = TlsParameters::new(cred.host.clone())
                .map_err(|e| SendError::TransportConstruction(e.to_string()))?;
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&cred.host)
                .tls(Tls::Opportunistic(tls))
        };
        builder = builder.port(cred.port).timeout(Some(SMTP_TIMEOUT));

        if let (Some(user), Some(pass)) = (&cred.username, &cred.password) {
            // Scrub whitespace that sneaks in from copied app passwords
            let clean: String = pass.chars().filter(|c| !c.is_whitespace()).collect();
            builder = builder.credentials(Credentials::new(user.clone(), clean));
        }

        Ok(Self {
            transport: builder.build(),
            from_fallback: cred.username.clone(),
        })
    }

    fn build_message(&self, email: &OutboundEmail) -> Result<Message, SendError> {
        let from: Mailbox = email
            .from
            .as_deref()
            .or(self.from_fallback.as_deref())
            .ok_or_else(|| {
                SendError::Dispatch(anyhow::anyhow!(
                    "no sender address: message has no from and credential has no username"
                ))
            })?
            .parse()
            .map_err(|e| SendError::Dispatch(anyhow::anyhow!("invalid from address: {e}")))?;

        let mut builder = Message::builder().from(from).subject(email.subject.clone());
        builder = builder.to(parse_mailbox(&email.to)?);
        for cc in &email.cc {
            builder = builder.cc(parse_mailbox(cc)?);
        }
        for bcc in &email.bcc {
            builder = builder.bcc(parse_mailbox(bcc)?);
        }
        if let Some(reply_to) = &email.reply_to {
            builder = builder.reply_to(parse_mailbox(reply_to)?);
        }

        let body = match (&email.text, &email.html) {
            (Some(text), Some(html)) => {
                MultiPart::alternative_plain_html(text.clone(), html.clone())
            }
            (Some(text), None) => MultiPart::alternative().singlepart(SinglePart::plain(text.clone())),
            (None, Some(html)) => MultiPart::alternative().singlepart(SinglePart::html(html.clone())),
            (None, None) => {
                return Err(SendError::Validation("message has no body".into()));
            }
        };

        let mut mixed = MultiPart::mixed().multipart(body);
        for att in &email.attachments {
            let content_type = ContentType::parse(&att.content_type).map_err(|e| {
                SendError::Dispatch(anyhow::anyhow!(
                    "attachment '{}' has invalid content type: {e}",
                    att.filename
                ))
            })?;
            mixed = mixed.singlepart(
                Attachment::new(att.filename.clone()).body(att.content.clone(), content_type),
            );
        }

        builder
            .multipart(mixed)
            .map_err(|e| SendError::Dispatch(anyhow::anyhow!("message assembly failed: {e}")))
    }
}

fn parse_mailbox(addr: &str) -> Result<Mailbox, SendError> {
    addr.parse()
        .map_err(|e| SendError::Dispatch(anyhow::anyhow!("invalid address '{addr}': {e}")))
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn dispatch(&self, email: &OutboundEmail) -> Result<(), SendError> {
        let message = self.build_message(email)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| SendError::Dispatch(anyhow::anyhow!("smtp send failed: {e}")))?;
        Ok(())
    }

    async fn verify(&self) -> Result<(), SendError> {
        match self.transport.test_connection().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(SendError::Verification(
                "server rejected the handshake".into(),
            )),
            Err(e) => Err(SendError::Verification(e.to_string())),
        }
    }
}
