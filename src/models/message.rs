use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::SendError;

/// Per-attachment ceiling on decoded content size.
pub const MAX_ATTACHMENT_BYTES: usize = 10 * 1024 * 1024;
/// Maximum number of attachments per message.
pub const MAX_ATTACHMENTS: usize = 5;

/// Send request payload as it crosses the HTTP boundary. Attachment bytes
/// arrive base64-encoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    pub from: Option<String>,
    pub recipient: String,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub bcc: Vec<String>,
    pub reply_to: Option<String>,
    pub subject: String,
    pub text: Option<String>,
    pub html: Option<String>,
    #[serde(default)]
    pub attachments: Vec<NewAttachment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAttachment {
    pub filename: String,
    pub content_type: String,
    pub content_base64: String,
}

/// Attachment with its content decoded, ready for persistence or staging.
#[derive(Debug, Clone)]
pub struct DecodedAttachment {
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStatus {
    Pending,
    Sent,
    Failed,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Pending => "pending",
            MessageStatus::Sent => "sent",
            MessageStatus::Failed => "failed",
        }
    }
}

impl NewMessage {
    /// Reject malformed payloads before any transaction is opened.
    pub fn validate(&self) -> Result<(), SendError> {
        if self.recipient.trim().is_empty() {
            return Err(SendError::Validation("recipient is required".into()));
        }
        if self.subject.trim().is_empty() {
            return Err(SendError::Validation("subject is required".into()));
        }
        if self.text.as_deref().map_or(true, str::is_empty)
            && self.html.as_deref().map_or(true, str::is_empty)
        {
            return Err(SendError::Validation(
                "at least one of text or html body is required".into(),
            ));
        }
        if self.attachments.len() > MAX_ATTACHMENTS {
            return Err(SendError::Validation(format!(
                "too many attachments: {} (limit {MAX_ATTACHMENTS})",
                self.attachments.len()
            )));
        }
        for att in &self.attachments {
            if att.filename.trim().is_empty() || att.filename.contains(['/', '\\']) {
                return Err(SendError::Validation(format!(
                    "unsafe attachment filename: '{}'",
                    att.filename
                )));
            }
        }
        Ok(())
    }

    /// Decode attachment content and enforce the per-item size ceiling.
    pub fn decode_attachments(&self) -> Result<Vec<DecodedAttachment>, SendError> {
        let engine = base64::engine::general_purpose::STANDARD;
        let mut out = Vec::with_capacity(self.attachments.len());
        for att in &self.attachments {
            let content = engine.decode(att.content_base64.as_bytes()).map_err(|e| {
                SendError::Validation(format!("attachment '{}' is not valid base64: {e}", att.filename))
            })?;
            if content.len() > MAX_ATTACHMENT_BYTES {
                return Err(SendError::Validation(format!(
                    "attachment '{}' exceeds {} bytes",
                    att.filename, MAX_ATTACHMENT_BYTES
                )));
            }
            out.push(DecodedAttachment {
                filename: att.filename.clone(),
                content_type: att.content_type.clone(),
                content,
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg() -> NewMessage {
        NewMessage {
            from: None,
            recipient: "user@example.com".into(),
            cc: vec![],
            bcc: vec![],
            reply_to: None,
            subject: "Welcome".into(),
            text: Some("hello".into()),
            html: None,
            attachments: vec![],
        }
    }

    #[test]
    fn valid_message_passes() {
        assert!(msg().validate().is_ok());
    }

    #[test]
    fn empty_recipient_rejected() {
        let mut m = msg();
        m.recipient = " ".into();
        assert!(matches!(m.validate(), Err(SendError::Validation(_))));
    }

    #[test]
    fn body_required() {
        let mut m = msg();
        m.text = None;
        assert!(matches!(m.validate(), Err(SendError::Validation(_))));
        m.html = Some("<b>hi</b>".into());
        assert!(m.validate().is_ok());
    }

    #[test]
    fn attachment_count_ceiling() {
        let mut m = msg();
        m.attachments = (0..6)
            .map(|i| NewAttachment {
                filename: format!("f{i}.txt"),
                content_type: "text/plain".into(),
                content_base64: "aGk=".into(),
            })
            .collect();
        assert!(matches!(m.validate(), Err(SendError::Validation(_))));
    }

    #[test]
    fn path_traversal_filename_rejected() {
        let mut m = msg();
        m.attachments = vec![NewAttachment {
            filename: "../../etc/passwd".into(),
            content_type: "text/plain".into(),
            content_base64: "aGk=".into(),
        }];
        assert!(matches!(m.validate(), Err(SendError::Validation(_))));
    }

    #[test]
    fn oversize_attachment_rejected() {
        let engine = base64::engine::general_purpose::STANDARD;
        let mut m = msg();
        m.attachments = vec![NewAttachment {
            filename: "big.bin".into(),
            content_type: "application/octet-stream".into(),
            content_base64: engine.encode(vec![0u8; MAX_ATTACHMENT_BYTES + 1]),
        }];
        assert!(m.validate().is_ok()); // count is fine
        assert!(matches!(
            m.decode_attachments(),
            Err(SendError::Validation(_))
        ));
    }

    #[test]
    fn attachments_decode() {
        let mut m = msg();
        m.attachments = vec![NewAttachment {
            filename: "hi.txt".into(),
            content_type: "text/plain".into(),
            content_base64: "aGVsbG8=".into(),
        }];
        let decoded = m.decode_attachments().unwrap();
        assert_eq!(decoded[0].content, b"hello");
    }
}
