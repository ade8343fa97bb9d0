use serde::{Deserialize, Serialize};

use crate::error::SendError;

/// Raw credential row as stored by the credential store. Connection fields
/// are nullable at the storage level; whether a row is usable for a given
/// transport is decided by [`EmailCredential::from_row`].
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CredentialRow {
    pub id: String,
    pub name: String,
    pub channel: String,
    pub transport: String,
    pub host: Option<String>,
    pub port: Option<i64>,
    pub secure: Option<bool>,
    pub api_key: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Communication channel a credential is provisioned for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Sms,
    Whatsapp,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Sms => "sms",
            Channel::Whatsapp => "whatsapp",
        }
    }
}

/// Fully validated SMTP connection parameters.
#[derive(Debug, Clone)]
pub struct SmtpCredential {
    pub host: String,
    pub port: u16,
    pub secure: bool,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// OAuth client pair for the provider REST API. The store keeps these in
/// the username/password columns.
#[derive(Debug, Clone)]
pub struct ProviderApiCredential {
    pub client_id: String,
    pub client_secret: String,
}

/// A credential validated for email dispatch, tagged by transport kind.
/// Validation happens here, at the store boundary, so the orchestrator
/// never has to probe for field presence.
#[derive(Debug, Clone)]
pub enum EmailCredential {
    Smtp(SmtpCredential),
    ProviderApi(ProviderApiCredential),
}

impl EmailCredential {
    pub fn from_row(row: &CredentialRow) -> Result<Self, SendError> {
        if row.channel != Channel::Email.as_str() {
            return Err(SendError::InvalidCredentialType {
                id: row.id.clone(),
                channel: row.channel.clone(),
            });
        }

        match row.transport.as_str() {
            "smtp" => {
                // host, port and a *defined* secure flag are all required
                let (host, port, secure) = match (&row.host, row.port, row.secure) {
                    (Some(h), Some(p), Some(s)) if !h.is_empty() && p > 0 && p <= u16::MAX as i64 => {
                        (h.clone(), p as u16, s)
                    }
                    _ => return Err(SendError::IncompleteCredential(row.id.clone())),
                };
                Ok(EmailCredential::Smtp(SmtpCredential {
                    host,
                    port,
                    secure,
                    username: row.username.clone().filter(|u| !u.is_empty()),
                    password: row.password.clone().filter(|p| !p.is_empty()),
                }))
            }
            "api" => match (&row.username, &row.password) {
                (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => {
                    Ok(EmailCredential::ProviderApi(ProviderApiCredential {
                        client_id: id.clone(),
                        client_secret: secret.clone(),
                    }))
                }
                _ => Err(SendError::IncompleteCredential(row.id.clone())),
            },
            other => Err(SendError::InvalidCredentialType {
                id: row.id.clone(),
                channel: format!("email/{other}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> CredentialRow {
        CredentialRow {
            id: "c1".into(),
            name: "test".into(),
            channel: "email".into(),
            transport: "smtp".into(),
            host: Some("smtp.example.com".into()),
            port: Some(587),
            secure: Some(false),
            api_key: None,
            username: Some("u".into()),
            password: Some("p".into()),
        }
    }

    #[test]
    fn smtp_row_validates() {
        let cred = EmailCredential::from_row(&row()).unwrap();
        match cred {
            EmailCredential::Smtp(s) => {
                assert_eq!(s.host, "smtp.example.com");
                assert_eq!(s.port, 587);
                assert!(!s.secure);
            }
            _ => panic!("expected smtp credential"),
        }
    }

    #[test]
    fn missing_secure_flag_is_incomplete() {
        let mut r = row();
        r.secure = None;
        assert!(matches!(
            EmailCredential::from_row(&r),
            Err(SendError::IncompleteCredential(_))
        ));
    }

    #[test]
    fn missing_host_is_incomplete() {
        let mut r = row();
        r.host = None;
        assert!(matches!(
            EmailCredential::from_row(&r),
            Err(SendError::IncompleteCredential(_))
        ));
    }

    #[test]
    fn sms_channel_is_wrong_type() {
        let mut r = row();
        r.channel = "sms".into();
        assert!(matches!(
            EmailCredential::from_row(&r),
            Err(SendError::InvalidCredentialType { .. })
        ));
    }

    #[test]
    fn api_row_repurposes_client_pair() {
        let mut r = row();
        r.transport = "api".into();
        r.host = None;
        r.port = None;
        r.secure = None;
        let cred = EmailCredential::from_row(&r).unwrap();
        match cred {
            EmailCredential::ProviderApi(p) => {
                assert_eq!(p.client_id, "u");
                assert_eq!(p.client_secret, "p");
            }
            _ => panic!("expected provider credential"),
        }
    }

    #[test]
    fn api_row_without_client_pair_is_incomplete() {
        let mut r = row();
        r.transport = "api".into();
        r.username = None;
        assert!(matches!(
            EmailCredential::from_row(&r),
            Err(SendError::IncompleteCredential(_))
        ));
    }
}
