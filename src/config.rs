use anyhow::Result;
use std::env;

/// Service configuration, loaded from the environment once at startup.
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// External authority that validates the shared service-to-service
    /// token. When unset (local development) the check is skipped.
    pub auth_authority_url: Option<String>,
    /// Base URL of the provider REST mail API, e.g. https://mail.zoho.com/api
    pub provider_api_base: String,
    /// OAuth2 client-credentials token endpoint of the provider.
    pub provider_token_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://mailrelay.db".into());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3040);
        let auth_authority_url = env::var("AUTH_AUTHORITY_URL").ok().filter(|v| !v.is_empty());
        let provider_api_base = env::var("PROVIDER_API_BASE")
            .unwrap_or_else(|_| "https://mail.zoho.com/api".into());
        let provider_token_url = env::var("PROVIDER_TOKEN_URL")
            .unwrap_or_else(|_| "https://accounts.zoho.com/oauth/v2/token".into());

        Ok(Config {
            database_url,
            port,
            auth_authority_url,
            provider_api_base,
            provider_token_url,
        })
    }
}
