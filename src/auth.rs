//! Shared service-to-service token check, delegated to an external auth
//! authority. This service never validates tokens locally.

use anyhow::{anyhow, Result};
use serde::Deserialize;

#[derive(Deserialize)]
struct TokenCheck {
    valid: bool,
}

/// Ask the authority whether the caller's shared token is valid.
/// `Ok(false)` means the authority answered and said no; `Err` means the
/// authority itself could not be reached or answered garbage.
pub async fn check_service_token(
    http: &reqwest::Client,
    authority_url: &str,
    token: &str,
) -> Result<bool> {
    let resp = http
        .post(authority_url)
        .json(&serde_json::json!({ "token": token }))
        .send()
        .await
        .map_err(|e| anyhow!("auth authority unreachable: {e}"))?;
    if !resp.status().is_success() {
        return Ok(false);
    }
    let check: TokenCheck = resp
        .json()
        .await
        .map_err(|e| anyhow!("auth authority returned malformed response: {e}"))?;
    Ok(check.valid)
}
