use serde::Deserialize;
use url::form_urlencoded;

use super::CredentialsError;
use crate::jobs::transport::{HttpMethod, JobHttpRequest, JobTransport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCredentialsGrant {
    pub client_id: String,
    pub client_secret: String,
    pub scope: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

pub fn build_token_request(token_url: &str, grant: &ClientCredentialsGrant) -> JobHttpRequest {
    let body = form_urlencoded::Serializer::new(String::new())
        .append_pair("grant_type", "client_credentials")
        .append_pair("client_id", grant.client_id.as_str())
        .append_pair("client_secret", grant.client_secret.as_str())
        .append_pair("scope", grant.scope.as_str())
        .finish();
    JobHttpRequest {
        method: HttpMethod::Post,
        url: token_url.to_string(),
        headers: vec![(
            String::from("Content-Type"),
            String::from("application/x-www-form-urlencoded"),
        )],
        body: Some(body.into_bytes()),
    }
}

pub fn request_access_token<T: JobTransport>(
    transport: &T,
    token_url: &str,
    grant: &ClientCredentialsGrant,
) -> Result<AccessToken, CredentialsError> {
    tracing::info!(token_url, "requesting IMS access token");
    let resp = transport
        .send(&build_token_request(token_url, grant))
        .map_err(|e| CredentialsError::TokenRequest(e.to_string()))?;
    if !(200..300).contains(&resp.status_code) {
        return Err(CredentialsError::TokenRequest(format!(
            "HTTP {}: {}",
            resp.status_code,
            resp.body_text()
        )));
    }
    let token: AccessToken = serde_json::from_slice(resp.body.as_slice())
        .map_err(|e| CredentialsError::TokenResponse(e.to_string()))?;
    if token.access_token.trim().is_empty() {
        return Err(CredentialsError::TokenResponse(String::from(
            "empty access_token",
        )));
    }
    tracing::debug!(expires_in = ?token.expires_in, "IMS access token issued");
    Ok(token)
}
