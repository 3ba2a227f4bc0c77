pub mod dotenv_utils;
pub mod ims;

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use thiserror::Error;

use crate::jobs::transport::JobTransport;
use crate::settings::AdobeSettings;

pub const CLIENT_ID_ENV: &str = "ADOBE_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "ADOBE_CLIENT_SECRET";
pub const ACCESS_TOKEN_ENV: &str = "ADOBE_ACCESS_TOKEN";

/// Access token plus client id, passed explicitly to every submit/poll call.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    access_token: String,
    client_id: String,
}

impl Credentials {
    pub fn new(
        access_token: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Result<Self, CredentialsError> {
        let access_token = access_token.into().trim().to_string();
        let client_id = client_id.into().trim().to_string();
        if access_token.is_empty() {
            return Err(CredentialsError::Missing(ACCESS_TOKEN_ENV));
        }
        if client_id.is_empty() {
            return Err(CredentialsError::Missing(CLIENT_ID_ENV));
        }
        Ok(Self {
            access_token,
            client_id,
        })
    }

    pub fn client_id(&self) -> &str {
        self.client_id.as_str()
    }

    pub fn auth_headers(&self) -> Vec<(String, String)> {
        vec![
            (
                String::from("Authorization"),
                format!("Bearer {}", self.access_token),
            ),
            (String::from("x-api-key"), self.client_id.clone()),
            (
                String::from("Content-Type"),
                String::from("application/json"),
            ),
        ]
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"<redacted>")
            .field("client_id", &self.client_id)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("missing {0}")]
    Missing(&'static str),
    #[error("failed to read .env: {0}")]
    Dotenv(#[source] std::io::Error),
    #[error("IMS token request failed: {0}")]
    TokenRequest(String),
    #[error("IMS token response invalid: {0}")]
    TokenResponse(String),
}

/// Environment lookup with `.env` fallback; process variables win.
#[derive(Debug, Clone, Default)]
pub struct EnvLookup {
    dotenv: HashMap<String, String>,
}

impl EnvLookup {
    pub fn load(app_root: &Path) -> Result<Self, CredentialsError> {
        let dotenv = dotenv_utils::load_dotenv_map(app_root).map_err(CredentialsError::Dotenv)?;
        Ok(Self { dotenv })
    }

    pub fn from_map(dotenv: HashMap<String, String>) -> Self {
        Self { dotenv }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .or_else(|| self.dotenv.get(key).cloned())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

/// Uses a supplied access token when present, otherwise exchanges the client
/// secret for one at the IMS token endpoint.
pub fn resolve_credentials<T: JobTransport>(
    transport: &T,
    adobe: &AdobeSettings,
    env: &EnvLookup,
) -> Result<Credentials, CredentialsError> {
    let client_id = env
        .get(CLIENT_ID_ENV)
        .ok_or(CredentialsError::Missing(CLIENT_ID_ENV))?;
    if let Some(token) = env.get(ACCESS_TOKEN_ENV) {
        tracing::debug!("using access token from environment");
        return Credentials::new(token, client_id);
    }
    let client_secret = env
        .get(CLIENT_SECRET_ENV)
        .ok_or(CredentialsError::Missing(CLIENT_SECRET_ENV))?;
    let token = ims::request_access_token(
        transport,
        adobe.ims_token_url.as_str(),
        &ims::ClientCredentialsGrant {
            client_id: client_id.clone(),
            client_secret,
            scope: adobe.ims_scope.clone(),
        },
    )?;
    Credentials::new(token.access_token, client_id)
}
