pub mod client;
pub mod normalize;
pub mod payload;
pub mod poller;
pub mod submit;
pub mod transport;

use serde::Serialize;
use thiserror::Error;

use crate::jobs::normalize::ProviderRejection;
use crate::jobs::transport::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOperation {
    AutoTone,
    RemoveBackground,
}

impl JobOperation {
    pub const ALL: [Self; 2] = [Self::AutoTone, Self::RemoveBackground];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AutoTone => "auto-tone",
            Self::RemoveBackground => "remove-background",
        }
    }

    pub fn endpoint_path(self) -> &'static str {
        match self {
            Self::AutoTone => "lrService/autoTone",
            Self::RemoveBackground => "sensei/cutout",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|operation| operation.as_str() == normalized)
    }

    /// Joins the operation path onto the API base, tolerating a trailing slash.
    pub fn endpoint_url(self, api_base_url: &str) -> String {
        format!(
            "{}/{}",
            api_base_url.trim().trim_end_matches('/'),
            self.endpoint_path()
        )
    }
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("invalid {field} locator: {message}")]
    InvalidLocator { field: String, message: String },
    #[error("job payload encode failed: {0}")]
    PayloadEncode(#[source] serde_json::Error),
    #[error("job transport error: {0}")]
    Transport(#[source] TransportError),
    #[error("provider API error (code {code}): {payload}")]
    ProviderApi { code: String, payload: String },
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
    #[error("job did not finish after {polls} polls ({elapsed_ms} ms)")]
    TimedOut { polls: u32, elapsed_ms: u128 },
    #[error("job polling cancelled after {polls} polls")]
    Cancelled { polls: u32 },
}

impl From<ProviderRejection> for JobError {
    fn from(value: ProviderRejection) -> Self {
        Self::ProviderApi {
            code: value.code,
            payload: value.payload,
        }
    }
}

impl From<TransportError> for JobError {
    fn from(value: TransportError) -> Self {
        Self::Transport(value)
    }
}
