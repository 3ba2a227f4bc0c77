//! Normalizes provider status envelopes (`code`, `outputs[0]`, `output`) into a `JobStatus`.

use serde::Serialize;
use serde_json::{Map, Value};

pub const STATUS_SUCCEEDED: &str = "succeeded";
pub const STATUS_FAILED: &str = "failed";
pub const IN_PROGRESS_STATUSES: [&str; 3] = ["pending", "starting", "running"];

const UNSPECIFIED_FAILURE: &str = "unspecified";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderRejection {
    pub code: String,
    pub payload: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobFailure {
    Provider(ProviderRejection),
    Job { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Succeeded,
    Failed(JobFailure),
    MalformedResponse(String),
}

impl JobStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Succeeded => "succeeded",
            Self::Failed(_) => "failed",
            Self::MalformedResponse(_) => "malformed_response",
        }
    }

    fn malformed(detail: impl Into<String>) -> Self {
        Self::MalformedResponse(detail.into())
    }

    fn job_failed(reason: impl Into<String>) -> Self {
        Self::Failed(JobFailure::Job {
            reason: reason.into(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatusEnvelope<'a> {
    ProviderError {
        code: &'a Value,
        envelope: &'a Map<String, Value>,
    },
    Outputs(&'a Map<String, Value>),
    Output(&'a Map<String, Value>),
    Unrecognized(&'static str),
}

pub fn parse_envelope(raw: &[u8]) -> Option<Map<String, Value>> {
    match serde_json::from_slice::<Value>(raw).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

pub fn classify_envelope(envelope: &Map<String, Value>) -> StatusEnvelope<'_> {
    if let Some(code) = envelope.get("code").filter(|v| !v.is_null()) {
        return StatusEnvelope::ProviderError { code, envelope };
    }
    if let Some(first) = envelope
        .get("outputs")
        .and_then(Value::as_array)
        .and_then(|outputs| outputs.first())
    {
        return match first.as_object() {
            Some(record) => StatusEnvelope::Outputs(record),
            None => StatusEnvelope::Unrecognized("outputs[0] is not an object"),
        };
    }
    match envelope.get("output").and_then(Value::as_object) {
        Some(record) => StatusEnvelope::Output(record),
        None => StatusEnvelope::Unrecognized("no output/outputs field"),
    }
}

/// An explicit, non-empty `status` takes precedence over `error`.
pub fn status_from_record(record: &Map<String, Value>) -> JobStatus {
    let error = match record.get("error") {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text.as_str()),
        Some(_) => return JobStatus::malformed("invalid error data"),
    };
    let status = record
        .get("status")
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty());

    match status {
        Some(STATUS_SUCCEEDED) => JobStatus::Succeeded,
        Some(STATUS_FAILED) => JobStatus::job_failed(error.unwrap_or(UNSPECIFIED_FAILURE)),
        Some(other) if IN_PROGRESS_STATUSES.contains(&other) => JobStatus::Pending,
        Some(other) => JobStatus::malformed(format!("unrecognized status value: {other}")),
        None => match error {
            Some(reason) => JobStatus::job_failed(reason),
            None => JobStatus::malformed("missing status and error"),
        },
    }
}

pub fn provider_rejection(code: &Value, envelope: &Map<String, Value>) -> ProviderRejection {
    let code = match code {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    };
    ProviderRejection {
        code,
        payload: Value::Object(envelope.clone()).to_string(),
    }
}

pub fn normalize_envelope(envelope: &Map<String, Value>) -> JobStatus {
    match classify_envelope(envelope) {
        StatusEnvelope::ProviderError { code, envelope } => {
            JobStatus::Failed(JobFailure::Provider(provider_rejection(code, envelope)))
        }
        StatusEnvelope::Outputs(record) | StatusEnvelope::Output(record) => {
            status_from_record(record)
        }
        StatusEnvelope::Unrecognized(detail) => JobStatus::malformed(detail),
    }
}

pub fn normalize_status(raw: &[u8]) -> JobStatus {
    match parse_envelope(raw) {
        Some(envelope) => normalize_envelope(&envelope),
        None => JobStatus::malformed("invalid json"),
    }
}

/// Like `normalize_envelope`, but falls back to the top-level envelope as the record.
pub fn normalize_submission_ack(envelope: &Map<String, Value>) -> JobStatus {
    match classify_envelope(envelope) {
        StatusEnvelope::ProviderError { code, envelope } => {
            JobStatus::Failed(JobFailure::Provider(provider_rejection(code, envelope)))
        }
        StatusEnvelope::Outputs(record) | StatusEnvelope::Output(record) => {
            status_from_record(record)
        }
        StatusEnvelope::Unrecognized(_) => {
            if envelope.contains_key("status") || envelope.contains_key("error") {
                status_from_record(envelope)
            } else {
                JobStatus::Pending
            }
        }
    }
}
