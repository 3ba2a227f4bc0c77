use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use url::Url;

use super::normalize::{
    classify_envelope, normalize_status, normalize_submission_ack, parse_envelope,
    provider_rejection, JobFailure, JobStatus, StatusEnvelope,
};
use super::transport::{HttpMethod, JobHttpRequest, JobTransport};
use super::JobError;
use crate::credentials::Credentials;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(300);

pub trait PollClock: Send + Sync {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPollClock;

impl PollClock for SystemPollClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollLimits {
    pub interval: Duration,
    pub timeout: Duration,
    pub max_attempts: Option<u32>,
}

impl Default for PollLimits {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_POLL_TIMEOUT,
            max_attempts: None,
        }
    }
}

/// Shared flag another thread can set to stop a running poll loop.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    AwaitingFirstLink,
    Polling,
    Terminal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobResolution {
    Succeeded,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOutcome {
    pub resolution: JobResolution,
    pub self_link: String,
    pub polls: u32,
}

pub fn extract_self_link(submission_body: &[u8]) -> Result<String, JobError> {
    let envelope = parse_envelope(submission_body)
        .ok_or_else(|| JobError::MalformedResponse(String::from("invalid json")))?;
    if let StatusEnvelope::ProviderError { code, envelope } = classify_envelope(&envelope) {
        return Err(provider_rejection(code, envelope).into());
    }
    self_link_from_envelope(&envelope)
}

fn self_link_from_envelope(envelope: &Map<String, Value>) -> Result<String, JobError> {
    let href = envelope
        .get("_links")
        .and_then(|links| links.get("self"))
        .and_then(|link| link.get("href"))
        .ok_or_else(|| JobError::MalformedResponse(String::from("self link not found")))?;
    let href = href
        .as_str()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| JobError::MalformedResponse(String::from("invalid self link")))?;
    Url::parse(href)
        .map_err(|e| JobError::MalformedResponse(format!("invalid self link '{href}': {e}")))?;
    Ok(href.to_string())
}

pub struct StatusPoller<'a, T, C> {
    transport: &'a T,
    credentials: &'a Credentials,
    clock: &'a C,
    limits: PollLimits,
    cancellation: Option<&'a CancellationFlag>,
    state: PollerState,
}

impl<'a, T, C> StatusPoller<'a, T, C>
where
    T: JobTransport,
    C: PollClock,
{
    pub fn new(transport: &'a T, credentials: &'a Credentials, clock: &'a C) -> Self {
        Self {
            transport,
            credentials,
            clock,
            limits: PollLimits::default(),
            cancellation: None,
            state: PollerState::AwaitingFirstLink,
        }
    }

    pub fn with_limits(mut self, limits: PollLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_cancellation(mut self, cancellation: &'a CancellationFlag) -> Self {
        self.cancellation = Some(cancellation);
        self
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    /// Drives one job from its submission acknowledgement to a terminal result.
    pub fn resolve(&mut self, submission_body: &[u8]) -> Result<PollOutcome, JobError> {
        self.state = PollerState::AwaitingFirstLink;
        let result = self.resolve_from_ack(submission_body);
        self.state = PollerState::Terminal;
        result
    }

    fn resolve_from_ack(&mut self, submission_body: &[u8]) -> Result<PollOutcome, JobError> {
        let envelope = parse_envelope(submission_body)
            .ok_or_else(|| JobError::MalformedResponse(String::from("invalid json")))?;

        let ack_status = normalize_submission_ack(&envelope);
        if let JobStatus::Failed(JobFailure::Provider(rejection)) = ack_status {
            return Err(rejection.into());
        }
        let self_link = self_link_from_envelope(&envelope)?;

        match ack_status {
            JobStatus::Failed(JobFailure::Job { reason }) => {
                warn!(reason = reason.as_str(), "job rejected at submission");
                return Ok(PollOutcome {
                    resolution: JobResolution::Failed { reason },
                    self_link,
                    polls: 0,
                });
            }
            JobStatus::Succeeded => {
                info!("job already succeeded at submission");
                return Ok(PollOutcome {
                    resolution: JobResolution::Succeeded,
                    self_link,
                    polls: 0,
                });
            }
            _ => {}
        }

        info!(self_link = self_link.as_str(), "polling job status");
        self.state = PollerState::Polling;
        self.poll_until_terminal(self_link)
    }

    fn poll_until_terminal(&mut self, self_link: String) -> Result<PollOutcome, JobError> {
        let request = JobHttpRequest {
            method: HttpMethod::Get,
            url: self_link.clone(),
            headers: self.credentials.auth_headers(),
            body: None,
        };
        let started = self.clock.now();
        let mut polls = 0u32;

        loop {
            self.ensure_not_cancelled(polls)?;
            polls += 1;
            let resp = self.transport.send(&request)?;
            let status = normalize_status(resp.body.as_slice());
            debug!(
                attempt = polls,
                http_status = resp.status_code,
                status = status.label(),
                "job status fetched"
            );

            match status {
                JobStatus::Pending => {}
                JobStatus::Succeeded => {
                    info!(polls, "job succeeded");
                    return Ok(PollOutcome {
                        resolution: JobResolution::Succeeded,
                        self_link,
                        polls,
                    });
                }
                JobStatus::Failed(JobFailure::Job { reason }) => {
                    warn!(polls, reason = reason.as_str(), "job failed");
                    return Ok(PollOutcome {
                        resolution: JobResolution::Failed { reason },
                        self_link,
                        polls,
                    });
                }
                JobStatus::Failed(JobFailure::Provider(rejection)) => return Err(rejection.into()),
                JobStatus::MalformedResponse(detail) => {
                    warn!(polls, body = resp.body_text().as_str(), "unrecognized status response");
                    return Err(JobError::MalformedResponse(detail));
                }
            }

            let elapsed = self.clock.now().saturating_duration_since(started);
            let attempts_exhausted = self.limits.max_attempts.is_some_and(|max| polls >= max);
            if attempts_exhausted || elapsed + self.limits.interval > self.limits.timeout {
                return Err(JobError::TimedOut {
                    polls,
                    elapsed_ms: elapsed.as_millis(),
                });
            }
            self.ensure_not_cancelled(polls)?;
            self.clock.sleep(self.limits.interval);
        }
    }

    fn ensure_not_cancelled(&self, polls: u32) -> Result<(), JobError> {
        match self.cancellation {
            Some(flag) if flag.is_cancelled() => Err(JobError::Cancelled { polls }),
            _ => Ok(()),
        }
    }
}
