use chrono::Utc;
use serde::Serialize;
use tracing::info_span;
use uuid::Uuid;

use super::payload::{build_job_request, JobOptions, ResourceLocator};
use super::poller::{
    CancellationFlag, JobResolution, PollClock, PollLimits, StatusPoller, SystemPollClock,
};
use super::submit::submit_job;
use super::transport::JobTransport;
use super::{JobError, JobOperation};
use crate::credentials::Credentials;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub operation: JobOperation,
    pub input: ResourceLocator,
    pub output: ResourceLocator,
    pub options: JobOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobReport {
    pub job_id: String,
    pub operation: JobOperation,
    pub output_href: String,
    pub self_link: String,
    pub polls: u32,
    pub resolution: JobResolution,
    pub started_at: String,
    pub finished_at: String,
}

impl JobReport {
    pub fn succeeded(&self) -> bool {
        self.resolution == JobResolution::Succeeded
    }
}

/// Submit-then-poll for one job at a time against a single API base URL.
pub struct ImageJobClient<T, C = SystemPollClock> {
    transport: T,
    clock: C,
    api_base_url: String,
    limits: PollLimits,
}

impl<T: JobTransport> ImageJobClient<T> {
    pub fn new(transport: T, api_base_url: impl Into<String>) -> Self {
        Self {
            transport,
            clock: SystemPollClock,
            api_base_url: api_base_url.into(),
            limits: PollLimits::default(),
        }
    }
}

impl<T, C> ImageJobClient<T, C>
where
    T: JobTransport,
    C: PollClock,
{
    pub fn with_clock<C2: PollClock>(self, clock: C2) -> ImageJobClient<T, C2> {
        ImageJobClient {
            transport: self.transport,
            clock,
            api_base_url: self.api_base_url,
            limits: self.limits,
        }
    }

    pub fn with_limits(mut self, limits: PollLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn run_job(
        &self,
        spec: &JobSpec,
        credentials: &Credentials,
        cancellation: Option<&CancellationFlag>,
    ) -> Result<JobReport, JobError> {
        let job_id = Uuid::new_v4().to_string();
        let span = info_span!(
            "image_job",
            job_id = job_id.as_str(),
            operation = spec.operation.as_str()
        );
        let _entered = span.enter();
        let started_at = timestamp();

        let request = build_job_request(spec.operation, &spec.input, &spec.output, &spec.options);
        let endpoint = spec.operation.endpoint_url(self.api_base_url.as_str());
        let ack = submit_job(&self.transport, endpoint.as_str(), credentials, &request)?;

        let mut poller =
            StatusPoller::new(&self.transport, credentials, &self.clock).with_limits(self.limits);
        if let Some(flag) = cancellation {
            poller = poller.with_cancellation(flag);
        }
        let outcome = poller.resolve(ack.body.as_slice())?;

        Ok(JobReport {
            job_id,
            operation: spec.operation,
            output_href: spec.output.href().to_string(),
            self_link: outcome.self_link,
            polls: outcome.polls,
            resolution: outcome.resolution,
            started_at,
            finished_at: timestamp(),
        })
    }
}

fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
