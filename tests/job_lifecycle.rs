use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use bilder_jobs_core::credentials::Credentials;
use bilder_jobs_core::jobs::client::{ImageJobClient, JobSpec};
use bilder_jobs_core::jobs::payload::{JobOptions, ResourceLocator};
use bilder_jobs_core::jobs::poller::{JobResolution, PollClock, PollLimits};
use bilder_jobs_core::jobs::transport::{
    HttpMethod, JobHttpRequest, JobHttpResponse, JobTransport, TransportError,
};
use bilder_jobs_core::jobs::{JobError, JobOperation};

const API_BASE: &str = "https://image.example.test";

#[derive(Default)]
struct FakeProvider {
    submit_reply: Mutex<Option<String>>,
    poll_replies: Mutex<VecDeque<String>>,
    seen: Mutex<Vec<JobHttpRequest>>,
}

impl FakeProvider {
    fn new(submit_reply: Value, poll_replies: &[Value]) -> Self {
        Self {
            submit_reply: Mutex::new(Some(submit_reply.to_string())),
            poll_replies: Mutex::new(poll_replies.iter().map(Value::to_string).collect()),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn seen(&self) -> Vec<JobHttpRequest> {
        self.seen.lock().expect("seen mutex poisoned").clone()
    }
}

impl JobTransport for FakeProvider {
    fn send(&self, request: &JobHttpRequest) -> Result<JobHttpResponse, TransportError> {
        self.seen
            .lock()
            .expect("seen mutex poisoned")
            .push(request.clone());
        let body = match request.method {
            HttpMethod::Post => self.submit_reply.lock().expect("submit mutex").take(),
            HttpMethod::Get => self.poll_replies.lock().expect("poll mutex").pop_front(),
        };
        let body = body.ok_or_else(|| TransportError::Request {
            method: request.method.as_str(),
            url: request.url.clone(),
            message: String::from("unexpected request"),
        })?;
        Ok(JobHttpResponse {
            status_code: 200,
            body: body.into_bytes(),
        })
    }
}

struct InstantClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl InstantClock {
    fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }
}

impl PollClock for InstantClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock().expect("clock mutex poisoned")
    }

    fn sleep(&self, duration: Duration) {
        *self.offset.lock().expect("clock mutex poisoned") += duration;
    }
}

fn job_spec(operation: JobOperation) -> JobSpec {
    JobSpec {
        operation,
        input: ResourceLocator::external("https://s3/in.jpg", "input").expect("input"),
        output: ResourceLocator::external("https://s3/out.jpg", "output").expect("output"),
        options: JobOptions::default(),
    }
}

fn credentials() -> Credentials {
    Credentials::new("token-abc", "client-xyz").expect("credentials")
}

#[test]
fn remove_background_succeeds_after_two_polls() {
    let provider = FakeProvider::new(
        json!({"_links": {"self": {"href": "https://poll/1"}}}),
        &[
            json!({"output": {"status": "running"}}),
            json!({"output": {"status": "succeeded"}}),
        ],
    );
    let client = ImageJobClient::new(provider, API_BASE).with_clock(InstantClock::new());

    let report = client
        .run_job(&job_spec(JobOperation::RemoveBackground), &credentials(), None)
        .expect("job should succeed");

    assert_eq!(report.resolution, JobResolution::Succeeded);
    assert_eq!(report.polls, 2);
    assert_eq!(report.self_link, "https://poll/1");
    assert!(report.succeeded());

    let seen = client.transport().seen();
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[0].method, HttpMethod::Post);
    assert_eq!(seen[0].url, "https://image.example.test/sensei/cutout");
    let body: Value =
        serde_json::from_slice(seen[0].body.as_deref().expect("submit body")).expect("json");
    assert_eq!(
        body,
        json!({
            "input": {"href": "https://s3/in.jpg", "storage": "external"},
            "output": {"href": "https://s3/out.jpg", "storage": "external", "mask": {"format": "soft"}}
        })
    );
    for poll in &seen[1..] {
        assert_eq!(poll.method, HttpMethod::Get);
        assert_eq!(poll.url, "https://poll/1");
        assert_eq!(poll.headers, seen[0].headers);
        assert_eq!(poll.body, None);
    }
}

#[test]
fn poll_loop_stops_at_first_success_without_extra_get() {
    let mut polls = vec![json!({"outputs": [{"status": "pending"}]}); 4];
    polls.push(json!({"outputs": [{"status": "succeeded"}]}));
    polls.push(json!({"outputs": [{"status": "succeeded"}]}));
    let provider = FakeProvider::new(
        json!({"_links": {"self": {"href": "https://poll/tone"}}}),
        &polls,
    );
    let client = ImageJobClient::new(provider, API_BASE).with_clock(InstantClock::new());

    let report = client
        .run_job(&job_spec(JobOperation::AutoTone), &credentials(), None)
        .expect("job should succeed");

    assert_eq!(report.polls, 5);
    let seen = client.transport().seen();
    assert_eq!(seen.len(), 6);
    assert_eq!(seen[0].url, "https://image.example.test/lrService/autoTone");
}

#[test]
fn failed_job_is_reported_as_a_normal_outcome() {
    let provider = FakeProvider::new(
        json!({"_links": {"self": {"href": "https://poll/2"}}}),
        &[json!({"outputs": [{"status": "failed", "error": "bad image"}]})],
    );
    let client = ImageJobClient::new(provider, API_BASE).with_clock(InstantClock::new());

    let report = client
        .run_job(&job_spec(JobOperation::AutoTone), &credentials(), None)
        .expect("failed job is not an error");

    assert_eq!(
        report.resolution,
        JobResolution::Failed {
            reason: String::from("bad image")
        }
    );
    assert!(!report.succeeded());
    let rendered = serde_json::to_value(&report).expect("report json");
    assert_eq!(rendered["resolution"], json!({"outcome": "failed", "reason": "bad image"}));
    assert_eq!(rendered["operation"], "auto_tone");
}

#[test]
fn provider_rejection_at_submission_never_polls() {
    let provider = FakeProvider::new(json!({"code": 403, "message": "Forbidden"}), &[]);
    let client = ImageJobClient::new(provider, API_BASE).with_clock(InstantClock::new());

    let err = client
        .run_job(&job_spec(JobOperation::RemoveBackground), &credentials(), None)
        .expect_err("provider rejection");

    match err {
        JobError::ProviderApi { code, payload } => {
            assert_eq!(code, "403");
            assert!(payload.contains("Forbidden"));
        }
        other => panic!("expected provider error, got {other:?}"),
    }
    assert_eq!(client.transport().seen().len(), 1);
}

#[test]
fn never_finishing_job_hits_caller_deadline() {
    let polls = vec![json!({"output": {"status": "running"}}); 10];
    let provider = FakeProvider::new(
        json!({"_links": {"self": {"href": "https://poll/3"}}}),
        &polls,
    );
    let client = ImageJobClient::new(provider, API_BASE)
        .with_clock(InstantClock::new())
        .with_limits(PollLimits {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(3),
            max_attempts: None,
        });

    let err = client
        .run_job(&job_spec(JobOperation::RemoveBackground), &credentials(), None)
        .expect_err("deadline should stop polling");

    assert!(matches!(err, JobError::TimedOut { polls: 4, .. }));
    assert_eq!(client.transport().seen().len(), 5);
}
