use tracing::{debug, info};

use super::payload::JobRequest;
use super::transport::{HttpMethod, JobHttpRequest, JobHttpResponse, JobTransport};
use super::JobError;
use crate::credentials::Credentials;

pub fn build_submit_request(
    endpoint_url: &str,
    credentials: &Credentials,
    request: &JobRequest,
) -> Result<JobHttpRequest, JobError> {
    Ok(JobHttpRequest {
        method: HttpMethod::Post,
        url: endpoint_url.to_string(),
        headers: credentials.auth_headers(),
        body: Some(request.to_json_bytes()?),
    })
}

/// Sends the job once. Transport failures surface as-is; there is no retry.
pub fn submit_job<T: JobTransport>(
    transport: &T,
    endpoint_url: &str,
    credentials: &Credentials,
    request: &JobRequest,
) -> Result<JobHttpResponse, JobError> {
    let http_request = build_submit_request(endpoint_url, credentials, request)?;
    info!(
        operation = request.operation().as_str(),
        endpoint = endpoint_url,
        "submitting image job"
    );
    let resp = transport.send(&http_request)?;
    debug!(status_code = resp.status_code, "submission acknowledged");
    Ok(resp)
}
