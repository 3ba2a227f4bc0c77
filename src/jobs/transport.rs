use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::Method;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

/// Raw provider reply. Interpretation is left to the normalizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHttpResponse {
    pub status_code: u16,
    pub body: Vec<u8>,
}

impl JobHttpResponse {
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(self.body.as_slice()).to_string()
    }
}

pub trait JobTransport: Send + Sync + 'static {
    fn send(&self, request: &JobHttpRequest) -> Result<JobHttpResponse, TransportError>;
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http client init failed: {0}")]
    ClientInit(String),
    #[error("{method} {url} failed: {message}")]
    Request {
        method: &'static str,
        url: String,
        message: String,
    },
    #[error("{method} {url} body read failed: {message}")]
    BodyRead {
        method: &'static str,
        url: String,
        message: String,
    },
}

#[derive(Debug, Clone)]
pub struct ReqwestJobTransport {
    client: Client,
}

impl ReqwestJobTransport {
    pub fn new(request_timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| TransportError::ClientInit(e.to_string()))?;
        Ok(Self { client })
    }
}

impl JobTransport for ReqwestJobTransport {
    fn send(&self, request: &JobHttpRequest) -> Result<JobHttpResponse, TransportError> {
        let method = match request.method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
        };
        let mut builder = self.client.request(method, request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        let resp = builder.send().map_err(|e| TransportError::Request {
            method: request.method.as_str(),
            url: request.url.clone(),
            message: e.to_string(),
        })?;
        let status_code = resp.status().as_u16();
        let body = resp.bytes().map_err(|e| TransportError::BodyRead {
            method: request.method.as_str(),
            url: request.url.clone(),
            message: e.to_string(),
        })?;
        Ok(JobHttpResponse {
            status_code,
            body: body.to_vec(),
        })
    }
}
