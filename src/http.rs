//! HTTP transport shared by every acquisition channel and the LLM client.
//!
//! Callers describe a request as plain data and get status + body back; a
//! non-2xx status is a normal response, only transport failures are errors.
//! One `ReqwestClient` (and therefore one connection pool) is built per
//! process and handed around as `Arc<dyn HttpClient>`.

use async_trait::async_trait;
use reqwest::{Client, Method};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HttpError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("http error: {0}")]
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Head,
    Post,
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub json_body: Option<serde_json::Value>,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self::new(HttpMethod::Get, url, timeout)
    }

    pub fn head(url: impl Into<String>, timeout: Duration) -> Self {
        Self::new(HttpMethod::Head, url, timeout)
    }

    pub fn post_json(url: impl Into<String>, body: serde_json::Value, timeout: Duration) -> Self {
        let mut request = Self::new(HttpMethod::Post, url, timeout);
        request.json_body = Some(body);
        request
    }

    fn new(method: HttpMethod, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            json_body: None,
            timeout,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn bearer(self, token: &str) -> Self {
        self.header("Authorization", format!("Bearer {}", token))
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    /// Final URL after redirects
    pub url: String,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

/// `HttpClient` backed by a single pooled `reqwest::Client`
pub struct ReqwestClient {
    client: Client,
}

impl ReqwestClient {
    /// Create a configured HTTP client. Redirects are followed.
    pub fn new(user_agent: &str) -> Result<Self, HttpError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| HttpError::Other(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let method = match request.method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Head => Method::HEAD,
            HttpMethod::Post => Method::POST,
        };
        debug!(method = %method, url = %request.url, "http request");

        let mut builder = self
            .client
            .request(method, &request.url)
            .timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.json_body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let body = response.text().await.map_err(classify)?;
        debug!(status, url = %url, bytes = body.len(), "http response");

        Ok(HttpResponse { status, url, body })
    }
}

fn classify(err: reqwest::Error) -> HttpError {
    if err.is_timeout() {
        HttpError::Timeout(err.to_string())
    } else if err.is_connect() {
        HttpError::Connect(err.to_string())
    } else {
        HttpError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_headers() {
        let request = HttpRequest::get("https://example.com", Duration::from_secs(3))
            .header("x-rapidapi-key", "k")
            .bearer("t");
        assert_eq!(request.method, HttpMethod::Get);
        assert_eq!(
            request.headers,
            vec![
                ("x-rapidapi-key".to_string(), "k".to_string()),
                ("Authorization".to_string(), "Bearer t".to_string()),
            ]
        );
    }

    #[test]
    fn success_range() {
        let mut response = HttpResponse {
            status: 204,
            url: String::new(),
            body: String::new(),
        };
        assert!(response.is_success());
        response.status = 302;
        assert!(!response.is_success());
    }
}
