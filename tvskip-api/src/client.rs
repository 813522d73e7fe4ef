//! Thin async wrapper over `reqwest` shared by every channel
//!
//! Each call carries its own timeout and reports latency so callers can log
//! the outcome of every external request.

use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, ORIGIN, REFERER, USER_AGENT};
use tracing::debug;

use crate::error::{ApiError, Result};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=UTF-8";
const DEFAULT_USER_AGENT: &str = concat!("tvskip/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Reply from any HTTP call
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
    pub latency: Duration,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Shared HTTP client
///
/// Cloning is cheap and shares the connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
    web_origin: Option<String>,
}

impl HttpClient {
    pub fn new() -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));

        let inner = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ApiError::NetworkError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            inner,
            web_origin: None,
        })
    }

    /// Send `Origin` and `Referer` headers derived from `origin` on form posts
    pub fn with_web_origin(mut self, origin: impl Into<String>) -> Self {
        self.web_origin = Some(origin.into());
        self
    }

    /// POST an already encoded form body
    pub async fn post_form(&self, url: &str, body: String, timeout: Duration) -> Result<HttpResponse> {
        let mut request = self
            .inner
            .post(url)
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(body);

        if let Some(origin) = &self.web_origin {
            request = request
                .header(ORIGIN, origin.as_str())
                .header(REFERER, format!("{}/tv", origin.trim_end_matches('/')));
        }

        self.execute(url, request, timeout).await
    }

    /// POST with no body, as used by local DIAL control
    pub async fn post_empty(&self, url: &str, timeout: Duration) -> Result<HttpResponse> {
        let request = self.inner.post(url);
        self.execute(url, request, timeout).await
    }

    pub async fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse> {
        let request = self.inner.get(url);
        self.execute(url, request, timeout).await
    }

    pub async fn get_with_query(
        &self,
        url: &str,
        query: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<HttpResponse> {
        let request = self.inner.get(url).query(query);
        self.execute(url, request, timeout).await
    }

    async fn execute(
        &self,
        url: &str,
        request: reqwest::RequestBuilder,
        timeout: Duration,
    ) -> Result<HttpResponse> {
        let started = Instant::now();

        let response = request.timeout(timeout).send().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout {
                    url: url.to_string(),
                    timeout,
                }
            } else {
                ApiError::NetworkError(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::NetworkError(e.to_string()))?;
        let latency = started.elapsed();

        debug!(
            url = %url,
            status,
            latency_ms = latency.as_millis() as u64,
            body_len = body.len(),
            "http request completed"
        );

        Ok(HttpResponse {
            status,
            body,
            latency,
        })
    }
}

/// Turn a non-2xx reply into [`ApiError::HttpStatus`]
pub(crate) fn require_success(url: &str, response: HttpResponse) -> Result<HttpResponse> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(ApiError::HttpStatus {
            status: response.status,
            url: url.to_string(),
        })
    }
}
