use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use super::body::{RequestBody, FORM_CONTENT_TYPE};
use super::error::{ApiError, AttemptError};
use super::retry::{with_retry, BASE_DELAY, DEFAULT_MAX_RETRIES};
use super::transport::{HttpRequest, HttpResponse, Method, SharedTransport};

pub type Headers = HashMap<String, String>;

/// HTTP client for one remote API, retrying failed attempts with exponential backoff.
///
/// Only the base URL, default headers and retry ceiling are kept between calls.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    headers: Headers,
    max_retries: u32,
    base_delay: Duration,
    transport: SharedTransport,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, headers: Headers, transport: SharedTransport) -> Self {
        Self {
            base_url: base_url.into(),
            headers,
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: BASE_DELAY,
            transport,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn update_base_url(&mut self, base_url: impl Into<String>) {
        self.base_url = base_url.into();
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Merges `headers` over the current defaults
    pub fn update_headers(&mut self, headers: Headers) {
        self.headers.extend(headers);
    }

    pub fn set_header_value(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(key.into(), value.into());
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn set_max_retries(&mut self, max_retries: u32) {
        self.max_retries = max_retries;
    }

    /// Sends `method` to `base_url + endpoint`.
    ///
    /// Any transport error or status >= 400 counts as a failed attempt. Once
    /// `max_retries` attempts have failed, returns [`ApiError::RequestFailed`]. Responses
    /// in 200-399 are returned undecoded.
    pub async fn request(
        &self,
        endpoint: &str,
        method: Method,
        body: Option<&RequestBody>,
        headers: Option<&Headers>,
    ) -> Result<HttpResponse, ApiError> {
        let url = format!("{}{}", self.base_url, endpoint);
        info!(url = %url, method = %method, "Sending request");

        let mut merged = self.headers.clone();
        if let Some(overrides) = headers {
            merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        let body = match body {
            Some(b) => Some(b.encode(is_form_encoded(&merged))?),
            None => None,
        };

        let request = HttpRequest {
            url,
            method,
            headers: merged,
            body,
        };

        let result = with_retry(self.base_delay, self.max_retries, |attempt| {
            let request = request.clone();
            let transport = Arc::clone(&self.transport);
            async move {
                debug!(attempt, url = %request.url, "Request attempt");
                let response = transport.fetch(request).await?;
                if response.status >= 400 {
                    return Err(AttemptError::status(response.status, &response.body));
                }
                Ok(response)
            }
        })
        .await;

        result.map_err(|(last_error, attempts)| {
            error!(
                endpoint = %endpoint,
                attempts,
                status = ?last_error.status_code(),
                "Request failed after all attempts"
            );
            ApiError::RequestFailed {
                endpoint: endpoint.to_string(),
                attempts,
                last_error,
            }
        })
    }

    pub async fn get(
        &self,
        endpoint: &str,
        headers: Option<&Headers>,
    ) -> Result<HttpResponse, ApiError> {
        self.request(endpoint, Method::Get, None, headers).await
    }

    pub async fn post(
        &self,
        endpoint: &str,
        body: &RequestBody,
        headers: Option<&Headers>,
    ) -> Result<HttpResponse, ApiError> {
        self.request(endpoint, Method::Post, Some(body), headers).await
    }

    pub async fn put(
        &self,
        endpoint: &str,
        body: &RequestBody,
        headers: Option<&Headers>,
    ) -> Result<HttpResponse, ApiError> {
        self.request(endpoint, Method::Put, Some(body), headers).await
    }

    pub async fn patch(
        &self,
        endpoint: &str,
        body: &RequestBody,
        headers: Option<&Headers>,
    ) -> Result<HttpResponse, ApiError> {
        self.request(endpoint, Method::Patch, Some(body), headers).await
    }

    pub async fn delete(
        &self,
        endpoint: &str,
        headers: Option<&Headers>,
    ) -> Result<HttpResponse, ApiError> {
        self.request(endpoint, Method::Delete, None, headers).await
    }
}

fn is_form_encoded(headers: &Headers) -> bool {
    headers
        .iter()
        .any(|(k, v)| k.eq_ignore_ascii_case("content-type") && v == FORM_CONTENT_TYPE)
}
