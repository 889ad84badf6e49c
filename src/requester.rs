//! Transport executor.
//!
//! The [`Requester`] turns a pending request into HTTP exchanges. It owns
//! the retry loop: a server error is retried with backoff up to the policy's
//! attempt bound, a transport timeout replays the whole exchange once, and the
//! deadline and cancellation flag are checked before every attempt.

use crate::auth::Credentials;
use crate::body::RequestBody;
use crate::request::PendingRequest;
use crate::retry::RetryPolicy;
use crate::route::CompiledRoute;
use crate::{Error, Response, Result};
use http::{header, HeaderMap, HeaderValue};
use std::fmt;
use std::time::{Duration, Instant};
use url::Url;

/// Query parameter asking the API for JSON output on every request.
const FORMAT_PARAM: (&str, &str) = ("format", "json");

/// Executes requests against one API host.
pub struct Requester {
    http: reqwest::Client,
    base_url: Url,
    credentials: Credentials,
    user_agent: HeaderValue,
    default_headers: HeaderMap,
    request_timeout: Option<Duration>,
    retry: RetryPolicy,
}

impl Requester {
    pub(crate) fn new(
        http: reqwest::Client,
        base_url: Url,
        credentials: Credentials,
        user_agent: HeaderValue,
        default_headers: HeaderMap,
        request_timeout: Option<Duration>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            http,
            base_url: with_trailing_slash(base_url),
            credentials,
            user_agent,
            default_headers,
            request_timeout,
            retry,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Resolves the absolute URL for a compiled route, with `format=json`
    /// appended to its query.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if the path does not form a valid URL.
    pub fn url_for(&self, route: &CompiledRoute) -> Result<Url> {
        let route = route.add_query_params(&[FORMAT_PARAM])?;
        Ok(self.base_url.join(route.path())?)
    }

    /// Runs `request` to completion.
    ///
    /// Every path through this method completes the request exactly once,
    /// either here or in the skip check.
    pub(crate) async fn execute<T: Send + 'static>(&self, request: &PendingRequest<T>) {
        let start_time = Instant::now();
        let mut timeout_retried = false;

        loop {
            match self.exchange(request).await {
                Ok(Some(response)) => {
                    tracing::info!(
                        route = %request.route(),
                        status = response.code(),
                        latency_ms = start_time.elapsed().as_millis(),
                        "Received HTTP response"
                    );
                    if response.is_client_error() {
                        tracing::debug!(
                            route = %request.route(),
                            status = response.code(),
                            response = %response.string(),
                            "Client error (4xx)"
                        );
                    }
                    return request.handle_response(response);
                }
                Ok(None) => return,
                Err(Error::Timeout) if !timeout_retried && self.retry.retries_timeout() => {
                    tracing::warn!(route = %request.route(), "Request timed out, retrying once");
                    timeout_retried = true;
                }
                Err(e @ (Error::Timeout | Error::Network(_))) => {
                    tracing::error!(
                        route = %request.route(),
                        error = %e,
                        latency_ms = start_time.elapsed().as_millis(),
                        "There was an I/O error while executing a request"
                    );
                    return request.handle_response(Response::from_error(e));
                }
                Err(e) => {
                    tracing::error!(
                        route = %request.route(),
                        error = %e,
                        "Failed to prepare request"
                    );
                    return request.on_failure(e);
                }
            }
        }
    }

    /// One exchange: up to the policy's attempt bound of sends, retrying
    /// server errors with backoff.
    ///
    /// Returns `Ok(None)` if the request was completed by the skip check.
    async fn exchange<T: Send + 'static>(
        &self,
        request: &PendingRequest<T>,
    ) -> Result<Option<Response>> {
        let url = self.url_for(request.route())?;
        let mut attempt = 0;

        loop {
            if request.is_skipped() {
                return Ok(None);
            }
            attempt += 1;

            tracing::debug!(
                method = %request.route().method(),
                url = %url,
                attempt = attempt,
                "Executing HTTP request"
            );

            let response = self.send(request, url.clone()).await?;
            let status = response.status();

            if status.is_server_error() {
                if let Some(delay) = self.retry.backoff(attempt) {
                    tracing::warn!(
                        route = %request.route(),
                        status = status.as_u16(),
                        attempt = attempt,
                        delay_ms = delay.as_millis(),
                        "Server error (5xx), retrying request after delay"
                    );
                    // The body of a discarded attempt is never read.
                    drop(response);
                    self.retry.wait(delay).await;
                    continue;
                }
                tracing::warn!(
                    route = %request.route(),
                    status = status.as_u16(),
                    attempts = attempt,
                    "Server error (5xx), retries exhausted"
                );
            }

            let headers = response.headers().clone();
            let body = response.bytes().await.map_err(classify)?;
            return Ok(Some(Response::from_transport(status, headers, body)));
        }
    }

    async fn send<T: Send + 'static>(
        &self,
        request: &PendingRequest<T>,
        url: Url,
    ) -> Result<reqwest::Response> {
        let route = request.route();
        let mut builder = self
            .http
            .request(route.method().as_http(), url)
            .header(header::USER_AGENT, self.user_agent.clone())
            .header(header::ACCEPT_ENCODING, "gzip");

        for (name, value) in &self.default_headers {
            builder = builder.header(name, value);
        }

        // Tokens may rotate between attempts.
        if let Some(authorization) = self.credentials.header_value(route.auth())? {
            builder = builder.header(header::AUTHORIZATION, authorization);
        }

        if let Some(timeout) = self.request_timeout {
            builder = builder.timeout(timeout);
        }

        builder = match request.body() {
            Some(body) => body.apply(builder),
            None if route.method().requires_body() => RequestBody::empty().apply(builder),
            None => builder,
        };

        builder.send().await.map_err(classify)
    }
}

impl fmt::Debug for Requester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Requester")
            .field("base_url", &self.base_url.as_str())
            .field("client_id", &self.credentials.client_id())
            .field("request_timeout", &self.request_timeout)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

fn classify(error: reqwest::Error) -> Error {
    if error.is_timeout() {
        Error::Timeout
    } else {
        Error::Network(error)
    }
}

/// `Url::join` replaces the last segment unless the base ends with '/'.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
