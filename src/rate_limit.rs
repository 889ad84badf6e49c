//! Rate limit headers.
//!
//! The API reports user, client and upload quotas in response headers. They
//! are parsed on demand from a [`Response`](crate::Response) for callers that
//! want to pace themselves; the requester never waits on them, and a `429`
//! stays a terminal client error.

use http::HeaderMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Quota information extracted from response headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// `X-RateLimit-UserLimit`: credits per user per hour.
    pub user_limit: Option<u64>,
    /// `X-RateLimit-UserRemaining`.
    pub user_remaining: Option<u64>,
    /// `X-RateLimit-UserReset`: when the user quota resets.
    pub user_reset_at: Option<SystemTime>,
    /// `X-RateLimit-ClientLimit`: credits per application per day.
    pub client_limit: Option<u64>,
    /// `X-RateLimit-ClientRemaining`.
    pub client_remaining: Option<u64>,
    /// `X-Post-Rate-Limit-Remaining`: uploads left in the current window.
    pub post_remaining: Option<u64>,
    /// `X-Post-Rate-Limit-Reset`: time until the upload window resets.
    pub post_reset_in: Option<Duration>,
    /// `Retry-After`, in seconds or as an HTTP date.
    pub retry_after: Option<Duration>,
}

impl RateLimitInfo {
    /// Extracts quota information from response headers.
    ///
    /// # Examples
    ///
    /// ```
    /// use imgur_rest::rate_limit::RateLimitInfo;
    /// use http::HeaderMap;
    ///
    /// let mut headers = HeaderMap::new();
    /// headers.insert("x-ratelimit-userremaining", "0".parse().unwrap());
    /// headers.insert("retry-after", "60".parse().unwrap());
    ///
    /// let info = RateLimitInfo::from_headers(&headers);
    /// assert!(info.is_rate_limited());
    /// assert_eq!(info.retry_after, Some(std::time::Duration::from_secs(60)));
    /// ```
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            user_limit: parse_u64(headers, "x-ratelimit-userlimit"),
            user_remaining: parse_u64(headers, "x-ratelimit-userremaining"),
            user_reset_at: parse_u64(headers, "x-ratelimit-userreset")
                .map(|secs| UNIX_EPOCH + Duration::from_secs(secs)),
            client_limit: parse_u64(headers, "x-ratelimit-clientlimit"),
            client_remaining: parse_u64(headers, "x-ratelimit-clientremaining"),
            post_remaining: parse_u64(headers, "x-post-rate-limit-remaining"),
            post_reset_in: parse_u64(headers, "x-post-rate-limit-reset").map(Duration::from_secs),
            retry_after: parse_retry_after(headers),
        }
    }

    /// Returns `true` if any quota is exhausted or the server asked to wait.
    pub fn is_rate_limited(&self) -> bool {
        self.retry_after.is_some()
            || self.user_remaining == Some(0)
            || self.client_remaining == Some(0)
            || self.post_remaining == Some(0)
    }

    /// Returns the recommended wait before the next request, capped at `max_wait`.
    ///
    /// Prefers `Retry-After`, then the user quota reset time.
    pub fn delay(&self, max_wait: Duration) -> Option<Duration> {
        if let Some(retry_after) = self.retry_after {
            return Some(retry_after.min(max_wait));
        }

        if let Some(reset_at) = self.user_reset_at {
            if let Ok(until_reset) = reset_at.duration_since(SystemTime::now()) {
                return Some(until_reset.min(max_wait));
            }
        }

        None
    }
}

fn parse_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

/// Parses the Retry-After header.
///
/// Supports both delay-seconds (integer) and HTTP-date formats.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let header = headers.get("retry-after")?.to_str().ok()?;

    if let Ok(seconds) = header.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    if let Ok(date_time) = httpdate::parse_http_date(header) {
        if let Ok(duration) = date_time.duration_since(SystemTime::now()) {
            return Some(duration);
        }
    }

    None
}
