//! Error types for request execution.
//!
//! Every failure an [`Action`](crate::Action) can produce ends up as one
//! [`Error`]. The variant says which category occurred, so callers can branch
//! on cancellation, deadlines, transport failures and error responses without
//! string matching.

use http::StatusCode;

/// Status code used by [`Response`](crate::Response) and
/// [`Error::ErrorResponse`] when no HTTP status was ever obtained.
pub const REQUESTER_ERROR_CODE: i32 = -1;

/// The main error type for request execution.
///
/// # Examples
///
/// ```no_run
/// use imgur_rest::{routes::account, Client, Error};
///
/// # fn example(client: &Client) {
/// let action = client
///     .action(account::GET_USER_PROFILE.compile(&["me"]).unwrap(), |res| res.get::<serde_json::Value>());
///
/// match action.complete() {
///     Ok(profile) => println!("{profile}"),
///     Err(Error::ErrorResponse { code, message, .. }) => eprintln!("{code}: {message}"),
///     Err(e) if e.is_deadline_exceeded() => eprintln!("gave up waiting"),
///     Err(e) => eprintln!("other error: {e}"),
/// }
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A network-level error occurred (connection refused, DNS failure, broken body, ...).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The transport timed out while waiting on the upstream host.
    ///
    /// This is distinct from [`Error::DeadlineExceeded`], which is the caller's
    /// own completion deadline.
    #[error("Request timed out")]
    Timeout,

    /// The upstream host answered with a non-2xx status, or no status was
    /// obtained at all.
    ///
    /// `code` is the HTTP status, or [`REQUESTER_ERROR_CODE`] when the
    /// transport failed before a response arrived; `cause` then carries the
    /// transport error.
    #[error("{code}: {message}")]
    ErrorResponse {
        /// The HTTP status code, or [`REQUESTER_ERROR_CODE`].
        code: i32,
        /// The JSON error document, transport error, or raw body text.
        message: String,
        /// The transport error that prevented a response, if any.
        #[source]
        cause: Option<Box<Error>>,
    },

    /// Failed to decode the response body into the expected type.
    #[error("Failed to deserialize response (status {status}): {serde_error}")]
    DeserializationFailed {
        /// The raw response body that failed to deserialize
        raw_response: String,
        /// The decoder's error message
        serde_error: String,
        /// The HTTP status code
        status: StatusCode,
    },

    /// Invalid configuration: bad route templates, wrong parameter counts,
    /// invalid header values, missing credentials.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Failed to serialize the request body.
    #[error("Failed to serialize request: {0}")]
    SerializationFailed(String),

    /// The request was cancelled before it completed.
    #[error("Request has been cancelled")]
    Cancelled,

    /// The request's completion deadline passed before it could be sent.
    #[error("Request has timed out")]
    DeadlineExceeded,

    /// The request could not be admitted because a pool was shut down.
    #[error("Execution rejected: {0}")]
    Rejected(String),

    /// The bearer token could not be obtained.
    #[error("Authorization failed: {0}")]
    Authorization(String),

    /// An invalid URL was provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl Error {
    /// Returns `true` if the request was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Returns `true` if the request's completion deadline passed.
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, Error::DeadlineExceeded)
    }

    /// Returns `true` for a transport timeout, including an error response
    /// that was produced because of one.
    ///
    /// # Examples
    ///
    /// ```
    /// use imgur_rest::{error::REQUESTER_ERROR_CODE, Error};
    ///
    /// let err = Error::ErrorResponse {
    ///     code: REQUESTER_ERROR_CODE,
    ///     message: "Request timed out".to_string(),
    ///     cause: Some(Box::new(Error::Timeout)),
    /// };
    /// assert!(err.is_timeout());
    /// assert!(err.is_requester_error());
    /// ```
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Timeout => true,
            Error::ErrorResponse { cause: Some(cause), .. } => cause.is_timeout(),
            _ => false,
        }
    }

    /// Returns the status code carried by this error, if any.
    ///
    /// For [`Error::ErrorResponse`] this may be [`REQUESTER_ERROR_CODE`].
    pub fn status_code(&self) -> Option<i32> {
        match self {
            Error::ErrorResponse { code, .. } => Some(*code),
            Error::DeserializationFailed { status, .. } => Some(i32::from(status.as_u16())),
            _ => None,
        }
    }

    /// Returns `true` for a 4xx error response.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::ErrorResponse { code, .. } if (400..500).contains(code))
    }

    /// Returns `true` for a 5xx error response.
    pub fn is_server_error(&self) -> bool {
        matches!(self, Error::ErrorResponse { code, .. } if *code >= 500)
    }

    /// Returns `true` when no HTTP status was obtained at all.
    pub fn is_requester_error(&self) -> bool {
        matches!(self, Error::ErrorResponse { code, .. } if *code == REQUESTER_ERROR_CODE)
    }

    /// Returns the raw response body if this error has one.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::DeserializationFailed { raw_response, .. } => Some(raw_response),
            _ => None,
        }
    }
}

/// A specialized `Result` type for request execution.
pub type Result<T> = std::result::Result<T, Error>;
