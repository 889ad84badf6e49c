//! The response envelope handed to decoders.
//!
//! A [`Response`] wraps one raw transport answer: its status, headers and
//! (already decompressed) body, or the transport error that prevented an
//! answer. The body is parsed lazily, once: the first getter decodes it as
//! JSON, or keeps it as plain text when it is not JSON, and every later getter
//! of any shape reuses that result.

use crate::error::REQUESTER_ERROR_CODE;
use crate::rate_limit::RateLimitInfo;
use crate::{Error, Result};
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::io::Read;
use std::sync::OnceLock;

/// Status message of a response that never reached the server.
pub const REQUESTER_ERROR_MESSAGE: &str = "ERROR";

/// Returned by [`Response::string`] when there is no body text at all.
pub const NO_BODY_TEXT: &str = "N/A";

#[derive(Debug)]
enum Parsed {
    Json(Value),
    Text { raw: String, serde_error: String },
    Empty,
}

/// A memoizing wrapper around one transport response.
///
/// # Examples
///
/// ```
/// use imgur_rest::Response;
/// use http::{HeaderMap, StatusCode};
///
/// let response = Response::new(
///     StatusCode::OK,
///     HeaderMap::new(),
///     r#"{"data":{"id":"aBc12"},"success":true,"status":200}"#,
/// );
///
/// assert!(response.is_ok());
/// let id: String = response.object().unwrap()["data"]["id"].as_str().unwrap().to_string();
/// assert_eq!(id, "aBc12");
/// ```
#[derive(Debug)]
pub struct Response {
    code: i32,
    message: String,
    headers: HeaderMap,
    body: Option<Bytes>,
    exception: Option<Error>,
    parsed: OnceLock<Parsed>,
    #[cfg(test)]
    parses: std::sync::atomic::AtomicUsize,
}

impl Response {
    /// Creates an envelope from a status, headers and an already-decoded body.
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        Self {
            code: i32::from(status.as_u16()),
            message: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body: (!body.is_empty()).then_some(body),
            exception: None,
            parsed: OnceLock::new(),
            #[cfg(test)]
            parses: Default::default(),
        }
    }

    /// Creates an envelope from a raw transport body, undoing gzip
    /// content-encoding when present.
    ///
    /// A body that claims gzip but does not decompress is kept as received.
    pub fn from_transport(status: StatusCode, headers: HeaderMap, raw: Bytes) -> Self {
        let gzipped = headers
            .get(http::header::CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("gzip"));

        let body = if gzipped && !raw.is_empty() {
            let mut decoded = Vec::new();
            match flate2::read::GzDecoder::new(raw.as_ref()).read_to_end(&mut decoded) {
                Ok(_) => Bytes::from(decoded),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to decompress gzip body, keeping raw bytes");
                    raw
                }
            }
        } else {
            raw
        };

        Self::new(status, headers, body)
    }

    /// Creates an envelope for a transport failure that produced no status.
    pub fn from_error(exception: Error) -> Self {
        Self {
            code: REQUESTER_ERROR_CODE,
            message: REQUESTER_ERROR_MESSAGE.to_string(),
            headers: HeaderMap::new(),
            body: None,
            exception: Some(exception),
            parsed: OnceLock::new(),
            #[cfg(test)]
            parses: Default::default(),
        }
    }

    /// The HTTP status, or [`REQUESTER_ERROR_CODE`].
    pub fn code(&self) -> i32 {
        self.code
    }

    /// The status reason phrase, or [`REQUESTER_ERROR_MESSAGE`].
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns a header value by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// The decompressed body bytes, if any.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// The transport error, for requester errors.
    pub fn exception(&self) -> Option<&Error> {
        self.exception.as_ref()
    }

    /// Rate limit information carried by this response's headers.
    pub fn rate_limit(&self) -> RateLimitInfo {
        RateLimitInfo::from_headers(&self.headers)
    }

    /// `[200, 300)`.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// Above 399, or a requester error.
    pub fn is_error(&self) -> bool {
        self.code > 399 || self.is_requester_error()
    }

    /// `[400, 500)`.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.code)
    }

    /// 500 and above.
    pub fn is_server_error(&self) -> bool {
        self.code >= 500
    }

    /// No status was obtained; see [`Response::exception`].
    pub fn is_requester_error(&self) -> bool {
        self.code == REQUESTER_ERROR_CODE
    }

    /// The whole body as a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeserializationFailed`] if the body is missing or is
    /// not JSON.
    pub fn document(&self) -> Result<&Value> {
        match self.parse() {
            Parsed::Json(value) => Ok(value),
            Parsed::Text { raw, serde_error } => Err(self.decode_error(raw, serde_error)),
            Parsed::Empty => Err(self.decode_error("", "response has no body")),
        }
    }

    /// Like [`Response::document`], but `None` instead of an error.
    pub fn opt_document(&self) -> Option<&Value> {
        self.document().ok()
    }

    /// The body as a JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeserializationFailed`] if the body is not a JSON object.
    pub fn object(&self) -> Result<&Map<String, Value>> {
        let document = self.document()?;
        document
            .as_object()
            .ok_or_else(|| self.decode_error(&document.to_string(), "expected a JSON object"))
    }

    pub fn opt_object(&self) -> Option<&Map<String, Value>> {
        self.opt_document()?.as_object()
    }

    /// The body as a JSON array.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeserializationFailed`] if the body is not a JSON array.
    pub fn array(&self) -> Result<&Vec<Value>> {
        let document = self.document()?;
        document
            .as_array()
            .ok_or_else(|| self.decode_error(&document.to_string(), "expected a JSON array"))
    }

    pub fn opt_array(&self) -> Option<&Vec<Value>> {
        self.opt_document()?.as_array()
    }

    /// Decodes the whole body into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeserializationFailed`] if the body is not JSON or
    /// does not match `T`.
    pub fn get<T: DeserializeOwned>(&self) -> Result<T> {
        self.decode(self.document()?)
    }

    /// Like [`Response::get`], but `None` on any decode failure.
    pub fn opt<T: DeserializeOwned>(&self) -> Option<T> {
        self.get().ok()
    }

    /// Decodes the `"data"` member of the body's envelope object into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeserializationFailed`] if the body is not an object
    /// with a `"data"` member matching `T`.
    ///
    /// # Examples
    ///
    /// ```
    /// use imgur_rest::Response;
    /// use http::{HeaderMap, StatusCode};
    ///
    /// let response = Response::new(StatusCode::OK, HeaderMap::new(), r#"{"data":[1,2,3]}"#);
    /// assert_eq!(response.data::<Vec<u32>>().unwrap(), vec![1, 2, 3]);
    /// assert_eq!(response.opt_data::<String>(), None);
    /// ```
    pub fn data<T: DeserializeOwned>(&self) -> Result<T> {
        let object = self.object()?;
        let data = object
            .get("data")
            .ok_or_else(|| self.decode_error(&Value::Object(object.clone()).to_string(), "missing field `data`"))?;
        self.decode(data)
    }

    pub fn opt_data<T: DeserializeOwned>(&self) -> Option<T> {
        self.data().ok()
    }

    /// The body as text, or [`NO_BODY_TEXT`] when there is none.
    pub fn string(&self) -> String {
        match self.parse() {
            Parsed::Text { raw, .. } => raw.clone(),
            Parsed::Json(_) => self
                .body
                .as_ref()
                .map(|body| String::from_utf8_lossy(body).into_owned())
                .unwrap_or_else(|| NO_BODY_TEXT.to_string()),
            Parsed::Empty => NO_BODY_TEXT.to_string(),
        }
    }

    /// Turns a failed response into [`Error::ErrorResponse`].
    ///
    /// The message is the first available of: the JSON body, the transport
    /// error's `Display` text, the raw body text, the status reason, and
    /// [`NO_BODY_TEXT`].
    pub fn into_error(self) -> Error {
        let message = if let Some(document) = self.opt_document() {
            document.to_string()
        } else if let Some(exception) = &self.exception {
            exception.to_string()
        } else {
            match self.parse() {
                Parsed::Text { raw, .. } if !raw.trim().is_empty() => raw.clone(),
                _ if !self.message.is_empty() => self.message.clone(),
                _ => NO_BODY_TEXT.to_string(),
            }
        };

        Error::ErrorResponse {
            code: self.code,
            message,
            cause: self.exception.map(Box::new),
        }
    }

    fn parse(&self) -> &Parsed {
        self.parsed.get_or_init(|| {
            #[cfg(test)]
            self.parses
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);

            let Some(body) = self.body.as_ref() else {
                return Parsed::Empty;
            };
            match serde_json::from_slice(body) {
                Ok(value) => Parsed::Json(value),
                Err(e) => Parsed::Text {
                    raw: String::from_utf8_lossy(body).into_owned(),
                    serde_error: e.to_string(),
                },
            }
        })
    }

    fn decode<T: DeserializeOwned>(&self, value: &Value) -> Result<T> {
        T::deserialize(value).map_err(|e| self.decode_error(&value.to_string(), &e.to_string()))
    }

    pub(crate) fn decode_error(&self, raw: &str, serde_error: &str) -> Error {
        Error::DeserializationFailed {
            raw_response: raw.to_string(),
            serde_error: serde_error.to_string(),
            status: u16::try_from(self.code)
                .ok()
                .and_then(|code| StatusCode::from_u16(code).ok())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }
}
