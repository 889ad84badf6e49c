//! Request payloads.
//!
//! Bodies are built by the calling layer from already-validated values and
//! are transmitted as-is. They are kept in memory so a retry can send the
//! same payload again.

use crate::{Error, Result};
use bytes::Bytes;
use serde::Serialize;

/// An opaque request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// A JSON document, sent as `application/json`.
    Json(serde_json::Value),
    /// Key/value pairs, sent as `application/x-www-form-urlencoded`.
    Form(Vec<(String, String)>),
    /// Raw bytes with an explicit content type.
    Raw {
        content_type: String,
        bytes: Bytes,
    },
}

impl RequestBody {
    /// Serializes `value` into a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SerializationFailed`] if `value` cannot be encoded.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        serde_json::to_value(value)
            .map(RequestBody::Json)
            .map_err(|e| Error::SerializationFailed(e.to_string()))
    }

    /// Builds a form body from key/value pairs.
    ///
    /// ```
    /// use imgur_rest::RequestBody;
    ///
    /// let body = RequestBody::form([("title", "cats"), ("privacy", "hidden")]);
    /// assert_eq!(body, RequestBody::Form(vec![
    ///     ("title".into(), "cats".into()),
    ///     ("privacy".into(), "hidden".into()),
    /// ]));
    /// ```
    pub fn form<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        RequestBody::Form(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn raw(content_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        RequestBody::Raw {
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// The empty JSON body sent for POST/PUT requests without a payload.
    pub(crate) fn empty() -> Self {
        RequestBody::raw("application/json; charset=utf-8", Bytes::new())
    }

    pub(crate) fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            RequestBody::Json(value) => request.json(value),
            RequestBody::Form(pairs) => request.form(pairs),
            RequestBody::Raw {
                content_type,
                bytes,
            } => request
                .header(http::header::CONTENT_TYPE, content_type.as_str())
                .body(bytes.clone()),
        }
    }
}
