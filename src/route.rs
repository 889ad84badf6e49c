//! Route templates and compiled routes.
//!
//! A [`Route`] describes one remote endpoint: its HTTP [`Method`], the
//! [`AuthMode`] used to authorize it, and a path pattern containing required
//! `{name}` and optional `(name)` placeholders. Routes are immutable and are
//! usually declared once as constants (see [`crate::routes`]).
//!
//! Compiling a route substitutes the placeholders left to right and yields a
//! [`CompiledRoute`] ready for execution. Optional placeholders that were not
//! given a value are removed from the path together with their leading `/`,
//! so `3/gallery/(section)/(sort)` compiled with no parameters becomes
//! `3/gallery`.

use crate::{Error, Result};
use std::borrow::Cow;
use std::fmt;

/// Marker for an optional placeholder that should be omitted.
///
/// ```
/// use imgur_rest::route::{Route, ABSENT};
///
/// let route = Route::get(imgur_rest::AuthMode::ApiKey, "3/gallery/(section)/(sort)/(page)").unwrap();
/// let compiled = route.compile_optional(&[ABSENT, Some("viral"), Some("3")]).unwrap();
/// assert_eq!(compiled.path(), "3/gallery/viral/3");
/// ```
pub const ABSENT: Option<&str> = None;

/// HTTP methods supported by the remote API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    /// Converts to the `http` crate's method type.
    pub fn as_http(self) -> http::Method {
        match self {
            Method::Get => http::Method::GET,
            Method::Post => http::Method::POST,
            Method::Put => http::Method::PUT,
            Method::Delete => http::Method::DELETE,
        }
    }

    /// Returns `true` if requests with this method must carry a body.
    pub fn requires_body(self) -> bool {
        matches!(self, Method::Post | Method::Put)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        })
    }
}

/// How a route is authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMode {
    /// No `Authorization` header is sent.
    None,
    /// `Authorization: Client-ID <client id>`.
    ApiKey,
    /// `Authorization: Bearer <access token>`, re-read on every attempt.
    Bearer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanError {
    Empty,
    Whitespace,
    UnbalancedBraces,
    UnbalancedParens,
}

impl ScanError {
    fn message(self) -> &'static str {
        match self {
            ScanError::Empty => "route must not be empty",
            ScanError::Whitespace => "route must not contain whitespace",
            ScanError::UnbalancedBraces => "an argument does not have both {}'s",
            ScanError::UnbalancedParens => "an argument does not have both ()'s",
        }
    }
}

/// Counts `(required, optional)` placeholders and checks they are balanced.
const fn scan(path: &str) -> std::result::Result<(usize, usize), ScanError> {
    let bytes = path.as_bytes();
    if bytes.is_empty() {
        return Err(ScanError::Empty);
    }

    let (mut open_braces, mut close_braces) = (0, 0);
    let (mut open_parens, mut close_parens) = (0, 0);
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => open_braces += 1,
            b'}' => close_braces += 1,
            b'(' => open_parens += 1,
            b')' => close_parens += 1,
            b' ' | b'\t' | b'\n' | b'\r' => return Err(ScanError::Whitespace),
            _ => {}
        }
        i += 1;
    }

    if open_braces != close_braces {
        return Err(ScanError::UnbalancedBraces);
    }
    if open_parens != close_parens {
        return Err(ScanError::UnbalancedParens);
    }
    Ok((open_braces, open_parens))
}

/// An immutable endpoint descriptor.
///
/// # Examples
///
/// ```
/// use imgur_rest::route::{AuthMode, Method, Route};
///
/// const GET_ALBUM: Route = Route::new(Method::Get, AuthMode::ApiKey, "3/album/{album_hash}");
///
/// let compiled = GET_ALBUM.compile(&["aBc12"]).unwrap();
/// assert_eq!(compiled.path(), "3/album/aBc12");
/// assert!(GET_ALBUM.compile(&[]).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    method: Method,
    auth: AuthMode,
    path: Cow<'static, str>,
    required: usize,
    optional: usize,
}

impl Route {
    /// Declares a route at compile time.
    ///
    /// # Panics
    ///
    /// Panics (at compile time when used in a `const`) if the path is empty,
    /// contains whitespace, or has unbalanced `{}` / `()` placeholders.
    pub const fn new(method: Method, auth: AuthMode, path: &'static str) -> Self {
        let (required, optional) = match scan(path) {
            Ok(counts) => counts,
            Err(ScanError::Empty) => panic!("route must not be empty"),
            Err(ScanError::Whitespace) => panic!("route must not contain whitespace"),
            Err(ScanError::UnbalancedBraces) => panic!("an argument does not have both {{}}'s"),
            Err(ScanError::UnbalancedParens) => panic!("an argument does not have both ()'s"),
        };
        Self {
            method,
            auth,
            path: Cow::Borrowed(path),
            required,
            optional,
        }
    }

    /// Declares a route at run time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the path is malformed.
    pub fn custom(method: Method, auth: AuthMode, path: impl Into<String>) -> Result<Self> {
        let path = path.into();
        let (required, optional) = scan(&path).map_err(|e| {
            Error::Configuration(format!("{} for route: {} {}", e.message(), method, path))
        })?;
        Ok(Self {
            method,
            auth,
            path: Cow::Owned(path),
            required,
            optional,
        })
    }

    /// Shorthand for [`Route::custom`] with [`Method::Get`].
    pub fn get(auth: AuthMode, path: impl Into<String>) -> Result<Self> {
        Self::custom(Method::Get, auth, path)
    }

    /// Shorthand for [`Route::custom`] with [`Method::Post`].
    pub fn post(auth: AuthMode, path: impl Into<String>) -> Result<Self> {
        Self::custom(Method::Post, auth, path)
    }

    /// Shorthand for [`Route::custom`] with [`Method::Put`].
    pub fn put(auth: AuthMode, path: impl Into<String>) -> Result<Self> {
        Self::custom(Method::Put, auth, path)
    }

    /// Shorthand for [`Route::custom`] with [`Method::Delete`].
    pub fn delete(auth: AuthMode, path: impl Into<String>) -> Result<Self> {
        Self::custom(Method::Delete, auth, path)
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn auth(&self) -> AuthMode {
        self.auth
    }

    /// The uncompiled path pattern.
    pub fn pattern(&self) -> &str {
        &self.path
    }

    /// Number of `{required}` placeholders.
    pub fn required_params(&self) -> usize {
        self.required
    }

    /// Number of `(optional)` placeholders.
    pub fn optional_params(&self) -> usize {
        self.optional
    }

    /// Compiles the route with every supplied parameter present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if fewer parameters than required
    /// placeholders, or more than all placeholders together, are supplied.
    pub fn compile(&self, params: &[&str]) -> Result<CompiledRoute> {
        let params: Vec<Option<&str>> = params.iter().copied().map(Some).collect();
        self.compile_optional(&params)
    }

    /// Compiles the route, omitting optional placeholders given [`ABSENT`].
    ///
    /// Parameters fill the `{required}` placeholders first, then the
    /// `(optional)` ones, each in path order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] on a parameter count mismatch, or if
    /// a required placeholder is given [`ABSENT`].
    pub fn compile_optional(&self, params: &[Option<&str>]) -> Result<CompiledRoute> {
        if params.len() < self.required || params.len() > self.required + self.optional {
            return Err(Error::Configuration(format!(
                "Error compiling route [{}], incorrect amount of parameters provided. Expected: {} (+ {}), Provided: {}",
                self.path,
                self.required,
                self.optional,
                params.len()
            )));
        }

        let mut segments = Segment::parse(&self.path);
        let mut params = params.iter();

        // Required slots first, in order.
        for segment in segments.iter_mut() {
            if let Segment::Required(name, value) = segment {
                match params.next() {
                    Some(Some(param)) => *value = Some((*param).to_string()),
                    Some(None) => {
                        return Err(Error::Configuration(format!(
                            "Error compiling route [{}], required parameter '{}' cannot be absent",
                            self.path, name
                        )))
                    }
                    None => break,
                }
            }
        }
        for segment in segments.iter_mut() {
            if let Segment::Optional(value) = segment {
                match params.next() {
                    Some(param) => *value = param.map(str::to_string),
                    None => break,
                }
            }
        }

        let mut compiled = String::with_capacity(self.path.len());
        for segment in segments {
            match segment {
                Segment::Literal(text) => compiled.push_str(text),
                Segment::Required(_, Some(value)) | Segment::Optional(Some(value)) => {
                    compiled.push_str(&value)
                }
                // Counts were checked above, so only omitted optionals remain.
                Segment::Required(_, None) | Segment::Optional(None) => {
                    if compiled.ends_with('/') {
                        compiled.pop();
                    }
                }
            }
        }

        Ok(CompiledRoute {
            route: self.clone(),
            path: compiled,
            has_query_params: false,
        })
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

enum Segment<'a> {
    Literal(&'a str),
    Required(&'a str, Option<String>),
    Optional(Option<String>),
}

impl<'a> Segment<'a> {
    fn parse(path: &'a str) -> Vec<Segment<'a>> {
        let mut segments = Vec::new();
        let mut rest = path;

        while let Some(start) = rest.find(['{', '(']) {
            let close = if rest.as_bytes()[start] == b'{' { '}' } else { ')' };
            let Some(len) = rest[start..].find(close) else {
                break;
            };
            if start > 0 {
                segments.push(Segment::Literal(&rest[..start]));
            }
            let name = &rest[start + 1..start + len];
            segments.push(if close == '}' {
                Segment::Required(name, None)
            } else {
                Segment::Optional(None)
            });
            rest = &rest[start + len + 1..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest));
        }
        segments
    }
}

/// A route with every placeholder resolved.
///
/// Compiled routes are never mutated; [`CompiledRoute::add_query_params`]
/// returns a new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledRoute {
    route: Route,
    path: String,
    has_query_params: bool,
}

impl CompiledRoute {
    /// The template this route was compiled from.
    pub fn base_route(&self) -> &Route {
        &self.route
    }

    pub fn method(&self) -> Method {
        self.route.method
    }

    pub fn auth(&self) -> AuthMode {
        self.route.auth
    }

    /// The substituted path, including any query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn has_query_params(&self) -> bool {
        self.has_query_params
    }

    /// Returns a copy of this route with the given query pairs appended.
    ///
    /// Values are form-urlencoded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `pairs` is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use imgur_rest::route::{AuthMode, Route};
    ///
    /// let route = Route::get(AuthMode::ApiKey, "3/gallery/search/(sort)").unwrap();
    /// let compiled = route
    ///     .compile(&["top"])
    ///     .unwrap()
    ///     .add_query_params(&[("q", "cats"), ("q_type", "gif")])
    ///     .unwrap();
    /// assert_eq!(compiled.path(), "3/gallery/search/top?q=cats&q_type=gif");
    /// ```
    pub fn add_query_params(&self, pairs: &[(&str, &str)]) -> Result<CompiledRoute> {
        if pairs.is_empty() {
            return Err(Error::Configuration(
                "at least one query parameter pair is required".to_string(),
            ));
        }

        let mut path = self.path.clone();
        let mut has_query_params = self.has_query_params;
        for (key, value) in pairs {
            path.push(if has_query_params { '&' } else { '?' });
            path.extend(url::form_urlencoded::byte_serialize(key.as_bytes()));
            path.push('=');
            path.extend(url::form_urlencoded::byte_serialize(value.as_bytes()));
            has_query_params = true;
        }

        Ok(CompiledRoute {
            route: self.route.clone(),
            path,
            has_query_params,
        })
    }
}

impl fmt::Display for CompiledRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.route.method, self.path)
    }
}
