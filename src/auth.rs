//! Credentials and `Authorization` header values.

use crate::clock::Clock;
use crate::route::AuthMode;
use crate::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use url::{form_urlencoded, Url};

/// Produces the current OAuth2 access token.
///
/// The requester asks for the token before every attempt, so a token that
/// was refreshed between a failed attempt and its retry is picked up.
pub trait TokenProvider: Send + Sync {
    fn access_token(&self) -> Result<String>;
}

impl<F> TokenProvider for F
where
    F: Fn() -> Result<String> + Send + Sync,
{
    fn access_token(&self) -> Result<String> {
        self()
    }
}

/// A token that never changes.
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl TokenProvider for StaticToken {
    fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

impl fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StaticToken(..)")
    }
}

/// The tokens granted by an OAuth2 authorization.
///
/// The authorization server redirects to the application's callback URL with
/// the grant encoded in the fragment (or, for some flows, the query):
///
/// ```
/// use imgur_rest::auth::OAuth2Token;
/// use std::time::UNIX_EPOCH;
///
/// let token = OAuth2Token::from_callback_url(
///     UNIX_EPOCH,
///     "https://example.com/cb#access_token=abc&refresh_token=def\
///      &expires_in=3600&token_type=bearer&account_username=me&account_id=42",
/// )
/// .unwrap();
/// assert_eq!(token.access_token(), "abc");
/// assert_eq!(token.account_id(), 42);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct OAuth2Token {
    access_token: String,
    refresh_token: String,
    created_at: SystemTime,
    expires_in: Duration,
    account_username: String,
    account_id: u64,
}

impl OAuth2Token {
    /// # Errors
    ///
    /// Returns [`Error::Authorization`] if a token or the username is blank,
    /// or if `expires_in` or `account_id` is zero.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        created_at: SystemTime,
        expires_in: Duration,
        account_username: impl Into<String>,
        account_id: u64,
    ) -> Result<Self> {
        let token = Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            created_at,
            expires_in,
            account_username: account_username.into(),
            account_id,
        };
        for (name, value) in [
            ("access_token", &token.access_token),
            ("refresh_token", &token.refresh_token),
            ("account_username", &token.account_username),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Authorization(format!("{name} must not be blank")));
            }
        }
        if expires_in.is_zero() {
            return Err(Error::Authorization("expires_in must be positive".to_string()));
        }
        if account_id == 0 {
            return Err(Error::Authorization("account_id must be positive".to_string()));
        }
        Ok(token)
    }

    /// Decodes the redirect the authorization server sent to the callback
    /// URL. `expires_in` is read as seconds from `created_at`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Authorization`] if the user denied access, the server
    /// reported an error, or a parameter is missing or malformed.
    pub fn from_callback_url(created_at: SystemTime, callback: &str) -> Result<Self> {
        let url = Url::parse(callback)
            .map_err(|e| Error::Authorization(format!("invalid callback url: {e}")))?;

        // First occurrence wins, query before fragment.
        let mut params: HashMap<String, String> = HashMap::new();
        let pairs = url
            .query_pairs()
            .chain(form_urlencoded::parse(url.fragment().unwrap_or("").as_bytes()));
        for (key, value) in pairs {
            params.entry(key.into_owned()).or_insert_with(|| value.into_owned());
        }

        if let Some(error) = params.get("error") {
            return Err(Error::Authorization(if error == "access_denied" {
                "The access was denied by the user".to_string()
            } else {
                format!("An error occurred during the OAuth2 authentication: {error}")
            }));
        }

        let param = |name: &str| {
            params
                .get(name)
                .ok_or_else(|| Error::Authorization(format!("Missing parameter: {name}")))
        };
        let number = |name: &str| {
            param(name)?
                .parse::<u64>()
                .map_err(|e| Error::Authorization(format!("Malformed parameter {name}: {e}")))
        };

        Self::new(
            param("access_token")?.as_str(),
            param("refresh_token")?.as_str(),
            created_at,
            Duration::from_secs(number("expires_in")?),
            param("account_username")?.as_str(),
            number("account_id")?,
        )
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    pub fn expires_in(&self) -> Duration {
        self.expires_in
    }

    pub fn expires_at(&self) -> SystemTime {
        self.created_at + self.expires_in
    }

    pub fn account_username(&self) -> &str {
        &self.account_username
    }

    pub fn account_id(&self) -> u64 {
        self.account_id
    }

    pub fn is_expired(&self, clock: &dyn Clock) -> bool {
        clock.now() >= self.expires_at()
    }
}

impl TokenProvider for OAuth2Token {
    fn access_token(&self) -> Result<String> {
        Ok(self.access_token.clone())
    }
}

impl fmt::Debug for OAuth2Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth2Token")
            .field("created_at", &self.created_at)
            .field("expires_in", &self.expires_in)
            .field("account_username", &self.account_username)
            .field("account_id", &self.account_id)
            .finish_non_exhaustive()
    }
}

/// The client identifier plus an optional bearer token source.
#[derive(Clone)]
pub struct Credentials {
    client_id: String,
    token: Option<Arc<dyn TokenProvider>>,
}

impl Credentials {
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `client_id` is blank.
    pub fn new(client_id: impl Into<String>) -> Result<Self> {
        let client_id = client_id.into();
        if client_id.trim().is_empty() {
            return Err(Error::Configuration("client id must not be blank".to_string()));
        }
        Ok(Self {
            client_id,
            token: None,
        })
    }

    pub fn with_token_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.token = Some(provider);
        self
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Formats the `Authorization` header for `mode`, fetching a fresh bearer
    /// token if needed. Returns `None` for [`AuthMode::None`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Authorization`] if a bearer token is needed but no
    /// provider is configured, the provider fails, or it returns a blank token.
    pub fn header_value(&self, mode: AuthMode) -> Result<Option<String>> {
        match mode {
            AuthMode::None => Ok(None),
            AuthMode::ApiKey => Ok(Some(format!("Client-ID {}", self.client_id))),
            AuthMode::Bearer => {
                let provider = self.token.as_ref().ok_or_else(|| {
                    Error::Authorization("no access token provider configured".to_string())
                })?;
                let token = provider
                    .access_token()
                    .map_err(|e| Error::Authorization(e.to_string()))?;
                if token.trim().is_empty() {
                    return Err(Error::Authorization("access token is blank".to_string()));
                }
                Ok(Some(format!("Bearer {token}")))
            }
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("token", &self.token.as_ref().map(|_| ".."))
            .finish()
    }
}
