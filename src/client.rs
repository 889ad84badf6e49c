//! The client: configuration, pools and action factories.
//!
//! The [`Client`] type is the main entry point. Use [`ClientBuilder`] to
//! configure and create clients. A client is cheap to clone; clones share
//! the same HTTP connection pool, execution pools and defaults.

use crate::action::{Action, Decoder};
use crate::auth::{Credentials, StaticToken, TokenProvider};
use crate::body::RequestBody;
use crate::clock::{Clock, SystemClock};
use crate::paged::{PageParam, PagedAction};
use crate::pool::ExecutionPool;
use crate::requester::Requester;
use crate::retry::RetryPolicy;
use crate::route::{CompiledRoute, Route};
use crate::{Error, Response, Result};
use http::{HeaderMap, HeaderName, HeaderValue};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use url::Url;

const DEFAULT_BASE_URL: &str = "https://api.imgur.com/";
const DEFAULT_REQUESTER_THREADS: usize = 5;
const DEFAULT_CALLBACK_THREADS: usize = 2;
const REQUESTER_POOL_NAME: &str = "imgur-requester";
const CALLBACK_POOL_NAME: &str = "imgur-callback";

type SuccessHook = Arc<dyn Fn(&(dyn Any + Send)) + Send + Sync>;
type FailureHook = Arc<dyn Fn(&Error) + Send + Sync>;

/// Continuations and timeout applied to actions triggered without their own.
///
/// The default success continuation ignores the value. The default failure
/// continuation logs cancellations and passed deadlines at debug level, and
/// every other error at error level.
#[derive(Clone)]
pub struct ActionDefaults {
    pub(crate) on_success: SuccessHook,
    pub(crate) on_failure: FailureHook,
    pub(crate) timeout: Option<Duration>,
}

impl ActionDefaults {
    /// Replaces the default success continuation. It receives the decoded
    /// value type-erased.
    pub fn with_success<F>(mut self, on_success: F) -> Self
    where
        F: Fn(&(dyn Any + Send)) + Send + Sync + 'static,
    {
        self.on_success = Arc::new(on_success);
        self
    }

    pub fn with_failure<F>(mut self, on_failure: F) -> Self
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.on_failure = Arc::new(on_failure);
        self
    }

    /// Sets the timeout applied, at trigger time, to actions without a deadline.
    /// A zero timeout disables it.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl Default for ActionDefaults {
    fn default() -> Self {
        Self {
            on_success: Arc::new(|_| {}),
            on_failure: Arc::new(|error| {
                if error.is_cancelled() || error.is_deadline_exceeded() {
                    tracing::debug!(error = %error, "Request did not complete");
                } else {
                    tracing::error!(error = %error, "Request failed");
                }
            }),
            timeout: None,
        }
    }
}

impl fmt::Debug for ActionDefaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDefaults")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// An asynchronous REST client.
///
/// # Examples
///
/// ```no_run
/// use imgur_rest::{routes::account, Client};
///
/// # fn example() -> Result<(), imgur_rest::Error> {
/// let client = Client::builder()
///     .client_id("my-client-id")
///     .access_token("my-access-token")
///     .build()?;
///
/// let profile = client
///     .action(account::GET_USER_PROFILE.compile(&["me"])?, |res| {
///         res.data::<serde_json::Value>()
///     })
///     .complete()?;
/// println!("{profile}");
///
/// client.shutdown();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    requester: Arc<Requester>,
    requester_pool: Arc<ExecutionPool>,
    callback_pool: Arc<ExecutionPool>,
    defaults: ActionDefaults,
    clock: Arc<dyn Clock>,
}

impl Client {
    /// Creates a new [`ClientBuilder`].
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Creates an action for `route`, decoding successful responses with `decoder`.
    ///
    /// POST and PUT actions created without a body send an empty JSON body.
    pub fn action<T, F>(&self, route: CompiledRoute, decoder: F) -> Action<T>
    where
        T: Send + 'static,
        F: Fn(&Response) -> Result<T> + Send + Sync + 'static,
    {
        Action::new(self.clone(), route, None, Arc::new(decoder))
    }

    /// Creates an action carrying a request body.
    pub fn action_with_body<T, F>(
        &self,
        route: CompiledRoute,
        body: RequestBody,
        decoder: F,
    ) -> Action<T>
    where
        T: Send + 'static,
        F: Fn(&Response) -> Result<T> + Send + Sync + 'static,
    {
        Action::new(self.clone(), route, Some(body), Arc::new(decoder))
    }

    /// Creates a paged action over `route`, starting at page 0.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] unless `params` contains exactly one
    /// [`PageParam::Page`] and compiles against `route`.
    pub fn paged<T, F>(
        &self,
        route: Route,
        params: Vec<PageParam>,
        decoder: F,
    ) -> Result<PagedAction<T>>
    where
        T: Send + 'static,
        F: Fn(&Response) -> Result<T> + Send + Sync + 'static,
    {
        let decoder: Decoder<T> = Arc::new(decoder);
        PagedAction::new(self.clone(), route, params, decoder)
    }

    /// Stops accepting new requests. Queued requests still run and their
    /// continuations are still delivered.
    pub fn shutdown(&self) {
        tracing::info!("Shutting down requester");
        self.inner.requester_pool.shutdown();
    }

    /// Stops accepting new requests and stops both owned pools without
    /// waiting for queued work.
    pub fn shutdown_now(&self) {
        tracing::info!("Shutting down requester and callback pools");
        self.inner.requester_pool.shutdown_now();
        self.inner.callback_pool.shutdown_now();
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.requester_pool.is_shutdown()
    }

    pub fn defaults(&self) -> &ActionDefaults {
        &self.inner.defaults
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.inner.clock
    }

    pub fn requester(&self) -> &Arc<Requester> {
        &self.inner.requester
    }

    pub(crate) fn requester_pool(&self) -> &Arc<ExecutionPool> {
        &self.inner.requester_pool
    }

    pub(crate) fn callback_pool(&self) -> &Arc<ExecutionPool> {
        &self.inner.callback_pool
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("requester", &self.inner.requester)
            .field("requester_pool", &self.inner.requester_pool.name())
            .field("callback_pool", &self.inner.callback_pool.name())
            .field("defaults", &self.inner.defaults)
            .finish()
    }
}

/// Builder for configuring a [`Client`].
///
/// Only the client id is required.
///
/// # Examples
///
/// ```no_run
/// use imgur_rest::{Client, RetryPolicy, RetryStrategy};
/// use std::time::Duration;
///
/// # fn example() -> Result<(), imgur_rest::Error> {
/// let client = Client::builder()
///     .client_id("my-client-id")
///     .user_agent("my-app/1.0")
///     .request_timeout(Duration::from_secs(30))
///     .retry_policy(RetryPolicy::new(RetryStrategy::Fixed {
///         delay: Duration::from_millis(200),
///         max_retries: 2,
///     }))
///     .requester_threads(8)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    base_url: Option<Url>,
    client_id: Option<String>,
    token: Option<Arc<dyn TokenProvider>>,
    user_agent: Option<String>,
    default_headers: HeaderMap,
    request_timeout: Option<Duration>,
    retry: RetryPolicy,
    requester_pool: Option<Handle>,
    requester_threads: usize,
    callback_pool: Option<Handle>,
    defaults: ActionDefaults,
    clock: Arc<dyn Clock>,
    http_client: Option<reqwest::Client>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            base_url: None,
            client_id: None,
            token: None,
            user_agent: None,
            default_headers: HeaderMap::new(),
            request_timeout: None,
            retry: RetryPolicy::default(),
            requester_pool: None,
            requester_threads: DEFAULT_REQUESTER_THREADS,
            callback_pool: None,
            defaults: ActionDefaults::default(),
            clock: Arc::new(SystemClock),
            http_client: None,
        }
    }

    /// Sets the API host. Defaults to `https://api.imgur.com/`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        self.base_url = Some(Url::parse(url.as_ref())?);
        Ok(self)
    }

    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Uses a fixed bearer token for [`AuthMode::Bearer`](crate::AuthMode::Bearer) routes.
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(Arc::new(StaticToken::new(token)));
        self
    }

    /// Uses a token provider, consulted before every attempt.
    pub fn token_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.token = Some(provider);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Adds a header sent with every request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::Configuration(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::Configuration(format!("Invalid header value: {}", e)))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Sets the transport timeout for a single attempt. A timed-out exchange
    /// is replayed once.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Runs network work on an existing runtime instead of a dedicated one.
    pub fn requester_pool(mut self, handle: Handle) -> Self {
        self.requester_pool = Some(handle);
        self
    }

    /// Worker threads of the dedicated requester runtime. Defaults to 5.
    pub fn requester_threads(mut self, threads: usize) -> Self {
        self.requester_threads = threads;
        self
    }

    /// Runs continuations on an existing runtime instead of a dedicated one.
    pub fn callback_pool(mut self, handle: Handle) -> Self {
        self.callback_pool = Some(handle);
        self
    }

    pub fn defaults(mut self, defaults: ActionDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Replaces the time source used for deadlines.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Uses a preconfigured HTTP client, e.g. to share its connection pool.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Builds the client, starting any dedicated pools.
    ///
    /// # Errors
    ///
    /// Returns an error if the client id is missing or blank, the user agent
    /// is not a valid header value, or a pool cannot be started.
    pub fn build(self) -> Result<Client> {
        let client_id = self
            .client_id
            .ok_or_else(|| Error::Configuration("Client id is required".to_string()))?;
        let mut credentials = Credentials::new(client_id)?;
        if let Some(token) = self.token {
            credentials = credentials.with_token_provider(token);
        }

        let base_url = match self.base_url {
            Some(url) => url,
            None => Url::parse(DEFAULT_BASE_URL)?,
        };

        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("imgur-rest/{}", env!("CARGO_PKG_VERSION")));
        let user_agent = HeaderValue::try_from(user_agent)
            .map_err(|e| Error::Configuration(format!("Invalid user agent: {}", e)))?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => reqwest::Client::builder().build().map_err(|e| {
                Error::Configuration(format!("Failed to build HTTP client: {}", e))
            })?,
        };

        let requester_pool = match self.requester_pool {
            Some(handle) => ExecutionPool::from_handle(REQUESTER_POOL_NAME, handle),
            None => ExecutionPool::new(REQUESTER_POOL_NAME, self.requester_threads)?,
        };
        let callback_pool = match self.callback_pool {
            Some(handle) => ExecutionPool::from_handle(CALLBACK_POOL_NAME, handle),
            None => ExecutionPool::new(CALLBACK_POOL_NAME, DEFAULT_CALLBACK_THREADS)?,
        };

        let requester = Requester::new(
            http_client,
            base_url,
            credentials,
            user_agent,
            self.default_headers,
            self.request_timeout,
            self.retry,
        );
        tracing::debug!(requester = ?requester, "Built client");

        Ok(Client {
            inner: Arc::new(ClientInner {
                requester: Arc::new(requester),
                requester_pool: Arc::new(requester_pool),
                callback_pool: Arc::new(callback_pool),
                defaults: self.defaults,
                clock: self.clock,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
