//! Actions: the public unit of work.
//!
//! An [`Action`] describes one call (a compiled route, an optional body and a
//! decoder) and does nothing until it is triggered. It can be triggered in
//! three ways, all fed by the same exactly-once request machinery:
//!
//! * [`Action::queue`] / [`Action::queue_with`]: fire and forget, with
//!   continuations run on the callback pool.
//! * [`Action::submit`]: returns a [`RestFuture`] that resolves once.
//! * [`Action::complete`]: blocks the calling thread until the outcome is known.
//!
//! Retries never surface here; they are internal to the
//! [`Requester`](crate::requester::Requester).

use crate::body::RequestBody;
use crate::request::{Completion, PendingRequest, RequestHandle};
use crate::route::CompiledRoute;
use crate::{Client, Error, Response, Result};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::oneshot;

/// Turns a successful [`Response`] into a typed value.
pub type Decoder<T> = Arc<dyn Fn(&Response) -> Result<T> + Send + Sync>;

/// A triggerable request producing a `T`.
///
/// # Examples
///
/// ```no_run
/// use imgur_rest::{routes::image, Client};
/// use serde::Deserialize;
/// use std::time::Duration;
///
/// #[derive(Debug, Deserialize)]
/// struct Image {
///     id: String,
///     link: String,
/// }
///
/// # async fn example() -> Result<(), imgur_rest::Error> {
/// let client = Client::builder().client_id("my-client-id").build()?;
///
/// let action = client
///     .action(image::GET_IMAGE.compile(&["aBc12"])?, |res| res.data::<Image>())
///     .timeout(Duration::from_secs(10));
///
/// // Future-returning
/// let image = action.submit().await?;
/// println!("{}", image.link);
///
/// // Fire and forget
/// action.queue_with(
///     |image| println!("got {}", image.id),
///     |error| eprintln!("failed: {error}"),
/// )?;
/// # Ok(())
/// # }
/// ```
pub struct Action<T> {
    client: Client,
    route: CompiledRoute,
    body: Option<RequestBody>,
    decoder: Decoder<T>,
    deadline: Option<SystemTime>,
}

impl<T: Send + 'static> Action<T> {
    pub(crate) fn new(
        client: Client,
        route: CompiledRoute,
        body: Option<RequestBody>,
        decoder: Decoder<T>,
    ) -> Self {
        Self {
            client,
            route,
            body,
            decoder,
            deadline: None,
        }
    }

    pub fn route(&self) -> &CompiledRoute {
        &self.route
    }

    pub fn body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }

    /// The absolute completion deadline, if any.
    pub fn get_deadline(&self) -> Option<SystemTime> {
        self.deadline
    }

    /// Sets a completion deadline `timeout` from now.
    ///
    /// The deadline is fixed immediately, so time spent before the action is
    /// triggered or waiting in the requester queue counts against it. A zero
    /// timeout removes the deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.deadline = if timeout.is_zero() {
            None
        } else {
            Some(self.client.clock().now() + timeout)
        };
        self
    }

    /// Sets an absolute completion deadline. `UNIX_EPOCH` removes the deadline.
    pub fn deadline(mut self, at: SystemTime) -> Self {
        self.deadline = (at != UNIX_EPOCH).then_some(at);
        self
    }

    /// Queues the action with the client's default continuations.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rejected`] if the requester pool has been shut down.
    pub fn queue(&self) -> Result<RequestHandle> {
        let defaults = self.client.defaults();
        let on_success = defaults.on_success.clone();
        let on_failure = defaults.on_failure.clone();
        self.enqueue(Box::new(move |outcome| match outcome {
            Ok(value) => on_success(&value),
            Err(error) => on_failure(&error),
        }))
    }

    /// Queues the action with a success continuation and the client's default
    /// failure continuation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rejected`] if the requester pool has been shut down.
    pub fn queue_success<S>(&self, success: S) -> Result<RequestHandle>
    where
        S: FnOnce(T) + Send + 'static,
    {
        let on_failure = self.client.defaults().on_failure.clone();
        self.queue_with(success, move |error| on_failure(&error))
    }

    /// Queues the action with both continuations.
    ///
    /// Exactly one of them runs, on the callback pool.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rejected`] if the requester pool has been shut down.
    pub fn queue_with<S, F>(&self, success: S, failure: F) -> Result<RequestHandle>
    where
        S: FnOnce(T) + Send + 'static,
        F: FnOnce(Error) + Send + 'static,
    {
        self.enqueue(Box::new(move |outcome| match outcome {
            Ok(value) => success(value),
            Err(error) => failure(error),
        }))
    }

    /// Triggers the action and returns a future of its outcome.
    ///
    /// A rejected submission resolves to [`Error::Rejected`].
    pub fn submit(&self) -> RestFuture<T> {
        let (tx, rx) = oneshot::channel();
        let submitted = self.enqueue(Box::new(move |outcome| {
            // The receiver may have been dropped; nobody is waiting then.
            let _ = tx.send(outcome);
        }));

        match submitted {
            Ok(handle) => RestFuture {
                state: FutureState::Pending { rx, handle },
            },
            Err(error) => RestFuture {
                state: FutureState::Failed(Some(error)),
            },
        }
    }

    /// Triggers the action and blocks until it completes.
    ///
    /// The failure is returned as-is, not wrapped.
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context; use
    /// [`Action::submit`] there.
    pub fn complete(&self) -> Result<T> {
        self.submit().wait()
    }

    fn effective_deadline(&self) -> Option<SystemTime> {
        self.deadline.or_else(|| {
            self.client
                .defaults()
                .timeout
                .filter(|timeout| !timeout.is_zero())
                .map(|timeout| self.client.clock().now() + timeout)
        })
    }

    fn enqueue(&self, completion: Completion<T>) -> Result<RequestHandle> {
        let pool = self.client.requester_pool();
        if pool.is_shutdown() {
            return Err(Error::Rejected(
                "The requester has been stopped! No new requests can be requested!".to_string(),
            ));
        }

        let request = Arc::new(PendingRequest::new(
            self.route.clone(),
            self.body.clone(),
            self.effective_deadline(),
            self.decoder.clone(),
            self.client.clock().clone(),
            self.client.callback_pool().clone(),
            completion,
        ));
        let handle = RequestHandle::new(request.clone());
        let requester = self.client.requester().clone();
        // The runtime outlives the client while admitted work is in flight.
        let runtime = pool.clone();

        tracing::debug!(route = %self.route, "Queueing request");
        pool.spawn(async move {
            requester.execute(&request).await;
            drop(runtime);
        })?;
        Ok(handle)
    }
}

impl<T> Clone for Action<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            route: self.route.clone(),
            body: self.body.clone(),
            decoder: self.decoder.clone(),
            deadline: self.deadline,
        }
    }
}

impl<T> fmt::Debug for Action<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("route", &self.route)
            .field("body", &self.body)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

enum FutureState<T> {
    Pending {
        rx: oneshot::Receiver<Result<T>>,
        handle: RequestHandle,
    },
    Failed(Option<Error>),
}

/// The outcome of a submitted [`Action`]. Resolves exactly once.
///
/// Dropping the future does not cancel the request; call
/// [`RestFuture::cancel`] for that.
pub struct RestFuture<T> {
    state: FutureState<T>,
}

impl<T> RestFuture<T> {
    /// Cooperatively cancels the request. The future resolves to
    /// [`Error::Cancelled`] unless the request already completed.
    pub fn cancel(&self) {
        if let FutureState::Pending { handle, .. } = &self.state {
            handle.cancel();
        }
    }

    /// The underlying request handle, unless submission was rejected.
    pub fn handle(&self) -> Option<&RequestHandle> {
        match &self.state {
            FutureState::Pending { handle, .. } => Some(handle),
            FutureState::Failed(_) => None,
        }
    }

    fn wait(self) -> Result<T> {
        match self.state {
            FutureState::Pending { rx, .. } => rx.blocking_recv().unwrap_or_else(|_| Err(dropped())),
            FutureState::Failed(error) => Err(error.unwrap_or_else(dropped)),
        }
    }
}

fn dropped() -> Error {
    Error::Rejected("the request was dropped before it completed".to_string())
}

// Never pin-projected.
impl<T> Unpin for RestFuture<T> {}

impl<T> Future for RestFuture<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            FutureState::Pending { rx, .. } => Pin::new(rx)
                .poll(cx)
                .map(|received| received.unwrap_or_else(|_| Err(dropped()))),
            FutureState::Failed(error) => Poll::Ready(Err(error.take().unwrap_or_else(dropped))),
        }
    }
}

impl<T> fmt::Debug for RestFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            FutureState::Pending { .. } => "pending",
            FutureState::Failed(_) => "failed",
        };
        f.debug_struct("RestFuture").field("state", &state).finish()
    }
}
