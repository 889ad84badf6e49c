//! In-flight requests.
//!
//! A [`PendingRequest`] is one execution of an [`Action`](crate::Action). It
//! completes exactly once: whichever of success, failure, cancellation or a
//! passed deadline comes first wins, and every later completion is a no-op.
//! The winning outcome is handed to the callback pool, never run on the
//! network thread.

use crate::action::Decoder;
use crate::body::RequestBody;
use crate::clock::Clock;
use crate::pool::ExecutionPool;
use crate::route::CompiledRoute;
use crate::{Error, Response, Result};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

/// Receives the single outcome of a request.
pub(crate) type Completion<T> = Box<dyn FnOnce(Result<T>) + Send>;

pub(crate) struct PendingRequest<T> {
    route: CompiledRoute,
    body: Option<RequestBody>,
    deadline: Option<SystemTime>,
    decoder: Decoder<T>,
    clock: Arc<dyn Clock>,
    callbacks: Arc<ExecutionPool>,
    completion: Mutex<Option<Completion<T>>>,
    done: AtomicBool,
    cancelled: AtomicBool,
}

impl<T: Send + 'static> PendingRequest<T> {
    pub(crate) fn new(
        route: CompiledRoute,
        body: Option<RequestBody>,
        deadline: Option<SystemTime>,
        decoder: Decoder<T>,
        clock: Arc<dyn Clock>,
        callbacks: Arc<ExecutionPool>,
        completion: Completion<T>,
    ) -> Self {
        Self {
            route,
            body,
            deadline,
            decoder,
            clock,
            callbacks,
            completion: Mutex::new(Some(completion)),
            done: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
        }
    }

    pub(crate) fn route(&self) -> &CompiledRoute {
        &self.route
    }

    pub(crate) fn body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }

    pub(crate) fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Checks the deadline and the cancellation flag before a network attempt.
    ///
    /// Returns `true`, after completing the request with
    /// [`Error::DeadlineExceeded`] or [`Error::Cancelled`], if the attempt must
    /// not be made.
    pub(crate) fn is_skipped(&self) -> bool {
        if self.is_timed_out() {
            tracing::warn!(route = %self.route, "Skipping request past its deadline");
            self.on_failure(Error::DeadlineExceeded);
            return true;
        }
        if self.is_cancelled() {
            tracing::warn!(route = %self.route, "Skipping cancelled request");
            self.on_failure(Error::Cancelled);
            return true;
        }
        // Completed elsewhere, e.g. cancelled through a handle mid-retry.
        self.is_done()
    }

    /// Requests cancellation and completes with [`Error::Cancelled`] unless
    /// the request already completed. An exchange already on the wire runs to
    /// completion, but its outcome is discarded.
    pub(crate) fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.on_failure(Error::Cancelled);
    }

    pub(crate) fn on_success(&self, value: T) {
        self.complete(Ok(value));
    }

    pub(crate) fn on_failure(&self, error: Error) {
        self.complete(Err(error));
    }

    /// Classifies a failed response into [`Error::ErrorResponse`].
    pub(crate) fn on_failure_response(&self, response: Response) {
        if self.is_done() {
            return;
        }
        self.on_failure(response.into_error());
    }

    /// Decodes a successful response, or fails with the classified error.
    pub(crate) fn handle_response(&self, response: Response) {
        if !response.is_ok() {
            return self.on_failure_response(response);
        }
        if self.is_done() {
            return;
        }
        match panic::catch_unwind(AssertUnwindSafe(|| (self.decoder)(&response))) {
            Ok(Ok(value)) => self.on_success(value),
            Ok(Err(e)) => {
                tracing::warn!(route = %self.route, error = %e, "Failed to decode response");
                self.on_failure(e);
            }
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                tracing::error!(route = %self.route, panic = %reason, "Decoder panicked");
                let error = response
                    .decode_error(&response.string(), &format!("decoder panicked: {reason}"));
                self.on_failure(error);
            }
        }
    }

    fn is_timed_out(&self) -> bool {
        self.deadline
            .is_some_and(|deadline| deadline < self.clock.now())
    }

    fn complete(&self, outcome: Result<T>) {
        if self.done.swap(true, Ordering::AcqRel) {
            return;
        }
        let completion = match self.completion.lock() {
            Ok(mut completion) => completion.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(completion) = completion else {
            return;
        };

        let label = if outcome.is_ok() { "success" } else { "failure" };
        let callbacks = self.callbacks.clone();
        self.callbacks.dispatch(label, move || {
            completion(outcome);
            drop(callbacks);
        });
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

impl<T> fmt::Debug for PendingRequest<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingRequest")
            .field("route", &self.route)
            .field("deadline", &self.deadline)
            .field("done", &self.done.load(Ordering::Relaxed))
            .field("cancelled", &self.cancelled.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Type-erased control over a [`PendingRequest`].
trait Cancel: Send + Sync {
    fn cancel(&self);
    fn is_done(&self) -> bool;
}

impl<T: Send + 'static> Cancel for PendingRequest<T> {
    fn cancel(&self) {
        PendingRequest::cancel(self)
    }

    fn is_done(&self) -> bool {
        PendingRequest::is_done(self)
    }
}

/// A handle to a queued request.
///
/// Cancellation is cooperative: it takes effect at the next attempt boundary,
/// and an exchange already on the wire is not interrupted. The failure
/// continuation receives [`Error::Cancelled`] unless the request completed
/// first.
#[derive(Clone)]
pub struct RequestHandle {
    request: Arc<dyn Cancel>,
}

impl RequestHandle {
    pub(crate) fn new<T: Send + 'static>(request: Arc<PendingRequest<T>>) -> Self {
        Self { request }
    }

    pub fn cancel(&self) {
        self.request.cancel();
    }

    /// Returns `true` once an outcome has been decided.
    pub fn is_done(&self) -> bool {
        self.request.is_done()
    }
}

impl fmt::Debug for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandle")
            .field("done", &self.is_done())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::routes::image;
    use http::{HeaderMap, StatusCode};
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn pending(
        deadline: Option<SystemTime>,
        clock: Arc<dyn Clock>,
    ) -> (Arc<PendingRequest<String>>, mpsc::Receiver<Result<String>>) {
        let callbacks = Arc::new(ExecutionPool::new("test-callback", 1).unwrap());
        let (tx, rx) = mpsc::channel();
        let decoder: Decoder<String> = Arc::new(|response: &Response| response.data::<String>());
        let request = PendingRequest::new(
            image::GET_IMAGE.compile(&["abc"]).unwrap(),
            None,
            deadline,
            decoder,
            clock,
            callbacks,
            Box::new(move |outcome| {
                let _ = tx.send(outcome);
            }),
        );
        (Arc::new(request), rx)
    }

    #[test]
    fn test_exactly_one_outcome_under_contention() {
        for _ in 0..50 {
            let (request, rx) = pending(None, Arc::new(ManualClock::default()));
            let winners = Arc::new(AtomicUsize::new(0));

            let threads: Vec<_> = (0..3)
                .map(|i| {
                    let request = request.clone();
                    thread::spawn(move || match i {
                        0 => request.on_success("ok".to_string()),
                        1 => request.on_failure(Error::Timeout),
                        _ => request.cancel(),
                    })
                })
                .collect();
            for t in threads {
                t.join().unwrap();
            }

            while rx.recv_timeout(Duration::from_millis(200)).is_ok() {
                winners.fetch_add(1, Ordering::SeqCst);
            }
            assert_eq!(winners.load(Ordering::SeqCst), 1);
            assert!(request.is_done());
        }
    }

    #[test]
    fn test_later_completions_are_ignored() {
        let (request, rx) = pending(None, Arc::new(ManualClock::default()));

        request.on_failure(Error::Cancelled);
        request.on_success("late".to_string());
        request.cancel();

        let outcome = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(outcome, Err(Error::Cancelled)));
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_skip_check_reports_deadline() {
        let clock = ManualClock::default();
        let deadline = clock.now() + Duration::from_secs(5);
        let (request, rx) = pending(Some(deadline), Arc::new(clock.clone()));

        assert!(!request.is_skipped());
        clock.advance(Duration::from_secs(6));
        assert!(request.is_skipped());

        let outcome = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(outcome, Err(Error::DeadlineExceeded)));
    }

    #[test]
    fn test_skip_check_reports_cancellation() {
        let (request, rx) = pending(None, Arc::new(ManualClock::default()));

        request.cancel();
        assert!(request.is_skipped());
        assert!(matches!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            Err(Error::Cancelled)
        ));
    }

    #[test]
    fn test_handle_response_decodes_or_classifies() {
        let (request, rx) = pending(None, Arc::new(ManualClock::default()));
        request.handle_response(Response::new(
            StatusCode::OK,
            HeaderMap::new(),
            r#"{"data":"hello"}"#,
        ));
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap(),
            "hello"
        );

        let (request, rx) = pending(None, Arc::new(ManualClock::default()));
        request.handle_response(Response::new(
            StatusCode::NOT_FOUND,
            HeaderMap::new(),
            r#"{"data":{"error":"Unable to find an image with the id, abc"}}"#,
        ));
        match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
            Err(Error::ErrorResponse { code, message, .. }) => {
                assert_eq!(code, 404);
                assert!(message.contains("Unable to find"));
            }
            other => panic!("unexpected {other:?}"),
        }

        let (request, rx) = pending(None, Arc::new(ManualClock::default()));
        request.handle_response(Response::new(StatusCode::OK, HeaderMap::new(), "not json"));
        assert!(matches!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            Err(Error::DeserializationFailed { .. })
        ));
    }

    #[test]
    fn test_decoder_panic_fails_the_request() {
        let callbacks = Arc::new(ExecutionPool::new("test-callback", 1).unwrap());
        let (tx, rx) = mpsc::channel();
        let decoder: Decoder<String> =
            Arc::new(|_: &Response| -> Result<String> { panic!("bad decoder") });
        let request = PendingRequest::new(
            image::GET_IMAGE.compile(&["abc"]).unwrap(),
            None,
            None,
            decoder,
            Arc::new(ManualClock::default()),
            callbacks,
            Box::new(move |outcome| {
                let _ = tx.send(outcome);
            }),
        );

        request.handle_response(Response::new(StatusCode::OK, HeaderMap::new(), r#"{"data":"x"}"#));

        match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
            Err(Error::DeserializationFailed { serde_error, status, .. }) => {
                assert!(serde_error.contains("bad decoder"));
                assert_eq!(status, StatusCode::OK);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(request.is_done());
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }
}
