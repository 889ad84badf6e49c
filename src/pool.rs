//! Execution contexts for network work and caller continuations.
//!
//! A client runs on two independent pools: the requester pool performs the
//! network exchanges and retry sleeps, the callback pool runs the caller's
//! success/failure continuations. A slow continuation therefore never holds a
//! network worker, and caller code never runs on one.

use crate::{Error, Result};
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::runtime::{Builder, Handle, Runtime};

/// One execution context, backed by a tokio runtime.
///
/// The pool either owns a dedicated runtime or borrows a caller-supplied
/// [`Handle`]. Shutdown is cooperative: [`ExecutionPool::shutdown`] rejects
/// new submissions while admitted work finishes;
/// [`ExecutionPool::shutdown_now`] also stops an owned runtime.
#[derive(Debug)]
pub struct ExecutionPool {
    name: String,
    handle: Handle,
    owned: Mutex<Option<Runtime>>,
    shutdown: AtomicBool,
}

impl ExecutionPool {
    /// Creates a pool with its own multi-threaded runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the runtime cannot be started.
    pub fn new(name: impl Into<String>, workers: usize) -> Result<Self> {
        let name = name.into();
        let runtime = Builder::new_multi_thread()
            .worker_threads(workers.max(1))
            .thread_name(name.clone())
            .enable_all()
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to start {name} pool: {e}")))?;

        Ok(Self {
            name,
            handle: runtime.handle().clone(),
            owned: Mutex::new(Some(runtime)),
            shutdown: AtomicBool::new(false),
        })
    }

    /// Wraps an existing runtime. The pool never stops a runtime it does not own.
    pub fn from_handle(name: impl Into<String>, handle: Handle) -> Self {
        Self {
            name: name.into(),
            handle,
            owned: Mutex::new(None),
            shutdown: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Stops admitting new work. Already admitted work runs to completion.
    pub fn shutdown(&self) {
        if !self.shutdown.swap(true, Ordering::AcqRel) {
            tracing::debug!(pool = %self.name, "Execution pool shut down");
        }
    }

    /// Stops admitting new work and stops an owned runtime without waiting
    /// for admitted work.
    pub fn shutdown_now(&self) {
        self.shutdown();
        if let Some(runtime) = self.take_runtime() {
            runtime.shutdown_background();
        }
    }

    /// Spawns a future on this pool.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rejected`] if the pool has been shut down.
    pub fn spawn<F>(&self, future: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_shutdown() {
            return Err(Error::Rejected(format!(
                "The {} pool has been stopped! No new requests can be submitted!",
                self.name
            )));
        }
        self.handle.spawn(future);
        Ok(())
    }

    /// Runs a continuation on this pool's blocking threads.
    ///
    /// Continuations of admitted requests are dispatched even after
    /// [`ExecutionPool::shutdown`]. A panic escaping the continuation is
    /// logged and then resumed on the pool thread, where tokio contains it.
    pub(crate) fn dispatch<F>(&self, label: &'static str, continuation: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let pool = self.name.clone();
        self.handle.spawn_blocking(move || {
            if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(continuation)) {
                tracing::error!(
                    pool = %pool,
                    continuation = label,
                    "Encountered panic while processing continuation"
                );
                panic::resume_unwind(panic);
            }
        });
    }

    fn take_runtime(&self) -> Option<Runtime> {
        match self.owned.lock() {
            Ok(mut owned) => owned.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

impl Drop for ExecutionPool {
    fn drop(&mut self) {
        // Safe in async contexts, including on one of this runtime's own
        // workers when an in-flight request held the last reference.
        if let Some(runtime) = self.take_runtime() {
            runtime.shutdown_background();
        }
    }
}
