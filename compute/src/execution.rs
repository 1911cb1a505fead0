//! Worker pools used by management clients to run operations off the
//! caller's thread.
//!
//! An [`ExecutionContext`] is a cheap, cloneable handle. Clients created by
//! the factory get a dedicated elastic pool; callers who want many clients
//! to share one pool build a context themselves and pass it in, keeping
//! ownership (and shutdown) on their side.

use futures_util::Future;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Handle, Runtime};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Idle blocking threads are reclaimed after this long.
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(60);
/// Upper bound on the elastic blocking thread set.
pub const DEFAULT_MAX_BLOCKING_THREADS: usize = 512;

/// Sizing and naming for pools created by the factory.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolSettings {
    /// Async worker threads; `None` uses the available parallelism.
    pub worker_threads: Option<usize>,
    /// Maximum number of blocking threads the pool may grow to.
    pub max_blocking_threads: usize,
    /// How long an idle blocking thread lingers before it is reclaimed.
    pub keep_alive: Duration,
    /// Prefix for the names of threads owned by the pool.
    pub thread_name: String,
    /// Cap on concurrently running async tasks; `None` means unbounded.
    pub max_concurrent_tasks: Option<usize>,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            worker_threads: None,
            max_blocking_threads: DEFAULT_MAX_BLOCKING_THREADS,
            keep_alive: DEFAULT_KEEP_ALIVE,
            thread_name: "compute-worker".to_string(),
            max_concurrent_tasks: None,
        }
    }
}

/// How an [`ExecutionContext`] obtained its threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    /// Owns a runtime whose blocking threads grow on demand.
    Elastic,
    /// Owns a runtime and caps concurrent async tasks at the given bound.
    Bounded(usize),
    /// Runs on a runtime owned by someone else.
    Borrowed,
}

struct ContextInner {
    id: Uuid,
    kind: ContextKind,
    handle: Handle,
    runtime: Option<Runtime>,
    limiter: Option<Arc<Semaphore>>,
    cancel_token: CancellationToken,
}

impl Drop for ContextInner {
    fn drop(&mut self) {
        self.cancel_token.cancel();
        if let Some(limiter) = &self.limiter {
            limiter.close();
        }
        // shutdown_background never blocks, so this is safe from async code.
        if let Some(runtime) = self.runtime.take() {
            log::debug!("Releasing execution context {}", self.id);
            runtime.shutdown_background();
        }
    }
}

/// Shared handle to a worker pool.
///
/// Clones refer to the same pool. An owned pool is released when the last
/// handle is dropped; [`ExecutionContext::shutdown`] stops it earlier.
#[derive(Clone)]
pub struct ExecutionContext {
    inner: Arc<ContextInner>,
}

impl ExecutionContext {
    /// Starts an elastic pool: blocking work grows the thread set up to
    /// `max_blocking_threads`, idle threads are reclaimed after `keep_alive`.
    pub fn elastic(settings: &PoolSettings) -> std::io::Result<Self> {
        let runtime = Self::build_runtime(settings)?;
        Ok(Self::owned(runtime, ContextKind::Elastic, None))
    }

    /// Starts a pool that runs at most `max_concurrent` async tasks at once.
    pub fn bounded(max_concurrent: usize, settings: &PoolSettings) -> std::io::Result<Self> {
        let max_concurrent = max_concurrent.max(1);
        let runtime = Self::build_runtime(settings)?;
        Ok(Self::owned(
            runtime,
            ContextKind::Bounded(max_concurrent),
            Some(Arc::new(Semaphore::new(max_concurrent))),
        ))
    }

    /// Picks [`ExecutionContext::bounded`] or [`ExecutionContext::elastic`]
    /// from `settings.max_concurrent_tasks`.
    pub fn from_settings(settings: &PoolSettings) -> std::io::Result<Self> {
        match settings.max_concurrent_tasks {
            Some(limit) => Self::bounded(limit, settings),
            None => Self::elastic(settings),
        }
    }

    /// Wraps a runtime the caller already owns. The caller keeps
    /// responsibility for shutting that runtime down.
    pub fn from_handle(handle: Handle) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                id: Uuid::new_v4(),
                kind: ContextKind::Borrowed,
                handle,
                runtime: None,
                limiter: None,
                cancel_token: CancellationToken::new(),
            }),
        }
    }

    /// Wraps the runtime of the calling task, if there is one.
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::from_handle)
    }

    fn build_runtime(settings: &PoolSettings) -> std::io::Result<Runtime> {
        let mut builder = tokio::runtime::Builder::new_multi_thread();
        builder
            .max_blocking_threads(settings.max_blocking_threads.max(1))
            .thread_keep_alive(settings.keep_alive)
            .thread_name(settings.thread_name.clone())
            .enable_all();
        if let Some(workers) = settings.worker_threads {
            builder.worker_threads(workers.max(1));
        }
        builder.build()
    }

    fn owned(runtime: Runtime, kind: ContextKind, limiter: Option<Arc<Semaphore>>) -> Self {
        let id = Uuid::new_v4();
        log::debug!("Started {kind:?} execution context {id}");
        Self {
            inner: Arc::new(ContextInner {
                id,
                kind,
                handle: runtime.handle().clone(),
                runtime: Some(runtime),
                limiter,
                cancel_token: CancellationToken::new(),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn kind(&self) -> ContextKind {
        self.inner.kind
    }

    /// `true` when this context owns its runtime rather than borrowing one.
    pub fn owns_runtime(&self) -> bool {
        self.inner.runtime.is_some()
    }

    pub fn handle(&self) -> &Handle {
        &self.inner.handle
    }

    /// `true` when both handles refer to the same pool.
    pub fn shares_pool_with(&self, other: &ExecutionContext) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Runs `future` on the pool.
    ///
    /// Resolves to `None` when the context is shut down before the future
    /// completes (or before a concurrency permit becomes available).
    pub fn spawn<F, T>(&self, future: F) -> JoinHandle<Option<T>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let limiter = self.inner.limiter.clone();
        let token = self.inner.cancel_token.clone();
        self.inner.handle.spawn(async move {
            let main = async {
                let _permit = match limiter {
                    Some(semaphore) => match semaphore.acquire_owned().await {
                        Ok(permit) => Some(permit),
                        Err(_) => return None,
                    },
                    None => None,
                };
                Some(future.await)
            };

            tokio::select! {
                biased;
                () = token.cancelled() => None,
                result = main => result,
            }
        })
    }

    /// Runs blocking work on the elastic thread set of the pool.
    pub fn spawn_blocking<F, R>(&self, func: F) -> JoinHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.inner.handle.spawn_blocking(func)
    }

    /// Drives `future` to completion on the pool from synchronous code.
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous execution context.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.inner.handle.block_on(future)
    }

    /// Cancels in-flight tasks and refuses new ones. Idempotent.
    ///
    /// Threads of an owned runtime are released once the last handle drops.
    pub fn shutdown(&self) {
        if !self.inner.cancel_token.is_cancelled() {
            log::debug!("Shutting down execution context {}", self.inner.id);
        }
        self.inner.cancel_token.cancel();
        if let Some(limiter) = &self.inner.limiter {
            limiter.close();
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.cancel_token.is_cancelled()
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}
