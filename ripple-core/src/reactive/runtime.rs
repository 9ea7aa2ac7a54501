//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals, computed
//! values and effects. It owns the two pieces of shared state the engine
//! needs: the tracking stack and the event-loop task queues.
//!
//! # How It Works
//!
//! 1. A computation runs inside [`Runtime::with_tracking`], which pushes its
//!    subscriber onto the tracking stack.
//!
//! 2. Every signal read during that run registers the subscriber with the
//!    signal and records a cancel handle for the registration.
//!
//! 3. When a signal is written, its subscribers are notified. Each one only
//!    schedules work through its throttle, which enqueues a task here.
//!
//! 4. The host drains the queue with [`Runtime::flush`] (microtasks) or
//!    [`Runtime::advance_frame`] (frame tasks). Recomputations run then,
//!    never inside the write.
//!
//! # Ownership
//!
//! `Runtime` is a cheap handle; clones share state. Primitives keep a clone,
//! so the runtime lives as long as anything built on it.

use std::fmt;
use std::sync::Arc;

use super::context::{Dependencies, ReactiveContext, TrackingStack};
use super::cancel::CancelHandle;
use super::subscriber::Subscriber;
use crate::config::RuntimeConfig;
use crate::error::Result;
use crate::scheduler::{Granularity, Task, TaskQueue};

struct RuntimeInner {
    config: RuntimeConfig,
    tracking: TrackingStack,
    tasks: TaskQueue,
}

/// Handle to a reactive runtime.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl Runtime {
    /// Create a runtime with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a runtime with the given configuration.
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                config,
                tracking: TrackingStack::default(),
                tasks: TaskQueue::default(),
            }),
        }
    }

    /// The configuration this runtime was built with.
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Granularity for primitives constructed without an explicit one.
    pub fn default_granularity(&self) -> Granularity {
        self.inner.config.default_granularity
    }

    // ------------------------------------------------------------------
    // Tracking
    // ------------------------------------------------------------------

    /// Run `f` with `subscriber` as the current listener.
    ///
    /// Returns `f`'s result together with the cancel handles of every
    /// registration made while it ran. Reads made by nested tracked runs are
    /// attributed to the innermost subscriber only.
    pub fn with_tracking<R, F>(&self, subscriber: Arc<Subscriber>, f: F) -> (R, Dependencies)
    where
        F: FnOnce() -> R,
    {
        let ctx = ReactiveContext::enter(&self.inner.tracking, Some(subscriber));
        let result = f();
        (result, ctx.finish())
    }

    /// Run `f` without attributing its reads to any listener.
    pub fn untracked<R, F>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let ctx = ReactiveContext::enter(&self.inner.tracking, None);
        let result = f();
        ctx.finish();
        result
    }

    /// The listener on top of the tracking stack, if any.
    pub fn current_subscriber(&self) -> Option<Arc<Subscriber>> {
        self.inner.tracking.current_subscriber()
    }

    /// Whether reads are currently being attributed to a listener.
    pub fn is_tracking(&self) -> bool {
        self.current_subscriber().is_some()
    }

    pub(crate) fn track_dependency(&self, handle: CancelHandle) {
        self.inner.tracking.track_dependency(handle);
    }

    // ------------------------------------------------------------------
    // Event loop
    // ------------------------------------------------------------------

    pub(crate) fn enqueue(&self, granularity: Granularity, task: Task) {
        self.inner.tasks.push(granularity, task);
    }

    /// Run queued microtasks until none are left.
    ///
    /// Returns how many tasks ran. The first failing task stops the flush and
    /// its error is returned; tasks still queued run on the next flush.
    pub fn flush(&self) -> Result<usize> {
        let limit = self.inner.config.max_tasks_per_flush;
        match self.inner.tasks.drain_microtasks(limit) {
            Ok(ran) => {
                if ran > 0 {
                    tracing::debug!(ran, "flushed microtasks");
                }
                Ok(ran)
            }
            Err(err) => {
                tracing::warn!(error = %err, pending = self.pending_tasks(), "flush aborted");
                Err(err)
            }
        }
    }

    /// Run the frame tasks queued so far, then flush microtasks.
    pub fn advance_frame(&self) -> Result<usize> {
        let frame = self.inner.tasks.run_frame().map_err(|err| {
            tracing::warn!(error = %err, "frame aborted");
            err
        })?;
        tracing::trace!(ran = frame, "ran frame tasks");
        Ok(frame + self.flush()?)
    }

    /// Number of tasks waiting in either queue.
    pub fn pending_tasks(&self) -> usize {
        self.inner.tasks.len()
    }

    /// True when no work is queued.
    pub fn is_idle(&self) -> bool {
        self.pending_tasks() == 0
    }

    /// Whether two handles refer to the same runtime.
    pub fn ptr_eq(&self, other: &Runtime) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.inner.config)
            .field("tracking_depth", &self.inner.tracking.depth())
            .field("pending_tasks", &self.pending_tasks())
            .finish()
    }
}
