//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. When any dependency changes, the effect is scheduled on its own
//!    throttle. Several changes in one tick produce one run.
//!
//! 3. Before re-running, the effect cancels its old registrations and tracks
//!    new ones during execution.
//!
//! # Use Cases
//!
//! Effects synchronize reactive state with the outside world:
//!
//! - Rendering when state changes
//! - Logging state changes
//! - Pushing values into channels or sockets
//!
//! # Differences from Computed
//!
//! - Computed values store a result; effects do not.
//! - Computed values suppress unchanged results; effects run on every
//!   scheduled tick.
//!
//! # Lifetime
//!
//! An effect lives as long as a handle to it. Dropping the last clone, or
//! calling [`Effect::dispose`], cancels every registration it holds.

use std::convert::Infallible;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use super::cancel::CancelHandle;
use super::node::{Node, NodeKind, Reactive};
use super::runtime::Runtime;
use crate::error::{BoxError, ReactiveError, Result};
use crate::scheduler::Granularity;

type PerformFn = Box<dyn Fn() -> std::result::Result<(), BoxError> + Send + Sync>;

struct EffectInner {
    node: Arc<Node>,
    perform: PerformFn,
    run_count: AtomicUsize,
}

impl Reactive for EffectInner {
    fn run(&self) -> Result<()> {
        let outcome = self.node.track(|| (self.perform)());
        self.run_count.fetch_add(1, Ordering::SeqCst);
        outcome.map_err(|source| {
            ReactiveError::compute(self.node.kind().as_str(), self.node.id(), source)
        })
    }
}

impl Drop for EffectInner {
    fn drop(&mut self) {
        self.node.dispose();
    }
}

/// A side-effecting computation that runs when dependencies change.
///
/// # Example
///
/// ```rust
/// use ripple_core::reactive::{Effect, Runtime, Signal};
/// use std::sync::{Arc, Mutex};
///
/// let rt = Runtime::new();
/// let count = Signal::new(&rt, 0);
/// let log = Arc::new(Mutex::new(Vec::new()));
///
/// let _effect = Effect::new(&rt, {
///     let count = count.clone();
///     let log = log.clone();
///     move || log.lock().unwrap().push(count.get())
/// });
///
/// count.set(1);
/// count.set(2);
/// rt.flush().unwrap();
/// assert_eq!(*log.lock().unwrap(), vec![0, 2]);
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Arc<EffectInner>,
}

impl Effect {
    /// Create a new effect with the given function.
    ///
    /// The function runs immediately to establish initial dependencies.
    pub fn new<F>(runtime: &Runtime, perform: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::with_granularity(runtime, runtime.default_granularity(), perform)
    }

    /// Create an effect whose re-runs are paced at `granularity`.
    pub fn with_granularity<F>(runtime: &Runtime, granularity: Granularity, perform: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let node = Node::new(runtime, granularity, NodeKind::Effect);
        let perform = move || {
            perform();
            Ok::<(), Infallible>(())
        };
        match Self::build(node, perform, true) {
            Ok(effect) => effect,
            Err(never) => match never {},
        }
    }

    /// Create an effect from a fallible function.
    ///
    /// Returns the error if the first run fails; nothing stays subscribed in
    /// that case.
    pub fn try_new<F, E>(runtime: &Runtime, perform: F) -> Result<Self>
    where
        F: Fn() -> std::result::Result<(), E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        Self::try_with_granularity(runtime, runtime.default_granularity(), perform)
    }

    /// Fallible [`with_granularity`](Self::with_granularity).
    pub fn try_with_granularity<F, E>(
        runtime: &Runtime,
        granularity: Granularity,
        perform: F,
    ) -> Result<Self>
    where
        F: Fn() -> std::result::Result<(), E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        let node = Node::new(runtime, granularity, NodeKind::Effect);
        let id = node.id();
        Self::build(node, perform, true)
            .map_err(|err| ReactiveError::compute(NodeKind::Effect.as_str(), id, err.into()))
    }

    /// Create a new effect without running it.
    ///
    /// It has no dependencies until [`execute`](Self::execute) or
    /// [`schedule`](Self::schedule) runs it for the first time.
    pub fn new_lazy<F>(runtime: &Runtime, perform: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::lazy_with_granularity(runtime, runtime.default_granularity(), perform)
    }

    /// A lazy effect whose re-runs are paced at `granularity`.
    pub fn lazy_with_granularity<F>(runtime: &Runtime, granularity: Granularity, perform: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let node = Node::new(runtime, granularity, NodeKind::Effect);
        let perform = move || {
            perform();
            Ok::<(), Infallible>(())
        };
        match Self::build(node, perform, false) {
            Ok(effect) => effect,
            Err(never) => match never {},
        }
    }

    fn build<F, E>(node: Arc<Node>, perform: F, eager: bool) -> std::result::Result<Self, E>
    where
        F: Fn() -> std::result::Result<(), E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        let mut runs = 0;
        if eager {
            if let Err(err) = node.track(&perform) {
                node.dispose();
                return Err(err);
            }
            runs = 1;
        }

        let inner = Arc::new(EffectInner {
            node: node.clone(),
            perform: Box::new(move || perform().map_err(Into::into)),
            run_count: AtomicUsize::new(runs),
        });

        let target: Weak<dyn Reactive> = Arc::<EffectInner>::downgrade(&inner);
        node.bind(target);
        Ok(Self { inner })
    }

    /// Get the effect's unique ID.
    pub fn id(&self) -> u64 {
        self.inner.node.id()
    }

    /// Run the effect now, re-establishing its dependencies.
    ///
    /// Does nothing once the effect is disposed.
    pub fn execute(&self) -> Result<()> {
        if self.inner.node.is_disposed() {
            return Ok(());
        }
        self.inner.run()
    }

    /// Queue a run for the next tick.
    pub fn schedule(&self) {
        self.inner.node.schedule();
    }

    /// Dispose of the effect.
    ///
    /// Its registrations are cancelled and a run already queued is skipped.
    pub fn dispose(&self) {
        self.inner.node.dispose();
    }

    /// A handle that disposes this effect when cancelled.
    ///
    /// The handle does not keep the effect alive.
    pub fn cancel_handle(&self) -> CancelHandle {
        let node: Weak<Node> = Arc::downgrade(&self.inner.node);
        CancelHandle::new(move || {
            if let Some(node) = node.upgrade() {
                node.dispose();
            }
        })
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.node.is_disposed()
    }

    /// Whether a run is queued.
    pub fn is_pending(&self) -> bool {
        self.inner.node.is_pending()
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }

    /// Get the number of dependencies from the most recent run.
    pub fn dependency_count(&self) -> usize {
        self.inner.node.dependency_count()
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Signal;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn effect_runs_on_creation() {
        let rt = Runtime::new();
        let run_count = Arc::new(AtomicI32::new(0));
        let run_count_clone = run_count.clone();

        let _effect = Effect::new(&rt, move || {
            run_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        // Effect should have run once on creation
        assert_eq!(run_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn effect_lazy_does_not_run_on_creation() {
        let rt = Runtime::new();
        let run_count = Arc::new(AtomicI32::new(0));
        let run_count_clone = run_count.clone();

        let effect = Effect::new_lazy(&rt, move || {
            run_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(run_count.load(Ordering::SeqCst), 0);
        assert_eq!(effect.run_count(), 0);

        effect.execute().unwrap();
        assert_eq!(run_count.load(Ordering::SeqCst), 1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn lazy_effect_honours_granularity() {
        let rt = Runtime::new();
        let source = Signal::new(&rt, 0);
        let effect = Effect::lazy_with_granularity(&rt, Granularity::Frame, {
            let source = source.clone();
            move || {
                source.get();
            }
        });
        effect.execute().unwrap();

        source.set(1);
        rt.flush().unwrap();
        assert_eq!(effect.run_count(), 1);

        rt.advance_frame().unwrap();
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn fallible_effect_honours_granularity() {
        let rt = Runtime::new();
        let source = Signal::new(&rt, 0);
        let effect = Effect::try_with_granularity(&rt, Granularity::Frame, {
            let source = source.clone();
            move || {
                source.get();
                Ok::<(), &'static str>(())
            }
        })
        .unwrap();

        source.set(1);
        rt.flush().unwrap();
        assert!(effect.is_pending());
        assert_eq!(effect.run_count(), 1);

        rt.advance_frame().unwrap();
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn effect_schedule_runs_on_flush() {
        let rt = Runtime::new();
        let effect = Effect::new(&rt, || {});

        effect.schedule();
        effect.schedule();
        assert_eq!(effect.run_count(), 1);
        assert!(effect.is_pending());

        rt.flush().unwrap();
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn effect_batches_writes_and_sees_last_value() {
        let rt = Runtime::new();
        let source = Signal::new(&rt, 0);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let effect = Effect::new(&rt, {
            let source = source.clone();
            let seen = seen.clone();
            move || seen.lock().push(source.get())
        });

        source.set(1);
        source.set(2);
        source.set(3);
        // Nothing runs inside the writes.
        assert_eq!(*seen.lock(), vec![0]);

        rt.flush().unwrap();
        assert_eq!(*seen.lock(), vec![0, 3]);
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn effect_does_not_run_after_disposal() {
        let rt = Runtime::new();
        let source = Signal::new(&rt, 0);
        let effect = Effect::new(&rt, {
            let source = source.clone();
            move || {
                source.get();
            }
        });
        assert_eq!(source.subscriber_count(), 1);

        source.set(1);
        effect.dispose();
        assert!(effect.is_disposed());
        assert_eq!(source.subscriber_count(), 0);

        // The run queued before disposal is skipped.
        rt.flush().unwrap();
        assert_eq!(effect.run_count(), 1);

        effect.execute().unwrap();
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn cancel_handle_disposes_without_owning() {
        let rt = Runtime::new();
        let source = Signal::new(&rt, 0);
        let effect = Effect::new(&rt, {
            let source = source.clone();
            move || {
                source.get();
            }
        });

        let handle = effect.cancel_handle();
        handle.cancel();
        handle.cancel();
        assert!(effect.is_disposed());
        assert_eq!(source.subscriber_count(), 0);

        drop(effect);
        CancelHandle::clone(&handle).cancel();
    }

    #[test]
    fn dropping_effect_disposes_it() {
        let rt = Runtime::new();
        let source = Signal::new(&rt, 0);
        let effect = Effect::new(&rt, {
            let source = source.clone();
            move || {
                source.get();
            }
        });
        assert_eq!(source.subscriber_count(), 1);

        drop(effect);
        assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn try_new_failure_propagates() {
        let rt = Runtime::new();
        let source = Signal::new(&rt, -1);

        let result = Effect::try_new(&rt, {
            let source = source.clone();
            move || {
                if source.get() < 0 {
                    Err("negative")
                } else {
                    Ok(())
                }
            }
        });

        assert!(matches!(result, Err(ReactiveError::Compute { kind: "effect", .. })));
        assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn failed_rerun_is_retried_on_next_change() {
        let rt = Runtime::new();
        let source = Signal::new(&rt, 1);
        let effect = Effect::try_new(&rt, {
            let source = source.clone();
            move || {
                if source.get() < 0 {
                    Err("negative")
                } else {
                    Ok(())
                }
            }
        })
        .unwrap();

        source.set(-1);
        assert!(rt.flush().unwrap_err().is_compute());
        assert_eq!(effect.dependency_count(), 1);

        source.set(2);
        rt.flush().unwrap();
        assert_eq!(effect.run_count(), 3);
    }

    #[test]
    fn effect_tracks_run_count() {
        let rt = Runtime::new();
        let effect = Effect::new(&rt, || {});

        assert_eq!(effect.run_count(), 1);

        effect.execute().unwrap();
        assert_eq!(effect.run_count(), 2);

        effect.execute().unwrap();
        assert_eq!(effect.run_count(), 3);
    }

    #[test]
    fn effect_clone_shares_state() {
        let rt = Runtime::new();
        let effect1 = Effect::new(&rt, || {});
        let effect2 = effect1.clone();

        assert_eq!(effect1.id(), effect2.id());

        effect1.execute().unwrap();
        assert_eq!(effect1.run_count(), 2);
        assert_eq!(effect2.run_count(), 2);

        effect1.dispose();
        assert!(effect2.is_disposed());
    }
}
