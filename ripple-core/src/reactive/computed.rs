//! Computed Implementation
//!
//! A Computed is a derived value produced by re-running a pure function
//! under tracking.
//!
//! # How Computed Values Work
//!
//! 1. On construction, the function runs once inside a tracked scope whose
//!    listener is the computed's own throttled recompute job. The result
//!    becomes the initial value.
//!
//! 2. When any signal read during the last run changes, the recompute job
//!    is scheduled. Several changes in one tick coalesce into one run.
//!
//! 3. Each run starts from a fresh scope: all previous registrations are
//!    cancelled and rebuilt from what this run reads. Branches that stop
//!    reading a signal stop depending on it.
//!
//! 4. If the new value equals the stored one, nothing downstream is
//!    notified, so unchanged results stop propagation.
//!
//! # Failures
//!
//! A fallible computation that errors keeps its last good value. The error
//! is returned from [`Computed::try_new`] at construction, or from the
//! `Runtime::flush` that ran the recompute. Registrations made by the failed
//! run are kept so a later change retries it.

use std::convert::Infallible;
use std::fmt::{self, Debug};
use std::sync::{Arc, Weak};

use super::cancel::CancelHandle;
use super::node::{Node, NodeKind, Reactive};
use super::observable::{Observable, Trigger};
use super::runtime::Runtime;
use super::signal::{ReadSignal, Signal};
use super::subscriber::Subscriber;
use crate::error::{BoxError, ReactiveError, Result};
use crate::scheduler::Granularity;

type ComputeFn<T> = Box<dyn Fn() -> std::result::Result<T, BoxError> + Send + Sync>;

struct ComputedInner<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    node: Arc<Node>,
    compute: ComputeFn<T>,
    value: Signal<T>,
}

impl<T> Reactive for ComputedInner<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn run(&self) -> Result<()> {
        let value = self
            .node
            .track(|| (self.compute)())
            .map_err(|source| {
                ReactiveError::compute(self.node.kind().as_str(), self.node.id(), source)
            })?;
        self.value.set(value);
        Ok(())
    }
}

impl<T> Drop for ComputedInner<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.node.dispose();
    }
}

/// A derived value that recomputes when its dependencies change.
///
/// # Type Parameters
///
/// - `T`: The computed value. `PartialEq` suppresses notifications when a
///   recompute produces the value already stored.
///
/// # Example
///
/// ```rust
/// use ripple_core::reactive::{Computed, Runtime, Signal};
///
/// let rt = Runtime::new();
/// let a = Signal::new(&rt, 0);
/// let b = Computed::new(&rt, {
///     let a = a.clone();
///     move || a.get() * 2
/// });
///
/// a.set(5);
/// assert_eq!(b.get(), 0); // not yet propagated
/// rt.flush().unwrap();
/// assert_eq!(b.get(), 10);
/// ```
pub struct Computed<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    inner: Arc<ComputedInner<T>>,
}

impl<T> Computed<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a computed value, evaluating `compute` immediately.
    pub fn new<F>(runtime: &Runtime, compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::with_granularity(runtime, runtime.default_granularity(), compute)
    }

    /// Create a computed value whose recomputes run at `granularity`.
    pub fn with_granularity<F>(runtime: &Runtime, granularity: Granularity, compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let node = Node::new(runtime, granularity, NodeKind::Computed);
        match Self::build(node, move || Ok::<T, Infallible>(compute())) {
            Ok(computed) => computed,
            Err(never) => match never {},
        }
    }

    /// Create a computed value from a fallible function.
    ///
    /// Returns the error if the first evaluation fails.
    pub fn try_new<F, E>(runtime: &Runtime, compute: F) -> Result<Self>
    where
        F: Fn() -> std::result::Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        Self::try_with_granularity(runtime, runtime.default_granularity(), compute)
    }

    /// Fallible [`with_granularity`](Self::with_granularity).
    pub fn try_with_granularity<F, E>(
        runtime: &Runtime,
        granularity: Granularity,
        compute: F,
    ) -> Result<Self>
    where
        F: Fn() -> std::result::Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        let node = Node::new(runtime, granularity, NodeKind::Computed);
        let id = node.id();
        Self::build(node, compute)
            .map_err(|err| ReactiveError::compute(NodeKind::Computed.as_str(), id, err.into()))
    }

    fn build<F, E>(node: Arc<Node>, compute: F) -> std::result::Result<Self, E>
    where
        F: Fn() -> std::result::Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        let initial = match node.track(&compute) {
            Ok(value) => value,
            Err(err) => {
                node.dispose();
                return Err(err);
            }
        };

        let value = Signal::new(node.runtime(), initial);
        let inner = Arc::new(ComputedInner {
            node: node.clone(),
            compute: Box::new(move || compute().map_err(Into::into)),
            value,
        });

        let target: Weak<dyn Reactive> = Arc::<ComputedInner<T>>::downgrade(&inner);
        node.bind(target);
        Ok(Self { inner })
    }

    /// Get the computed value's unique ID.
    pub fn id(&self) -> u64 {
        self.inner.node.id()
    }

    /// Get the current value, registering the active listener.
    pub fn get(&self) -> T {
        self.inner.value.get()
    }

    /// Get the current value without tracking.
    pub fn get_untracked(&self) -> T {
        self.inner.value.get_untracked()
    }

    /// Observe the value.
    ///
    /// The observation keeps this computed value alive until the returned
    /// handle is cancelled.
    pub fn observe<F>(&self, observer: F) -> CancelHandle
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        let owner = self.clone();
        self.inner.value.observe(move |value| {
            let _ = &owner;
            observer(value)
        })
    }

    /// A read-only view of the stored value.
    pub fn read_only(&self) -> ReadSignal<T> {
        self.inner.value.read_only()
    }

    /// Number of signals read during the most recent evaluation.
    pub fn dependency_count(&self) -> usize {
        self.inner.node.dependency_count()
    }

    /// Whether a recompute is queued.
    pub fn is_pending(&self) -> bool {
        self.inner.node.is_pending()
    }
}

impl<T> Clone for Computed<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Computed<T>
where
    T: Clone + PartialEq + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.id())
            .field("value", &self.get_untracked())
            .field("dependency_count", &self.dependency_count())
            .finish()
    }
}

impl<T> Trigger for Computed<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn subscribe(&self, subscriber: Arc<Subscriber>) -> CancelHandle {
        self.inner.value.subscribe(subscriber)
    }
}

impl<T> Observable<T> for Computed<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn get(&self) -> T {
        Computed::get(self)
    }

    fn get_untracked(&self) -> T {
        Computed::get_untracked(self)
    }

    fn observe<F>(&self, observer: F) -> CancelHandle
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        Computed::observe(self, observer)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
