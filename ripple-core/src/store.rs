//! Store
//!
//! A reducer-driven state container. State changes only through `update`,
//! which maps the current state and a message to a [`Transition`]: the next
//! state plus a list of asynchronous effects. Each effect resolves to an
//! optional follow-up message that is sent back into the store.
//!
//! # Ordering
//!
//! - Messages are handled one at a time, synchronously, under a dispatch
//!   lock. `send` returns after the new state is written.
//! - Effects are spawned on the ambient tokio runtime and run concurrently.
//!   A finished effect never calls `update` itself: its follow-up message
//!   joins the store's inbox and a microtask is queued on the reactive
//!   runtime. Follow-ups are therefore handled, in completion order, by the
//!   thread that drives [`Runtime::flush`] or awaits [`Store::settled`].
//!
//! The state lives in a [`Signal`], so computed values, effects and
//! reductions can depend on it like any other reactive value.

use std::collections::VecDeque;
use std::fmt::{self, Debug};
use std::future::Future;
use std::sync::Arc;

use futures_util::future::{join_all, BoxFuture};
use futures_util::FutureExt;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::config::StoreOptions;
use crate::error::{ReactiveError, Result};
use crate::reactive::{ReadSignal, Runtime, Signal};
use crate::scheduler::Granularity;

/// An asynchronous operation resolving to an optional follow-up message.
pub type StoreEffect<M> = BoxFuture<'static, Option<M>>;

/// Box a future as a [`StoreEffect`].
pub fn store_effect<M, F>(future: F) -> StoreEffect<M>
where
    F: Future<Output = Option<M>> + Send + 'static,
{
    future.boxed()
}

/// The outcome of handling one message.
pub struct Transition<S, M> {
    pub state: S,
    pub effects: Vec<StoreEffect<M>>,
}

impl<S, M> Transition<S, M> {
    pub fn new(state: S, effects: Vec<StoreEffect<M>>) -> Self {
        Self { state, effects }
    }

    /// A transition with no effects.
    pub fn none(state: S) -> Self {
        Self::new(state, Vec::new())
    }

    /// Add an effect to this transition.
    pub fn with_effect<F>(mut self, future: F) -> Self
    where
        F: Future<Output = Option<M>> + Send + 'static,
    {
        self.effects.push(store_effect(future));
        self
    }
}

impl<S: Debug, M> Debug for Transition<S, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("state", &self.state)
            .field("effects", &self.effects.len())
            .finish()
    }
}

/// Default arm for `update`: keep the state and report the message.
pub fn unknown_message<S, M>(state: S, message: M) -> Transition<S, M>
where
    M: Debug,
{
    tracing::warn!(?message, "store received an unhandled message");
    Transition::none(state)
}

type UpdateFn<S, M> = Box<dyn Fn(S, M) -> Transition<S, M> + Send + Sync>;

struct StoreInner<S, M>
where
    S: Clone + PartialEq + Send + Sync + 'static,
{
    state: Signal<S>,
    update: UpdateFn<S, M>,
    options: StoreOptions,
    dispatch: Mutex<()>,
    in_flight: Mutex<Vec<JoinHandle<()>>>,
    inbox: Mutex<VecDeque<M>>,
}

/// A reducer-driven state container.
///
/// # Example
///
/// ```rust
/// use ripple_core::reactive::Runtime;
/// use ripple_core::store::{Store, Transition};
///
/// let rt = Runtime::new();
/// let store = Store::new(&rt, || Transition::none(0), |s: i32, m: i32| {
///     Transition::none(s + m)
/// })
/// .unwrap();
///
/// store.send(3).unwrap();
/// store.send(4).unwrap();
/// assert_eq!(store.get(), 7);
/// ```
pub struct Store<S, M>
where
    S: Clone + PartialEq + Send + Sync + 'static,
{
    inner: Arc<StoreInner<S, M>>,
}

impl<S, M> Store<S, M>
where
    S: Clone + PartialEq + Send + Sync + Debug + 'static,
    M: Debug + Send + 'static,
{
    /// Create a store, applying `init` and spawning its effects.
    ///
    /// Fails with [`ReactiveError::NoAsyncRuntime`] if `init` returns effects
    /// and no tokio runtime is running.
    pub fn new<I, U>(runtime: &Runtime, init: I, update: U) -> Result<Self>
    where
        I: FnOnce() -> Transition<S, M>,
        U: Fn(S, M) -> Transition<S, M> + Send + Sync + 'static,
    {
        Self::with_options(runtime, StoreOptions::default(), init, update)
    }

    /// Create a store with explicit [`StoreOptions`].
    ///
    /// With `debug` set, every transition is logged at `DEBUG` level along
    /// with the message that caused it.
    pub fn with_options<I, U>(
        runtime: &Runtime,
        options: StoreOptions,
        init: I,
        update: U,
    ) -> Result<Self>
    where
        I: FnOnce() -> Transition<S, M>,
        U: Fn(S, M) -> Transition<S, M> + Send + Sync + 'static,
    {
        let Transition { state, effects } = init();
        if options.debug {
            tracing::debug!(?state, effects = effects.len(), "store initialised");
        }

        let store = Self {
            inner: Arc::new(StoreInner {
                state: Signal::new(runtime, state),
                update: Box::new(update),
                options,
                dispatch: Mutex::new(()),
                in_flight: Mutex::new(Vec::new()),
                inbox: Mutex::new(VecDeque::new()),
            }),
        };
        store.spawn_effects(effects)?;
        Ok(store)
    }

    /// Handle `message`: run `update`, write the new state, spawn effects.
    pub fn send(&self, message: M) -> Result<()> {
        let effects = {
            let _dispatch = self.inner.dispatch.lock();
            let current = self.inner.state.get_untracked();

            let message_repr = self.inner.options.debug.then(|| format!("{message:?}"));
            let Transition { state, effects } = (self.inner.update)(current, message);
            if let Some(message) = message_repr {
                tracing::debug!(%message, ?state, effects = effects.len(), "store transition");
            }

            self.inner.state.set(state);
            effects
        };
        self.spawn_effects(effects)
    }

    /// A read-only view of the state.
    pub fn state(&self) -> ReadSignal<S> {
        self.inner.state.read_only()
    }

    /// The current state; registers the active listener, if any.
    pub fn get(&self) -> S {
        self.inner.state.get()
    }

    /// Number of effects still running plus follow-ups not yet handled.
    pub fn in_flight(&self) -> usize {
        let running = self
            .inner
            .in_flight
            .lock()
            .iter()
            .filter(|task| !task.is_finished())
            .count();
        running + self.inner.inbox.lock().len()
    }

    /// Wait until every effect, including those spawned by follow-up
    /// messages, has completed and every follow-up has been sent.
    ///
    /// Follow-ups are sent from the awaiting task, so the caller must be the
    /// thread that drives this store's runtime.
    pub async fn settled(&self) -> Result<()> {
        loop {
            let tasks = std::mem::take(&mut *self.inner.in_flight.lock());
            for outcome in join_all(tasks).await {
                if let Err(err) = outcome {
                    tracing::error!(error = %err, "store effect task failed");
                }
            }
            self.deliver_follow_ups()?;
            if self.inner.in_flight.lock().is_empty() {
                return Ok(());
            }
        }
    }

    /// Send every follow-up waiting in the inbox.
    fn deliver_follow_ups(&self) -> Result<()> {
        loop {
            let next = self.inner.inbox.lock().pop_front();
            match next {
                Some(message) => self.send(message)?,
                None => return Ok(()),
            }
        }
    }

    fn spawn_effects(&self, effects: Vec<StoreEffect<M>>) -> Result<()> {
        if effects.is_empty() {
            return Ok(());
        }
        let handle = Handle::try_current().map_err(|_| ReactiveError::NoAsyncRuntime)?;

        let mut in_flight = self.inner.in_flight.lock();
        in_flight.retain(|task| !task.is_finished());
        for effect in effects {
            let store = self.clone();
            in_flight.push(handle.spawn(async move {
                let Some(message) = effect.await else {
                    return;
                };
                store.inner.inbox.lock().push_back(message);
                let runtime = store.inner.state.runtime().clone();
                runtime.enqueue(
                    Granularity::Microtask,
                    Box::new(move || store.deliver_follow_ups()),
                );
            }));
        }
        Ok(())
    }
}

impl<S, M> Clone for Store<S, M>
where
    S: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, M> Debug for Store<S, M>
where
    S: Clone + PartialEq + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("state", &self.inner.state.get_untracked())
            .field("in_flight", &self.inner.in_flight.lock().len())
            .field("inbox", &self.inner.inbox.lock().len())
            .finish()
    }
}
