//! Observation contract.
//!
//! External collaborators (renderers, bindings) see reactive values only
//! through three operations: read the current value, observe future values,
//! and, for mutable cells, write. [`Observable`] captures the first two so
//! pipelines can accept any reactive value.

use std::sync::Arc;

use super::cancel::CancelHandle;
use super::signal::{ReadSignal, Signal};
use super::subscriber::Subscriber;

/// Anything that can announce changes to a raw subscriber.
///
/// This is the object-safe part of the contract, so heterogeneous sources
/// can be passed together as `&[&dyn Trigger]`.
pub trait Trigger {
    /// Register `subscriber` for every future change.
    ///
    /// The subscriber runs inside the writer's call stack and must only
    /// schedule work.
    fn subscribe(&self, subscriber: Arc<Subscriber>) -> CancelHandle;
}

/// A readable, observable reactive value.
pub trait Observable<T>: Trigger {
    /// Current value; registers the active listener, if any.
    fn get(&self) -> T;

    /// Current value without registering anything.
    fn get_untracked(&self) -> T;

    /// Call `observer` with the current value now and with later values as
    /// they are flushed.
    fn observe<F>(&self, observer: F) -> CancelHandle
    where
        F: Fn(T) + Send + Sync + 'static;
}

impl<T> Trigger for Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn subscribe(&self, subscriber: Arc<Subscriber>) -> CancelHandle {
        Signal::subscribe(self, subscriber)
    }
}

impl<T> Observable<T> for Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn get(&self) -> T {
        Signal::get(self)
    }

    fn get_untracked(&self) -> T {
        Signal::get_untracked(self)
    }

    fn observe<F>(&self, observer: F) -> CancelHandle
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        Signal::observe(self, observer)
    }
}

impl<T> Trigger for ReadSignal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn subscribe(&self, subscriber: Arc<Subscriber>) -> CancelHandle {
        ReadSignal::subscribe(self, subscriber)
    }
}

impl<T> Observable<T> for ReadSignal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn get(&self) -> T {
        ReadSignal::get(self)
    }

    fn get_untracked(&self) -> T {
        ReadSignal::get_untracked(self)
    }

    fn observe<F>(&self, observer: F) -> CancelHandle
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        ReadSignal::observe(self, observer)
    }
}
