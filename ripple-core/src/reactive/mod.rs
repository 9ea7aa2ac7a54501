//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, computed values,
//! and effects, plus the runtime that tracks and schedules them.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within a tracked run (such as a computed value or effect), the signal
//! registers that run's subscriber. When the signal's value changes, every
//! registered subscriber is notified.
//!
//! ## Computed Values
//!
//! A Computed is a derived value. It re-evaluates after one of its
//! dependencies changes and only notifies its own dependents when the result
//! actually differs.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change. Effects synchronize reactive state with external
//! systems, such as a renderer or a log.
//!
//! # Implementation Notes
//!
//! Dependencies are detected automatically. The [`Runtime`] keeps a stack of
//! active subscribers; when a signal is read, it checks the top of the stack
//! and, if there is a subscriber, registers it.
//!
//! Notifications never run computations directly. They schedule work on a
//! per-computation [`Throttle`](crate::scheduler::Throttle), and the host
//! drains the queued work with [`Runtime::flush`]. This is what collapses the
//! "diamond" case into a single recomputation.

mod cancel;
mod computed;
mod context;
mod effect;
mod node;
mod observable;
mod runtime;
mod signal;
mod subscriber;

pub use cancel::{attach_cancel, CancelHandle, Cancellable};
pub use computed::Computed;
pub use context::Dependencies;
pub use effect::Effect;
pub use observable::{Observable, Trigger};
pub use runtime::Runtime;
pub use signal::{ReadSignal, Signal};
pub use subscriber::{Subscriber, SubscriberId};
