//! Scheduling
//!
//! This module implements transaction batching: change notifications are
//! never acted on inside the write that caused them. Instead, each consumer
//! hands a job to its own [`Throttle`], which queues at most one task per
//! tick on the runtime's event loop.
//!
//! # Overview
//!
//! - [`Granularity::Microtask`] tasks run when the host calls
//!   `Runtime::flush`, after the current synchronous phase.
//! - [`Granularity::Frame`] tasks run when the host calls
//!   `Runtime::advance_frame`, for values paced to rendering.
//!
//! # Design Decisions
//!
//! 1. Every computed value, effect and observer owns its throttle. There is
//!    no global flush list, so one consumer's coalescing never delays or
//!    merges another's.
//!
//! 2. A throttle remembers only the latest job. If two upstream values of a
//!    shared consumer change in the same tick (the "diamond" shape), the
//!    consumer runs once, against the latest state.
//!
//! 3. The ordering between unrelated consumers within one flush is FIFO by
//!    first schedule, but callers must not rely on it.

mod queue;
mod throttle;

pub use queue::Granularity;
pub(crate) use queue::{Task, TaskQueue};
pub use throttle::Throttle;
