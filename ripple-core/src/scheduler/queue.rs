//! Task Queues
//!
//! The runtime's event loop is an explicit pair of FIFO queues, one per
//! [`Granularity`]. Nothing runs until the host drains them, which gives the
//! same "after the current synchronous phase" ordering a microtask queue
//! gives in an event-loop environment.

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{ReactiveError, Result};

/// A unit of deferred work.
pub(crate) type Task = Box<dyn FnOnce() -> Result<()> + Send>;

/// When a scheduled job is allowed to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// Runs on the next `flush`, after the current synchronous phase.
    #[default]
    Microtask,

    /// Runs on the next `advance_frame`. Suited to visually paced values.
    Frame,
}

/// Pending work for one runtime.
#[derive(Default)]
pub(crate) struct TaskQueue {
    microtasks: Mutex<VecDeque<Task>>,
    frames: Mutex<VecDeque<Task>>,
}

impl TaskQueue {
    pub(crate) fn push(&self, granularity: Granularity, task: Task) {
        match granularity {
            Granularity::Microtask => self.microtasks.lock().push_back(task),
            Granularity::Frame => self.frames.lock().push_back(task),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.microtasks.lock().len() + self.frames.lock().len()
    }

    /// Run microtasks until the queue is empty, including ones queued while
    /// draining.
    ///
    /// Stops at the first failing task; everything still queued stays queued.
    pub(crate) fn drain_microtasks(&self, limit: usize) -> Result<usize> {
        let mut ran = 0;
        loop {
            // The lock is released before the task runs; tasks enqueue more.
            let next = self.microtasks.lock().pop_front();
            let Some(task) = next else {
                return Ok(ran);
            };
            if ran >= limit {
                self.microtasks.lock().push_front(task);
                return Err(ReactiveError::FlushLimitExceeded { limit });
            }
            ran += 1;
            task()?;
        }
    }

    /// Run the frame tasks queued before this call.
    ///
    /// Frame tasks queued while running wait for the following frame.
    pub(crate) fn run_frame(&self) -> Result<usize> {
        let mut batch = std::mem::take(&mut *self.frames.lock());
        let mut ran = 0;
        while let Some(task) = batch.pop_front() {
            ran += 1;
            if let Err(err) = task() {
                // Put the unrun remainder back ahead of anything new.
                let mut frames = self.frames.lock();
                while let Some(task) = batch.pop_back() {
                    frames.push_front(task);
                }
                return Err(err);
            }
        }
        Ok(ran)
    }
}
