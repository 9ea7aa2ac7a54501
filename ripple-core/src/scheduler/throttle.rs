//! Throttled Jobs
//!
//! A [`Throttle`] is a consumer's private scheduler. The first `schedule`
//! call in a tick enqueues one task on the runtime; later calls before that
//! task runs replace the remembered job, so the last writer wins and the
//! job runs once.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::queue::Granularity;
use crate::error::Result;
use crate::reactive::Runtime;

type Job = Box<dyn FnOnce() -> Result<()> + Send>;

/// Coalesces repeated scheduling within one tick into a single run.
pub struct Throttle {
    runtime: Runtime,
    granularity: Granularity,
    pending: Mutex<Option<Job>>,
}

impl Throttle {
    /// Create a throttle bound to `runtime`.
    pub fn new(runtime: &Runtime, granularity: Granularity) -> Arc<Self> {
        Arc::new(Self {
            runtime: runtime.clone(),
            granularity,
            pending: Mutex::new(None),
        })
    }

    /// Schedule `job`, replacing any job still waiting for this tick.
    pub fn schedule<F>(self: &Arc<Self>, job: F)
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let mut pending = self.pending.lock();
        let already_queued = pending.is_some();
        *pending = Some(Box::new(job));

        if !already_queued {
            let this = Arc::clone(self);
            self.runtime
                .enqueue(self.granularity, Box::new(move || this.run()));
        }
    }

    /// Whether a job is waiting for the next flush.
    pub fn is_pending(&self) -> bool {
        self.pending.lock().is_some()
    }

    /// The granularity this throttle schedules at.
    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    fn run(&self) -> Result<()> {
        // Cleared before running so the job can schedule the next tick.
        let job = self.pending.lock().take();
        match job {
            Some(job) => job(),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Throttle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Throttle")
            .field("granularity", &self.granularity)
            .field("pending", &self.is_pending())
            .finish()
    }
}
