//! Deterministic simulation backend.
//!
//! [`SimClock`] and [`SimScheduler`] replace the system clock and the
//! thread-backed scheduler with virtual time, so alignment and drift
//! behavior can be tested exactly. The scheduler only moves time when
//! told to; nothing fires spontaneously.

use crate::clock::Clock;
use crate::schedule::{OneShotScheduler, TimerHandle};
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Virtual clock shared between a test, a [`SimScheduler`], and the
/// timer under test.
#[derive(Debug, Clone)]
pub struct SimClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl SimClock {
    /// Create a clock frozen at `start`.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Move the clock to an absolute instant.
    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().expect("sim clock mutex poisoned") = to;
    }

    /// Advance the clock by a delta.
    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock().expect("sim clock mutex poisoned");
        *now += by;
    }
}

impl Clock for SimClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("sim clock mutex poisoned")
    }
}

struct SimEntry {
    id: u64,
    due: DateTime<Utc>,
    callback: Box<dyn FnOnce() + Send>,
}

/// One-shot scheduler over virtual time.
#[derive(Clone)]
pub struct SimScheduler {
    clock: SimClock,
    shared: Arc<SimShared>,
}

struct SimShared {
    next_id: AtomicU64,
    queue: Mutex<Vec<SimEntry>>,
}

impl SimScheduler {
    /// Create a scheduler driven by the given virtual clock.
    #[must_use]
    pub fn new(clock: SimClock) -> Self {
        Self {
            clock,
            shared: Arc::new(SimShared {
                next_id: AtomicU64::new(0),
                queue: Mutex::new(Vec::new()),
            }),
        }
    }

    /// The virtual clock this scheduler advances.
    #[must_use]
    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    /// Number of pending invocations.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().expect("sim queue mutex poisoned").len()
    }

    /// Due instant of the earliest pending invocation.
    #[must_use]
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.shared
            .queue
            .lock()
            .expect("sim queue mutex poisoned")
            .iter()
            .map(|entry| entry.due)
            .min()
    }

    /// Remove and return the earliest entry due at or before `limit`.
    ///
    /// The queue lock is released before the caller invokes the entry,
    /// so callbacks can re-arm without deadlocking.
    fn pop_due(&self, limit: DateTime<Utc>) -> Option<SimEntry> {
        let mut queue = self.shared.queue.lock().expect("sim queue mutex poisoned");
        let idx = queue
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.due <= limit)
            .min_by_key(|(_, entry)| entry.due)
            .map(|(idx, _)| idx)?;
        Some(queue.swap_remove(idx))
    }

    /// Fire every invocation due at the current virtual now, in due
    /// order, without moving the clock. Returns the number fired.
    ///
    /// Use after [`SimClock::advance`] to model a late-firing
    /// environment timer.
    pub fn fire_due(&self) -> usize {
        let mut fired = 0;
        while let Some(entry) = self.pop_due(self.clock.now()) {
            (entry.callback)();
            fired += 1;
        }
        fired
    }

    /// Run virtual time forward to `deadline`, firing each pending
    /// invocation at its due instant. Returns the number fired.
    pub fn run_until(&self, deadline: DateTime<Utc>) -> usize {
        let mut fired = 0;
        while let Some(entry) = self.pop_due(deadline) {
            if entry.due > self.clock.now() {
                self.clock.set(entry.due);
            }
            (entry.callback)();
            fired += 1;
        }
        if deadline > self.clock.now() {
            self.clock.set(deadline);
        }
        fired
    }
}

impl OneShotScheduler for SimScheduler {
    fn schedule_once(&self, delay: TimeDelta, f: Box<dyn FnOnce() + Send>) -> TimerHandle {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let due = self.clock.now() + delay.max(TimeDelta::zero());
        self.shared
            .queue
            .lock()
            .expect("sim queue mutex poisoned")
            .push(SimEntry {
                id,
                due,
                callback: f,
            });
        TimerHandle::from_raw(id)
    }

    fn cancel(&self, handle: TimerHandle) {
        self.shared
            .queue
            .lock()
            .expect("sim queue mutex poisoned")
            .retain(|entry| entry.id != handle.as_raw());
    }
}
