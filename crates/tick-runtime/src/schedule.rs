//! One-shot scheduling primitive.
//!
//! A [`SteadyTimer`](crate::timer::SteadyTimer) emulates a repeating
//! timer by re-arming a single cancellable one-shot from inside each
//! firing. The primitive guarantees: fires after *at least* the delay,
//! at most once, unless cancelled first.

use chrono::TimeDelta;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::warn;

/// Opaque identifier of a pending one-shot invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

impl TimerHandle {
    /// Wrap a raw scheduler-assigned id.
    #[must_use]
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// The raw scheduler-assigned id.
    #[must_use]
    pub fn as_raw(self) -> u64 {
        self.0
    }
}

/// Environment facility that invokes a callback once after a delay.
pub trait OneShotScheduler: Send + Sync + 'static {
    /// Arm a single invocation of `f` after `delay`.
    ///
    /// A non-positive delay fires as soon as the scheduler runs it; the
    /// raw signed value is accepted so callers can pass a computed
    /// delay through unchanged.
    fn schedule_once(&self, delay: TimeDelta, f: Box<dyn FnOnce() + Send>) -> TimerHandle;

    /// Cancel a pending invocation. A cancelled invocation never fires;
    /// cancelling an already-fired or unknown handle is a no-op.
    fn cancel(&self, handle: TimerHandle);
}

/// Thread-backed production scheduler.
///
/// Each pending one-shot occupies a named thread parked on a condvar so
/// cancellation takes effect immediately instead of after the full delay.
#[derive(Debug, Clone, Default)]
pub struct ThreadScheduler {
    shared: Arc<SchedulerShared>,
}

#[derive(Debug, Default)]
struct SchedulerShared {
    next_id: AtomicU64,
    pending: Mutex<HashMap<u64, Arc<Pending>>>,
}

#[derive(Debug)]
struct Pending {
    cancelled: Mutex<bool>,
    wake: Condvar,
}

impl ThreadScheduler {
    /// Create a scheduler with no pending invocations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of currently pending invocations.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared
            .pending
            .lock()
            .expect("pending map mutex poisoned")
            .len()
    }
}

impl OneShotScheduler for ThreadScheduler {
    fn schedule_once(&self, delay: TimeDelta, f: Box<dyn FnOnce() + Send>) -> TimerHandle {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = Arc::new(Pending {
            cancelled: Mutex::new(false),
            wake: Condvar::new(),
        });
        self.shared
            .pending
            .lock()
            .expect("pending map mutex poisoned")
            .insert(id, Arc::clone(&entry));

        let wait = delay.to_std().unwrap_or(Duration::ZERO);
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(format!("tick-oneshot-{id}"))
            .spawn(move || {
                let deadline = Instant::now() + wait;
                let mut cancelled = entry.cancelled.lock().expect("cancel flag mutex poisoned");
                while !*cancelled {
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    let (guard, _) = entry
                        .wake
                        .wait_timeout(cancelled, deadline - now)
                        .expect("cancel flag mutex poisoned");
                    cancelled = guard;
                }
                let fire = !*cancelled;
                drop(cancelled);

                shared
                    .pending
                    .lock()
                    .expect("pending map mutex poisoned")
                    .remove(&id);
                if fire {
                    f();
                }
            });

        if let Err(e) = spawned {
            warn!(id, "failed to spawn one-shot thread: {e}");
            self.shared
                .pending
                .lock()
                .expect("pending map mutex poisoned")
                .remove(&id);
        }

        TimerHandle(id)
    }

    fn cancel(&self, handle: TimerHandle) {
        let entry = self
            .shared
            .pending
            .lock()
            .expect("pending map mutex poisoned")
            .remove(&handle.0);
        if let Some(entry) = entry {
            *entry.cancelled.lock().expect("cancel flag mutex poisoned") = true;
            entry.wake.notify_all();
        }
    }
}
