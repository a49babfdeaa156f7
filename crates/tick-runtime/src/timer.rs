//! Self-correcting interval timer.
//!
//! [`SteadyTimer`] invokes a callback at a fixed nominal cadence while
//! compensating for the wall-clock time consumed by the callback and for
//! drift introduced by the scheduling primitive. The first invocation
//! can be phase-aligned to a calendar boundary, so a clock display
//! ticking once per minute fires exactly on the minute.
//!
//! A repeating timer is emulated by re-arming a single cancellable
//! one-shot inside each firing. The next due instant is always computed
//! analytically from the anchor, never by accumulating sleeps, so
//! rounding errors cannot compound.

use crate::clock::{start_of, Clock, SystemClock};
use crate::schedule::{OneShotScheduler, ThreadScheduler, TimerHandle};
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tick_common::config::TimerConfig;
use tick_common::error::{TickError, TickResult};
use tick_common::metrics::{MetricsSnapshot, TickMetrics};
use tick_common::unit::Frequency;
use tracing::{debug, warn};

/// The function invoked on every tick.
pub type TickCallback = Box<dyn Fn() + Send + Sync>;

/// A timer that invokes a callback at regular intervals.
///
/// More accurate than naive sleep loops: each firing measures the
/// actual now, advances the anchor by whole intervals past it, and arms
/// the next one-shot for the remaining gap, so callback execution time
/// and scheduler drift never accumulate.
///
/// At most one invocation is pending per instance at any time. `start`
/// re-arms (the previous pending invocation is discarded) and `stop`
/// leaves the timer inert but reusable.
pub struct SteadyTimer<C: Clock = SystemClock, S: OneShotScheduler = ThreadScheduler> {
    inner: Arc<TimerInner<C, S>>,
}

struct TimerInner<C, S> {
    /// The function to be called at regular intervals.
    callback: TickCallback,
    /// The duration between invocations of the callback.
    interval: TimeDelta,
    /// Calendar boundary the first invocation is aligned to, if any.
    align: Option<Frequency>,
    clock: C,
    scheduler: S,
    state: Mutex<ArmState>,
    metrics: Mutex<TickMetrics>,
}

/// Inert ↔ Armed bookkeeping, serialized under one lock so a re-arm
/// racing a stop cannot leave a stray pending invocation.
struct ArmState {
    running: bool,
    handle: Option<TimerHandle>,
}

impl SteadyTimer {
    /// Create an inert timer on the system clock and thread scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`TickError::InvalidInterval`] if `interval` is zero or
    /// not representable on the timeline.
    pub fn new(
        callback: impl Fn() + Send + Sync + 'static,
        interval: Duration,
        align: Option<Frequency>,
    ) -> TickResult<Self> {
        let mut builder = SteadyTimerBuilder::new(callback).interval(interval);
        if let Some(unit) = align {
            builder = builder.align(unit);
        }
        builder.build()
    }

    /// Start building a timer with non-default parts.
    pub fn builder(callback: impl Fn() + Send + Sync + 'static) -> SteadyTimerBuilder {
        SteadyTimerBuilder::new(callback)
    }
}

impl<C: Clock, S: OneShotScheduler> SteadyTimer<C, S> {
    /// Start the timer.
    ///
    /// If an invocation is already pending it is cancelled first, so
    /// repeated calls re-arm rather than stack. With `immediate` set,
    /// or when no alignment unit was configured, the first invocation
    /// fires as soon as the scheduler runs it; otherwise it fires at
    /// the next occurrence of the interval measured from the start of
    /// the current alignment boundary.
    pub fn start(&self, immediate: bool) {
        let inner = &self.inner;
        let now = inner.clock.now();
        let (anchor, delay) = match inner.align {
            Some(unit) if !immediate => {
                let anchor = start_of(unit, now) + inner.interval;
                let delay = anchor - now;
                debug!(
                    delay_ms = delay.num_milliseconds(),
                    now = %now,
                    "delaying first invocation"
                );
                (anchor, delay)
            }
            _ => (now, TimeDelta::zero()),
        };

        let mut state = inner.state.lock().expect("timer state mutex poisoned");
        if let Some(handle) = state.handle.take() {
            inner.scheduler.cancel(handle);
        }
        state.running = true;
        let fire_inner = Arc::clone(inner);
        state.handle = Some(inner.scheduler.schedule_once(
            delay,
            Box::new(move || TimerInner::fire(fire_inner, anchor)),
        ));
    }

    /// Stop the timer.
    ///
    /// Cancels the pending invocation if any; safe to call when already
    /// stopped, and callable from within the firing callback itself (the
    /// in-flight invocation completes, the re-arm is suppressed).
    pub fn stop(&self) {
        let mut state = self.inner.state.lock().expect("timer state mutex poisoned");
        state.running = false;
        if let Some(handle) = state.handle.take() {
            self.inner.scheduler.cancel(handle);
        }
    }

    /// Whether the timer currently has an invocation pending.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.inner
            .state
            .lock()
            .expect("timer state mutex poisoned")
            .running
    }

    /// Snapshot of the drift metrics collected so far.
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner
            .metrics
            .lock()
            .expect("timer metrics mutex poisoned")
            .snapshot()
    }
}

impl<C: Clock, S: OneShotScheduler> TimerInner<C, S> {
    /// Recurring handler: deliver one tick and re-arm for the next
    /// interval boundary after the observed now.
    fn fire(inner: Arc<Self>, anchor: DateTime<Utc>) {
        let now = inner.clock.now();

        // advance to the first boundary strictly after now; finite
        // because now is fixed for the scan
        let mut next = anchor;
        let mut advances = 0u32;
        while next <= now {
            next += inner.interval;
            advances += 1;
        }
        if advances > 1 {
            warn!(intervals = advances, "timer is behind");
        }

        {
            let mut metrics = inner.metrics.lock().expect("timer metrics mutex poisoned");
            metrics.record_lateness((now - anchor).to_std().unwrap_or_default());
            if advances > 1 {
                metrics.record_skipped(advances - 1);
            }
        }

        (inner.callback)();

        let mut state = inner.state.lock().expect("timer state mutex poisoned");
        if !state.running {
            state.handle = None;
            return;
        }
        // re-read now so the callback's own execution time is already
        // corrected on this arm
        let delay = next - inner.clock.now();
        debug!(delay_ms = delay.num_milliseconds(), at = %next, "next invocation");
        let fire_inner = Arc::clone(&inner);
        state.handle = Some(inner.scheduler.schedule_once(
            delay,
            Box::new(move || Self::fire(fire_inner, next)),
        ));
    }
}

/// Builder for configuring a [`SteadyTimer`].
pub struct SteadyTimerBuilder<C = SystemClock, S = ThreadScheduler> {
    callback: TickCallback,
    interval: Duration,
    align: Option<Frequency>,
    histogram_size: usize,
    clock: C,
    scheduler: S,
}

impl SteadyTimerBuilder {
    /// Create a builder with a one-second unaligned interval on the
    /// system clock and thread scheduler.
    pub fn new(callback: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            callback: Box::new(callback),
            interval: Duration::from_secs(1),
            align: None,
            histogram_size: 1_024,
            clock: SystemClock,
            scheduler: ThreadScheduler::new(),
        }
    }
}

impl<C: Clock, S: OneShotScheduler> SteadyTimerBuilder<C, S> {
    /// Set the interval between invocations.
    #[must_use]
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Align the first invocation to the given calendar boundary.
    #[must_use]
    pub fn align(mut self, unit: Frequency) -> Self {
        self.align = Some(unit);
        self
    }

    /// Tick once per `unit`, aligned to that unit's boundary.
    ///
    /// A timer built this way fires at the start of the unit and then
    /// once per unit thereafter, which is what a displayed clock wants.
    #[must_use]
    pub fn frequency(mut self, unit: Frequency) -> Self {
        self.interval = unit.interval();
        self.align = Some(unit);
        self
    }

    /// Take interval, alignment, and metrics sizing from a config.
    #[must_use]
    pub fn from_config(mut self, config: &TimerConfig) -> Self {
        self.interval = config.interval;
        self.align = config.align;
        self.histogram_size = config.metrics.histogram_size;
        self
    }

    /// Size of the lateness histogram ring buffer.
    #[must_use]
    pub fn histogram_size(mut self, size: usize) -> Self {
        self.histogram_size = size;
        self
    }

    /// Replace the time source.
    pub fn clock<C2: Clock>(self, clock: C2) -> SteadyTimerBuilder<C2, S> {
        SteadyTimerBuilder {
            callback: self.callback,
            interval: self.interval,
            align: self.align,
            histogram_size: self.histogram_size,
            clock,
            scheduler: self.scheduler,
        }
    }

    /// Replace the one-shot scheduling primitive.
    pub fn scheduler<S2: OneShotScheduler>(self, scheduler: S2) -> SteadyTimerBuilder<C, S2> {
        SteadyTimerBuilder {
            callback: self.callback,
            interval: self.interval,
            align: self.align,
            histogram_size: self.histogram_size,
            clock: self.clock,
            scheduler,
        }
    }

    /// Build the timer.
    ///
    /// # Errors
    ///
    /// Returns [`TickError::InvalidInterval`] if the interval is zero
    /// or not representable on the timeline.
    pub fn build(self) -> TickResult<SteadyTimer<C, S>> {
        if self.interval.is_zero() {
            return Err(TickError::InvalidInterval(self.interval));
        }
        let interval = TimeDelta::from_std(self.interval)
            .map_err(|_| TickError::InvalidInterval(self.interval))?;

        Ok(SteadyTimer {
            inner: Arc::new(TimerInner {
                callback: self.callback,
                interval,
                align: self.align,
                clock: self.clock,
                scheduler: self.scheduler,
                state: Mutex::new(ArmState {
                    running: false,
                    handle: None,
                }),
                metrics: Mutex::new(TickMetrics::new(self.histogram_size)),
            }),
        })
    }
}
