//! Wall-clock abstraction and calendar arithmetic.
//!
//! The timer core reads time exclusively through [`Clock`] so tests can
//! drive it with a virtual clock (see [`crate::sim`]).

use chrono::{DateTime, TimeDelta, Utc};
use tick_common::unit::Frequency;

const MICROS_PER_SEC: i64 = 1_000_000;
const MICROS_PER_DAY: i64 = 86_400 * MICROS_PER_SEC;

/// Source of the current instant.
pub trait Clock: Send + Sync + 'static {
    /// The current instant on the UTC timeline.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Floor an instant to the start of the enclosing calendar unit.
///
/// Weeks start on Monday. Boundaries are computed on the UTC timeline at
/// microsecond resolution.
#[must_use]
pub fn start_of(unit: Frequency, t: DateTime<Utc>) -> DateTime<Utc> {
    let us = t.timestamp_micros();
    let excess = match unit {
        Frequency::Second => us.rem_euclid(MICROS_PER_SEC),
        Frequency::Minute => us.rem_euclid(60 * MICROS_PER_SEC),
        Frequency::Hour => us.rem_euclid(3_600 * MICROS_PER_SEC),
        Frequency::Day => us.rem_euclid(MICROS_PER_DAY),
        // the epoch fell on a Thursday; shift three days so the floor
        // lands on Monday
        Frequency::Week => (us + 3 * MICROS_PER_DAY).rem_euclid(7 * MICROS_PER_DAY),
    };
    t - TimeDelta::microseconds(excess)
}
