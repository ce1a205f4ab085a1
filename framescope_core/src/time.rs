// Copyright 2026 the Framescope Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Monotonic host time and clock sources.
//!
//! [`HostTime`] is a point on a monotonic timeline expressed in nanoseconds
//! since an arbitrary, clock-specific epoch. [`Duration`] is a span on the
//! same timeline.
//!
//! The session reads time through the [`Clock`] trait so that hosts can
//! supply their own source. [`MonotonicClock`] wraps [`std::time::Instant`];
//! [`ManualClock`] is advanced explicitly and is what tests drive rate
//! limiting with.

use core::fmt;
use core::ops::Add;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// A point in time in nanoseconds on a monotonic timeline.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct HostTime(pub u64);

impl HostTime {
    /// Returns the raw nanosecond value.
    #[inline]
    #[must_use]
    pub const fn nanos(self) -> u64 {
        self.0
    }

    /// Returns the duration between `self` and an earlier time, or zero if
    /// `earlier` is after `self`.
    #[inline]
    #[must_use]
    pub const fn saturating_duration_since(self, earlier: Self) -> Duration {
        Duration(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for HostTime {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Duration) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl fmt::Debug for HostTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostTime({}ns)", self.0)
    }
}

/// A duration in nanoseconds.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Duration(pub u64);

impl Duration {
    /// A zero-length duration.
    pub const ZERO: Self = Self(0);

    /// Returns the raw nanosecond value.
    #[inline]
    #[must_use]
    pub const fn nanos(self) -> u64 {
        self.0
    }

    /// Creates a duration from fractional seconds.
    ///
    /// Negative and NaN inputs produce [`Duration::ZERO`]; values too large
    /// for `u64` nanoseconds saturate.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "float-to-int `as` casts saturate, and negatives are filtered out first"
    )]
    pub fn from_secs_f32(secs: f32) -> Self {
        if secs.is_nan() || secs <= 0.0 {
            return Self::ZERO;
        }
        Self((f64::from(secs) * 1e9) as u64)
    }
}

impl fmt::Debug for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Duration({}ns)", self.0)
    }
}

/// A source of monotonic time.
///
/// Implementations must be cheap to call from any thread: the recorder reads
/// the clock once per appended event.
pub trait Clock: Send + Sync {
    /// Returns the current time. Successive calls on one thread never go
    /// backwards.
    fn now(&self) -> HostTime;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    #[inline]
    fn now(&self) -> HostTime {
        (**self).now()
    }
}

/// [`Clock`] backed by [`std::time::Instant`].
///
/// Times are nanoseconds since the clock was created.
#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    /// Creates a clock whose epoch is now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    #[inline]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "u64 nanoseconds cover ~584 years of uptime"
    )]
    fn now(&self) -> HostTime {
        HostTime(self.epoch.elapsed().as_nanos() as u64)
    }
}

/// [`Clock`] that only moves when told to.
///
/// Clones share the same underlying time.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    /// Creates a clock reading `start`.
    #[must_use]
    pub fn new(start: HostTime) -> Self {
        Self {
            nanos: Arc::new(AtomicU64::new(start.0)),
        }
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(by.0, Ordering::AcqRel);
    }

    /// Sets the clock to `t`. Setting it backwards is ignored.
    pub fn set(&self, t: HostTime) {
        self.nanos.fetch_max(t.0, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now(&self) -> HostTime {
        HostTime(self.nanos.load(Ordering::Acquire))
    }
}
