// Copyright 2026 the Framescope Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame flips: deciding when a frame ends and exchanging buffers.
//!
//! The frame scheduler owns the active buffer of a tracing session and is
//! the only code that changes which buffer producers write into. It is
//! driven from a single thread: the host calls
//! [`TraceSession::on_frame_boundary`] once per frame, which asks the
//! scheduler whether the [`RateLimit`] has elapsed and, if so, flips.
//!
//! # Flip
//!
//! In callback-driven mode the scheduler keeps an engine-owned *bridge*
//! buffer that collects events while the sink runs. A flip:
//!
//! 1. opens the bridge with the current time as its origin and publishes it,
//!    so new appends land there,
//! 2. seals the outgoing buffer and waits for appends already inside it,
//! 3. builds a [`FlipInfo`] and hands the outgoing buffer to the sink,
//! 4. opens the buffer the sink returns with the same origin and publishes
//!    it as the buffer for the next frame,
//! 5. seals the bridge and moves whatever it caught into that buffer.
//!
//! Producers never wait on the sink, and the sink never sees the bridge.
//! Events carried over from the bridge follow the ones written directly, so
//! slot order within a frame is not time order; timestamps are unaffected.
//!
//! In externally-owned mode there is no exchange. The caller's buffer stays
//! active for the whole session and is sealed when the session ends.
//!
//! [`TraceSession::on_frame_boundary`]: crate::session::TraceSession::on_frame_boundary

use core::fmt;
use std::sync::Arc;

use crate::buffer::FrameBuffer;
use crate::recorder::RecorderShared;
use crate::sink::{FlipInfo, FrameSink, TraceInfo};
use crate::time::{Duration, HostTime};

/// What to do when a sink returns a buffer that cannot be written into.
///
/// A returned buffer is unusable when its capacity differs from the
/// session's, or when it is still accepting writes, which means it is live
/// somewhere else.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CapacityMismatch {
    /// Drop the returned buffer and allocate one of the right capacity.
    Reallocate,
    /// Drop the returned buffer and reuse the outgoing one. Falls back to
    /// allocation when there is no outgoing buffer.
    ReuseOutgoing,
}

/// Configuration for buffer flips.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlipConfig {
    /// Busy-wait iterations while draining in-flight appends before the
    /// flipping thread starts yielding.
    pub spin_iterations: u32,
    /// Policy for unusable sink-returned buffers.
    pub capacity_mismatch: CapacityMismatch,
}

impl FlipConfig {
    /// General-purpose preset.
    #[must_use]
    pub const fn standard() -> Self {
        Self {
            spin_iterations: 64,
            capacity_mismatch: CapacityMismatch::Reallocate,
        }
    }

    /// Spins longer before yielding, for hosts whose frame thread should not
    /// be descheduled during a flip.
    #[must_use]
    pub const fn low_latency() -> Self {
        Self {
            spin_iterations: 4096,
            capacity_mismatch: CapacityMismatch::ReuseOutgoing,
        }
    }
}

impl Default for FlipConfig {
    fn default() -> Self {
        Self::standard()
    }
}

/// Minimum time between two flips.
///
/// Rate limiting is advisory pacing: a frame boundary that arrives before
/// the interval has elapsed is skipped, and the frame simply grows longer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RateLimit(Duration);

impl RateLimit {
    /// Flip on every frame boundary.
    pub const NONE: Self = Self(Duration::ZERO);

    /// Creates a limit from seconds. Negative and NaN values clamp to zero.
    #[must_use]
    pub fn from_secs_f32(secs: f32) -> Self {
        Self(Duration::from_secs_f32(secs))
    }

    /// Creates a limit from a duration.
    #[must_use]
    pub const fn from_duration(interval: Duration) -> Self {
        Self(interval)
    }

    /// The minimum interval between flips.
    #[must_use]
    pub const fn interval(self) -> Duration {
        self.0
    }

    fn allows(self, elapsed: Duration) -> bool {
        elapsed >= self.0
    }
}

/// Lifecycle of a session's frame scheduler.
///
/// A flip runs to completion inside one call, so `Flipping` is only ever
/// held while that call is on the stack. Callers that query the state
/// between calls see `WaitingForFlip` or `Stopped`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SchedulerState {
    /// Accepting events; the next frame boundary may flip.
    WaitingForFlip,
    /// A flip is in progress. Not observable between calls.
    Flipping,
    /// The session ended. No buffer is active.
    Stopped,
}

/// How buffers are exchanged at a flip.
enum Exchange {
    /// Callback-driven: the sink receives each frame.
    Sink {
        sink: Box<dyn FrameSink + Send>,
        bridge: FrameBuffer,
    },
    /// Externally owned: one buffer for the whole session.
    Fixed,
}

/// Performs frame flips for one tracing session.
pub(crate) struct FrameScheduler {
    config: FlipConfig,
    state: SchedulerState,
    shared: Arc<RecorderShared>,
    exchange: Exchange,
    capacity: usize,
    rate: RateLimit,
    active: FrameBuffer,
    frame_index: u64,
    started: HostTime,
    last_flip: HostTime,
    total_events: u64,
    overflowed: bool,
}

impl FrameScheduler {
    /// Starts a callback-driven session.
    ///
    /// Calls the sink's priming flip to obtain the first buffer and
    /// allocates the bridge buffer.
    pub(crate) fn with_sink(
        config: FlipConfig,
        shared: Arc<RecorderShared>,
        mut sink: Box<dyn FrameSink + Send>,
        capacity: usize,
        rate: RateLimit,
    ) -> Self {
        sink.begin(capacity);
        let now = shared.clock.now();
        let priming = FlipInfo::default();
        let bridge = FrameBuffer::new(capacity);
        let first = sink.flip(&priming, None);
        let active = Self::accept_returned(config, capacity, first, &bridge, None);
        Self::start(
            config,
            shared,
            Exchange::Sink { sink, bridge },
            active,
            capacity,
            rate,
            now,
        )
    }

    /// Starts an externally-owned session writing into `buffer`.
    pub(crate) fn with_buffer(
        config: FlipConfig,
        shared: Arc<RecorderShared>,
        buffer: FrameBuffer,
    ) -> Self {
        let now = shared.clock.now();
        let capacity = buffer.capacity();
        Self::start(
            config,
            shared,
            Exchange::Fixed,
            buffer,
            capacity,
            RateLimit::NONE,
            now,
        )
    }

    fn start(
        config: FlipConfig,
        shared: Arc<RecorderShared>,
        exchange: Exchange,
        active: FrameBuffer,
        capacity: usize,
        rate: RateLimit,
        now: HostTime,
    ) -> Self {
        active.core().open(now);
        shared.active.store(Some(Arc::clone(active.core())));
        Self {
            config,
            state: SchedulerState::WaitingForFlip,
            shared,
            exchange,
            capacity,
            rate,
            active,
            frame_index: 0,
            started: now,
            last_flip: now,
            total_events: 0,
            overflowed: false,
        }
    }

    pub(crate) fn state(&self) -> SchedulerState {
        self.state
    }

    /// Number of completed flips.
    pub(crate) fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Flips if the rate limit allows it.
    pub(crate) fn on_frame_boundary(&mut self) -> Option<FlipInfo> {
        if self.state != SchedulerState::WaitingForFlip {
            return None;
        }
        let now = self.shared.clock.now();
        if !self.rate.allows(now.saturating_duration_since(self.last_flip)) {
            return None;
        }
        self.flip_at(now)
    }

    /// Flips regardless of the rate limit.
    ///
    /// Returns `None` when stopped or in externally-owned mode, which never
    /// flips mid-session.
    pub(crate) fn flip_now(&mut self) -> Option<FlipInfo> {
        if self.state != SchedulerState::WaitingForFlip {
            return None;
        }
        let now = self.shared.clock.now();
        self.flip_at(now)
    }

    fn flip_at(&mut self, now: HostTime) -> Option<FlipInfo> {
        let Exchange::Sink { sink, bridge } = &mut self.exchange else {
            return None;
        };
        self.state = SchedulerState::Flipping;
        let spin = self.config.spin_iterations;

        bridge.core().open(now);
        self.shared.active.store(Some(Arc::clone(bridge.core())));
        let outgoing = self.active.clone();
        let counts = outgoing.core().seal(spin);

        self.frame_index += 1;
        self.total_events = self.total_events.saturating_add(counts.event_count);
        self.overflowed |= counts.overflowed;
        let summary = FlipInfo {
            frame_index: self.frame_index,
            frame_duration_ns: now.saturating_duration_since(self.last_flip).nanos(),
            event_count: saturate_u32(counts.event_count),
            did_run_out_of_event_memory: u32::from(counts.overflowed),
        };
        self.last_flip = now;

        if counts.overflowed {
            log::debug!(
                "frame {} ran out of event memory ({} events kept)",
                summary.frame_index,
                summary.event_count
            );
        } else {
            log::trace!(
                "frame {}: {} events in {}ns",
                summary.frame_index,
                summary.event_count,
                summary.frame_duration_ns
            );
        }

        let returned = sink.flip(&summary, Some(outgoing.clone()));
        let incoming =
            Self::accept_returned(self.config, self.capacity, returned, bridge, Some(outgoing));
        incoming.core().open(now);
        self.shared.active.store(Some(Arc::clone(incoming.core())));
        let caught = bridge.core().seal(spin);
        bridge.core().carry_into(caught.event_count, incoming.core());
        if caught.overflowed {
            incoming.core().mark_overflowed();
        }
        self.active = incoming;

        self.state = SchedulerState::WaitingForFlip;
        Some(summary)
    }

    /// Ends the session: performs the final flip, delivers the last frame,
    /// and reports totals.
    ///
    /// After this returns no buffer is active and appends are no-ops.
    /// Stopping twice returns `None`.
    pub(crate) fn stop(&mut self) -> Option<TraceInfo> {
        if self.state == SchedulerState::Stopped {
            return None;
        }
        let now = self.shared.clock.now();
        self.shared.active.store(None);
        let counts = self.active.core().seal(self.config.spin_iterations);
        self.state = SchedulerState::Stopped;

        self.total_events = self.total_events.saturating_add(counts.event_count);
        self.overflowed |= counts.overflowed;

        let exchange = core::mem::replace(&mut self.exchange, Exchange::Fixed);
        if let Exchange::Sink { mut sink, .. } = exchange {
            self.frame_index += 1;
            let summary = FlipInfo {
                frame_index: self.frame_index,
                frame_duration_ns: now.saturating_duration_since(self.last_flip).nanos(),
                event_count: saturate_u32(counts.event_count),
                did_run_out_of_event_memory: u32::from(counts.overflowed),
            };
            sink.finish(&summary, self.active.clone());
        }
        self.last_flip = now;

        Some(TraceInfo {
            duration_ns: now.saturating_duration_since(self.started).nanos(),
            event_count: saturate_u32(self.total_events),
            did_run_out_of_event_memory: u32::from(self.overflowed),
        })
    }

    fn accept_returned(
        config: FlipConfig,
        capacity: usize,
        returned: FrameBuffer,
        bridge: &FrameBuffer,
        outgoing: Option<FrameBuffer>,
    ) -> FrameBuffer {
        let problem = if returned.capacity() != capacity {
            "has the wrong capacity"
        } else if !returned.is_sealed() || FrameBuffer::ptr_eq(&returned, bridge) {
            "is still receiving events"
        } else {
            return returned;
        };
        log::warn!(
            "frame sink returned a buffer that {problem} (capacity {}, expected {capacity}); using {:?}",
            returned.capacity(),
            config.capacity_mismatch
        );
        match (config.capacity_mismatch, outgoing) {
            (CapacityMismatch::ReuseOutgoing, Some(outgoing)) => outgoing,
            _ => FrameBuffer::new(capacity),
        }
    }
}

impl Drop for FrameScheduler {
    fn drop(&mut self) {
        if self.state != SchedulerState::Stopped {
            self.shared.active.store(None);
            self.active.core().seal(self.config.spin_iterations);
        }
    }
}

impl fmt::Debug for FrameScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameScheduler")
            .field("state", &self.state)
            .field("capacity", &self.capacity)
            .field("rate", &self.rate)
            .field("frame_index", &self.frame_index)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

fn saturate_u32(n: u64) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
