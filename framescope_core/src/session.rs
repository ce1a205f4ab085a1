// Copyright 2026 the Framescope Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The tracing session state machine.
//!
//! A [`TraceSession`] is `Idle` until [`begin_trace`](TraceSession::begin_trace)
//! succeeds, then `Tracing` until [`end_trace`](TraceSession::end_trace).
//! While tracing, producers append through [`EventRecorder`] handles and the
//! host drives frames through [`on_frame_boundary`](TraceSession::on_frame_boundary).
//!
//! Every operation first asks the [`Host`] whether the engine is available,
//! then checks the session state, then validates arguments. A rejected
//! operation leaves the session exactly as it was.
//!
//! At most one session per process may be tracing at a time. Starting a
//! second one fails with [`TraceError::InvalidState`] until the first ends or
//! is dropped.

use core::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::buffer::FrameBuffer;
use crate::error::TraceError;
use crate::host::Host;
use crate::recorder::{EventRecorder, RecorderShared};
use crate::scheduler::{FlipConfig, FrameScheduler, RateLimit, SchedulerState};
use crate::sink::{FlipInfo, FrameSink, TraceInfo};
use crate::time::Clock;

/// Set while any session in the process is tracing.
static ACTIVE_SESSION: AtomicBool = AtomicBool::new(false);

/// Phase of a [`TraceSession`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Not tracing. Appends are no-ops.
    Idle,
    /// Capturing events.
    Tracing,
}

/// How buffer memory is owned during a session.
///
/// Missing sinks and buffers are representable so that foreign callers
/// passing null can be rejected with [`TraceError::InvalidArgument`].
pub enum TraceMode {
    /// The engine owns buffer memory and hands each completed frame to
    /// `sink`, at most once every `rate_seconds`.
    Callback {
        /// Receiver of completed frames.
        sink: Option<Box<dyn FrameSink + Send>>,
        /// Minimum time between flips. Negative values clamp to zero.
        rate_seconds: f32,
    },
    /// The caller owns a single buffer that collects every event of the
    /// session. No flips happen until the session ends.
    External {
        /// Caller-allocated storage. Its capacity must equal the capacity
        /// passed to [`TraceSession::begin_trace`].
        buffer: Option<FrameBuffer>,
    },
}

impl TraceMode {
    /// Callback-driven mode delivering frames to `sink`.
    pub fn callback(sink: impl FrameSink + Send + 'static, rate_seconds: f32) -> Self {
        Self::Callback {
            sink: Some(Box::new(sink)),
            rate_seconds,
        }
    }

    /// Externally-owned mode accumulating into `buffer`.
    ///
    /// Keep a clone of `buffer` to read the events after
    /// [`TraceSession::end_trace`].
    #[must_use]
    pub fn external(buffer: FrameBuffer) -> Self {
        Self::External {
            buffer: Some(buffer),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Callback { .. } => "callback",
            Self::External { .. } => "external",
        }
    }
}

impl fmt::Debug for TraceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Callback { sink, rate_seconds } => f
                .debug_struct("Callback")
                .field("sink", &sink.as_ref().map(|_| ".."))
                .field("rate_seconds", rate_seconds)
                .finish(),
            Self::External { buffer } => {
                f.debug_struct("External").field("buffer", buffer).finish()
            }
        }
    }
}

/// A tracing session bound to a host and a clock.
///
/// # Usage
///
/// ```rust,ignore
/// let mut session = TraceSession::new(AlwaysAvailable, MonotonicClock::new());
/// let sink = DoubleBufferSink::new(|info: &FlipInfo, frame: &FrameBuffer| {
///     println!("frame {}: {} events", info.frame_index, frame.len());
/// });
/// session.begin_trace(TraceMode::callback(sink, 0.0), 4096)?;
/// let recorder = session.recorder();
/// // ... recorder.enter_section(..) / leave_section(..) on any thread ...
/// session.on_frame_boundary();
/// let totals = session.end_trace()?;
/// ```
pub struct TraceSession<H, C> {
    host: H,
    clock: Arc<C>,
    config: FlipConfig,
    shared: Arc<RecorderShared>,
    scheduler: Option<FrameScheduler>,
}

impl<H: Host, C: Clock + 'static> TraceSession<H, C> {
    /// Creates an idle session with the default [`FlipConfig`].
    pub fn new(host: H, clock: C) -> Self {
        Self::with_config(host, clock, FlipConfig::default())
    }

    /// Creates an idle session.
    pub fn with_config(host: H, clock: C, config: FlipConfig) -> Self {
        let clock = Arc::new(clock);
        let shared = Arc::new(RecorderShared::new(Arc::clone(&clock) as Arc<dyn Clock>));
        Self {
            host,
            clock,
            config,
            shared,
            scheduler: None,
        }
    }

    /// Starts capturing events with room for `capacity` events per buffer.
    ///
    /// # Errors
    ///
    /// - [`TraceError::NotAvailable`] if the host engine is unavailable.
    /// - [`TraceError::InvalidState`] if this or another session in the
    ///   process is already tracing.
    /// - [`TraceError::InvalidArgument`] if `capacity` is not positive, the
    ///   sink or buffer is missing, or the buffer's capacity differs from
    ///   `capacity`.
    pub fn begin_trace(&mut self, mode: TraceMode, capacity: i32) -> Result<(), TraceError> {
        self.ensure_available()?;
        if self.scheduler.is_some() {
            return Err(rejected(TraceError::InvalidState("a trace is already running")));
        }
        let capacity = usize::try_from(capacity)
            .ok()
            .filter(|&c| c > 0)
            .ok_or_else(|| rejected(TraceError::InvalidArgument("capacity must be positive")))?;
        let mode_name = mode.name();
        let start = match mode {
            TraceMode::Callback { sink, rate_seconds } => {
                let sink = sink
                    .ok_or_else(|| rejected(TraceError::InvalidArgument("frame sink is missing")))?;
                Start::Sink(sink, clamp_rate(rate_seconds))
            }
            TraceMode::External { buffer } => {
                let buffer = buffer.ok_or_else(|| {
                    rejected(TraceError::InvalidArgument("event buffer is missing"))
                })?;
                if buffer.capacity() != capacity {
                    return Err(rejected(TraceError::InvalidArgument(
                        "event buffer capacity does not match",
                    )));
                }
                Start::Buffer(buffer)
            }
        };
        if ACTIVE_SESSION
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(rejected(TraceError::InvalidState(
                "another trace session is active",
            )));
        }

        let shared = Arc::clone(&self.shared);
        self.scheduler = Some(match start {
            Start::Sink(sink, rate) => {
                FrameScheduler::with_sink(self.config, shared, sink, capacity, rate)
            }
            Start::Buffer(buffer) => FrameScheduler::with_buffer(self.config, shared, buffer),
        });
        log::debug!("trace started: {mode_name} mode, capacity {capacity}");
        Ok(())
    }

    /// Stops capturing, performs the final flip, and returns totals for the
    /// whole session.
    ///
    /// # Errors
    ///
    /// - [`TraceError::NotAvailable`] if the host engine is unavailable.
    /// - [`TraceError::InvalidState`] if the session is idle.
    pub fn end_trace(&mut self) -> Result<TraceInfo, TraceError> {
        self.ensure_available()?;
        let Some(mut scheduler) = self.scheduler.take() else {
            return Err(rejected(TraceError::InvalidState("no trace is running")));
        };
        let info = scheduler.stop().unwrap_or_default();
        drop(scheduler);
        ACTIVE_SESSION.store(false, Ordering::Release);
        log::debug!(
            "trace ended: {} events over {}ns{}",
            info.event_count,
            info.duration_ns,
            if info.overflowed() { ", ran out of event memory" } else { "" }
        );
        Ok(info)
    }

    /// Notifies the session that the host finished a frame.
    ///
    /// In callback-driven mode this flips when the rate limit allows and
    /// returns the summary of the completed frame. Otherwise, and while idle
    /// or unavailable, it does nothing.
    pub fn on_frame_boundary(&mut self) -> Option<FlipInfo> {
        if !self.host.is_engine_available() {
            return None;
        }
        self.scheduler.as_mut()?.on_frame_boundary()
    }

    /// Flips immediately, ignoring the rate limit.
    ///
    /// Returns `None` under the same conditions as
    /// [`on_frame_boundary`](Self::on_frame_boundary).
    pub fn flip_now(&mut self) -> Option<FlipInfo> {
        if !self.host.is_engine_available() {
            return None;
        }
        self.scheduler.as_mut()?.flip_now()
    }

    /// Returns a handle producers use to append events.
    ///
    /// Handles stay valid across sessions: they record whenever this session
    /// is tracing.
    #[must_use]
    pub fn recorder(&self) -> EventRecorder {
        EventRecorder::new(Arc::clone(&self.shared))
    }

    /// Current phase.
    #[must_use]
    pub fn state(&self) -> SessionState {
        if self.scheduler.is_some() {
            SessionState::Tracing
        } else {
            SessionState::Idle
        }
    }

    /// Scheduler phase, if tracing.
    #[must_use]
    pub fn scheduler_state(&self) -> Option<SchedulerState> {
        self.scheduler.as_ref().map(FrameScheduler::state)
    }

    /// Frames completed in the current session. Zero while idle.
    #[must_use]
    pub fn frame_index(&self) -> u64 {
        self.scheduler.as_ref().map_or(0, FrameScheduler::frame_index)
    }

    /// Whether the host engine is available.
    #[must_use]
    pub fn is_engine_available(&self) -> bool {
        self.host.is_engine_available()
    }

    /// Whether the host exposes the platform's own tracer.
    ///
    /// # Errors
    ///
    /// [`TraceError::NotAvailable`] if the host engine is unavailable.
    pub fn supports_native_event_trace(&self) -> Result<bool, TraceError> {
        self.ensure_available()?;
        Ok(self.host.supports_native_event_trace())
    }

    /// Whether the host exposes an externally linked tracer.
    ///
    /// # Errors
    ///
    /// [`TraceError::NotAvailable`] if the host engine is unavailable.
    pub fn supports_external_event_trace(&self) -> Result<bool, TraceError> {
        self.ensure_available()?;
        Ok(self.host.supports_external_event_trace())
    }

    /// The host.
    #[must_use]
    pub fn host(&self) -> &H {
        &self.host
    }

    /// The session clock.
    #[must_use]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn ensure_available(&self) -> Result<(), TraceError> {
        if self.host.is_engine_available() {
            Ok(())
        } else {
            Err(rejected(TraceError::NotAvailable))
        }
    }
}

impl<H, C> Drop for TraceSession<H, C> {
    fn drop(&mut self) {
        if let Some(mut scheduler) = self.scheduler.take() {
            log::debug!("trace session dropped while tracing; delivering the last frame");
            scheduler.stop();
            drop(scheduler);
            ACTIVE_SESSION.store(false, Ordering::Release);
        }
    }
}

impl<H: fmt::Debug, C> fmt::Debug for TraceSession<H, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceSession")
            .field("host", &self.host)
            .field("config", &self.config)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

enum Start {
    Sink(Box<dyn FrameSink + Send>, RateLimit),
    Buffer(FrameBuffer),
}

fn clamp_rate(rate_seconds: f32) -> RateLimit {
    if rate_seconds.is_nan() || rate_seconds < 0.0 {
        log::debug!("trace rate {rate_seconds}s clamped to 0s");
    }
    RateLimit::from_secs_f32(rate_seconds)
}

fn rejected(err: TraceError) -> TraceError {
    log::debug!("trace operation rejected: {err}");
    err
}
