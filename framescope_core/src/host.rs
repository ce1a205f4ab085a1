// Copyright 2026 the Framescope Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Contract with the embedding host.
//!
//! Framescope does not know what engine it runs inside. The host supplies:
//!
//! - **Availability**: [`Host::is_engine_available`] is consulted before
//!   every session operation. While it returns `false`, operations fail with
//!   [`TraceError::NotAvailable`](crate::error::TraceError::NotAvailable)
//!   and touch nothing.
//!
//! - **Capabilities**: pure queries about platform tracers the host can
//!   forward sections to alongside the recorder.
//!
//! - **Frame boundaries**: not a trait method. The host's render or update
//!   loop calls [`TraceSession::on_frame_boundary`] exactly once per frame,
//!   on the thread that owns the session.
//!
//! - **Time**: a [`Clock`](crate::time::Clock), passed to the session
//!   separately so tests can drive it by hand.
//!
//! # Frame loop pseudocode
//!
//! ```rust,ignore
//! let mut session = TraceSession::new(host, MonotonicClock::new());
//! session.begin_trace(TraceMode::callback(sink, 0.0), 4096)?;
//! let recorder = session.recorder();
//! // hand `recorder` clones to worker threads ...
//! loop {
//!     run_frame(&recorder);
//!     session.on_frame_boundary();
//! }
//! ```
//!
//! [`TraceSession::on_frame_boundary`]: crate::session::TraceSession::on_frame_boundary

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Queries the session makes of its host.
pub trait Host {
    /// Whether the host engine is initialized and able to trace.
    fn is_engine_available(&self) -> bool;

    /// Whether the platform's own tracer (e.g. Android `ATrace`) is present.
    fn supports_native_event_trace(&self) -> bool {
        false
    }

    /// Whether an externally linked tracer is present.
    fn supports_external_event_trace(&self) -> bool {
        false
    }
}

impl<H: Host + ?Sized> Host for Arc<H> {
    fn is_engine_available(&self) -> bool {
        (**self).is_engine_available()
    }

    fn supports_native_event_trace(&self) -> bool {
        (**self).supports_native_event_trace()
    }

    fn supports_external_event_trace(&self) -> bool {
        (**self).supports_external_event_trace()
    }
}

/// A host that is always available and has no platform tracers.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysAvailable;

impl Host for AlwaysAvailable {
    fn is_engine_available(&self) -> bool {
        true
    }
}

/// A host whose availability can be toggled at runtime.
///
/// Useful for hosts that initialize lazily, and for exercising the
/// not-available paths.
#[derive(Debug, Default)]
pub struct SwitchableHost {
    available: AtomicBool,
    native: bool,
    external: bool,
}

impl SwitchableHost {
    /// Creates a host with the given initial availability and no platform
    /// tracers.
    #[must_use]
    pub const fn new(available: bool) -> Self {
        Self {
            available: AtomicBool::new(available),
            native: false,
            external: false,
        }
    }

    /// Declares which platform tracers the host exposes.
    #[must_use]
    pub const fn with_capabilities(mut self, native: bool, external: bool) -> Self {
        self.native = native;
        self.external = external;
        self
    }

    /// Changes availability.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }
}

impl Host for SwitchableHost {
    fn is_engine_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    fn supports_native_event_trace(&self) -> bool {
        self.native
    }

    fn supports_external_event_trace(&self) -> bool {
        self.external
    }
}
