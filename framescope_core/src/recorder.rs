// Copyright 2026 the Framescope Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The producer-side API.
//!
//! [`EventRecorder`] is a cloneable handle that any number of threads use to
//! append enter/leave events to whichever [`FrameBuffer`] is currently
//! active. It never blocks, never allocates, never fails visibly: when no
//! session is tracing the call is a single pointer load, and when the active
//! buffer is full the event is dropped and the buffer is flagged.
//!
//! [`FrameBuffer`]: crate::buffer::FrameBuffer

use core::fmt;
use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::buffer::{BufferCore, PushOutcome};
use crate::record::{EventRecord, EventType};
use crate::section::SectionInfo;
use crate::time::Clock;

/// State shared between the session and every recorder handle.
pub(crate) struct RecorderShared {
    /// The buffer producers write into; `None` while no session is tracing.
    pub(crate) active: ArcSwapOption<BufferCore>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl RecorderShared {
    pub(crate) fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            active: ArcSwapOption::const_empty(),
            clock,
        }
    }
}

/// Appends section events to the active frame buffer.
#[derive(Clone)]
pub struct EventRecorder {
    shared: Arc<RecorderShared>,
}

impl EventRecorder {
    pub(crate) fn new(shared: Arc<RecorderShared>) -> Self {
        Self { shared }
    }

    /// Whether events are currently being captured.
    #[must_use]
    pub fn is_tracing(&self) -> bool {
        self.shared.active.load().is_some()
    }

    /// Records one event.
    ///
    /// The timestamp is taken from the session clock, relative to the flip
    /// that opened the buffer the event lands in. Names longer than their
    /// fields are truncated. Safe to call from any thread at any time,
    /// including concurrently with a flip or with the end of the session.
    #[inline]
    pub fn append(
        &self,
        event_type: EventType,
        name: &str,
        group_name: &str,
        thread_id: u64,
        color: u32,
    ) {
        let mut flipped_out: Option<Arc<BufferCore>> = None;
        loop {
            let active = self.shared.active.load();
            let Some(buffer) = &*active else {
                return;
            };
            // A sealed buffer that is still published has no replacement yet.
            if flipped_out.as_ref().is_some_and(|b| Arc::ptr_eq(b, buffer)) {
                buffer.mark_overflowed();
                return;
            }
            let outcome = buffer.try_push(|origin| {
                let timestamp = self.shared.clock.now().saturating_duration_since(origin);
                EventRecord::new(
                    event_type,
                    name,
                    group_name,
                    thread_id,
                    color,
                    timestamp.nanos(),
                )
            });
            match outcome {
                PushOutcome::Written | PushOutcome::Overflowed => return,
                // Flipped out between the load and the reservation.
                PushOutcome::Sealed => flipped_out = Some(Arc::clone(buffer)),
            }
        }
    }

    /// Records entry into `section`.
    #[inline]
    pub fn enter_section(&self, section: &SectionInfo<'_>) {
        self.append(
            EventType::EnterSection,
            section.name,
            section.group_name,
            section.thread_id,
            section.color,
        );
    }

    /// Records exit from `section`.
    #[inline]
    pub fn leave_section(&self, section: &SectionInfo<'_>) {
        self.append(
            EventType::LeaveSection,
            section.name,
            section.group_name,
            section.thread_id,
            section.color,
        );
    }

    /// Records entry into `section` now and exit when the guard drops.
    #[must_use = "the section is left as soon as the guard is dropped"]
    pub fn scoped<'a>(&'a self, section: SectionInfo<'a>) -> SectionGuard<'a> {
        self.enter_section(&section);
        SectionGuard {
            recorder: self,
            section,
        }
    }
}

impl fmt::Debug for EventRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRecorder")
            .field("tracing", &self.is_tracing())
            .finish_non_exhaustive()
    }
}

/// Leaves a section on drop. Returned by [`EventRecorder::scoped`].
#[derive(Debug)]
pub struct SectionGuard<'a> {
    recorder: &'a EventRecorder,
    section: SectionInfo<'a>,
}

impl Drop for SectionGuard<'_> {
    fn drop(&mut self) {
        self.recorder.leave_section(&self.section);
    }
}
