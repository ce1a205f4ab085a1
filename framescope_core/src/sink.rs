// Copyright 2026 the Framescope Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame summaries and the consumer side of a flip.
//!
//! A [`FrameSink`] receives each completed [`FrameBuffer`] together with a
//! [`FlipInfo`] summary, and hands back the buffer that becomes active for
//! the next frame. The sink is called synchronously on the thread that
//! drives [`TraceSession::on_frame_boundary`]; producers never wait on it.
//!
//! Two ready-made sinks exist:
//!
//! - any `FnMut(&FlipInfo, Option<FrameBuffer>) -> FrameBuffer` closure, for
//!   consumers that manage buffer memory themselves;
//! - [`DoubleBufferSink`], which owns a pair of buffers, alternates between
//!   them, and only lends the completed one to a read-only consumer closure.
//!
//! [`TraceSession::on_frame_boundary`]: crate::session::TraceSession::on_frame_boundary

use crate::buffer::FrameBuffer;

/// Summary of one completed frame.
///
/// The layout is fixed so the value can be handed across a foreign boundary
/// unchanged.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(C)]
pub struct FlipInfo {
    /// 1-based index of the completed frame. Zero on the priming call made
    /// when a session starts.
    pub frame_index: u64,
    /// Time between the flip that opened the frame and the flip that closed
    /// it, in nanoseconds.
    pub frame_duration_ns: u64,
    /// Records stored in the outgoing buffer.
    pub event_count: u32,
    /// `1` if events were dropped because the buffer was full, else `0`.
    pub did_run_out_of_event_memory: u32,
}

impl FlipInfo {
    /// Whether events were dropped during the frame.
    #[must_use]
    pub const fn overflowed(&self) -> bool {
        self.did_run_out_of_event_memory != 0
    }
}

/// Aggregate summary returned when a session ends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(C)]
pub struct TraceInfo {
    /// Time from the start of the session to its end, in nanoseconds.
    pub duration_ns: u64,
    /// Records stored across all frames of the session.
    pub event_count: u32,
    /// `1` if any frame dropped events, else `0`.
    pub did_run_out_of_event_memory: u32,
}

impl TraceInfo {
    /// Whether any events were dropped during the session.
    #[must_use]
    pub const fn overflowed(&self) -> bool {
        self.did_run_out_of_event_memory != 0
    }
}

/// Consumer of completed frames in callback-driven mode.
pub trait FrameSink {
    /// Called once when a session starts, before the priming flip, with the
    /// session's buffer capacity.
    fn begin(&mut self, capacity: usize) {
        let _ = capacity;
    }

    /// Takes the completed frame and returns the buffer for the next one.
    ///
    /// `outgoing` is `None` on the priming call made when the session
    /// starts, since there is no previous frame; the buffer returned from
    /// that call receives the first frame. The buffer returned from every
    /// later call receives the frame that began at this flip. Events
    /// recorded while the sink runs are moved into it once it returns.
    ///
    /// The returned buffer must have the session's capacity and must not be
    /// receiving events, which holds for any buffer the session handed out
    /// earlier and for fresh allocations. It may be the outgoing buffer
    /// itself once the consumer is done reading it; any clones of a returned
    /// buffer will observe it being reset. Unusable buffers are replaced as
    /// [`FlipConfig::capacity_mismatch`] directs.
    ///
    /// [`FlipConfig::capacity_mismatch`]: crate::scheduler::FlipConfig::capacity_mismatch
    fn flip(&mut self, summary: &FlipInfo, outgoing: Option<FrameBuffer>) -> FrameBuffer;

    /// Takes the last frame of a session. No further buffer is needed.
    ///
    /// The default forwards to [`flip`](Self::flip) and drops the result.
    fn finish(&mut self, summary: &FlipInfo, outgoing: FrameBuffer) {
        drop(self.flip(summary, Some(outgoing)));
    }
}

impl<F> FrameSink for F
where
    F: FnMut(&FlipInfo, Option<FrameBuffer>) -> FrameBuffer,
{
    fn flip(&mut self, summary: &FlipInfo, outgoing: Option<FrameBuffer>) -> FrameBuffer {
        self(summary, outgoing)
    }
}

/// Engine-owned double buffering.
///
/// Two buffers serve the whole session. Each flip lends the completed one to
/// `consumer`, then hands back the other for the next frame and keeps the
/// completed one as the spare. The consumer never handles buffer memory.
pub struct DoubleBufferSink<F> {
    consumer: F,
    capacity: usize,
    spares: Vec<FrameBuffer>,
}

impl<F> DoubleBufferSink<F>
where
    F: FnMut(&FlipInfo, &FrameBuffer),
{
    /// Creates a sink that passes each completed frame to `consumer`.
    ///
    /// Buffers are allocated when the session starts.
    pub fn new(consumer: F) -> Self {
        Self {
            consumer,
            capacity: 0,
            spares: Vec::with_capacity(2),
        }
    }

    /// Returns the consumer, dropping the buffers.
    pub fn into_inner(self) -> F {
        self.consumer
    }

    fn take_spare(&mut self) -> FrameBuffer {
        self.spares
            .pop()
            .unwrap_or_else(|| FrameBuffer::new(self.capacity))
    }
}

impl<F> FrameSink for DoubleBufferSink<F>
where
    F: FnMut(&FlipInfo, &FrameBuffer),
{
    fn begin(&mut self, capacity: usize) {
        self.capacity = capacity;
        self.spares.retain(|b| b.capacity() == capacity);
        while self.spares.len() < 2 {
            self.spares.push(FrameBuffer::new(capacity));
        }
    }

    fn flip(&mut self, summary: &FlipInfo, outgoing: Option<FrameBuffer>) -> FrameBuffer {
        let Some(completed) = outgoing else {
            return self.take_spare();
        };
        (self.consumer)(summary, &completed);
        let next = self.take_spare();
        self.spares.push(completed);
        next
    }

    fn finish(&mut self, summary: &FlipInfo, outgoing: FrameBuffer) {
        (self.consumer)(summary, &outgoing);
        self.spares.push(outgoing);
    }
}

impl<F> core::fmt::Debug for DoubleBufferSink<F> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DoubleBufferSink")
            .field("capacity", &self.capacity)
            .field("spares", &self.spares.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summaries_have_boundary_layout() {
        assert_eq!(size_of::<FlipInfo>(), 24);
        assert_eq!(size_of::<TraceInfo>(), 16);
        assert_eq!(core::mem::offset_of!(FlipInfo, event_count), 16);
        assert_eq!(core::mem::offset_of!(TraceInfo, did_run_out_of_event_memory), 12);
    }

    #[test]
    fn overflow_flag_is_a_sentinel() {
        let info = FlipInfo {
            did_run_out_of_event_memory: 1,
            ..FlipInfo::default()
        };
        assert!(info.overflowed());
        assert!(!TraceInfo::default().overflowed());
    }

    #[test]
    fn double_buffer_alternates_two_buffers() {
        let mut seen = Vec::new();
        let mut sink = DoubleBufferSink::new(|info: &FlipInfo, _: &FrameBuffer| {
            seen.push(info.frame_index);
        });
        sink.begin(8);
        let a = sink.flip(&FlipInfo::default(), None);
        assert_eq!(a.capacity(), 8);

        let first = FlipInfo {
            frame_index: 1,
            ..FlipInfo::default()
        };
        let b = sink.flip(&first, Some(a.clone()));
        assert!(!FrameBuffer::ptr_eq(&a, &b));
        assert_eq!(b.capacity(), 8);

        let second = FlipInfo {
            frame_index: 2,
            ..FlipInfo::default()
        };
        let again = sink.flip(&second, Some(b));
        assert!(FrameBuffer::ptr_eq(&a, &again));

        drop(sink);
        assert_eq!(seen, [1, 2]);
    }

    #[test]
    fn finished_buffer_is_kept_for_the_next_session() {
        let mut sink = DoubleBufferSink::new(|_: &FlipInfo, _: &FrameBuffer| {});
        sink.begin(4);
        let a = sink.flip(&FlipInfo::default(), None);
        sink.finish(&FlipInfo::default(), a.clone());
        sink.begin(4);
        let again = sink.flip(&FlipInfo::default(), None);
        assert!(FrameBuffer::ptr_eq(&a, &again));
    }

    #[test]
    fn priming_call_does_not_reach_the_consumer() {
        let mut calls = 0;
        let mut sink = DoubleBufferSink::new(|_: &FlipInfo, _: &FrameBuffer| calls += 1);
        sink.begin(2);
        let buffer = sink.flip(&FlipInfo::default(), None);
        sink.finish(&FlipInfo::default(), buffer);
        drop(sink);
        assert_eq!(calls, 1);
    }

    #[test]
    fn begin_reallocates_on_capacity_change() {
        let mut sink = DoubleBufferSink::new(|_: &FlipInfo, _: &FrameBuffer| {});
        sink.begin(2);
        let buffer = sink.flip(&FlipInfo::default(), None);
        sink.finish(&FlipInfo::default(), buffer);
        sink.begin(5);
        assert_eq!(sink.flip(&FlipInfo::default(), None).capacity(), 5);
    }

    #[test]
    fn closures_are_sinks() {
        let mut sink = |_: &FlipInfo, outgoing: Option<FrameBuffer>| {
            outgoing.unwrap_or_else(|| FrameBuffer::new(3))
        };
        let buffer = FrameSink::flip(&mut sink, &FlipInfo::default(), None);
        assert_eq!(buffer.capacity(), 3);
    }
}
