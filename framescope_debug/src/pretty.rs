// Copyright 2026 the Framescope Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable frame output.
//!
//! [`PrettyPrintSink`] implements [`FrameSink`] and writes one line per
//! completed frame to a [`Write`](std::io::Write) destination (default:
//! stderr). With [`with_events`](PrettyPrintSink::with_events) it also writes
//! one line per event, indented by the section nesting depth of the event's
//! thread. Timestamps are printed in microseconds.
//!
//! The sink reads each frame synchronously and hands the same buffer back
//! to receive the next frame, so a single buffer serves the whole session.

use std::collections::HashMap;
use std::io::Write;

use framescope_core::buffer::FrameBuffer;
use framescope_core::record::{EventRecord, EventType};
use framescope_core::sink::{FlipInfo, FrameSink};

/// Writes human-readable frame lines to a [`Write`](std::io::Write)
/// destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write + Send>> {
    writer: W,
    capacity: usize,
    events: bool,
    depth: HashMap<u64, usize>,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink")
            .field("capacity", &self.capacity)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes frame summaries to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::with_writer(Box::new(std::io::stderr()))
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self {
            writer,
            capacity: 0,
            events: false,
            depth: HashMap::new(),
        }
    }

    /// Also print every event of every frame.
    #[must_use]
    pub fn with_events(mut self) -> Self {
        self.events = true;
        self
    }

    /// Consumes the sink and returns the destination.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_summary(&mut self, info: &FlipInfo) {
        let memory = if info.overflowed() { "OUT" } else { "ok" };
        let _ = writeln!(
            self.writer,
            "[frame] index={} duration={:.1}µs events={} memory={memory}",
            info.frame_index,
            ns_to_us(info.frame_duration_ns),
            info.event_count,
        );
    }

    fn write_event(&mut self, e: &EventRecord) {
        let depth = self.depth.entry(e.thread_id).or_default();
        let (marker, indent) = match e.event_type {
            EventType::EnterSection => {
                let indent = *depth;
                *depth += 1;
                ("enter", indent)
            }
            EventType::LeaveSection => {
                // Leaves without a matching enter start at the left margin.
                *depth = depth.saturating_sub(1);
                ("leave", *depth)
            }
        };
        let _ = writeln!(
            self.writer,
            "  {:>10.1}µs thread={:<4} {:indent$}{marker} {}/{}",
            ns_to_us(e.timestamp_ns),
            e.thread_id,
            "",
            e.group_name.as_str(),
            e.name.as_str(),
            indent = indent * 2,
        );
    }
}

fn ns_to_us(ns: u64) -> f64 {
    ns as f64 / 1000.0
}

impl<W: Write> FrameSink for PrettyPrintSink<W> {
    fn begin(&mut self, capacity: usize) {
        self.capacity = capacity;
        self.depth.clear();
    }

    fn flip(&mut self, summary: &FlipInfo, outgoing: Option<FrameBuffer>) -> FrameBuffer {
        let Some(frame) = outgoing else {
            return FrameBuffer::new(self.capacity);
        };
        self.write_summary(summary);
        if self.events {
            for event in frame.events() {
                self.write_event(&event);
            }
        }
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use framescope_core::host::AlwaysAvailable;
    use framescope_core::session::{TraceMode, TraceSession};
    use framescope_core::time::{Duration, HostTime, ManualClock};

    #[test]
    fn pretty_print_summary() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        sink.begin(4);
        let buffer = sink.flip(&FlipInfo::default(), None);
        assert_eq!(buffer.capacity(), 4);
        sink.flip(
            &FlipInfo {
                frame_index: 3,
                frame_duration_ns: 16_600_000,
                event_count: 0,
                did_run_out_of_event_memory: 1,
            },
            Some(buffer),
        );
        let output = String::from_utf8(sink.into_inner()).unwrap();
        assert!(output.contains("[frame] index=3"), "got: {output}");
        assert!(output.contains("duration=16600.0µs"), "got: {output}");
        assert!(output.contains("memory=OUT"), "got: {output}");
        assert_eq!(output.lines().count(), 1, "priming call prints nothing");
    }

    #[test]
    fn pretty_print_events_with_nesting() {
        let clock = ManualClock::new(HostTime(0));
        let mut session = TraceSession::new(AlwaysAvailable, clock.clone());
        let (tx, rx) = std::sync::mpsc::channel();
        let sink = PrettyPrintSink::with_writer(ChannelWriter(tx)).with_events();
        session.begin_trace(TraceMode::callback(sink, 0.0), 8).unwrap();

        let recorder = session.recorder();
        recorder.append(EventType::EnterSection, "Frame", "Main", 1, 0);
        clock.advance(Duration(1_500));
        recorder.append(EventType::EnterSection, "Physics", "Main", 1, 0);
        recorder.append(EventType::LeaveSection, "Physics", "Main", 1, 0);
        recorder.append(EventType::LeaveSection, "Frame", "Main", 1, 0);
        session.on_frame_boundary();
        session.end_trace().unwrap();
        drop(session);

        let output = String::from_utf8(rx.try_iter().flatten().collect()).unwrap();
        let lines: Vec<_> = output.lines().collect();
        assert!(lines[0].starts_with("[frame] index=1"), "got: {output}");
        assert!(lines[1].ends_with("thread=1    enter Main/Frame"), "got: {output}");
        assert!(lines[2].ends_with("thread=1      enter Main/Physics"), "got: {output}");
        assert!(lines[3].ends_with("thread=1      leave Main/Physics"), "got: {output}");
        assert!(lines[4].ends_with("thread=1    leave Main/Frame"), "got: {output}");
        assert!(lines[2].contains("1.5µs"), "got: {output}");
        assert!(lines[5].starts_with("[frame] index=2"), "got: {output}");
    }

    /// Sends written bytes to the test thread.
    struct ChannelWriter(std::sync::mpsc::Sender<Vec<u8>>);

    impl Write for ChannelWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let _ = self.0.send(buf.to_vec());
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
