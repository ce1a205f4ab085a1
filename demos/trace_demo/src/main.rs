// Copyright 2026 the Framescope Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Simulated host frame loop with several producer threads.
//!
//! Runs 60 frames of a fake engine twice: once in callback-driven mode,
//! printing frames as they complete (rate-limited to one flip per 100ms of
//! simulated time), and once in externally-owned mode, reading the caller's
//! buffer after the session ends.
//!
//! Pass `--events` to print every event, `--verbose` for session logs.

use std::thread;

use framescope_core::buffer::FrameBuffer;
use framescope_core::error::TraceError;
use framescope_core::host::AlwaysAvailable;
use framescope_core::recorder::EventRecorder;
use framescope_core::section::{SectionGroup, SectionGroups, SectionInfo};
use framescope_core::session::{TraceMode, TraceSession};
use framescope_core::thread::current_thread_id;
use framescope_core::time::{Clock, Duration, HostTime, ManualClock};
use framescope_debug::pretty::PrettyPrintSink;

const FRAMES: u32 = 60;
const WORKERS: usize = 3;
const FRAME_NS: u64 = 16_666_667;

/// Group ids registered at startup.
struct Groups {
    registry: SectionGroups,
    main: u32,
    jobs: u32,
}

impl Groups {
    fn new() -> Self {
        let mut registry = SectionGroups::new();
        let main = registry
            .add(SectionGroup::new("Main", 0x2d89_efff))
            .unwrap_or_default();
        let jobs = registry
            .add(SectionGroup::new("Jobs", 0xef8b_2dff))
            .unwrap_or_default();
        Self {
            registry,
            main,
            jobs,
        }
    }
}

/// One frame of fake work: the main thread updates and renders while
/// workers run jobs.
fn run_frame(recorder: &EventRecorder, groups: &Groups, clock: &ManualClock, frame: u32) {
    let main = groups.registry.get_or_default(groups.main);
    let jobs = groups.registry.get_or_default(groups.jobs);
    let thread_id = current_thread_id();

    let _frame = recorder.scoped(SectionInfo::in_group(&main, "Frame", thread_id));
    {
        let _update = recorder.scoped(SectionInfo::in_group(&main, "Update", thread_id));
        clock.advance(Duration(4_000_000));
    }
    thread::scope(|scope| {
        for worker in 0..WORKERS {
            scope.spawn(move || {
                let thread_id = current_thread_id();
                // Uneven job counts so frames differ in size.
                let count = 1 + (frame as usize + worker) % 3;
                for _ in 0..count {
                    let _job = recorder.scoped(SectionInfo::in_group(&jobs, "Job", thread_id));
                }
            });
        }
    });
    let _render = recorder.scoped(SectionInfo::in_group(&main, "Render", thread_id));
    clock.advance(Duration(8_000_000));
}

fn callback_mode(show_events: bool, groups: &Groups) -> Result<(), TraceError> {
    println!("== callback-driven mode ==");
    let clock = ManualClock::new(HostTime(0));
    let mut session = TraceSession::new(AlwaysAvailable, clock.clone());
    let sink = PrettyPrintSink::with_writer(std::io::stdout());
    let sink = if show_events { sink.with_events() } else { sink };
    session.begin_trace(TraceMode::callback(sink, 0.1), 256)?;

    let recorder = session.recorder();
    for frame in 0..FRAMES {
        let start = clock.now();
        run_frame(&recorder, groups, &clock, frame);
        clock.set(start + Duration(FRAME_NS));
        session.on_frame_boundary();
    }
    let info = session.end_trace()?;
    println!(
        "trace: {:.1}ms, {} events, out of memory: {}",
        info.duration_ns as f64 / 1e6,
        info.event_count,
        info.overflowed(),
    );
    Ok(())
}

fn external_mode(show_events: bool, groups: &Groups) -> Result<(), TraceError> {
    println!("== externally-owned mode ==");
    const CAPACITY: i32 = 1024;
    let clock = ManualClock::new(HostTime(0));
    let mut session = TraceSession::new(AlwaysAvailable, clock.clone());
    let buffer = FrameBuffer::new(CAPACITY as usize);
    session.begin_trace(TraceMode::external(buffer.clone()), CAPACITY)?;

    let recorder = session.recorder();
    for frame in 0..FRAMES {
        let start = clock.now();
        run_frame(&recorder, groups, &clock, frame);
        clock.set(start + Duration(FRAME_NS));
        session.on_frame_boundary();
    }
    let info = session.end_trace()?;
    println!(
        "trace: {:.1}ms, {} of {} slots used, out of memory: {}",
        info.duration_ns as f64 / 1e6,
        info.event_count,
        buffer.capacity(),
        info.overflowed(),
    );
    if show_events {
        for event in buffer.events().take(16) {
            println!(
                "  {:>10.1}µs thread={:<4} {:?} {}/{}",
                event.timestamp_ns as f64 / 1e3,
                event.thread_id,
                event.event_type,
                event.group_name.as_str(),
                event.name.as_str(),
            );
        }
    }
    Ok(())
}

fn main() -> Result<(), TraceError> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let show_events = args.iter().any(|a| a == "--events");
    if args.iter().any(|a| a == "--verbose") {
        // Also forwards the engine's `log` records.
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(std::io::stderr)
            .init();
    }

    let groups = Groups::new();
    callback_mode(show_events, &groups)?;
    external_mode(show_events, &groups)?;
    Ok(())
}
