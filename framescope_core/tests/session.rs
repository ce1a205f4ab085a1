// Copyright 2026 the Framescope Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! End-to-end session behavior through the public API.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use framescope_core::buffer::FrameBuffer;
use framescope_core::error::{ErrorCode, TraceError};
use framescope_core::host::{AlwaysAvailable, SwitchableHost};
use framescope_core::record::EventType;
use framescope_core::section::{SectionGroup, SectionGroups, SectionInfo};
use framescope_core::session::{SessionState, TraceMode, TraceSession};
use framescope_core::sink::{DoubleBufferSink, FlipInfo};
use framescope_core::thread::current_thread_id;
use framescope_core::time::{Duration, HostTime, ManualClock};

/// Sessions are process-wide; tests in this binary take turns.
static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(PoisonError::into_inner)
}

fn manual_session() -> (TraceSession<AlwaysAvailable, ManualClock>, ManualClock) {
    let clock = ManualClock::new(HostTime(1_000_000));
    (TraceSession::new(AlwaysAvailable, clock.clone()), clock)
}

/// Copies every delivered frame out of the sink.
type Delivered = Arc<Mutex<Vec<(FlipInfo, Vec<framescope_core::record::EventRecord>)>>>;

fn collecting_sink(
    delivered: &Delivered,
) -> DoubleBufferSink<impl FnMut(&FlipInfo, &FrameBuffer) + Send + 'static> {
    let delivered = Arc::clone(delivered);
    DoubleBufferSink::new(move |info: &FlipInfo, frame: &FrameBuffer| {
        delivered
            .lock()
            .unwrap()
            .push((*info, frame.to_vec()));
    })
}

#[test]
fn capacity_four_keeps_the_first_four_of_six() {
    let _serial = serial();
    let (mut session, _clock) = manual_session();
    let delivered = Delivered::default();
    session
        .begin_trace(TraceMode::callback(collecting_sink(&delivered), 0.0), 4)
        .unwrap();

    let recorder = session.recorder();
    let names = ["a", "b", "c"];
    for name in names {
        recorder.append(EventType::EnterSection, name, "g", 1, 0);
    }
    for name in names.iter().rev() {
        recorder.append(EventType::LeaveSection, name, "g", 1, 0);
    }

    let info = session.on_frame_boundary().unwrap();
    assert_eq!(info.event_count, 4);
    assert!(info.overflowed());

    let delivered = delivered.lock().unwrap();
    let (summary, events) = &delivered[0];
    assert_eq!(summary, &info);
    let order: Vec<_> = events
        .iter()
        .map(|e| (e.event_type, e.name.as_str()))
        .collect();
    assert_eq!(
        order,
        [
            (EventType::EnterSection, "a"),
            (EventType::EnterSection, "b"),
            (EventType::EnterSection, "c"),
            (EventType::LeaveSection, "c"),
        ]
    );
    drop(delivered);
    session.end_trace().unwrap();
}

#[test]
fn exact_capacity_is_not_overflow() {
    let _serial = serial();
    let (mut session, _clock) = manual_session();
    let buffer = FrameBuffer::new(5);
    session
        .begin_trace(TraceMode::external(buffer.clone()), 5)
        .unwrap();
    let recorder = session.recorder();
    for _ in 0..5 {
        recorder.append(EventType::EnterSection, "s", "", 1, 0);
    }
    assert_eq!(buffer.write_cursor(), 5);
    let info = session.end_trace().unwrap();
    assert_eq!(info.event_count, 5);
    assert!(!info.overflowed());
    assert!(!buffer.overflowed());
}

#[test]
fn one_past_capacity_is_dropped() {
    let _serial = serial();
    let (mut session, _clock) = manual_session();
    let buffer = FrameBuffer::new(5);
    session
        .begin_trace(TraceMode::external(buffer.clone()), 5)
        .unwrap();
    let recorder = session.recorder();
    for i in 0..6 {
        recorder.append(EventType::EnterSection, &format!("s{i}"), "", 1, 0);
    }
    assert_eq!(buffer.write_cursor(), 5);
    assert!(buffer.overflowed());
    let info = session.end_trace().unwrap();
    assert_eq!(info.event_count, 5);
    assert!(info.overflowed());
    assert!(buffer.events().all(|e| e.name.as_str() != "s5"));
}

#[test]
fn state_errors() {
    let _serial = serial();
    let (mut session, _clock) = manual_session();
    assert!(matches!(session.end_trace(), Err(TraceError::InvalidState(_))));
    session
        .begin_trace(TraceMode::external(FrameBuffer::new(2)), 2)
        .unwrap();
    let second = session.begin_trace(TraceMode::external(FrameBuffer::new(2)), 2);
    assert_eq!(ErrorCode::from(&second), ErrorCode::InvalidState);
    assert_eq!(session.state(), SessionState::Tracing);
    session.end_trace().unwrap();
    assert_eq!(session.state(), SessionState::Idle);
}

#[test]
fn argument_errors_leave_the_session_idle() {
    let _serial = serial();
    let (mut session, _clock) = manual_session();
    for capacity in [0, -1, i32::MIN] {
        let delivered = Delivered::default();
        let result =
            session.begin_trace(TraceMode::callback(collecting_sink(&delivered), 0.0), capacity);
        assert_eq!(ErrorCode::from(&result), ErrorCode::InvalidArgument);
        assert!(delivered.lock().unwrap().is_empty(), "sink untouched");
    }
    let missing_sink = TraceMode::Callback {
        sink: None,
        rate_seconds: 0.0,
    };
    assert_eq!(
        ErrorCode::from(&session.begin_trace(missing_sink, 8)),
        ErrorCode::InvalidArgument
    );
    let missing_buffer = TraceMode::External { buffer: None };
    assert_eq!(
        ErrorCode::from(&session.begin_trace(missing_buffer, 8)),
        ErrorCode::InvalidArgument
    );
    assert_eq!(session.state(), SessionState::Idle);
    assert!(!session.recorder().is_tracing());
}

#[test]
fn unavailable_engine_is_inert() {
    let _serial = serial();
    let host = Arc::new(SwitchableHost::new(false));
    let mut session = TraceSession::new(Arc::clone(&host), ManualClock::default());
    let buffer = FrameBuffer::new(8);

    let codes = [
        ErrorCode::from(&session.begin_trace(TraceMode::external(buffer.clone()), 8)),
        ErrorCode::from(&session.end_trace()),
        ErrorCode::from(&session.supports_native_event_trace()),
        ErrorCode::from(&session.supports_external_event_trace()),
    ];
    assert_eq!(codes, [ErrorCode::NotAvailable; 4]);
    assert_eq!(session.on_frame_boundary(), None);
    assert_eq!(session.flip_now(), None);
    assert!(!session.is_engine_available());
    assert_eq!(buffer.write_cursor(), 0);
    assert!(buffer.is_sealed());

    host.set_available(true);
    session
        .begin_trace(TraceMode::external(buffer.clone()), 8)
        .unwrap();
    session.recorder().append(EventType::EnterSection, "s", "", 1, 0);
    host.set_available(false);
    assert_eq!(session.end_trace(), Err(TraceError::NotAvailable));
    assert_eq!(session.state(), SessionState::Tracing, "rejected end has no effect");
    host.set_available(true);
    assert_eq!(session.end_trace().unwrap().event_count, 1);
}

#[test]
fn ending_always_returns_to_idle() {
    let _serial = serial();
    let (mut session, clock) = manual_session();
    for events in [0_usize, 1, 10] {
        let delivered = Delivered::default();
        session
            .begin_trace(TraceMode::callback(collecting_sink(&delivered), 0.0), 4)
            .unwrap();
        let recorder = session.recorder();
        for _ in 0..events {
            recorder.append(EventType::EnterSection, "s", "", 1, 0);
        }
        clock.advance(Duration(7));
        let info = session.end_trace().unwrap();
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(info.duration_ns, 7);
        assert_eq!(info.event_count as usize, events.min(4));
        assert_eq!(info.overflowed(), events > 4);
        assert_eq!(delivered.lock().unwrap().len(), 1, "final frame delivered");
    }
}

#[test]
fn callback_frames_are_numbered_and_timed() {
    let _serial = serial();
    let (mut session, clock) = manual_session();
    let delivered = Delivered::default();
    session
        .begin_trace(TraceMode::callback(collecting_sink(&delivered), 0.0), 16)
        .unwrap();
    let recorder = session.recorder();

    for frame in 1..=3_u64 {
        clock.advance(Duration(2_000));
        recorder.append(EventType::EnterSection, "tick", "", 1, 0);
        clock.advance(Duration(1_000));
        recorder.append(EventType::LeaveSection, "tick", "", 1, 0);
        clock.advance(Duration(13_000));
        let info = session.on_frame_boundary().unwrap();
        assert_eq!(info.frame_index, frame);
        assert_eq!(info.frame_duration_ns, 16_000);
        assert_eq!(info.event_count, 2);
    }
    assert_eq!(session.frame_index(), 3);
    let totals = session.end_trace().unwrap();
    assert_eq!(totals.event_count, 6);
    assert_eq!(totals.duration_ns, 48_000);

    let delivered = delivered.lock().unwrap();
    for (_, events) in delivered.iter().take(3) {
        let stamps: Vec<_> = events.iter().map(|e| e.timestamp_ns).collect();
        assert_eq!(stamps, [2_000, 3_000], "relative to each frame's flip");
    }
}

#[test]
fn rate_limit_gates_frame_boundaries() {
    let _serial = serial();
    let (mut session, clock) = manual_session();
    let delivered = Delivered::default();
    session
        .begin_trace(TraceMode::callback(collecting_sink(&delivered), 0.25), 8)
        .unwrap();
    let recorder = session.recorder();
    let mut flips = 0;
    // A 250ms window closes every 16 frames of 16ms.
    for _ in 0..60 {
        recorder.append(EventType::EnterSection, "frame", "", 1, 0);
        clock.advance(Duration(16_000_000));
        if session.on_frame_boundary().is_some() {
            flips += 1;
        }
    }
    assert_eq!(flips, 3);
    let totals = session.end_trace().unwrap();
    assert_eq!(totals.event_count, 8 * 4, "every window overflowed its 8 slots");
    assert!(totals.overflowed());
    let delivered = delivered.lock().unwrap();
    assert!(delivered.iter().take(3).all(|(info, _)| info.overflowed()));
}

#[test]
fn negative_rate_flips_every_frame() {
    let _serial = serial();
    let (mut session, _clock) = manual_session();
    let delivered = Delivered::default();
    session
        .begin_trace(TraceMode::callback(collecting_sink(&delivered), -1.0), 4)
        .unwrap();
    assert!(session.on_frame_boundary().is_some());
    assert!(session.on_frame_boundary().is_some());
    session.end_trace().unwrap();
}

#[test]
fn first_flip_hands_the_sink_no_buffer() {
    let _serial = serial();
    let (mut session, _clock) = manual_session();
    let calls = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&calls);
    let sink = move |info: &FlipInfo, outgoing: Option<FrameBuffer>| {
        seen.lock().unwrap().push((info.frame_index, outgoing.is_some()));
        outgoing.unwrap_or_else(|| FrameBuffer::new(8))
    };
    session.begin_trace(TraceMode::callback(sink, 0.0), 8).unwrap();
    session.on_frame_boundary();
    session.end_trace().unwrap();
    assert_eq!(*calls.lock().unwrap(), [(0, false), (1, true), (2, true)]);
}

/// Every buffer a consumer hands back receives exactly the next frame.
#[test]
fn consumer_buffers_receive_the_next_frame() {
    let _serial = serial();
    let (mut session, clock) = manual_session();
    let pool = [FrameBuffer::new(4), FrameBuffer::new(4)];
    let calls: Arc<Mutex<Vec<(FlipInfo, Option<FrameBuffer>, FrameBuffer)>>> = Arc::default();
    let sink = {
        let pool = pool.clone();
        let calls = Arc::clone(&calls);
        move |info: &FlipInfo, outgoing: Option<FrameBuffer>| {
            let next = match &outgoing {
                Some(frame) if FrameBuffer::ptr_eq(frame, &pool[0]) => pool[1].clone(),
                _ => pool[0].clone(),
            };
            if let Some(frame) = &outgoing {
                assert_eq!(frame.len(), info.event_count as usize);
                assert!(frame.events().all(|e| u64::from(e.color) == info.frame_index));
            }
            calls.lock().unwrap().push((*info, outgoing, next.clone()));
            next
        }
    };
    session.begin_trace(TraceMode::callback(sink, 0.0), 4).unwrap();
    let recorder = session.recorder();

    for frame in 1..=5_u32 {
        for _ in 0..3 {
            recorder.append(EventType::EnterSection, "work", "", 1, frame);
        }
        clock.advance(Duration(1_000));
        let info = session.on_frame_boundary().unwrap();
        assert_eq!(info.event_count, 3, "frame {frame}");
        assert!(!info.overflowed(), "frame {frame}");
    }
    session.end_trace().unwrap();

    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 7, "priming, five flips, final");
    for pair in calls.windows(2) {
        let (_, _, returned) = &pair[0];
        let (info, delivered, _) = &pair[1];
        let delivered = delivered.as_ref().unwrap();
        assert!(
            FrameBuffer::ptr_eq(returned, delivered),
            "frame {} came back in the buffer returned before it",
            info.frame_index
        );
    }
}

#[test]
fn external_buffer_collects_the_whole_session() {
    let _serial = serial();
    let (mut session, clock) = manual_session();
    let buffer = FrameBuffer::new(64);
    session
        .begin_trace(TraceMode::external(buffer.clone()), 64)
        .unwrap();

    let mut groups = SectionGroups::new();
    let render = groups.add(SectionGroup::new("Render", 0xff00_00ff)).unwrap();
    let group = groups.get_or_default(render);
    let recorder = session.recorder();
    let thread_id = current_thread_id();

    for _ in 0..3 {
        let _section = recorder.scoped(SectionInfo::in_group(&group, "Draw", thread_id));
        clock.advance(Duration(100));
        assert_eq!(session.on_frame_boundary(), None, "no flips mid-session");
    }
    assert!(buffer.is_empty(), "not readable while active");
    let info = session.end_trace().unwrap();
    assert_eq!(info.event_count, 6);
    assert_eq!(info.duration_ns, 300);

    let events = buffer.to_vec();
    assert_eq!(events.len(), 6);
    assert!(events.iter().all(|e| e.group_name.as_str() == "Render"));
    assert!(events.iter().all(|e| e.color == 0xff00_00ff));
    assert!(events.iter().all(|e| e.thread_id == thread_id));
    let stamps: Vec<_> = events.iter().map(|e| e.timestamp_ns).collect();
    assert_eq!(stamps, [0, 100, 100, 200, 200, 300], "relative to trace start");
}

#[test]
fn appends_after_end_are_dropped() {
    let _serial = serial();
    let (mut session, _clock) = manual_session();
    let buffer = FrameBuffer::new(4);
    session
        .begin_trace(TraceMode::external(buffer.clone()), 4)
        .unwrap();
    let recorder = session.recorder();
    recorder.append(EventType::EnterSection, "in", "", 1, 0);
    session.end_trace().unwrap();
    recorder.append(EventType::EnterSection, "out", "", 1, 0);
    assert!(!recorder.is_tracing());
    assert_eq!(buffer.len(), 1);
}
