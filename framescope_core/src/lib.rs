// Copyright 2026 the Framescope Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Low-overhead capture of enter/leave section events, delivered per frame.
//!
//! `framescope_core` lets any number of threads record timestamped
//! "entered section" / "left section" events into a fixed-capacity buffer
//! without locks or allocation, while a single frame thread periodically
//! flips the buffer out and hands the completed frame to a consumer.
//!
//! # Architecture
//!
//! ```text
//!   producer threads                       host frame loop
//!        │                                       │
//!        ▼                                       ▼
//!   EventRecorder::append ──► active   TraceSession::on_frame_boundary
//!                             FrameBuffer        │
//!                                 ▲              ▼
//!                                 │      FrameScheduler flip
//!                                 │  (bridge, seal, summarize)
//!                                 │              │
//!                                 └── returned ◄─┴──► FrameSink::flip
//!                                                      (FlipInfo, outgoing)
//! ```
//!
//! **[`session`]**: [`TraceSession`](session::TraceSession), the
//! `Idle`/`Tracing` state machine. Validates every operation against the
//! [`Host`](host::Host), and allows one tracing session per process.
//!
//! **[`recorder`]**: [`EventRecorder`](recorder::EventRecorder), the
//! cloneable producer handle. Appends never block and never fail visibly.
//!
//! **[`buffer`]**: [`FrameBuffer`](buffer::FrameBuffer), fixed-capacity
//! event storage with a saturating write cursor and an overflow flag.
//!
//! **[`scheduler`]**: Rate-gated buffer flips and their configuration.
//!
//! **[`sink`]**: The [`FrameSink`](sink::FrameSink) consumer trait and the
//! [`FlipInfo`](sink::FlipInfo) / [`TraceInfo`](sink::TraceInfo) summaries.
//!
//! **[`record`]**: The fixed-layout [`EventRecord`](record::EventRecord).
//!
//! **[`section`]**: Section descriptions and the section group registry.
//!
//! **[`host`]**, **[`time`]**, **[`thread`]**: Host contract, clocks, and
//! thread identity.
//!
//! **[`error`]**: [`TraceError`](error::TraceError) and the boundary
//! [`ErrorCode`](error::ErrorCode) values.
//!
//! # Operating modes
//!
//! - **Callback-driven**: the engine owns buffer memory. Each frame boundary
//!   (subject to a rate limit) flips the active buffer and passes the
//!   completed one to a [`FrameSink`](sink::FrameSink).
//! - **Externally owned**: the caller supplies one buffer that collects the
//!   whole session; it is sealed and summarized by
//!   [`end_trace`](session::TraceSession::end_trace).

pub mod buffer;
pub mod error;
pub mod host;
pub mod record;
pub mod recorder;
pub mod scheduler;
pub mod section;
pub mod session;
pub mod sink;
pub mod thread;
pub mod time;
