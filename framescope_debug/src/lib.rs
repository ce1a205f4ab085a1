// Copyright 2026 the Framescope Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Development diagnostics for framescope sessions.
//!
//! This crate provides [`FrameSink`](framescope_core::sink::FrameSink)
//! implementations for looking at captured frames during development:
//!
//! - [`pretty::PrettyPrintSink`]: one human-readable line per frame, and
//!   optionally per event with section nesting shown by indentation.

pub mod pretty;
