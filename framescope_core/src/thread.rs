// Copyright 2026 the Framescope Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Stable per-thread identifiers.

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// Zero until the thread first asks for its id.
    static THREAD_ID: Cell<u64> = const { Cell::new(0) };
}

/// Returns an identifier for the calling thread.
///
/// Ids are non-zero, unique within the process, and stable for the thread's
/// lifetime. The first call on a thread assigns the id; later calls are a
/// thread-local read.
#[inline]
#[must_use]
pub fn current_thread_id() -> u64 {
    THREAD_ID.with(|cell| {
        let id = cell.get();
        if id != 0 {
            return id;
        }
        let id = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
        cell.set(id);
        id
    })
}
