// Copyright 2026 the Framescope Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fixed-capacity, append-only event storage.
//!
//! A [`FrameBuffer`] is a cheap, cloneable handle to a slot array sized once
//! at construction. Each slot is a row of atomic words, so producers on any
//! thread can fill slots concurrently without locks and without `unsafe`.
//!
//! # Write protocol
//!
//! The buffer keeps a reservation cursor whose top bit is the *sealed* flag:
//!
//! 1. A producer `fetch_add`s the cursor. If the previous value carries the
//!    sealed bit, the buffer has been flipped out and the producer must retry
//!    against the newly active buffer. Otherwise the previous value is the
//!    producer's unique slot index.
//! 2. An index at or past capacity marks the buffer overflowed and the event
//!    is dropped.
//! 3. Otherwise the producer stores the record's words into its slot and
//!    bumps the commit counter with `Release` ordering.
//!
//! The flip seals the buffer with a single `fetch_or`, which fixes the number
//! of reserved slots, then waits for the commit counter to reach that number.
//! Once it does, every record in the buffer is visible to the thread that
//! observed the final commit count.

use core::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::record::{EventRecord, RECORD_WORDS};
use crate::time::HostTime;

const SEALED: u64 = 1 << 63;

#[derive(Default)]
struct Slot {
    words: [AtomicU64; RECORD_WORDS],
}

/// Shared state behind a [`FrameBuffer`] handle.
pub(crate) struct BufferCore {
    slots: Box<[Slot]>,
    cursor: AtomicU64,
    committed: AtomicU64,
    overflowed: AtomicBool,
    origin: AtomicU64,
}

/// Result of a single write attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PushOutcome {
    /// The record was stored.
    Written,
    /// The buffer was full; the record was dropped.
    Overflowed,
    /// The buffer has been flipped out; retry against the active buffer.
    Sealed,
}

/// Counts fixed by sealing a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct SealedCounts {
    /// Records written (never more than capacity).
    pub(crate) event_count: u64,
    /// Whether any write attempt found the buffer full.
    pub(crate) overflowed: bool,
}

impl BufferCore {
    fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| Slot::default()).collect(),
            // Fresh buffers refuse writes until a session opens them.
            cursor: AtomicU64::new(SEALED),
            committed: AtomicU64::new(0),
            overflowed: AtomicBool::new(false),
            origin: AtomicU64::new(0),
        }
    }

    fn capacity(&self) -> u64 {
        self.slots.len() as u64
    }

    /// Resets the buffer and starts accepting writes for a frame that began
    /// at `origin`.
    ///
    /// Must only be called on a sealed buffer whose writers have drained,
    /// which is what [`Self::seal`] guarantees on return.
    pub(crate) fn open(&self, origin: HostTime) {
        self.committed.store(0, Ordering::Relaxed);
        self.overflowed.store(false, Ordering::Relaxed);
        self.origin.store(origin.nanos(), Ordering::Relaxed);
        // Publishes the stores above to any producer that reserves a slot.
        self.cursor.store(0, Ordering::Release);
    }

    /// Attempts to append one record. `make` receives the frame origin and
    /// is only called once a slot has been reserved.
    #[inline]
    pub(crate) fn try_push(&self, make: impl FnOnce(HostTime) -> EventRecord) -> PushOutcome {
        let raw = self.cursor.fetch_add(1, Ordering::AcqRel);
        if raw & SEALED != 0 {
            return PushOutcome::Sealed;
        }
        let Some(slot) = usize::try_from(raw).ok().and_then(|i| self.slots.get(i)) else {
            self.overflowed.store(true, Ordering::Relaxed);
            return PushOutcome::Overflowed;
        };
        let origin = HostTime(self.origin.load(Ordering::Relaxed));
        let words = make(origin).to_words();
        for (dst, src) in slot.words.iter().zip(words) {
            dst.store(src, Ordering::Relaxed);
        }
        self.committed.fetch_add(1, Ordering::Release);
        PushOutcome::Written
    }

    /// Stops further writes and waits for in-flight writers to finish.
    ///
    /// `spin_iterations` bounds busy-waiting before the flipping thread
    /// starts yielding.
    pub(crate) fn seal(&self, spin_iterations: u32) -> SealedCounts {
        let raw = self.cursor.fetch_or(SEALED, Ordering::AcqRel);
        if raw & SEALED != 0 {
            return self.sealed_counts();
        }
        let reserved = raw;
        let written = reserved.min(self.capacity());
        let mut spins = 0_u32;
        while self.committed.load(Ordering::Acquire) < written {
            if spins < spin_iterations {
                spins += 1;
                core::hint::spin_loop();
            } else {
                std::thread::yield_now();
            }
        }
        if reserved > written {
            self.overflowed.store(true, Ordering::Relaxed);
        }
        SealedCounts {
            event_count: written,
            overflowed: reserved > written,
        }
    }

    /// Appends the first `count` records of this sealed buffer to `target`.
    ///
    /// Both buffers must share a frame origin, since timestamps are copied
    /// unchanged. Records that do not fit mark `target` overflowed.
    pub(crate) fn carry_into(&self, count: u64, target: &Self) {
        let count = usize::try_from(count).map_or(self.slots.len(), |n| n.min(self.slots.len()));
        for index in 0..count {
            let record = self.read(index);
            if target.try_push(|_| record) != PushOutcome::Written {
                target.mark_overflowed();
                return;
            }
        }
    }

    /// Flags the buffer as having dropped an event.
    pub(crate) fn mark_overflowed(&self) {
        self.overflowed.store(true, Ordering::Relaxed);
    }

    fn sealed_counts(&self) -> SealedCounts {
        SealedCounts {
            event_count: self.committed.load(Ordering::Acquire),
            overflowed: self.overflowed.load(Ordering::Relaxed),
        }
    }

    fn is_sealed(&self) -> bool {
        self.cursor.load(Ordering::Acquire) & SEALED != 0
    }

    fn read(&self, index: usize) -> EventRecord {
        let mut words = [0_u64; RECORD_WORDS];
        for (dst, src) in words.iter_mut().zip(&self.slots[index].words) {
            *dst = src.load(Ordering::Relaxed);
        }
        EventRecord::from_words(&words)
    }
}

/// A fixed-capacity buffer of [`EventRecord`]s.
///
/// Cloning a `FrameBuffer` clones the handle, not the storage. The session
/// fills the buffer during a frame and hands it to the consumer at flip
/// time; the consumer may read it, keep it, or hand it back for reuse.
///
/// Records are readable once the buffer has been flipped out (sealed). While
/// a buffer is the active write target, [`len`](Self::len) reports zero and
/// [`write_cursor`](Self::write_cursor) shows live progress.
#[derive(Clone)]
pub struct FrameBuffer {
    core: Arc<BufferCore>,
}

impl FrameBuffer {
    /// Allocates a buffer with room for `capacity` records.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            core: Arc::new(BufferCore::new(capacity)),
        }
    }

    /// Maximum number of records the buffer holds.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.core.slots.len()
    }

    /// Number of write attempts so far, saturated at capacity.
    ///
    /// Once the buffer is sealed this is the number of stored records, so
    /// appends that raced the seal and were redirected are not counted.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "the value is clamped to capacity, which is a usize"
    )]
    pub fn write_cursor(&self) -> usize {
        let raw = self.core.cursor.load(Ordering::Acquire);
        let reserved = if raw & SEALED == 0 {
            raw
        } else {
            self.core.committed.load(Ordering::Acquire)
        };
        reserved.min(self.core.capacity()) as usize
    }

    /// Whether a write attempt found the buffer full during its last frame.
    #[must_use]
    pub fn overflowed(&self) -> bool {
        self.core.overflowed.load(Ordering::Relaxed)
    }

    /// Whether the buffer is currently refusing writes.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.core.is_sealed()
    }

    /// Number of readable records.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "the value is clamped to capacity, which is a usize"
    )]
    pub fn len(&self) -> usize {
        if !self.core.is_sealed() {
            return 0;
        }
        let committed = self.core.committed.load(Ordering::Acquire);
        committed.min(self.core.capacity()) as usize
    }

    /// Whether there are no readable records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the record at `index`, if readable.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<EventRecord> {
        (index < self.len()).then(|| self.core.read(index))
    }

    /// Iterates over the readable records in slot order.
    #[must_use]
    pub fn events(&self) -> Events<'_> {
        Events {
            buffer: self,
            next: 0,
            end: self.len(),
        }
    }

    /// Copies the readable records out.
    #[must_use]
    pub fn to_vec(&self) -> Vec<EventRecord> {
        self.events().collect()
    }

    /// Whether two handles refer to the same storage.
    #[must_use]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.core, &b.core)
    }

    pub(crate) fn core(&self) -> &Arc<BufferCore> {
        &self.core
    }
}

impl fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("capacity", &self.capacity())
            .field("write_cursor", &self.write_cursor())
            .field("overflowed", &self.overflowed())
            .field("sealed", &self.is_sealed())
            .finish_non_exhaustive()
    }
}

/// Iterator over the records of a sealed [`FrameBuffer`].
#[derive(Debug)]
pub struct Events<'a> {
    buffer: &'a FrameBuffer,
    next: usize,
    end: usize,
}

impl Iterator for Events<'_> {
    type Item = EventRecord;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let record = self.buffer.core.read(self.next);
        self.next += 1;
        Some(record)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.end - self.next;
        (n, Some(n))
    }
}

impl ExactSizeIterator for Events<'_> {}
