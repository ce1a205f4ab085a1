// Copyright 2026 the Framescope Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fixed-layout trace event records.
//!
//! An [`EventRecord`] is what producers write into a frame buffer and what
//! consumers read back after a flip. Its layout is `#[repr(C)]` and stable:
//!
//! ```text
//! offset  size  field
//!      0    32  name         (NUL-terminated UTF-8, at most 31 bytes of text)
//!     32    16  group_name   (NUL-terminated UTF-8, at most 15 bytes of text)
//!     48     8  timestamp_ns (offset since the frame's flip)
//!     56     8  thread_id
//!     64     4  event_type   (0 = enter, 1 = leave)
//!     68     4  color        (packed RGBA)
//! ```

use core::fmt;

/// Whether an event opens or closes a section.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum EventType {
    /// A section was entered.
    EnterSection = 0,
    /// A section was left.
    LeaveSection = 1,
}

impl EventType {
    const fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::EnterSection,
            _ => Self::LeaveSection,
        }
    }
}

/// Inline text field of `N` bytes, always NUL-terminated.
///
/// Holds at most `N - 1` bytes of UTF-8. Longer input is cut at the last
/// character boundary that fits; unused bytes are zero.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct FixedName<const N: usize>([u8; N]);

impl<const N: usize> FixedName<N> {
    /// Maximum number of text bytes the field stores.
    pub const MAX_LEN: usize = N - 1;

    /// An empty name.
    pub const EMPTY: Self = Self([0; N]);

    /// Copies `text` into a fixed field, truncating if needed.
    #[must_use]
    pub fn new(text: &str) -> Self {
        let mut bytes = [0_u8; N];
        let len = truncated_len(text, Self::MAX_LEN);
        bytes[..len].copy_from_slice(&text.as_bytes()[..len]);
        Self(bytes)
    }

    /// Returns the stored text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        let len = self.0.iter().position(|&b| b == 0).unwrap_or(N);
        core::str::from_utf8(&self.0[..len]).unwrap_or_default()
    }

    /// Returns the raw bytes, including the NUL padding.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; N] {
        &self.0
    }

    pub(crate) const fn from_bytes(bytes: [u8; N]) -> Self {
        Self(bytes)
    }
}

impl<const N: usize> Default for FixedName<N> {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl<const N: usize> fmt::Debug for FixedName<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

/// Length of the longest prefix of `text` that fits in `max` bytes without
/// splitting a character.
fn truncated_len(text: &str, max: usize) -> usize {
    if text.len() <= max {
        return text.len();
    }
    let mut len = max;
    while !text.is_char_boundary(len) {
        len -= 1;
    }
    len
}

/// Section name field (31 bytes of text).
pub type SectionName = FixedName<32>;
/// Group name field (15 bytes of text).
pub type GroupName = FixedName<16>;

/// A single enter/leave event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(C)]
pub struct EventRecord {
    /// Name of the section (or of the producing thread, for hosts that label
    /// events by thread).
    pub name: SectionName,
    /// Name of the group the section belongs to.
    pub group_name: GroupName,
    /// Nanoseconds since the flip that opened the frame this event landed in.
    pub timestamp_ns: u64,
    /// Stable identifier of the producing thread.
    pub thread_id: u64,
    /// Enter or leave.
    pub event_type: EventType,
    /// Packed RGBA color for visualization.
    pub color: u32,
}

/// Number of `u64` words an [`EventRecord`] occupies in a frame buffer slot.
pub(crate) const RECORD_WORDS: usize = 9;

const NAME_WORDS: usize = 4;
const GROUP_WORDS: usize = 2;

impl EventRecord {
    /// Builds a record, truncating `name` and `group_name` to their fields.
    #[must_use]
    pub fn new(
        event_type: EventType,
        name: &str,
        group_name: &str,
        thread_id: u64,
        color: u32,
        timestamp_ns: u64,
    ) -> Self {
        Self {
            name: SectionName::new(name),
            group_name: GroupName::new(group_name),
            timestamp_ns,
            thread_id,
            event_type,
            color,
        }
    }

    /// Packs the record into slot words.
    pub(crate) fn to_words(&self) -> [u64; RECORD_WORDS] {
        let mut words = [0_u64; RECORD_WORDS];
        pack_bytes(self.name.as_bytes(), &mut words[..NAME_WORDS]);
        pack_bytes(
            self.group_name.as_bytes(),
            &mut words[NAME_WORDS..NAME_WORDS + GROUP_WORDS],
        );
        words[6] = self.timestamp_ns;
        words[7] = self.thread_id;
        words[8] = (u64::from(self.event_type as u32) << 32) | u64::from(self.color);
        words
    }

    /// Rebuilds a record from slot words produced by [`Self::to_words`].
    #[expect(
        clippy::cast_possible_truncation,
        reason = "the last word packs two u32 halves"
    )]
    pub(crate) fn from_words(words: &[u64; RECORD_WORDS]) -> Self {
        let mut name = [0_u8; 32];
        let mut group = [0_u8; 16];
        unpack_bytes(&words[..NAME_WORDS], &mut name);
        unpack_bytes(&words[NAME_WORDS..NAME_WORDS + GROUP_WORDS], &mut group);
        Self {
            name: SectionName::from_bytes(name),
            group_name: GroupName::from_bytes(group),
            timestamp_ns: words[6],
            thread_id: words[7],
            event_type: EventType::from_raw((words[8] >> 32) as u32),
            color: words[8] as u32,
        }
    }
}

fn pack_bytes(bytes: &[u8], words: &mut [u64]) {
    for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(8)) {
        let mut le = [0_u8; 8];
        le.copy_from_slice(chunk);
        *word = u64::from_le_bytes(le);
    }
}

fn unpack_bytes(words: &[u64], bytes: &mut [u8]) {
    for (word, chunk) in words.iter().zip(bytes.chunks_exact_mut(8)) {
        chunk.copy_from_slice(&word.to_le_bytes());
    }
}
