// Copyright 2026 the Framescope Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Sections, section groups, and the group registry.
//!
//! Hosts describe each instrumented span with a [`SectionInfo`] and pass it
//! to [`EventRecorder::enter_section`](crate::recorder::EventRecorder::enter_section)
//! and [`leave_section`](crate::recorder::EventRecorder::leave_section).
//!
//! Hosts that number their categories can register them once in
//! [`SectionGroups`] and resolve name and color per event. Unknown ids
//! resolve to [`SectionGroup::DEFAULT`].

use crate::record::GroupName;

/// Description of a section occurrence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SectionInfo<'a> {
    /// Group name. Truncated to 15 bytes when recorded.
    pub group_name: &'a str,
    /// Section name. Truncated to 31 bytes when recorded.
    pub name: &'a str,
    /// Identifier of the thread the section runs on.
    pub thread_id: u64,
    /// Packed RGBA color.
    pub color: u32,
}

impl<'a> SectionInfo<'a> {
    /// Describes a section of `group` on the given thread, taking the group's
    /// name and color.
    #[must_use]
    pub fn in_group(group: &'a SectionGroup, name: &'a str, thread_id: u64) -> Self {
        Self {
            group_name: group.name.as_str(),
            name,
            thread_id,
            color: group.color,
        }
    }
}

/// Name and color shared by a group of sections.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SectionGroup {
    /// Group name.
    pub name: GroupName,
    /// Packed RGBA color.
    pub color: u32,
}

impl SectionGroup {
    /// Color given to sections without a registered group.
    pub const DEFAULT_COLOR: u32 = 0x002d_89ef;

    /// Group used for unregistered ids.
    pub const DEFAULT: Self = Self {
        name: GroupName::EMPTY,
        color: Self::DEFAULT_COLOR,
    };

    /// Creates a group, truncating `name` to the group name field.
    #[must_use]
    pub fn new(name: &str, color: u32) -> Self {
        Self {
            name: GroupName::new(name),
            color,
        }
    }
}

impl Default for SectionGroup {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Maximum number of groups a [`SectionGroups`] registry holds.
pub const MAX_SECTION_GROUPS: usize = 64;

/// Fixed-capacity registry of section groups, indexed in registration order.
#[derive(Clone, Debug)]
pub struct SectionGroups {
    groups: [SectionGroup; MAX_SECTION_GROUPS],
    len: usize,
}

impl SectionGroups {
    /// Creates an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            groups: [SectionGroup::DEFAULT; MAX_SECTION_GROUPS],
            len: 0,
        }
    }

    /// Registers a group under the next id.
    ///
    /// Returns the id, or `None` if the registry is full.
    pub fn add(&mut self, group: SectionGroup) -> Option<u32> {
        let slot = self.groups.get_mut(self.len)?;
        *slot = group;
        let id = u32::try_from(self.len).ok()?;
        self.len += 1;
        Some(id)
    }

    /// Returns the group registered under `id`, or [`SectionGroup::DEFAULT`].
    #[must_use]
    pub fn get_or_default(&self, id: u32) -> SectionGroup {
        usize::try_from(id)
            .ok()
            .filter(|&i| i < self.len)
            .map_or(SectionGroup::DEFAULT, |i| self.groups[i])
    }

    /// Number of registered groups.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether no group has been registered.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for SectionGroups {
    fn default() -> Self {
        Self::new()
    }
}
