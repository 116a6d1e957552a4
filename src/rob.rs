use std::fmt;

use strum::Display;

use crate::{inst::Location, reservation_station::StationId, util::Cycle};

/// Reorder buffer slot number, starting at 1. Doubles as the rename tag of
/// the value that slot will produce.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(pub usize);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum RobState {
    Issued,
    Executing,
    Executed,
    MemRead,
    WroteResult,
    Committed,
}

#[derive(Debug, Clone)]
pub struct RobEntry {
    pub slot: Tag,
    pub busy: bool,
    pub state: Option<RobState>,
    pub dest: Option<Location>,
    /// Index of the instruction in the trace.
    pub inst: usize,
    pub station: StationId,
    pub dispatched: Cycle,
    pub cycles_left: u32,
}

/// Fixed array of slots. Commit order is dispatch order over the busy
/// slots, not slot order: a freed slot is refilled by the next dispatch.
#[derive(Debug, Clone)]
pub struct ReorderBuffer {
    entries: Vec<RobEntry>,
}

impl RobEntry {
    fn idle(slot: Tag) -> Self {
        Self {
            slot,
            busy: false,
            state: None,
            dest: None,
            inst: 0,
            station: 0,
            dispatched: 0,
            cycles_left: 0,
        }
    }
}

impl ReorderBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: (1..=capacity).map(|n| RobEntry::idle(Tag(n))).collect(),
        }
    }

    pub fn has_open_slot(&self) -> bool {
        self.entries.iter().any(|ent| !ent.busy)
    }

    pub fn any_busy(&self) -> bool {
        self.entries.iter().any(|ent| ent.busy)
    }

    /// First-fit allocation.
    #[must_use]
    pub fn allocate_slot(
        &mut self,
        inst: usize,
        station: StationId,
        dest: Option<Location>,
        dispatched: Cycle,
        latency: u32,
    ) -> Option<Tag> {
        let ent = self.entries.iter_mut().find(|ent| !ent.busy)?;

        *ent = RobEntry {
            slot: ent.slot,
            busy: true,
            state: Some(RobState::Issued),
            dest,
            inst,
            station,
            dispatched,
            cycles_left: latency,
        };

        Some(ent.slot)
    }

    /// The slot allowed to commit next.
    pub fn oldest_busy(&self) -> Option<Tag> {
        self.entries
            .iter()
            .filter(|ent| ent.busy)
            .min_by_key(|ent| ent.dispatched)
            .map(|ent| ent.slot)
    }

    pub fn has_older_than(&self, dispatched: Cycle) -> bool {
        self.entries
            .iter()
            .any(|ent| ent.busy && ent.dispatched < dispatched)
    }

    /// Retires `tag`, which must be the oldest busy slot.
    pub fn commit_head(&mut self, tag: Tag) -> &RobEntry {
        debug_assert_eq!(self.oldest_busy(), Some(tag), "commit out of order");

        let ent = self.get_mut(tag);
        ent.busy = false;
        ent.state = Some(RobState::Committed);
        ent
    }

    pub fn get(&self, tag: Tag) -> &RobEntry {
        &self.entries[tag.0 - 1]
    }

    pub fn get_mut(&mut self, tag: Tag) -> &mut RobEntry {
        &mut self.entries[tag.0 - 1]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RobEntry> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, RobEntry> {
        self.entries.iter_mut()
    }

    pub fn busy(&self) -> impl Iterator<Item = &RobEntry> {
        self.entries.iter().filter(|ent| ent.busy)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
