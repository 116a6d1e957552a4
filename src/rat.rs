use hashbrown::HashMap;

use crate::{inst::Location, rob::Tag, util::Cycle};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct Producer {
    tag: Tag,
    dispatched: Cycle,
}

/// Register status table.
///
/// Every location keeps the producers that are still in flight, oldest
/// first. Only the most recently dispatched one is live; consumers that
/// find no live producer read the register file.
#[derive(Debug, Clone, Default)]
pub struct RenameTable {
    live: HashMap<Location, Tag>,
    pending: HashMap<Location, Vec<Producer>>,
}

impl RenameTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, loc: Location, tag: Tag, dispatched: Cycle) {
        self.pending
            .entry(loc)
            .or_default()
            .push(Producer { tag, dispatched });
        self.live.insert(loc, tag);
    }

    pub fn lookup_latest(&self, loc: Location) -> Option<Tag> {
        let tag = *self.live.get(&loc)?;
        self.pending
            .get(&loc)?
            .iter()
            .any(|p| p.tag == tag)
            .then_some(tag)
    }

    /// Removes the producer of `loc` dispatched at `dispatched`, once its
    /// value has been written. Returns its tag so waiting stations can be
    /// woken.
    pub fn lookup_for_retire(&mut self, loc: Location, dispatched: Cycle) -> Option<Tag> {
        let producers = self.pending.get_mut(&loc)?;
        let pos = producers.iter().position(|p| p.dispatched == dispatched)?;
        let Producer { tag, .. } = producers.remove(pos);

        if producers.is_empty() {
            self.pending.remove(&loc);
        }
        if self.live.get(&loc) == Some(&tag) {
            self.live.remove(&loc);
        }

        Some(tag)
    }

    /// Drops everything tied to a committing slot.
    pub fn release(&mut self, tag: Tag) {
        self.pending.retain(|_, producers| {
            producers.retain(|p| p.tag != tag);
            !producers.is_empty()
        });
        self.live.retain(|_, t| *t != tag);
    }

    /// Live renames, sorted by location.
    pub fn renamed(&self) -> Vec<(Location, Tag)> {
        let mut renamed = self
            .live
            .keys()
            .filter_map(|&loc| self.lookup_latest(loc).map(|tag| (loc, tag)))
            .collect::<Vec<_>>();
        renamed.sort();
        renamed
    }
}
