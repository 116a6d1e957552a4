use std::collections::{btree_map, BTreeMap};

use crate::util::Cycle;

/// Queue served oldest-dispatch first. One instruction dispatches per cycle,
/// so the dispatch cycle identifies an entry.
#[derive(Debug, Clone)]
pub struct IssueQueue<T> {
    data: BTreeMap<Cycle, T>,
}

impl<T> Default for IssueQueue<T> {
    fn default() -> Self {
        Self {
            data: BTreeMap::new(),
        }
    }
}

impl<T> IssueQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, dispatched: Cycle, item: T) {
        let prev = self.data.insert(dispatched, item);
        debug_assert!(prev.is_none(), "two entries dispatched in cycle {dispatched}");
    }

    pub fn front(&self) -> Option<(Cycle, &T)> {
        self.data.iter().next().map(|(&c, item)| (c, item))
    }

    pub fn try_pop(&mut self) -> Option<(Cycle, T)> {
        self.data.pop_first()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, Cycle, T> {
        self.data.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oldest_first() {
        let mut q = IssueQueue::new();
        q.push(7, 'c');
        q.push(2, 'a');
        q.push(5, 'b');
        assert_eq!(q.len(), 3);
        assert_eq!(q.front(), Some((2, &'a')));
        assert_eq!(q.try_pop(), Some((2, 'a')));
        assert_eq!(q.try_pop(), Some((5, 'b')));
        assert_eq!(q.try_pop(), Some((7, 'c')));
        assert_eq!(q.try_pop(), None);
        assert!(q.is_empty());
    }
}
