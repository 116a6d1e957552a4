use crate::{
    inst::Inst,
    rob::{ReorderBuffer, Tag},
};

/// Outcome of asking whether a load may read memory this cycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LoadCheck {
    Clear,
    /// The single memory port was already used this cycle.
    PortBusy,
    /// An older store to the same address has not committed.
    StoreConflict(Tag),
}

/// Memory ordering between in-flight loads and stores, and the single data
/// memory port they share.
///
/// A committing store writes memory through the port. Loads are only
/// disambiguated against older stores; two loads never block each other by
/// address, only by competing for the port.
#[derive(Debug, Clone, Default)]
pub struct LoadStoreQueue {
    port_busy: bool,
}

impl LoadStoreQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim_port(&mut self) {
        debug_assert!(!self.port_busy, "memory port claimed twice in one cycle");
        self.port_busy = true;
    }

    #[cfg(test)]
    pub fn port_busy(&self) -> bool {
        self.port_busy
    }

    pub fn next_cycle(&mut self) {
        self.port_busy = false;
    }

    pub fn check_load(&self, load: Tag, rob: &ReorderBuffer, insts: &[Inst]) -> LoadCheck {
        if self.port_busy {
            return LoadCheck::PortBusy;
        }

        match Self::older_store(load, rob, insts) {
            Some(store) => LoadCheck::StoreConflict(store),
            None => LoadCheck::Clear,
        }
    }

    /// Youngest store dispatched before `load` that writes the address it
    /// reads and is still in the reorder buffer.
    fn older_store(load: Tag, rob: &ReorderBuffer, insts: &[Inst]) -> Option<Tag> {
        let load = rob.get(load);
        let addr = insts[load.inst].mem_addr();
        debug_assert!(insts[load.inst].is_load());

        rob.busy()
            .filter(|ent| ent.dispatched < load.dispatched)
            .filter(|ent| insts[ent.inst].is_store() && insts[ent.inst].mem_addr() == addr)
            .max_by_key(|ent| ent.dispatched)
            .map(|ent| ent.slot)
    }
}
