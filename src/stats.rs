use std::fmt;

use crate::{inst::Inst, util::Cycle};

/// Cycles lost to each kind of hazard.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Delays {
    /// Dispatch blocked because every reorder buffer slot was busy.
    pub reorder_buffer: u64,
    /// Dispatch blocked because the instruction's station pool was full.
    pub reservation_station: u64,
    /// Loads kept off the memory port.
    pub memory_conflict: u64,
    /// Stalls waiting for an operand or an older store.
    pub true_dependence: u64,
}

#[derive(Debug, Clone)]
pub struct SimResult {
    pub insts: Vec<Inst>,
    pub delays: Delays,
    pub cycles: Cycle,
}

impl fmt::Display for Delays {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Delays")?;
        writeln!(f, "------")?;
        writeln!(f, "reorder buffer delays: {}", self.reorder_buffer)?;
        writeln!(f, "reservation station delays: {}", self.reservation_station)?;
        writeln!(f, "data memory conflict delays: {}", self.memory_conflict)?;
        write!(f, "true dependence delays: {}", self.true_dependence)
    }
}
