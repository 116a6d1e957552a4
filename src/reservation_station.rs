use std::fmt;

use strum::{Display, EnumIter, IntoEnumIterator};

use crate::{
    config::ResourceConfig,
    inst::{Inst, Location, Opcode},
    rat::RenameTable,
    rob::{ReorderBuffer, Tag},
    util::Cycle,
};

/// Index into the flat station list of a [`StationBank`].
pub type StationId = usize;

/// Functional unit class a station pool feeds. Branches use the integer pool.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum UnitClass {
    EffAddr,
    FpAdd,
    FpMul,
    Int,
}

/// Operand status held by a station.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum Source {
    /// Value is in the register file.
    #[default]
    Ready,
    WaitingOn(Tag),
}

#[derive(Debug, Clone)]
pub struct Station {
    pub class: UnitClass,
    /// 1-based position within its pool, for display.
    pub number: usize,
    pub busy: bool,
    pub op: Option<Opcode>,
    pub qj: Source,
    pub qk: Source,
    pub dest: Option<Tag>,
}

#[derive(Debug, Clone)]
pub struct StationBank {
    stations: Vec<Station>,
}

impl Source {
    pub fn is_ready(&self) -> bool {
        *self == Source::Ready
    }

    fn resolve(rat: &RenameTable, loc: Location) -> Self {
        rat.lookup_latest(loc)
            .map_or(Source::Ready, Source::WaitingOn)
    }

    fn wake(&mut self, tag: Tag) {
        if *self == Source::WaitingOn(tag) {
            *self = Source::Ready;
        }
    }
}

impl Station {
    fn new(class: UnitClass, number: usize) -> Self {
        Self {
            class,
            number,
            busy: false,
            op: None,
            qj: Source::Ready,
            qk: Source::Ready,
            dest: None,
        }
    }

    pub fn reset(&mut self) {
        *self = Station::new(self.class, self.number);
    }

    pub fn name(&self) -> String {
        format!("{}{}", self.class, self.number)
    }
}

impl StationBank {
    pub fn new(config: &ResourceConfig) -> Self {
        let stations = UnitClass::iter()
            .flat_map(|class| (1..=config.stations(class)).map(move |n| Station::new(class, n)))
            .collect();

        Self { stations }
    }

    /// Places `inst` in an idle station of its pool and gives it a reorder
    /// buffer slot. Returns `None` when the pool is full; the caller retries
    /// on a later cycle.
    ///
    /// Sources are resolved before the destination is renamed, so an
    /// instruction reading its own destination register waits on the
    /// previous producer and never on itself.
    pub fn dispatch(
        &mut self,
        inst_idx: usize,
        inst: &Inst,
        latency: u32,
        rat: &mut RenameTable,
        rob: &mut ReorderBuffer,
        cycle: Cycle,
    ) -> Option<(StationId, Tag)> {
        let class = inst.unit_class();
        let id = self
            .stations
            .iter()
            .position(|st| st.class == class && !st.busy)?;

        let (j, k) = inst.sources();
        let qj = Source::resolve(rat, j);
        let qk = Source::resolve(rat, k);

        let dest = inst.dest();
        let tag = rob.allocate_slot(inst_idx, id, dest, cycle, latency)?;
        if let Some(loc) = dest {
            rat.allocate(loc, tag, cycle);
        }

        self.stations[id] = Station {
            busy: true,
            op: Some(inst.opcode),
            qj,
            qk,
            dest: Some(tag),
            ..Station::new(class, self.stations[id].number)
        };

        Some((id, tag))
    }

    /// Clears every source waiting on `tag`.
    pub fn broadcast(&mut self, tag: Tag) {
        for st in &mut self.stations {
            st.qj.wake(tag);
            st.qk.wake(tag);
        }
    }

    pub fn free(&mut self, id: StationId) {
        self.stations[id].reset();
    }

    pub fn get(&self, id: StationId) -> &Station {
        &self.stations[id]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Station> {
        self.stations.iter()
    }

    #[cfg(test)]
    pub fn is_full(&self, class: UnitClass) -> bool {
        self.stations
            .iter()
            .filter(|st| st.class == class)
            .all(|st| st.busy)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Ready => f.pad(""),
            Source::WaitingOn(tag) => f.pad(&tag.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inst(s: &str) -> Inst {
        s.parse().unwrap()
    }

    #[test]
    fn test_pools() {
        let bank = StationBank::new(&ResourceConfig::default());
        assert_eq!(bank.iter().count(), 2 + 3 + 3 + 2);
        assert_eq!(bank.get(0).name(), "effaddr1");
        assert_eq!(bank.get(2).name(), "fpadd1");
        assert_eq!(bank.get(9).name(), "int2");
    }

    #[test]
    fn test_dispatch_resolves_sources() {
        let config = ResourceConfig {
            int: 1,
            ..Default::default()
        };
        let mut bank = StationBank::new(&config);
        let mut rat = RenameTable::new();
        let mut rob = ReorderBuffer::new(config.reorder);

        let first = inst("add x1,x2,x3");
        let (id, tag) = bank.dispatch(0, &first, 1, &mut rat, &mut rob, 1).unwrap();
        assert_eq!(tag, Tag(1));
        assert_eq!(bank.get(id).qj, Source::Ready);
        assert_eq!(bank.get(id).qk, Source::Ready);
        assert!(bank.is_full(UnitClass::Int));

        // Integer pool is full.
        let second = inst("add x1,x1,x5");
        assert_eq!(bank.dispatch(1, &second, 1, &mut rat, &mut rob, 2), None);
        assert!(rob.has_open_slot());

        let fp = inst("fadd.s f1,f2,f3");
        let (fp_id, fp_tag) = bank.dispatch(1, &fp, 2, &mut rat, &mut rob, 2).unwrap();
        assert_eq!(fp_tag, Tag(2));

        bank.free(id);
        let (id, tag) = bank.dispatch(2, &second, 1, &mut rat, &mut rob, 3).unwrap();
        assert_eq!(tag, Tag(3));
        // x1 source waits on the first add, not on this add's own slot.
        assert_eq!(bank.get(id).qj, Source::WaitingOn(Tag(1)));
        assert_eq!(bank.get(id).qk, Source::Ready);
        assert_eq!(rat.lookup_latest(Location::Reg(crate::inst::Reg::int(1))), Some(Tag(3)));

        bank.broadcast(Tag(1));
        assert!(bank.get(id).qj.is_ready());
        assert_eq!(bank.get(fp_id).op, Some(Opcode::FaddS));
    }

    #[test]
    fn test_station_display() {
        assert_eq!(format!("[{:>3}]", Source::WaitingOn(Tag(2))), "[ #2]");
        assert_eq!(format!("[{:>3}]", Source::Ready), "[   ]");
    }
}
