//! Cycle-by-cycle Tomasulo scheduler with a reorder buffer.
//!
//! Each call to [`Engine::step`] simulates one cycle. The stages run in a
//! fixed order and each one only sees what earlier stages of the same cycle
//! left behind:
//!
//! 1. wake stations waiting on results written last cycle
//! 2. count down instructions already executing
//! 3. commit the oldest instruction, if it is ready
//! 4. release the station of the oldest executed store and branch
//! 5. write back one result
//! 6. let one load read memory
//! 7. start instructions whose operands are ready
//! 8. finish instructions whose latency has elapsed
//! 9. dispatch the next trace instruction

use std::fmt;

use log::{debug, info, trace};

use crate::{
    config::{ConfigError, ResourceConfig},
    inst::Inst,
    lsq::{LoadCheck, LoadStoreQueue},
    queue::IssueQueue,
    rat::RenameTable,
    reservation_station::{StationBank, StationId},
    rob::{ReorderBuffer, RobState, Tag},
    stats::{Delays, SimResult},
    util::Cycle,
};

/// Executed store or branch still holding its station.
#[derive(Debug, Copy, Clone)]
struct Pending {
    tag: Tag,
    station: StationId,
}

#[derive(Debug, Clone, Default)]
struct Queues {
    read: IssueQueue<Tag>,
    write: IssueQueue<Tag>,
    commit: IssueQueue<Tag>,
    store: IssueQueue<Pending>,
    branch: IssueQueue<Pending>,
}

#[derive(Debug, Clone)]
pub struct Engine {
    insts: Vec<Inst>,
    latencies: Vec<u32>,
    /// Next trace instruction to dispatch.
    next: usize,
    stations: StationBank,
    rob: ReorderBuffer,
    rat: RenameTable,
    lsq: LoadStoreQueue,
    queues: Queues,
    /// Tags whose values became available last cycle.
    broadcasts: Vec<Tag>,
    cycle: Cycle,
    delays: Delays,
}

/// Reservation stations, reorder buffer and register status after a cycle.
pub struct Snapshot<'a> {
    engine: &'a Engine,
}

impl Engine {
    /// Fails if `config` is outside the limits the scheduler relies on.
    pub fn new(config: &ResourceConfig, insts: Vec<Inst>) -> Result<Self, ConfigError> {
        config.validate()?;

        let latencies = insts.iter().map(|inst| inst.latency(config)).collect();

        Ok(Self {
            insts,
            latencies,
            next: 0,
            stations: StationBank::new(config),
            rob: ReorderBuffer::new(config.reorder),
            rat: RenameTable::new(),
            lsq: LoadStoreQueue::new(),
            queues: Queues::default(),
            broadcasts: Vec::new(),
            cycle: 1,
            delays: Delays::default(),
        })
    }

    /// The trace is exhausted and nothing is left in flight.
    pub fn is_done(&self) -> bool {
        self.next >= self.insts.len() && !self.rob.any_busy()
    }

    /// Cycles simulated so far.
    pub fn cycles(&self) -> Cycle {
        self.cycle - 1
    }

    pub fn delays(&self) -> Delays {
        self.delays
    }

    pub fn insts(&self) -> &[Inst] {
        &self.insts
    }

    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot { engine: self }
    }

    pub fn run(mut self) -> SimResult {
        let limit = self.cycle_limit();
        while !self.is_done() {
            self.step();

            debug_assert!(u64::from(self.cycle) <= limit, "simulation made no progress");
        }

        self.finish()
    }

    pub fn finish(self) -> SimResult {
        info!(
            "simulated {} instructions in {} cycles: {:?}",
            self.insts.len(),
            self.cycles(),
            self.delays
        );

        SimResult {
            cycles: self.cycles(),
            insts: self.insts,
            delays: self.delays,
        }
    }

    /// Upper bound on the cycles a run can take. The oldest instruction in
    /// flight never waits on anything younger, so each one is done within its
    /// latency plus a handful of stage transitions after the previous one.
    fn cycle_limit(&self) -> u64 {
        let latencies = self.latencies.iter().map(|&l| u64::from(l)).sum::<u64>();
        2 * (latencies + 8 * self.insts.len() as u64) + 16
    }

    /// Simulates one cycle and returns its number.
    pub fn step(&mut self) -> Cycle {
        self.wake_waiting();
        self.advance_executing();
        self.commit();
        self.retire_stores_and_branches();
        self.write_result();
        self.read_memory();
        self.start_executing();
        self.finish_executing();
        self.dispatch();

        self.lsq.next_cycle();
        self.cycle += 1;
        self.cycle - 1
    }

    fn wake_waiting(&mut self) {
        for tag in self.broadcasts.drain(..) {
            trace!("cycle {}: broadcast {}", self.cycle, tag);
            self.stations.broadcast(tag);
        }
    }

    fn advance_executing(&mut self) {
        for ent in self.rob.iter_mut() {
            if ent.busy && ent.state == Some(RobState::Executing) {
                ent.cycles_left = ent.cycles_left.saturating_sub(1);
            }
        }
    }

    fn commit(&mut self) {
        let Some((_, &tag)) = self.queues.commit.front() else {
            return;
        };

        // Something older is still in flight.
        if self.rob.oldest_busy() != Some(tag) {
            return;
        }

        let _ = self.queues.commit.try_pop();
        let idx = self.rob.commit_head(tag).inst;

        let inst = &mut self.insts[idx];
        inst.timing.commit = Some(self.cycle);
        debug_assert!(inst.timing.is_ordered(), "{}: {:?}", inst, inst.timing);
        debug!("cycle {}: commit '{}' from {}", self.cycle, inst, tag);

        if inst.is_store() {
            self.lsq.claim_port();
        }

        self.rat.release(tag);
    }

    fn retire_stores_and_branches(&mut self) {
        if let Some(Pending { tag, station }) = Self::take_oldest(&mut self.queues.store, &self.rob)
        {
            self.stations.free(station);
            // Loads dispatched behind the store hold its tag.
            self.broadcasts.push(tag);
        }

        if let Some(Pending { station, .. }) = Self::take_oldest(&mut self.queues.branch, &self.rob) {
            self.stations.free(station);
        }
    }

    fn take_oldest(queue: &mut IssueQueue<Pending>, rob: &ReorderBuffer) -> Option<Pending> {
        let (dispatched, _) = queue.front()?;
        if rob.has_older_than(dispatched) {
            return None;
        }
        queue.try_pop().map(|(_, pending)| pending)
    }

    fn write_result(&mut self) {
        let Some((dispatched, tag)) = self.queues.write.try_pop() else {
            return;
        };

        let ent = self.rob.get_mut(tag);
        ent.state = Some(RobState::WroteResult);
        let (idx, station, dest) = (ent.inst, ent.station, ent.dest);

        self.insts[idx].timing.write_result = Some(self.cycle);
        self.stations.free(station);

        if let Some(woken) = dest.and_then(|loc| self.rat.lookup_for_retire(loc, dispatched)) {
            self.broadcasts.push(woken);
        }

        self.queues.commit.push(dispatched, tag);
        debug!("cycle {}: write result of '{}'", self.cycle, self.insts[idx]);
    }

    fn read_memory(&mut self) {
        let Some((dispatched, &head)) = self.queues.read.front() else {
            return;
        };

        // Only one load can use the port. The rest wait another cycle.
        let head_end = self.insts[self.rob.get(head).inst].timing.exec_end;
        for (_, &tag) in self.queues.read.iter().skip(1) {
            if self.insts[self.rob.get(tag).inst].timing.exec_end == head_end {
                self.delays.true_dependence += 1;
            } else {
                self.delays.memory_conflict += 1;
            }
        }

        match self.lsq.check_load(head, &self.rob, &self.insts) {
            LoadCheck::Clear => {
                let _ = self.queues.read.try_pop();

                let ent = self.rob.get_mut(head);
                ent.state = Some(RobState::MemRead);
                let inst = &mut self.insts[ent.inst];
                inst.timing.mem_read = Some(self.cycle);
                debug!("cycle {}: '{}' reads memory", self.cycle, inst);

                self.queues.write.push(dispatched, head);
            }
            LoadCheck::PortBusy => {
                trace!("cycle {}: memory port busy for {}", self.cycle, head);
                self.delays.memory_conflict += 1;
            }
            LoadCheck::StoreConflict(store) => {
                trace!("cycle {}: {} waits for store {}", self.cycle, head, store);
                self.delays.true_dependence += 1;
            }
        }
    }

    fn start_executing(&mut self) {
        for ent in self.rob.iter_mut() {
            if !ent.busy || ent.state != Some(RobState::Issued) {
                continue;
            }

            let inst = &mut self.insts[ent.inst];
            let st = self.stations.get(ent.station);
            let ready = st.qj.is_ready() && (!inst.needs_second_source() || st.qk.is_ready());

            if ready {
                ent.state = Some(RobState::Executing);
                ent.cycles_left = ent.cycles_left.saturating_sub(1);
                inst.timing.exec_start = Some(self.cycle);
                debug!("cycle {}: start '{}' in {}", self.cycle, inst, ent.slot);
            } else {
                trace!("cycle {}: '{}' waits on {:?} {:?}", self.cycle, inst, st.qj, st.qk);
                self.delays.true_dependence += 1;
            }
        }
    }

    fn finish_executing(&mut self) {
        for ent in self.rob.iter_mut() {
            if !ent.busy || ent.state != Some(RobState::Executing) || ent.cycles_left > 0 {
                continue;
            }

            ent.state = Some(RobState::Executed);
            let inst = &mut self.insts[ent.inst];
            inst.timing.exec_end = Some(self.cycle);
            debug!("cycle {}: finish '{}'", self.cycle, inst);

            let pending = Pending {
                tag: ent.slot,
                station: ent.station,
            };

            if inst.is_store() {
                self.queues.commit.push(ent.dispatched, ent.slot);
                self.queues.store.push(ent.dispatched, pending);
            } else if inst.is_branch() {
                self.queues.commit.push(ent.dispatched, ent.slot);
                self.queues.branch.push(ent.dispatched, pending);
            } else if inst.is_load() {
                self.queues.read.push(ent.dispatched, ent.slot);
            } else {
                self.queues.write.push(ent.dispatched, ent.slot);
            }
        }
    }

    fn dispatch(&mut self) {
        let Some(inst) = self.insts.get(self.next) else {
            return;
        };

        if !self.rob.has_open_slot() {
            trace!("cycle {}: reorder buffer full", self.cycle);
            self.delays.reorder_buffer += 1;
            return;
        }

        let issued = self.stations.dispatch(
            self.next,
            inst,
            self.latencies[self.next],
            &mut self.rat,
            &mut self.rob,
            self.cycle,
        );

        match issued {
            Some((station, tag)) => {
                let inst = &mut self.insts[self.next];
                inst.timing.issued = Some(self.cycle);
                debug!(
                    "cycle {}: dispatch '{}' to {} ({})",
                    self.cycle,
                    inst,
                    self.stations.get(station).name(),
                    tag
                );
                self.next += 1;
            }
            None => {
                trace!("cycle {}: no free station for '{}'", self.cycle, inst);
                self.delays.reservation_station += 1;
            }
        }
    }
}

impl fmt::Display for Snapshot<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let engine = self.engine;
        let yes_no = |busy: bool| if busy { "yes" } else { "no" };

        writeln!(f, "Cycle: {}", engine.cycles())?;
        writeln!(f)?;

        writeln!(f, "\tReservation stations")?;
        writeln!(f, "--------------------------------")?;
        writeln!(f, "  Name   Busy   Op    Qj  Qk  Dest")?;
        writeln!(f, "-------- ---- ------ --- --- ----")?;
        for st in engine.stations.iter() {
            let op = st.op.map(|op| op.to_string()).unwrap_or_default();
            let dest = st.dest.map(|tag| tag.to_string()).unwrap_or_default();
            writeln!(
                f,
                "{:<8} {:<4} {:<6} {:>3} {:>3} {:>4}",
                st.name(),
                yes_no(st.busy),
                op,
                st.qj,
                st.qk,
                dest
            )?;
        }
        writeln!(f)?;

        writeln!(f, "                     Reorder buffer")?;
        writeln!(f, "--------------------------------------------------------")?;
        writeln!(f, "Entry Busy      Instruction         State    Destination")?;
        writeln!(f, "----- ---- --------------------- ----------- -----------")?;
        for ent in engine.rob.iter() {
            let (text, state, dest) = match ent.state {
                Some(state) => (
                    engine.insts[ent.inst].text.as_str(),
                    state.to_string(),
                    ent.dest.map(|loc| loc.to_string()).unwrap_or_default(),
                ),
                None => ("", String::new(), String::new()),
            };
            writeln!(
                f,
                "{:>5} {:<4} {:<21} {:<11} {:<11}",
                ent.slot.0,
                yes_no(ent.busy),
                text,
                state,
                dest
            )?;
        }
        writeln!(f)?;

        writeln!(f, "register status")?;
        writeln!(f, "---------------")?;
        let renamed = engine
            .rat
            .renamed()
            .into_iter()
            .map(|(loc, tag)| format!("{loc}={tag}"))
            .collect::<Vec<_>>();
        write!(f, "{}", renamed.join(" "))
    }
}
