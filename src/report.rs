use std::fmt;

use crate::{inst::Inst, stats::SimResult, util::Cycle};

/// Per-instruction timing table followed by the delay counters.
pub struct PipelineReport<'a> {
    result: &'a SimResult,
}

impl<'a> PipelineReport<'a> {
    pub fn new(result: &'a SimResult) -> Self {
        Self { result }
    }

    fn row(f: &mut fmt::Formatter<'_>, inst: &Inst) -> fmt::Result {
        let show = |c: Option<Cycle>| c.map(|c| c.to_string()).unwrap_or_default();
        let t = &inst.timing;

        let exec = format!("{:>3} -{:>3}", show(t.exec_start), show(t.exec_end));
        let (mem_read, write_result) = if inst.is_load() {
            (show(t.mem_read), show(t.write_result))
        } else if inst.writes_result() {
            (String::new(), show(t.write_result))
        } else {
            (String::new(), String::new())
        };

        writeln!(
            f,
            "{:<21} {:>6} {:<8} {:>6} {:>6} {:>7}",
            inst.text,
            show(t.issued),
            exec,
            mem_read,
            write_result,
            show(t.commit)
        )
    }
}

impl fmt::Display for PipelineReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "                    Pipeline Simulation")?;
        writeln!(f, "-----------------------------------------------------------")?;
        writeln!(f, "                                      Memory Writes")?;
        writeln!(f, "     Instruction      Issues Executes  Read  Result Commits")?;
        writeln!(f, "--------------------- ------ -------- ------ ------ -------")?;
        for inst in &self.result.insts {
            Self::row(f, inst)?;
        }
        writeln!(f)?;
        writeln!(f)?;
        write!(f, "{}", self.result.delays)
    }
}
