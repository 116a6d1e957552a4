use std::{fmt, str::FromStr};

use strum::{Display, EnumString};
use thiserror::Error;

use crate::{
    config::ResourceConfig,
    reservation_station::UnitClass,
    util::{Addr, Cycle},
};

pub const NUM_ARCH_REGS: u8 = 32;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RegClass {
    Int,
    Float,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reg {
    pub class: RegClass,
    pub num: u8,
}

/// Something an instruction can produce or consume: an architectural
/// register, or a memory word named by its effective address.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Location {
    Reg(Reg),
    Mem(Addr),
}

/// `OFF(xB):ADDR` -- the base register only matters for scheduling, the
/// trace already carries the resolved address.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MemRef {
    pub offset: i32,
    pub base: Reg,
    pub addr: Addr,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, EnumString, Display)]
pub enum Opcode {
    #[strum(serialize = "flw")]
    Flw,
    #[strum(serialize = "fsw")]
    Fsw,
    #[strum(serialize = "lw")]
    Lw,
    #[strum(serialize = "sw")]
    Sw,
    #[strum(serialize = "fadd.s")]
    FaddS,
    #[strum(serialize = "fsub.s")]
    FsubS,
    #[strum(serialize = "fmul.s")]
    FmulS,
    #[strum(serialize = "fdiv.s")]
    FdivS,
    #[strum(serialize = "add")]
    Add,
    #[strum(serialize = "sub")]
    Sub,
    #[strum(serialize = "beq")]
    Beq,
    #[strum(serialize = "bne")]
    Bne,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MemOp {
    Load,
    Store,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IntOp {
    Add,
    Sub,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FloatOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BranchOp {
    Eq,
    Ne,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstKind {
    /// For loads `data` is the destination, for stores it is the value written.
    Mem { op: MemOp, data: Reg, src: MemRef },
    Int { op: IntOp, dst: Reg, src1: Reg, src2: Reg },
    Float { op: FloatOp, dst: Reg, src1: Reg, src2: Reg },
    Branch { op: BranchOp, src1: Reg, src2: Reg },
}

/// Cycle at which an instruction reached each stage. `None` until reached.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Timing {
    pub issued: Option<Cycle>,
    pub exec_start: Option<Cycle>,
    pub exec_end: Option<Cycle>,
    pub mem_read: Option<Cycle>,
    pub write_result: Option<Cycle>,
    pub commit: Option<Cycle>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inst {
    pub opcode: Opcode,
    pub kind: InstKind,
    pub text: String,
    pub timing: Timing,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstError {
    #[error("unknown instruction: '{0}'")]
    UnknownOpcode(String),
    #[error("{inst}: cannot fetch argument {n}")]
    MissingOperand { inst: String, n: usize },
    #[error("{inst}: {reason}")]
    Malformed { inst: String, reason: String },
    #[error("{inst}: instruction has invalid register '{reg}'")]
    WrongRegClass { inst: String, reg: Reg },
}

impl Reg {
    pub fn int(num: u8) -> Self {
        Self {
            class: RegClass::Int,
            num,
        }
    }

    pub fn float(num: u8) -> Self {
        Self {
            class: RegClass::Float,
            num,
        }
    }
}

impl Timing {
    /// Every stage that was reached, in pipeline order.
    pub fn stamps(&self) -> Vec<Cycle> {
        [
            self.issued,
            self.exec_start,
            self.exec_end,
            self.mem_read,
            self.write_result,
            self.commit,
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    pub fn is_ordered(&self) -> bool {
        self.stamps().windows(2).all(|w| w[0] <= w[1])
    }
}

impl Inst {
    pub fn is_load(&self) -> bool {
        matches!(self.kind, InstKind::Mem { op: MemOp::Load, .. })
    }

    pub fn is_store(&self) -> bool {
        matches!(self.kind, InstKind::Mem { op: MemOp::Store, .. })
    }

    pub fn is_mem_access(&self) -> bool {
        matches!(self.kind, InstKind::Mem { .. })
    }

    pub fn is_branch(&self) -> bool {
        matches!(self.kind, InstKind::Branch { .. })
    }

    /// Stores and branches never write a register.
    pub fn writes_result(&self) -> bool {
        !self.is_store() && !self.is_branch()
    }

    pub fn mem_addr(&self) -> Option<Addr> {
        match self.kind {
            InstKind::Mem { src, .. } => Some(src.addr),
            _ => None,
        }
    }

    pub fn unit_class(&self) -> UnitClass {
        match self.kind {
            InstKind::Mem { .. } => UnitClass::EffAddr,
            InstKind::Float {
                op: FloatOp::Add | FloatOp::Sub,
                ..
            } => UnitClass::FpAdd,
            InstKind::Float {
                op: FloatOp::Mul | FloatOp::Div,
                ..
            } => UnitClass::FpMul,
            InstKind::Int { .. } | InstKind::Branch { .. } => UnitClass::Int,
        }
    }

    pub fn dest(&self) -> Option<Location> {
        match self.kind {
            InstKind::Mem {
                op: MemOp::Load,
                data,
                ..
            } => Some(Location::Reg(data)),
            InstKind::Mem {
                op: MemOp::Store,
                src,
                ..
            } => Some(Location::Mem(src.addr)),
            InstKind::Int { dst, .. } | InstKind::Float { dst, .. } => Some(Location::Reg(dst)),
            InstKind::Branch { .. } => None,
        }
    }

    /// The two operands a reservation station tracks (Qj, Qk).
    ///
    /// Memory accesses put their base register first; only that one has to be
    /// ready before the address can be computed. The second operand of a load
    /// is the memory word itself, so a load sees an older store to the same
    /// address as a pending producer.
    pub fn sources(&self) -> (Location, Location) {
        match self.kind {
            InstKind::Mem {
                op: MemOp::Load,
                src,
                ..
            } => (Location::Reg(src.base), Location::Mem(src.addr)),
            InstKind::Mem {
                op: MemOp::Store,
                data,
                src,
            } => (Location::Reg(src.base), Location::Reg(data)),
            InstKind::Int { src1, src2, .. }
            | InstKind::Float { src1, src2, .. }
            | InstKind::Branch { src1, src2, .. } => (Location::Reg(src1), Location::Reg(src2)),
        }
    }

    pub fn needs_second_source(&self) -> bool {
        !self.is_mem_access()
    }

    pub fn latency(&self, config: &ResourceConfig) -> u32 {
        match self.kind {
            InstKind::Float { op, .. } => config.latency(op),
            _ => 1,
        }
    }
}

impl FromStr for Inst {
    type Err = InstError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let (op, args) = text
            .split_once(char::is_whitespace)
            .unwrap_or((text, ""));
        let args = args
            .split(',')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .collect::<Vec<_>>();

        let opcode = Opcode::from_str(&op.to_lowercase())
            .map_err(|_| InstError::UnknownOpcode(op.to_owned()))?;

        let malformed = |reason: String| InstError::Malformed {
            inst: text.to_owned(),
            reason,
        };
        let wrong_class = |reg: Reg| InstError::WrongRegClass {
            inst: text.to_owned(),
            reg,
        };
        let nth_arg = |n: usize| -> Result<&str, InstError> {
            args.get(n).copied().ok_or_else(|| InstError::MissingOperand {
                inst: text.to_owned(),
                n,
            })
        };
        let reg_arg = |n: usize, class: RegClass| -> Result<Reg, InstError> {
            let reg = Reg::from_str(nth_arg(n)?).map_err(malformed)?;
            if reg.class != class {
                return Err(wrong_class(reg));
            }
            Ok(reg)
        };
        let mem_arg = |n: usize| -> Result<MemRef, InstError> {
            let mem = MemRef::from_str(nth_arg(n)?).map_err(malformed)?;
            if mem.base.class != RegClass::Int {
                return Err(wrong_class(mem.base));
            }
            Ok(mem)
        };

        use RegClass::{Float, Int};

        let mem = |op: MemOp, class: RegClass| -> Result<InstKind, InstError> {
            Ok(InstKind::Mem {
                op,
                data: reg_arg(0, class)?,
                src: mem_arg(1)?,
            })
        };
        let int = |op: IntOp| -> Result<InstKind, InstError> {
            Ok(InstKind::Int {
                op,
                dst: reg_arg(0, Int)?,
                src1: reg_arg(1, Int)?,
                src2: reg_arg(2, Int)?,
            })
        };
        let float = |op: FloatOp| -> Result<InstKind, InstError> {
            Ok(InstKind::Float {
                op,
                dst: reg_arg(0, Float)?,
                src1: reg_arg(1, Float)?,
                src2: reg_arg(2, Float)?,
            })
        };
        // A trailing branch target is accepted but not used.
        let branch = |op: BranchOp| -> Result<InstKind, InstError> {
            Ok(InstKind::Branch {
                op,
                src1: reg_arg(0, Int)?,
                src2: reg_arg(1, Int)?,
            })
        };

        let (kind, max_args) = match opcode {
            Opcode::Flw => (mem(MemOp::Load, Float)?, 2),
            Opcode::Fsw => (mem(MemOp::Store, Float)?, 2),
            Opcode::Lw => (mem(MemOp::Load, Int)?, 2),
            Opcode::Sw => (mem(MemOp::Store, Int)?, 2),
            Opcode::FaddS => (float(FloatOp::Add)?, 3),
            Opcode::FsubS => (float(FloatOp::Sub)?, 3),
            Opcode::FmulS => (float(FloatOp::Mul)?, 3),
            Opcode::FdivS => (float(FloatOp::Div)?, 3),
            Opcode::Add => (int(IntOp::Add)?, 3),
            Opcode::Sub => (int(IntOp::Sub)?, 3),
            Opcode::Beq => (branch(BranchOp::Eq)?, 3),
            Opcode::Bne => (branch(BranchOp::Ne)?, 3),
        };

        if args.len() > max_args {
            return Err(malformed(format!(
                "expected at most {max_args} operands, found {}",
                args.len()
            )));
        }

        Ok(Inst {
            opcode,
            kind,
            text: text.to_owned(),
            timing: Timing::default(),
        })
    }
}

impl FromStr for Reg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let class = match s.chars().next() {
            Some('x') => RegClass::Int,
            Some('f') => RegClass::Float,
            _ => return Err(format!("unknown register: '{s}'")),
        };

        let digits = &s[1..];
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("unknown register: '{s}'"));
        }

        match digits.parse::<u8>() {
            Ok(num) if num < NUM_ARCH_REGS => Ok(Reg { class, num }),
            _ => Err(format!("register out of range: '{s}'")),
        }
    }
}

impl FromStr for MemRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ea, addr) = s
            .split_once(':')
            .ok_or_else(|| format!("invalid memory reference (no address): '{s}'"))?;

        let (offset, base) = ea
            .trim()
            .strip_suffix(')')
            .and_then(|ea| ea.split_once('('))
            .ok_or_else(|| format!("invalid memory reference (no base): '{s}'"))?;

        let offset = match offset.trim() {
            "" => 0,
            off => off
                .parse::<i32>()
                .map_err(|_| format!("invalid offset: '{off}'"))?,
        };

        Ok(MemRef {
            offset,
            base: base.trim().parse()?,
            addr: addr.parse()?,
        })
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.class {
            RegClass::Int => 'x',
            RegClass::Float => 'f',
        };
        write!(f, "{prefix}{}", self.num)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Reg(reg) => reg.fmt(f),
            Location::Mem(addr) => addr.fmt(f),
        }
    }
}

impl fmt::Display for Inst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reg() {
        assert_eq!(Reg::from_str("x0"), Ok(Reg::int(0)));
        assert_eq!(Reg::from_str("x31"), Ok(Reg::int(31)));
        assert_eq!(Reg::from_str("f2"), Ok(Reg::float(2)));
        assert_eq!(Reg::from_str("f10"), Ok(Reg::float(10)));
        assert!(Reg::from_str("x32").is_err());
        assert!(Reg::from_str("x").is_err());
        assert!(Reg::from_str("x+1").is_err());
        assert!(Reg::from_str("r1").is_err());
        assert!(Reg::from_str("").is_err());
        assert_eq!(Reg::float(7).to_string(), "f7");
    }

    #[test]
    fn test_memref() {
        let x2 = Reg::int(2);
        assert_eq!(
            MemRef::from_str("32(x2):0x100"),
            Ok(MemRef { offset: 32, base: x2, addr: Addr(0x100) })
        );
        assert_eq!(
            MemRef::from_str("-8(x2):64"),
            Ok(MemRef { offset: -8, base: x2, addr: Addr(64) })
        );
        assert_eq!(
            MemRef::from_str("(x2):0x4"),
            Ok(MemRef { offset: 0, base: x2, addr: Addr(4) })
        );
        assert_eq!(
            MemRef::from_str("0(x12):0x4"),
            Ok(MemRef { offset: 0, base: Reg::int(12), addr: Addr(4) })
        );

        assert!(MemRef::from_str("0(x2)").is_err());
        assert!(MemRef::from_str("0x2:0x4").is_err());
        assert!(MemRef::from_str("a(x2):0x4").is_err());
        assert!(MemRef::from_str("0(x2):zz").is_err());
    }

    #[test]
    fn test_parse_kinds() {
        let inst = Inst::from_str("flw f6,32(x2):0x100").unwrap();
        assert_eq!(inst.opcode, Opcode::Flw);
        assert!(inst.is_load());
        assert_eq!(inst.dest(), Some(Location::Reg(Reg::float(6))));
        assert_eq!(
            inst.sources(),
            (Location::Reg(Reg::int(2)), Location::Mem(Addr(0x100)))
        );
        assert_eq!(inst.unit_class(), UnitClass::EffAddr);

        let inst = Inst::from_str("sw x5,0(x1):0x40").unwrap();
        assert!(inst.is_store());
        assert!(!inst.writes_result());
        assert_eq!(inst.dest(), Some(Location::Mem(Addr(0x40))));
        assert_eq!(
            inst.sources(),
            (Location::Reg(Reg::int(1)), Location::Reg(Reg::int(5)))
        );

        let inst = Inst::from_str("fdiv.s f0,f2,f4").unwrap();
        assert_eq!(inst.unit_class(), UnitClass::FpMul);
        assert_eq!(inst.latency(&ResourceConfig::default()), 10);

        let inst = Inst::from_str("fsub.s f0,f2,f4").unwrap();
        assert_eq!(inst.unit_class(), UnitClass::FpAdd);

        let inst = Inst::from_str("sub x3,x1,x2").unwrap();
        assert_eq!(inst.unit_class(), UnitClass::Int);
        assert_eq!(inst.latency(&ResourceConfig::default()), 1);

        let inst = Inst::from_str("bne x1,x2,loop").unwrap();
        assert!(inst.is_branch());
        assert_eq!(inst.dest(), None);
        assert_eq!(inst.unit_class(), UnitClass::Int);
        assert_eq!(inst.text, "bne x1,x2,loop");

        assert!(Inst::from_str("beq x1,x2").is_ok());
        assert!(Inst::from_str("  ADD x1,x2,x3  ").is_ok());
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            Inst::from_str("fadd.s f1,x2,f3"),
            Err(InstError::WrongRegClass {
                inst: "fadd.s f1,x2,f3".to_owned(),
                reg: Reg::int(2),
            })
        );
        assert!(matches!(
            Inst::from_str("add x1,x2,f3"),
            Err(InstError::WrongRegClass { .. })
        ));
        assert!(matches!(
            Inst::from_str("flw x1,0(x2):0x10"),
            Err(InstError::WrongRegClass { .. })
        ));
        assert!(matches!(
            Inst::from_str("lw x1,0(f2):0x10"),
            Err(InstError::WrongRegClass { .. })
        ));
        assert!(matches!(
            Inst::from_str("add x1,x2"),
            Err(InstError::MissingOperand { n: 2, .. })
        ));
        assert!(matches!(
            Inst::from_str("add x1,x2,x3,x4"),
            Err(InstError::Malformed { .. })
        ));
        assert!(matches!(
            Inst::from_str("lw x1,0(x2)"),
            Err(InstError::Malformed { .. })
        ));
        assert_eq!(
            Inst::from_str("mul x1,x2,x3"),
            Err(InstError::UnknownOpcode("mul".to_owned()))
        );
    }

    #[test]
    fn test_timing_order() {
        let mut timing = Timing::default();
        assert!(timing.is_ordered());
        assert!(timing.stamps().is_empty());

        timing.issued = Some(1);
        timing.exec_start = Some(2);
        timing.exec_end = Some(2);
        timing.commit = Some(4);
        assert!(timing.is_ordered());
        assert_eq!(timing.stamps(), vec![1, 2, 2, 4]);

        timing.write_result = Some(5);
        assert!(!timing.is_ordered());
    }
}
