//! Resource limits of the simulated machine.
//!
//! The configuration file is a list of `key: value` lines. Lines without a
//! colon are section headers and are skipped. The first nine entries are,
//! in order:
//!
//! ```text
//! buffers
//!
//! eff addr: 2
//! fp adds: 3
//! fp muls: 3
//! ints: 2
//! reorder: 5
//!
//! latencies
//!
//! fp_add: 2
//! fp_sub: 2
//! fp_mul: 5
//! fp_div: 10
//! ```
//!
//! Keys are only descriptive, position decides what a value means.

use std::{fmt, str::FromStr};

use thiserror::Error;

use crate::{inst::FloatOp, reservation_station::UnitClass};

/// Upper bound on reorder buffer entries.
pub const MAX_REORDER_ENTRIES: usize = 10;

const ENTRY_NAMES: [&str; 9] = [
    "eff addr",
    "fp adds",
    "fp muls",
    "ints",
    "reorder",
    "fp add latency",
    "fp sub latency",
    "fp mul latency",
    "fp div latency",
];

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ResourceConfig {
    pub eff_addr: usize,
    pub fp_add: usize,
    pub fp_mul: usize,
    pub int: usize,
    pub reorder: usize,
    pub fp_add_latency: u32,
    pub fp_sub_latency: u32,
    pub fp_mul_latency: u32,
    pub fp_div_latency: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing configuration entry '{0}'")]
    Missing(&'static str),
    #[error("invalid value for '{name}' on line {line}: '{value}'")]
    Invalid {
        name: &'static str,
        line: usize,
        value: String,
    },
    #[error("'{0}' must be at least 1")]
    Zero(&'static str),
    #[error("too many entries for the reorder buffer: {0} (at most 10)")]
    ReorderTooLarge(usize),
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            eff_addr: 2,
            fp_add: 3,
            fp_mul: 3,
            int: 2,
            reorder: 5,
            fp_add_latency: 2,
            fp_sub_latency: 2,
            fp_mul_latency: 5,
            fp_div_latency: 10,
        }
    }
}

impl ResourceConfig {
    /// Checks the limits the simulator relies on. Called by the parser, and
    /// by the engine for hand-built configurations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reorder > MAX_REORDER_ENTRIES {
            return Err(ConfigError::ReorderTooLarge(self.reorder));
        }

        let counts = [
            self.eff_addr,
            self.fp_add,
            self.fp_mul,
            self.int,
            self.reorder,
        ];
        let latencies = [
            self.fp_add_latency,
            self.fp_sub_latency,
            self.fp_mul_latency,
            self.fp_div_latency,
        ];
        let values = counts
            .into_iter()
            .chain(latencies.into_iter().map(|l| l as usize));

        match ENTRY_NAMES.iter().zip(values).find(|(_, v)| *v == 0) {
            Some((name, _)) => Err(ConfigError::Zero(*name)),
            None => Ok(()),
        }
    }

    pub fn stations(&self, class: UnitClass) -> usize {
        match class {
            UnitClass::EffAddr => self.eff_addr,
            UnitClass::FpAdd => self.fp_add,
            UnitClass::FpMul => self.fp_mul,
            UnitClass::Int => self.int,
        }
    }

    pub fn latency(&self, op: FloatOp) -> u32 {
        match op {
            FloatOp::Add => self.fp_add_latency,
            FloatOp::Sub => self.fp_sub_latency,
            FloatOp::Mul => self.fp_mul_latency,
            FloatOp::Div => self.fp_div_latency,
        }
    }
}

impl FromStr for ResourceConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut values = Vec::with_capacity(ENTRY_NAMES.len());

        for (i, line) in s.lines().enumerate() {
            if values.len() == ENTRY_NAMES.len() {
                break;
            }

            let Some((_, value)) = line.split_once(':') else {
                continue;
            };

            let name = ENTRY_NAMES[values.len()];
            let value = value.trim();
            let parsed = value.parse::<u32>().map_err(|_| ConfigError::Invalid {
                name,
                line: i + 1,
                value: value.to_owned(),
            })?;
            values.push(parsed);
        }

        if let Some(name) = ENTRY_NAMES.get(values.len()) {
            return Err(ConfigError::Missing(*name));
        }

        let count = |i: usize| values[i] as usize;
        let config = ResourceConfig {
            eff_addr: count(0),
            fp_add: count(1),
            fp_mul: count(2),
            int: count(3),
            reorder: count(4),
            fp_add_latency: values[5],
            fp_sub_latency: values[6],
            fp_mul_latency: values[7],
            fp_div_latency: values[8],
        };

        config.validate()?;
        log::debug!("loaded configuration: {:?}", config);

        Ok(config)
    }
}

impl fmt::Display for ResourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Configuration")?;
        writeln!(f, "-------------")?;
        writeln!(f, "buffers:")?;
        writeln!(f, "{:>12} {}", "eff addr:", self.eff_addr)?;
        writeln!(f, "{:>12} {}", "fp adds:", self.fp_add)?;
        writeln!(f, "{:>12} {}", "fp muls:", self.fp_mul)?;
        writeln!(f, "{:>12} {}", "ints:", self.int)?;
        writeln!(f, "{:>12} {}", "reorder:", self.reorder)?;
        writeln!(f)?;
        writeln!(f, "latencies:")?;
        writeln!(f, "{:>10} {}", "fp add:", self.fp_add_latency)?;
        writeln!(f, "{:>10} {}", "fp sub:", self.fp_sub_latency)?;
        writeln!(f, "{:>10} {}", "fp mul:", self.fp_mul_latency)?;
        write!(f, "{:>10} {}", "fp div:", self.fp_div_latency)
    }
}
