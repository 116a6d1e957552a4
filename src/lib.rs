use std::path::{Path, PathBuf};

use config::{ConfigError, ResourceConfig};
use engine::Engine;
use stats::SimResult;
use thiserror::Error;
use trace::{Trace, TraceError};

pub mod config;
pub mod engine;
pub mod inst;
pub mod lsq;
pub mod queue;
pub mod rat;
pub mod report;
pub mod reservation_station;
pub mod rob;
pub mod stats;
pub mod trace;
pub mod util;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Trace(#[from] TraceError),
}

fn read(path: &Path) -> Result<String, Error> {
    std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_owned(),
        source,
    })
}

/// Reads and validates both inputs. The configuration is checked before the
/// trace is looked at.
pub fn load(config: &Path, trace: &Path) -> Result<(ResourceConfig, Trace), Error> {
    let config = read(config)?.parse::<ResourceConfig>()?;
    let trace = read(trace)?.parse::<Trace>()?;
    Ok((config, trace))
}

/// Runs `trace` to completion. `config` is validated first, so hand-built
/// configurations are held to the same limits as parsed ones.
pub fn simulate(config: &ResourceConfig, trace: Trace) -> Result<SimResult, Error> {
    Ok(Engine::new(config, trace.insts)?.run())
}

pub fn load_and_simulate(config: &Path, trace: &Path) -> Result<(ResourceConfig, SimResult), Error> {
    let (config, trace) = load(config, trace)?;
    let res = simulate(&config, trace)?;
    Ok((config, res))
}
