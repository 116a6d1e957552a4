use std::{path::PathBuf, process};

use clap::Parser;
use dynsched::{engine::Engine, report::PipelineReport, Error};

#[derive(Parser, Debug)]
#[command(
    name = "dynsched",
    version,
    about = "Tomasulo dynamic scheduling simulator with a reorder buffer"
)]
struct Cli {
    /// Resource configuration (station counts, reorder buffer size, latencies).
    config: PathBuf,

    /// Instruction trace, one instruction per line.
    trace: PathBuf,

    /// Print reservation stations, reorder buffer and register status every cycle.
    #[arg(short, long)]
    verbose: bool,
}

fn run(cli: &Cli) -> Result<(), Error> {
    let (config, trace) = dynsched::load(&cli.config, &cli.trace)?;
    println!("{config}");

    let mut engine = Engine::new(&config, trace.insts)?;
    while !engine.is_done() {
        engine.step();

        if cli.verbose {
            println!();
            println!("{}", engine.snapshot());
        }
    }
    let res = engine.finish();

    println!();
    println!();
    println!("{}", PipelineReport::new(&res));
    Ok(())
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
