// HYBRIDSWEEP v1.0.0 -- MPI x OPENMP COMPUTE-TIME SWEEPS
// RUN:  LAUNCH THE TARGET ONCE PER (RANKS, THREADS) POINT, CAPTURE "Compute time", WRITE CSV
// PLOT: CSV -> LINE CHART
//
// THE TWO MODES NEVER RUN TOGETHER. THEY SHARE NOTHING BUT THE RESULTS FILE.

mod cli;

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cli::plot::PlotArgs;
use cli::run::RunArgs;

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

#[derive(Parser)]
#[command(name = "hybridsweep")]
#[command(about = "HYBRIDSWEEP -- BENCHMARK MPI + OPENMP COMPUTE TIMES")]
struct Cli {
    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Subcommand)]
enum Mode {
    // RUN THE SWEEP AND WRITE THE RESULTS FILE
    Run(RunArgs),
    // PLOT A RESULTS FILE
    Plot(PlotArgs),
}

fn init_logging() {
    // RUST_LOG OVERRIDES; DEFAULT SHOWS PER-POINT DIAGNOSTICS
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    match cli.mode {
        Some(Mode::Run(args)) => {
            // THE CHILD SHARES OUR PROCESS GROUP AND GETS THE SAME SIGINT.
            // WE ONLY STOP LAUNCHING NEW POINTS.
            ctrlc::set_handler(move || {
                SHUTDOWN.store(true, Ordering::Relaxed);
            })?;
            cli::run::run_sweep_mode(args, &SHUTDOWN)
        }
        Some(Mode::Plot(args)) => cli::plot::run_plot_mode(args),
        None => {
            Cli::command().print_help()?;
            println!();
            println!("SPECIFY A MODE: run OR plot");
            Ok(())
        }
    }
}
