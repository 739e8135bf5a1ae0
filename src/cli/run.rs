use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use anyhow::Result;
use clap::Args;

use hybridsweep::point::Device;
use hybridsweep::profile::{Profile, SweepPlan};
use hybridsweep::sweep::{run_sweep, LaunchSpec, DEFAULT_LAUNCHER};

#[derive(Args)]
pub struct RunArgs {
    // RESULTS FILE, TRUNCATED AT START
    #[arg(long, default_value = "results.csv")]
    csv: PathBuf,

    // WORKING DIRECTORY FOR EVERY CHILD (CREATED IF ABSENT)
    #[arg(long, default_value = "build")]
    build_dir: PathBuf,

    // TARGET EXECUTABLE, RELATIVE TO --build-dir
    #[arg(long, default_value = "./aiquamplusplus")]
    executable: PathBuf,

    // CONFIG FILE HANDED TO THE TARGET, RELATIVE TO --build-dir
    #[arg(long, default_value = "aiquam.json")]
    config_file: PathBuf,

    // standard: RANKS 1..12 x THREADS {1,2}
    // device:   RANKS {1,2,4,6,8} x THREADS {1,2,4,8}, NEEDS --device
    #[arg(long, value_enum, default_value_t = Profile::Standard)]
    profile: Profile,

    #[arg(long, value_enum)]
    device: Option<Device>,

    // OVERRIDE THE PROFILE'S RANK LIST (COMMA-SEPARATED, ORDER KEPT)
    #[arg(long, value_delimiter = ',', value_parser = clap::value_parser!(u32).range(1..))]
    ranks: Option<Vec<u32>>,

    // OVERRIDE THE PROFILE'S THREAD LIST (COMMA-SEPARATED, ORDER KEPT)
    #[arg(long, value_delimiter = ',', value_parser = clap::value_parser!(u32).range(1..))]
    threads: Option<Vec<u32>>,

    #[arg(long, default_value = DEFAULT_LAUNCHER)]
    launcher: OsString,
}

pub fn run_sweep_mode(args: RunArgs, shutdown: &AtomicBool) -> Result<()> {
    let plan = SweepPlan::resolve(args.profile, args.device, args.ranks, args.threads)?;

    let mut spec = LaunchSpec::new(args.executable, args.config_file, args.build_dir);
    spec.launcher = args.launcher;

    let sep = "=".repeat(60);
    println!("{}", sep);
    println!("HYBRIDSWEEP RUN");
    println!("{}", sep);
    println!("PROFILE:         {:?}", args.profile);
    if let Some(device) = plan.device {
        println!("DEVICE:          {}", device);
    }
    println!("RANKS:           {:?}", plan.ranks);
    println!("THREADS:         {:?}", plan.threads);
    println!("POINTS:          {}", plan.points().len());
    println!("BUILD DIR:       {}", spec.build_dir.display());
    println!("EXECUTABLE:      {}", spec.executable.display());
    println!("CONFIG FILE:     {}", spec.config_file.display());
    println!("RESULTS:         {}", args.csv.display());
    println!();

    let summary = run_sweep(spec, &plan, &args.csv, shutdown)?;

    println!();
    println!("{}", sep);
    println!("{}", summary);
    println!("RESULTS SAVED IN {}", args.csv.display());
    println!("{}", sep);
    Ok(())
}
