use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use hybridsweep::plot::{plot_results, Metric, PlotOptions};

#[derive(Args)]
pub struct PlotArgs {
    // RESULTS FILE WRITTEN BY `run`
    #[arg(long, default_value = "results.csv")]
    csv: PathBuf,

    // runtime: time_s PER POINT. speedup: T(1x1) / time_s
    #[arg(long, value_enum, default_value_t = Metric::Runtime)]
    metric: Metric,

    // IMAGE PATH (DEFAULT runtime_plot.svg / speedup_plot.svg)
    #[arg(long)]
    output: Option<PathBuf>,

    // SAVE ONLY, DO NOT OPEN A VIEWER
    #[arg(long)]
    no_show: bool,
}

pub fn run_plot_mode(args: PlotArgs) -> Result<()> {
    let opts = PlotOptions {
        csv: args.csv,
        metric: args.metric,
        output: args.output,
        show: !args.no_show,
    };
    // EVERY NON-SAVED OUTCOME WAS ALREADY REPORTED; NONE OF THEM IS AN ERROR
    plot_results(&opts)?;
    Ok(())
}
