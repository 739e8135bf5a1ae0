// HYBRIDSWEEP RESULTS VISUALIZER
// READS A RESULTS FILE WHOLESALE, ONE LINE CHART: X = "<ranks>x<threads>" IN FILE
// ORDER, Y = time_s (OR SPEED-UP AGAINST THE 1x1 ROW). SAVES, THEN TRIES TO SHOW IT.
// A MISSING INPUT FILE IS AN OPERATOR MISTAKE, NOT A FAULT: LOG AND RETURN.

use std::path::{Path, PathBuf};

use anyhow::Result;
use plotters::prelude::*;
use tracing::{error, info, warn};

use crate::point::MeasurementRecord;
use crate::store::load_records;

const CHART_SIZE: (u32, u32) = (1000, 600);
const X_DESC: &str = "MPI Ranks x OMP Threads";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Metric {
    #[default]
    Runtime,
    Speedup,
}

impl Metric {
    pub fn default_output(self) -> &'static str {
        match self {
            Metric::Runtime => "runtime_plot.svg",
            Metric::Speedup => "speedup_plot.svg",
        }
    }

    fn title(self) -> &'static str {
        match self {
            Metric::Runtime => "Compute Time per Configuration",
            Metric::Speedup => "Speed-up vs MPI x OpenMP Configuration",
        }
    }

    fn y_desc(self) -> &'static str {
        match self {
            Metric::Runtime => "Time (s)",
            Metric::Speedup => "Speed-up (1x1 baseline)",
        }
    }
}

#[derive(Clone, Debug)]
pub struct PlotOptions {
    pub csv: PathBuf,
    pub metric: Metric,
    pub output: Option<PathBuf>,
    pub show: bool,
}

impl PlotOptions {
    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| PathBuf::from(self.metric.default_output()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlotOutcome {
    Saved(PathBuf),
    MissingInput,
    Empty,
    MissingBaseline,
}

// PURE CHART DATA. SAME RECORDS IN, SAME SERIES OUT.
// SPEEDUP: None WITHOUT A 1x1 ROW (FIRST ONE WINS); ZERO-TIME ROWS ARE DROPPED.
pub fn chart_series(records: &[MeasurementRecord], metric: Metric) -> Option<Vec<(String, f64)>> {
    match metric {
        Metric::Runtime => Some(records.iter().map(|r| (r.label(), r.time_s)).collect()),
        Metric::Speedup => {
            let base = records.iter().find(|r| r.ranks == 1 && r.threads == 1)?.time_s;
            Some(
                records
                    .iter()
                    .filter(|r| r.time_s > 0.0)
                    .map(|r| (r.label(), base / r.time_s))
                    .collect(),
            )
        }
    }
}

pub fn plot_results(opts: &PlotOptions) -> Result<PlotOutcome> {
    if !opts.csv.exists() {
        error!("CSV FILE '{}' NOT FOUND", opts.csv.display());
        return Ok(PlotOutcome::MissingInput);
    }

    let records = load_records(&opts.csv)?;
    if records.is_empty() {
        warn!("NO RECORDS IN '{}' -- NOTHING TO PLOT", opts.csv.display());
        return Ok(PlotOutcome::Empty);
    }

    let series = match chart_series(&records, opts.metric) {
        Some(s) if !s.is_empty() => s,
        _ => {
            error!("NO BASE CONFIGURATION (1x1) FOUND FOR SPEED-UP CALCULATION");
            return Ok(PlotOutcome::MissingBaseline);
        }
    };

    let output = opts.output_path();
    render(&series, opts.metric, &output)?;
    println!("SAVED PLOT TO '{}'", output.display());

    if opts.show {
        show(&output);
    }
    Ok(PlotOutcome::Saved(output))
}

fn render(series: &[(String, f64)], metric: Metric, output: &Path) -> Result<()> {
    let labels: Vec<&str> = series.iter().map(|(l, _)| l.as_str()).collect();
    let y_max = series.iter().map(|(_, v)| *v).fold(0.0_f64, f64::max);
    let y_top = if y_max > 0.0 { y_max * 1.1 } else { 1.0 };

    let root = SVGBackend::new(output, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(metric.title(), ("sans-serif", 28))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(70)
        .build_cartesian_2d(0usize..series.len(), 0f64..y_top)?;

    let x_fmt = |x: &usize| labels.get(*x).map(|l| l.to_string()).unwrap_or_default();
    chart
        .configure_mesh()
        // INTEGER KEY POINTS COVER BOTH RANGE ENDS; ONE EXTRA KEEPS THE STEP AT 1
        .x_labels(series.len() + 1)
        .x_label_formatter(&x_fmt)
        .x_desc(X_DESC)
        .y_desc(metric.y_desc())
        .bold_line_style(BLACK.mix(0.2))
        .light_line_style(BLACK.mix(0.06))
        .draw()?;

    chart.draw_series(LineSeries::new(
        series.iter().enumerate().map(|(i, (_, v))| (i, *v)),
        &BLUE,
    ))?;
    chart.draw_series(
        series
            .iter()
            .enumerate()
            .map(|(i, (_, v))| Circle::new((i, *v), 4, BLUE.filled())),
    )?;

    root.present()?;
    info!(points = series.len(), "RENDERED {}", output.display());
    Ok(())
}

// INTERACTIVE DISPLAY IS BEST-EFFORT: HEADLESS HOSTS HAVE NO VIEWER
fn show(path: &Path) {
    if let Err(e) = open::that(path) {
        warn!("COULD NOT OPEN '{}' FOR DISPLAY: {}", path.display(), e);
    }
}
