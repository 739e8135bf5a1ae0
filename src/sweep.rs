// HYBRIDSWEEP SWEEP DRIVER
// ONE CHILD AT A TIME. THE TARGET SATURATES THE MACHINE ON ITS OWN, SO TWO LIVE
// POINTS WOULD CORRUPT EACH OTHER'S TIMINGS.
//
// PER POINT: SPAWN <launcher> -n <ranks> <executable> <config> IN build_dir WITH
// OMP_NUM_THREADS=<threads>, STDOUT+STDERR ON ONE PIPE, ECHO EVERY LINE, KEEP THE
// LAST TIMING MATCH, WAIT, THEN RECORD OR SKIP. NO RETRIES, NO TIMEOUT.

use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::extract::TimingExtractor;
use crate::point::{ConfigurationPoint, MeasurementRecord};
use crate::profile::SweepPlan;
use crate::store::{ResultsWriter, Schema};

pub const DEFAULT_LAUNCHER: &str = "mpirun";
pub const THREAD_VAR: &str = "OMP_NUM_THREADS";

#[derive(Clone, Debug)]
pub struct LaunchSpec {
    pub launcher: OsString,
    pub executable: PathBuf,
    pub config_file: PathBuf,
    pub build_dir: PathBuf,
}

impl LaunchSpec {
    pub fn new(
        executable: impl Into<PathBuf>,
        config_file: impl Into<PathBuf>,
        build_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            launcher: DEFAULT_LAUNCHER.into(),
            executable: executable.into(),
            config_file: config_file.into(),
            build_dir: build_dir.into(),
        }
    }

    // PARENT ENVIRONMENT INHERITED. THE THREAD COUNT IS THE ONLY OVERRIDE;
    // THE DEVICE LABEL IS RECORDED, NEVER PASSED TO THE CHILD.
    pub fn command(&self, point: &ConfigurationPoint) -> Command {
        let mut cmd = Command::new(&self.launcher);
        cmd.arg("-n")
            .arg(point.ranks.to_string())
            .arg(&self.executable)
            .arg(&self.config_file)
            .current_dir(&self.build_dir)
            .env(THREAD_VAR, point.threads.to_string());
        cmd
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointOutcome {
    Recorded(MeasurementRecord),
    // NON-ZERO EXIT. code IS None WHEN THE CHILD DIED FROM A SIGNAL.
    Failed { code: Option<i32> },
    NoTiming,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub attempted: usize,
    pub recorded: usize,
    pub failed: usize,
    pub missing_timing: usize,
}

impl fmt::Display for SweepSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ATTEMPTED {}  RECORDED {}  FAILED {}  NO TIMING {}",
            self.attempted, self.recorded, self.failed, self.missing_timing
        )
    }
}

pub struct SweepDriver {
    spec: LaunchSpec,
    extractor: TimingExtractor,
}

impl SweepDriver {
    pub fn new(spec: LaunchSpec) -> Result<Self> {
        Ok(Self {
            spec,
            extractor: TimingExtractor::new()?,
        })
    }

    // LAUNCH ONE POINT AND CLASSIFY IT. A LAUNCHER THAT CANNOT START IS AN UNUSABLE
    // ENVIRONMENT AND PROPAGATES; EVERYTHING THE CHILD DOES WRONG IS AN OUTCOME.
    pub fn run_point(&mut self, point: &ConfigurationPoint) -> Result<PointOutcome> {
        self.extractor.reset();

        let (reader, writer) = io::pipe().context("FAILED TO CREATE OUTPUT PIPE")?;
        let mut cmd = self.spec.command(point);
        cmd.stdout(writer.try_clone()?).stderr(writer);
        let spawned = cmd.spawn();
        // DROP OUR COPIES OF THE WRITE END OR THE READ BELOW NEVER SEES EOF
        drop(cmd);
        let mut child = spawned
            .with_context(|| format!("FAILED TO LAUNCH {:?} ({})", self.spec.launcher, point))?;

        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(['\n', '\r']);
                    println!("{}", line);
                    self.extractor.observe(line);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(%point, "OUTPUT STREAM READ FAILED: {}", e);
                    break;
                }
            }
        }

        let status = child
            .wait()
            .with_context(|| format!("FAILED TO WAIT FOR CHILD ({})", point))?;
        Ok(classify(point, status, self.extractor.last()))
    }

    // STRICTLY SEQUENTIAL. EVERY POINT IS ATTEMPTED UNLESS shutdown IS RAISED.
    pub fn run(
        &mut self,
        plan: &SweepPlan,
        results: &mut ResultsWriter,
        shutdown: &AtomicBool,
    ) -> Result<SweepSummary> {
        fs::create_dir_all(&self.spec.build_dir)
            .with_context(|| format!("FAILED TO CREATE {}", self.spec.build_dir.display()))?;

        let mut summary = SweepSummary::default();
        for point in &plan.points() {
            if shutdown.load(Ordering::Relaxed) {
                warn!("SWEEP INTERRUPTED -- KEEPING {} RECORDED ROWS", summary.recorded);
                break;
            }

            println!("\n=== RUNNING: {} ===\n", point);
            summary.attempted += 1;

            match self.run_point(point)? {
                PointOutcome::Recorded(record) => {
                    results.append(&record)?;
                    summary.recorded += 1;
                    info!(%point, time_s = record.time_s, "RECORDED");
                }
                PointOutcome::Failed { .. } => summary.failed += 1,
                PointOutcome::NoTiming => summary.missing_timing += 1,
            }
        }

        Ok(summary)
    }
}

fn classify(point: &ConfigurationPoint, status: ExitStatus, time_s: Option<f64>) -> PointOutcome {
    if !status.success() {
        error!(%point, "EXIT STATUS {}", status);
        return PointOutcome::Failed { code: status.code() };
    }
    match time_s {
        Some(t) => PointOutcome::Recorded(point.record(t)),
        None => {
            warn!(%point, "TIME NOT FOUND");
            PointOutcome::NoTiming
        }
    }
}

// TRUNCATE THE RESULTS FILE, THEN SWEEP. THE HEADER IS WRITTEN EVEN IF NO POINT SUCCEEDS.
pub fn run_sweep(
    spec: LaunchSpec,
    plan: &SweepPlan,
    csv_path: &Path,
    shutdown: &AtomicBool,
) -> Result<SweepSummary> {
    let mut driver = SweepDriver::new(spec)?;
    let mut results = ResultsWriter::create(csv_path, Schema::for_device(plan.device))?;
    let summary = driver.run(plan, &mut results, shutdown)?;
    info!(rows = results.rows(), "RESULTS SAVED IN {}", csv_path.display());
    Ok(summary)
}
