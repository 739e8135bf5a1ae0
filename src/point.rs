// HYBRIDSWEEP CONFIGURATION SPACE
// ONE POINT PER (RANKS, THREADS[, DEVICE]) TUPLE. ONE RECORD PER SUCCESSFUL POINT.

use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Device {
    Cpu,
    Gpu,
}

impl Device {
    // PERSISTED SPELLING IN THE device COLUMN
    pub fn label(self) -> &'static str {
        match self {
            Device::Cpu => "CPU",
            Device::Gpu => "GPU",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Device {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CPU" => Ok(Device::Cpu),
            "GPU" => Ok(Device::Gpu),
            other => bail!("UNKNOWN DEVICE LABEL '{}' (EXPECTED CPU OR GPU)", other),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConfigurationPoint {
    pub ranks: u32,
    pub threads: u32,
    pub device: Option<Device>,
}

impl ConfigurationPoint {
    pub fn label(&self) -> String {
        format!("{}x{}", self.ranks, self.threads)
    }

    pub fn record(&self, time_s: f64) -> MeasurementRecord {
        MeasurementRecord {
            ranks: self.ranks,
            threads: self.threads,
            device: self.device,
            time_s,
        }
    }
}

impl fmt::Display for ConfigurationPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ranks={}, threads={}", self.ranks, self.threads)?;
        if let Some(device) = self.device {
            write!(f, ", device={}", device)?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeasurementRecord {
    pub ranks: u32,
    pub threads: u32,
    pub device: Option<Device>,
    pub time_s: f64,
}

impl MeasurementRecord {
    pub fn label(&self) -> String {
        format!("{}x{}", self.ranks, self.threads)
    }
}

// CARTESIAN PRODUCT IN SWEEP ORDER: RANKS OUTER, THREADS INNER
pub fn sweep_points(ranks: &[u32], threads: &[u32], device: Option<Device>) -> Vec<ConfigurationPoint> {
    ranks
        .iter()
        .flat_map(|&r| {
            threads.iter().map(move |&t| ConfigurationPoint {
                ranks: r,
                threads: t,
                device,
            })
        })
        .collect()
}
