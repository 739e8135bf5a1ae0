// HYBRIDSWEEP SWEEP PROFILES
// TWO NAMED PRESETS. NEITHER IS A DEFAULT FOR THE OTHER:
//   STANDARD: RANKS 1..=12, THREADS {1,2}, NO DEVICE COLUMN
//   DEVICE:   RANKS {1,2,4,6,8}, THREADS {1,2,4,8}, DEVICE REQUIRED

use anyhow::{bail, Result};

use crate::point::{sweep_points, ConfigurationPoint, Device};

const STANDARD_RANKS: [u32; 12] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12];
const STANDARD_THREADS: [u32; 2] = [1, 2];

const DEVICE_RANKS: [u32; 5] = [1, 2, 4, 6, 8];
const DEVICE_THREADS: [u32; 4] = [1, 2, 4, 8];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Profile {
    #[default]
    Standard,
    Device,
}

impl Profile {
    pub fn ranks(self) -> &'static [u32] {
        match self {
            Profile::Standard => &STANDARD_RANKS,
            Profile::Device => &DEVICE_RANKS,
        }
    }

    pub fn threads(self) -> &'static [u32] {
        match self {
            Profile::Standard => &STANDARD_THREADS,
            Profile::Device => &DEVICE_THREADS,
        }
    }

    pub fn needs_device(self) -> bool {
        matches!(self, Profile::Device)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SweepPlan {
    pub ranks: Vec<u32>,
    pub threads: Vec<u32>,
    pub device: Option<Device>,
}

impl SweepPlan {
    // OVERRIDES REPLACE THE PROFILE'S LISTS WHOLESALE, ORDER PRESERVED
    pub fn resolve(
        profile: Profile,
        device: Option<Device>,
        ranks: Option<Vec<u32>>,
        threads: Option<Vec<u32>>,
    ) -> Result<Self> {
        match (profile.needs_device(), device) {
            (true, None) => bail!("PROFILE device REQUIRES --device cpu|gpu"),
            (false, Some(d)) => bail!(
                "PROFILE standard HAS NO DEVICE COLUMN (GOT --device {}); USE --profile device",
                d
            ),
            _ => {}
        }

        let ranks = ranks.unwrap_or_else(|| profile.ranks().to_vec());
        let threads = threads.unwrap_or_else(|| profile.threads().to_vec());
        validate("RANKS", &ranks)?;
        validate("THREADS", &threads)?;

        Ok(Self { ranks, threads, device })
    }

    pub fn points(&self) -> Vec<ConfigurationPoint> {
        sweep_points(&self.ranks, &self.threads, self.device)
    }
}

fn validate(what: &str, values: &[u32]) -> Result<()> {
    if values.is_empty() {
        bail!("{} LIST IS EMPTY", what);
    }
    if values.contains(&0) {
        bail!("{} MUST BE POSITIVE (GOT {:?})", what, values);
    }
    Ok(())
}
