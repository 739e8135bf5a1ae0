// HYBRIDSWEEP RESULTS STORE
// COMMA-DELIMITED, MANDATORY HEADER. TWO ACCEPTED SCHEMAS:
//   ranks,threads,time_s
//   ranks,threads,device,time_s
// THE WRITER FLUSHES AFTER EVERY ROW SO A KILLED SWEEP KEEPS ITS PARTIAL RESULTS.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::point::{Device, MeasurementRecord};

const PLAIN_HEADER: [&str; 3] = ["ranks", "threads", "time_s"];
const DEVICE_HEADER: [&str; 4] = ["ranks", "threads", "device", "time_s"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Schema {
    Plain,
    WithDevice,
}

impl Schema {
    pub fn for_device(device: Option<Device>) -> Self {
        if device.is_some() {
            Schema::WithDevice
        } else {
            Schema::Plain
        }
    }

    pub fn header(self) -> &'static [&'static str] {
        match self {
            Schema::Plain => &PLAIN_HEADER,
            Schema::WithDevice => &DEVICE_HEADER,
        }
    }

    fn from_header(header: &csv::StringRecord) -> Option<Self> {
        let cols: Vec<&str> = header.iter().map(str::trim).collect();
        if cols == PLAIN_HEADER {
            Some(Schema::Plain)
        } else if cols == DEVICE_HEADER {
            Some(Schema::WithDevice)
        } else {
            None
        }
    }
}

pub struct ResultsWriter {
    writer: csv::Writer<File>,
    schema: Schema,
    path: PathBuf,
    rows: usize,
}

impl ResultsWriter {
    // TRUNCATES ANY EXISTING FILE. HEADER IS ON DISK BEFORE THE FIRST POINT RUNS.
    pub fn create(path: impl AsRef<Path>, schema: Schema) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("FAILED TO CREATE {}", parent.display()))?;
        }
        let file = File::create(&path)
            .with_context(|| format!("FAILED TO CREATE {}", path.display()))?;
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(schema.header())?;
        writer.flush()?;
        Ok(Self { writer, schema, path, rows: 0 })
    }

    // THE SCHEMA PICKED AT CREATE TIME DECIDES THE COLUMNS
    pub fn append(&mut self, record: &MeasurementRecord) -> Result<()> {
        let ranks = record.ranks.to_string();
        let threads = record.threads.to_string();
        let time_s = record.time_s.to_string();
        match self.schema {
            Schema::Plain => self.writer.write_record([&ranks, &threads, &time_s])?,
            Schema::WithDevice => {
                let device = record.device.map(Device::label).unwrap_or_default();
                self.writer
                    .write_record([ranks.as_str(), threads.as_str(), device, time_s.as_str()])?
            }
        }
        self.writer
            .flush()
            .with_context(|| format!("FAILED TO FLUSH {}", self.path.display()))?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }
}

#[derive(Deserialize)]
struct Row {
    ranks: u32,
    threads: u32,
    #[serde(default)]
    device: Option<String>,
    time_s: f64,
}

// WHOLESALE READ IN FILE ORDER. THE HEADER DECIDES THE SCHEMA.
pub fn load_records(path: impl AsRef<Path>) -> Result<Vec<MeasurementRecord>> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("FAILED TO OPEN {}", path.display()))?;

    let header = reader.headers()?.clone();
    let schema = match Schema::from_header(&header) {
        Some(s) => s,
        None => bail!(
            "{}: UNRECOGNIZED HEADER '{}' (EXPECTED '{}' OR '{}')",
            path.display(),
            header.iter().collect::<Vec<_>>().join(","),
            PLAIN_HEADER.join(","),
            DEVICE_HEADER.join(",")
        ),
    };

    let mut records = Vec::new();
    for (idx, row) in reader.deserialize::<Row>().enumerate() {
        // ROW 1 IS THE HEADER
        let line = idx + 2;
        let row = row.with_context(|| format!("{}: ROW {} MALFORMED", path.display(), line))?;
        let device = match (schema, row.device.as_deref()) {
            (Schema::WithDevice, Some(label)) => Some(
                label
                    .parse::<Device>()
                    .with_context(|| format!("{}: ROW {}", path.display(), line))?,
            ),
            (Schema::WithDevice, None) => {
                bail!("{}: ROW {}: MISSING DEVICE", path.display(), line)
            }
            (Schema::Plain, _) => None,
        };
        records.push(MeasurementRecord {
            ranks: row.ranks,
            threads: row.threads,
            device,
            time_s: row.time_s,
        });
    }
    Ok(records)
}
