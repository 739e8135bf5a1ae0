// HYBRIDSWEEP TIMING EXTRACTION
// SCANS CHILD OUTPUT FOR "Compute time: <float> s". LAST MATCH IN THE STREAM WINS:
// WARM-UP AND PROGRESS LINES MAY PRECEDE THE AUTHORITATIVE ONE.

use anyhow::Result;
use regex::Regex;

// ACCEPTS 3.14, 2, .5, 2., 1e-05 (C++ STREAM FORMATTING OF A DOUBLE)
const TIME_PATTERN: &str = r"Compute time:\s+([0-9]*\.?[0-9]*(?:[eE][-+]?[0-9]+)?)\s+s";

pub struct TimingExtractor {
    pattern: Regex,
    last: Option<f64>,
}

impl TimingExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(TIME_PATTERN)?,
            last: None,
        })
    }

    // MATCH A SINGLE LINE. NUMERIC TEXT THAT DOES NOT PARSE IS NOT A MATCH.
    pub fn scan(&self, line: &str) -> Option<f64> {
        self.pattern
            .captures_iter(line)
            .filter_map(|c| c.get(1)?.as_str().parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .last()
    }

    pub fn observe(&mut self, line: &str) -> Option<f64> {
        let found = self.scan(line);
        if found.is_some() {
            self.last = found;
        }
        found
    }

    pub fn last(&self) -> Option<f64> {
        self.last
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}
