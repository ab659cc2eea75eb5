use crate::io::{csv as csv_io, text as text_io};
use crate::signal::Reading;
use anyhow::Result;
use std::collections::VecDeque;
use std::path::Path;

/// Producer of sensor readings, polled by the acquisition loop.
pub trait SampleSource {
    /// Next available reading. `Ok(None)` once the source is exhausted; a live
    /// sensor never returns it.
    fn poll(&mut self) -> Result<Option<Reading>>;
}

/// Replays a recorded stream of readings in order.
#[derive(Debug, Clone, Default)]
pub struct ReplaySource {
    pending: VecDeque<Reading>,
}

impl ReplaySource {
    pub fn new(readings: Vec<Reading>) -> Self {
        Self {
            pending: readings.into(),
        }
    }

    /// Stamp bare IR values as if they arrived at `rate_hz`, starting at 0 ms.
    pub fn from_values(values: &[f64], rate_hz: f64) -> Self {
        let stamps = text_io::synth_timestamps_ms(values.len(), rate_hz, 0);
        let readings = values
            .iter()
            .zip(stamps)
            .map(|(&ir, timestamp_ms)| Reading {
                timestamp_ms,
                ir,
                red: None,
                presence: None,
            })
            .collect();
        Self::new(readings)
    }

    /// Load a recording: `.csv` files carry their own timestamps, anything else
    /// is read as one IR value per line sampled at `rate_hz`.
    pub fn open(path: &Path, rate_hz: f64) -> Result<Self> {
        let is_csv = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        if is_csv {
            Ok(Self::new(csv_io::read_readings(path)?))
        } else {
            let values = text_io::read_f64_series(path)?;
            Ok(Self::from_values(&values, rate_hz))
        }
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl SampleSource for ReplaySource {
    fn poll(&mut self) -> Result<Option<Reading>> {
        Ok(self.pending.pop_front())
    }
}
