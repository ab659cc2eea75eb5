use crate::signal::PeakRecord;
use serde::{Deserialize, Serialize};

pub const MS_PER_MINUTE: f64 = 60_000.0;
/// Inclusive BPM range reported as normal.
pub const NORMAL_BPM_RANGE: (f64, f64) = (50.0, 100.0);

/// Signed spacing between consecutive peaks in milliseconds. A negative value
/// means the peaks were stamped out of order.
pub fn peak_intervals_ms(peaks: &[PeakRecord]) -> Vec<f64> {
    peaks
        .windows(2)
        .map(|w| w[1].timestamp_ms as f64 - w[0].timestamp_ms as f64)
        .collect()
}

/// Beats per minute from inter-beat intervals (ms). `None` when there is no
/// interval or the mean interval is zero.
pub fn bpm_from_intervals(intervals_ms: &[f64]) -> Option<f64> {
    if intervals_ms.is_empty() {
        return None;
    }
    let mean = intervals_ms.iter().sum::<f64>() / intervals_ms.len() as f64;
    if mean <= 0.0 || !mean.is_finite() {
        return None;
    }
    Some(MS_PER_MINUTE / mean)
}

/// Label attached to every delivered heart rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeartRateStatus {
    Normal,
    #[serde(rename = "Alerta")]
    Alert,
}

impl HeartRateStatus {
    pub fn classify(bpm: f64) -> Self {
        let (lo, hi) = NORMAL_BPM_RANGE;
        if (lo..=hi).contains(&bpm) {
            HeartRateStatus::Normal
        } else {
            HeartRateStatus::Alert
        }
    }
}

/// Running collection of heart rates between two deliveries.
#[derive(Debug, Clone, Default)]
pub struct BpmAccumulator {
    values: Vec<f64>,
}

impl BpmAccumulator {
    pub fn push(&mut self, bpm: f64) {
        self.values.push(bpm);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        Some(self.values.iter().sum::<f64>() / self.values.len() as f64)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}
