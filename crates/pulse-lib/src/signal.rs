use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One acquisition step: the raw reading, when it was taken, and its smoothed value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub raw: f64,
    /// Monotonic timestamp in milliseconds.
    pub timestamp_ms: u64,
    pub smoothed: f64,
}

/// A detected pulse peak on the smoothed signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakRecord {
    pub timestamp_ms: u64,
    pub value: f64,
}

/// A single sensor reading as delivered by the acquisition collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp_ms: u64,
    /// Infrared intensity, the channel the estimator consumes.
    pub ir: f64,
    #[serde(default)]
    pub red: Option<f64>,
    /// Motion sensor level at the time of the reading, when one is wired.
    #[serde(default)]
    pub presence: Option<bool>,
}

/// Fixed-capacity trailing history of samples.
///
/// Raw values, timestamps and smoothed values live in one record per step, so
/// eviction always drops all three together.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    capacity: usize,
    records: VecDeque<SampleRecord>,
}

impl SampleWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            // one extra slot: a record is pushed before the oldest one is evicted
            records: VecDeque::with_capacity(capacity + 1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append a raw sample, smoothing it over the trailing `span` raw values.
    ///
    /// Until `span` raw values are available the raw value is stored unchanged
    /// as its own smoothed value. Returns the smoothed value that was stored.
    pub fn push(&mut self, raw: f64, timestamp_ms: u64, span: usize) -> f64 {
        self.records.push_back(SampleRecord {
            raw,
            timestamp_ms,
            smoothed: raw,
        });

        let len = self.records.len();
        let smoothed = if span > 0 && len >= span {
            let sum: f64 = self.records.range(len - span..).map(|r| r.raw).sum();
            sum / span as f64
        } else {
            raw
        };
        if let Some(last) = self.records.back_mut() {
            last.smoothed = smoothed;
        }

        while self.records.len() > self.capacity {
            self.records.pop_front();
        }
        smoothed
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &SampleRecord> + ExactSizeIterator {
        self.records.iter()
    }

    pub fn raw(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.raw).collect()
    }

    pub fn timestamps(&self) -> Vec<u64> {
        self.records.iter().map(|r| r.timestamp_ms).collect()
    }

    pub fn smoothed(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.smoothed).collect()
    }

    pub fn records(&self) -> Vec<SampleRecord> {
        self.records.iter().copied().collect()
    }
}
