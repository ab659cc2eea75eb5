use crate::{
    detectors::ppg::{HeartRateEstimator, InsufficientData},
    signal::{PeakRecord, SampleRecord},
};
use std::sync::{Arc, Mutex, MutexGuard};

/// Estimator handle for hosts where the producer and the consumer run on
/// different threads. Every operation holds the same lock, so readers never
/// see a window between append and eviction.
#[derive(Debug, Clone)]
pub struct SharedEstimator {
    inner: Arc<Mutex<HeartRateEstimator>>,
}

impl SharedEstimator {
    pub fn new(estimator: HeartRateEstimator) -> Self {
        Self {
            inner: Arc::new(Mutex::new(estimator)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HeartRateEstimator> {
        // a panic can't leave a half-applied record behind, so poisoning is ignored
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_sample(&self, value: f64, now_ms: u64) {
        self.lock().add_sample(value, now_ms);
    }

    pub fn find_peaks(&self) -> Vec<PeakRecord> {
        self.lock().find_peaks()
    }

    pub fn calculate_heart_rate(&self) -> Result<f64, InsufficientData> {
        self.lock().calculate_heart_rate()
    }

    /// Copy of the current window contents, oldest first.
    pub fn snapshot(&self) -> Vec<SampleRecord> {
        self.lock().window().records()
    }
}
