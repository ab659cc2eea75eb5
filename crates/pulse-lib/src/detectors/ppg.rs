use crate::{
    config::ConfigError,
    metrics::rate::{bpm_from_intervals, peak_intervals_ms},
    signal::{PeakRecord, SampleRecord, SampleWindow},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fraction of the recent min..max range used as the peak threshold.
pub const THRESHOLD_FRACTION: f64 = 0.5;
/// Window length expressed in seconds of acquisition.
pub const WINDOW_SECONDS: usize = 3;
pub const DEFAULT_SMOOTHING_SPAN: usize = 5;

/// Sizing of the PPG heart-rate estimator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Nominal acquisition rate (Hz). Only used for sizing, never for timing.
    pub sample_rate_hz: f64,
    /// Number of samples retained (`W`).
    pub window_size: usize,
    /// Trailing moving-average span (`S`).
    pub smoothing_span: usize,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 100.0,
            window_size: 10,
            smoothing_span: DEFAULT_SMOOTHING_SPAN,
        }
    }
}

impl EstimatorConfig {
    /// Size the window to hold three seconds of samples at `rate_hz`.
    pub fn for_acquisition_rate(rate_hz: usize) -> Self {
        Self {
            sample_rate_hz: rate_hz as f64,
            window_size: rate_hz * WINDOW_SECONDS,
            smoothing_span: DEFAULT_SMOOTHING_SPAN,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        if self.smoothing_span == 0 {
            return Err(ConfigError::ZeroSmoothingSpan);
        }
        if !(self.sample_rate_hz.is_finite() && self.sample_rate_hz > 0.0) {
            return Err(ConfigError::InvalidSampleRate(self.sample_rate_hz));
        }
        Ok(())
    }
}

/// Why no heart rate could be produced this cycle. Expected during warm-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum InsufficientData {
    #[error("need at least 3 smoothed samples, have {available}")]
    TooFewSamples { available: usize },
    #[error("need at least 2 peaks, found {found}")]
    TooFewPeaks { found: usize },
    #[error("peaks share a timestamp, mean interval is zero")]
    ZeroInterval,
    #[error("peak timestamps go backwards")]
    OutOfOrder,
}

/// Streaming heart-rate estimator over an infrared PPG signal.
///
/// Samples are smoothed with a trailing moving average, peaks are local maxima
/// above a threshold halfway between the recent minimum and maximum, and the
/// rate is derived from the mean spacing between consecutive peaks.
#[derive(Debug, Clone)]
pub struct HeartRateEstimator {
    cfg: EstimatorConfig,
    window: SampleWindow,
}

impl HeartRateEstimator {
    pub fn new(cfg: EstimatorConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        Ok(Self {
            window: SampleWindow::new(cfg.window_size),
            cfg,
        })
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.cfg
    }

    pub fn window(&self) -> &SampleWindow {
        &self.window
    }

    /// Ingest one raw reading taken at `now_ms`. Any value is accepted.
    pub fn add_sample(&mut self, value: f64, now_ms: u64) {
        self.window.push(value, now_ms, self.cfg.smoothing_span);
    }

    /// Adaptive threshold over the current window, if there is anything to measure.
    pub fn threshold(&self) -> Option<f64> {
        let smoothed = self.window.smoothed();
        let recent = &smoothed[smoothed.len().saturating_sub(self.cfg.window_size)..];
        adaptive_threshold(recent)
    }

    /// Strict local maxima of the smoothed signal above the adaptive threshold.
    pub fn find_peaks(&self) -> Vec<PeakRecord> {
        let records = self.window.records();
        detect_peaks(&records, self.cfg.window_size)
    }

    /// Beats per minute from the mean inter-peak interval.
    pub fn calculate_heart_rate(&self) -> Result<f64, InsufficientData> {
        if self.window.len() < 3 {
            return Err(InsufficientData::TooFewSamples {
                available: self.window.len(),
            });
        }
        let peaks = self.find_peaks();
        if peaks.len() < 2 {
            return Err(InsufficientData::TooFewPeaks { found: peaks.len() });
        }
        let intervals = peak_intervals_ms(&peaks);
        if intervals.iter().any(|&dt| dt < 0.0) {
            return Err(InsufficientData::OutOfOrder);
        }
        bpm_from_intervals(&intervals).ok_or(InsufficientData::ZeroInterval)
    }
}

/// Midpoint between the minimum and maximum of `values`.
pub fn adaptive_threshold(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    Some(min + (max - min) * THRESHOLD_FRACTION)
}

/// Peak picker over a window of records.
///
/// The threshold is measured over the most recent `recent` smoothed values while
/// the scan covers every interior record. Neighbours that tie with the
/// candidate disqualify it.
pub fn detect_peaks(records: &[SampleRecord], recent: usize) -> Vec<PeakRecord> {
    if records.len() < 3 {
        return Vec::new();
    }
    let smoothed: Vec<f64> = records.iter().map(|r| r.smoothed).collect();
    let start = smoothed.len().saturating_sub(recent.max(1));
    let threshold = match adaptive_threshold(&smoothed[start..]) {
        Some(t) => t,
        None => return Vec::new(),
    };

    let mut peaks = Vec::new();
    for i in 1..smoothed.len() - 1 {
        let y = smoothed[i];
        if y > threshold && smoothed[i - 1] < y && y > smoothed[i + 1] {
            peaks.push(PeakRecord {
                timestamp_ms: records[i].timestamp_ms,
                value: y,
            });
        }
    }
    peaks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimator(window_size: usize, smoothing_span: usize) -> HeartRateEstimator {
        HeartRateEstimator::new(EstimatorConfig {
            sample_rate_hz: 100.0,
            window_size,
            smoothing_span,
        })
        .expect("valid config")
    }

    fn feed(est: &mut HeartRateEstimator, samples: &[(f64, u64)]) {
        for &(v, t) in samples {
            est.add_sample(v, t);
        }
    }

    #[test]
    fn sequences_stay_aligned_and_bounded() {
        let mut est = estimator(7, 3);
        for i in 0..40u64 {
            est.add_sample((i % 5) as f64 * 10.0, i * 20);
            let w = est.window();
            assert!(w.len() <= 7);
            assert_eq!(w.raw().len(), w.len());
            assert_eq!(w.timestamps().len(), w.len());
            assert_eq!(w.smoothed().len(), w.len());
        }
    }

    #[test]
    fn smoothing_matches_trailing_mean() {
        let mut est = estimator(50, 4);
        let raw = [4.0, 8.0, 1.0, 7.0, 2.0, 9.0, 3.0, 3.0];
        for (i, &v) in raw.iter().enumerate() {
            est.add_sample(v, i as u64);
        }
        let smoothed = est.window().smoothed();
        for i in 0..raw.len() {
            if i < 3 {
                assert_eq!(smoothed[i], raw[i]);
            } else {
                let mean = raw[i - 3..=i].iter().sum::<f64>() / 4.0;
                assert!((smoothed[i] - mean).abs() < 1e-12, "index {}", i);
            }
        }
    }

    #[test]
    fn no_peaks_below_three_samples() {
        let mut est = estimator(10, 1);
        assert!(est.find_peaks().is_empty());
        feed(&mut est, &[(0.0, 0), (10.0, 10)]);
        assert!(est.find_peaks().is_empty());
        assert_eq!(
            est.calculate_heart_rate(),
            Err(InsufficientData::TooFewSamples { available: 2 })
        );
    }

    #[test]
    fn single_spike_is_a_peak() {
        let mut est = estimator(10, 1);
        feed(&mut est, &[(0.0, 0), (10.0, 10), (0.0, 20)]);
        assert_eq!(est.threshold(), Some(5.0));
        let peaks = est.find_peaks();
        assert_eq!(
            peaks,
            vec![PeakRecord {
                timestamp_ms: 10,
                value: 10.0
            }]
        );
    }

    #[test]
    fn plateau_is_not_a_peak() {
        let mut est = estimator(10, 1);
        feed(&mut est, &[(0.0, 0), (5.0, 10), (5.0, 20), (0.0, 30)]);
        assert!(est.find_peaks().is_empty());
    }

    #[test]
    fn peaks_must_clear_the_threshold() {
        let mut est = estimator(10, 1);
        // the small bump at 30 ms is a local maximum but sits below the midpoint
        feed(
            &mut est,
            &[(0.0, 0), (10.0, 10), (0.0, 20), (3.0, 30), (0.0, 40)],
        );
        let stamps: Vec<u64> = est.find_peaks().iter().map(|p| p.timestamp_ms).collect();
        assert_eq!(stamps, vec![10]);
    }

    #[test]
    fn two_peaks_half_a_second_apart_is_120_bpm() {
        let mut est = estimator(10, 1);
        feed(
            &mut est,
            &[(0.0, 500), (10.0, 1000), (0.0, 1250), (10.0, 1500), (0.0, 1750)],
        );
        assert_eq!(est.calculate_heart_rate(), Ok(120.0));
    }

    #[test]
    fn constant_interval_of_600ms_is_100_bpm() {
        let mut est = estimator(10, 1);
        feed(
            &mut est,
            &[
                (1.0, 0),
                (9.0, 0),
                (1.0, 300),
                (9.0, 600),
                (1.0, 900),
                (9.0, 1200),
                (1.0, 1500),
            ],
        );
        let stamps: Vec<u64> = est.find_peaks().iter().map(|p| p.timestamp_ms).collect();
        assert_eq!(stamps, vec![0, 600, 1200]);
        assert_eq!(est.calculate_heart_rate(), Ok(100.0));
    }

    #[test]
    fn single_peak_is_insufficient() {
        let mut est = estimator(10, 1);
        feed(&mut est, &[(0.0, 0), (10.0, 10), (0.0, 20), (0.0, 30)]);
        assert_eq!(
            est.calculate_heart_rate(),
            Err(InsufficientData::TooFewPeaks { found: 1 })
        );
    }

    #[test]
    fn duplicate_timestamps_do_not_divide_by_zero() {
        let mut est = estimator(10, 1);
        feed(
            &mut est,
            &[(0.0, 100), (10.0, 100), (0.0, 100), (10.0, 100), (0.0, 100)],
        );
        assert_eq!(est.find_peaks().len(), 2);
        assert_eq!(
            est.calculate_heart_rate(),
            Err(InsufficientData::ZeroInterval)
        );
    }

    #[test]
    fn decreasing_timestamps_are_reported_as_out_of_order() {
        let mut est = estimator(10, 1);
        feed(
            &mut est,
            &[(0.0, 1000), (10.0, 1000), (0.0, 800), (10.0, 600), (0.0, 400)],
        );
        assert_eq!(est.find_peaks().len(), 2);
        assert_eq!(
            est.calculate_heart_rate(),
            Err(InsufficientData::OutOfOrder)
        );
    }

    #[test]
    fn heart_rate_is_idempotent() {
        let mut est = estimator(30, 2);
        let shape = [10.0, 10.0, 10.0, 50.0, 100.0, 10.0];
        for i in 0..30u64 {
            est.add_sample(shape[(i % 6) as usize], i * 100);
        }
        let first = est.calculate_heart_rate();
        let second = est.calculate_heart_rate();
        assert!(first.is_ok());
        assert_eq!(first, second);
    }

    #[test]
    fn eviction_drops_oldest_and_keeps_order() {
        let w = 5;
        let k = 3;
        let mut est = estimator(w, 2);
        for i in 0..(w + k) as u64 {
            est.add_sample(i as f64, 1000 + i);
        }
        let stamps = est.window().timestamps();
        assert_eq!(stamps, vec![1003, 1004, 1005, 1006, 1007]);
        assert_eq!(est.window().raw(), vec![3.0, 4.0, 5.0, 6.0, 7.0]);
        assert_eq!(est.window().smoothed(), vec![2.5, 3.5, 4.5, 5.5, 6.5]);
    }

    #[test]
    fn rejects_degenerate_config() {
        let mut cfg = EstimatorConfig::default();
        cfg.window_size = 0;
        assert!(HeartRateEstimator::new(cfg).is_err());
        let mut cfg = EstimatorConfig::default();
        cfg.smoothing_span = 0;
        assert!(HeartRateEstimator::new(cfg).is_err());
        let mut cfg = EstimatorConfig::default();
        cfg.sample_rate_hz = 0.0;
        assert!(HeartRateEstimator::new(cfg).is_err());
    }

    #[test]
    fn acquisition_rate_sizes_three_second_window() {
        let cfg = EstimatorConfig::for_acquisition_rate(50);
        assert_eq!(cfg.window_size, 150);
        assert_eq!(cfg.smoothing_span, 5);
        assert_eq!(cfg.sample_rate_hz, 50.0);
    }

    #[test]
    fn detects_regular_pulse_train() {
        use std::f64::consts::PI;
        let fs = 50usize;
        let mut est = HeartRateEstimator::new(EstimatorConfig::for_acquisition_rate(fs))
            .expect("valid config");
        // 1.25 Hz pulse = 75 BPM
        for i in 0..(fs * 6) {
            let t_ms = (i * 1000 / fs) as u64;
            let phase = 2.0 * PI * 1.25 * (i as f64 / fs as f64);
            est.add_sample(50_000.0 + 800.0 * phase.sin(), t_ms);
        }
        let bpm = est.calculate_heart_rate().expect("pulse detected");
        assert!((bpm - 75.0).abs() < 3.0, "bpm {}", bpm);
    }
}
