use crate::{
    config::{ConfigError, SessionConfig},
    detectors::ppg::{EstimatorConfig, HeartRateEstimator, InsufficientData},
    io::source::SampleSource,
    metrics::rate::BpmAccumulator,
    report::{deliver, HeartRateReport, Payload, PresenceEvent, ReportSink},
    signal::Reading,
};
use anyhow::Result;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// Result of one compute cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CycleOutcome {
    Report(HeartRateReport),
    Skipped(InsufficientData),
}

/// Counters for a finished session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub samples: usize,
    pub cycles: usize,
    pub reports: usize,
    pub delivered: usize,
    pub skipped: usize,
    pub presence_alerts: usize,
    pub presence_delivered: usize,
}

/// One acquisition session: the estimator plus the periodic compute schedule.
#[derive(Debug, Clone)]
pub struct MonitorSession {
    estimator: HeartRateEstimator,
    cfg: SessionConfig,
    ref_time_ms: Option<u64>,
    accumulated: BpmAccumulator,
}

impl MonitorSession {
    pub fn new(estimator_cfg: EstimatorConfig, cfg: SessionConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let estimator = HeartRateEstimator::new(estimator_cfg)?;
        info!(
            "session: window {} samples (~{} Hz), smoothing span {}, compute every {} ms",
            estimator_cfg.window_size,
            estimator_cfg.sample_rate_hz,
            estimator_cfg.smoothing_span,
            cfg.compute_interval_ms
        );
        Ok(Self {
            estimator,
            cfg,
            ref_time_ms: None,
            accumulated: BpmAccumulator::default(),
        })
    }

    pub fn estimator(&self) -> &HeartRateEstimator {
        &self.estimator
    }

    /// Feed one reading; runs a compute cycle once the interval has strictly elapsed.
    pub fn ingest(&mut self, reading: Reading) -> Option<CycleOutcome> {
        let now = reading.timestamp_ms;
        self.estimator.add_sample(reading.ir, now);
        let ref_time = *self.ref_time_ms.get_or_insert(now);
        if now.saturating_sub(ref_time) > self.cfg.compute_interval_ms {
            let outcome = self.compute_cycle();
            self.ref_time_ms = Some(now);
            Some(outcome)
        } else {
            None
        }
    }

    /// Estimate the heart rate now and turn it into a report.
    pub fn compute_cycle(&mut self) -> CycleOutcome {
        match self.estimator.calculate_heart_rate() {
            Ok(bpm) => {
                info!("heart rate: {:.0} BPM", bpm);
                // reset every cycle, so a report carries only this cycle's estimate
                self.accumulated.push(bpm);
                let mean = self.accumulated.mean().unwrap_or(bpm);
                self.accumulated.clear();
                CycleOutcome::Report(HeartRateReport::new(mean, self.cfg.oximetry))
            }
            Err(reason) => {
                info!("not enough data for a heart rate: {}", reason);
                CycleOutcome::Skipped(reason)
            }
        }
    }
}

/// Drive a session until the source runs dry, delivering every report and
/// raising a presence alert for each reading taken while motion is detected.
pub fn run_session(
    source: &mut dyn SampleSource,
    sink: &mut dyn ReportSink,
    session: &mut MonitorSession,
) -> Result<SessionSummary> {
    let mut summary = SessionSummary::default();
    while let Some(reading) = source.poll()? {
        summary.samples += 1;
        let motion = reading.presence == Some(true);
        match session.ingest(reading) {
            Some(CycleOutcome::Report(report)) => {
                summary.cycles += 1;
                summary.reports += 1;
                if deliver(sink, &Payload::from(report)) {
                    summary.delivered += 1;
                }
            }
            Some(CycleOutcome::Skipped(_)) => {
                summary.cycles += 1;
                summary.skipped += 1;
            }
            None => {}
        }
        if motion {
            warn!("motion detected at {} ms", reading.timestamp_ms);
            summary.presence_alerts += 1;
            if deliver(sink, &PresenceEvent::motion_detected().into()) {
                summary.presence_delivered += 1;
            }
        }
    }
    debug!("source exhausted after {} samples", summary.samples);
    Ok(summary)
}
