use crate::detectors::ppg::EstimatorConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("window size must be at least one sample")]
    ZeroWindow,
    #[error("smoothing span must be at least one sample")]
    ZeroSmoothingSpan,
    #[error("sample rate must be positive and finite, got {0}")]
    InvalidSampleRate(f64),
    #[error("FIFO average must be at least one sample")]
    ZeroFifoAverage,
    #[error("compute interval must be positive")]
    ZeroComputeInterval,
}

/// Front-end settings of the optical sensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Internal sampling rate of the sensor (Hz).
    pub sample_rate_hz: usize,
    /// Number of internal samples averaged into one FIFO entry.
    pub fifo_average: usize,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 400,
            fifo_average: 8,
        }
    }
}

impl SensorConfig {
    /// Rate at which readings actually reach the host.
    pub fn acquisition_rate_hz(&self) -> usize {
        self.sample_rate_hz / self.fifo_average.max(1)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fifo_average == 0 {
            return Err(ConfigError::ZeroFifoAverage);
        }
        if self.acquisition_rate_hz() == 0 {
            return Err(ConfigError::InvalidSampleRate(
                self.sample_rate_hz as f64 / self.fifo_average as f64,
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Time between two heart-rate computations (ms).
    pub compute_interval_ms: u64,
    /// Oxygen saturation figure sent alongside each heart rate.
    pub oximetry: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            compute_interval_ms: 15_000,
            oximetry: 95.0,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.compute_interval_ms == 0 {
            return Err(ConfigError::ZeroComputeInterval);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Endpoint receiving reports, e.g. `http://172.20.10.3:5000/add`.
    pub url: Option<String>,
    /// Report server address, used when `url` is not set.
    pub host: Option<String>,
    pub port: u16,
    pub timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: None,
            port: 5_000,
            timeout_ms: 5_000,
        }
    }
}

impl TransportConfig {
    /// Where reports go: the explicit `url`, else the `/add` route on `host:port`.
    pub fn endpoint(&self) -> Option<String> {
        self.url
            .clone()
            .or_else(|| self.host.as_deref().map(|host| endpoint_url(host, self.port)))
    }
}

/// Build the delivery endpoint for a report server.
pub fn endpoint_url(host: &str, port: u16) -> String {
    format!("http://{}:{}/add", host, port)
}

/// Everything a monitoring session needs, as read from a TOML file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    pub sensor: SensorConfig,
    /// Explicit estimator sizing; derived from the sensor when absent.
    pub estimator: Option<EstimatorConfig>,
    pub session: SessionConfig,
    pub transport: TransportConfig,
}

impl PulseConfig {
    pub fn estimator_config(&self) -> EstimatorConfig {
        self.estimator.unwrap_or_else(|| {
            EstimatorConfig::for_acquisition_rate(self.sensor.acquisition_rate_hz())
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sensor.validate()?;
        self.estimator_config().validate()?;
        self.session.validate()
    }
}

pub fn parse_config(text: &str) -> Result<PulseConfig> {
    let cfg: PulseConfig = toml::from_str(text).context("parsing pulse config")?;
    cfg.validate()?;
    Ok(cfg)
}

pub fn read_config(path: &Path) -> Result<PulseConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("invalid config {}", path.display()))
}
