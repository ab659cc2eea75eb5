use crate::config::TransportConfig;
use crate::metrics::rate::HeartRateStatus;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::time::Duration;
use thiserror::Error;

/// Heart rate forwarded to the report server.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeartRateReport {
    #[serde(rename = "batimentos")]
    pub bpm: f64,
    #[serde(rename = "oximetria")]
    pub oximetry: f64,
    pub status: HeartRateStatus,
}

impl HeartRateReport {
    pub fn new(bpm: f64, oximetry: f64) -> Self {
        Self {
            bpm,
            oximetry,
            status: HeartRateStatus::classify(bpm),
        }
    }
}

/// Event label sent while the presence sensor reports motion.
pub const MOTION_DETECTED: &str = "Movimento detectado";

/// Alert raised while the presence sensor is high.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceEvent {
    #[serde(rename = "evento")]
    pub event: String,
    pub status: HeartRateStatus,
}

impl PresenceEvent {
    pub fn motion_detected() -> Self {
        Self {
            event: MOTION_DETECTED.to_string(),
            status: HeartRateStatus::Alert,
        }
    }
}

/// Anything forwarded to the report server. Serialises as the bare inner object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    HeartRate(HeartRateReport),
    Presence(PresenceEvent),
}

impl Payload {
    fn label(&self) -> &'static str {
        match self {
            Payload::HeartRate(_) => "heart rate report",
            Payload::Presence(_) => "presence alert",
        }
    }
}

impl From<HeartRateReport> for Payload {
    fn from(report: HeartRateReport) -> Self {
        Payload::HeartRate(report)
    }
}

impl From<PresenceEvent> for Payload {
    fn from(event: PresenceEvent) -> Self {
        Payload::Presence(event)
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("server answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encoding report: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Consumer of reports and alerts.
pub trait ReportSink {
    fn send(&mut self, payload: &Payload) -> Result<(), TransportError>;
}

/// `PUT`s each payload as JSON to an HTTP endpoint.
pub struct HttpSink {
    url: String,
    agent: ureq::Agent,
}

impl HttpSink {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            url: url.into(),
            agent,
        }
    }

    pub fn from_config(cfg: &TransportConfig) -> Option<Self> {
        cfg.endpoint()
            .map(|url| Self::new(url, Duration::from_millis(cfg.timeout_ms)))
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl ReportSink for HttpSink {
    fn send(&mut self, payload: &Payload) -> Result<(), TransportError> {
        match self.agent.put(&self.url).send_json(payload) {
            Ok(resp) if resp.status() == 200 => Ok(()),
            Ok(resp) => {
                let status = resp.status();
                let body = resp.into_string().unwrap_or_default();
                Err(TransportError::Status { status, body })
            }
            Err(ureq::Error::Status(status, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                Err(TransportError::Status { status, body })
            }
            Err(ureq::Error::Transport(t)) => Err(TransportError::Transport(t.to_string())),
        }
    }
}

/// Writes one JSON payload per line.
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ReportSink for JsonLinesSink<W> {
    fn send(&mut self, payload: &Payload) -> Result<(), TransportError> {
        let serialized = serde_json::to_string(payload)?;
        self.writer.write_all(serialized.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Sends to every inner sink, returning the first failure.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn ReportSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sink: Box<dyn ReportSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl ReportSink for FanoutSink {
    fn send(&mut self, payload: &Payload) -> Result<(), TransportError> {
        let mut first_err = None;
        for sink in self.sinks.iter_mut() {
            if let Err(err) = sink.send(payload) {
                // only the first failure reaches the caller
                if first_err.is_none() {
                    first_err = Some(err);
                } else {
                    warn!("additional report sink failed: {}", err);
                }
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Deliver a payload without ever failing the caller. Returns whether it went through.
///
/// Delivery is best effort: a failed send is logged and dropped, the estimator
/// and the session carry on untouched.
pub fn deliver(sink: &mut dyn ReportSink, payload: &Payload) -> bool {
    debug!("delivering {:?}", payload);
    let label = payload.label();
    match sink.send(payload) {
        Ok(()) => {
            match payload {
                Payload::HeartRate(report) => {
                    info!("{} delivered ({:.0} BPM)", label, report.bpm)
                }
                Payload::Presence(_) => info!("{} delivered", label),
            }
            true
        }
        Err(TransportError::Status { status, body }) => {
            warn!("{} rejected with status {}: {}", label, status, body);
            false
        }
        Err(err) => {
            error!("could not deliver {}: {}", label, err);
            false
        }
    }
}
