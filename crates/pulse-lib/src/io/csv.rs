use crate::signal::Reading;
use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct ReadingRow {
    timestamp_ms: u64,
    ir: f64,
    #[serde(default)]
    red: Option<f64>,
    #[serde(default, deserialize_with = "presence_flag")]
    presence: Option<bool>,
}

/// Accept `0`/`1` as well as `true`/`false`; an empty cell means no reading.
fn presence_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some("1") | Some("true") => Ok(Some(true)),
        Some("0") | Some("false") => Ok(Some(false)),
        Some(other) => Err(serde::de::Error::custom(format!(
            "invalid presence flag {:?}",
            other
        ))),
    }
}

/// Parse a recorded stream with `timestamp_ms,ir[,red][,presence]` columns.
/// Timestamps must never decrease.
pub fn parse_readings<R: Read>(source: R) -> Result<Vec<Reading>> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .comment(Some(b'#'))
        .from_reader(source);
    let mut readings: Vec<Reading> = Vec::new();
    for (idx, row) in reader.deserialize::<ReadingRow>().enumerate() {
        let row = row.with_context(|| format!("parsing reading row {}", idx + 1))?;
        if let Some(prev) = readings.last() {
            if row.timestamp_ms < prev.timestamp_ms {
                anyhow::bail!(
                    "reading row {}: timestamp {} ms is earlier than {} ms",
                    idx + 1,
                    row.timestamp_ms,
                    prev.timestamp_ms
                );
            }
        }
        readings.push(Reading {
            timestamp_ms: row.timestamp_ms,
            ir: row.ir,
            red: row.red,
            presence: row.presence,
        });
    }
    if readings.is_empty() {
        anyhow::bail!("no readings found");
    }
    Ok(readings)
}

pub fn read_readings(path: &Path) -> Result<Vec<Reading>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("opening readings {}", path.display()))?;
    parse_readings(file).with_context(|| format!("reading {}", path.display()))
}
