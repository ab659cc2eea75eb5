use anyhow::{Context, Result};
use std::path::Path;

/// Parse newline-delimited sensor values, ignoring blank/comment lines.
pub fn parse_f64_series(text: &str) -> Result<Vec<f64>> {
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let val: f64 = trimmed
            .parse()
            .with_context(|| format!("line {} is not numeric: {}", idx + 1, trimmed))?;
        out.push(val);
    }
    if out.is_empty() {
        anyhow::bail!("no numeric samples found");
    }
    Ok(out)
}

/// Read a newline-delimited series of sensor values from disk.
pub fn read_f64_series(path: &Path) -> Result<Vec<f64>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_f64_series(&text)
}

/// Millisecond timestamps for `count` samples taken at a fixed rate.
pub fn synth_timestamps_ms(count: usize, rate_hz: f64, start_ms: u64) -> Vec<u64> {
    let rate = if rate_hz.is_finite() && rate_hz > 0.0 {
        rate_hz
    } else {
        1.0
    };
    (0..count)
        .map(|i| start_ms + (i as f64 * 1000.0 / rate).round() as u64)
        .collect()
}
