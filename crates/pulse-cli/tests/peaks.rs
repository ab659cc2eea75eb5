use assert_cmd::cargo::cargo_bin_cmd;
use serde::Deserialize;
use std::error::Error;
use std::path::PathBuf;

#[derive(Deserialize)]
struct Peak {
    timestamp_ms: u64,
    value: f64,
}

#[derive(Deserialize)]
struct PeaksOutput {
    samples: usize,
    window: usize,
    threshold: Option<f64>,
    peaks: Vec<Peak>,
    bpm: Option<f64>,
    reason: Option<String>,
}

fn sample_path(relative: &str) -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root")
        .join(relative)
        .to_string_lossy()
        .to_string()
}

fn run_peaks(args: &[&str]) -> Result<PeaksOutput, Box<dyn Error>> {
    let mut cmd = cargo_bin_cmd!("pulse");
    cmd.arg("peaks").args(args);
    let out = cmd.assert().success().get_output().stdout.clone();
    Ok(serde_json::from_slice(&out)?)
}

#[test]
fn peaks_from_text_recording() -> Result<(), Box<dyn Error>> {
    let input = sample_path("test_data/ppg_75bpm.txt");
    let out = run_peaks(&["--input", &input, "--rate-hz", "50"])?;
    assert_eq!(out.samples, 500);
    assert_eq!(out.window, 150);
    let stamps: Vec<u64> = out.peaks.iter().map(|p| p.timestamp_ms).collect();
    assert_eq!(stamps, vec![7440, 8240, 9040, 9840]);
    let threshold = out.threshold.expect("threshold");
    assert!(out.peaks.iter().all(|p| p.value > threshold));
    assert_eq!(out.bpm, Some(75.0));
    assert!(out.reason.is_none());
    Ok(())
}

#[test]
fn peaks_from_csv_recording_uses_file_timestamps() -> Result<(), Box<dyn Error>> {
    let input = sample_path("test_data/ppg_75bpm.csv");
    // rate only sizes the window here; timestamps come from the file
    let out = run_peaks(&["--input", &input, "--rate-hz", "50"])?;
    assert_eq!(out.samples, 500);
    assert_eq!(out.bpm, Some(75.0));
    Ok(())
}

#[test]
fn flat_signal_reports_missing_peaks() -> Result<(), Box<dyn Error>> {
    let input = sample_path("test_data/flat.txt");
    let out = run_peaks(&["--input", &input])?;
    assert!(out.bpm.is_none());
    assert!(out.peaks.is_empty());
    let reason = out.reason.expect("reason");
    assert!(reason.contains("peaks"), "unexpected reason: {}", reason);
    Ok(())
}

#[test]
fn smoothing_override_is_applied() -> Result<(), Box<dyn Error>> {
    let input = sample_path("test_data/ppg_75bpm.txt");
    let out = run_peaks(&[
        "--input",
        &input,
        "--rate-hz",
        "50",
        "--window-size",
        "100",
        "--smoothing-span",
        "1",
    ])?;
    assert_eq!(out.window, 100);
    assert_eq!(out.bpm, Some(75.0));
    Ok(())
}

#[test]
fn missing_input_fails() {
    let mut cmd = cargo_bin_cmd!("pulse");
    cmd.args(["peaks", "--input", "/nonexistent/recording.txt"]);
    cmd.assert().failure();
}
