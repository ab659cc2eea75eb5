use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use log::{info, warn};
use plotters::prelude::*;
use pulse_lib::{
    config::{read_config, PulseConfig},
    detectors::ppg::{EstimatorConfig, HeartRateEstimator},
    io::source::{ReplaySource, SampleSource},
    plot::{figure_from_window, Figure, Series},
    report::{FanoutSink, HttpSink, JsonLinesSink},
    session::{run_session, MonitorSession},
    signal::PeakRecord,
};
use serde::Serialize;
use std::{
    io,
    path::{Path, PathBuf},
    time::Duration,
};

#[derive(Parser)]
#[command(
    name = "pulse",
    version,
    about = "PulseGuard: heart rate from infrared PPG recordings"
)]
struct Cli {
    /// Logging verbosity (e.g., debug, info, warn)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// TOML file with sensor/estimator/session/transport sections
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Recording and estimator sizing shared by every subcommand.
#[derive(Args, Clone)]
struct RecordingArgs {
    /// Recording: `.csv` with timestamp_ms,ir[,red][,presence] columns, otherwise one IR value per line
    #[arg(long)]
    input: PathBuf,
    /// Acquisition rate used to stamp plain-text recordings and size the window
    #[arg(long)]
    rate_hz: Option<usize>,
    #[arg(long)]
    window_size: Option<usize>,
    #[arg(long)]
    smoothing_span: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Feed a whole recording through one estimator and print peaks + BPM as JSON
    Peaks {
        #[command(flatten)]
        recording: RecordingArgs,
    },
    /// Replay a recording through a monitoring session, emitting one JSON report per cycle
    Monitor {
        #[command(flatten)]
        recording: RecordingArgs,
        /// Time between heart-rate computations (ms)
        #[arg(long)]
        interval_ms: Option<u64>,
        /// Also PUT each report to this endpoint
        #[arg(long)]
        url: Option<String>,
    },
    /// Render the final window (raw, smoothed, peaks) to a PNG via plotters
    Plot {
        #[command(flatten)]
        recording: RecordingArgs,
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Serialize)]
struct PeaksOutput {
    samples: usize,
    window: usize,
    threshold: Option<f64>,
    peaks: Vec<PeakRecord>,
    bpm: Option<f64>,
    reason: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(&cli.log_level)).init();

    let cfg = match cli.config.as_deref() {
        Some(path) => read_config(path)?,
        None => PulseConfig::default(),
    };

    match cli.command {
        Commands::Peaks { recording } => cmd_peaks(&cfg, &recording)?,
        Commands::Monitor {
            recording,
            interval_ms,
            url,
        } => cmd_monitor(&cfg, &recording, interval_ms, url)?,
        Commands::Plot { recording, out } => cmd_plot(&cfg, &recording, &out)?,
    }
    Ok(())
}

fn estimator_config(cfg: &PulseConfig, args: &RecordingArgs) -> EstimatorConfig {
    let mut est = match args.rate_hz {
        Some(rate) => EstimatorConfig::for_acquisition_rate(rate),
        None => cfg.estimator_config(),
    };
    if let Some(window_size) = args.window_size {
        est.window_size = window_size;
    }
    if let Some(smoothing_span) = args.smoothing_span {
        est.smoothing_span = smoothing_span;
    }
    est
}

fn open_recording(est: &EstimatorConfig, args: &RecordingArgs) -> Result<ReplaySource> {
    let source = ReplaySource::open(&args.input, est.sample_rate_hz)?;
    info!(
        "loaded {} readings from {}",
        source.remaining(),
        args.input.display()
    );
    Ok(source)
}

/// Replay a whole recording into a fresh estimator.
fn replay_into_estimator(
    cfg: &PulseConfig,
    args: &RecordingArgs,
) -> Result<(HeartRateEstimator, usize)> {
    let est_cfg = estimator_config(cfg, args);
    let mut estimator = HeartRateEstimator::new(est_cfg)?;
    let mut source = open_recording(&est_cfg, args)?;
    let mut samples = 0;
    while let Some(reading) = source.poll()? {
        estimator.add_sample(reading.ir, reading.timestamp_ms);
        samples += 1;
    }
    Ok((estimator, samples))
}

fn cmd_peaks(cfg: &PulseConfig, args: &RecordingArgs) -> Result<()> {
    let (estimator, samples) = replay_into_estimator(cfg, args)?;
    let (bpm, reason) = match estimator.calculate_heart_rate() {
        Ok(bpm) => (Some(bpm), None),
        Err(reason) => (None, Some(reason.to_string())),
    };
    let out = PeaksOutput {
        samples,
        window: estimator.window().len(),
        threshold: estimator.threshold(),
        peaks: estimator.find_peaks(),
        bpm,
        reason,
    };
    println!("{}", serde_json::to_string(&out)?);
    Ok(())
}

fn cmd_monitor(
    cfg: &PulseConfig,
    args: &RecordingArgs,
    interval_ms: Option<u64>,
    url: Option<String>,
) -> Result<()> {
    let est_cfg = estimator_config(cfg, args);
    let mut session_cfg = cfg.session;
    if let Some(interval_ms) = interval_ms {
        session_cfg.compute_interval_ms = interval_ms;
    }
    let mut session = MonitorSession::new(est_cfg, session_cfg)?;
    let mut source = open_recording(&est_cfg, args)?;

    let mut sink = FanoutSink::new();
    sink.push(Box::new(JsonLinesSink::new(io::stdout())));
    let http = match url {
        Some(url) => Some(HttpSink::new(
            url,
            Duration::from_millis(cfg.transport.timeout_ms),
        )),
        None => HttpSink::from_config(&cfg.transport),
    };
    if let Some(http) = http {
        info!("forwarding reports to {}", http.url());
        sink.push(Box::new(http));
    }

    let summary = run_session(&mut source, &mut sink, &mut session)?;
    info!(
        "session finished: {} samples, {} cycles, {} reports ({} delivered), {} skipped",
        summary.samples, summary.cycles, summary.reports, summary.delivered, summary.skipped
    );
    if summary.presence_alerts > 0 {
        info!(
            "{} presence alerts ({} delivered)",
            summary.presence_alerts, summary.presence_delivered
        );
    }
    if summary.reports == 0 {
        warn!("no heart rate could be computed from {}", args.input.display());
    }
    Ok(())
}

fn cmd_plot(cfg: &PulseConfig, args: &RecordingArgs, out: &Path) -> Result<()> {
    let (estimator, _) = replay_into_estimator(cfg, args)?;
    let records = estimator.window().records();
    let fig = figure_from_window(&records, &estimator.find_peaks(), 2048);
    draw_plotters_figure(out, &fig)
}

fn draw_plotters_figure(path: &Path, fig: &Figure) -> Result<()> {
    let (x_min, x_max, y_min, y_max) = fig
        .bounds()
        .ok_or_else(|| anyhow!("nothing to plot"))?;
    // flat traces still need a non-empty range
    let x_max = if x_max > x_min { x_max } else { x_min + 1.0 };
    let (y_min, y_max) = if y_max > y_min {
        (y_min, y_max)
    } else {
        (y_min - 1.0, y_max + 1.0)
    };

    let backend = BitMapBackend::new(path, (800, 480));
    let root = backend.into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .caption(
            fig.title.clone().unwrap_or_else(|| "Plot".into()),
            ("sans-serif", 24),
        )
        .x_label_area_size(30)
        .y_label_area_size(60)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;
    let mut mesh = chart.configure_mesh();
    if let Some(label) = fig.x.label.as_deref() {
        mesh.x_desc(label);
    }
    if let Some(label) = fig.y.label.as_deref() {
        mesh.y_desc(label);
    }
    mesh.draw()?;
    for series in &fig.series {
        match series {
            Series::Line(line) => {
                let (r, g, b) = line.style.color.rgb();
                chart.draw_series(LineSeries::new(
                    line.points.iter().map(|p| (p[0], p[1])),
                    RGBColor(r, g, b).stroke_width(line.style.width.round().max(1.0) as u32),
                ))?;
            }
            Series::Markers(markers) => {
                let (r, g, b) = markers.color.rgb();
                let style = RGBColor(r, g, b).filled();
                chart.draw_series(
                    markers
                        .points
                        .iter()
                        .map(|p| Circle::new((p[0], p[1]), markers.radius, style)),
                )?;
            }
        }
    }
    root.present()?;
    Ok(())
}
