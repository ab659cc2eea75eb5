use crate::signal::{PeakRecord, SampleRecord};
use serde::{Deserialize, Serialize};

pub const RAW_COLOR: u32 = 0x9E9E9E;
pub const SMOOTHED_COLOR: u32 = 0xFF0077;
pub const PEAK_COLOR: u32 = 0x0055FF;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Axis {
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Style {
    pub width: f32,
    pub dash: Option<[f32; 2]>,
    pub color: Color,
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
pub struct Color(pub u32);

impl Color {
    pub fn rgb(self) -> (u8, u8, u8) {
        (
            ((self.0 >> 16) & 0xFF) as u8,
            ((self.0 >> 8) & 0xFF) as u8,
            (self.0 & 0xFF) as u8,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub style: Style,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub radius: u32,
    pub color: Color,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Series {
    Line(LineSeries),
    Markers(MarkerSeries),
}

impl Series {
    pub fn points(&self) -> &[[f64; 2]] {
        match self {
            Series::Line(line) => &line.points,
            Series::Markers(markers) => &markers.points,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Figure {
    pub title: Option<String>,
    pub x: Axis,
    pub y: Axis,
    pub series: Vec<Series>,
}

impl Figure {
    pub fn new(title: impl Into<Option<String>>) -> Self {
        Self {
            title: title.into(),
            x: Axis { label: None },
            y: Axis { label: None },
            series: Vec::new(),
        }
    }

    pub fn add_series(&mut self, series: Series) {
        self.series.push(series);
    }

    /// `(x_min, x_max, y_min, y_max)` over every series, if any point exists.
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let mut points = self.series.iter().flat_map(|s| s.points().iter());
        let first = points.next()?;
        let init = (first[0], first[0], first[1], first[1]);
        Some(points.fold(init, |(x0, x1, y0, y1), p| {
            (x0.min(p[0]), x1.max(p[0]), y0.min(p[1]), y1.max(p[1]))
        }))
    }
}

pub fn decimate_points(points: &[[f64; 2]], max_points: usize) -> Vec<[f64; 2]> {
    if points.len() <= max_points {
        return points.to_vec();
    }
    let bucket_size = points.len() as f64 / max_points as f64;
    let mut result = Vec::with_capacity(max_points);
    for i in 0..max_points {
        let start = (i as f64 * bucket_size).floor() as usize;
        if start >= points.len() {
            break;
        }
        result.push(points[start]);
    }
    result
}

/// Raw and smoothed traces of a window with its detected peaks marked.
///
/// The x axis is seconds since the oldest record in the window.
pub fn figure_from_window(
    records: &[SampleRecord],
    peaks: &[PeakRecord],
    max_points: usize,
) -> Figure {
    let origin = records.first().map(|r| r.timestamp_ms).unwrap_or(0);
    let secs = |t: u64| t.saturating_sub(origin) as f64 / 1000.0;

    let raw: Vec<[f64; 2]> = records
        .iter()
        .map(|r| [secs(r.timestamp_ms), r.raw])
        .collect();
    let smoothed: Vec<[f64; 2]> = records
        .iter()
        .map(|r| [secs(r.timestamp_ms), r.smoothed])
        .collect();

    let mut fig = Figure::new(Some("PPG window".into()));
    fig.x.label = Some("time (s)".into());
    fig.y.label = Some("IR intensity".into());
    fig.add_series(Series::Line(LineSeries {
        name: "raw".into(),
        points: decimate_points(&raw, max_points),
        style: Style {
            width: 1.0,
            dash: None,
            color: Color(RAW_COLOR),
        },
    }));
    fig.add_series(Series::Line(LineSeries {
        name: "smoothed".into(),
        points: decimate_points(&smoothed, max_points),
        style: Style {
            width: 2.0,
            dash: None,
            color: Color(SMOOTHED_COLOR),
        },
    }));
    fig.add_series(Series::Markers(MarkerSeries {
        name: "peaks".into(),
        points: peaks
            .iter()
            .map(|p| [secs(p.timestamp_ms), p.value])
            .collect(),
        radius: 4,
        color: Color(PEAK_COLOR),
    }));
    fig
}
