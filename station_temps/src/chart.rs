//! Per-station chart model and its Plotly JSON form.

use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::classify::Station;
use crate::reader::{read_temperature_csv, TemperatureRecord};
use crate::{DashboardConfig, TempError, UploadedFile};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ThresholdLine {
    pub value: f64,
    pub label: &'static str,
    pub color: &'static str,
    pub dash: &'static str,
    pub width: u32,
}

/// Alarm levels drawn on every chart regardless of data.
pub const THRESHOLDS: [ThresholdLine; 2] = [
    ThresholdLine {
        value: 60.0,
        label: "A1: 60 °C",
        color: "yellow",
        dash: "dash",
        width: 3,
    },
    ThresholdLine {
        value: 70.0,
        label: "A2: 70 °C",
        color: "red",
        dash: "dash",
        width: 3,
    },
];

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Margin {
    pub l: u32,
    pub r: u32,
    pub t: u32,
    pub b: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LegendSpec {
    pub orientation: &'static str,
    pub xanchor: &'static str,
    pub x: f64,
    pub yanchor: &'static str,
    pub y: f64,
    pub bgcolor: &'static str,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChartLayout {
    pub title: String,
    pub x_title: String,
    pub y_title: String,
    pub y_range: (f64, f64),
    pub height: u32,
    pub margin: Margin,
    pub legend: LegendSpec,
}

impl ChartLayout {
    pub fn for_station(station: Station, height: u32) -> Self {
        Self {
            title: format!("{} - Temperaturas", station.label()),
            x_title: "Fecha".to_string(),
            y_title: "Temperatura (°C)".to_string(),
            y_range: (0.0, 90.0),
            height,
            margin: Margin {
                l: 20,
                r: 20,
                t: 50,
                b: 60,
            },
            // Horizontal, centered, hanging below the x axis.
            legend: LegendSpec {
                orientation: "h",
                xanchor: "center",
                x: 0.5,
                yanchor: "top",
                y: -0.35,
                bgcolor: "rgba(0,0,0,0)",
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LineTrace {
    pub label: String,
    pub points: Vec<(Option<NaiveDateTime>, f64)>,
}

impl LineTrace {
    pub fn from_records(label: impl Into<String>, records: &[TemperatureRecord]) -> Self {
        Self {
            label: label.into(),
            points: records
                .iter()
                .map(|r| (r.timestamp, r.temperature))
                .collect(),
        }
    }

    /// Runs of consecutive points that have both a timestamp and a finite
    /// temperature; anything else breaks the line.
    pub fn segments(&self) -> Vec<Vec<(NaiveDateTime, f64)>> {
        let mut out = Vec::new();
        let mut current = Vec::new();
        for &(ts, temp) in &self.points {
            match ts {
                Some(ts) if temp.is_finite() => current.push((ts, temp)),
                _ => {
                    if !current.is_empty() {
                        out.push(std::mem::take(&mut current));
                    }
                }
            }
        }
        if !current.is_empty() {
            out.push(current);
        }
        out
    }

    fn plotly_value(&self) -> Value {
        let x: Vec<Option<String>> = self
            .points
            .iter()
            .map(|(ts, _)| ts.map(|t| t.format(TIMESTAMP_FORMAT).to_string()))
            .collect();
        // Non-finite numbers serialize as null.
        let y: Vec<f64> = self.points.iter().map(|(_, temp)| *temp).collect();
        json!({
            "type": "scatter",
            "mode": "lines",
            "name": self.label,
            "x": x,
            "y": y,
        })
    }
}

/// Legend label for a file: the name minus one literal trailing `.csv`.
pub fn trace_label(file_name: &str) -> &str {
    file_name.strip_suffix(".csv").unwrap_or(file_name)
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChartFigure {
    pub station: Station,
    pub traces: Vec<LineTrace>,
    pub thresholds: Vec<ThresholdLine>,
    pub layout: ChartLayout,
}

impl ChartFigure {
    pub fn new(station: Station, height: u32) -> Self {
        Self {
            station,
            traces: Vec::new(),
            thresholds: THRESHOLDS.to_vec(),
            layout: ChartLayout::for_station(station, height),
        }
    }

    pub fn push_file(&mut self, file: &UploadedFile, records: &[TemperatureRecord]) {
        self.traces
            .push(LineTrace::from_records(trace_label(&file.name), records));
    }

    pub fn plotly_traces(&self) -> Value {
        Value::Array(self.traces.iter().map(LineTrace::plotly_value).collect())
    }

    pub fn plotly_layout(&self) -> Value {
        let layout = &self.layout;
        let shapes: Vec<Value> = self
            .thresholds
            .iter()
            .map(|line| {
                json!({
                    "type": "line",
                    "xref": "x domain",
                    "x0": 0,
                    "x1": 1,
                    "yref": "y",
                    "y0": line.value,
                    "y1": line.value,
                    "line": { "color": line.color, "dash": line.dash, "width": line.width },
                })
            })
            .collect();
        let annotations: Vec<Value> = self
            .thresholds
            .iter()
            .map(|line| {
                json!({
                    "xref": "x domain",
                    "x": 0,
                    "xanchor": "left",
                    "yref": "y",
                    "y": line.value,
                    "yanchor": "bottom",
                    "text": line.label,
                    "showarrow": false,
                    "font": { "color": line.color },
                    "bgcolor": "black",
                })
            })
            .collect();

        json!({
            "title": { "text": layout.title },
            "xaxis": { "title": { "text": layout.x_title } },
            "yaxis": {
                "title": { "text": layout.y_title },
                "range": [layout.y_range.0, layout.y_range.1],
            },
            "height": layout.height,
            "margin": layout.margin,
            "legend": layout.legend,
            "shapes": shapes,
            "annotations": annotations,
        })
    }

    pub fn plotly_config() -> Value {
        json!({ "responsive": true, "displaylogo": false })
    }
}

/// A file that could not be charted.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FileFailure {
    pub file: String,
    pub station: Station,
    pub message: String,
}

/// Build a station chart, one trace per file in order. The first unreadable
/// file aborts the chart; the error carries the file name.
pub fn build_station_chart(
    station: Station,
    files: &[&UploadedFile],
    config: &DashboardConfig,
) -> Result<ChartFigure, TempError> {
    let options = config.reader_options();
    let mut figure = ChartFigure::new(station, config.chart_height);
    for file in files {
        let records = read_temperature_csv(file, &options).map_err(|e| e.in_file(&file.name))?;
        figure.push_file(file, &records);
    }
    debug!("{}: {} traces", station, figure.traces.len());
    Ok(figure)
}

/// Like [`build_station_chart`], but unreadable files are left out of the
/// chart and returned as failures.
pub fn build_station_chart_isolated(
    station: Station,
    files: &[&UploadedFile],
    config: &DashboardConfig,
) -> (ChartFigure, Vec<FileFailure>) {
    let options = config.reader_options();
    let mut figure = ChartFigure::new(station, config.chart_height);
    let mut failures = Vec::new();
    for file in files {
        match read_temperature_csv(file, &options) {
            Ok(records) => figure.push_file(file, &records),
            Err(err) => {
                warn!("skipping '{}' ({}): {}", file.name, station, err);
                failures.push(FileFailure {
                    file: file.name.clone(),
                    station,
                    message: err.to_string(),
                });
            }
        }
    }
    debug!(
        "{}: {} traces, {} skipped",
        station,
        figure.traces.len(),
        failures.len()
    );
    (figure, failures)
}
