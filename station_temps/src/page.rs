//! Page composition: uploaded files in, three station columns out.
//!
//! `render_dashboard` is a pure function of the uploaded files and the
//! configuration; front ends call it again on every change of the upload set.

use serde::Serialize;
use tracing::info;

use crate::chart::{build_station_chart, build_station_chart_isolated, ChartFigure, FileFailure};
use crate::classify::{classify_files, Station};
use crate::{DashboardConfig, FailurePolicy, TempError, UploadedFile};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StationPanel {
    pub station: Station,
    pub figure: Option<ChartFigure>,
}

impl StationPanel {
    /// DOM id of the chart container for this column.
    pub fn dom_id(&self) -> String {
        format!("chart_{}", self.station.slug())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Dashboard {
    pub uploaded: Vec<String>,
    pub panels: [StationPanel; 3],
    pub failures: Vec<FileFailure>,
}

impl Dashboard {
    fn empty() -> Self {
        Self {
            uploaded: Vec::new(),
            panels: Station::ALL.map(|station| StationPanel {
                station,
                figure: None,
            }),
            failures: Vec::new(),
        }
    }

    /// Message shown instead of charts when nothing has been uploaded.
    pub fn placeholder<'c>(&self, config: &'c DashboardConfig) -> Option<&'c str> {
        if self.uploaded.is_empty() {
            Some(config.placeholder.as_str())
        } else {
            None
        }
    }

    pub fn figures(&self) -> impl Iterator<Item = &ChartFigure> + '_ {
        self.panels.iter().filter_map(|panel| panel.figure.as_ref())
    }

    pub fn panel(&self, station: Station) -> &StationPanel {
        &self.panels[station.index()]
    }
}

pub fn render_dashboard(
    files: &[UploadedFile],
    config: &DashboardConfig,
) -> Result<Dashboard, TempError> {
    let mut dashboard = Dashboard::empty();
    if files.is_empty() {
        return Ok(dashboard);
    }
    dashboard.uploaded = files.iter().map(|f| f.name.clone()).collect();

    let buckets = classify_files(files);
    for (station, bucket) in buckets.iter() {
        if bucket.is_empty() {
            continue;
        }
        let figure = match config.failure_policy {
            FailurePolicy::Abort => Some(build_station_chart(station, bucket, config)?),
            FailurePolicy::SkipFile => {
                let (figure, failures) = build_station_chart_isolated(station, bucket, config);
                dashboard.failures.extend(failures);
                (!figure.traces.is_empty()).then_some(figure)
            }
        };
        dashboard.panels[station.index()].figure = figure;
    }

    info!(
        "dashboard: {} files, {} charts, {} failures",
        files.len(),
        dashboard.figures().count(),
        dashboard.failures.len()
    );
    Ok(dashboard)
}
