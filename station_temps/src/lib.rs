//! Temperature logs from pumping stations: CSV ingestion, grouping by station
//! and chart construction for the dashboard front ends.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod chart;
pub mod classify;
pub mod html;
pub mod page;
pub mod reader;
pub mod summary;

pub use chart::{
    build_station_chart, build_station_chart_isolated, trace_label, ChartFigure, ChartLayout,
    FileFailure, LineTrace, ThresholdLine, THRESHOLDS,
};
pub use classify::{classify_files, Station, StationBuckets};
pub use html::write_dashboard_html;
pub use page::{render_dashboard, Dashboard, StationPanel};
pub use reader::{read_temperature_csv, DateOrder, ReaderOptions, TemperatureRecord};
pub use summary::{summarize, RecordSummary};

#[derive(Error, Debug)]
pub enum TempError {
    #[error("malformed input: {0}")]
    MalformedInput(String),
    #[error("row {row}: invalid temperature '{value}'")]
    InvalidTemperature { row: usize, value: String },
    #[error("failed to read CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("{name}: {source}")]
    File {
        name: String,
        #[source]
        source: Box<TempError>,
    },
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl TempError {
    /// Attach the originating file name to a reader error.
    pub fn in_file(self, name: &str) -> Self {
        match self {
            TempError::File { .. } => self,
            other => TempError::File {
                name: name.to_string(),
                source: Box::new(other),
            },
        }
    }
}

/// An uploaded CSV log held in memory for a single render.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn has_csv_extension(&self) -> bool {
        has_csv_extension(&self.name)
    }
}

/// Upload filter shared by every front end: a `.csv` extension, any case.
pub fn has_csv_extension(name: &str) -> bool {
    name.rsplit_once('.')
        .map(|(_, ext)| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

/// What happens to a station chart when one of its files cannot be read.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// The first failing file aborts the whole render.
    Abort,
    /// Failing files are skipped and reported; everything else still renders.
    #[default]
    SkipFile,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DashboardConfig {
    pub page_title: String,
    pub heading: String,
    pub subtitle: String,
    pub upload_label: String,
    pub placeholder: String,
    pub chart_height: u32,
    pub date_order: DateOrder,
    pub failure_policy: FailurePolicy,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            page_title: "Dashboard de Temperaturas".to_string(),
            heading: "📊 Dashboard Interactivo de Temperaturas por Estación de Bombeo del 01-01-25 al 06-01-25"
                .to_string(),
            subtitle: "Elaborado por Departamento de Confiabilidad de Cecuamaq, C.A.".to_string(),
            upload_label: "📂 Cargar archivos CSV".to_string(),
            placeholder: "Carga archivos CSV para visualizar los gráficos.".to_string(),
            chart_height: 420,
            date_order: DateOrder::MonthFirst,
            failure_policy: FailurePolicy::SkipFile,
        }
    }
}

impl DashboardConfig {
    pub fn reader_options(&self) -> ReaderOptions {
        ReaderOptions {
            date_order: self.date_order,
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self, TempError> {
        let config: DashboardConfig =
            serde_json::from_str(text).map_err(|e| TempError::Config(e.to_string()))?;
        if config.chart_height == 0 {
            return Err(TempError::Config("chart_height must be > 0".into()));
        }
        Ok(config)
    }

    #[cfg(not(feature = "wasm"))]
    pub fn from_json_path(path: &std::path::Path) -> Result<Self, TempError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| TempError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config =
            DashboardConfig::from_json_str(r#"{"page_title": "Planta", "failure_policy": "abort"}"#)
                .unwrap();
        assert_eq!(config.page_title, "Planta");
        assert_eq!(config.failure_policy, FailurePolicy::Abort);
        assert_eq!(config.chart_height, 420);
        assert_eq!(config.date_order, DateOrder::MonthFirst);
    }

    #[test]
    fn default_texts() {
        let config = DashboardConfig::default();
        assert!(config.heading.ends_with("del 01-01-25 al 06-01-25"));
        assert!(config.subtitle.ends_with("de Cecuamaq, C.A."));
    }

    #[test]
    fn zero_height_is_rejected() {
        let err = DashboardConfig::from_json_str(r#"{"chart_height": 0}"#).unwrap_err();
        assert!(matches!(err, TempError::Config(_)));
    }

    #[test]
    fn file_context_is_not_nested_twice() {
        let err = TempError::MalformedInput("x".into())
            .in_file("a.csv")
            .in_file("b.csv");
        assert_eq!(err.to_string(), "a.csv: malformed input: x");
    }

    #[test]
    fn csv_extension_check_ignores_case() {
        assert!(UploadedFile::new("E2.CSV", Vec::new()).has_csv_extension());
        assert!(UploadedFile::new("e5_log.csv", Vec::new()).has_csv_extension());
        assert!(!UploadedFile::new("E6.txt", Vec::new()).has_csv_extension());
        assert!(!UploadedFile::new("csv", Vec::new()).has_csv_extension());
        assert!(!has_csv_extension("E2_log.txt"));
        assert!(!has_csv_extension("E2_log.csv.txt"));
    }
}
