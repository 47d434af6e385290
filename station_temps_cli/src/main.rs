use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueHint};
use rayon::prelude::*;
use station_temps::{
    has_csv_extension, read_temperature_csv, render_dashboard, summarize, write_dashboard_html,
    Dashboard, DashboardConfig, DateOrder, FailurePolicy, RecordSummary, Station, TempError,
    UploadedFile, THRESHOLDS,
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod plot;

use plot::{render_chart_guard, ChartKind};

#[derive(Parser, Debug)]
#[command(author, version, about = "Pumping-station temperature dashboard CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render the station dashboard (HTML, optional PNG/SVG) for CSV logs
    Render(RenderArgs),
    /// Summarize CSV logs: station, row counts, gaps and threshold excursions
    Inspect(InspectArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Semicolon-delimited CSV logs; station is taken from the file name (E2/E5/E6)
    #[arg(value_hint = ValueHint::FilePath)]
    inputs: Vec<PathBuf>,

    /// Output HTML path (`-` for stdout)
    #[arg(short, long, default_value = "dashboard.html", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Output PNG figure path (defaults next to the HTML)
    #[arg(long, value_hint = ValueHint::FilePath)]
    png: Option<PathBuf>,

    /// Output SVG figure path
    #[arg(long, value_hint = ValueHint::FilePath)]
    svg: Option<PathBuf>,

    /// Disable static chart generation
    #[arg(long, action = ArgAction::SetTrue)]
    no_plot: bool,

    /// Write the charted records as CSV (station,trace,timestamp,temperature)
    #[arg(long, value_hint = ValueHint::FilePath)]
    records_csv: Option<PathBuf>,

    /// Optional JSON configuration
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Fail the whole render on the first unreadable file
    #[arg(long, action = ArgAction::SetTrue)]
    strict: bool,

    /// Read ambiguous numeric dates as day/month
    #[arg(long, action = ArgAction::SetTrue)]
    day_first: bool,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,

    /// Profile major stages with timings
    #[arg(long, action = ArgAction::SetTrue)]
    profile: bool,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// CSV logs to inspect
    #[arg(required = true, value_hint = ValueHint::FilePath)]
    inputs: Vec<PathBuf>,

    /// Output report path (`-` for stdout)
    #[arg(short, long, default_value = "temperature_report.txt", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Optional JSON configuration
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Read ambiguous numeric dates as day/month
    #[arg(long, action = ArgAction::SetTrue)]
    day_first: bool,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = match &cli.command {
        Command::Render(args) => args.verbose,
        Command::Inspect(args) => args.verbose,
    };
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match cli.command {
        Command::Render(args) => handle_render(args),
        Command::Inspect(args) => handle_inspect(args),
    }
}

fn load_config(path: Option<&Path>, strict: bool, day_first: bool) -> Result<DashboardConfig> {
    let mut config = match path {
        Some(path) => DashboardConfig::from_json_path(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => DashboardConfig::default(),
    };
    if strict {
        config.failure_policy = FailurePolicy::Abort;
    }
    if day_first {
        config.date_order = DateOrder::DayFirst;
    }
    Ok(config)
}

fn handle_render(args: RenderArgs) -> Result<()> {
    let config = load_config(args.config.as_deref(), args.strict, args.day_first)?;

    let t_read = Instant::now();
    let files = read_uploads(&args.inputs)?;
    if args.profile || args.verbose {
        info!(
            "Read stage: {:.1} ms ({} files)",
            t_read.elapsed().as_secs_f64() * 1000.0,
            files.len()
        );
    }

    let t_render = Instant::now();
    let dashboard = render_dashboard(&files, &config).context("dashboard render failed")?;
    if args.profile || args.verbose {
        info!(
            "Render stage: {:.1} ms",
            t_render.elapsed().as_secs_f64() * 1000.0
        );
    }
    for failure in &dashboard.failures {
        warn!(
            "Skipped {} ({}): {}",
            failure.file, failure.station, failure.message
        );
    }

    if args.output.as_os_str() == "-" {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        write_dashboard_html(&mut handle, &dashboard, &config)?;
        handle.flush()?;
    } else {
        write_html(&dashboard, &config, &args.output)?;
        info!("Wrote dashboard: {}", args.output.display());
    }

    if let Some(path) = args.records_csv.as_ref() {
        write_records_csv(&dashboard, path)?;
        info!("Wrote records CSV: {}", path.display());
    }

    if args.no_plot || dashboard.figures().next().is_none() {
        return Ok(());
    }

    let mut targets: Vec<(PathBuf, ChartKind)> = Vec::new();
    if let Some(path) = args.png.as_ref() {
        targets.push((path.clone(), ChartKind::Png));
    } else if args.output.as_os_str() != "-" {
        targets.push((derive_image_path(&args.output, "png"), ChartKind::Png));
    }
    if let Some(path) = args.svg.as_ref() {
        targets.push((path.clone(), ChartKind::Svg));
    }

    for (path, kind) in targets {
        let t_plot = Instant::now();
        if let Err(err) = render_chart_guard(&dashboard, &path, kind, config.chart_height) {
            warn!("Skipping chart render ({}): {}", path.display(), err);
        } else {
            info!("Wrote charts: {}", path.display());
        }
        if args.profile || args.verbose {
            info!(
                "Plot stage: {:.1} ms",
                t_plot.elapsed().as_secs_f64() * 1000.0
            );
        }
    }

    Ok(())
}

fn handle_inspect(args: InspectArgs) -> Result<()> {
    let config = load_config(args.config.as_deref(), false, args.day_first)?;
    let options = config.reader_options();
    let files = read_uploads(&args.inputs)?;

    let mut report = String::new();
    for file in &files {
        let result = read_temperature_csv(file, &options).map(|records| summarize(&records));
        report.push_str(&format_file_report(file, &result));
        report.push('\n');
    }

    if args.output.as_os_str() == "-" {
        io::stdout().write_all(report.as_bytes())?;
    } else {
        fs::write(&args.output, report)
            .with_context(|| format!("failed to write {}", args.output.display()))?;
        info!("Inspection report written: {}", args.output.display());
    }
    Ok(())
}

/// Name an input the way a browser upload would: the bare file name.
fn upload_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Load the CSV inputs (in parallel), keeping the order they were given in.
fn read_uploads(paths: &[PathBuf]) -> Result<Vec<UploadedFile>> {
    let inputs: Vec<(usize, &PathBuf, String)> = paths
        .iter()
        .filter_map(|path| {
            let name = upload_name(path);
            if has_csv_extension(&name) {
                Some((path, name))
            } else {
                warn!("Ignoring {}: not a .csv file", path.display());
                None
            }
        })
        .enumerate()
        .map(|(idx, (path, name))| (idx, path, name))
        .collect();

    let mut files: Vec<(usize, UploadedFile)> = inputs
        .par_iter()
        .map(|(idx, path, name)| -> Result<(usize, UploadedFile)> {
            let bytes =
                fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
            debug!("loaded {} ({} bytes)", name, bytes.len());
            Ok((*idx, UploadedFile::new(name.clone(), bytes)))
        })
        .collect::<Result<Vec<_>>>()?;

    files.sort_by_key(|(idx, _)| *idx);
    Ok(files.into_iter().map(|(_, file)| file).collect())
}

fn write_html(dashboard: &Dashboard, config: &DashboardConfig, path: &Path) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    write_dashboard_html(&mut writer, dashboard, config)
        .with_context(|| format!("failed to write {}", path.display()))?;
    writer.flush()?;
    Ok(())
}

fn write_records_csv(dashboard: &Dashboard, path: &Path) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = csv::Writer::from_writer(file);
    write_record_rows(dashboard, &mut writer)
}

fn write_record_rows<W: Write>(dashboard: &Dashboard, writer: &mut csv::Writer<W>) -> Result<()> {
    writer.write_record(["station", "trace", "timestamp", "temperature"])?;
    for figure in dashboard.figures() {
        for trace in &figure.traces {
            for (ts, temp) in &trace.points {
                writer.write_record([
                    figure.station.label().to_string(),
                    trace.label.clone(),
                    ts.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                        .unwrap_or_default(),
                    if temp.is_nan() {
                        String::new()
                    } else {
                        format!("{:.3}", temp)
                    },
                ])?;
            }
        }
    }
    writer.flush()?;
    Ok(())
}

fn format_file_report(file: &UploadedFile, result: &Result<RecordSummary, TempError>) -> String {
    let mut out = format!("FILE: {}\n", file.name);
    let station = Station::for_file_name(&file.name)
        .map(|s| s.label())
        .unwrap_or("(no station marker)");
    out.push_str(&format!("  station: {}\n", station));

    let summary = match result {
        Ok(summary) => summary,
        Err(err) => {
            out.push_str(&format!("  error: {}\n", err));
            return out;
        }
    };

    out.push_str(&format!("  rows: {}\n", summary.rows));
    out.push_str(&format!(
        "  missing: timestamps={}, temperatures={}\n",
        summary.missing_timestamps, summary.missing_temperatures
    ));
    if let (Some(first), Some(last)) = (summary.first, summary.last) {
        let hours = (last - first).num_minutes() as f64 / 60.0;
        out.push_str(&format!(
            "  span: {} .. {} ({:.1} h)\n",
            first.format("%Y-%m-%d %H:%M:%S"),
            last.format("%Y-%m-%d %H:%M:%S"),
            hours
        ));
    }
    let fmt = |v: Option<f64>| v.map_or("n/a".to_string(), |v| format!("{:.2}", v));
    out.push_str(&format!(
        "  temperature_c: min={}, max={}, mean={}\n",
        fmt(summary.min),
        fmt(summary.max),
        fmt(summary.mean)
    ));
    for (line, count) in THRESHOLDS.iter().zip(summary.above_thresholds.iter()) {
        out.push_str(&format!("  above {}: {}\n", line.label, count));
    }
    out
}

fn derive_image_path(base: &Path, ext: &str) -> PathBuf {
    let mut path = base.to_path_buf();
    path.set_extension(ext);
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    const ROWS: &str = "DateTime;Temperatura\n2025-01-01 00:00:00;58,5\n2025-01-01 06:30:00;72\nx;65,0\n";

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn render_accepts_no_inputs() {
        let cli = Cli::try_parse_from(["station-temps", "render", "--strict"]).unwrap();
        match cli.command {
            Command::Render(args) => {
                assert!(args.inputs.is_empty());
                assert!(args.strict);
                assert_eq!(args.output, PathBuf::from("dashboard.html"));
            }
            _ => panic!("expected render"),
        }
    }

    #[test]
    fn flags_override_config() {
        let config = load_config(None, true, true).unwrap();
        assert_eq!(config.failure_policy, FailurePolicy::Abort);
        assert_eq!(config.date_order, DateOrder::DayFirst);
        let config = load_config(None, false, false).unwrap();
        assert_eq!(config.failure_policy, FailurePolicy::SkipFile);
    }

    #[test]
    fn upload_names_drop_the_directory() {
        assert_eq!(upload_name(Path::new("logs/E2_bomba.csv")), "E2_bomba.csv");
        assert_eq!(upload_name(Path::new("E5.CSV")), "E5.CSV");
    }

    #[test]
    fn non_csv_inputs_are_skipped_before_reading() {
        let dir = std::env::temp_dir().join(format!("station-temps-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let csv = dir.join("E2_ok.csv");
        fs::write(&csv, ROWS).unwrap();
        let paths = vec![dir.join("E5_missing.txt"), csv, dir.join("E6")];
        let files = read_uploads(&paths).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["E2_ok.csv"]);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn image_path_sits_next_to_html() {
        assert_eq!(
            derive_image_path(Path::new("out/dashboard.html"), "png"),
            PathBuf::from("out/dashboard.png")
        );
    }

    #[test]
    fn records_csv_lists_charted_points() {
        let files = [UploadedFile::new("E2_A.csv", ROWS)];
        let dashboard = render_dashboard(&files, &DashboardConfig::default()).unwrap();
        let mut writer = csv::Writer::from_writer(Vec::new());
        write_record_rows(&dashboard, &mut writer).unwrap();
        let bytes = writer.into_inner().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "station,trace,timestamp,temperature");
        assert_eq!(lines[1], "Estación 2,E2_A,2025-01-01 00:00:00,58.500");
        assert_eq!(lines[3], "Estación 2,E2_A,,65.000");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn report_for_readable_file() {
        let file = UploadedFile::new("E5_norte.csv", ROWS);
        let result = read_temperature_csv(&file, &Default::default()).map(|r| summarize(&r));
        let report = format_file_report(&file, &result);
        assert!(report.contains("station: Estación 5"));
        assert!(report.contains("rows: 3"));
        assert!(report.contains("missing: timestamps=1, temperatures=0"));
        assert!(report.contains("(6.5 h)"));
        assert!(report.contains("min=58.50, max=72.00, mean=65.17"));
        assert!(report.contains("above A1: 60 °C: 2"));
        assert!(report.contains("above A2: 70 °C: 1"));
    }

    #[test]
    fn report_for_unreadable_file() {
        let file = UploadedFile::new("bomba.csv", "t;v\n2025-01-01 00:00:00;abc\n");
        let result = read_temperature_csv(&file, &Default::default()).map(|r| summarize(&r));
        let report = format_file_report(&file, &result);
        assert!(report.contains("station: (no station marker)"));
        assert!(report.contains("error: row 1: invalid temperature 'abc'"));
    }
}
