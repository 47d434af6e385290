//! Static three-column chart rendering with plotters.

use std::panic;
use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, NaiveDateTime};
use plotters::prelude::*;
use plotters::style::{FontDesc, FontFamily, FontStyle};
use station_temps::{ChartFigure, Dashboard, ThresholdLine};

const PANEL_WIDTH: u32 = 640;
const DASH_SIZE: u32 = 12;
const DASH_GAP: u32 = 8;
const LEGEND_STRIP: i32 = 40;
const LEGEND_SWATCH: i32 = 20;
const LEGEND_ENTRY_GAP: i32 = 16;
// Rough advance of the 13px legend font.
const LEGEND_CHAR_PX: i32 = 7;

pub enum ChartKind {
    Png,
    Svg,
}

pub fn render_chart_guard(
    dashboard: &Dashboard,
    path: &Path,
    kind: ChartKind,
    height: u32,
) -> Result<(), String> {
    let render = || -> Result<(), String> {
        render_dashboard_chart(dashboard, path, kind, height)
            .map_err(|e| format!("plotting error: {}", e))
    };

    panic::catch_unwind(panic::AssertUnwindSafe(render))
        .map_err(|_| "plotting backend panicked".to_string())?
}

fn render_dashboard_chart(
    dashboard: &Dashboard,
    path: &Path,
    kind: ChartKind,
    height: u32,
) -> Result<()> {
    let size = (PANEL_WIDTH * 3, height);
    match kind {
        ChartKind::Png => {
            let root = BitMapBackend::new(path, size).into_drawing_area();
            draw_columns(root, dashboard)?;
        }
        ChartKind::Svg => {
            let root = SVGBackend::new(path, size).into_drawing_area();
            draw_columns(root, dashboard)?;
        }
    }
    Ok(())
}

fn draw_columns<DB>(root: DrawingArea<DB, plotters::coord::Shift>, dashboard: &Dashboard) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;
    let columns = root.split_evenly((1, 3));
    for (area, panel) in columns.iter().zip(dashboard.panels.iter()) {
        if let Some(figure) = panel.figure.as_ref() {
            draw_station_chart(area, figure)?;
        }
    }
    root.present()?;
    Ok(())
}

fn to_seconds(ts: NaiveDateTime) -> f64 {
    ts.and_utc().timestamp_millis() as f64 / 1000.0
}

fn format_axis_time(seconds: f64) -> String {
    DateTime::from_timestamp(seconds.floor() as i64, 0)
        .map(|dt| dt.format("%d/%m %H:%M").to_string())
        .unwrap_or_default()
}

/// X extent over all drawable points, widened when degenerate.
fn time_bounds(segments: &[Vec<Vec<(f64, f64)>>]) -> (f64, f64) {
    let (min, max) = segments
        .iter()
        .flatten()
        .flatten()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(x, _)| {
            (lo.min(x), hi.max(x))
        });
    if !min.is_finite() {
        return (0.0, 3600.0);
    }
    if max - min < 1.0 {
        return (min - 1800.0, max + 1800.0);
    }
    (min, max)
}

fn threshold_color(line: &ThresholdLine) -> RGBColor {
    match line.color {
        "yellow" => RGBColor(230, 200, 0),
        "red" => RED,
        _ => BLACK,
    }
}

fn draw_station_chart<DB>(
    area: &DrawingArea<DB, plotters::coord::Shift>,
    figure: &ChartFigure,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let segments: Vec<Vec<Vec<(f64, f64)>>> = figure
        .traces
        .iter()
        .map(|trace| {
            trace
                .segments()
                .into_iter()
                .map(|seg| seg.into_iter().map(|(ts, t)| (to_seconds(ts), t)).collect())
                .collect()
        })
        .collect();
    let (x_min, x_max) = time_bounds(&segments);
    let (y_min, y_max) = figure.layout.y_range;

    let title_font = FontDesc::new(FontFamily::SansSerif, 20.0, FontStyle::Normal);
    let axis_font = FontDesc::new(FontFamily::SansSerif, 13.0, FontStyle::Normal);

    // Legend hangs below the plot, as in the interactive chart.
    let plot_height = area.dim_in_pixel().1 as i32 - LEGEND_STRIP;
    let (plot_area, legend_area) = area.split_vertically(plot_height.max(1));

    let mut chart = ChartBuilder::on(&plot_area)
        .caption(&figure.layout.title, title_font)
        .margin(12)
        .set_label_area_size(LabelAreaPosition::Left, 50)
        .set_label_area_size(LabelAreaPosition::Bottom, 45)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;

    chart
        .configure_mesh()
        .light_line_style(&TRANSPARENT)
        .x_labels(4)
        .x_desc(figure.layout.x_title.as_str())
        .y_desc(figure.layout.y_title.as_str())
        .x_label_formatter(&|v| format_axis_time(*v))
        .y_label_formatter(&|v| format!("{:.0}", v))
        .label_style(axis_font.clone().color(&BLACK.mix(0.85)))
        .draw()?;

    let mut legend = Vec::with_capacity(figure.traces.len());
    for (idx, (trace, trace_segments)) in figure.traces.iter().zip(segments).enumerate() {
        let color = Palette99::pick(idx).to_rgba();
        for segment in trace_segments {
            chart.draw_series(LineSeries::new(segment, color.stroke_width(2)))?;
        }
        legend.push((trace.label.as_str(), color));
    }

    let label_width = (x_max - x_min) * 0.16;
    for line in &figure.thresholds {
        let color = threshold_color(line);
        chart.draw_series(DashedLineSeries::new(
            vec![(x_min, line.value), (x_max, line.value)],
            DASH_SIZE,
            DASH_GAP,
            color.stroke_width(line.width),
        ))?;
        chart.draw_series(std::iter::once(Rectangle::new(
            [(x_min, line.value + 0.5), (x_min + label_width, line.value + 5.0)],
            BLACK.filled(),
        )))?;
        chart.draw_series(std::iter::once(Text::new(
            line.label.to_string(),
            (x_min + label_width * 0.05, line.value + 4.5),
            axis_font.clone().color(&color),
        )))?;
    }

    draw_legend(&legend_area, &legend, &axis_font)?;
    Ok(())
}

/// Left edge of each legend entry in a single centered row.
fn legend_offsets(labels: &[&str], width: i32) -> Vec<i32> {
    let widths: Vec<i32> = labels
        .iter()
        .map(|label| LEGEND_SWATCH + 6 + label.chars().count() as i32 * LEGEND_CHAR_PX)
        .collect();
    let total: i32 = widths.iter().sum::<i32>()
        + LEGEND_ENTRY_GAP * (widths.len().saturating_sub(1)) as i32;
    let mut x = ((width - total) / 2).max(0);
    widths
        .iter()
        .map(|w| {
            let left = x;
            x += w + LEGEND_ENTRY_GAP;
            left
        })
        .collect()
}

fn draw_legend<DB>(
    area: &DrawingArea<DB, plotters::coord::Shift>,
    entries: &[(&str, RGBAColor)],
    font: &FontDesc,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let (width, height) = area.dim_in_pixel();
    let y = height as i32 / 2;
    let labels: Vec<&str> = entries.iter().map(|(label, _)| *label).collect();
    for ((label, color), x) in entries.iter().zip(legend_offsets(&labels, width as i32)) {
        area.draw(&PathElement::new(
            vec![(x, y), (x + LEGEND_SWATCH, y)],
            color.stroke_width(2),
        ))?;
        area.draw(&Text::new(
            label.to_string(),
            (x + LEGEND_SWATCH + 6, y - 7),
            font.clone().color(&BLACK),
        ))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn axis_labels_use_day_month() {
        let ts = NaiveDate::from_ymd_opt(2025, 1, 6)
            .and_then(|d| d.and_hms_opt(14, 5, 0))
            .unwrap();
        assert_eq!(format_axis_time(to_seconds(ts)), "06/01 14:05");
    }

    #[test]
    fn bounds_cover_all_segments() {
        let segments = vec![
            vec![vec![(100.0, 1.0), (200.0, 2.0)]],
            vec![vec![(50.0, 1.0)], vec![(400.0, 3.0)]],
        ];
        assert_eq!(time_bounds(&segments), (50.0, 400.0));
    }

    #[test]
    fn legend_row_is_centered_below_the_plot() {
        // Entry widths: 20 + 6 + 2 * 7 = 40 and 20 + 6 + 4 * 7 = 54, gap 16.
        assert_eq!(legend_offsets(&["ab", "abcd"], 210), vec![50, 106]);
        assert_eq!(legend_offsets(&[], 640), Vec::<i32>::new());
    }

    #[test]
    fn wide_legend_starts_at_the_left_edge() {
        let long = "x".repeat(200);
        assert_eq!(legend_offsets(&[long.as_str()], 640), vec![0]);
    }

    #[test]
    fn degenerate_bounds_are_widened() {
        assert_eq!(time_bounds(&[]), (0.0, 3600.0));
        let single = vec![vec![vec![(7200.0, 60.0)]]];
        assert_eq!(time_bounds(&single), (5400.0, 9000.0));
    }
}
