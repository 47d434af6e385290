//! Self-contained HTML rendering of a [`Dashboard`] with Plotly charts.

use std::io::{self, Write};

use serde_json::Value;

use crate::chart::ChartFigure;
use crate::page::Dashboard;
use crate::DashboardConfig;

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

const STYLE: &str = r#"
    body { font-family: "Source Sans Pro", Helvetica, Arial, sans-serif; margin: 0; color: #262730; background: #fff; }
    main { padding: 1.5rem 2.5rem; }
    h1 { font-size: 2rem; margin: 0 0 .5rem; }
    h3.subtitle { text-align: center; font-weight: 600; margin: .25rem 0 1rem; }
    details.uploader { border: 1px solid #d6d6d9; border-radius: .5rem; padding: .5rem 1rem; }
    details.uploader summary { cursor: pointer; font-weight: 600; }
    .info { background: #e8f0fe; color: #0b3d91; border-radius: .5rem; padding: 1rem; margin-top: 1rem; }
    .failures { background: #fff4e5; color: #7a4100; border-radius: .5rem; padding: .5rem 1rem; margin-top: 1rem; }
    .stations { display: grid; grid-template-columns: repeat(3, minmax(0, 1fr)); gap: 1rem; }
    .plot { width: 100%; }
"#;

pub fn write_dashboard_html<W: Write>(
    writer: &mut W,
    dashboard: &Dashboard,
    config: &DashboardConfig,
) -> io::Result<()> {
    writeln!(writer, "<!DOCTYPE html>")?;
    writeln!(writer, r#"<html lang="es">"#)?;
    writeln!(writer, "<head>")?;
    writeln!(writer, r#"<meta charset="UTF-8">"#)?;
    writeln!(
        writer,
        r#"<meta name="viewport" content="width=device-width, initial-scale=1.0">"#
    )?;
    writeln!(writer, "<title>{}</title>", escape_html(&config.page_title))?;
    writeln!(writer, r#"<script src="{PLOTLY_CDN}"></script>"#)?;
    writeln!(writer, "<style>{STYLE}</style>")?;
    writeln!(writer, "</head>")?;
    writeln!(writer, "<body>\n<main>")?;
    writeln!(writer, "<h1>{}</h1>", escape_html(&config.heading))?;
    writeln!(
        writer,
        r#"<h3 class="subtitle">{}</h3>"#,
        escape_html(&config.subtitle)
    )?;

    writeln!(writer, r#"<details class="uploader">"#)?;
    writeln!(
        writer,
        "<summary>{}</summary>",
        escape_html(&config.upload_label)
    )?;
    writeln!(writer, "<ul>")?;
    for name in &dashboard.uploaded {
        writeln!(writer, "<li>{}</li>", escape_html(name))?;
    }
    writeln!(writer, "</ul>\n</details>")?;

    if !dashboard.failures.is_empty() {
        writeln!(writer, r#"<div class="failures"><ul>"#)?;
        for failure in &dashboard.failures {
            writeln!(
                writer,
                "<li>⚠️ {} ({}): {}</li>",
                escape_html(&failure.file),
                escape_html(failure.station.label()),
                escape_html(&failure.message)
            )?;
        }
        writeln!(writer, "</ul></div>")?;
    }

    if let Some(message) = dashboard.placeholder(config) {
        writeln!(writer, r#"<div class="info">{}</div>"#, escape_html(message))?;
    } else {
        writeln!(writer, "<hr>")?;
        writeln!(writer, r#"<section class="stations">"#)?;
        for panel in &dashboard.panels {
            writeln!(writer, r#"<div class="station-column">"#)?;
            if panel.figure.is_some() {
                writeln!(writer, r#"<div id="{}" class="plot"></div>"#, panel.dom_id())?;
            }
            writeln!(writer, "</div>")?;
        }
        writeln!(writer, "</section>")?;
    }

    writeln!(writer, "</main>")?;
    writeln!(writer, "<script>")?;
    for panel in &dashboard.panels {
        if let Some(figure) = panel.figure.as_ref() {
            write_plot_call(writer, &panel.dom_id(), figure)?;
        }
    }
    writeln!(writer, "</script>")?;
    writeln!(writer, "</body>\n</html>")?;
    Ok(())
}

fn write_plot_call<W: Write>(writer: &mut W, dom_id: &str, figure: &ChartFigure) -> io::Result<()> {
    writeln!(
        writer,
        "Plotly.newPlot({}, {}, {}, {});",
        script_json(&Value::from(dom_id))?,
        script_json(&figure.plotly_traces())?,
        script_json(&figure.plotly_layout())?,
        script_json(&ChartFigure::plotly_config())?
    )
}

/// JSON that can sit inside a `<script>` element.
fn script_json(value: &Value) -> io::Result<String> {
    Ok(serde_json::to_string(value)?.replace("</", "<\\/"))
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::render_dashboard;
    use crate::UploadedFile;

    const ROWS: &str = "DateTime;Temperatura\n2025-01-01 00:00:00;23,5\n";

    fn render(files: &[UploadedFile]) -> String {
        let config = DashboardConfig::default();
        let dashboard = render_dashboard(files, &config).unwrap();
        let mut out = Vec::new();
        write_dashboard_html(&mut out, &dashboard, &config).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn empty_page_shows_placeholder() {
        let html = render(&[]);
        assert!(html.contains("Carga archivos CSV para visualizar los gráficos."));
        assert!(!html.contains("Plotly.newPlot"));
        assert!(!html.contains(r#"class="stations""#));
    }

    #[test]
    fn one_plot_per_present_station() {
        let html = render(&[
            UploadedFile::new("E2_SensorA.csv", ROWS),
            UploadedFile::new("E5_SensorB.csv", ROWS),
        ]);
        assert_eq!(html.matches("Plotly.newPlot").count(), 2);
        assert!(html.contains(r#"id="chart_e2""#));
        assert!(html.contains(r#"id="chart_e5""#));
        assert!(!html.contains(r#"id="chart_e6""#));
        assert_eq!(html.matches(r#"class="station-column""#).count(), 3);
        assert!(html.find("chart_e2").unwrap() < html.find("chart_e5").unwrap());
    }

    #[test]
    fn names_are_escaped() {
        let html = render(&[UploadedFile::new("E2_<b>&</script>.csv", ROWS)]);
        assert!(html.contains("<li>E2_&lt;b&gt;&amp;&lt;/script&gt;.csv</li>"));
        assert_eq!(html.matches("</script>").count(), 2);
    }

    #[test]
    fn failures_are_listed() {
        let html = render(&[UploadedFile::new("E6_bad.csv", "t;v\nx;abc\n")]);
        assert!(html.contains("E6_bad.csv (Estación 6): row 1: invalid temperature"));
    }
}
