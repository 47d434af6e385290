use leptos::*;

use station_temps::{Dashboard, DashboardConfig, UploadedFile};

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
const APP_COMMIT: &str = env!("DASHBOARD_COMMIT");

#[cfg(feature = "chart_plotly")]
use serde::Serialize;

#[cfg(feature = "chart_plotly")]
use wasm_bindgen::{JsCast, JsValue};

#[cfg(feature = "chart_plotly")]
use wasm_bindgen_futures::JsFuture;

#[cfg(feature = "chart_plotly")]
use web_sys::{FileList, HtmlInputElement};

#[cfg(feature = "chart_plotly")]
use station_temps::{render_dashboard, ChartFigure};

fn failure_lines(dashboard: &Dashboard) -> Vec<String> {
    dashboard
        .failures
        .iter()
        .map(|f| format!("⚠️ {} ({}): {}", f.file, f.station, f.message))
        .collect()
}

/// The `accept` attribute is only a hint to the picker; drop anything else here.
fn keep_csv(mut uploads: Vec<UploadedFile>) -> Vec<UploadedFile> {
    uploads.retain(UploadedFile::has_csv_extension);
    uploads
}

fn upload_status(count: usize) -> String {
    match count {
        0 => "Ningún archivo seleccionado.".to_string(),
        1 => "1 archivo cargado.".to_string(),
        n => format!("{n} archivos cargados."),
    }
}

fn dashboard_view(dashboard: &Dashboard, config: &DashboardConfig) -> View {
    if let Some(message) = dashboard.placeholder(config) {
        return view! { <div class="info">{message.to_string()}</div> }.into_view();
    }

    let failures = failure_lines(dashboard);
    let notices = (!failures.is_empty()).then(|| {
        view! {
            <div class="failures">
                <ul>{failures.into_iter().map(|line| view! { <li>{line}</li> }).collect_view()}</ul>
            </div>
        }
    });
    let columns = dashboard
        .panels
        .iter()
        .map(|panel| {
            let plot = panel
                .figure
                .as_ref()
                .map(|_| view! { <div id={panel.dom_id()} class="plot"></div> });
            view! { <div class="station-column">{plot}</div> }
        })
        .collect_view();

    view! {
        {notices}
        <hr/>
        <section class="stations">{columns}</section>
    }
    .into_view()
}

#[cfg(feature = "chart_plotly")]
async fn read_file_list(list: &FileList) -> Vec<UploadedFile> {
    let mut out = Vec::new();
    for i in 0..list.length() {
        if let Some(file) = list.item(i) {
            let name = file.name();
            if let Ok(buf) = JsFuture::from(file.array_buffer()).await {
                let bytes = js_sys::Uint8Array::new(&buf).to_vec();
                out.push(UploadedFile::new(name, bytes));
            }
        }
    }
    out
}

#[cfg(feature = "chart_plotly")]
fn to_js(value: &serde_json::Value) -> JsValue {
    // Plain objects, not `Map`s: Plotly reads properties.
    let serializer = serde_wasm_bindgen::Serializer::json_compatible();
    value.serialize(&serializer).unwrap_or(JsValue::UNDEFINED)
}

#[cfg(feature = "chart_plotly")]
fn plot_figure(div_id: &str, figure: &ChartFigure) {
    let Some(document) = web_sys::window().and_then(|w| w.document()) else {
        return;
    };
    let Some(div) = document.get_element_by_id(div_id) else {
        return;
    };
    let plotly = js_sys::Reflect::get(&js_sys::global(), &JsValue::from_str("Plotly"))
        .unwrap_or(JsValue::UNDEFINED);
    if let Ok(func) = js_sys::Reflect::get(&plotly, &JsValue::from_str("react"))
        .or_else(|_| js_sys::Reflect::get(&plotly, &JsValue::from_str("newPlot")))
        .and_then(|v| v.dyn_into::<js_sys::Function>())
    {
        let args = js_sys::Array::of4(
            &JsValue::from(div),
            &to_js(&figure.plotly_traces()),
            &to_js(&figure.plotly_layout()),
            &to_js(&ChartFigure::plotly_config()),
        );
        let _ = func.apply(&JsValue::NULL, &args);
    }
}

#[cfg(feature = "chart_plotly")]
fn plot_dashboard(dashboard: &Dashboard) {
    for panel in &dashboard.panels {
        if let Some(figure) = panel.figure.as_ref() {
            plot_figure(&panel.dom_id(), figure);
        }
    }
}

#[cfg(feature = "chart_plotly")]
#[component]
pub fn App() -> impl IntoView {
    let config = store_value(DashboardConfig::default());
    let (files, set_files) = create_signal(Vec::<UploadedFile>::new());
    let (status, set_status) = create_signal(upload_status(0));

    // Whole page recomputed from the current upload set.
    let dashboard = create_memo(move |_| {
        config.with_value(|cfg| {
            files.with(|files| render_dashboard(files, cfg).map_err(|e| e.to_string()))
        })
    });

    // Containers are (re)created by the view; plot once the DOM has them.
    create_effect(move |_| {
        if let Ok(current) = dashboard.get() {
            request_animation_frame(move || plot_dashboard(&current));
        }
    });

    let load = move |list: FileList| {
        set_status.set("Leyendo archivos…".to_string());
        spawn_local(async move {
            let uploads = keep_csv(read_file_list(&list).await);
            set_status.set(upload_status(uploads.len()));
            set_files.set(uploads);
        });
    };

    let on_files = move |ev: leptos::ev::Event| {
        if let Some(target) = ev.target() {
            if let Ok(input) = target.dyn_into::<HtmlInputElement>() {
                if let Some(list) = input.files() {
                    load(list);
                }
            }
        }
    };

    let on_drop = move |ev: leptos::ev::DragEvent| {
        ev.prevent_default();
        if let Some(list) = ev.data_transfer().and_then(|dt| dt.files()) {
            load(list);
        }
    };

    let file_list_view = move || {
        files.with(|files| {
            files
                .iter()
                .map(|f| view! { <li>{f.name.clone()}</li> })
                .collect_view()
        })
    };

    let (heading, subtitle, upload_label) = config.with_value(|c| {
        (c.heading.clone(), c.subtitle.clone(), c.upload_label.clone())
    });

    view! {
        <main class="dashboard" on:dragover=move |e| { e.prevent_default(); } on:drop=on_drop>
            <header>
                <h1>{heading}</h1>
                <h3 class="subtitle">{subtitle}</h3>
                <p class="note">{"Versión web "}{APP_VERSION}{" ("}{APP_COMMIT}{")"}</p>
            </header>
            <details class="uploader">
                <summary>{upload_label}</summary>
                <label class="dropzone">
                    <span>"Selecciona uno o más archivos"</span>
                    <input id="file_input" type="file" accept=".csv" multiple on:change=on_files />
                </label>
                <ul>{file_list_view}</ul>
                <span class="note">{move || status.get()}</span>
            </details>
            {move || match dashboard.get() {
                Ok(current) => config.with_value(|cfg| dashboard_view(&current, cfg)),
                Err(message) => view! { <div class="error">{message}</div> }.into_view(),
            }}
            <p class="note">"Los archivos se procesan localmente en el navegador."</p>
        </main>
    }
}

#[cfg(all(target_arch = "wasm32", feature = "chart_plotly"))]
#[wasm_bindgen::prelude::wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    leptos::mount_to_body(|| view! { <App/> });
}

#[cfg(test)]
mod tests {
    use super::*;
    use station_temps::render_dashboard;

    #[test]
    fn status_text() {
        assert_eq!(upload_status(0), "Ningún archivo seleccionado.");
        assert_eq!(upload_status(1), "1 archivo cargado.");
        assert_eq!(upload_status(3), "3 archivos cargados.");
    }

    #[test]
    fn only_csv_uploads_are_kept() {
        let picked = vec![
            UploadedFile::new("E2_log.txt", "t;v\n2025-01-01 00:00:00;23,5\n"),
            UploadedFile::new("E5_log.CSV", "t;v\n"),
            UploadedFile::new("E6.csv.bak", "t;v\n"),
            UploadedFile::new("E6_norte.csv", "t;v\n"),
        ];
        let names: Vec<_> = keep_csv(picked).into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["E5_log.CSV", "E6_norte.csv"]);
    }

    #[test]
    fn failures_are_described_per_file() {
        let files = [
            UploadedFile::new("E2_ok.csv", "t;v\n2025-01-01 00:00:00;23,5\n"),
            UploadedFile::new("E5_bad.csv", "t;v\n2025-01-01 00:00:00;abc\n"),
        ];
        let dashboard = render_dashboard(&files, &DashboardConfig::default()).unwrap();
        assert_eq!(
            failure_lines(&dashboard),
            vec!["⚠️ E5_bad.csv (Estación 5): row 1: invalid temperature 'abc'".to_string()]
        );
    }
}
