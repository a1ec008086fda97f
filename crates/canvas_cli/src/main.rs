//! CLI smoke and inspection entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `canvas_core` linkage.
//! - Optionally load a document JSON file and print what the core derives
//!   from it: sections, widget counts, evaluated tables, chart projections.
//! - Keep output deterministic for quick local sanity checks.

use canvas_core::model::widget::WidgetPayload;
use canvas_core::{
    init_logging, tree, ChartProjection, Document, DocumentStore, LoggingConfig, StoreConfig,
};
use log::{error, info};
use std::process::ExitCode;

const LOG_LEVEL_ENV: &str = "CANVAS_LOG";

fn main() -> ExitCode {
    let logging = LoggingConfig {
        level: std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| "warn".to_string()),
        log_dir: None,
    };
    if let Err(err) = init_logging(&logging) {
        eprintln!("logging disabled: {err}");
    }

    println!("canvas_core ping={}", canvas_core::ping());
    println!("canvas_core version={}", canvas_core::core_version());

    let Some(path) = std::env::args().nth(1) else {
        return ExitCode::SUCCESS;
    };

    match inspect(&path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("event=cli_inspect module=cli status=error error={message}");
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn inspect(path: &str) -> Result<(), String> {
    let raw = std::fs::read_to_string(path).map_err(|err| format!("cannot read `{path}`: {err}"))?;
    let document: Document =
        serde_json::from_str(&raw).map_err(|err| format!("invalid document `{path}`: {err}"))?;
    let store = DocumentStore::from_document(document, StoreConfig::default());
    info!(
        "event=cli_inspect module=cli status=ok sections={} widgets={}",
        store.sections().len(),
        store.document().widget_count()
    );

    let project = &store.document().project;
    println!("project title={:?} author={:?}", project.title, project.student_name);

    for section in store.sections() {
        println!(
            "section id={} title={:?} completed={} widgets={}",
            section.id,
            section.title,
            section.is_completed,
            section.widget_count()
        );

        let mut widgets = Vec::new();
        tree::walk(&section.widgets, &mut |widget| widgets.push(widget));
        for widget in widgets {
            match &widget.payload {
                WidgetPayload::Table { .. } => print_table(&store, &widget.id),
                WidgetPayload::Chart { .. } => print_chart(&store, &widget.id),
                _ => {}
            }
        }
    }

    Ok(())
}

fn print_table(store: &DocumentStore, table_id: &str) {
    println!("  table id={table_id}");
    let Some(sheet) = store.sheets().sheet(table_id) else {
        return;
    };
    for row in 0..sheet.row_count() {
        let cells: Vec<String> = (0..sheet.col_count())
            .map(|col| store.computed_value(table_id, row, col))
            .collect();
        println!("    {}", cells.join(" | "));
    }
}

fn print_chart(store: &DocumentStore, chart_id: &str) {
    match store.chart_projection(chart_id) {
        Some(ChartProjection::Series(records)) => {
            println!("  chart id={chart_id} records={}", records.len());
            for record in records {
                let values: Vec<String> = record
                    .values
                    .iter()
                    .map(|value| format!("{}={}", value.key, value.value))
                    .collect();
                println!("    {}: {}", record.label, values.join(", "));
            }
        }
        Some(other) => println!("  chart id={chart_id} status={}", projection_status(&other)),
        None => {}
    }
}

fn projection_status(projection: &ChartProjection) -> &'static str {
    match projection {
        ChartProjection::NoDataSource => "no_data_source",
        ChartProjection::Unconfigured => "unconfigured",
        ChartProjection::TableNotFound(_) => "table_not_found",
        ChartProjection::Series(_) => "series",
    }
}
