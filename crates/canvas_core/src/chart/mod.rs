//! Chart data projection.
//!
//! # Responsibility
//! - Reshape a table's evaluated cells into chart records for a chart widget.
//! - Distinguish "no table anywhere" from "table with no data rows".
//!
//! # Invariants
//! - Values are read through `SheetEngine`, never from raw grid text.
//! - Projection is a pure function of document tables, engine state and
//!   chart configuration.

use crate::model::document::Document;
use crate::model::widget::{ChartConfig, WidgetId};
use crate::sheet::SheetEngine;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static LEADING_FLOAT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?").expect("valid leading float regex")
});

/// One numeric field of a chart record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesValue {
    pub key: String,
    pub value: f64,
}

/// One data row projected for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartRecord {
    pub label: String,
    pub values: Vec<SeriesValue>,
}

/// Result of projecting one chart widget.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "records", rename_all = "snake_case")]
pub enum ChartProjection {
    /// The document holds no table widget at all.
    NoDataSource,
    /// Chart has no table selected yet.
    Unconfigured,
    /// Selected table no longer exists.
    TableNotFound(WidgetId),
    Series(Vec<ChartRecord>),
}

impl ChartProjection {
    pub fn records(&self) -> Option<&[ChartRecord]> {
        match self {
            Self::Series(records) => Some(records),
            _ => None,
        }
    }
}

/// Table a chart can be bound to, with its evaluated header row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartSource {
    pub table_id: WidgetId,
    pub headers: Vec<String>,
}

/// Lists every table widget as a chart source, in document order.
pub fn chart_sources(document: &Document, engine: &SheetEngine) -> Vec<ChartSource> {
    document
        .table_widgets()
        .into_iter()
        .map(|table| {
            let width = table
                .table_grid()
                .and_then(|grid| grid.first())
                .map(Vec::len)
                .unwrap_or(0);
            let headers = engine
                .get_computed_data(&table.id, 1, width)
                .into_iter()
                .next()
                .unwrap_or_default();
            ChartSource {
                table_id: table.id.clone(),
                headers,
            }
        })
        .collect()
}

/// Projects `config` against the document's tables.
///
/// The first `header_rows` rows are skipped; the last of them names the
/// series fields.
pub fn project(
    document: &Document,
    engine: &SheetEngine,
    config: Option<&ChartConfig>,
    header_rows: usize,
) -> ChartProjection {
    let tables = document.table_widgets();
    if tables.is_empty() {
        return ChartProjection::NoDataSource;
    }
    let Some(config) = config else {
        return ChartProjection::Unconfigured;
    };
    let Some(grid) = tables
        .iter()
        .find(|table| table.id == config.table_id)
        .and_then(|table| table.table_grid())
    else {
        return ChartProjection::TableNotFound(config.table_id.clone());
    };

    // Bounded by the grid; configured columns past it read as missing cells.
    let width = engine
        .sheet(&config.table_id)
        .map(|sheet| sheet.col_count())
        .unwrap_or_else(|| grid.first().map(Vec::len).unwrap_or(0));
    let computed = engine.get_computed_data(&config.table_id, grid.len(), width);

    let headers = header_rows
        .checked_sub(1)
        .and_then(|index| computed.get(index))
        .cloned()
        .unwrap_or_default();

    let records = computed
        .iter()
        .skip(header_rows)
        .enumerate()
        .map(|(index, row)| {
            let label = row
                .get(config.axis_column)
                .filter(|cell| !cell.is_empty())
                .cloned()
                .unwrap_or_else(|| format!("Row {}", index + 1));
            let values = config
                .series_columns
                .iter()
                .map(|&col| SeriesValue {
                    key: headers
                        .get(col)
                        .filter(|header| !header.is_empty())
                        .cloned()
                        .unwrap_or_else(|| format!("Col {col}")),
                    value: row.get(col).map(|cell| parse_chart_number(cell)).unwrap_or(0.0),
                })
                .collect();
            ChartRecord { label, values }
        })
        .collect();

    ChartProjection::Series(records)
}

/// Strips `$`, `,` and `%`, then reads the leading float; anything else is 0.
pub fn parse_chart_number(cell: &str) -> f64 {
    let cleaned: String = cell
        .chars()
        .filter(|ch| !matches!(ch, '$' | ',' | '%'))
        .collect();
    LEADING_FLOAT_RE
        .find(cleaned.trim_start())
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::parse_chart_number;

    #[test]
    fn chart_numbers_strip_punctuation_and_read_prefix() {
        assert_eq!(parse_chart_number("$1,250"), 1250.0);
        assert_eq!(parse_chart_number("25%"), 25.0);
        assert_eq!(parse_chart_number(" 12abc"), 12.0);
        assert_eq!(parse_chart_number("-3.5e2"), -350.0);
        assert_eq!(parse_chart_number("#DIV/0!"), 0.0);
        assert_eq!(parse_chart_number(""), 0.0);
    }
}
