//! Formula engine adapter.
//!
//! # Responsibility
//! - Keep one evaluated sheet per table widget id.
//! - Expose display-text reads, bulk reads and function discovery.
//!
//! # Invariants
//! - A sheet is a pure projection of its table grid: rebuilding from the same
//!   grid yields the same state.
//! - Reads never fail: a missing sheet or coordinate reads as empty text.
//! - Each engine instance is independent; no state is shared between
//!   documents.

pub mod address;
pub mod eval;
pub mod functions;
pub mod parser;
pub mod value;

use crate::model::widget::WidgetId;
use crate::sheet::eval::{evaluate_grid, CellInput};
use crate::sheet::functions::FunctionInfo;
use crate::sheet::value::Value;
use chrono::{DateTime, Utc};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::collections::HashMap;

pub use address::{coords_to_address, range_address, CellAddr};
pub use value::ErrorKind;

static TRAILING_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Za-z]+)$").expect("valid trailing name regex"));

/// Rewrites `;` argument separators to `,` inside formula cells.
pub fn sanitize_cell(cell: &str) -> Cow<'_, str> {
    if cell.starts_with('=') && cell.contains(';') {
        Cow::Owned(cell.replace(';', ","))
    } else {
        Cow::Borrowed(cell)
    }
}

/// Evaluated state of one table grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    raw: Vec<Vec<String>>,
    computed: Vec<Vec<Value>>,
}

impl Sheet {
    /// Sanitized source grid.
    pub fn raw(&self) -> &[Vec<String>] {
        &self.raw
    }

    pub fn value(&self, row: usize, col: usize) -> Option<&Value> {
        self.computed.get(row).and_then(|cells| cells.get(col))
    }

    pub fn row_count(&self) -> usize {
        self.raw.len()
    }

    pub fn col_count(&self) -> usize {
        self.raw.iter().map(Vec::len).max().unwrap_or(0)
    }
}

/// Per-document evaluation context keyed by table widget id.
#[derive(Debug, Clone)]
pub struct SheetEngine {
    sheets: HashMap<WidgetId, Sheet>,
    clock: fn() -> DateTime<Utc>,
}

impl Default for SheetEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SheetEngine {
    pub fn new() -> Self {
        Self::with_clock(Utc::now)
    }

    /// Creates an engine whose `TODAY`/`NOW` read from `clock`.
    pub fn with_clock(clock: fn() -> DateTime<Utc>) -> Self {
        Self {
            sheets: HashMap::new(),
            clock,
        }
    }

    /// Replaces or creates the sheet for `table_id` and evaluates it.
    pub fn update_sheet(&mut self, table_id: &str, grid: &[Vec<String>]) {
        let raw: Vec<Vec<String>> = grid
            .iter()
            .map(|row| row.iter().map(|cell| sanitize_cell(cell).into_owned()).collect())
            .collect();
        let inputs: Vec<Vec<CellInput>> = raw
            .iter()
            .map(|row| row.iter().map(|cell| CellInput::parse(cell)).collect())
            .collect();
        let computed = evaluate_grid(&inputs, (self.clock)());
        let error_cells = computed
            .iter()
            .flatten()
            .filter(|value| value.is_error())
            .count();

        debug!(
            "event=sheet_update module=sheet status=ok table_id={} rows={} error_cells={}",
            table_id,
            raw.len(),
            error_cells
        );
        self.sheets
            .insert(table_id.to_string(), Sheet { raw, computed });
    }

    pub fn sheet(&self, table_id: &str) -> Option<&Sheet> {
        self.sheets.get(table_id)
    }

    pub fn has_sheet(&self, table_id: &str) -> bool {
        self.sheets.contains_key(table_id)
    }

    /// Returns whether a sheet existed and was dropped.
    pub fn remove_sheet(&mut self, table_id: &str) -> bool {
        let removed = self.sheets.remove(table_id).is_some();
        if removed {
            debug!(
                "event=sheet_remove module=sheet status=ok table_id={}",
                table_id
            );
        }
        removed
    }

    pub fn clear(&mut self) {
        self.sheets.clear();
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    /// Display text of one evaluated cell; empty when missing.
    pub fn get_computed_value(&self, table_id: &str, row: usize, col: usize) -> String {
        self.sheets
            .get(table_id)
            .and_then(|sheet| sheet.value(row, col))
            .map(Value::display)
            .unwrap_or_default()
    }

    /// Rectangular bulk read; empty when the sheet is missing.
    pub fn get_computed_data(
        &self,
        table_id: &str,
        row_count: usize,
        col_count: usize,
    ) -> Vec<Vec<String>> {
        if !self.has_sheet(table_id) {
            return Vec::new();
        }
        (0..row_count)
            .map(|row| {
                (0..col_count)
                    .map(|col| self.get_computed_value(table_id, row, col))
                    .collect()
            })
            .collect()
    }

    /// Full function catalog for autocomplete.
    pub fn function_catalog(&self) -> Vec<FunctionInfo> {
        functions::catalog()
    }

    /// Catalog entries whose name starts with the trailing letters of a
    /// formula being typed. Non-formula input yields nothing.
    pub fn suggest_functions(&self, input: &str) -> Vec<FunctionInfo> {
        if !input.starts_with('=') {
            return Vec::new();
        }
        let Some(prefix) = TRAILING_NAME_RE
            .captures(input)
            .and_then(|captures| captures.get(1))
            .map(|m| m.as_str().to_ascii_uppercase())
        else {
            return Vec::new();
        };
        functions::catalog()
            .into_iter()
            .filter(|entry| entry.name.starts_with(&prefix))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{sanitize_cell, SheetEngine};

    #[test]
    fn sanitize_only_touches_formulas() {
        assert_eq!(sanitize_cell("=SUM(A1;A2)"), "=SUM(A1,A2)");
        assert_eq!(sanitize_cell("a;b"), "a;b");
    }

    #[test]
    fn suggestions_use_trailing_letters() {
        let engine = SheetEngine::new();
        let names: Vec<String> = engine
            .suggest_functions("=A1+co")
            .into_iter()
            .map(|entry| entry.name)
            .collect();
        assert_eq!(names, vec!["CONCATENATE", "COUNT", "COUNTA"]);
        assert!(engine.suggest_functions("co").is_empty());
        assert!(engine.suggest_functions("=A1+").is_empty());
    }
}
