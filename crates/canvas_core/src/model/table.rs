//! Table grid editing helpers.
//!
//! # Responsibility
//! - Provide the structural grid edits a table editor issues.
//! - Produce new grids that callers feed back through `WidgetPatch::table`.
//!
//! # Invariants
//! - Row removal never leaves fewer than one row.
//! - Column removal never leaves a row with fewer than one cell.
//! - Edits out of range return the grid unchanged.

/// Starter grid for a freshly added table widget.
pub fn default_grid() -> Vec<Vec<String>> {
    vec![
        vec!["Metric".to_string(), "Q1".to_string(), "Q2".to_string()],
        vec!["Retention".to_string(), "20%".to_string(), "25%".to_string()],
    ]
}

/// Returns the width of the header row, or 0 for an empty grid.
pub fn column_count(grid: &[Vec<String>]) -> usize {
    grid.first().map(Vec::len).unwrap_or(0)
}

/// Writes one cell, padding the row when `col` is past its end.
pub fn set_cell(grid: &[Vec<String>], row: usize, col: usize, value: &str) -> Vec<Vec<String>> {
    let mut next = grid.to_vec();
    let Some(cells) = next.get_mut(row) else {
        return next;
    };
    if cells.len() <= col {
        cells.resize(col + 1, String::new());
    }
    cells[col] = value.to_string();
    next
}

/// Appends one empty row sized to the header row width.
pub fn add_row(grid: &[Vec<String>]) -> Vec<Vec<String>> {
    let mut next = grid.to_vec();
    let width = column_count(grid).max(1);
    next.push(vec![String::new(); width]);
    next
}

/// Appends one empty cell to every row.
pub fn add_column(grid: &[Vec<String>]) -> Vec<Vec<String>> {
    grid.iter()
        .map(|row| {
            let mut row = row.clone();
            row.push(String::new());
            row
        })
        .collect()
}

pub fn remove_row(grid: &[Vec<String>], row: usize) -> Vec<Vec<String>> {
    if grid.len() <= 1 || row >= grid.len() {
        return grid.to_vec();
    }
    let mut next = grid.to_vec();
    next.remove(row);
    next
}

pub fn remove_column(grid: &[Vec<String>], col: usize) -> Vec<Vec<String>> {
    if column_count(grid) <= 1 {
        return grid.to_vec();
    }
    grid.iter()
        .map(|row| {
            let mut row = row.clone();
            if col < row.len() && row.len() > 1 {
                row.remove(col);
            }
            row
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{add_column, add_row, default_grid, remove_column, remove_row, set_cell};

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect()
    }

    #[test]
    fn add_row_uses_header_width() {
        let next = add_row(&grid(&[&["a", "b", "c"], &["1"]]));
        assert_eq!(next.len(), 3);
        assert_eq!(next[2], vec![String::new(); 3]);
    }

    #[test]
    fn add_column_extends_every_row() {
        let next = add_column(&default_grid());
        assert!(next.iter().all(|row| row.len() == 4));
    }

    #[test]
    fn removals_keep_at_least_one_row_and_column() {
        let single = grid(&[&["only"]]);
        assert_eq!(remove_row(&single, 0), single);
        assert_eq!(remove_column(&single, 0), single);

        let wide = grid(&[&["a", "b"], &["1", "2"]]);
        assert_eq!(remove_column(&wide, 0), grid(&[&["b"], &["2"]]));
        assert_eq!(remove_row(&wide, 1), grid(&[&["a", "b"]]));
    }

    #[test]
    fn set_cell_pads_short_rows_and_ignores_missing_rows() {
        let base = grid(&[&["a"]]);
        assert_eq!(set_cell(&base, 0, 2, "x"), grid(&[&["a", "", "x"]]));
        assert_eq!(set_cell(&base, 5, 0, "x"), base);
    }
}
