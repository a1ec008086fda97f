//! A1-style cell addressing.
//!
//! Coordinates are zero-based `(row, col)`; addresses use column letters and
//! one-based row numbers.

pub const MAX_ROWS: usize = 1_048_576;
pub const MAX_COLS: usize = 16_384;

/// Zero-based cell coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellAddr {
    pub row: usize,
    pub col: usize,
}

impl CellAddr {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// Rectangular range with normalized corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRange {
    pub start: CellAddr,
    pub end: CellAddr,
}

impl CellRange {
    /// Builds a range from two corners in any order.
    pub fn new(a: CellAddr, b: CellAddr) -> Self {
        Self {
            start: CellAddr::new(a.row.min(b.row), a.col.min(b.col)),
            end: CellAddr::new(a.row.max(b.row), a.col.max(b.col)),
        }
    }

    pub fn rows(&self) -> usize {
        self.end.row - self.start.row + 1
    }

    pub fn cols(&self) -> usize {
        self.end.col - self.start.col + 1
    }
}

/// Converts a zero-based column index to letters (`0 -> A`, `26 -> AA`).
pub fn col_to_letters(col: usize) -> String {
    let mut remaining = col + 1;
    let mut letters = Vec::new();
    while remaining > 0 {
        remaining -= 1;
        letters.push((b'A' + (remaining % 26) as u8) as char);
        remaining /= 26;
    }
    letters.iter().rev().collect()
}

/// Converts column letters to a zero-based index; `None` for invalid input.
pub fn letters_to_col(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    let mut col: usize = 0;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        let digit = (ch.to_ascii_uppercase() as u8 - b'A' + 1) as usize;
        col = col.checked_mul(26)?.checked_add(digit)?;
        if col > MAX_COLS {
            return None;
        }
    }
    Some(col - 1)
}

/// Formats zero-based coordinates as an A1 address.
pub fn coords_to_address(row: usize, col: usize) -> String {
    format!("{}{}", col_to_letters(col), row + 1)
}

/// Formats a range-picker selection: one address for a single cell,
/// otherwise `start:end` in selection order.
pub fn range_address(start: CellAddr, end: CellAddr) -> String {
    let start_address = coords_to_address(start.row, start.col);
    if start == end {
        return start_address;
    }
    format!("{start_address}:{}", coords_to_address(end.row, end.col))
}

/// Parses `A1`, `$A1`, `A$1` or `$A$1` (case-insensitive).
pub fn parse_a1(input: &str) -> Option<CellAddr> {
    let input = input.trim();
    let rest = input.strip_prefix('$').unwrap_or(input);
    let letters_len = rest
        .find(|ch: char| !ch.is_ascii_alphabetic())
        .unwrap_or(rest.len());
    let (letters, rest) = rest.split_at(letters_len);
    let col = letters_to_col(letters)?;

    let digits = rest.strip_prefix('$').unwrap_or(rest);
    if digits.is_empty() || !digits.chars().all(|ch| ch.is_ascii_digit()) {
        return None;
    }
    let row: usize = digits.parse().ok()?;
    if row == 0 || row > MAX_ROWS {
        return None;
    }
    Some(CellAddr::new(row - 1, col))
}

#[cfg(test)]
mod tests {
    use super::{
        coords_to_address, letters_to_col, parse_a1, range_address, CellAddr, CellRange,
    };

    #[test]
    fn column_letters_round_trip_past_z() {
        for col in [0, 25, 26, 51, 701, 702] {
            let letters = super::col_to_letters(col);
            assert_eq!(letters_to_col(&letters), Some(col));
        }
        assert_eq!(super::col_to_letters(27), "AB");
    }

    #[test]
    fn parses_absolute_markers_and_rejects_garbage() {
        assert_eq!(parse_a1("$b$12"), Some(CellAddr::new(11, 1)));
        assert_eq!(parse_a1("A0"), None);
        assert_eq!(parse_a1("1A"), None);
        assert_eq!(parse_a1("SUM"), None);
        assert_eq!(parse_a1("A1B"), None);
    }

    #[test]
    fn formats_addresses_and_ranges() {
        assert_eq!(coords_to_address(2, 1), "B3");
        assert_eq!(range_address(CellAddr::new(0, 0), CellAddr::new(0, 0)), "A1");
        assert_eq!(range_address(CellAddr::new(3, 1), CellAddr::new(0, 0)), "B4:A1");
    }

    #[test]
    fn ranges_normalize_reversed_corners() {
        let range = CellRange::new(CellAddr::new(3, 2), CellAddr::new(1, 0));
        assert_eq!(range.start, CellAddr::new(1, 0));
        assert_eq!((range.rows(), range.cols()), (3, 3));
    }
}
