//! Cell values, error codes and coercions.
//!
//! # Invariants
//! - Errors are values; evaluation never fails as a Rust error.
//! - Numbers render rounded to 14 significant digits without a trailing `.0`.

use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;

const DISPLAY_SIGNIFICANT_DIGITS: usize = 14;

static NUMBER_CELL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([+-]?)\$?((?:\d{1,3}(?:,\d{3})+|\d*)(?:\.\d*)?(?:[eE][+-]?\d+)?)(%?)$")
        .expect("valid number cell regex")
});

/// Short error codes rendered in place of a cell value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Div0,
    Value,
    Ref,
    Name,
    Num,
    NA,
    /// Cell participates in a circular reference.
    Cycle,
    /// Formula text could not be parsed.
    Parse,
}

impl ErrorKind {
    pub fn as_code(self) -> &'static str {
        match self {
            ErrorKind::Div0 => "#DIV/0!",
            ErrorKind::Value => "#VALUE!",
            ErrorKind::Ref => "#REF!",
            ErrorKind::Name => "#NAME?",
            ErrorKind::Num => "#NUM!",
            ErrorKind::NA => "#N/A",
            ErrorKind::Cycle => "#CYCLE!",
            ErrorKind::Parse => "#ERROR!",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Bool(bool),
    Blank,
    Error(ErrorKind),
}

impl Value {
    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Value::Blank)
    }

    /// Interprets a non-formula cell string.
    pub fn from_literal(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Value::Blank;
        }
        if trimmed.eq_ignore_ascii_case("TRUE") {
            return Value::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("FALSE") {
            return Value::Bool(false);
        }
        match parse_number_text(trimmed) {
            Some(number) => Value::Number(number),
            None => Value::Text(raw.to_string()),
        }
    }

    /// Scalar numeric coercion: blanks are 0, booleans 1/0, numeric text parses.
    pub fn to_number(&self) -> Result<f64, ErrorKind> {
        match self {
            Value::Number(number) => Ok(*number),
            Value::Bool(flag) => Ok(if *flag { 1.0 } else { 0.0 }),
            Value::Blank => Ok(0.0),
            Value::Text(text) => parse_number_text(text.trim()).ok_or(ErrorKind::Value),
            Value::Error(kind) => Err(*kind),
        }
    }

    pub fn to_bool(&self) -> Result<bool, ErrorKind> {
        match self {
            Value::Bool(flag) => Ok(*flag),
            Value::Number(number) => Ok(*number != 0.0),
            Value::Blank => Ok(false),
            Value::Text(text) => {
                if text.trim().eq_ignore_ascii_case("TRUE") {
                    Ok(true)
                } else if text.trim().eq_ignore_ascii_case("FALSE") {
                    Ok(false)
                } else {
                    Err(ErrorKind::Value)
                }
            }
            Value::Error(kind) => Err(*kind),
        }
    }

    /// Text coercion used by `&` and text functions.
    pub fn to_text(&self) -> Result<String, ErrorKind> {
        match self {
            Value::Error(kind) => Err(*kind),
            other => Ok(other.display()),
        }
    }

    /// Renders the value as cell display text.
    pub fn display(&self) -> String {
        match self {
            Value::Number(number) => format_number(*number),
            Value::Text(text) => text.clone(),
            Value::Bool(true) => "TRUE".to_string(),
            Value::Bool(false) => "FALSE".to_string(),
            Value::Blank => String::new(),
            Value::Error(kind) => kind.as_code().to_string(),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<ErrorKind> for Value {
    fn from(value: ErrorKind) -> Self {
        Value::Error(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// Parses numeric cell text: sign, optional `$`, thousands commas, decimals,
/// exponent and a trailing `%`.
pub fn parse_number_text(text: &str) -> Option<f64> {
    let captures = NUMBER_CELL_RE.captures(text)?;
    let mantissa = captures.get(2)?.as_str();
    if !mantissa.chars().next().is_some_and(|c| c.is_ascii_digit() || c == '.')
        || !mantissa.chars().any(|c| c.is_ascii_digit())
    {
        return None;
    }
    let mut number: f64 = mantissa.replace(',', "").parse().ok()?;
    if captures.get(1).is_some_and(|sign| sign.as_str() == "-") {
        number = -number;
    }
    if captures.get(3).is_some_and(|percent| !percent.as_str().is_empty()) {
        number /= 100.0;
    }
    Some(number)
}

/// Formats a number for display with 14 significant digits.
pub fn format_number(number: f64) -> String {
    if !number.is_finite() {
        return ErrorKind::Num.as_code().to_string();
    }
    let rounded: f64 = format!("{:.*e}", DISPLAY_SIGNIFICANT_DIGITS - 1, number)
        .parse()
        .unwrap_or(number);
    if rounded == 0.0 {
        return "0".to_string();
    }
    format!("{rounded}")
}

/// Spreadsheet ordering: numbers < text < booleans; blanks act as the
/// other side's zero value. Text compares case-insensitively.
pub fn compare_values(left: &Value, right: &Value) -> Result<Ordering, ErrorKind> {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Number(_) | Value::Blank => 0,
            Value::Text(_) => 1,
            Value::Bool(_) => 2,
            Value::Error(_) => 3,
        }
    }

    match (left, right) {
        (Value::Error(kind), _) | (_, Value::Error(kind)) => Err(*kind),
        (Value::Blank, Value::Blank) => Ok(Ordering::Equal),
        (Value::Blank, Value::Text(text)) => Ok("".cmp(text.to_lowercase().as_str())),
        (Value::Text(text), Value::Blank) => Ok(text.to_lowercase().as_str().cmp("")),
        (Value::Blank, Value::Bool(flag)) => Ok(false.cmp(flag)),
        (Value::Bool(flag), Value::Blank) => Ok(flag.cmp(&false)),
        (Value::Number(_) | Value::Blank, Value::Number(_) | Value::Blank) => {
            let left = left.to_number()?;
            let right = right.to_number()?;
            Ok(left.partial_cmp(&right).unwrap_or(Ordering::Equal))
        }
        (Value::Text(left), Value::Text(right)) => {
            Ok(left.to_lowercase().cmp(&right.to_lowercase()))
        }
        (Value::Bool(left), Value::Bool(right)) => Ok(left.cmp(right)),
        _ => Ok(rank(left).cmp(&rank(right))),
    }
}

#[cfg(test)]
mod tests {
    use super::{compare_values, format_number, parse_number_text, ErrorKind, Value};
    use std::cmp::Ordering;

    #[test]
    fn literal_cells_detect_numbers_percents_and_currency() {
        assert_eq!(Value::from_literal("42"), Value::Number(42.0));
        assert_eq!(Value::from_literal("20%"), Value::Number(0.2));
        assert_eq!(Value::from_literal("$1,200.50"), Value::Number(1200.5));
        assert_eq!(Value::from_literal("-.5"), Value::Number(-0.5));
        assert_eq!(Value::from_literal("true"), Value::Bool(true));
        assert_eq!(Value::from_literal("  "), Value::Blank);
        assert_eq!(Value::from_literal("Q1"), Value::Text("Q1".to_string()));
        assert_eq!(parse_number_text("1,2"), None);
        assert_eq!(parse_number_text("$"), None);
        assert_eq!(parse_number_text("."), None);
    }

    #[test]
    fn numbers_display_with_fourteen_significant_digits() {
        assert_eq!(format_number(30.0), "30");
        assert_eq!(format_number(0.1 + 0.2), "0.3");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(1.0 / 3.0), "0.33333333333333");
        assert_eq!(format_number(f64::INFINITY), "#NUM!");
    }

    #[test]
    fn comparisons_follow_spreadsheet_type_order() {
        let number = Value::Number(5.0);
        let text = Value::Text("abc".to_string());
        assert_eq!(compare_values(&number, &text), Ok(Ordering::Less));
        assert_eq!(
            compare_values(&Value::Text("ABC".to_string()), &text),
            Ok(Ordering::Equal)
        );
        assert_eq!(
            compare_values(&Value::Blank, &Value::Number(0.0)),
            Ok(Ordering::Equal)
        );
        assert_eq!(
            compare_values(&Value::Error(ErrorKind::NA), &number),
            Err(ErrorKind::NA)
        );
    }

    #[test]
    fn booleans_display_in_upper_case() {
        assert_eq!(Value::Bool(true).display(), "TRUE");
        assert_eq!(Value::Error(ErrorKind::Parse).display(), "#ERROR!");
    }
}
