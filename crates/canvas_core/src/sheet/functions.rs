//! Built-in spreadsheet functions and the autocomplete catalog.
//!
//! # Responsibility
//! - Map upper-case function names to implementations.
//! - Describe functions for editor autocomplete.
//!
//! # Invariants
//! - Unknown names evaluate to `#NAME?`; wrong arity to `#VALUE!`.
//! - `IF` and `IFERROR` evaluate only the branch they return.

use crate::sheet::eval::{numeric, Arg, Evaluator};
use crate::sheet::parser::Expr;
use crate::sheet::value::{compare_values, ErrorKind, Value};
use serde::Serialize;
use std::cmp::Ordering;

type FunctionResult = Result<Value, ErrorKind>;
type FunctionImpl = fn(&Evaluator<'_>, &[Expr]) -> FunctionResult;

const REGISTRY: &[(&str, FunctionImpl)] = &[
    ("ABS", abs),
    ("AND", and),
    ("AVERAGE", average),
    ("CONCATENATE", concatenate),
    ("COUNT", count),
    ("COUNTA", counta),
    ("IF", if_),
    ("IFERROR", iferror),
    ("LEN", len),
    ("LOWER", lower),
    ("MAX", max),
    ("MIN", min),
    ("NOT", not),
    ("NOW", now),
    ("OR", or),
    ("PRODUCT", product),
    ("ROUND", round),
    ("SUM", sum),
    ("TODAY", today),
    ("UPPER", upper),
    ("VLOOKUP", vlookup),
];

/// Curated `(name, description, parameters)` metadata for common functions.
const CURATED: &[(&str, &str, &[&str])] = &[
    (
        "SUM",
        "Adds all numbers in a range of cells.",
        &["number1", "[number2]", "..."],
    ),
    (
        "AVERAGE",
        "Returns the arithmetic mean of its arguments.",
        &["number1", "[number2]", "..."],
    ),
    (
        "COUNT",
        "Counts how many cells in a range contain numbers.",
        &["value1", "[value2]", "..."],
    ),
    (
        "MAX",
        "Returns the largest value in a set of values.",
        &["number1", "[number2]", "..."],
    ),
    (
        "MIN",
        "Returns the smallest value in a set of values.",
        &["number1", "[number2]", "..."],
    ),
    (
        "IF",
        "Checks a condition and returns one value when TRUE and another when FALSE.",
        &["logical_test", "value_if_true", "[value_if_false]"],
    ),
    (
        "VLOOKUP",
        "Looks up a value in the leftmost column of a table and returns the value in the same row of a given column.",
        &["lookup_value", "table_array", "col_index", "[range_lookup]"],
    ),
    (
        "CONCATENATE",
        "Joins several text items into one.",
        &["text1", "[text2]", "..."],
    ),
    ("TODAY", "Returns the current date.", &[]),
    ("NOW", "Returns the current date and time.", &[]),
];

/// Autocomplete entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionInfo {
    pub name: String,
    pub parameters: Vec<String>,
    pub description: String,
}

/// Every registered function name, upper-case.
pub fn registered_names() -> impl Iterator<Item = &'static str> {
    REGISTRY.iter().map(|(name, _)| *name)
}

pub fn is_registered(name: &str) -> bool {
    REGISTRY.iter().any(|(registered, _)| *registered == name)
}

/// Registered functions merged with curated metadata; documented entries
/// first, then alphabetical within each group.
pub fn catalog() -> Vec<FunctionInfo> {
    let mut entries: Vec<FunctionInfo> = registered_names()
        .map(|name| match CURATED.iter().find(|(curated, _, _)| *curated == name) {
            Some((_, description, parameters)) => FunctionInfo {
                name: name.to_string(),
                parameters: parameters.iter().map(|p| p.to_string()).collect(),
                description: description.to_string(),
            },
            None => FunctionInfo {
                name: name.to_string(),
                parameters: Vec::new(),
                description: String::new(),
            },
        })
        .collect();
    entries.sort_by(|a, b| {
        a.description
            .is_empty()
            .cmp(&b.description.is_empty())
            .then_with(|| a.name.cmp(&b.name))
    });
    entries
}

/// Dispatches a call by upper-case name.
pub fn call(evaluator: &Evaluator<'_>, name: &str, args: &[Expr]) -> Value {
    match REGISTRY.iter().find(|(registered, _)| *registered == name) {
        Some((_, function)) => function(evaluator, args).unwrap_or_else(Value::Error),
        None => Value::Error(ErrorKind::Name),
    }
}

fn arity(args: &[Expr], min: usize, max: usize) -> Result<(), ErrorKind> {
    if args.len() < min || args.len() > max {
        return Err(ErrorKind::Value);
    }
    Ok(())
}

/// Numbers from ranges (non-numbers skipped) and scalars (coerced).
fn collect_numbers(evaluator: &Evaluator<'_>, args: &[Expr]) -> Result<Vec<f64>, ErrorKind> {
    let mut numbers = Vec::new();
    for arg in args {
        match evaluator.eval_arg(arg) {
            Arg::Range(range) => {
                for value in range.values {
                    match value {
                        Value::Number(number) => numbers.push(number),
                        Value::Error(kind) => return Err(kind),
                        _ => {}
                    }
                }
            }
            Arg::Scalar(value) => numbers.push(value.to_number()?),
        }
    }
    Ok(numbers)
}

fn scalar_number(evaluator: &Evaluator<'_>, expr: &Expr) -> Result<f64, ErrorKind> {
    evaluator.eval(expr).to_number()
}

fn scalar_text(evaluator: &Evaluator<'_>, expr: &Expr) -> Result<String, ErrorKind> {
    evaluator.eval(expr).to_text()
}

fn sum(evaluator: &Evaluator<'_>, args: &[Expr]) -> FunctionResult {
    let numbers = collect_numbers(evaluator, args)?;
    Ok(numeric(Ok(numbers.iter().sum())))
}

fn average(evaluator: &Evaluator<'_>, args: &[Expr]) -> FunctionResult {
    arity(args, 1, usize::MAX)?;
    let numbers = collect_numbers(evaluator, args)?;
    if numbers.is_empty() {
        return Err(ErrorKind::Div0);
    }
    Ok(numeric(Ok(numbers.iter().sum::<f64>() / numbers.len() as f64)))
}

fn count(evaluator: &Evaluator<'_>, args: &[Expr]) -> FunctionResult {
    let mut total = 0usize;
    for arg in args {
        match evaluator.eval_arg(arg) {
            Arg::Range(range) => {
                total += range
                    .values
                    .iter()
                    .filter(|value| matches!(value, Value::Number(_)))
                    .count();
            }
            Arg::Scalar(value) => {
                if !value.is_blank() && value.to_number().is_ok() {
                    total += 1;
                }
            }
        }
    }
    Ok(Value::Number(total as f64))
}

fn counta(evaluator: &Evaluator<'_>, args: &[Expr]) -> FunctionResult {
    let mut total = 0usize;
    for arg in args {
        match evaluator.eval_arg(arg) {
            Arg::Range(range) => {
                total += range.values.iter().filter(|value| !value.is_blank()).count();
            }
            Arg::Scalar(value) => {
                if !value.is_blank() {
                    total += 1;
                }
            }
        }
    }
    Ok(Value::Number(total as f64))
}

fn max(evaluator: &Evaluator<'_>, args: &[Expr]) -> FunctionResult {
    arity(args, 1, usize::MAX)?;
    let numbers = collect_numbers(evaluator, args)?;
    Ok(Value::Number(
        numbers.into_iter().reduce(f64::max).unwrap_or(0.0),
    ))
}

fn min(evaluator: &Evaluator<'_>, args: &[Expr]) -> FunctionResult {
    arity(args, 1, usize::MAX)?;
    let numbers = collect_numbers(evaluator, args)?;
    Ok(Value::Number(
        numbers.into_iter().reduce(f64::min).unwrap_or(0.0),
    ))
}

fn product(evaluator: &Evaluator<'_>, args: &[Expr]) -> FunctionResult {
    arity(args, 1, usize::MAX)?;
    let numbers = collect_numbers(evaluator, args)?;
    if numbers.is_empty() {
        return Ok(Value::Number(0.0));
    }
    Ok(numeric(Ok(numbers.iter().product())))
}

fn round(evaluator: &Evaluator<'_>, args: &[Expr]) -> FunctionResult {
    arity(args, 1, 2)?;
    let number = scalar_number(evaluator, &args[0])?;
    let digits = match args.get(1) {
        Some(expr) => scalar_number(evaluator, expr)?.trunc() as i32,
        None => 0,
    };
    let factor = 10f64.powi(digits);
    Ok(numeric(Ok((number * factor).round() / factor)))
}

fn abs(evaluator: &Evaluator<'_>, args: &[Expr]) -> FunctionResult {
    arity(args, 1, 1)?;
    Ok(Value::Number(scalar_number(evaluator, &args[0])?.abs()))
}

fn if_(evaluator: &Evaluator<'_>, args: &[Expr]) -> FunctionResult {
    arity(args, 2, 3)?;
    if evaluator.eval(&args[0]).to_bool()? {
        Ok(evaluator.eval(&args[1]))
    } else {
        Ok(args
            .get(2)
            .map(|expr| evaluator.eval(expr))
            .unwrap_or(Value::Bool(false)))
    }
}

fn iferror(evaluator: &Evaluator<'_>, args: &[Expr]) -> FunctionResult {
    arity(args, 2, 2)?;
    match evaluator.eval(&args[0]) {
        Value::Error(_) => Ok(evaluator.eval(&args[1])),
        value => Ok(value),
    }
}

/// Logical values from ranges (text and blanks skipped) and scalars.
fn collect_bools(evaluator: &Evaluator<'_>, args: &[Expr]) -> Result<Vec<bool>, ErrorKind> {
    arity(args, 1, usize::MAX)?;
    let mut flags = Vec::new();
    for arg in args {
        match evaluator.eval_arg(arg) {
            Arg::Range(range) => {
                for value in range.values {
                    match value {
                        Value::Bool(flag) => flags.push(flag),
                        Value::Number(number) => flags.push(number != 0.0),
                        Value::Error(kind) => return Err(kind),
                        Value::Text(_) | Value::Blank => {}
                    }
                }
            }
            Arg::Scalar(value) => flags.push(value.to_bool()?),
        }
    }
    if flags.is_empty() {
        return Err(ErrorKind::Value);
    }
    Ok(flags)
}

fn and(evaluator: &Evaluator<'_>, args: &[Expr]) -> FunctionResult {
    Ok(Value::Bool(collect_bools(evaluator, args)?.into_iter().all(|flag| flag)))
}

fn or(evaluator: &Evaluator<'_>, args: &[Expr]) -> FunctionResult {
    Ok(Value::Bool(collect_bools(evaluator, args)?.into_iter().any(|flag| flag)))
}

fn not(evaluator: &Evaluator<'_>, args: &[Expr]) -> FunctionResult {
    arity(args, 1, 1)?;
    Ok(Value::Bool(!evaluator.eval(&args[0]).to_bool()?))
}

fn vlookup(evaluator: &Evaluator<'_>, args: &[Expr]) -> FunctionResult {
    arity(args, 3, 4)?;
    let needle = evaluator.eval(&args[0]);
    if let Value::Error(kind) = needle {
        return Err(kind);
    }
    let Arg::Range(table) = evaluator.eval_arg(&args[1]) else {
        return Err(ErrorKind::Value);
    };
    let column = scalar_number(evaluator, &args[2])?.trunc();
    if column < 1.0 {
        return Err(ErrorKind::Value);
    }
    let column = column as usize - 1;
    if column >= table.cols {
        return Err(ErrorKind::Ref);
    }
    let approximate = match args.get(3) {
        Some(expr) => evaluator.eval(expr).to_bool()?,
        None => true,
    };

    let mut matched_row = None;
    for row in 0..table.rows {
        let Some(key) = table.get(row, 0) else {
            continue;
        };
        if key.is_blank() {
            continue;
        }
        let same_kind = std::mem::discriminant(key) == std::mem::discriminant(&needle);
        match compare_values(key, &needle) {
            Ok(Ordering::Equal) if same_kind => {
                matched_row = Some(row);
                if !approximate {
                    break;
                }
            }
            Ok(Ordering::Less) if approximate && same_kind => matched_row = Some(row),
            Ok(Ordering::Greater) if approximate && same_kind => break,
            _ => {}
        }
    }

    matched_row
        .and_then(|row| table.get(row, column).cloned())
        .ok_or(ErrorKind::NA)
}

fn concatenate(evaluator: &Evaluator<'_>, args: &[Expr]) -> FunctionResult {
    arity(args, 1, usize::MAX)?;
    let mut joined = String::new();
    for arg in args {
        match evaluator.eval_arg(arg) {
            Arg::Range(range) => {
                for value in range.values {
                    joined.push_str(&value.to_text()?);
                }
            }
            Arg::Scalar(value) => joined.push_str(&value.to_text()?),
        }
    }
    Ok(Value::Text(joined))
}

fn len(evaluator: &Evaluator<'_>, args: &[Expr]) -> FunctionResult {
    arity(args, 1, 1)?;
    Ok(Value::Number(scalar_text(evaluator, &args[0])?.chars().count() as f64))
}

fn upper(evaluator: &Evaluator<'_>, args: &[Expr]) -> FunctionResult {
    arity(args, 1, 1)?;
    Ok(Value::Text(scalar_text(evaluator, &args[0])?.to_uppercase()))
}

fn lower(evaluator: &Evaluator<'_>, args: &[Expr]) -> FunctionResult {
    arity(args, 1, 1)?;
    Ok(Value::Text(scalar_text(evaluator, &args[0])?.to_lowercase()))
}

fn today(evaluator: &Evaluator<'_>, args: &[Expr]) -> FunctionResult {
    arity(args, 0, 0)?;
    Ok(Value::Number(evaluator.now_serial().floor()))
}

fn now(evaluator: &Evaluator<'_>, args: &[Expr]) -> FunctionResult {
    arity(args, 0, 0)?;
    Ok(Value::Number(evaluator.now_serial()))
}

#[cfg(test)]
mod tests {
    use super::{catalog, is_registered};

    #[test]
    fn catalog_lists_documented_functions_first() {
        let entries = catalog();
        let first_undocumented = entries
            .iter()
            .position(|entry| entry.description.is_empty())
            .expect("catalog should contain undocumented functions");

        assert_eq!(first_undocumented, 10);
        assert!(entries[..first_undocumented]
            .windows(2)
            .all(|pair| pair[0].name < pair[1].name));
        assert!(entries[first_undocumented..]
            .iter()
            .all(|entry| entry.parameters.is_empty()));
        assert_eq!(entries[0].name, "AVERAGE");
    }

    #[test]
    fn every_curated_function_is_registered() {
        for (name, _, _) in super::CURATED {
            assert!(is_registered(name), "{name} should be registered");
        }
    }
}
