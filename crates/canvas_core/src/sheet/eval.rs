//! Sheet evaluation.
//!
//! # Responsibility
//! - Classify raw cells into literals and parsed formulas.
//! - Order formula cells by dependency and compute every cell once.
//!
//! # Invariants
//! - Cells on a reference cycle evaluate to `#CYCLE!`; evaluation order does
//!   not change any result.
//! - A reference outside the stored grid reads as blank.
//! - One failing cell never prevents other cells from evaluating.

use crate::sheet::address::{CellAddr, CellRange};
use crate::sheet::functions;
use crate::sheet::parser::{parse_formula, BinaryOp, Expr, Reference};
use crate::sheet::value::{compare_values, ErrorKind, Value};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Serial day number of 1970-01-01 in the 1899-12-30 based date system.
const UNIX_EPOCH_SERIAL: f64 = 25_569.0;
const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Parsed form of one raw cell string.
#[derive(Debug, Clone, PartialEq)]
pub enum CellInput {
    Literal(Value),
    Formula(Expr),
    /// Formula text that failed to parse.
    Invalid,
}

impl CellInput {
    /// Classifies one sanitized cell string.
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix('=') {
            Some(body) => match parse_formula(body) {
                Ok(expr) => CellInput::Formula(expr),
                Err(_) => CellInput::Invalid,
            },
            None => CellInput::Literal(Value::from_literal(raw)),
        }
    }
}

/// Argument as seen by a function: references stay rectangular.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Scalar(Value),
    Range(RangeValues),
}

/// Row-major values of a rectangular reference.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeValues {
    pub rows: usize,
    pub cols: usize,
    pub values: Vec<Value>,
}

impl RangeValues {
    pub fn get(&self, row: usize, col: usize) -> Option<&Value> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.values.get(row * self.cols + col)
    }
}

/// Read-only evaluation context over already computed cells.
pub struct Evaluator<'a> {
    computed: &'a [Vec<Value>],
    now: DateTime<Utc>,
}

impl<'a> Evaluator<'a> {
    pub fn new(computed: &'a [Vec<Value>], now: DateTime<Utc>) -> Self {
        Self { computed, now }
    }

    /// Spreadsheet serial date-time for the evaluation instant.
    pub fn now_serial(&self) -> f64 {
        UNIX_EPOCH_SERIAL + self.now.timestamp_millis() as f64 / MILLIS_PER_DAY
    }

    pub fn cell(&self, addr: CellAddr) -> Value {
        self.computed
            .get(addr.row)
            .and_then(|row| row.get(addr.col))
            .cloned()
            .unwrap_or(Value::Blank)
    }

    pub fn range(&self, range: CellRange) -> RangeValues {
        let mut values = Vec::with_capacity(range.rows().saturating_mul(range.cols()).min(4096));
        for row in range.start.row..=range.end.row {
            for col in range.start.col..=range.end.col {
                values.push(self.cell(CellAddr::new(row, col)));
            }
        }
        RangeValues {
            rows: range.rows(),
            cols: range.cols(),
            values,
        }
    }

    /// Evaluates an argument, keeping references rectangular.
    pub fn eval_arg(&self, expr: &Expr) -> Arg {
        match expr {
            Expr::Ref(addr) => Arg::Range(RangeValues {
                rows: 1,
                cols: 1,
                values: vec![self.cell(*addr)],
            }),
            Expr::Range(range) => Arg::Range(self.range(self.clip(*range))),
            other => Arg::Scalar(self.eval(other)),
        }
    }

    /// Limits a range to the stored grid; cells beyond it are blank anyway.
    fn clip(&self, range: CellRange) -> CellRange {
        let max_row = self.computed.len().saturating_sub(1);
        let max_col = self
            .computed
            .iter()
            .map(Vec::len)
            .max()
            .unwrap_or(0)
            .saturating_sub(1);
        let end = CellAddr::new(
            range.end.row.min(max_row.max(range.start.row)),
            range.end.col.min(max_col.max(range.start.col)),
        );
        CellRange::new(range.start, end)
    }

    /// Evaluates in scalar context.
    pub fn eval(&self, expr: &Expr) -> Value {
        match expr {
            Expr::Number(number) => Value::Number(*number),
            Expr::Text(text) => Value::Text(text.clone()),
            Expr::Bool(flag) => Value::Bool(*flag),
            Expr::Ref(addr) => self.cell(*addr),
            Expr::Range(_) => Value::Error(ErrorKind::Value),
            Expr::Name(_) => Value::Error(ErrorKind::Name),
            Expr::Negate(inner) => numeric(self.eval(inner).to_number().map(|n| -n)),
            Expr::Percent(inner) => numeric(self.eval(inner).to_number().map(|n| n / 100.0)),
            Expr::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs),
            Expr::Call { name, args } => functions::call(self, name, args),
        }
    }

    fn binary(&self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Value {
        let left = self.eval(lhs);
        let right = self.eval(rhs);
        match op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Pow => {
                numeric(arithmetic(op, &left, &right))
            }
            BinaryOp::Concat => match (left.to_text(), right.to_text()) {
                (Ok(left), Ok(right)) => Value::Text(left + &right),
                (Err(kind), _) | (_, Err(kind)) => Value::Error(kind),
            },
            _ => match compare_values(&left, &right) {
                Ok(ordering) => Value::Bool(match op {
                    BinaryOp::Eq => ordering == Ordering::Equal,
                    BinaryOp::Ne => ordering != Ordering::Equal,
                    BinaryOp::Lt => ordering == Ordering::Less,
                    BinaryOp::Gt => ordering == Ordering::Greater,
                    BinaryOp::Le => ordering != Ordering::Greater,
                    _ => ordering != Ordering::Less,
                }),
                Err(kind) => Value::Error(kind),
            },
        }
    }
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Result<f64, ErrorKind> {
    let left = left.to_number()?;
    let right = right.to_number()?;
    match op {
        BinaryOp::Add => Ok(left + right),
        BinaryOp::Sub => Ok(left - right),
        BinaryOp::Mul => Ok(left * right),
        BinaryOp::Div if right == 0.0 => Err(ErrorKind::Div0),
        BinaryOp::Div => Ok(left / right),
        BinaryOp::Pow if left == 0.0 && right < 0.0 => Err(ErrorKind::Div0),
        _ => Ok(left.powf(right)),
    }
}

/// Wraps a numeric result, mapping non-finite numbers to `#NUM!`.
pub fn numeric(result: Result<f64, ErrorKind>) -> Value {
    match result {
        Ok(number) if number.is_finite() => Value::Number(number),
        Ok(_) => Value::Error(ErrorKind::Num),
        Err(kind) => Value::Error(kind),
    }
}

/// Computes every cell of a parsed grid.
///
/// The returned grid has the same ragged shape as `inputs`.
pub fn evaluate_grid(inputs: &[Vec<CellInput>], now: DateTime<Utc>) -> Vec<Vec<Value>> {
    let mut computed: Vec<Vec<Value>> = inputs
        .iter()
        .map(|row| {
            row.iter()
                .map(|input| match input {
                    CellInput::Literal(value) => value.clone(),
                    CellInput::Formula(_) => Value::Blank,
                    CellInput::Invalid => Value::Error(ErrorKind::Parse),
                })
                .collect()
        })
        .collect();

    let mut nodes: Vec<(CellAddr, &Expr)> = Vec::new();
    let mut node_of: HashMap<CellAddr, usize> = HashMap::new();
    for (row, cells) in inputs.iter().enumerate() {
        for (col, input) in cells.iter().enumerate() {
            if let CellInput::Formula(expr) = input {
                node_of.insert(CellAddr::new(row, col), nodes.len());
                nodes.push((CellAddr::new(row, col), expr));
            }
        }
    }

    let edges: Vec<Vec<usize>> = nodes
        .iter()
        .map(|(_, expr)| dependencies(expr, inputs, &node_of))
        .collect();

    for component in strongly_connected(&edges) {
        let cyclic = component.len() > 1 || edges[component[0]].contains(&component[0]);
        for node in component {
            let (addr, expr) = nodes[node];
            let value = if cyclic {
                Value::Error(ErrorKind::Cycle)
            } else {
                match Evaluator::new(&computed, now).eval(expr) {
                    Value::Blank => Value::Number(0.0),
                    other => other,
                }
            };
            computed[addr.row][addr.col] = value;
        }
    }

    computed
}

/// Formula nodes referenced by `expr`, restricted to the stored grid.
fn dependencies(
    expr: &Expr,
    inputs: &[Vec<CellInput>],
    node_of: &HashMap<CellAddr, usize>,
) -> Vec<usize> {
    let mut references = Vec::new();
    expr.references(&mut references);

    let mut deps = Vec::new();
    for reference in references {
        let range = match reference {
            Reference::Cell(addr) => CellRange::new(addr, addr),
            Reference::Range(range) => range,
        };
        let last_row = range.end.row.min(inputs.len().saturating_sub(1));
        if range.start.row > last_row || inputs.is_empty() {
            continue;
        }
        for row in range.start.row..=last_row {
            let width = inputs[row].len();
            if width == 0 || range.start.col >= width {
                continue;
            }
            for col in range.start.col..=range.end.col.min(width - 1) {
                if let Some(node) = node_of.get(&CellAddr::new(row, col)) {
                    deps.push(*node);
                }
            }
        }
    }
    deps.sort_unstable();
    deps.dedup();
    deps
}

/// Iterative Tarjan; components come out dependencies-first.
fn strongly_connected(edges: &[Vec<usize>]) -> Vec<Vec<usize>> {
    const UNVISITED: usize = usize::MAX;
    let count = edges.len();
    let mut index = vec![UNVISITED; count];
    let mut low = vec![0; count];
    let mut on_stack = vec![false; count];
    let mut stack = Vec::new();
    let mut next_index = 0;
    let mut components = Vec::new();

    for root in 0..count {
        if index[root] != UNVISITED {
            continue;
        }
        let mut work: Vec<(usize, usize)> = vec![(root, 0)];
        while let Some((node, edge_pos)) = work.last().copied() {
            if edge_pos == 0 && index[node] == UNVISITED {
                index[node] = next_index;
                low[node] = next_index;
                next_index += 1;
                stack.push(node);
                on_stack[node] = true;
            }

            if let Some(&next) = edges[node].get(edge_pos) {
                if let Some(top) = work.last_mut() {
                    top.1 += 1;
                }
                if index[next] == UNVISITED {
                    work.push((next, 0));
                } else if on_stack[next] {
                    low[node] = low[node].min(index[next]);
                }
                continue;
            }

            work.pop();
            if let Some(&(parent, _)) = work.last() {
                low[parent] = low[parent].min(low[node]);
            }
            if low[node] == index[node] {
                let mut component = Vec::new();
                while let Some(member) = stack.pop() {
                    on_stack[member] = false;
                    component.push(member);
                    if member == node {
                        break;
                    }
                }
                components.push(component);
            }
        }
    }

    components
}

#[cfg(test)]
mod tests {
    use super::{evaluate_grid, strongly_connected, CellInput};
    use crate::sheet::value::{ErrorKind, Value};
    use chrono::{TimeZone, Utc};

    fn run(rows: &[&[&str]]) -> Vec<Vec<Value>> {
        let inputs: Vec<Vec<CellInput>> = rows
            .iter()
            .map(|row| row.iter().map(|cell| CellInput::parse(cell)).collect())
            .collect();
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 12, 0, 0).unwrap();
        evaluate_grid(&inputs, now)
    }

    #[test]
    fn tarjan_emits_dependencies_first() {
        let components = strongly_connected(&[vec![1], vec![2], vec![]]);
        assert_eq!(components, vec![vec![2], vec![1], vec![0]]);
    }

    #[test]
    fn forward_references_evaluate_regardless_of_position() {
        let values = run(&[&["=B1*2", "=C1+1", "4"]]);
        assert_eq!(values[0][0], Value::Number(10.0));
    }

    #[test]
    fn cycle_cells_are_flagged_independent_of_order() {
        let values = run(&[&["=IFERROR(B1,5)", "=A1", "=C1", "7"]]);
        assert_eq!(values[0][0], Value::Error(ErrorKind::Cycle));
        assert_eq!(values[0][1], Value::Error(ErrorKind::Cycle));
        assert_eq!(values[0][2], Value::Error(ErrorKind::Cycle));
        assert_eq!(values[0][3], Value::Number(7.0));
    }

    #[test]
    fn blank_formula_results_render_as_zero_and_far_refs_read_blank() {
        let values = run(&[&["=Z99", "=A1+1"]]);
        assert_eq!(values[0][0], Value::Number(0.0));
        assert_eq!(values[0][1], Value::Number(1.0));
    }

    #[test]
    fn parse_failures_stay_in_their_cell() {
        let values = run(&[&["=1+", "=2*3"]]);
        assert_eq!(values[0][0], Value::Error(ErrorKind::Parse));
        assert_eq!(values[0][1], Value::Number(6.0));
    }
}
