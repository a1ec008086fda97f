//! Formula tokenizer and recursive-descent parser.
//!
//! # Responsibility
//! - Turn formula text (without the leading `=`) into an `Expr` tree.
//!
//! # Invariants
//! - Precedence from loosest to tightest: comparison, `&`, `+ -`, `* /`,
//!   `^`, unary sign, postfix `%`.
//! - Function names are upper-cased at parse time.

use crate::sheet::address::{parse_a1, CellAddr, CellRange};
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Concat,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Text(String),
    Bool(bool),
    Ref(CellAddr),
    Range(CellRange),
    /// Identifier that is neither a reference nor a call.
    Name(String),
    Negate(Box<Expr>),
    Percent(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Collects every cell and range referenced by this expression.
    pub fn references(&self, out: &mut Vec<Reference>) {
        match self {
            Expr::Ref(addr) => out.push(Reference::Cell(*addr)),
            Expr::Range(range) => out.push(Reference::Range(*range)),
            Expr::Negate(inner) | Expr::Percent(inner) => inner.references(out),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.references(out);
                rhs.references(out);
            }
            Expr::Call { args, .. } => args.iter().for_each(|arg| arg.references(out)),
            Expr::Number(_) | Expr::Text(_) | Expr::Bool(_) | Expr::Name(_) => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference {
    Cell(CellAddr),
    Range(CellRange),
}

/// Formula syntax error with byte offset into the formula body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at offset {}", self.message, self.position)
    }
}

impl Error for ParseError {}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Text(String),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
    Comma,
    Colon,
}

/// Deepest nesting of parentheses, calls and unary signs in one formula.
pub const MAX_NESTING_DEPTH: usize = 64;
/// Longest accepted formula in tokens; also bounds the depth of operator chains.
pub const MAX_FORMULA_TOKENS: usize = 1024;

/// Parses a formula body such as `SUM(A1:A3)*2`.
pub fn parse_formula(body: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(body)?;
    if tokens.len() > MAX_FORMULA_TOKENS {
        let position = tokens
            .get(MAX_FORMULA_TOKENS)
            .map(|(_, position)| *position)
            .unwrap_or(0);
        return Err(ParseError::new("formula too long", position));
    }
    let mut parser = Parser {
        tokens,
        cursor: 0,
        depth: 0,
    };
    if parser.tokens.is_empty() {
        return Err(ParseError::new("empty formula", 0));
    }
    let expr = parser.comparison()?;
    match parser.peek() {
        None => Ok(expr),
        Some((_, position)) => Err(ParseError::new("unexpected trailing input", position)),
    }
}

fn tokenize(body: &str) -> Result<Vec<(Token, usize)>, ParseError> {
    let chars: Vec<(usize, char)> = body.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (position, ch) = chars[i];
        if ch.is_whitespace() {
            i += 1;
            continue;
        }

        if ch.is_ascii_digit() || (ch == '.' && chars.get(i + 1).is_some_and(|(_, c)| c.is_ascii_digit())) {
            let start = i;
            while i < chars.len() && (chars[i].1.is_ascii_digit() || chars[i].1 == '.') {
                i += 1;
            }
            if i < chars.len() && matches!(chars[i].1, 'e' | 'E') {
                let mut j = i + 1;
                if j < chars.len() && matches!(chars[j].1, '+' | '-') {
                    j += 1;
                }
                if j < chars.len() && chars[j].1.is_ascii_digit() {
                    i = j;
                    while i < chars.len() && chars[i].1.is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            let text: String = chars[start..i].iter().map(|(_, c)| c).collect();
            let number = text
                .parse::<f64>()
                .map_err(|_| ParseError::new(format!("invalid number `{text}`"), position))?;
            tokens.push((Token::Number(number), position));
            continue;
        }

        if ch == '"' {
            let mut text = String::new();
            i += 1;
            loop {
                match chars.get(i) {
                    None => return Err(ParseError::new("unterminated string", position)),
                    Some((_, '"')) if chars.get(i + 1).is_some_and(|(_, c)| *c == '"') => {
                        text.push('"');
                        i += 2;
                    }
                    Some((_, '"')) => {
                        i += 1;
                        break;
                    }
                    Some((_, c)) => {
                        text.push(*c);
                        i += 1;
                    }
                }
            }
            tokens.push((Token::Text(text), position));
            continue;
        }

        if ch.is_alphabetic() || ch == '_' || ch == '$' {
            let start = i;
            while i < chars.len()
                && (chars[i].1.is_alphanumeric() || matches!(chars[i].1, '_' | '$' | '.'))
            {
                i += 1;
            }
            let ident: String = chars[start..i].iter().map(|(_, c)| c).collect();
            tokens.push((Token::Ident(ident), position));
            continue;
        }

        let next = chars.get(i + 1).map(|(_, c)| *c);
        let (token, width) = match (ch, next) {
            ('<', Some('=')) => (Token::Op("<="), 2),
            ('>', Some('=')) => (Token::Op(">="), 2),
            ('<', Some('>')) => (Token::Op("<>"), 2),
            ('<', _) => (Token::Op("<"), 1),
            ('>', _) => (Token::Op(">"), 1),
            ('=', _) => (Token::Op("="), 1),
            ('+', _) => (Token::Op("+"), 1),
            ('-', _) => (Token::Op("-"), 1),
            ('*', _) => (Token::Op("*"), 1),
            ('/', _) => (Token::Op("/"), 1),
            ('^', _) => (Token::Op("^"), 1),
            ('&', _) => (Token::Op("&"), 1),
            ('%', _) => (Token::Op("%"), 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            (',', _) => (Token::Comma, 1),
            (':', _) => (Token::Colon, 1),
            _ => {
                return Err(ParseError::new(
                    format!("unexpected character `{ch}`"),
                    position,
                ))
            }
        };
        tokens.push((token, position));
        i += width;
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    cursor: usize,
    depth: usize,
}

impl Parser {
    /// Runs `step` one nesting level deeper, failing past `MAX_NESTING_DEPTH`.
    fn nested<T>(
        &mut self,
        position: usize,
        step: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(ParseError::new("formula nested too deeply", position));
        }
        self.depth += 1;
        let result = step(self);
        self.depth -= 1;
        result
    }

    fn peek(&self) -> Option<(&Token, usize)> {
        self.tokens
            .get(self.cursor)
            .map(|(token, position)| (token, *position))
    }

    fn end_position(&self) -> usize {
        self.tokens.last().map(|(_, position)| position + 1).unwrap_or(0)
    }

    fn advance(&mut self) -> Option<(Token, usize)> {
        let token = self.tokens.get(self.cursor).cloned();
        if token.is_some() {
            self.cursor += 1;
        }
        token
    }

    fn eat_op(&mut self, ops: &[&'static str]) -> Option<&'static str> {
        match self.peek() {
            Some((Token::Op(op), _)) if ops.contains(op) => {
                let op = *op;
                self.cursor += 1;
                Some(op)
            }
            _ => None,
        }
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.concat()?;
        while let Some(op) = self.eat_op(&["=", "<>", "<", ">", "<=", ">="]) {
            let rhs = self.concat()?;
            let op = match op {
                "=" => BinaryOp::Eq,
                "<>" => BinaryOp::Ne,
                "<" => BinaryOp::Lt,
                ">" => BinaryOp::Gt,
                "<=" => BinaryOp::Le,
                _ => BinaryOp::Ge,
            };
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn concat(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.additive()?;
        while self.eat_op(&["&"]).is_some() {
            let rhs = self.additive()?;
            lhs = binary(BinaryOp::Concat, lhs, rhs);
        }
        Ok(lhs)
    }

    fn additive(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.multiplicative()?;
        while let Some(op) = self.eat_op(&["+", "-"]) {
            let rhs = self.multiplicative()?;
            let op = if op == "+" { BinaryOp::Add } else { BinaryOp::Sub };
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.power()?;
        while let Some(op) = self.eat_op(&["*", "/"]) {
            let rhs = self.power()?;
            let op = if op == "*" { BinaryOp::Mul } else { BinaryOp::Div };
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn power(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.unary()?;
        while self.eat_op(&["^"]).is_some() {
            let rhs = self.unary()?;
            lhs = binary(BinaryOp::Pow, lhs, rhs);
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        let position = self.peek().map(|(_, position)| position).unwrap_or(0);
        match self.eat_op(&["+", "-"]) {
            Some("-") => {
                let inner = self.nested(position, Self::unary)?;
                Ok(Expr::Negate(Box::new(inner)))
            }
            Some(_) => self.nested(position, Self::unary),
            None => self.postfix(),
        }
    }

    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;
        while self.eat_op(&["%"]).is_some() {
            expr = Expr::Percent(Box::new(expr));
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let end = self.end_position();
        let Some((token, position)) = self.advance() else {
            return Err(ParseError::new("unexpected end of formula", end));
        };
        match token {
            Token::Number(number) => Ok(Expr::Number(number)),
            Token::Text(text) => Ok(Expr::Text(text)),
            Token::LParen => {
                let inner = self.nested(position, Self::comparison)?;
                match self.advance() {
                    Some((Token::RParen, _)) => Ok(inner),
                    Some((_, position)) => Err(ParseError::new("expected `)`", position)),
                    None => Err(ParseError::new("expected `)`", end)),
                }
            }
            Token::Ident(ident) => self.identifier(ident, position),
            _ => Err(ParseError::new("unexpected token", position)),
        }
    }

    fn identifier(&mut self, ident: String, position: usize) -> Result<Expr, ParseError> {
        if matches!(self.peek(), Some((Token::LParen, _))) {
            self.cursor += 1;
            let args = self.nested(position, Self::arguments)?;
            return Ok(Expr::Call {
                name: ident.to_ascii_uppercase(),
                args,
            });
        }

        if ident.eq_ignore_ascii_case("TRUE") {
            return Ok(Expr::Bool(true));
        }
        if ident.eq_ignore_ascii_case("FALSE") {
            return Ok(Expr::Bool(false));
        }

        let Some(start) = parse_a1(&ident) else {
            if ident.contains('$') {
                return Err(ParseError::new(format!("invalid reference `{ident}`"), position));
            }
            return Ok(Expr::Name(ident));
        };

        if matches!(self.peek(), Some((Token::Colon, _))) {
            self.cursor += 1;
            let end = match self.advance() {
                Some((Token::Ident(text), end_position)) => parse_a1(&text).ok_or_else(|| {
                    ParseError::new(format!("invalid range end `{text}`"), end_position)
                })?,
                Some((_, end_position)) => {
                    return Err(ParseError::new("expected range end", end_position))
                }
                None => return Err(ParseError::new("expected range end", self.end_position())),
            };
            return Ok(Expr::Range(CellRange::new(start, end)));
        }

        Ok(Expr::Ref(start))
    }

    fn arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if matches!(self.peek(), Some((Token::RParen, _))) {
            self.cursor += 1;
            return Ok(args);
        }
        loop {
            args.push(self.comparison()?);
            match self.advance() {
                Some((Token::Comma, _)) => continue,
                Some((Token::RParen, _)) => return Ok(args),
                Some((_, position)) => {
                    return Err(ParseError::new("expected `,` or `)`", position))
                }
                None => return Err(ParseError::new("unclosed function call", self.end_position())),
            }
        }
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_formula, BinaryOp, Expr, MAX_FORMULA_TOKENS, MAX_NESTING_DEPTH};
    use crate::sheet::address::{CellAddr, CellRange};

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let expr = parse_formula("A2+B2*2").expect("formula should parse");
        match expr {
            Expr::Binary {
                op: BinaryOp::Add,
                rhs,
                ..
            } => assert!(matches!(*rhs, Expr::Binary { op: BinaryOp::Mul, .. })),
            other => panic!("unexpected tree: {other:?}"),
        }
    }

    #[test]
    fn parses_calls_ranges_and_lowercase_names() {
        let expr = parse_formula("sum(B3:A1, 4)").expect("formula should parse");
        assert_eq!(
            expr,
            Expr::Call {
                name: "SUM".to_string(),
                args: vec![
                    Expr::Range(CellRange::new(CellAddr::new(0, 0), CellAddr::new(2, 1))),
                    Expr::Number(4.0),
                ],
            }
        );
    }

    #[test]
    fn string_literals_unescape_doubled_quotes() {
        assert_eq!(
            parse_formula(r#""say ""hi""""#),
            Ok(Expr::Text(r#"say "hi""#.to_string()))
        );
    }

    #[test]
    fn unary_minus_binds_tighter_than_power() {
        let expr = parse_formula("-2^2").expect("formula should parse");
        assert!(matches!(expr, Expr::Binary { op: BinaryOp::Pow, .. }));
    }

    #[test]
    fn reports_syntax_errors() {
        assert!(parse_formula("").is_err());
        assert!(parse_formula("SUM(A1").is_err());
        assert!(parse_formula("1+").is_err());
        assert!(parse_formula("A1 A2").is_err());
        assert!(parse_formula("\"open").is_err());
        assert!(parse_formula("A1:").is_err());
    }

    #[test]
    fn nesting_is_bounded() {
        let at_limit = format!(
            "{}1{}",
            "(".repeat(MAX_NESTING_DEPTH),
            ")".repeat(MAX_NESTING_DEPTH)
        );
        assert_eq!(parse_formula(&at_limit), Ok(Expr::Number(1.0)));

        let too_deep = format!(
            "{}1{}",
            "(".repeat(MAX_NESTING_DEPTH + 1),
            ")".repeat(MAX_NESTING_DEPTH + 1)
        );
        let err = parse_formula(&too_deep).expect_err("nesting past the limit must fail");
        assert_eq!(err.message, "formula nested too deeply");

        let calls = format!(
            "{}1{}",
            "ABS(".repeat(MAX_NESTING_DEPTH + 1),
            ")".repeat(MAX_NESTING_DEPTH + 1)
        );
        assert!(parse_formula(&calls).is_err());
        assert!(parse_formula(&format!("{}1", "-".repeat(MAX_NESTING_DEPTH + 1))).is_err());
        assert!(parse_formula(&format!("{}1", "-".repeat(MAX_NESTING_DEPTH))).is_ok());
    }

    #[test]
    fn overlong_formulas_are_rejected_before_parsing() {
        let chain = vec!["1"; MAX_FORMULA_TOKENS / 2 + 1].join("+");
        let err = parse_formula(&chain).expect_err("overlong formula must fail");
        assert_eq!(err.message, "formula too long");

        let fits = vec!["1"; MAX_FORMULA_TOKENS / 2].join("+");
        assert!(parse_formula(&fits).is_ok());
    }
}
