//! A parser and evaluator for the CEL subset used in conditions.
//!
//! Supported syntax:
//! - identifiers, field selection (`resource.labels`) and indexing (`m["k"]`)
//! - literals: strings (`"x"`, `'x'`), integers, doubles, `true`, `false`, `null`
//! - lists (`["a", "b"]`)
//! - `!`, unary `-`, `==`, `!=`, `<`, `<=`, `>`, `>=`, `in`, `&&`, `||`
//! - method and global calls (`name.startsWith("a")`, `size(list)`)
//!
//! Operators become [`Expr::Call`] nodes named after CEL's overloads
//! (`_==_`, `_&&_`, `!_`, `@in`, `_[_]`), matching the tree the server
//! returns from `parseExpression`.

use std::cmp::Ordering;
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::BytebaseError;

/// Maximum depth of the parsed tree. Counts parentheses, unary operators
/// and every `||`, `&&`, select, index or method call node built.
const MAX_DEPTH: usize = 64;

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Expr {
    Ident(String),
    Select {
        operand: Box<Expr>,
        field: String,
    },
    Literal(Literal),
    List(Vec<Expr>),
    Call {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<Box<Expr>>,
        function: String,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
}

impl Expr {
    fn call(function: &str, args: Vec<Expr>) -> Self {
        Self::Call {
            target: None,
            function: function.to_owned(),
            args,
        }
    }
}

/// Parse `input`, failing with `InvalidExpression` and a diagnostic.
///
/// # Errors
/// Returns [`BytebaseError::InvalidExpression`] for any syntax error.
pub fn parse(input: &str) -> Result<Expr, BytebaseError> {
    parse_inner(input).map_err(|e| BytebaseError::invalid_expression(e.to_string()))
}

fn parse_inner(input: &str) -> Result<Expr, SyntaxError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    if parser.at_end() {
        return Err(SyntaxError::new(1, "empty expression"));
    }
    let expr = parser.expr()?;
    if !parser.at_end() {
        let (column, token) = parser.peek_full();
        return Err(SyntaxError::new(
            column,
            format!("unexpected {token} after end of expression"),
        ));
    }
    Ok(expr)
}

#[derive(Debug, Clone, PartialEq)]
struct SyntaxError {
    column: usize,
    message: String,
}

impl SyntaxError {
    fn new(column: usize, message: impl Into<String>) -> Self {
        Self {
            column,
            message: message.into(),
        }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "syntax error at column {}: {}", self.column, self.message)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Int(i64),
    Double(f64),
    Str(String),
    Punct(&'static str),
    End,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ident(s) => write!(f, "identifier '{s}'"),
            Self::Int(i) => write!(f, "integer {i}"),
            Self::Double(d) => write!(f, "number {d}"),
            Self::Str(s) => write!(f, "string \"{s}\""),
            Self::Punct(p) => write!(f, "'{p}'"),
            Self::End => f.write_str("end of input"),
        }
    }
}

static END_TOKEN: Token = Token::End;

const PUNCTS: [&str; 16] = [
    "==", "!=", "<=", ">=", "&&", "||", "<", ">", "!", "-", "(", ")", "[", "]", ",", ".",
];

fn tokenize(input: &str) -> Result<Vec<(usize, Token)>, SyntaxError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let column = i + 1;
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push((column, Token::Ident(chars[start..i].iter().collect())));
        } else if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let is_double =
                i + 1 < chars.len() && chars[i] == '.' && chars[i + 1].is_ascii_digit();
            if is_double {
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            let text: String = chars[start..i].iter().collect();
            let token = if is_double {
                text.parse()
                    .map(Token::Double)
                    .map_err(|_| SyntaxError::new(column, format!("invalid number '{text}'")))?
            } else {
                text.parse()
                    .map(Token::Int)
                    .map_err(|_| SyntaxError::new(column, format!("integer '{text}' overflows")))?
            };
            tokens.push((column, token));
        } else if c == '"' || c == '\'' {
            let (literal, next) = string_literal(&chars, i)?;
            tokens.push((column, Token::Str(literal)));
            i = next;
        } else {
            let rest: String = chars[i..chars.len().min(i + 2)].iter().collect();
            let punct = PUNCTS
                .iter()
                .find(|p| rest.starts_with(**p))
                .copied()
                .ok_or_else(|| SyntaxError::new(column, format!("unexpected character '{c}'")))?;
            tokens.push((column, Token::Punct(punct)));
            i += punct.len();
        }
    }
    tokens.push((chars.len() + 1, Token::End));
    Ok(tokens)
}

fn string_literal(chars: &[char], start: usize) -> Result<(String, usize), SyntaxError> {
    let quote = chars[start];
    let mut out = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            c if c == quote => return Ok((out, i + 1)),
            '\\' => {
                let escaped = chars
                    .get(i + 1)
                    .ok_or_else(|| SyntaxError::new(i + 1, "unterminated escape"))?;
                out.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '\\' | '"' | '\'' => *escaped,
                    other => {
                        return Err(SyntaxError::new(
                            i + 2,
                            format!("unknown escape '\\{other}'"),
                        ));
                    }
                });
                i += 2;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    Err(SyntaxError::new(start + 1, "unterminated string literal"))
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).map_or(&END_TOKEN, |(_, t)| t)
    }

    fn peek_full(&self) -> (usize, &Token) {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or((1, &END_TOKEN), |(c, t)| (*c, t))
    }

    fn at_end(&self) -> bool {
        *self.peek() == Token::End
    }

    fn advance(&mut self) -> (usize, Token) {
        let item = self
            .tokens
            .get(self.pos)
            .cloned()
            .unwrap_or((0, Token::End));
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        item
    }

    fn eat(&mut self, punct: &str) -> bool {
        if matches!(self.peek(), Token::Punct(p) if *p == punct) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, punct: &str) -> Result<(), SyntaxError> {
        if self.eat(punct) {
            Ok(())
        } else {
            let (column, token) = self.peek_full();
            Err(SyntaxError::new(
                column,
                format!("expected '{punct}', found {token}"),
            ))
        }
    }

    fn enter(&mut self) -> Result<(), SyntaxError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            let (column, _) = self.peek_full();
            return Err(SyntaxError::new(
                column,
                format!("expression nesting exceeds maximum depth of {MAX_DEPTH}"),
            ));
        }
        Ok(())
    }

    fn expr(&mut self) -> Result<Expr, SyntaxError> {
        self.enter()?;
        let result = self.or();
        self.depth -= 1;
        result
    }

    fn or(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.and()?;
        let mut levels = 0;
        while self.eat("||") {
            self.enter()?;
            levels += 1;
            let right = self.and()?;
            left = Expr::call("_||_", vec![left, right]);
        }
        self.depth -= levels;
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.relation()?;
        let mut levels = 0;
        while self.eat("&&") {
            self.enter()?;
            levels += 1;
            let right = self.relation()?;
            left = Expr::call("_&&_", vec![left, right]);
        }
        self.depth -= levels;
        Ok(left)
    }

    fn relation(&mut self) -> Result<Expr, SyntaxError> {
        let left = self.unary()?;
        let function = match self.peek() {
            Token::Punct("==") => "_==_",
            Token::Punct("!=") => "_!=_",
            Token::Punct("<") => "_<_",
            Token::Punct("<=") => "_<=_",
            Token::Punct(">") => "_>_",
            Token::Punct(">=") => "_>=_",
            Token::Ident(id) if id == "in" => "@in",
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.unary()?;
        Ok(Expr::call(function, vec![left, right]))
    }

    fn unary(&mut self) -> Result<Expr, SyntaxError> {
        let function = if self.eat("!") {
            "!_"
        } else if self.eat("-") {
            "-_"
        } else {
            return self.member();
        };
        self.enter()?;
        let operand = self.unary();
        self.depth -= 1;
        Ok(Expr::call(function, vec![operand?]))
    }

    fn member(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.primary()?;
        let mut levels = 0;
        loop {
            if !matches!(self.peek(), Token::Punct("." | "[")) {
                self.depth -= levels;
                return Ok(expr);
            }
            self.enter()?;
            levels += 1;
            if self.eat(".") {
                let (column, token) = self.advance();
                let Token::Ident(field) = token else {
                    return Err(SyntaxError::new(
                        column,
                        format!("expected identifier after '.', found {token}"),
                    ));
                };
                if self.eat("(") {
                    let args = self.args(")")?;
                    expr = Expr::Call {
                        target: Some(Box::new(expr)),
                        function: field,
                        args,
                    };
                } else {
                    expr = Expr::Select {
                        operand: Box::new(expr),
                        field,
                    };
                }
            } else if self.eat("[") {
                let index = self.expr()?;
                self.expect("]")?;
                expr = Expr::call("_[_]", vec![expr, index]);
            }
        }
    }

    fn args(&mut self, close: &str) -> Result<Vec<Expr>, SyntaxError> {
        let mut args = Vec::new();
        if self.eat(close) {
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            if self.eat(close) {
                return Ok(args);
            }
            self.expect(",")?;
        }
    }

    fn primary(&mut self) -> Result<Expr, SyntaxError> {
        let (column, token) = self.advance();
        match token {
            Token::Ident(name) => {
                let literal = match name.as_str() {
                    "true" => Some(Literal::Bool(true)),
                    "false" => Some(Literal::Bool(false)),
                    "null" => Some(Literal::Null),
                    "in" => return Err(SyntaxError::new(column, "unexpected keyword 'in'")),
                    _ => None,
                };
                if let Some(literal) = literal {
                    Ok(Expr::Literal(literal))
                } else if self.eat("(") {
                    Ok(Expr::Call {
                        target: None,
                        function: name,
                        args: self.args(")")?,
                    })
                } else {
                    Ok(Expr::Ident(name))
                }
            }
            Token::Int(i) => Ok(Expr::Literal(Literal::Int(i))),
            Token::Double(d) => Ok(Expr::Literal(Literal::Double(d))),
            Token::Str(s) => Ok(Expr::Literal(Literal::String(s))),
            Token::Punct("(") => {
                let inner = self.expr()?;
                self.expect(")")?;
                Ok(inner)
            }
            Token::Punct("[") => Ok(Expr::List(self.args("]")?)),
            other => Err(SyntaxError::new(column, format!("unexpected {other}"))),
        }
    }
}

/// Evaluate `expr` against the variables in `activation`.
///
/// # Errors
/// Returns `InvalidArgument` on an undeclared variable, a missing key, an
/// unknown function or a type mismatch.
pub fn evaluate(expr: &Expr, activation: &Map<String, Value>) -> Result<Value, BytebaseError> {
    match expr {
        Expr::Ident(name) => activation.get(name).cloned().ok_or_else(|| {
            BytebaseError::invalid_argument(format!("undeclared reference to '{name}'"))
        }),
        Expr::Select { operand, field } => match evaluate(operand, activation)? {
            Value::Object(mut map) => map
                .remove(field)
                .ok_or_else(|| BytebaseError::invalid_argument(format!("no such key: {field}"))),
            other => Err(type_error(&format!(".{field}"), &other)),
        },
        Expr::Literal(lit) => Ok(match lit {
            Literal::Null => Value::Null,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Int(i) => Value::from(*i),
            Literal::Double(d) => Value::from(*d),
            Literal::String(s) => Value::String(s.clone()),
        }),
        Expr::List(items) => items
            .iter()
            .map(|e| evaluate(e, activation))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Expr::Call {
            target,
            function,
            args,
        } => evaluate_call(target.as_deref(), function, args, activation),
    }
}

/// Evaluate `expr` and require a boolean result.
///
/// # Errors
/// Same as [`evaluate`], plus a type error for a non-boolean result.
pub fn evaluate_bool(expr: &Expr, activation: &Map<String, Value>) -> Result<bool, BytebaseError> {
    as_bool("condition", &evaluate(expr, activation)?)
}

fn evaluate_call(
    target: Option<&Expr>,
    function: &str,
    args: &[Expr],
    activation: &Map<String, Value>,
) -> Result<Value, BytebaseError> {
    match (function, target, args) {
        ("_&&_", None, [l, r]) => {
            Ok(Value::Bool(evaluate_bool(l, activation)? && evaluate_bool(r, activation)?))
        }
        ("_||_", None, [l, r]) => {
            Ok(Value::Bool(evaluate_bool(l, activation)? || evaluate_bool(r, activation)?))
        }
        ("!_", None, [operand]) => Ok(Value::Bool(!evaluate_bool(operand, activation)?)),
        ("-_", None, [operand]) => match evaluate(operand, activation)? {
            Value::Number(n) => n
                .as_i64()
                .and_then(i64::checked_neg)
                .map(Value::from)
                .or_else(|| n.as_f64().map(|f| Value::from(-f)))
                .ok_or_else(|| BytebaseError::invalid_argument("numeric overflow")),
            other => Err(type_error("-", &other)),
        },
        ("_==_" | "_!=_" | "_<_" | "_<=_" | "_>_" | "_>=_" | "@in" | "_[_]", None, [l, r]) => {
            let l = evaluate(l, activation)?;
            let r = evaluate(r, activation)?;
            binary(function, &l, &r)
        }
        ("size", None, [arg]) => size(&evaluate(arg, activation)?),
        ("size", Some(t), []) => size(&evaluate(t, activation)?),
        ("startsWith" | "endsWith" | "contains" | "matches", Some(t), [arg]) => {
            let receiver = evaluate(t, activation)?;
            let arg = evaluate(arg, activation)?;
            let (Value::String(s), Value::String(a)) = (&receiver, &arg) else {
                return Err(type_error(function, &receiver));
            };
            Ok(Value::Bool(match function {
                "startsWith" => s.starts_with(a.as_str()),
                "endsWith" => s.ends_with(a.as_str()),
                "contains" => s.contains(a.as_str()),
                _ => Regex::new(a)
                    .map_err(|e| BytebaseError::invalid_argument(format!("bad regex: {e}")))?
                    .is_match(s),
            }))
        }
        _ => Err(BytebaseError::invalid_argument(format!(
            "unknown function '{function}' with {} argument(s)",
            args.len()
        ))),
    }
}

fn binary(function: &str, l: &Value, r: &Value) -> Result<Value, BytebaseError> {
    let ordered = |accept: fn(Ordering) -> bool| {
        compare(l, r)
            .map(|o| Value::Bool(accept(o)))
            .ok_or_else(|| type_error(function, l))
    };
    match function {
        "_==_" => Ok(Value::Bool(values_equal(l, r))),
        "_!=_" => Ok(Value::Bool(!values_equal(l, r))),
        "_<_" => ordered(Ordering::is_lt),
        "_<=_" => ordered(Ordering::is_le),
        "_>_" => ordered(Ordering::is_gt),
        "_>=_" => ordered(Ordering::is_ge),
        "@in" => match r {
            Value::Array(items) => Ok(Value::Bool(items.iter().any(|i| values_equal(l, i)))),
            Value::Object(map) => match l {
                Value::String(key) => Ok(Value::Bool(map.contains_key(key))),
                other => Err(type_error("in", other)),
            },
            other => Err(type_error("in", other)),
        },
        _ => match (l, r) {
            (Value::Object(map), Value::String(key)) => map
                .get(key)
                .cloned()
                .ok_or_else(|| BytebaseError::invalid_argument(format!("no such key: {key}"))),
            (Value::Array(items), Value::Number(n)) => n
                .as_u64()
                .and_then(|i| usize::try_from(i).ok())
                .and_then(|i| items.get(i))
                .cloned()
                .ok_or_else(|| BytebaseError::invalid_argument(format!("index {n} out of range"))),
            (other, _) => Err(type_error("[]", other)),
        },
    }
}

fn size(value: &Value) -> Result<Value, BytebaseError> {
    let n = match value {
        Value::String(s) => s.chars().count(),
        Value::Array(a) => a.len(),
        Value::Object(m) => m.len(),
        other => return Err(type_error("size", other)),
    };
    Ok(Value::from(n))
}

fn values_equal(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Number(_), Value::Number(_)) => compare(l, r) == Some(Ordering::Equal),
        _ => l == r,
    }
}

fn compare(l: &Value, r: &Value) -> Option<Ordering> {
    match (l, r) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
        },
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn as_bool(op: &str, value: &Value) -> Result<bool, BytebaseError> {
    value.as_bool().ok_or_else(|| type_error(op, value))
}

fn type_error(op: &str, value: &Value) -> BytebaseError {
    let kind = match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    };
    BytebaseError::invalid_argument(format!("no matching overload for '{op}' on {kind}"))
}
