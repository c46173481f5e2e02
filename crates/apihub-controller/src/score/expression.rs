//! Expression evaluation for score formulas.
//!
//! A small expression language over a key→value map: dotted identifier
//! paths resolve into the map, literals are integers, floats, booleans and
//! quoted strings, and the operators are `+ - * / %`, comparisons,
//! `&& || !` and unary minus. Integer arithmetic stays integral; mixing an
//! integer with a float promotes to float.

use std::fmt;

use serde_json::Map;

use crate::error::{ControllerError, ControllerResult};

/// A dynamically typed expression result.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Bool(_) => "boolean",
            Value::Str(_) => "string",
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Str(s) => write!(f, "{s}"),
        }
    }
}

/// Evaluate `expression` against a variable map decoded from an artifact
/// payload (or assembled from rollup reference ids).
pub fn evaluate(
    expression: &str,
    variables: &Map<String, serde_json::Value>,
) -> ControllerResult<Value> {
    let tokens = lex(expression)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.expression()?;
    if parser.pos != parser.tokens.len() {
        return Err(err(expression, "unexpected trailing tokens"));
    }
    eval(&expr, variables, expression)
}

fn err(expression: &str, reason: impl fmt::Display) -> ControllerError {
    ControllerError::Expression(format!("{reason} in {expression:?}"))
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    Ne,
    Le,
    Ge,
    Lt,
    Gt,
    And,
    Or,
    Not,
    LParen,
    RParen,
    Dot,
}

fn lex(input: &str) -> ControllerResult<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\r' | '\n' => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '%' => {
                tokens.push(Token::Percent);
                i += 1;
            }
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '&' => {
                if chars.get(i + 1) == Some(&'&') {
                    tokens.push(Token::And);
                    i += 2;
                } else {
                    return Err(err(input, "expected '&&'"));
                }
            }
            '|' => {
                if chars.get(i + 1) == Some(&'|') {
                    tokens.push(Token::Or);
                    i += 2;
                } else {
                    return Err(err(input, "expected '||'"));
                }
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Ne);
                    i += 2;
                } else {
                    tokens.push(Token::Not);
                    i += 1;
                }
            }
            '=' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Eq);
                    i += 2;
                } else {
                    return Err(err(input, "expected '=='"));
                }
            }
            '<' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Le);
                    i += 2;
                } else {
                    tokens.push(Token::Lt);
                    i += 1;
                }
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Ge);
                    i += 2;
                } else {
                    tokens.push(Token::Gt);
                    i += 1;
                }
            }
            '"' | '\'' => {
                let quote = c;
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && chars[end] != quote {
                    end += 1;
                }
                if end == chars.len() {
                    return Err(err(input, "unterminated string literal"));
                }
                tokens.push(Token::Str(chars[start..end].iter().collect()));
                i = end + 1;
            }
            '0'..='9' => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let is_float = i + 1 < chars.len()
                    && chars[i] == '.'
                    && chars[i + 1].is_ascii_digit();
                if is_float {
                    i += 1;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                    let raw: String = chars[start..i].iter().collect();
                    let value = raw
                        .parse::<f64>()
                        .map_err(|_| err(input, format!("invalid number {raw:?}")))?;
                    tokens.push(Token::Float(value));
                } else {
                    let raw: String = chars[start..i].iter().collect();
                    let value = raw
                        .parse::<i64>()
                        .map_err(|_| err(input, format!("invalid number {raw:?}")))?;
                    tokens.push(Token::Int(value));
                }
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || chars[i] == '_')
                {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(err(input, format!("unexpected character {other:?}"))),
        }
    }
    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(Value),
    Path(Vec<String>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn fail(&self, reason: &str) -> ControllerError {
        ControllerError::Expression(reason.to_string())
    }

    fn expression(&mut self) -> ControllerResult<Expr> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> ControllerResult<Expr> {
        let mut left = self.and_expr()?;
        while self.peek() == Some(&Token::Or) {
            self.bump();
            let right = self.and_expr()?;
            left = Expr::Binary(BinaryOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> ControllerResult<Expr> {
        let mut left = self.cmp_expr()?;
        while self.peek() == Some(&Token::And) {
            self.bump();
            let right = self.cmp_expr()?;
            left = Expr::Binary(BinaryOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn cmp_expr(&mut self) -> ControllerResult<Expr> {
        let left = self.add_expr()?;
        let op = match self.peek() {
            Some(Token::Eq) => BinaryOp::Eq,
            Some(Token::Ne) => BinaryOp::Ne,
            Some(Token::Lt) => BinaryOp::Lt,
            Some(Token::Le) => BinaryOp::Le,
            Some(Token::Gt) => BinaryOp::Gt,
            Some(Token::Ge) => BinaryOp::Ge,
            _ => return Ok(left),
        };
        self.bump();
        let right = self.add_expr()?;
        Ok(Expr::Binary(op, Box::new(left), Box::new(right)))
    }

    fn add_expr(&mut self) -> ControllerResult<Expr> {
        let mut left = self.mul_expr()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.bump();
            let right = self.mul_expr()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn mul_expr(&mut self) -> ControllerResult<Expr> {
        let mut left = self.unary_expr()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Rem,
                _ => return Ok(left),
            };
            self.bump();
            let right = self.unary_expr()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn unary_expr(&mut self) -> ControllerResult<Expr> {
        match self.peek() {
            Some(Token::Minus) => {
                self.bump();
                Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.unary_expr()?)))
            }
            Some(Token::Not) => {
                self.bump();
                Ok(Expr::Unary(UnaryOp::Not, Box::new(self.unary_expr()?)))
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> ControllerResult<Expr> {
        match self.bump() {
            Some(Token::Int(i)) => Ok(Expr::Literal(Value::Int(i))),
            Some(Token::Float(f)) => Ok(Expr::Literal(Value::Float(f))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::Str(s))),
            Some(Token::LParen) => {
                let inner = self.expression()?;
                match self.bump() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(self.fail("expected ')'")),
                }
            }
            Some(Token::Ident(first)) => {
                if first == "true" {
                    return Ok(Expr::Literal(Value::Bool(true)));
                }
                if first == "false" {
                    return Ok(Expr::Literal(Value::Bool(false)));
                }
                let mut parts = vec![first];
                while self.peek() == Some(&Token::Dot) {
                    self.bump();
                    match self.bump() {
                        Some(Token::Ident(part)) => parts.push(part),
                        _ => return Err(self.fail("expected field name after '.'")),
                    }
                }
                Ok(Expr::Path(parts))
            }
            _ => Err(self.fail("expected a value")),
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

fn eval(
    expr: &Expr,
    variables: &Map<String, serde_json::Value>,
    source: &str,
) -> ControllerResult<Value> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Path(parts) => lookup(parts, variables, source),
        Expr::Unary(UnaryOp::Neg, inner) => match eval(inner, variables, source)? {
            Value::Int(i) => Ok(Value::Int(-i)),
            Value::Float(f) => Ok(Value::Float(-f)),
            other => Err(err(source, format!("cannot negate a {}", other.kind()))),
        },
        Expr::Unary(UnaryOp::Not, inner) => match eval(inner, variables, source)? {
            Value::Bool(b) => Ok(Value::Bool(!b)),
            other => Err(err(source, format!("cannot apply '!' to a {}", other.kind()))),
        },
        Expr::Binary(BinaryOp::And, left, right) => {
            match eval(left, variables, source)? {
                Value::Bool(false) => Ok(Value::Bool(false)),
                Value::Bool(true) => match eval(right, variables, source)? {
                    Value::Bool(b) => Ok(Value::Bool(b)),
                    other => Err(err(source, format!("'&&' expects booleans, got {}", other.kind()))),
                },
                other => Err(err(source, format!("'&&' expects booleans, got {}", other.kind()))),
            }
        }
        Expr::Binary(BinaryOp::Or, left, right) => {
            match eval(left, variables, source)? {
                Value::Bool(true) => Ok(Value::Bool(true)),
                Value::Bool(false) => match eval(right, variables, source)? {
                    Value::Bool(b) => Ok(Value::Bool(b)),
                    other => Err(err(source, format!("'||' expects booleans, got {}", other.kind()))),
                },
                other => Err(err(source, format!("'||' expects booleans, got {}", other.kind()))),
            }
        }
        Expr::Binary(op, left, right) => {
            let left = eval(left, variables, source)?;
            let right = eval(right, variables, source)?;
            apply_binary(*op, left, right, source)
        }
    }
}

fn apply_binary(op: BinaryOp, left: Value, right: Value, source: &str) -> ControllerResult<Value> {
    match op {
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            arith(op, left, right, source)
        }
        BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            compare(op, left, right, source)
        }
        BinaryOp::And | BinaryOp::Or => unreachable!("handled with short-circuiting"),
    }
}

fn arith(op: BinaryOp, left: Value, right: Value, source: &str) -> ControllerResult<Value> {
    if let (Value::Int(a), Value::Int(b)) = (&left, &right) {
        let (a, b) = (*a, *b);
        return match op {
            BinaryOp::Add => Ok(Value::Int(a.wrapping_add(b))),
            BinaryOp::Sub => Ok(Value::Int(a.wrapping_sub(b))),
            BinaryOp::Mul => Ok(Value::Int(a.wrapping_mul(b))),
            BinaryOp::Div => {
                if b == 0 {
                    Err(err(source, "division by zero"))
                } else {
                    Ok(Value::Int(a / b))
                }
            }
            BinaryOp::Rem => {
                if b == 0 {
                    Err(err(source, "division by zero"))
                } else {
                    Ok(Value::Int(a % b))
                }
            }
            _ => unreachable!(),
        };
    }
    let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) else {
        return Err(err(
            source,
            format!(
                "arithmetic expects numbers, got {} and {}",
                left.kind(),
                right.kind()
            ),
        ));
    };
    match op {
        BinaryOp::Add => Ok(Value::Float(a + b)),
        BinaryOp::Sub => Ok(Value::Float(a - b)),
        BinaryOp::Mul => Ok(Value::Float(a * b)),
        BinaryOp::Div => {
            if b == 0.0 {
                Err(err(source, "division by zero"))
            } else {
                Ok(Value::Float(a / b))
            }
        }
        BinaryOp::Rem => {
            if b == 0.0 {
                Err(err(source, "division by zero"))
            } else {
                Ok(Value::Float(a % b))
            }
        }
        _ => unreachable!(),
    }
}

fn compare(op: BinaryOp, left: Value, right: Value, source: &str) -> ControllerResult<Value> {
    let ordering = match (&left, &right) {
        (Value::Str(a), Value::Str(b)) => a.cmp(b),
        (Value::Bool(a), Value::Bool(b)) => {
            return match op {
                BinaryOp::Eq => Ok(Value::Bool(a == b)),
                BinaryOp::Ne => Ok(Value::Bool(a != b)),
                _ => Err(err(source, "booleans only support '==' and '!='")),
            }
        }
        _ => {
            let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) else {
                return Err(err(
                    source,
                    format!("cannot compare {} with {}", left.kind(), right.kind()),
                ));
            };
            a.partial_cmp(&b)
                .ok_or_else(|| err(source, "cannot compare NaN"))?
        }
    };
    let result = match op {
        BinaryOp::Eq => ordering.is_eq(),
        BinaryOp::Ne => !ordering.is_eq(),
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::Le => ordering.is_le(),
        BinaryOp::Gt => ordering.is_gt(),
        BinaryOp::Ge => ordering.is_ge(),
        _ => unreachable!(),
    };
    Ok(Value::Bool(result))
}

fn lookup(
    parts: &[String],
    variables: &Map<String, serde_json::Value>,
    source: &str,
) -> ControllerResult<Value> {
    let mut current = variables
        .get(&parts[0])
        .ok_or_else(|| err(source, format!("unknown variable {:?}", parts[0])))?;
    for part in &parts[1..] {
        current = current
            .as_object()
            .and_then(|o| o.get(part))
            .ok_or_else(|| err(source, format!("unknown field {part:?}")))?;
    }
    json_to_value(current, source)
}

fn json_to_value(value: &serde_json::Value, source: &str) -> ControllerResult<Value> {
    match value {
        serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_json::Value::String(s) => Ok(Value::Str(s.clone())),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Int(i))
            } else if let Some(f) = n.as_f64() {
                Ok(Value::Float(f))
            } else {
                Err(err(source, format!("unrepresentable number {n}")))
            }
        }
        other => Err(err(
            source,
            format!("value of unsupported type at {other}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(value: serde_json::Value) -> Map<String, serde_json::Value> {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn integer_arithmetic_stays_integral() {
        let v = vars(json!({ "errors": 3, "warnings": 10 }));
        assert_eq!(evaluate("errors + warnings", &v).unwrap(), Value::Int(13));
        assert_eq!(evaluate("warnings / errors", &v).unwrap(), Value::Int(3));
        assert_eq!(evaluate("warnings % errors", &v).unwrap(), Value::Int(1));
    }

    #[test]
    fn mixed_arithmetic_promotes_to_float() {
        let v = vars(json!({ "a": 80, "b": 60 }));
        assert_eq!(
            evaluate("a*0.7 + b*0.3", &v).unwrap(),
            Value::Float(80.0 * 0.7 + 60.0 * 0.3)
        );
    }

    #[test]
    fn dotted_paths_resolve_nested_maps() {
        let v = vars(json!({ "summary": { "totals": { "errors": 7 } } }));
        assert_eq!(
            evaluate("summary.totals.errors", &v).unwrap(),
            Value::Int(7)
        );
        assert!(evaluate("summary.missing", &v).is_err());
        assert!(evaluate("absent", &v).is_err());
    }

    #[test]
    fn comparisons_and_logic() {
        let v = vars(json!({ "errors": 0, "state": "active" }));
        assert_eq!(
            evaluate("errors == 0 && state == 'active'", &v).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            evaluate("errors > 0 || state != 'active'", &v).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(evaluate("!(errors > 0)", &v).unwrap(), Value::Bool(true));
    }

    #[test]
    fn parentheses_and_unary_minus() {
        let v = vars(json!({ "x": 10 }));
        assert_eq!(evaluate("-(x - 4) * 2", &v).unwrap(), Value::Int(-12));
    }

    #[test]
    fn boolean_literals() {
        let v = vars(json!({}));
        assert_eq!(evaluate("true", &v).unwrap(), Value::Bool(true));
        assert_eq!(evaluate("true == false", &v).unwrap(), Value::Bool(false));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let v = vars(json!({ "n": 1 }));
        assert!(evaluate("n / 0", &v).is_err());
        assert!(evaluate("n / 0.0", &v).is_err());
    }

    #[test]
    fn malformed_expressions_are_rejected() {
        let v = vars(json!({}));
        assert!(evaluate("1 +", &v).is_err());
        assert!(evaluate("(1", &v).is_err());
        assert!(evaluate("1 = 2", &v).is_err());
        assert!(evaluate("'unterminated", &v).is_err());
        assert!(evaluate("1 2", &v).is_err());
    }

    #[test]
    fn type_errors_are_rejected() {
        let v = vars(json!({ "name": "x", "flag": true }));
        assert!(evaluate("name + 1", &v).is_err());
        assert!(evaluate("flag < true", &v).is_err());
        assert!(evaluate("!name", &v).is_err());
    }
}
