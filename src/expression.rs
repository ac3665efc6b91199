//! Expressions embedded in templates (`{{ $x }}`, `:if="..."`,
//! `:foreach="..."`, `:attr="..."`) are evaluated through the
//! `Evaluator` trait. `ExpressionEvaluator` is the default
//! implementation, a small PHP-flavoured language:
//!
//! ```text
//! $item->title ?? 'untitled'
//! count($this->items) > 0 && !$this->hidden
//! $user?->name ~ ' (' ~ strtoupper($role) ~ ')'
//! $loop['index'] + 1
//! ```
//!
//! Unknown variables, properties and indices evaluate to `null`.

use std::collections::BTreeMap;

use kstring::KString;
use serde_json::{Map, Number, Value};
use thiserror::Error;

/// Render-local bindings (loop variables and the like).
pub type Data = BTreeMap<KString, Value>;

/// What an expression can see: `$this` (the view's data) and the
/// bindings of the element being rendered.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'s> {
    pub this: Option<&'s Map<String, Value>>,
    pub locals: &'s Data,
}

impl<'s> Scope<'s> {
    pub fn new(this: Option<&'s Map<String, Value>>, locals: &'s Data) -> Self {
        Scope { this, locals }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("syntax error at offset {offset}: {message}")]
    Syntax {
        offset: usize,
        message: String,
    },
    #[error("type error: {0}")]
    Type(String),
    #[error("unknown function {0:?}")]
    UnknownFunction(String),
}

fn syntax_error<T>(offset: usize, message: impl Into<String>) -> Result<T, EvalError> {
    Err(EvalError::Syntax { offset, message: message.into() })
}

fn type_error<T>(message: impl Into<String>) -> Result<T, EvalError> {
    Err(EvalError::Type(message.into()))
}

pub trait Evaluator: Send + Sync {
    fn eval(&self, expr: &str, scope: &Scope) -> Result<Value, EvalError>;
}


/// PHP truthiness.
pub fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !(s.is_empty() || s == "0"),
        Value::Array(a) => !a.is_empty(),
        Value::Object(m) => !m.is_empty(),
    }
}

/// The string form of a value as it appears in rendered output:
/// `null` and `false` are empty, `true` is "1", compound values are
/// printed as JSON.
pub fn value_to_string(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::Bool(true) => "1".into(),
        Value::Bool(false) => String::new(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => v.to_string(),
    }
}


// ---- Lexer ------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Var(String),
    Ident(String),
    Str(String),
    Num(Value),
    Op(&'static str),
    Eof,
}

// Longest first
const OPS: &[&str] = &[
    "===", "!==", "?->",
    "==", "!=", "<=", ">=", "&&", "||", "??", "->",
    "<", ">", "!", "-", "+", "*", "/", "%", "~", "?", ":",
    "(", ")", "[", "]", ",",
];

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn lex_number(s: &str, start: usize) -> Result<(Value, usize), EvalError> {
    let bytes = s.as_bytes();
    let mut i = start;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let mut is_float = false;
    if i + 1 < bytes.len() && bytes[i] == b'.' && bytes[i + 1].is_ascii_digit() {
        is_float = true;
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
    }
    let text = &s[start..i];
    if !is_float {
        if let Ok(n) = text.parse::<i64>() {
            return Ok((Value::Number(n.into()), i))
        }
    }
    match text.parse::<f64>().ok().and_then(Number::from_f64) {
        Some(n) => Ok((Value::Number(n), i)),
        None => syntax_error(start, format!("invalid number {text:?}"))
    }
}

fn lex_string(s: &str, start: usize) -> Result<(String, usize), EvalError> {
    let quote = s.as_bytes()[start] as char;
    let mut out = String::new();
    let mut chars = s[start + 1..].char_indices();
    while let Some((i, c)) = chars.next() {
        if c == quote {
            return Ok((out, start + 1 + i + 1))
        }
        if c == '\\' {
            match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, c)) => out.push(c),
                None => break
            }
        } else {
            out.push(c);
        }
    }
    syntax_error(start, "unterminated string literal")
}

fn tokenize(s: &str) -> Result<Vec<(Tok, usize)>, EvalError> {
    let bytes = s.as_bytes();
    let mut toks = Vec::new();
    let mut i = 0;
    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            toks.push((Tok::Eof, i));
            return Ok(toks)
        }
        let b = bytes[i];
        let start = i;
        if b == b'$' {
            i += 1;
            while i < bytes.len() && is_ident_char(bytes[i]) {
                i += 1;
            }
            if i == start + 1 {
                return syntax_error(start, "expecting variable name after '$'")
            }
            toks.push((Tok::Var(s[start + 1..i].into()), start));
        } else if is_ident_start(b) {
            while i < bytes.len() && is_ident_char(bytes[i]) {
                i += 1;
            }
            toks.push((Tok::Ident(s[start..i].into()), start));
        } else if b.is_ascii_digit() {
            let (n, end) = lex_number(s, start)?;
            toks.push((Tok::Num(n), start));
            i = end;
        } else if b == b'\'' || b == b'"' {
            let (string, end) = lex_string(s, start)?;
            toks.push((Tok::Str(string), start));
            i = end;
        } else if let Some(op) = OPS.iter().find(|op| s[i..].starts_with(*op)) {
            toks.push((Tok::Op(*op), start));
            i += op.len();
        } else {
            let c = s[i..].chars().next().unwrap_or('?');
            return syntax_error(start, format!("unexpected character {c:?}"))
        }
    }
}


// ---- Parser -----------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Eq, Ne, Identical, NotIdentical,
    Lt, Le, Gt, Ge,
    Concat,
    Add, Sub, Mul, Div, Rem,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Lit(Value),
    Var(String),
    Array(Vec<Expr>),
    /// `->` and `?->`; both yield null on a missing base.
    Prop(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Coalesce(Box<Expr>, Box<Expr>),
    /// `then` is None for `a ?: b`.
    Ternary(Box<Expr>, Option<Box<Expr>>, Box<Expr>),
}

struct Parser {
    toks: Vec<(Tok, usize)>,
    i: usize,
}

impl Parser {
    fn peek(&self) -> &Tok {
        &self.toks[self.i.min(self.toks.len() - 1)].0
    }

    fn offset(&self) -> usize {
        self.toks[self.i.min(self.toks.len() - 1)].1
    }

    fn advance(&mut self) -> Tok {
        let t = self.peek().clone();
        if self.i < self.toks.len() - 1 {
            self.i += 1;
        }
        t
    }

    fn is_op(&self, op: &str) -> bool {
        matches!(self.peek(), Tok::Op(o) if *o == op)
    }

    /// Keywords are case-insensitive, as in PHP.
    fn is_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Tok::Ident(s) if s.eq_ignore_ascii_case(kw))
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if self.is_op(op) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_op(&mut self, op: &str) -> Result<(), EvalError> {
        if self.eat_op(op) {
            Ok(())
        } else {
            syntax_error(self.offset(), format!("expecting '{op}', got {}", self.describe()))
        }
    }

    fn describe(&self) -> String {
        match self.peek() {
            Tok::Var(v) => format!("${v}"),
            Tok::Ident(s) => format!("{s:?}"),
            Tok::Str(s) => format!("string {s:?}"),
            Tok::Num(n) => format!("number {n}"),
            Tok::Op(o) => format!("'{o}'"),
            Tok::Eof => "end of expression".into(),
        }
    }

    fn parse_complete(mut self) -> Result<Expr, EvalError> {
        let e = self.ternary()?;
        if *self.peek() != Tok::Eof {
            return syntax_error(self.offset(), format!("unexpected {}", self.describe()))
        }
        Ok(e)
    }

    fn ternary(&mut self) -> Result<Expr, EvalError> {
        let cond = self.coalesce()?;
        if self.eat_op("?") {
            let then = if self.eat_op(":") {
                None
            } else {
                let then = self.ternary()?;
                self.expect_op(":")?;
                Some(Box::new(then))
            };
            let otherwise = self.ternary()?;
            Ok(Expr::Ternary(Box::new(cond), then, Box::new(otherwise)))
        } else {
            Ok(cond)
        }
    }

    fn coalesce(&mut self) -> Result<Expr, EvalError> {
        let lhs = self.or()?;
        if self.eat_op("??") {
            let rhs = self.coalesce()?;
            Ok(Expr::Coalesce(Box::new(lhs), Box::new(rhs)))
        } else {
            Ok(lhs)
        }
    }

    fn or(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.and()?;
        while self.is_op("||") || self.is_keyword("or") {
            self.advance();
            let rhs = self.and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.comparison()?;
        while self.is_op("&&") || self.is_keyword("and") {
            self.advance();
            let rhs = self.comparison()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn binary_level(
        &mut self,
        ops: &[(&str, BinOp)],
        next: fn(&mut Self) -> Result<Expr, EvalError>,
    ) -> Result<Expr, EvalError> {
        let mut lhs = next(self)?;
        'outer: loop {
            for (opstr, op) in ops {
                if self.eat_op(opstr) {
                    let rhs = next(self)?;
                    lhs = Expr::Binary(*op, Box::new(lhs), Box::new(rhs));
                    continue 'outer
                }
            }
            return Ok(lhs)
        }
    }

    fn comparison(&mut self) -> Result<Expr, EvalError> {
        self.binary_level(&[
            ("===", BinOp::Identical), ("!==", BinOp::NotIdentical),
            ("==", BinOp::Eq), ("!=", BinOp::Ne),
            ("<=", BinOp::Le), (">=", BinOp::Ge),
            ("<", BinOp::Lt), (">", BinOp::Gt),
        ], Self::concat)
    }

    fn concat(&mut self) -> Result<Expr, EvalError> {
        self.binary_level(&[("~", BinOp::Concat)], Self::additive)
    }

    fn additive(&mut self) -> Result<Expr, EvalError> {
        self.binary_level(&[("+", BinOp::Add), ("-", BinOp::Sub)], Self::multiplicative)
    }

    fn multiplicative(&mut self) -> Result<Expr, EvalError> {
        self.binary_level(&[("*", BinOp::Mul), ("/", BinOp::Div), ("%", BinOp::Rem)],
                          Self::unary)
    }

    fn unary(&mut self) -> Result<Expr, EvalError> {
        if self.eat_op("!") {
            Ok(Expr::Not(Box::new(self.unary()?)))
        } else if self.eat_op("-") {
            Ok(Expr::Neg(Box::new(self.unary()?)))
        } else {
            self.postfix()
        }
    }

    fn postfix(&mut self) -> Result<Expr, EvalError> {
        let mut e = self.primary()?;
        loop {
            if self.eat_op("->") || self.eat_op("?->") {
                let offset = self.offset();
                match self.advance() {
                    Tok::Ident(name) => e = Expr::Prop(Box::new(e), name),
                    _ => return syntax_error(offset, "expecting property name"),
                }
                if self.is_op("(") {
                    return syntax_error(self.offset(), "method calls are not supported")
                }
            } else if self.eat_op("[") {
                let index = self.ternary()?;
                self.expect_op("]")?;
                e = Expr::Index(Box::new(e), Box::new(index));
            } else {
                return Ok(e)
            }
        }
    }

    fn list(&mut self, close: &str) -> Result<Vec<Expr>, EvalError> {
        let mut items = Vec::new();
        if self.eat_op(close) {
            return Ok(items)
        }
        loop {
            items.push(self.ternary()?);
            if self.eat_op(close) {
                return Ok(items)
            }
            self.expect_op(",")?;
            // trailing comma
            if self.eat_op(close) {
                return Ok(items)
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, EvalError> {
        let offset = self.offset();
        match self.advance() {
            Tok::Var(name) => Ok(Expr::Var(name)),
            Tok::Str(s) => Ok(Expr::Lit(Value::String(s))),
            Tok::Num(n) => Ok(Expr::Lit(n)),
            Tok::Ident(name) => {
                if self.eat_op("(") {
                    let args = self.list(")")?;
                    return Ok(Expr::Call(name.to_ascii_lowercase(), args))
                }
                match name.to_ascii_lowercase().as_str() {
                    "true" => Ok(Expr::Lit(Value::Bool(true))),
                    "false" => Ok(Expr::Lit(Value::Bool(false))),
                    // unknown constants are null, too
                    _ => Ok(Expr::Lit(Value::Null)),
                }
            }
            Tok::Op("(") => {
                let e = self.ternary()?;
                self.expect_op(")")?;
                Ok(e)
            }
            Tok::Op("[") => Ok(Expr::Array(self.list("]")?)),
            Tok::Eof => syntax_error(offset, "unexpected end of expression"),
            Tok::Op(o) => syntax_error(offset, format!("unexpected '{o}'")),
        }
    }
}

fn parse(s: &str) -> Result<Expr, EvalError> {
    Parser { toks: tokenize(s)?, i: 0 }.parse_complete()
}


// ---- Evaluation -------------------------------------------------------

/// A value reachable by reference from the scope, so that path
/// expressions don't copy whole objects.
#[derive(Clone, Copy)]
enum Place<'s> {
    This(&'s Map<String, Value>),
    Value(&'s Value),
    Missing,
}

impl<'s> Place<'s> {
    fn member(self, key: &Value) -> Place<'s> {
        let found = match self {
            Place::This(map) => map_member(map, key),
            Place::Value(v) => member(v, key),
            Place::Missing => None,
        };
        found.map(Place::Value).unwrap_or(Place::Missing)
    }

    fn to_value(self) -> Value {
        match self {
            Place::This(map) => Value::Object(map.clone()),
            Place::Value(v) => v.clone(),
            Place::Missing => Value::Null,
        }
    }
}

fn map_member<'v>(map: &'v Map<String, Value>, key: &Value) -> Option<&'v Value> {
    match key {
        Value::String(s) => map.get(s),
        Value::Number(n) => map.get(&n.to_string()),
        _ => None
    }
}

fn member<'v>(v: &'v Value, key: &Value) -> Option<&'v Value> {
    match v {
        Value::Object(map) => map_member(map, key),
        Value::Array(items) => {
            let i = match key {
                Value::Number(n) => n.as_u64().map(|i| i as usize),
                Value::String(s) => s.parse::<usize>().ok(),
                _ => None
            }?;
            items.get(i)
        }
        _ => None
    }
}

fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Null => Some(0.0),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None
    }
}

fn as_integer(v: &Value) -> Option<i64> {
    match v {
        Value::Null => Some(0),
        Value::Bool(b) => Some(*b as i64),
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None
    }
}

fn number_value(f: f64) -> Result<Value, EvalError> {
    if f.fract() == 0.0 && f.abs() < 9.0e15 {
        return Ok(Value::Number((f as i64).into()))
    }
    Number::from_f64(f).map(Value::Number).ok_or_else(
        || EvalError::Type(format!("result is not a finite number: {f}")))
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// PHP's `==`, simplified: booleans and null compare by truthiness,
/// numbers and numeric strings numerically.
fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), y) | (y, Value::Bool(x)) => *x == is_truthy(y),
        (Value::Null, y) | (y, Value::Null) => !is_truthy(y),
        (Value::Number(_), Value::Number(_)) => as_number(a) == as_number(b),
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) =>
            match s.trim().parse::<f64>() {
                Ok(f) => n.as_f64() == Some(f),
                Err(_) => n.to_string() == *s,
            },
        (Value::String(x), Value::String(y)) =>
            match (x.trim().parse::<f64>(), y.trim().parse::<f64>()) {
                (Ok(fx), Ok(fy)) => fx == fy,
                _ => x == y,
            },
        _ => a == b
    }
}

fn compare(op: BinOp, a: &Value, b: &Value) -> Result<bool, EvalError> {
    use std::cmp::Ordering;
    let ordering = match (a, b) {
        (Value::String(x), Value::String(y))
            if x.trim().parse::<f64>().is_err() || y.trim().parse::<f64>().is_err() =>
            Some(x.cmp(y)),
        _ => match (as_number(a), as_number(b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => return type_error(format!("can't compare {} with {}",
                                           type_name(a), type_name(b)))
        }
    };
    Ok(match ordering {
        None => false,
        Some(o) => match op {
            BinOp::Lt => o == Ordering::Less,
            BinOp::Le => o != Ordering::Greater,
            BinOp::Gt => o == Ordering::Greater,
            BinOp::Ge => o != Ordering::Less,
            _ => false,
        }
    })
}

fn arithmetic(op: BinOp, a: &Value, b: &Value) -> Result<Value, EvalError> {
    let opname = match op {
        BinOp::Add => "+", BinOp::Sub => "-", BinOp::Mul => "*",
        BinOp::Div => "/", _ => "%",
    };
    if op == BinOp::Rem {
        return match (as_integer(a), as_integer(b)) {
            (Some(_), Some(0)) => type_error("modulo by zero"),
            // i64::MIN % -1 overflows, the result is 0
            (Some(x), Some(y)) => Ok(Value::Number(x.wrapping_rem(y).into())),
            _ => type_error(format!("unsupported operands for %: {} and {}",
                                    type_name(a), type_name(b)))
        }
    }
    let (x, y) = match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => (x, y),
        _ => return type_error(format!("unsupported operands for {opname}: {} and {}",
                                       type_name(a), type_name(b)))
    };
    match op {
        BinOp::Add => number_value(x + y),
        BinOp::Sub => number_value(x - y),
        BinOp::Mul => number_value(x * y),
        _ => {
            if y == 0.0 {
                return type_error("division by zero")
            }
            number_value(x / y)
        }
    }
}

fn expect_args(name: &str, args: &[Value], n: usize) -> Result<(), EvalError> {
    if args.len() == n {
        Ok(())
    } else {
        type_error(format!("{name}() expects {n} argument(s), got {}", args.len()))
    }
}

fn call_builtin(name: &str, args: Vec<Value>) -> Result<Value, EvalError> {
    match name {
        "count" => {
            expect_args(name, &args, 1)?;
            match &args[0] {
                Value::Array(a) => Ok(Value::Number(a.len().into())),
                Value::Object(m) => Ok(Value::Number(m.len().into())),
                Value::Null => Ok(Value::Number(0.into())),
                v => type_error(format!("count() expects an array or object, got {}",
                                        type_name(v)))
            }
        }
        "empty" => {
            expect_args(name, &args, 1)?;
            Ok(Value::Bool(!is_truthy(&args[0])))
        }
        "isset" => {
            if args.is_empty() {
                return type_error("isset() expects at least 1 argument")
            }
            Ok(Value::Bool(args.iter().all(|v| !v.is_null())))
        }
        "strtoupper" | "strtolower" | "trim" => {
            expect_args(name, &args, 1)?;
            let s = value_to_string(&args[0]);
            Ok(Value::String(match name {
                "strtoupper" => s.to_uppercase(),
                "strtolower" => s.to_lowercase(),
                _ => s.trim().to_string(),
            }))
        }
        "implode" => {
            let (separator, items) = match args.as_slice() {
                [items] => (String::new(), items),
                [separator, items] => (value_to_string(separator), items),
                _ => return type_error("implode() expects 1 or 2 arguments"),
            };
            let strings: Vec<String> = match items {
                Value::Array(a) => a.iter().map(value_to_string).collect(),
                Value::Object(m) => m.values().map(value_to_string).collect(),
                v => return type_error(format!("implode() expects an array, got {}",
                                               type_name(v)))
            };
            Ok(Value::String(strings.join(&separator)))
        }
        _ => Err(EvalError::UnknownFunction(name.into()))
    }
}

/// The default expression language.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpressionEvaluator;

impl ExpressionEvaluator {
    pub fn new() -> Self {
        ExpressionEvaluator
    }

    fn place<'s>(&self, e: &Expr, scope: &Scope<'s>) -> Result<Option<Place<'s>>, EvalError> {
        match e {
            Expr::Var(name) => Ok(Some(
                if name == "this" {
                    scope.this.map(Place::This).unwrap_or(Place::Missing)
                } else {
                    scope.locals.get(name.as_str()).map(Place::Value).unwrap_or(Place::Missing)
                })),
            Expr::Prop(base, name) => Ok(self.place(base, scope)?.map(
                |p| p.member(&Value::String(name.clone())))),
            Expr::Index(base, index) => match self.place(base, scope)? {
                Some(p) => {
                    let key = self.value(index, scope)?;
                    Ok(Some(p.member(&key)))
                }
                None => Ok(None)
            },
            _ => Ok(None)
        }
    }

    fn value(&self, e: &Expr, scope: &Scope) -> Result<Value, EvalError> {
        if let Some(p) = self.place(e, scope)? {
            return Ok(p.to_value())
        }
        match e {
            Expr::Lit(v) => Ok(v.clone()),
            // handled by place
            Expr::Var(_) => Ok(Value::Null),
            Expr::Array(items) => Ok(Value::Array(
                items.iter().map(|i| self.value(i, scope)).collect::<Result<_, _>>()?)),
            Expr::Prop(base, name) => {
                let base = self.value(base, scope)?;
                Ok(member(&base, &Value::String(name.clone())).cloned().unwrap_or(Value::Null))
            }
            Expr::Index(base, index) => {
                let base = self.value(base, scope)?;
                let key = self.value(index, scope)?;
                Ok(member(&base, &key).cloned().unwrap_or(Value::Null))
            }
            Expr::Call(name, args) => {
                let args = args.iter().map(|a| self.value(a, scope))
                    .collect::<Result<Vec<_>, _>>()?;
                call_builtin(name, args)
            }
            Expr::Not(e) => Ok(Value::Bool(!is_truthy(&self.value(e, scope)?))),
            Expr::Neg(e) => {
                let v = self.value(e, scope)?;
                if let Some(i) = v.as_i64().and_then(i64::checked_neg) {
                    return Ok(Value::Number(i.into()))
                }
                match as_number(&v) {
                    Some(f) => number_value(-f),
                    None => type_error(format!("can't negate {}", type_name(&v)))
                }
            }
            Expr::Binary(op, a, b) => {
                let a = self.value(a, scope)?;
                let b = self.value(b, scope)?;
                match op {
                    BinOp::Eq => Ok(Value::Bool(loose_eq(&a, &b))),
                    BinOp::Ne => Ok(Value::Bool(!loose_eq(&a, &b))),
                    BinOp::Identical => Ok(Value::Bool(a == b)),
                    BinOp::NotIdentical => Ok(Value::Bool(a != b)),
                    BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge =>
                        Ok(Value::Bool(compare(*op, &a, &b)?)),
                    BinOp::Concat => {
                        let mut s = value_to_string(&a);
                        s.push_str(&value_to_string(&b));
                        Ok(Value::String(s))
                    }
                    BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem =>
                        arithmetic(*op, &a, &b),
                }
            }
            Expr::And(a, b) => Ok(Value::Bool(
                is_truthy(&self.value(a, scope)?) && is_truthy(&self.value(b, scope)?))),
            Expr::Or(a, b) => Ok(Value::Bool(
                is_truthy(&self.value(a, scope)?) || is_truthy(&self.value(b, scope)?))),
            Expr::Coalesce(a, b) => {
                let a = self.value(a, scope)?;
                if a.is_null() {
                    self.value(b, scope)
                } else {
                    Ok(a)
                }
            }
            Expr::Ternary(cond, then, otherwise) => {
                let c = self.value(cond, scope)?;
                if is_truthy(&c) {
                    match then {
                        Some(then) => self.value(then, scope),
                        None => Ok(c),
                    }
                } else {
                    self.value(otherwise, scope)
                }
            }
        }
    }
}

impl Evaluator for ExpressionEvaluator {
    fn eval(&self, expr: &str, scope: &Scope) -> Result<Value, EvalError> {
        let e = parse(expr)?;
        self.value(&e, scope)
    }
}
