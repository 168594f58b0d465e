//! Runtime value type for the preprocessor.
//!
//! Variables are loosely typed: every value has a text form used for literal
//! substitution, and the evaluator coerces numeric-looking strings to numbers
//! when an operator needs them.

use std::cmp::Ordering;
use std::fmt;

use super::error::EvalError;

/// A variable or expression value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

impl Default for Value {
    fn default() -> Self {
        Value::Str(String::new())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            // Shortest round-trip form: 2.0 prints as "2", 0.5 as "0.5".
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Numeric view of a value, used when an operator needs numbers.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn as_f64(self) -> f64 {
        match self {
            Num::Int(n) => n as f64,
            Num::Float(x) => x,
        }
    }
}

fn parse_num(s: &str) -> Option<Num> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    if let Ok(n) = t.parse::<i64>() {
        return Some(Num::Int(n));
    }
    // `f64::from_str` accepts "inf" and "NaN"; those are not numbers here.
    if !t.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    t.parse::<f64>().ok().filter(|x| x.is_finite()).map(Num::Float)
}

impl Value {
    /// Infer a typed value from caller-supplied text.
    ///
    /// `true`/`false` become booleans, numeric text becomes a number, text in
    /// matching quotes becomes the unquoted string, anything else stays a
    /// string.
    pub fn infer(text: &str) -> Value {
        let t = text.trim();
        if let Some(inner) = strip_quotes(t) {
            return Value::Str(inner.to_owned());
        }
        if t.eq_ignore_ascii_case("true") {
            return Value::Bool(true);
        }
        if t.eq_ignore_ascii_case("false") {
            return Value::Bool(false);
        }
        match parse_num(t) {
            Some(Num::Int(n)) => Value::Int(n),
            Some(Num::Float(x)) => Value::Float(x),
            None => Value::Str(t.to_owned()),
        }
    }

    /// Coerce to boolean: `false`, `0`, `""` and `"0"` are falsy.
    pub fn as_bool(&self) -> bool {
        match self {
            Value::Int(n) => *n != 0,
            Value::Float(x) => *x != 0.0,
            Value::Str(s) => !s.is_empty() && s != "0",
            Value::Bool(b) => *b,
        }
    }

    /// `true` for numbers and for strings that read as a number.
    pub fn is_numeric(&self) -> bool {
        self.as_num().is_some()
    }

    fn as_num(&self) -> Option<Num> {
        match self {
            Value::Int(n) => Some(Num::Int(*n)),
            Value::Float(x) => Some(Num::Float(*x)),
            Value::Str(s) => parse_num(s),
            Value::Bool(_) => None,
        }
    }

    /// The number this value reads as, in canonical form: `Str("5.")` gives
    /// `Float(5.0)`, `Str(" 7")` gives `Int(7)`.
    pub fn to_number(&self) -> Option<Value> {
        match self.as_num()? {
            Num::Int(n) => Some(Value::Int(n)),
            Num::Float(x) => Some(Value::Float(x)),
        }
    }

    /// The value as an `f64`, if it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        self.as_num().map(Num::as_f64)
    }

    /// Name of the type, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "integer",
            Value::Float(_) => "real",
            Value::Str(_) => "string",
            Value::Bool(_) => "boolean",
        }
    }

    // ── Arithmetic helpers ────────────────────────────────────────────────────

    fn operands(&self, rhs: &Value, op: char) -> Result<(Num, Num), EvalError> {
        match (self.as_num(), rhs.as_num()) {
            (Some(a), Some(b)) => Ok((a, b)),
            (None, _) => Err(EvalError::Type { op, found: self.type_name(), text: self.to_string() }),
            (_, None) => Err(EvalError::Type { op, found: rhs.type_name(), text: rhs.to_string() }),
        }
    }

    fn int_or_float(
        a: Num,
        b: Num,
        op: char,
        int_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
    ) -> Result<Value, EvalError> {
        match (a, b) {
            (Num::Int(x), Num::Int(y)) => int_op(x, y)
                .map(Value::Int)
                .ok_or(EvalError::Overflow(op)),
            _ => Ok(Value::Float(float_op(a.as_f64(), b.as_f64()))),
        }
    }

    /// `+`: numeric addition, or concatenation when either side is a
    /// non-numeric string.
    pub fn arith_add(&self, rhs: &Value) -> Result<Value, EvalError> {
        let concat = matches!(self, Value::Str(_)) && !self.is_numeric()
            || matches!(rhs, Value::Str(_)) && !rhs.is_numeric();
        if concat {
            return Ok(Value::Str(format!("{self}{rhs}")));
        }
        let (a, b) = self.operands(rhs, '+')?;
        Self::int_or_float(a, b, '+', i64::checked_add, |x, y| x + y)
    }

    pub fn arith_sub(&self, rhs: &Value) -> Result<Value, EvalError> {
        let (a, b) = self.operands(rhs, '-')?;
        Self::int_or_float(a, b, '-', i64::checked_sub, |x, y| x - y)
    }

    pub fn arith_mul(&self, rhs: &Value) -> Result<Value, EvalError> {
        let (a, b) = self.operands(rhs, '*')?;
        Self::int_or_float(a, b, '*', i64::checked_mul, |x, y| x * y)
    }

    /// `/`: integer result when the division is exact, real otherwise.
    pub fn arith_div(&self, rhs: &Value) -> Result<Value, EvalError> {
        let (a, b) = self.operands(rhs, '/')?;
        if b.as_f64() == 0.0 {
            return Err(EvalError::DivisionByZero);
        }
        match (a, b) {
            (Num::Int(x), Num::Int(y)) if x.checked_rem(y) == Some(0) => {
                x.checked_div(y).map(Value::Int).ok_or(EvalError::Overflow('/'))
            }
            _ => Ok(Value::Float(a.as_f64() / b.as_f64())),
        }
    }

    pub fn arith_rem(&self, rhs: &Value) -> Result<Value, EvalError> {
        let (a, b) = self.operands(rhs, '%')?;
        if b.as_f64() == 0.0 {
            return Err(EvalError::DivisionByZero);
        }
        Self::int_or_float(a, b, '%', i64::checked_rem, |x, y| x % y)
    }

    pub fn arith_neg(&self) -> Result<Value, EvalError> {
        match self.as_num() {
            Some(Num::Int(n)) => n.checked_neg().map(Value::Int).ok_or(EvalError::Overflow('-')),
            Some(Num::Float(x)) => Ok(Value::Float(-x)),
            None => Err(EvalError::Type { op: '-', found: self.type_name(), text: self.to_string() }),
        }
    }

    /// Loose equality: numeric when both sides are numeric, truthiness when
    /// either side is a boolean, text comparison otherwise.
    pub fn loose_eq(&self, rhs: &Value) -> bool {
        match (self, rhs) {
            (Value::Bool(a), b) | (b, Value::Bool(a)) => *a == b.as_bool(),
            _ => match (self.as_num(), rhs.as_num()) {
                (Some(a), Some(b)) => a.as_f64() == b.as_f64(),
                _ => self.to_string() == rhs.to_string(),
            },
        }
    }

    /// Relational ordering: numeric when both sides are numeric, text
    /// ordering otherwise.
    pub fn cmp_value(&self, rhs: &Value) -> Ordering {
        match (self.as_num(), rhs.as_num()) {
            (Some(a), Some(b)) => a.as_f64().partial_cmp(&b.as_f64()).unwrap_or(Ordering::Equal),
            _ => self.to_string().cmp(&rhs.to_string()),
        }
    }
}

/// Strip one pair of matching `"` or `'` quotes, if present.
pub(crate) fn strip_quotes(s: &str) -> Option<&str> {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' || first == b'\'') && first == last {
            return Some(&s[1..s.len() - 1]);
        }
    }
    None
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
