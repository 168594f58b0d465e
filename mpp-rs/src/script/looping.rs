//! `#FOR` / `#ENDFOR` loop engine.
//!
//! Loops do not own their body.  `#FOR` records the line right after itself
//! and every `#ENDFOR` that still has values left hands that cursor back to
//! the parse driver, which re-reads the body from there.
//!
//! Two forms are accepted:
//!
//! ```text
//! #FOR lang IN de, en, "pt br"
//! #FOR i FROM 10 TO 0 STEP -2
//! ```

use tracing::warn;

use super::error::DirectiveError;
use super::token::{parse_to_tokens, Token};
use super::value::Value;

const FOR: &str = "#FOR";

/// A parsed `#FOR` line: loop variable plus the full value sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct ForClause {
    pub var: String,
    pub values: Vec<Value>,
}

/// Parse a complete `#FOR` line.  `limit` caps the number of values.
pub fn parse_for(line: &str, limit: usize) -> Result<ForClause, DirectiveError> {
    let (tokens, unterminated) = parse_to_tokens(line);
    if let Some(err) = unterminated {
        return Err(err);
    }
    // tokens[0] is the keyword itself.
    let var = match tokens.get(1) {
        Some(t) if !t.quoted && is_identifier(&t.text) => t.text.clone(),
        Some(t) => return Err(DirectiveError::syntax(FOR, format!("bad loop variable '{}'", t.text))),
        None => return Err(DirectiveError::syntax(FOR, "missing loop variable")),
    };
    let rest = tokens.get(3..).unwrap_or(&[]);
    let values = match tokens.get(2) {
        Some(t) if t.is_keyword("IN") => in_values(rest)?,
        Some(t) if t.is_keyword("FROM") => range_values(rest, limit)?,
        Some(t) => return Err(DirectiveError::syntax(FOR, format!("expected IN or FROM, found '{}'", t.text))),
        None => return Err(DirectiveError::syntax(FOR, "expected IN or FROM")),
    };
    if values.len() > limit {
        return Err(DirectiveError::LoopLimit(limit));
    }
    Ok(ForClause { var, values })
}

pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn in_values(tokens: &[Token]) -> Result<Vec<Value>, DirectiveError> {
    let values: Vec<Value> = tokens
        .iter()
        .filter(|t| t.quoted || t.text != ",")
        .map(|t| {
            if t.quoted {
                Value::Str(t.text.clone())
            } else {
                Value::infer(&t.text)
            }
        })
        .collect();
    if values.is_empty() {
        return Err(DirectiveError::syntax(FOR, "empty IN list"));
    }
    Ok(values)
}

fn number(token: Option<&Token>, what: &str) -> Result<Value, DirectiveError> {
    let t = token.ok_or_else(|| DirectiveError::syntax(FOR, format!("missing {what}")))?;
    match Value::infer(&t.text) {
        v @ (Value::Int(_) | Value::Float(_)) => Ok(v),
        _ => Err(DirectiveError::syntax(FOR, format!("{what} '{}' is not a number", t.text))),
    }
}

/// `start TO end [STEP step]`
fn range_values(tokens: &[Token], limit: usize) -> Result<Vec<Value>, DirectiveError> {
    let start = number(tokens.first(), "start value")?;
    match tokens.get(1) {
        Some(t) if t.is_keyword("TO") => {}
        _ => return Err(DirectiveError::syntax(FOR, "expected TO")),
    }
    let end = number(tokens.get(2), "end value")?;
    let step = match tokens.get(3) {
        None => None,
        Some(t) if t.is_keyword("STEP") => Some(number(tokens.get(4), "step")?),
        Some(t) => return Err(DirectiveError::syntax(FOR, format!("unexpected '{}'", t.text))),
    };
    if tokens.len() > 5 {
        return Err(DirectiveError::syntax(FOR, format!("unexpected '{}'", tokens[5].text)));
    }

    match (&start, &end, &step) {
        (Value::Int(a), Value::Int(b), None) => int_range(*a, *b, if b < a { -1 } else { 1 }, limit),
        (Value::Int(a), Value::Int(b), Some(Value::Int(s))) => int_range(*a, *b, *s, limit),
        _ => {
            let a = start.as_f64().unwrap_or_default();
            let b = end.as_f64().unwrap_or_default();
            let s = match &step {
                Some(v) => v.as_f64().unwrap_or_default(),
                None if b < a => -1.0,
                None => 1.0,
            };
            let places = [Some(&start), Some(&end), step.as_ref()]
                .into_iter()
                .flatten()
                .map(decimal_places)
                .max()
                .unwrap_or(0);
            float_range(a, b, s, places, limit)
        }
    }
}

fn check_direction(zero: bool, wrong_way: bool) -> Result<(), DirectiveError> {
    if zero {
        return Err(DirectiveError::syntax(FOR, "STEP must not be zero"));
    }
    if wrong_way {
        return Err(DirectiveError::syntax(FOR, "STEP direction does not reach the end value"));
    }
    Ok(())
}

fn int_range(start: i64, end: i64, step: i64, limit: usize) -> Result<Vec<Value>, DirectiveError> {
    check_direction(step == 0, (step > 0 && end < start) || (step < 0 && end > start))?;
    let count = (end as i128 - start as i128) / step as i128 + 1;
    if count > limit as i128 {
        return Err(DirectiveError::LoopLimit(limit));
    }
    // Every value lies between start and end, so only the product can overflow.
    Ok((0..count)
        .map(|i| Value::Int((start as i128 + i * step as i128) as i64))
        .collect())
}

/// Digits after the decimal point in the shortest text form of `v`.
fn decimal_places(v: &Value) -> u32 {
    let text = v.to_string();
    text.split_once('.').map_or(0, |(_, frac)| frac.len() as u32)
}

/// Round `x` to `places` decimals, so that `0.1 * 3` reads as `0.3`.
fn round_to(x: f64, places: u32) -> f64 {
    let scale = 10f64.powi(places.min(15) as i32);
    // Adding 0.0 turns -0.0 into 0.0.
    let rounded = (x * scale).round() / scale + 0.0;
    if rounded.is_finite() {
        rounded
    } else {
        x
    }
}

fn float_range(
    start: f64,
    end: f64,
    step: f64,
    places: u32,
    limit: usize,
) -> Result<Vec<Value>, DirectiveError> {
    check_direction(step == 0.0, (step > 0.0 && end < start) || (step < 0.0 && end > start))?;
    // Tolerate rounding so that 0 TO 1 STEP 0.1 still reaches 1.
    let count = ((end - start) / step + 1e-9).floor() + 1.0;
    if !count.is_finite() || count > limit as f64 {
        return Err(DirectiveError::LoopLimit(limit));
    }
    Ok((0..count as usize)
        .map(|i| Value::Float(round_to(start + i as f64 * step, places)))
        .collect())
}

/// One open `#FOR`.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopFrame {
    pub var: String,
    pub values: Vec<Value>,
    /// Line index right after the `#FOR`.
    pub start_cursor: usize,
    pub index: usize,
    /// 1-based line of the `#FOR`.
    pub opened_at: usize,
    /// Placeholder for a `#FOR` that did not run; its body is suppressed.
    pub inert: bool,
}

impl LoopFrame {
    pub fn current(&self) -> Option<&Value> {
        self.values.get(self.index)
    }
}

/// What an `#ENDFOR` asks the driver to do.
#[derive(Debug, Clone, PartialEq)]
pub enum EndFor {
    /// Bind `var` to `value` and continue reading at `cursor`.
    Rewind {
        cursor: usize,
        var: String,
        value: Value,
    },
    /// The loop is over; carry on after the `#ENDFOR`.
    Done,
}

#[derive(Debug, Clone)]
pub struct LoopStack {
    frames: Vec<LoopFrame>,
    /// Body passes started so far in this parse.
    iterations: usize,
    limit: usize,
}

impl LoopStack {
    pub fn new(limit: usize) -> Self {
        LoopStack {
            frames: Vec::new(),
            iterations: 0,
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// No open loop is inert.
    pub fn is_active(&self) -> bool {
        self.frames.iter().all(|f| !f.inert)
    }

    /// Open a running loop and return the frame, positioned on its first value.
    pub fn push(
        &mut self,
        clause: ForClause,
        start_cursor: usize,
        line: usize,
    ) -> Result<&LoopFrame, DirectiveError> {
        if self.iterations >= self.limit {
            self.push_inert(line);
            return Err(DirectiveError::LoopLimit(self.limit));
        }
        self.iterations += 1;
        self.frames.push(LoopFrame {
            var: clause.var,
            values: clause.values,
            start_cursor,
            index: 0,
            opened_at: line,
            inert: false,
        });
        let last = self.frames.len() - 1;
        Ok(&self.frames[last])
    }

    /// Open a loop whose body must not run.
    pub fn push_inert(&mut self, line: usize) {
        self.frames.push(LoopFrame {
            var: String::new(),
            values: Vec::new(),
            start_cursor: 0,
            index: 0,
            opened_at: line,
            inert: true,
        });
    }

    /// `#ENDFOR`: advance the innermost loop.
    pub fn end_for(&mut self) -> Result<EndFor, DirectiveError> {
        let frame = self.frames.last_mut().ok_or(DirectiveError::Unmatched {
            directive: "#ENDFOR",
            opener: FOR,
        })?;
        if frame.inert {
            self.frames.pop();
            return Ok(EndFor::Done);
        }
        frame.index += 1;
        let (cursor, var, value) = match frame.current() {
            Some(v) => (frame.start_cursor, frame.var.clone(), v.clone()),
            None => {
                self.frames.pop();
                return Ok(EndFor::Done);
            }
        };
        if self.iterations >= self.limit {
            warn!(limit = self.limit, var = %var, "loop iteration limit reached");
            self.frames.pop();
            return Err(DirectiveError::LoopLimit(self.limit));
        }
        self.iterations += 1;
        Ok(EndFor::Rewind { cursor, var, value })
    }

    pub fn unclosed(&self) -> impl Iterator<Item = DirectiveError> + '_ {
        self.frames.iter().map(|f| DirectiveError::Unclosed {
            directive: FOR,
            line: f.opened_at,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
