//! Error types for the preprocessor engine.
//!
//! Nothing here is fatal to a parse.  Operations return these errors and the
//! parse driver turns each one into a line-numbered [`Diagnostic`] before
//! moving on to the next line.

use std::fmt;
use std::path::PathBuf;

/// Failure to parse or evaluate an `#IF`/`#ELSEIF` condition or a `#SET`
/// right-hand side.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("syntax error in expression: {0}")]
    Syntax(String),
    #[error("unknown identifier '{0}'")]
    UnknownIdentifier(String),
    #[error("cannot apply '{op}' to {found} '{text}'")]
    Type {
        op: char,
        found: &'static str,
        text: String,
    },
    #[error("division by zero")]
    DivisionByZero,
    #[error("integer overflow in '{0}'")]
    Overflow(char),
    #[error("empty expression")]
    Empty,
}

/// Why a directive line could not take effect.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DirectiveError {
    /// ELSEIF/ELSE/ENDIF/CASE/DEFAULT/ENDSWITCH/ENDFOR with no opener.
    #[error("{directive} without matching {opener}")]
    Unmatched {
        directive: &'static str,
        opener: &'static str,
    },
    /// A block still open at end of input.
    #[error("{directive} opened at line {line} is never closed")]
    Unclosed { directive: &'static str, line: usize },
    #[error("syntax error in {directive}: {message}")]
    Syntax {
        directive: &'static str,
        message: String,
    },
    #[error("{directive}: {source}")]
    Eval {
        directive: &'static str,
        #[source]
        source: EvalError,
    },
    #[error("unterminated quoted string")]
    UnterminatedQuote,
    #[error("wrong source file name in #INCLUDE: {}", .0.display())]
    IncludeNotFound(PathBuf),
    #[error("cannot read {}: {message}", .path.display())]
    Read { path: PathBuf, message: String },
    #[error("#INCLUDE nesting deeper than {0} levels")]
    IncludeDepth(usize),
    #[error("#FOR loop exceeds {0} iterations")]
    LoopLimit(usize),
}

impl DirectiveError {
    pub(crate) fn syntax(directive: &'static str, message: impl Into<String>) -> Self {
        DirectiveError::Syntax {
            directive,
            message: message.into(),
        }
    }
}

/// One collected, non-fatal problem.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// 1-based source line; 0 when the problem concerns the whole source.
    pub line: usize,
    pub message: String,
    /// Included file the line belongs to; `None` for the top-level source.
    pub file: Option<PathBuf>,
}

impl Diagnostic {
    pub fn new(line: usize, error: &DirectiveError) -> Self {
        Diagnostic {
            line,
            message: error.to_string(),
            file: None,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(path) => write!(f, "{}:{}: {}", path.display(), self.line, self.message),
            None => write!(f, "line {}: {}", self.line, self.message),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
