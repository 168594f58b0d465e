//! Engine options and the defines file.
//!
//! A defines file seeds the caller variables for the command line tool:
//!
//! | Line | Action |
//! |------|--------|
//! | `name = value` | define `name`; the value goes through [`Value::infer`] |
//! | `name value` | same, for files written without `=` |
//! | Lines starting with `;` or `#` | comment, ignored |
//! | blank | ignored |

use std::path::{Path, PathBuf};

use crate::script::looping::is_identifier;
use crate::script::value::Value;
use crate::var::VarStore;

// ── Options ───────────────────────────────────────────────────────────────────

/// Delimiter used to join emitted lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEnding {
    /// `\r\n`
    Windows,
    /// `\n`
    Unix,
    Custom(String),
}

impl LineEnding {
    /// `"windows"` and `"unix"` name the two standard styles; any other text
    /// is used literally.
    pub fn parse(style: &str) -> Self {
        match style {
            "windows" => LineEnding::Windows,
            "unix" => LineEnding::Unix,
            other => LineEnding::Custom(other.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            LineEnding::Windows => "\r\n",
            LineEnding::Unix => "\n",
            LineEnding::Custom(s) => s,
        }
    }
}

impl From<&str> for LineEnding {
    fn from(style: &str) -> Self {
        LineEnding::parse(style)
    }
}

impl Default for LineEnding {
    fn default() -> Self {
        if cfg!(windows) {
            LineEnding::Windows
        } else {
            LineEnding::Unix
        }
    }
}

/// Settings that shape one [`Preprocessor`](crate::Preprocessor).
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub line_ending: LineEnding,
    /// Base folder `#INCLUDE` paths are resolved against.
    pub source_folder: PathBuf,
    /// Substitution marker prefix and suffix.
    pub wrappers: (String, String),
    /// Right-trim every emitted line.
    pub trim_trailing_whitespace: bool,
    pub max_include_depth: usize,
    /// Body passes allowed across all loops of one parse.
    pub max_loop_iterations: usize,
}

pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 32;
pub const DEFAULT_MAX_LOOP_ITERATIONS: usize = 100_000;

impl Default for Options {
    fn default() -> Self {
        Options {
            line_ending: LineEnding::default(),
            source_folder: PathBuf::new(),
            wrappers: ("%".to_owned(), "%".to_owned()),
            trim_trailing_whitespace: false,
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
            max_loop_iterations: DEFAULT_MAX_LOOP_ITERATIONS,
        }
    }
}

// ── Defines file ──────────────────────────────────────────────────────────────

/// A non-fatal error encountered while loading a defines file.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct ConfigError {
    pub line: usize,
    pub message: String,
}

/// Split `NAME=VALUE` (or `NAME VALUE`) into a checked name and inferred value.
pub fn parse_define(s: &str) -> Result<(String, Value), String> {
    let s = s.trim();
    let (name, value) = match s.split_once('=') {
        Some((n, v)) => (n.trim(), v.trim()),
        None => s
            .split_once(|c: char| c.is_ascii_whitespace())
            .map(|(n, v)| (n, v.trim()))
            .unwrap_or((s, "")),
    };
    if name.is_empty() {
        return Err(format!("missing variable name in '{s}'"));
    }
    if !is_identifier(name) {
        return Err(format!("invalid variable name '{name}'"));
    }
    Ok((name.to_owned(), Value::infer(value)))
}

/// Variables read from a defines file.
#[derive(Debug, Default)]
pub struct Defines {
    pub vars: VarStore,
}

impl Defines {
    /// Parse defines text.  Bad lines are reported and skipped.
    pub fn load_str(s: &str) -> (Self, Vec<ConfigError>) {
        let mut defines = Defines::default();
        let mut errors = Vec::new();

        for (i, raw) in s.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }
            match parse_define(line) {
                Ok((name, value)) => defines.vars.set(name, value),
                Err(message) => errors.push(ConfigError { line: i + 1, message }),
            }
        }

        (defines, errors)
    }

    pub fn load_file(path: &Path) -> std::io::Result<(Self, Vec<ConfigError>)> {
        let s = std::fs::read_to_string(path)?;
        Ok(Self::load_str(&s))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
