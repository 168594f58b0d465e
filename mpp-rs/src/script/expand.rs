//! Literal substitution of wrapped variable markers in passthrough lines.
//!
//! With the default wrappers a variable `name` is written `%name%` in the
//! source text.  Every marker in the table is replaced in one left-to-right
//! pass; replacement text is never rescanned, so a value that itself contains
//! `%other%` is emitted verbatim.
//!
//! | Mode | Keys eligible for substitution |
//! |------|--------------------------------|
//! | [`SubstitutionMode::Off`] | none |
//! | [`SubstitutionMode::Variables`] | the caller's variables |
//! | [`SubstitutionMode::Table`] | the given mapping |
//!
//! In the two enabled modes `#SET` and `#FOR` bindings add or overwrite
//! entries as they happen.

use std::borrow::Cow;
use std::collections::BTreeMap;

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};

use super::value::Value;
use crate::var::VarStore;

/// How passthrough lines are substituted.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SubstitutionMode {
    /// Lines are emitted as written.
    #[default]
    Off,
    /// The parse variables supply the substitution keys.
    Variables,
    /// An explicit mapping, independent of the parse variables.
    Table(BTreeMap<String, Value>),
}

/// Wrapped key → text table with a lazily compiled matcher.
#[derive(Debug, Clone)]
pub struct SubstitutionTable {
    enabled: bool,
    prefix: String,
    suffix: String,
    /// Variable name → text form.
    entries: BTreeMap<String, String>,
    compiled: Option<Compiled>,
}

#[derive(Debug, Clone)]
struct Compiled {
    matcher: AhoCorasick,
    replacements: Vec<String>,
}

impl SubstitutionTable {
    /// A table that never substitutes.
    pub fn disabled() -> Self {
        SubstitutionTable {
            enabled: false,
            prefix: String::new(),
            suffix: String::new(),
            entries: BTreeMap::new(),
            compiled: None,
        }
    }

    /// Build the table for a parse from `mode` and the initial variables.
    pub fn new(mode: &SubstitutionMode, vars: &VarStore, prefix: &str, suffix: &str) -> Self {
        let mut table = SubstitutionTable {
            enabled: true,
            prefix: prefix.to_owned(),
            suffix: suffix.to_owned(),
            entries: BTreeMap::new(),
            compiled: None,
        };
        match mode {
            SubstitutionMode::Off => return Self::disabled(),
            SubstitutionMode::Variables => {
                for (name, value) in vars.iter() {
                    table.bind(name, value);
                }
            }
            SubstitutionMode::Table(map) => {
                for (name, value) in map {
                    table.bind(name, value);
                }
            }
        }
        table
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The marker that stands for `name`.
    pub fn wrap(&self, name: &str) -> String {
        format!("{}{}{}", self.prefix, name, self.suffix)
    }

    /// Add or overwrite the entry for `name`.  No-op when disabled.
    pub fn bind(&mut self, name: &str, value: &Value) {
        if !self.enabled || name.is_empty() {
            return;
        }
        self.entries.insert(name.to_owned(), value.to_string());
        self.compiled = None;
    }

    /// Current text for the marker of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn compile(&self) -> Compiled {
        let patterns: Vec<String> = self.entries.keys().map(|k| self.wrap(k)).collect();
        // Leftmost-longest so that `%ab%` wins over `%a%` when suffixes are empty.
        let matcher = AhoCorasickBuilder::new()
            .match_kind(MatchKind::LeftmostLongest)
            .build(&patterns);
        Compiled {
            matcher,
            replacements: self.entries.values().cloned().collect(),
        }
    }

    /// Replace every marker occurring in `line`.
    pub fn apply<'a>(&mut self, line: &'a str) -> Cow<'a, str> {
        if !self.enabled || self.entries.is_empty() {
            return Cow::Borrowed(line);
        }
        if self.compiled.is_none() {
            self.compiled = Some(self.compile());
        }
        match &self.compiled {
            Some(c) if c.matcher.is_match(line) => {
                Cow::Owned(c.matcher.replace_all(line, &c.replacements))
            }
            _ => Cow::Borrowed(line),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, Value)]) -> VarStore {
        pairs.iter().cloned().collect()
    }

    #[test]
    fn off_mode_leaves_lines_alone() {
        let mut t = SubstitutionTable::new(&SubstitutionMode::Off, &vars(&[("x", Value::Int(1))]), "%", "%");
        assert!(!t.is_enabled());
        assert_eq!(t.apply("x=%x%"), "x=%x%");
        t.bind("y", &Value::Int(2));
        assert!(t.is_empty());
    }

    #[test]
    fn variables_mode() {
        let mut t = SubstitutionTable::new(
            &SubstitutionMode::Variables,
            &vars(&[("lang", "de".into()), ("n", Value::Int(3))]),
            "%",
            "%",
        );
        assert_eq!(t.apply("%lang%/%n%/%missing%"), "de/3/%missing%");
    }

    #[test]
    fn table_mode_ignores_variables() {
        let mut map = BTreeMap::new();
        map.insert("title".to_owned(), Value::from("Hello"));
        let mut t = SubstitutionTable::new(
            &SubstitutionMode::Table(map),
            &vars(&[("lang", "de".into())]),
            "%",
            "%",
        );
        assert_eq!(t.apply("%title% %lang%"), "Hello %lang%");
    }

    #[test]
    fn bind_overwrites_and_recompiles() {
        let mut t = SubstitutionTable::new(&SubstitutionMode::Variables, &VarStore::new(), "%", "%");
        t.bind("x", &Value::Int(1));
        assert_eq!(t.apply("%x%"), "1");
        t.bind("x", &Value::Int(2));
        assert_eq!(t.apply("%x%%x%"), "22");
        assert_eq!(t.get("x"), Some("2"));
    }

    #[test]
    fn custom_wrappers() {
        let mut t = SubstitutionTable::new(
            &SubstitutionMode::Variables,
            &vars(&[("name", "world".into())]),
            "{{",
            "}}",
        );
        assert_eq!(t.wrap("name"), "{{name}}");
        assert_eq!(t.apply("hello {{name}} %name%"), "hello world %name%");
    }

    #[test]
    fn longest_marker_wins() {
        let mut t = SubstitutionTable::new(
            &SubstitutionMode::Variables,
            &vars(&[("a", "1".into()), ("ab", "2".into())]),
            "$",
            "",
        );
        assert_eq!(t.apply("$ab $a"), "2 1");
    }

    #[test]
    fn replacement_text_is_not_rescanned() {
        let mut t = SubstitutionTable::new(
            &SubstitutionMode::Variables,
            &vars(&[("a", "%b%".into()), ("b", "x".into())]),
            "%",
            "%",
        );
        assert_eq!(t.apply("%a%"), "%b%");
    }

    #[test]
    fn unchanged_line_is_borrowed() {
        let mut t = SubstitutionTable::new(&SubstitutionMode::Variables, &vars(&[("a", "1".into())]), "%", "%");
        assert!(matches!(t.apply("nothing here"), Cow::Borrowed(_)));
    }
}
