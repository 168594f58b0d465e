//! Variable store.
//!
//! Holds the caller's input variables for one parse invocation, plus
//! whatever `#SET` and `#FOR` bind while the parse runs.  Names are
//! case-sensitive keys; expression evaluation additionally resolves them
//! case-insensitively through [`VarStore::lookup`].
//!
//! Iteration order is sorted by name so that everything derived from the
//! store (substitution tables, pre-substitution regexes) is deterministic.

use std::collections::BTreeMap;

use crate::script::value::Value;

/// Name → value map for one parse.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VarStore {
    vars: BTreeMap<String, Value>,
}

impl VarStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or overwrite) a variable.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.vars.insert(name.into(), value.into());
    }

    /// Get a variable by exact name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Resolve `name` the way expressions do: an exact match first, then the
    /// first name (in sorted order) equal ignoring ASCII case.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.vars.get(name).or_else(|| {
            self.vars
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
    }

    /// Remove a variable.  Returns `true` if it existed.
    pub fn unset(&mut self, name: &str) -> bool {
        self.vars.remove(name).is_some()
    }

    /// Returns `true` if the variable is set.
    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Iterate over all variables in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.vars.iter()
    }

    /// Iterate over variable names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> Extend<(K, V)> for VarStore {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.set(k, v);
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for VarStore {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut vars = VarStore::new();
        vars.extend(iter);
        vars
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
