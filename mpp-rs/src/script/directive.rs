//! Directive recognition.
//!
//! A line is a directive when its first token, uppercased, is one of the
//! keywords (or aliases) in [`DIRECTIVES`].  Everything else is content.

use super::token::split_directive_tokens;

/// The directive keywords understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    If,
    ElseIf,
    Else,
    EndIf,
    Switch,
    Case,
    Default,
    EndSwitch,
    Include,
    Set,
    For,
    EndFor,
}

/// Keyword table: kind, canonical spelling, aliases.
pub const DIRECTIVES: &[(DirectiveKind, &str, &[&str])] = &[
    (DirectiveKind::If, "#IF", &[]),
    (DirectiveKind::ElseIf, "#ELSEIF", &["#ELIF"]),
    (DirectiveKind::Else, "#ELSE", &[]),
    (DirectiveKind::EndIf, "#ENDIF", &[]),
    (DirectiveKind::Switch, "#SWITCH", &[]),
    (DirectiveKind::Case, "#CASE", &[]),
    (DirectiveKind::Default, "#DEFAULT", &[]),
    (DirectiveKind::EndSwitch, "#ENDSWITCH", &[]),
    (DirectiveKind::Include, "#INCLUDE", &[]),
    (DirectiveKind::Set, "#SET", &[]),
    (DirectiveKind::For, "#FOR", &[]),
    (DirectiveKind::EndFor, "#ENDFOR", &["#ENDF"]),
];

impl DirectiveKind {
    /// Canonical keyword, used in diagnostics.
    pub fn keyword(self) -> &'static str {
        DIRECTIVES
            .iter()
            .find(|(kind, _, _)| *kind == self)
            .map(|(_, name, _)| *name)
            .unwrap_or("#?")
    }

    /// Look up an already-isolated first token.
    pub fn from_token(token: &str) -> Option<Self> {
        let upper = token.to_ascii_uppercase();
        DIRECTIVES
            .iter()
            .find(|(_, name, aliases)| *name == upper || aliases.contains(&upper.as_str()))
            .map(|(kind, _, _)| *kind)
    }
}

/// Classify a source line.  Returns `None` for plain content.
pub fn classify(line: &str) -> Option<DirectiveKind> {
    let tokens = split_directive_tokens(line);
    DirectiveKind::from_token(tokens.first().copied().unwrap_or(""))
}

/// Text following the directive keyword, with surrounding whitespace removed.
///
/// `#SET x = 1` → `x = 1`.
pub fn argument_text(line: &str) -> &str {
    let s = line.trim_start();
    let end = s
        .find(|c: char| c.is_whitespace() || c == ',')
        .unwrap_or(s.len());
    s[end..]
        .trim_start_matches(|c: char| c.is_whitespace() || c == ',')
        .trim_end()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
