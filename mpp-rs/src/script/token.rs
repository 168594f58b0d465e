//! Line tokenizers.
//!
//! Two flavours are used:
//!
//! - [`split_directive_tokens`] splits on runs of whitespace and commas.  It
//!   feeds directive recognition and the `#CASE`/`#SWITCH` arguments.
//! - [`LineScanner`] is a quote-aware scanner for the richer `#FOR` syntax.
//!   It understands `"…"`/`'…'` literals and returns each of the
//!   [`DELIMITERS`] as a token of its own.

use std::sync::OnceLock;

use regex::Regex;

use super::error::DirectiveError;

/// Characters that always form a one-character token in [`LineScanner`].
pub const DELIMITERS: &[char] = &[',', ':', '!', '?', '/', '\\', ';', '*'];

fn separator_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\s,]+").expect("static regex"))
}

/// Split a trimmed line on runs of whitespace and commas.
///
/// An empty line yields a single empty token, so index 0 always exists.
pub fn split_directive_tokens(line: &str) -> Vec<&str> {
    separator_re().split(line.trim()).collect()
}

/// One token produced by [`LineScanner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    /// The token came from a quoted literal (quotes already removed).
    pub quoted: bool,
}

impl Token {
    fn bare(text: &str) -> Self {
        Token {
            text: text.to_owned(),
            quoted: false,
        }
    }

    /// `true` for an unquoted token equal to `s`, ignoring ASCII case.
    pub fn is_keyword(&self, s: &str) -> bool {
        !self.quoted && self.text.eq_ignore_ascii_case(s)
    }
}

/// Stateful scanner consuming one token at a time from a line remainder.
#[derive(Debug)]
pub struct LineScanner<'a> {
    rest: &'a str,
    unterminated: bool,
}

impl<'a> LineScanner<'a> {
    pub fn new(line: &'a str) -> Self {
        LineScanner {
            rest: line,
            unterminated: false,
        }
    }

    /// The not yet consumed part of the line.
    pub fn remainder(&self) -> &'a str {
        self.rest
    }

    /// `true` once a quoted literal ran to the end of the line unclosed.
    pub fn hit_unterminated_quote(&self) -> bool {
        self.unterminated
    }

    /// Consume and return the next token, or `None` when the line is used up.
    pub fn next_token(&mut self) -> Option<Token> {
        let s = self.rest.trim_start();
        let first = s.chars().next()?;

        if first == '"' || first == '\'' {
            let body = &s[1..];
            return Some(match body.find(first) {
                Some(end) => {
                    self.rest = &body[end + 1..];
                    Token {
                        text: body[..end].to_owned(),
                        quoted: true,
                    }
                }
                None => {
                    self.unterminated = true;
                    self.rest = "";
                    Token {
                        text: body.to_owned(),
                        quoted: true,
                    }
                }
            });
        }

        if DELIMITERS.contains(&first) {
            let width = first.len_utf8();
            self.rest = &s[width..];
            return Some(Token::bare(&s[..width]));
        }

        let end = s
            .find(|c: char| c.is_whitespace() || DELIMITERS.contains(&c))
            .unwrap_or(s.len());
        self.rest = &s[end..];
        Some(Token::bare(&s[..end]))
    }
}

impl Iterator for LineScanner<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.next_token()
    }
}

/// Scan a whole line into tokens.
///
/// An unterminated quote does not stop the scan: its content (up to end of
/// line) becomes the last token and the problem is returned alongside.
pub fn parse_to_tokens(line: &str) -> (Vec<Token>, Option<DirectiveError>) {
    let mut scanner = LineScanner::new(line);
    let tokens: Vec<Token> = scanner.by_ref().collect();
    let error = scanner
        .hit_unterminated_quote()
        .then_some(DirectiveError::UnterminatedQuote);
    (tokens, error)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
