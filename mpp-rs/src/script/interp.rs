//! Parse driver.
//!
//! [`Preprocessor::parse`] walks the source one line at a time with an
//! explicit cursor.  Directive lines update the control and loop stacks (an
//! `#ENDFOR` may move the cursor back); other lines are emitted, after
//! substitution, when every enclosing block is active.
//!
//! Nothing stops a parse.  Each failed directive becomes a [`Diagnostic`] and
//! the driver moves on to the next line.

use std::path::{Path, PathBuf};

use tracing::{debug, trace, warn};

use super::control::ControlStack;
use super::directive::{argument_text, classify, DirectiveKind};
use super::error::{Diagnostic, DirectiveError};
use super::expand::{SubstitutionMode, SubstitutionTable};
use super::expr::{evaluate_with, presence_test, NamePattern};
use super::looping::{is_identifier, parse_for, EndFor, LoopStack};
use super::token::split_directive_tokens;
use super::value::{strip_quotes, Value};
use crate::config::{LineEnding, Options};
use crate::var::VarStore;

// ── Source ────────────────────────────────────────────────────────────────────

/// Where the text to preprocess comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Text(String),
    File(PathBuf),
}

impl Source {
    /// A path to an existing file is read from disk; anything else is
    /// processed as literal text.
    pub fn guess(s: &str) -> Self {
        if !s.contains('\n') && Path::new(s).is_file() {
            Source::File(PathBuf::from(s))
        } else {
            Source::Text(s.to_owned())
        }
    }
}

// ── Preprocessor ──────────────────────────────────────────────────────────────

/// The public entry point: options plus the diagnostics of the last parse.
#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    options: Options,
    errors: Vec<Diagnostic>,
}

impl Preprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: Options) -> Self {
        Preprocessor {
            options,
            errors: Vec::new(),
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// `"windows"`, `"unix"` or any literal delimiter.
    pub fn set_line_ending(&mut self, ending: impl Into<LineEnding>) -> &mut Self {
        self.options.line_ending = ending.into();
        self
    }

    pub fn set_source_folder(&mut self, folder: impl Into<PathBuf>) -> &mut Self {
        self.options.source_folder = folder.into();
        self
    }

    /// Set the substitution markers.  An empty `prefix` is ignored; a missing
    /// or empty `suffix` repeats the prefix.
    pub fn set_substitution_wrappers(&mut self, prefix: &str, suffix: Option<&str>) -> &mut Self {
        if prefix.is_empty() {
            return self;
        }
        let suffix = suffix.filter(|s| !s.is_empty()).unwrap_or(prefix);
        self.options.wrappers = (prefix.to_owned(), suffix.to_owned());
        self
    }

    pub fn set_trim_trailing_whitespace(&mut self, trim: bool) -> &mut Self {
        self.options.trim_trailing_whitespace = trim;
        self
    }

    pub fn set_max_include_depth(&mut self, depth: usize) -> &mut Self {
        self.options.max_include_depth = depth;
        self
    }

    pub fn set_max_loop_iterations(&mut self, iterations: usize) -> &mut Self {
        self.options.max_loop_iterations = iterations;
        self
    }

    /// Diagnostics recorded by the most recent [`parse`](Self::parse).
    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    /// Preprocess `source` with `vars` as the initial variables.
    ///
    /// Always returns the best-effort output; see [`errors`](Self::errors)
    /// for what went wrong.
    pub fn parse(&mut self, source: Source, vars: &VarStore, mode: SubstitutionMode) -> String {
        self.errors.clear();
        let text = match source {
            Source::Text(text) => text,
            Source::File(path) => match std::fs::read_to_string(&path) {
                Ok(text) => text,
                Err(e) => {
                    let err = DirectiveError::Read {
                        path,
                        message: e.to_string(),
                    };
                    debug!(error = %err, "source unreadable");
                    self.errors.push(Diagnostic::new(0, &err));
                    return String::new();
                }
            },
        };
        let (prefix, suffix) = &self.options.wrappers;
        let table = SubstitutionTable::new(&mode, vars, prefix, suffix);
        let mut run = Run::new(&self.options, vars.clone(), table, 0, None);
        let output = run.process(&text);
        self.errors = run.diagnostics;
        output
    }
}

// ── Run ───────────────────────────────────────────────────────────────────────

/// State of one parse over one text; includes get a fresh `Run` of their own.
struct Run<'o> {
    options: &'o Options,
    vars: VarStore,
    table: SubstitutionTable,
    /// Matcher over the names in `vars`; rebuilt when a name is added.
    names: NamePattern,
    control: ControlStack,
    loops: LoopStack,
    diagnostics: Vec<Diagnostic>,
    /// Include nesting level; 0 for the top-level source.
    depth: usize,
    /// Included file being processed.
    file: Option<PathBuf>,
}

impl<'o> Run<'o> {
    fn new(
        options: &'o Options,
        vars: VarStore,
        table: SubstitutionTable,
        depth: usize,
        file: Option<PathBuf>,
    ) -> Self {
        Run {
            options,
            names: NamePattern::new(&vars),
            vars,
            table,
            control: ControlStack::new(),
            loops: LoopStack::new(options.max_loop_iterations),
            diagnostics: Vec::new(),
            depth,
            file,
        }
    }

    fn is_active(&self) -> bool {
        self.control.is_active() && self.loops.is_active()
    }

    fn record(&mut self, line: usize, err: &DirectiveError) {
        debug!(line, file = ?self.file, error = %err, "diagnostic");
        self.diagnostics.push(Diagnostic {
            file: self.file.clone(),
            ..Diagnostic::new(line, err)
        });
    }

    fn bind(&mut self, name: &str, value: Value) {
        self.table.bind(name, &value);
        let added = !self.vars.contains(name);
        self.vars.set(name, value);
        if added {
            self.names = NamePattern::new(&self.vars);
        }
    }

    fn process(&mut self, text: &str) -> String {
        let lines: Vec<&str> = text
            .split('\n')
            .map(|l| l.strip_suffix('\r').unwrap_or(l))
            .collect();
        let mut out: Vec<String> = Vec::new();
        let mut cursor = 0;

        while cursor < lines.len() {
            let line = lines[cursor];
            let lineno = cursor + 1;
            cursor += 1;

            let Some(kind) = classify(line) else {
                if self.is_active() {
                    let emitted = self.table.apply(line);
                    out.push(if self.options.trim_trailing_whitespace {
                        emitted.trim_end().to_owned()
                    } else {
                        emitted.into_owned()
                    });
                }
                continue;
            };

            trace!(line = lineno, directive = kind.keyword(), active = self.is_active(), "directive");
            if let Err(err) = self.directive(kind, line, lineno, &mut cursor, &mut out) {
                self.record(lineno, &err);
            }
        }

        let unclosed: Vec<DirectiveError> = self.control.unclosed().chain(self.loops.unclosed()).collect();
        for err in unclosed {
            if let DirectiveError::Unclosed { line, .. } = err {
                self.record(line, &err);
            }
        }

        out.join(self.options.line_ending.as_str())
    }

    fn directive(
        &mut self,
        kind: DirectiveKind,
        line: &str,
        lineno: usize,
        cursor: &mut usize,
        out: &mut Vec<String>,
    ) -> Result<(), DirectiveError> {
        let arg = argument_text(line);
        // Conditions inside a suppressed loop body are never evaluated.
        let live = self.loops.is_active();
        let vars = &self.vars;
        let names = &self.names;

        match kind {
            DirectiveKind::If => self
                .control
                .push_if(lineno, || if live { condition(kind, arg, vars, names) } else { Ok(false) }),
            DirectiveKind::ElseIf => self
                .control
                .else_if(|| if live { condition(kind, arg, vars, names) } else { Ok(false) }),
            DirectiveKind::Else => self.control.else_(),
            DirectiveKind::EndIf => self.control.end_if().map(drop),

            DirectiveKind::Switch => {
                let tokens = split_directive_tokens(line);
                let name = tokens.get(1).copied().unwrap_or("");
                self.control.switch(lineno, || {
                    if !live {
                        return Ok(Value::default());
                    }
                    if name.is_empty() {
                        return Err(DirectiveError::syntax(kind.keyword(), "missing variable name"));
                    }
                    Ok(vars.lookup(name).cloned().unwrap_or(Value::Int(0)))
                })
            }
            DirectiveKind::Case => {
                let values: Vec<Value> = split_directive_tokens(line)
                    .iter()
                    .skip(1)
                    .map(|t| Value::infer(t))
                    .collect();
                self.control.case(&values)
            }
            DirectiveKind::Default => self.control.default_case(),
            DirectiveKind::EndSwitch => self.control.end_switch().map(drop),

            DirectiveKind::Set if self.is_active() => self.set(arg),
            DirectiveKind::Include if self.is_active() => {
                let path = strip_quotes(arg).unwrap_or(arg).trim();
                if path.is_empty() {
                    return Err(DirectiveError::syntax(kind.keyword(), "missing file name"));
                }
                let body = self.include(path)?;
                out.push(body);
                Ok(())
            }
            DirectiveKind::Set | DirectiveKind::Include => Ok(()),

            DirectiveKind::For => {
                if !self.is_active() {
                    self.loops.push_inert(lineno);
                    return Ok(());
                }
                let clause = match parse_for(line, self.loops.limit()) {
                    Ok(clause) => clause,
                    Err(err) => {
                        self.loops.push_inert(lineno);
                        return Err(err);
                    }
                };
                let frame = self.loops.push(clause, *cursor, lineno)?;
                let var = frame.var.clone();
                let first = frame.current().cloned().unwrap_or_default();
                self.bind(&var, first);
                Ok(())
            }
            DirectiveKind::EndFor => match self.loops.end_for()? {
                EndFor::Rewind { cursor: to, var, value } => {
                    self.bind(&var, value);
                    *cursor = to;
                    Ok(())
                }
                EndFor::Done => {
                    trace!(line = lineno, "loop finished");
                    Ok(())
                }
            },
        }
    }

    /// `#SET name = expression`
    fn set(&mut self, arg: &str) -> Result<(), DirectiveError> {
        const SET: &str = "#SET";
        let (name, expr) = arg
            .split_once('=')
            .ok_or_else(|| DirectiveError::syntax(SET, "expected 'name = expression'"))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(DirectiveError::syntax(SET, "missing variable name"));
        }
        if !is_identifier(name) {
            return Err(DirectiveError::syntax(SET, format!("invalid variable name '{name}'")));
        }
        let value = evaluate_with(expr.trim(), &self.vars, &self.names)
            .map_err(|source| DirectiveError::Eval { directive: SET, source })?;
        trace!(name, value = %value, "set");
        self.bind(name, value);
        Ok(())
    }

    /// Process `rel` (relative to the source folder) and return its output.
    fn include(&mut self, rel: &str) -> Result<String, DirectiveError> {
        let path = self.options.source_folder.join(rel);
        if !path.is_file() {
            return Err(DirectiveError::IncludeNotFound(path));
        }
        let max = self.options.max_include_depth;
        if self.depth >= max {
            warn!(path = %path.display(), max, "include depth limit reached");
            return Err(DirectiveError::IncludeDepth(max));
        }
        let text = std::fs::read_to_string(&path).map_err(|e| DirectiveError::Read {
            path: path.clone(),
            message: e.to_string(),
        })?;
        // A final newline ends the last line rather than adding an empty one.
        let text = text.strip_suffix('\n').unwrap_or(&text);

        debug!(path = %path.display(), depth = self.depth + 1, "include");
        let mut child = Run::new(
            self.options,
            self.vars.clone(),
            self.table.clone(),
            self.depth + 1,
            Some(path),
        );
        let body = child.process(text);
        self.diagnostics.append(&mut child.diagnostics);
        Ok(body)
    }
}

/// Evaluate an `#IF`/`#ELSEIF` condition.
///
/// A bare list of names (`#IF a, b`) is a presence test; anything else is an
/// expression.
fn condition(
    kind: DirectiveKind,
    arg: &str,
    vars: &VarStore,
    names: &NamePattern,
) -> Result<bool, DirectiveError> {
    let directive = kind.keyword();
    if arg.is_empty() {
        return Err(DirectiveError::syntax(directive, "missing condition"));
    }
    if let Some(present) = presence_test(arg, vars) {
        return Ok(present);
    }
    evaluate_with(arg, vars, names)
        .map(|v| v.as_bool())
        .map_err(|source| DirectiveError::Eval { directive, source })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn pp() -> Preprocessor {
        let mut pp = Preprocessor::new();
        pp.set_line_ending("unix");
        pp
    }

    fn run_with(src: &str, vars: &[(&str, Value)]) -> (String, Vec<Diagnostic>) {
        let mut pp = pp();
        let vars: VarStore = vars.iter().cloned().collect();
        let out = pp.parse(Source::Text(src.to_owned()), &vars, SubstitutionMode::Variables);
        (out, pp.errors().to_vec())
    }

    fn run(src: &str) -> String {
        let (out, errs) = run_with(src, &[]);
        assert!(errs.is_empty(), "{errs:?}");
        out
    }

    #[test]
    fn passthrough() {
        assert_eq!(run("a\nb\n\nc"), "a\nb\n\nc");
        assert_eq!(run("a\r\nb\r\n"), "a\nb\n");
    }

    #[test]
    fn custom_line_ending() {
        let mut pp = Preprocessor::new();
        pp.set_line_ending("<br>");
        let out = pp.parse(Source::Text("a\nb".into()), &VarStore::new(), SubstitutionMode::Off);
        assert_eq!(out, "a<br>b");
    }

    #[test]
    fn if_else_chain() {
        let src = "#IF x > 1\nbig\n#ELSEIF x == 1\none\n#ELSE\nsmall\n#ENDIF";
        assert_eq!(run_with(src, &[("x", Value::Int(5))]).0, "big");
        assert_eq!(run_with(src, &[("x", Value::Int(1))]).0, "one");
        assert_eq!(run_with(src, &[("x", Value::Int(0))]).0, "small");
    }

    #[test]
    fn elif_alias_and_lowercase_keywords() {
        let src = "#if 0\na\n#elif 1\nb\n#endif";
        assert_eq!(run(src), "b");
    }

    #[test]
    fn nested_if_under_false_is_silent() {
        let (out, errs) = run_with("#IF 0\n#IF undefined_thing\nx\n#ENDIF\n#ENDIF\nend", &[]);
        assert_eq!(out, "end");
        assert!(errs.is_empty(), "{errs:?}");
    }

    #[test]
    fn undefined_flag_is_false_without_diagnostic() {
        let (out, errs) = run_with("#IF nope\na\n#ELSE\nb\n#ENDIF", &[]);
        assert_eq!(out, "b");
        assert!(errs.is_empty(), "{errs:?}");
    }

    #[test]
    fn unknown_identifier_in_expression_is_false_and_reported() {
        let (out, errs) = run_with("#IF nope == 1\na\n#ELSE\nb\n#ENDIF", &[]);
        assert_eq!(out, "b");
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].line, 1);
    }

    #[test]
    fn presence_list_condition() {
        let src = "#IF a, b\nany\n#ELSEIF c d\nlater\n#ENDIF";
        assert_eq!(run_with(src, &[("b", Value::Int(1))]).0, "any");
        assert_eq!(run_with(src, &[("d", "yes".into())]).0, "later");
        assert_eq!(run_with(src, &[("a", Value::Int(0))]), (String::new(), vec![]));
    }

    #[test]
    fn set_in_loop_defines_new_names_for_conditions() {
        let src = "#FOR i FROM 1 TO 3\n#SET sq = i * i\n#IF sq > 3\n%sq%\n#ENDIF\n#ENDFOR";
        assert_eq!(run(src), "4\n9");
    }

    #[test]
    fn switch_in_inert_loop_is_silent() {
        let (out, errs) = run_with("#FOR\n#SWITCH\n#DEFAULT\nx\n#ENDSWITCH\n#ENDFOR\nend", &[]);
        assert_eq!(out, "end");
        assert_eq!(errs.len(), 1, "{errs:?}");
        assert_eq!(errs[0].line, 1);
    }

    #[test]
    fn switch_case_default() {
        let src = "#SWITCH lang\n#CASE de, at\nGerman\n#CASE en\nEnglish\n#DEFAULT\nOther\n#ENDSWITCH";
        assert_eq!(run_with(src, &[("lang", "at".into())]).0, "German");
        assert_eq!(run_with(src, &[("lang", "en".into())]).0, "English");
        assert_eq!(run_with(src, &[("lang", "fr".into())]).0, "Other");
    }

    #[test]
    fn switch_on_undefined_is_zero() {
        let src = "#SWITCH missing\n#CASE 0\nzero\n#ENDSWITCH";
        assert_eq!(run(src), "zero");
    }

    #[test]
    fn case_outside_switch_reported() {
        let (out, errs) = run_with("a\n#CASE 1\nb", &[]);
        assert_eq!(out, "a\nb");
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].line, 2);
    }

    #[test]
    fn for_in_with_substitution() {
        assert_eq!(run("#FOR x IN a,b,c\n[%x%]\n#ENDFOR"), "[a]\n[b]\n[c]");
    }

    #[test]
    fn for_range_forms() {
        assert_eq!(run("#FOR i FROM 1 TO 3\n%i%\n#ENDF"), "1\n2\n3");
        assert_eq!(run("#FOR i FROM 3 TO 1\n%i%\n#ENDFOR"), "3\n2\n1");
    }

    #[test]
    fn nested_loops() {
        let src = "#FOR a IN 1,2\n#FOR b IN x,y\n%a%%b%\n#ENDFOR\n#ENDFOR";
        assert_eq!(run(src), "1x\n1y\n2x\n2y");
    }

    #[test]
    fn loop_variable_visible_to_conditions() {
        let src = "#FOR i FROM 1 TO 4\n#IF i % 2 == 0\n%i%\n#ENDIF\n#ENDFOR";
        assert_eq!(run(src), "2\n4");
    }

    #[test]
    fn for_in_false_branch_is_inert() {
        let (out, errs) = run_with("#IF 0\n#FOR x IN a,b\n%x%\n#ENDFOR\n#ENDIF\nend", &[]);
        assert_eq!(out, "end");
        assert!(errs.is_empty(), "{errs:?}");
    }

    #[test]
    fn bad_for_skips_body_once() {
        let (out, errs) = run_with("#FOR x FROM 1 TO 3 STEP -1\nbody\n#ENDFOR\nafter", &[]);
        assert_eq!(out, "after");
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].line, 1);
    }

    #[test]
    fn endfor_without_for() {
        let (out, errs) = run_with("a\n#ENDFOR\nb", &[]);
        assert_eq!(out, "a\nb");
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].line, 2);
    }

    #[test]
    fn set_and_substitute() {
        let (out, errs) = run_with("#SET y = x + 1\n%y%", &[("x", Value::Int(2))]);
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(out, "3");
    }

    #[test]
    fn set_errors_leave_variable_alone() {
        let (out, errs) = run_with("#SET x = 1 / 0\n#SET = 3\n#SET 9x = 1\n#SET x\n%x%", &[("x", Value::Int(7))]);
        assert_eq!(out, "7");
        assert_eq!(errs.iter().map(|d| d.line).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn set_in_false_branch_ignored() {
        assert_eq!(run("#SET x = 1\n#IF 0\n#SET x = 2\n#ENDIF\n%x%"), "1");
    }

    #[test]
    fn substitution_modes() {
        let vars: VarStore = [("x", "1")].into_iter().collect();
        let mut pp = pp();
        assert_eq!(pp.parse(Source::Text("%x%".into()), &vars, SubstitutionMode::Off), "%x%");
        let table = [("y".to_owned(), Value::from("2"))].into_iter().collect();
        assert_eq!(
            pp.parse(Source::Text("%x% %y%".into()), &vars, SubstitutionMode::Table(table)),
            "%x% 2"
        );
    }

    #[test]
    fn custom_wrappers() {
        let vars: VarStore = [("x", "1")].into_iter().collect();
        let mut pp = pp();
        pp.set_substitution_wrappers("{{", Some("}}"));
        assert_eq!(pp.parse(Source::Text("{{x}} %x%".into()), &vars, SubstitutionMode::Variables), "1 %x%");
        pp.set_substitution_wrappers("$", None);
        assert_eq!(pp.parse(Source::Text("$x$".into()), &vars, SubstitutionMode::Variables), "1");
        pp.set_substitution_wrappers("", Some("?"));
        assert_eq!(pp.options().wrappers, ("$".to_owned(), "$".to_owned()));
    }

    #[test]
    fn trim_option() {
        let mut pp = pp();
        pp.set_trim_trailing_whitespace(true);
        let out = pp.parse(Source::Text("a  \nb\t".into()), &VarStore::new(), SubstitutionMode::Off);
        assert_eq!(out, "a\nb");
    }

    #[test]
    fn unclosed_blocks_reported_at_opener() {
        let (out, errs) = run_with("#IF 1\na\n#FOR x IN 1\nb", &[]);
        assert_eq!(out, "a\nb");
        assert_eq!(errs.iter().map(|d| d.line).collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn loop_budget() {
        let mut pp = pp();
        pp.set_max_loop_iterations(5);
        let out = pp.parse(
            Source::Text("#FOR i IN 1,2,3\n#FOR j IN a,b\n.\n#ENDFOR\n#ENDFOR".into()),
            &VarStore::new(),
            SubstitutionMode::Off,
        );
        assert!(out.lines().count() <= 5);
        assert!(pp.errors().iter().any(|d| d.message.contains("5 iterations")));
    }

    #[test]
    fn errors_cleared_between_parses() {
        let mut pp = pp();
        pp.parse(Source::Text("#ENDIF".into()), &VarStore::new(), SubstitutionMode::Off);
        assert_eq!(pp.errors().len(), 1);
        pp.parse(Source::Text("ok".into()), &VarStore::new(), SubstitutionMode::Off);
        assert!(pp.errors().is_empty());
    }

    #[test]
    fn caller_variables_untouched() {
        let vars: VarStore = [("x", 1i64)].into_iter().collect();
        let mut pp = pp();
        pp.parse(Source::Text("#SET x = 2".into()), &vars, SubstitutionMode::Variables);
        assert_eq!(vars.get("x"), Some(&Value::Int(1)));
    }

    #[test]
    fn include_splices_and_isolates() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("part.txt"), "#SET x = x + 1\nin:%x%\n").unwrap();
        let mut pp = pp();
        pp.set_source_folder(dir.path());
        let vars: VarStore = [("x", 1i64)].into_iter().collect();
        let out = pp.parse(
            Source::Text("#INCLUDE \"part.txt\"\nout:%x%".into()),
            &vars,
            SubstitutionMode::Variables,
        );
        assert!(pp.errors().is_empty(), "{:?}", pp.errors());
        assert_eq!(out, "in:2\nout:1");
    }

    #[test]
    fn include_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut pp = pp();
        pp.set_source_folder(dir.path());
        let out = pp.parse(Source::Text("a\n#INCLUDE missing.txt\nb".into()), &VarStore::new(), SubstitutionMode::Off);
        assert_eq!(out, "a\nb");
        assert_eq!(pp.errors().len(), 1);
        assert_eq!(pp.errors()[0].line, 2);
        assert!(pp.errors()[0].message.contains("missing.txt"));
    }

    #[test]
    fn include_in_false_branch_skipped() {
        let (out, errs) = run_with("#IF 0\n#INCLUDE missing.txt\n#ENDIF\nok", &[]);
        assert_eq!(out, "ok");
        assert!(errs.is_empty(), "{errs:?}");
    }

    #[test]
    fn recursive_include_hits_depth_limit() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("self.txt"), "x\n#INCLUDE self.txt").unwrap();
        let mut pp = pp();
        pp.set_source_folder(dir.path()).set_max_include_depth(3);
        let out = pp.parse(Source::Text("#INCLUDE self.txt".into()), &VarStore::new(), SubstitutionMode::Off);
        assert_eq!(out, "x\nx\nx");
        assert_eq!(pp.errors().len(), 1);
        assert!(pp.errors()[0].file.is_some());
    }

    #[test]
    fn include_diagnostics_name_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.txt"), "ok\n#ENDIF").unwrap();
        let mut pp = pp();
        pp.set_source_folder(dir.path());
        pp.parse(Source::Text("#INCLUDE bad.txt".into()), &VarStore::new(), SubstitutionMode::Off);
        let d = &pp.errors()[0];
        assert_eq!(d.line, 2);
        assert_eq!(d.file.as_deref(), Some(dir.path().join("bad.txt").as_path()));
    }

    #[test]
    fn file_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.txt");
        std::fs::write(&path, "hello %who%").unwrap();
        let vars: VarStore = [("who", "world")].into_iter().collect();
        let mut pp = pp();
        assert_eq!(pp.parse(Source::File(path.clone()), &vars, SubstitutionMode::Variables), "hello world");
        assert_eq!(Source::guess(path.to_str().unwrap()), Source::File(path));
        assert_eq!(Source::guess("not a file"), Source::Text("not a file".into()));
    }

    #[test]
    fn unreadable_source() {
        let mut pp = pp();
        let out = pp.parse(Source::File("/no/such/file".into()), &VarStore::new(), SubstitutionMode::Off);
        assert_eq!(out, "");
        assert_eq!(pp.errors().len(), 1);
        assert_eq!(pp.errors()[0].line, 0);
    }
}
