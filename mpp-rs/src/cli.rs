//! Command-line argument parsing.
//!
//! Usage:
//!   mpp [-D NAME=VALUE]... [-d FILE] [-I DIR] [-l STYLE] [-w PREFIX[,SUFFIX]]
//!       [--no-subst] [--trim] [--strict] [-o FILE] [-v] <INPUT>
//!
//! `INPUT` may be `-` to read standard input.

use std::path::{Path, PathBuf};

use clap::Parser;

use crate::config::{parse_define, LineEnding, Options};
use crate::script::value::Value;

// ── Public types ──────────────────────────────────────────────────────────────

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "mpp", version, about = "Line-oriented text macro preprocessor")]
pub struct CliArgs {
    /// File to preprocess (`-` for standard input).
    pub input: String,

    /// Define a variable (repeatable).
    #[arg(short = 'D', long = "define", value_name = "NAME=VALUE", value_parser = parse_define_arg)]
    pub defines: Vec<(String, Value)>,

    /// Load variables from a defines file before applying `-D`.
    #[arg(short = 'd', long = "defines", value_name = "FILE")]
    pub defines_file: Option<PathBuf>,

    /// Folder `#INCLUDE` paths are resolved against (default: the input's folder).
    #[arg(short = 'I', long = "include-dir", value_name = "DIR")]
    pub include_dir: Option<PathBuf>,

    /// Output line ending: `windows`, `unix` or a literal delimiter.
    #[arg(short = 'l', long = "line-ending", value_name = "STYLE")]
    pub line_ending: Option<String>,

    /// Substitution markers, e.g. `%` or `{{,}}`.
    #[arg(short = 'w', long = "wrappers", value_name = "PREFIX[,SUFFIX]")]
    pub wrappers: Option<String>,

    /// Emit lines without `%name%` substitution.
    #[arg(long = "no-subst")]
    pub no_subst: bool,

    /// Strip trailing whitespace from emitted lines.
    #[arg(long)]
    pub trim: bool,

    /// Write the result here instead of standard output.
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Exit with status 2 when any diagnostic was recorded.
    #[arg(long)]
    pub strict: bool,

    /// Debug logging on standard error.
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

fn parse_define_arg(s: &str) -> Result<(String, Value), String> {
    parse_define(s)
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse `std::env::args()`.
pub fn parse_args() -> Result<CliArgs, clap::Error> {
    CliArgs::try_parse()
}

/// Parse a slice of argument strings, without the program name (exposed for
/// testing).
pub fn parse_argv(argv: &[String]) -> Result<CliArgs, clap::Error> {
    CliArgs::try_parse_from(std::iter::once("mpp".to_owned()).chain(argv.iter().cloned()))
}

/// Split `PREFIX[,SUFFIX]`.
pub fn split_wrappers(pair: &str) -> (&str, Option<&str>) {
    match pair.split_once(',') {
        Some((prefix, suffix)) => (prefix, Some(suffix)),
        None => (pair, None),
    }
}

impl CliArgs {
    /// `true` when the input comes from standard input.
    pub fn reads_stdin(&self) -> bool {
        self.input == "-"
    }

    /// Engine options implied by the flags.
    pub fn options(&self) -> Options {
        let mut options = Options::default();
        if let Some(style) = &self.line_ending {
            options.line_ending = LineEnding::parse(style);
        }
        options.source_folder = self
            .include_dir
            .clone()
            .unwrap_or_else(|| self.input_folder().to_path_buf());
        options.trim_trailing_whitespace = self.trim;
        options
    }

    fn input_folder(&self) -> &Path {
        if self.reads_stdin() {
            return Path::new("");
        }
        Path::new(&self.input).parent().unwrap_or(Path::new(""))
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

/// `<config dir>/mpp/defines`, if that file exists.
pub fn find_default_defines() -> Option<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "mpp")?;
    let path = dirs.config_dir().join("defines");
    path.is_file().then_some(path)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn input_only() {
        let a = parse_argv(&argv(&["in.txt"])).unwrap();
        assert_eq!(a.input, "in.txt");
        assert!(a.defines.is_empty());
        assert!(!a.no_subst && !a.trim && !a.strict && !a.verbose);
    }

    #[test]
    fn missing_input_is_error() {
        assert!(parse_argv(&argv(&[])).is_err());
    }

    #[test]
    fn repeated_defines() {
        let a = parse_argv(&argv(&["-D", "x=1", "--define", "name=bob", "-Dflag=true", "in"])).unwrap();
        assert_eq!(
            a.defines,
            vec![
                ("x".to_owned(), Value::Int(1)),
                ("name".to_owned(), Value::from("bob")),
                ("flag".to_owned(), Value::Bool(true)),
            ]
        );
    }

    #[test]
    fn bad_define_is_error() {
        assert!(parse_argv(&argv(&["-D", "=1", "in"])).is_err());
    }

    #[test]
    fn unknown_flag() {
        assert!(parse_argv(&argv(&["--bogus", "in"])).is_err());
    }

    #[test]
    fn bool_flags() {
        let a = parse_argv(&argv(&["--no-subst", "--trim", "--strict", "-v", "in"])).unwrap();
        assert!(a.no_subst && a.trim && a.strict && a.verbose);
    }

    #[test]
    fn wrappers() {
        assert_eq!(split_wrappers("%"), ("%", None));
        assert_eq!(split_wrappers("{{,}}"), ("{{", Some("}}")));
    }

    #[test]
    fn options_from_flags() {
        let a = parse_argv(&argv(&["-l", "windows", "--trim", "src/page.tpl"])).unwrap();
        let o = a.options();
        assert_eq!(o.line_ending, LineEnding::Windows);
        assert!(o.trim_trailing_whitespace);
        assert_eq!(o.source_folder, PathBuf::from("src"));
    }

    #[test]
    fn include_dir_overrides_input_folder() {
        let a = parse_argv(&argv(&["-I", "inc", "src/page.tpl"])).unwrap();
        assert_eq!(a.options().source_folder, PathBuf::from("inc"));
    }

    #[test]
    fn stdin_input() {
        let a = parse_argv(&argv(&["-"])).unwrap();
        assert!(a.reads_stdin());
        assert_eq!(a.options().source_folder, PathBuf::new());
    }
}
