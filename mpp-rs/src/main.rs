use std::io::{Read, Write};
use std::process::ExitCode;

use tracing::debug;
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt, Layer};

use mpp::cli::{self, CliArgs};
use mpp::config::Defines;
use mpp::{Preprocessor, Source, SubstitutionMode, VarStore};

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(filter),
        )
        .init();
}

fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(a) => a,
        Err(e) => {
            // --help and --version also arrive here.
            let _ = e.print();
            return if e.use_stderr() { ExitCode::from(1) } else { ExitCode::SUCCESS };
        }
    };
    init_tracing(args.verbose);

    match run(&args) {
        Ok(code) => code,
        Err(msg) => {
            eprintln!("mpp: {msg}");
            ExitCode::from(1)
        }
    }
}

/// Variables from the defines file (explicit or default), then `-D`.
fn load_vars(args: &CliArgs) -> Result<VarStore, String> {
    let mut vars = VarStore::new();
    let file = args.defines_file.clone().or_else(cli::find_default_defines);
    if let Some(path) = file {
        debug!(path = %path.display(), "loading defines");
        let (defines, errors) =
            Defines::load_file(&path).map_err(|e| format!("{}: {e}", path.display()))?;
        for e in errors {
            eprintln!("mpp: {}: {e}", path.display());
        }
        vars.extend(defines.vars.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    vars.extend(args.defines.iter().cloned());
    Ok(vars)
}

fn run(args: &CliArgs) -> Result<ExitCode, String> {
    let vars = load_vars(args)?;

    let text = if args.reads_stdin() {
        let mut s = String::new();
        std::io::stdin()
            .read_to_string(&mut s)
            .map_err(|e| format!("stdin: {e}"))?;
        s
    } else {
        std::fs::read_to_string(&args.input).map_err(|e| format!("{}: {e}", args.input))?
    };

    let mut pp = Preprocessor::with_options(args.options());
    if let Some(pair) = &args.wrappers {
        let (prefix, suffix) = cli::split_wrappers(pair);
        pp.set_substitution_wrappers(prefix, suffix);
    }
    let mode = if args.no_subst {
        SubstitutionMode::Off
    } else {
        SubstitutionMode::Variables
    };

    let output = pp.parse(Source::Text(text), &vars, mode);
    for d in pp.errors() {
        eprintln!("mpp: {d}");
    }

    match &args.output {
        Some(path) => std::fs::write(path, &output).map_err(|e| format!("{}: {e}", path.display()))?,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(output.as_bytes())
                .and_then(|_| stdout.flush())
                .map_err(|e| format!("stdout: {e}"))?;
        }
    }

    if args.strict && !pp.errors().is_empty() {
        return Ok(ExitCode::from(2));
    }
    Ok(ExitCode::SUCCESS)
}
