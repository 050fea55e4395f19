use clap::Parser;

use crate::errors::PipeError;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (built ",
    env!("OPIPES_BUILD_DATE"),
    ", ",
    env!("OPIPES_BUILD_TARGET"),
    ", ",
    env!("OPIPES_BUILD_PROFILE"),
    ")"
);

/// Wrapper flags. Only parsed when the invocation contains a literal `--`:
/// `o [FLAGS] -- COMMAND [ARGS...]`. Without `--`, everything is the wrapped command.
#[derive(Parser, Debug, Clone, Default, PartialEq, Eq)]
#[command(
    name = "o",
    version,
    long_version = LONG_VERSION,
    about = "Wrap a command so adjacent pipeline stages learn each other's invocation",
    override_usage = "o [COMMAND...]\n       o [OPTIONS] -- COMMAND [ARGS...]"
)]
pub struct Cli {
    /// Print handshake diagnostics (same as OLOGLEVEL=debug)
    #[arg(long)]
    pub verbose: bool,

    /// Exit with the wrapped command's exit code instead of 0
    #[arg(long = "propagate-status")]
    pub propagate_status: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub cli: Cli,
    /// Wrapped command, verbatim.
    pub command: Vec<String>,
}

/// Split `argv` (including argv[0]) at the first `--`.
///
/// Returns the argv for the wrapper's own parser and the wrapped command.
pub fn split_invocation(argv: &[String]) -> (Vec<String>, Vec<String>) {
    if argv.is_empty() {
        return (Vec::new(), Vec::new());
    }
    match argv.iter().position(|a| a == "--") {
        Some(i) => (argv[..i].to_vec(), argv[i + 1..].to_vec()),
        None => (argv[..1].to_vec(), argv[1..].to_vec()),
    }
}

pub fn parse_invocation(argv: &[String]) -> Result<Invocation, clap::Error> {
    let (flags, command) = split_invocation(argv);
    let cli = if flags.len() > 1 {
        Cli::try_parse_from(flags)?
    } else {
        Cli::default()
    };
    Ok(Invocation { cli, command })
}

/// First line of clap's rendered error, without its `error: ` prefix.
///
/// Usage text and hints are dropped so the failure reports as a single line.
pub fn usage_error(e: &clap::Error) -> PipeError {
    let rendered = e.render().to_string();
    let line = rendered.lines().next().unwrap_or_default().trim();
    PipeError::Usage(line.strip_prefix("error: ").unwrap_or(line).to_string())
}
