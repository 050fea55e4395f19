//! Diagnostic output on stderr, level chosen by `OLOGLEVEL`.
//!
//! The diverted stdout is never written to from here.
use std::env;
use std::io;

use once_cell::sync::OnceCell;
use tracing::level_filters::LevelFilter;
use tracing::span::EnteredSpan;
use tracing::Level;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

pub const LOG_LEVEL_ENV: &str = "OLOGLEVEL";

static INIT: OnceCell<()> = OnceCell::new();

/// Keeps the per-process span (program, pid) entered while alive.
pub struct LogGuard {
    _span: EnteredSpan,
}

/// Map an `OLOGLEVEL` value to a level. Unset or unrecognized means info.
///
/// `warn` and `warning` are both accepted and both select WARN.
pub fn parse_log_level(value: Option<&str>) -> Level {
    match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        Some("debug") => Level::DEBUG,
        Some("info") => Level::INFO,
        Some("warn") | Some("warning") => Level::WARN,
        Some("error") => Level::ERROR,
        _ => Level::INFO,
    }
}

pub fn log_level_from_env() -> Level {
    parse_log_level(env::var(LOG_LEVEL_ENV).ok().as_deref())
}

/// Install the stderr subscriber once per process. `verbose` forces debug.
pub fn log_init(program: &str, verbose: bool) -> Option<LogGuard> {
    if INIT.get().is_some() {
        return None;
    }

    let level = if verbose {
        Level::DEBUG
    } else {
        log_level_from_env()
    };
    let filter = EnvFilter::default().add_directive(LevelFilter::from_level(level).into());
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(atty::is(atty::Stream::Stderr))
        .with_target(false);

    if tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .is_err()
    {
        eprintln!("o: logging init skipped (global subscriber already set)");
        return None;
    }
    let _ = INIT.set(());

    let span = tracing::info_span!("o", program = %program, pid = std::process::id());
    Some(LogGuard {
        _span: span.entered(),
    })
}
