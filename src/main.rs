use std::process::ExitCode;

use anyhow::{bail, Result};
use tracing::{debug, info};

use opipes::cli::{parse_invocation, usage_error, Invocation};
use opipes::{bridge, logging, Rewriter, Session, FATAL_EXIT_CODE};

fn run(inv: Invocation) -> Result<u8> {
    let Some(program) = inv.command.first().cloned() else {
        bail!("no command given");
    };
    let _log = logging::log_init(&program, inv.cli.verbose);

    let session = Session::init(&program, inv.command)?;
    let Some(pipe) = session.establish_pipe()? else {
        debug!("nothing to do");
        return Ok(0);
    };

    let argv = Rewriter::default().substitute(session.args(), pipe.downstream.as_ref());
    let outcome = bridge::run(&argv, pipe.reader, pipe.writer)?;
    if !outcome.success() {
        info!(status = %outcome.status, "command failed");
    }

    Ok(if inv.cli.propagate_status {
        outcome.exit_code()
    } else {
        0
    })
}

fn main() -> ExitCode {
    let argv: Vec<String> = std::env::args().collect();
    let result = match parse_invocation(&argv) {
        Ok(inv) => run(inv),
        // --help and --version
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => Err(usage_error(&e).into()),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(FATAL_EXIT_CODE)
        }
    }
}
