/*!
Process bridge: run the wrapped command and shuttle bytes between the negotiated endpoints
and the child's stdin/stdout.

Completion order:
1. wait for the child to exit (a failure status is reported, not raised);
2. join the output copy, so every byte written before exit reaches the Writer;
3. poll the input copy without blocking. If it is still running (typically an
   interactive stdin nobody will close) it is left behind and dies with the process.
*/
use std::io::{self, Write};
use std::os::unix::process::ExitStatusExt;
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};

use tracing::debug;

use crate::endpoint::{PipeReader, PipeWriter};
use crate::errors::{Direction, PipeError};
use crate::util::shell_join;

#[derive(Debug, Clone, Copy)]
pub struct BridgeOutcome {
    pub status: ExitStatus,
}

impl BridgeOutcome {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Shell-style exit code: the child's code, or 128+signal.
    pub fn exit_code(&self) -> u8 {
        match (self.status.code(), self.status.signal()) {
            (Some(code), _) => (code & 0xff) as u8,
            (None, Some(sig)) => (128 + sig).min(255) as u8,
            (None, None) => 1,
        }
    }
}

type CopyTask = JoinHandle<Result<u64, PipeError>>;

/// Run `argv` with `reader` feeding its stdin and its stdout feeding `writer`.
///
/// Both endpoints are consumed and closed on every path.
pub fn run(
    argv: &[String],
    mut reader: PipeReader,
    writer: PipeWriter,
) -> Result<BridgeOutcome, PipeError> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| PipeError::Usage("no command given".to_string()))?;

    // Dial upstream before anything can exit, so the left neighbor is never left in accept.
    reader.connect()?;

    debug!(cmd = %shell_join(argv), "starting command");
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|e| PipeError::Spawn {
            program: program.clone(),
            source: e,
        })?;

    let child_stdin = child.stdin.take();
    let child_stdout = child.stdout.take();
    let (mut child_stdin, mut child_stdout) = match (child_stdin, child_stdout) {
        (Some(i), Some(o)) => (i, o),
        _ => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(PipeError::Stdio("child stdio pipes missing".to_string()));
        }
    };

    let input: CopyTask = thread::spawn(move || {
        let res = io::copy(&mut reader, &mut child_stdin);
        drop(child_stdin);
        drop(reader);
        match res {
            Ok(n) => Ok(n),
            // The child stopped reading; what it consumed is all it wanted.
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                debug!("child closed its stdin early");
                Ok(0)
            }
            Err(e) => Err(PipeError::BridgeIo {
                direction: Direction::Input,
                source: e,
            }),
        }
    });

    let output: CopyTask = thread::spawn(move || {
        let mut writer = writer;
        let res = io::copy(&mut child_stdout, &mut writer).and_then(|n| {
            writer.flush()?;
            Ok(n)
        });
        drop(child_stdout);
        drop(writer);
        res.map_err(|e| PipeError::BridgeIo {
            direction: Direction::Output,
            source: e,
        })
    });

    let status = child.wait().map_err(|e| PipeError::Wait {
        program: program.clone(),
        source: e,
    })?;
    debug!(%status, "command exited");

    let copied = join_copy(output, Direction::Output)?;
    debug!(bytes = copied, "output copy finished");

    if input.is_finished() {
        let copied = join_copy(input, Direction::Input)?;
        debug!(bytes = copied, "input copy finished");
    } else {
        debug!("input copy still blocked on its source, leaving it behind");
    }

    Ok(BridgeOutcome { status })
}

fn join_copy(task: CopyTask, direction: Direction) -> Result<u64, PipeError> {
    task.join().unwrap_or_else(|_| {
        Err(PipeError::BridgeIo {
            direction,
            source: io::Error::other("copy thread panicked"),
        })
    })
}
