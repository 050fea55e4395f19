/*!
Per-process session: who we are, and what the shell connected us to.

The process-level part (probing and diverting inherited stdio) happens once per process;
`Session::init` hands out session values that share it, so the consumed-stdin guard holds
across every session created in the same process. Tests build sessions over their own
descriptors with `Session::with_stdio`.

After `init`, fd 1 points at stderr: anything printed by this process lands on the
diagnostic stream, while the original stdout is kept aside for handshake messages and
the child's real output.
*/
use std::env;
use std::fs::File;
use std::os::fd::{FromRawFd, RawFd};
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use nix::fcntl::{fcntl, FcntlArg};
use nix::unistd::dup2;
use once_cell::sync::OnceCell;
use tracing::debug;

use crate::errors::PipeError;

static PROCESS_STDIO: OnceCell<Arc<InheritedStdio>> = OnceCell::new();

#[derive(Debug)]
struct InheritedStdio {
    stdin: File,
    /// Original stdout, kept writable for protocol use.
    stdout: File,
    stdin_is_pipe: bool,
    stdout_is_pipe: bool,
    consumed_stdin: AtomicBool,
}

impl InheritedStdio {
    fn new(stdin: File, stdout: File) -> Result<Self, PipeError> {
        let stdin_is_pipe = is_named_pipe(&stdin, "stdin")?;
        let stdout_is_pipe = is_named_pipe(&stdout, "stdout")?;
        Ok(Self {
            stdin,
            stdout,
            stdin_is_pipe,
            stdout_is_pipe,
            consumed_stdin: AtomicBool::new(false),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    program: String,
    args: Vec<String>,
    runtime_dir: PathBuf,
    stdio: Arc<InheritedStdio>,
}

impl Session {
    /// Session over this process's inherited stdio.
    ///
    /// Probing and stdout diversion run on the first call only; later calls share them.
    pub fn init(program: impl Into<String>, args: Vec<String>) -> Result<Session, PipeError> {
        let stdio = PROCESS_STDIO
            .get_or_try_init(|| divert_process_stdio().map(Arc::new))?
            .clone();
        let session = Session {
            program: program.into(),
            args,
            runtime_dir: runtime_dir_from_env(),
            stdio,
        };
        debug!(
            stdin_is_pipe = session.stdin_is_pipe(),
            stdout_is_pipe = session.stdout_is_pipe(),
            runtime_dir = %session.runtime_dir.display(),
            "initialized"
        );
        Ok(session)
    }

    /// Session over explicit handles instead of fds 0/1. Nothing is diverted.
    pub fn with_stdio(
        program: impl Into<String>,
        args: Vec<String>,
        stdin: File,
        stdout: File,
    ) -> Result<Session, PipeError> {
        Ok(Session {
            program: program.into(),
            args,
            runtime_dir: runtime_dir_from_env(),
            stdio: Arc::new(InheritedStdio::new(stdin, stdout)?),
        })
    }

    /// Directory for listening sockets.
    pub fn with_runtime_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.runtime_dir = dir.into();
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn runtime_dir(&self) -> &Path {
        &self.runtime_dir
    }

    pub fn stdin_is_pipe(&self) -> bool {
        self.stdio.stdin_is_pipe
    }

    pub fn stdout_is_pipe(&self) -> bool {
        self.stdio.stdout_is_pipe
    }

    pub fn stdin_consumed(&self) -> bool {
        self.stdio.consumed_stdin.load(Ordering::SeqCst)
    }

    /// Hand out the inherited stdin as a reader, once per process.
    pub(crate) fn take_stdin(&self) -> Result<Option<File>, PipeError> {
        if self.stdio.consumed_stdin.swap(true, Ordering::SeqCst) {
            return Ok(None);
        }
        self.stdio
            .stdin
            .try_clone()
            .map(Some)
            .map_err(|e| PipeError::Stdio(format!("failed to duplicate stdin: {e}")))
    }

    pub(crate) fn stdin(&self) -> &File {
        &self.stdio.stdin
    }

    pub(crate) fn output(&self) -> &File {
        &self.stdio.stdout
    }

    pub(crate) fn clone_output(&self) -> Result<File, PipeError> {
        self.stdio
            .stdout
            .try_clone()
            .map_err(|e| PipeError::Stdio(format!("failed to duplicate stdout: {e}")))
    }
}

fn is_named_pipe(f: &File, what: &str) -> Result<bool, PipeError> {
    f.metadata()
        .map(|m| m.file_type().is_fifo())
        .map_err(|e| PipeError::Stdio(format!("failed to stat {what}: {e}")))
}

fn dup_cloexec(fd: RawFd, what: &str) -> Result<File, PipeError> {
    let dup = fcntl(fd, FcntlArg::F_DUPFD_CLOEXEC(0))
        .map_err(|e| PipeError::Stdio(format!("failed to duplicate {what}: {e}")))?;
    // SAFETY: `dup` is a freshly duplicated descriptor owned by nobody else.
    Ok(unsafe { File::from_raw_fd(dup) })
}

fn divert_process_stdio() -> Result<InheritedStdio, PipeError> {
    let stdin = dup_cloexec(libc::STDIN_FILENO, "stdin")?;
    let stdout = dup_cloexec(libc::STDOUT_FILENO, "stdout")?;
    let stdio = InheritedStdio::new(stdin, stdout)?;
    // Our own prints go to stderr so they never corrupt the stdout protocol.
    dup2(libc::STDERR_FILENO, libc::STDOUT_FILENO)
        .map_err(|e| PipeError::Stdio(format!("failed to divert stdout: {e}")))?;
    Ok(stdio)
}

/// `$XDG_RUNTIME_DIR`, or the system temp dir when unset or empty.
pub fn runtime_dir_from_env() -> PathBuf {
    env::var_os("XDG_RUNTIME_DIR")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(env::temp_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_shared_within_process() {
        let a = Session::init("cat", vec!["cat".to_string()]).expect("init");
        let b = Session::init("wc", vec!["wc".to_string()]).expect("init again");
        assert!(Arc::ptr_eq(&a.stdio, &b.stdio));
        assert_eq!(b.program(), "wc");
    }

    #[test]
    fn test_regular_files_are_not_pipes() {
        let stdin = tempfile::tempfile().expect("tmpfile");
        let stdout = tempfile::tempfile().expect("tmpfile");
        let s = Session::with_stdio("cat", vec!["cat".into()], stdin, stdout).unwrap();
        assert!(!s.stdin_is_pipe());
        assert!(!s.stdout_is_pipe());
        assert!(!s.stdin_consumed());
    }

    #[test]
    fn test_take_stdin_only_once() {
        let stdin = tempfile::tempfile().expect("tmpfile");
        let stdout = tempfile::tempfile().expect("tmpfile");
        let s = Session::with_stdio("cat", vec!["cat".into()], stdin, stdout).unwrap();
        assert!(s.take_stdin().unwrap().is_some());
        assert!(s.stdin_consumed());
        assert!(s.take_stdin().unwrap().is_none());
    }
}
