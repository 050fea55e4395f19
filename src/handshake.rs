/*!
Handshake engine: turn the shell pipes around this stage into a Reader, a Writer and the
resolved downstream chain.

Chicken-and-egg: the reader side is read first (the left neighbor's address arrives on
stdin), but the self-description we owe the left neighbor includes everything downstream.
So the writer side is negotiated to completion next, and the reader is returned still
`Pending`; the bridge dials it, and only then does the left neighbor learn the chain.

Wire sequence for `A | B`:
- A binds `<runtime>/opipes-<n>.sock` and writes `{"address": ...}` to its original stdout.
- B decodes that document from its stdin, finishes its own writer side, then dials A and
  sends `{"args": [...B...], "next": <B's downstream>}`.
- A's accept returns; A decodes the chain; the connection becomes A's Writer.

No timeouts and no retries: a neighbor that never connects blocks us forever.
*/
use std::fs;
use std::io;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::endpoint::{PipeReader, PipeWriter};
use crate::errors::PipeError;
use crate::meta::{read_chain, read_document, write_document, PipelineNode, UpstreamAddress};
use crate::session::Session;
use crate::util::{random_suffix, shell_join};

/// Random socket names tried before giving up on finding an unused path.
const SOCKET_PATH_ATTEMPTS: usize = 16;

/// Endpoints for one command execution.
#[derive(Debug)]
pub struct Pipe {
    pub reader: PipeReader,
    pub writer: PipeWriter,
    /// Invocations of every stage to our right, nearest first.
    pub downstream: Option<PipelineNode>,
}

enum Upstream {
    Inherited(std::fs::File),
    Socket(UpstreamAddress),
}

impl Session {
    /// Negotiate with both neighbors.
    ///
    /// `Ok(None)` means there is nothing to do: stdin was already consumed by an earlier
    /// call, or the left neighbor closed its pipe without ever negotiating.
    pub fn establish_pipe(&self) -> Result<Option<Pipe>, PipeError> {
        let upstream = if !self.stdin_is_pipe() {
            match self.take_stdin()? {
                Some(f) => {
                    debug!("consuming stdin for reader pipe");
                    Upstream::Inherited(f)
                }
                None => {
                    debug!("stdin already consumed, nothing to do");
                    return Ok(None);
                }
            }
        } else {
            match read_document::<UpstreamAddress, _>(self.stdin())? {
                Some(addr) => {
                    debug!(address = %addr.address.display(), "received reader pipe");
                    Upstream::Socket(addr)
                }
                None => {
                    debug!("upstream closed without negotiating, nothing to do");
                    return Ok(None);
                }
            }
        };

        let (writer, downstream) = self.open_writer()?;

        let reader = match upstream {
            Upstream::Inherited(f) => PipeReader::Inherited(f),
            Upstream::Socket(addr) => PipeReader::pending(
                addr.address,
                PipelineNode {
                    args: self.args().to_vec(),
                    next: downstream.clone().map(Box::new),
                },
            ),
        };

        debug!("created reader+writer pipe");
        Ok(Some(Pipe {
            reader,
            writer,
            downstream,
        }))
    }

    fn open_writer(&self) -> Result<(PipeWriter, Option<PipelineNode>), PipeError> {
        if !self.stdout_is_pipe() {
            debug!("returning stdout as writer");
            return Ok((PipeWriter::Inherited(self.clone_output()?), None));
        }

        let listener = SocketListener::bind_in(self.runtime_dir())?;
        let ours = UpstreamAddress {
            address: listener.path().to_path_buf(),
        };
        debug!(address = %ours.address.display(), "sending writer pipe");
        write_document(self.output(), &ours)?;

        let conn = listener.accept_one()?;
        let chain = read_chain(&conn)?;
        for (i, node) in chain.iter().enumerate() {
            debug!(stage = i + 1, cmd = %shell_join(&node.args), "received writer pipe");
        }
        Ok((PipeWriter::Socket(conn), Some(chain)))
    }
}

/// Listener for exactly one connection; the socket file goes away with it.
struct SocketListener {
    listener: UnixListener,
    path: PathBuf,
}

impl SocketListener {
    fn bind_in(dir: &Path) -> Result<Self, PipeError> {
        let mut last_err: Option<io::Error> = None;
        for _ in 0..SOCKET_PATH_ATTEMPTS {
            let path = socket_path_in(dir, random_suffix());
            if path.exists() {
                continue;
            }
            match UnixListener::bind(&path) {
                Ok(listener) => return Ok(Self { listener, path }),
                Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                    last_err = Some(e);
                }
                Err(e) => {
                    return Err(PipeError::connectivity(
                        format!("failed to listen on {}", path.display()),
                        e,
                    ))
                }
            }
        }
        Err(PipeError::connectivity(
            format!("no unused socket path under {}", dir.display()),
            last_err.unwrap_or_else(|| io::Error::from(io::ErrorKind::AddrInUse)),
        ))
    }

    fn path(&self) -> &Path {
        &self.path
    }

    /// Block for the single inbound connection, then close the listener either way.
    fn accept_one(self) -> Result<UnixStream, PipeError> {
        debug!(address = %self.path.display(), "waiting for downstream connection");
        self.listener
            .accept()
            .map(|(stream, _)| stream)
            .map_err(|e| {
                PipeError::connectivity(format!("failed to accept on {}", self.path.display()), e)
            })
    }
}

impl Drop for SocketListener {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

pub fn socket_path_in(dir: &Path, suffix: u64) -> PathBuf {
    dir.join(format!("opipes-{suffix}.sock"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_path_convention() {
        let p = socket_path_in(Path::new("/run/user/1000"), 42);
        assert_eq!(p, PathBuf::from("/run/user/1000/opipes-42.sock"));
    }

    #[test]
    fn test_listener_unlinks_socket_on_drop() {
        let td = tempfile::tempdir().expect("tmpdir");
        let l = SocketListener::bind_in(td.path()).expect("bind");
        let path = l.path().to_path_buf();
        assert!(path.exists());
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("opipes-") && name.ends_with(".sock"), "{name}");
        drop(l);
        assert!(!path.exists());
    }

    #[test]
    fn test_bind_in_missing_dir_is_connectivity_error() {
        let td = tempfile::tempdir().expect("tmpdir");
        let missing = td.path().join("nope");
        let r = SocketListener::bind_in(&missing);
        assert!(matches!(r, Err(PipeError::Connectivity { .. })));
    }
}
