//! Reader/Writer endpoints handed from the handshake to the bridge.
//!
//! A reader negotiated over a socket starts out `Pending`: its outbound payload (this
//! stage's own `PipelineNode`) is only complete once the downstream handshake finished,
//! so the dial happens on an explicit `connect()` right before the first read.
use std::fs::File;
use std::io::{self, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::PipeError;
use crate::meta::{write_document, PipelineNode};

/// Parameters of a dial that has not happened yet.
#[derive(Debug)]
pub struct PendingDial {
    address: PathBuf,
    description: PipelineNode,
}

impl PendingDial {
    pub fn address(&self) -> &Path {
        &self.address
    }

    pub fn description(&self) -> &PipelineNode {
        &self.description
    }
}

#[derive(Debug)]
pub enum PipeReader {
    /// This process's own stdin; not a pipe, or nobody negotiated on it.
    Inherited(File),
    /// Left neighbor's socket, not dialed yet.
    Pending(PendingDial),
    Connected(UnixStream),
    /// The single connection attempt was made and failed.
    Failed,
}

impl PipeReader {
    pub fn pending(address: impl Into<PathBuf>, description: PipelineNode) -> Self {
        PipeReader::Pending(PendingDial {
            address: address.into(),
            description,
        })
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, PipeReader::Pending(_))
    }

    /// Dial the left neighbor and send our self-description.
    ///
    /// No-op for inherited or already connected readers. At most one dial is ever made.
    pub fn connect(&mut self) -> Result<(), PipeError> {
        match std::mem::replace(self, PipeReader::Failed) {
            PipeReader::Pending(dial) => {
                debug!(address = %dial.address.display(), "connecting to reader pipe");
                let stream = UnixStream::connect(&dial.address).map_err(|e| {
                    PipeError::connectivity(
                        format!("failed to dial {}", dial.address.display()),
                        e,
                    )
                })?;
                write_document(&stream, &dial.description)?;
                debug!(
                    stages = dial.description.depth(),
                    "sent self-description upstream"
                );
                *self = PipeReader::Connected(stream);
                Ok(())
            }
            PipeReader::Failed => Err(PipeError::connectivity(
                "reader endpoint already attempted its connection",
                io::Error::from(io::ErrorKind::NotConnected),
            )),
            ready => {
                *self = ready;
                Ok(())
            }
        }
    }
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            PipeReader::Inherited(f) => f.read(buf),
            PipeReader::Connected(s) => s.read(buf),
            PipeReader::Pending(_) => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "reader endpoint not connected yet",
            )),
            PipeReader::Failed => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "reader endpoint connection failed",
            )),
        }
    }
}

#[derive(Debug)]
pub enum PipeWriter {
    /// The diverted original stdout; not a pipe.
    Inherited(File),
    /// Connection accepted from the right neighbor.
    Socket(UnixStream),
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            PipeWriter::Inherited(f) => f.write(buf),
            PipeWriter::Socket(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            PipeWriter::Inherited(f) => f.flush(),
            PipeWriter::Socket(s) => s.flush(),
        }
    }
}
