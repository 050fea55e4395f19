/*!
Pipe metadata exchanged during the handshake.

Two JSON documents travel between adjacent stages:
- `UpstreamAddress` `{"address": "<socket path>"}` goes left-to-right over the shell pipe.
- `PipelineNode` `{"args": [...], "next": <node|null>}` goes right-to-left as the first
  bytes on the freshly dialed socket.

Documents are read from unbuffered streams one byte at a time so that nothing past the
closing brace is consumed; whatever follows belongs to the data stream.
*/
use std::io::{self, Read, Write};
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::PipeError;

/// Longest downstream chain accepted from a peer.
pub const MAX_CHAIN_DEPTH: usize = 64;

/// One stage's invocation plus everything downstream of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineNode {
    pub args: Vec<String>,
    pub next: Option<Box<PipelineNode>>,
}

impl PipelineNode {
    pub fn new(args: Vec<String>, next: Option<PipelineNode>) -> Self {
        Self {
            args,
            next: next.map(Box::new),
        }
    }

    /// Build a chain from argv lists ordered nearest-first.
    pub fn chain<I>(stages: I) -> Option<PipelineNode>
    where
        I: IntoIterator<Item = Vec<String>>,
        I::IntoIter: DoubleEndedIterator,
    {
        stages
            .into_iter()
            .rev()
            .fold(None, |next, args| Some(PipelineNode::new(args, next)))
    }

    pub fn program(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }

    pub fn iter(&self) -> ChainIter<'_> {
        ChainIter { cur: Some(self) }
    }

    pub fn depth(&self) -> usize {
        self.iter().count()
    }

    /// Argv of every node, nearest first.
    pub fn argvs(&self) -> Vec<Vec<String>> {
        self.iter().map(|n| n.args.clone()).collect()
    }

    /// Reject chains a well-behaved peer never sends.
    pub fn validate(&self) -> Result<(), PipeError> {
        let mut depth = 0usize;
        for node in self.iter() {
            depth += 1;
            if depth > MAX_CHAIN_DEPTH {
                return Err(PipeError::protocol(format!(
                    "downstream chain deeper than {MAX_CHAIN_DEPTH} stages"
                )));
            }
            if node.args.is_empty() {
                return Err(PipeError::protocol(format!(
                    "downstream stage {depth} has an empty argv"
                )));
            }
        }
        Ok(())
    }
}

pub struct ChainIter<'a> {
    cur: Option<&'a PipelineNode>,
}

impl<'a> Iterator for ChainIter<'a> {
    type Item = &'a PipelineNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.cur?;
        self.cur = node.next.as_deref();
        Some(node)
    }
}

/// Bootstrap address of a listening stage. Valid until its single accept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamAddress {
    pub address: PathBuf,
}

/// Write exactly one JSON document, no trailing newline.
pub fn write_document<T, W>(mut w: W, value: &T) -> Result<(), PipeError>
where
    T: Serialize,
    W: Write,
{
    let bytes = serde_json::to_vec(value)?;
    w.write_all(&bytes)
        .and_then(|_| w.flush())
        .map_err(|e| PipeError::connectivity("failed to send handshake document", e))
}

/// Read exactly one JSON document.
///
/// `Ok(None)` means the stream ended before the first non-whitespace byte.
/// Truncated or malformed input is a protocol error; a failing stream is a connectivity error.
pub fn read_document<T, R>(r: R) -> Result<Option<T>, PipeError>
where
    T: DeserializeOwned,
    R: Read,
{
    let mut docs = serde_json::Deserializer::from_reader(r).into_iter::<T>();
    match docs.next() {
        None => Ok(None),
        Some(Ok(v)) => Ok(Some(v)),
        Some(Err(e)) if e.is_io() => Err(PipeError::connectivity(
            "failed to read handshake document",
            io::Error::from(e),
        )),
        Some(Err(e)) => Err(PipeError::protocol(format!(
            "malformed handshake document: {e}"
        ))),
    }
}

/// Read the downstream self-description sent by a dialing peer.
pub fn read_chain<R: Read>(r: R) -> Result<PipelineNode, PipeError> {
    let node: PipelineNode = read_document(r)?.ok_or_else(|| {
        PipeError::protocol("peer closed the connection before describing itself")
    })?;
    node.validate()?;
    Ok(node)
}
