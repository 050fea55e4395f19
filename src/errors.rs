//! Error mapping guide:
//! - Every fatal error, wrapper usage errors included, exits with code 1.
//! - End-of-chain ("nothing to do") is not an error and never reaches this module.
//! - Every fatal error is reported once by `main` as `error: <Display>`.
use std::fmt;
use std::io;

/// Which copy direction of the bridge failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Reader endpoint into the child's stdin.
    Input,
    /// Child's stdout into the Writer endpoint.
    Output,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Input => "input",
            Direction::Output => "output",
        }
    }
}

#[derive(Debug)]
pub enum PipeError {
    /// Malformed or unexpected handshake payload.
    Protocol(String),
    /// Listen, accept or dial failure. Never retried.
    Connectivity { what: String, source: io::Error },
    /// The wrapped command could not be started.
    Spawn { program: String, source: io::Error },
    /// The wrapped command started but its exit could not be collected.
    Wait { program: String, source: io::Error },
    /// Read/write failure while shuttling bytes.
    BridgeIo { direction: Direction, source: io::Error },
    /// Inherited stdio could not be probed or diverted.
    Stdio(String),
    /// Bad wrapper invocation (no command, unknown flag).
    Usage(String),
}

impl PipeError {
    pub fn protocol(msg: impl Into<String>) -> Self {
        PipeError::Protocol(msg.into())
    }

    pub fn connectivity(what: impl Into<String>, source: io::Error) -> Self {
        PipeError::Connectivity {
            what: what.into(),
            source,
        }
    }
}

impl fmt::Display for PipeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipeError::Protocol(msg) => write!(f, "protocol error: {msg}"),
            PipeError::Connectivity { what, source } => write!(f, "{what}: {source}"),
            PipeError::Spawn { program, source } => {
                write!(f, "failed to start {program}: {source}")
            }
            PipeError::Wait { program, source } => {
                write!(f, "failed to wait for {program}: {source}")
            }
            PipeError::BridgeIo { direction, source } => {
                write!(f, "{} copy failed: {source}", direction.as_str())
            }
            PipeError::Stdio(msg) => write!(f, "stdio: {msg}"),
            PipeError::Usage(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for PipeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipeError::Connectivity { source, .. }
            | PipeError::Spawn { source, .. }
            | PipeError::Wait { source, .. }
            | PipeError::BridgeIo { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for PipeError {
    fn from(e: serde_json::Error) -> Self {
        PipeError::Protocol(e.to_string())
    }
}

/// Exit code of the wrapper for any fatal error.
pub const FATAL_EXIT_CODE: u8 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_failure_is_not_reported_as_spawn() {
        let e = PipeError::Wait {
            program: "sleep".to_string(),
            source: io::Error::from(io::ErrorKind::Interrupted),
        };
        let s = e.to_string();
        assert!(s.starts_with("failed to wait for sleep: "), "{s}");
        assert!(std::error::Error::source(&e).is_some());
    }

    #[test]
    fn test_display_is_single_line() {
        let e = PipeError::protocol("unexpected end of address document");
        let s = e.to_string();
        assert_eq!(s, "protocol error: unexpected end of address document");
        assert!(!s.contains('\n'));
    }
}
