//! Error types for the engine's narrow failure surface.
//!
//! Two kinds of failure matter here: thread creation failing to start the
//! worker, and allocation failure, which this layer does not attempt to
//! recover from. There is no third-party error crate; this is a hand-rolled
//! enum with manual `Display`/`std::error::Error` impls.

use std::error::Error;
use std::fmt;
use std::io;

/// Why [`crate::queue::RequestQueue::start`] failed to spawn its worker
/// thread.
///
/// `start()` itself returns a plain `bool`, so this type exists for callers
/// that want to know why, not as `start`'s return type: construct it from
/// the `io::Error` a failed `thread::Builder::spawn` hands back before
/// logging or otherwise reporting the failure.
#[derive(Debug)]
pub struct StartError {
    kind: ErrorKind,
}

#[derive(Debug)]
enum ErrorKind {
    IoError(io::Error),
}

impl StartError {
    pub(crate) fn from_spawn_failure(err: io::Error) -> Self {
        StartError {
            kind: ErrorKind::IoError(err),
        }
    }
}

impl fmt::Display for StartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::IoError(e) => write!(f, "failed to spawn worker thread: {e}"),
        }
    }
}

impl Error for StartError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.kind {
            ErrorKind::IoError(e) => Some(e),
        }
    }
}
