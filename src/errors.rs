//! Error mapping guide:
//! - Nothing crosses the `getenv` boundary as an error; callers log and fall back to the original value.
//! - `OutOfMemory` is the only variant that aborts configuration resolution (to the default configuration).
//! - `Empty` is reserved for sources that exist but carry no data (e.g. an empty `/proc/self/cmdline`).
use std::fmt;
use std::io;

/// Lightweight error enum shared by configuration, introspection and rewriters.
#[derive(Debug)]
pub enum InjectorError {
    Io(io::Error),
    Empty(String),
    OutOfMemory(String),
    Message(String),
}

impl From<io::Error> for InjectorError {
    fn from(e: io::Error) -> Self {
        InjectorError::Io(e)
    }
}

impl From<std::collections::TryReserveError> for InjectorError {
    fn from(e: std::collections::TryReserveError) -> Self {
        InjectorError::OutOfMemory(e.to_string())
    }
}

impl fmt::Display for InjectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InjectorError::Io(e) => write!(f, "{e}"),
            InjectorError::Empty(what) => write!(f, "{what} is empty"),
            InjectorError::OutOfMemory(msg) => write!(f, "out of memory: {msg}"),
            InjectorError::Message(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for InjectorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InjectorError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl InjectorError {
    /// True for errors that should abort configuration resolution as a whole.
    pub fn is_fatal_for_resolution(&self) -> bool {
        matches!(self, InjectorError::OutOfMemory(_))
    }
}
