//! Key-value backends the harness drives.
//!
//! A backend is the system under measurement, behind a three-operation
//! capability interface: `get`, `put`, `close`. The harness never looks at
//! a returned value beyond discarding it; backends exist to absorb the
//! command stream at whatever speed they can.
//!
//! Built-in backends:
//! - `dummy`: does nothing, measures pure harness overhead
//! - `memory`: in-process hash map
//! - `memcached`: blocking text-protocol client over TCP

pub mod dummy;
pub mod memcached;
pub mod memory;

use std::fmt;
use std::io;

use bytes::Bytes;
use clap::ValueEnum;
use serde::Deserialize;

pub use dummy::DummyBackend;
pub use memcached::MemcachedBackend;
pub use memory::MemoryBackend;

/// The capability interface a backend exposes to the harness.
///
/// Every call is synchronous: when it returns, the operation has completed
/// from the client's point of view, so command order is preserved.
pub trait Backend {
    /// Look up a key. `Ok(None)` is a miss, not an error.
    fn get(&mut self, key: &str) -> Result<Option<Bytes>, BackendError>;

    /// Store a value under a key, overwriting any previous value.
    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), BackendError>;

    /// Release backend resources. Called once, after the run.
    fn close(&mut self) -> Result<(), BackendError>;
}

/// Which backend to benchmark. Selectable from the CLI and the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Dummy,
    Memory,
    Memcached,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Dummy => write!(f, "dummy"),
            BackendKind::Memory => write!(f, "memory"),
            BackendKind::Memcached => write!(f, "memcached"),
        }
    }
}

/// Backend failures. Any of these aborts the run.
#[derive(Debug)]
pub enum BackendError {
    /// Could not establish the initial connection.
    Connect { address: String, source: io::Error },
    /// The connection failed mid-operation.
    Io(io::Error),
    /// The server replied with something the client does not understand.
    Protocol(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Connect { address, source } => {
                write!(f, "failed to connect to {}: {}", address, source)
            }
            BackendError::Io(e) => write!(f, "backend i/o error: {}", e),
            BackendError::Protocol(msg) => write!(f, "backend protocol error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BackendError::Connect { source, .. } => Some(source),
            BackendError::Io(e) => Some(e),
            BackendError::Protocol(_) => None,
        }
    }
}

impl From<io::Error> for BackendError {
    fn from(e: io::Error) -> Self {
        BackendError::Io(e)
    }
}

/// Build the selected backend. Only `memcached` uses the address.
pub fn create(kind: BackendKind, address: &str) -> Result<Box<dyn Backend>, BackendError> {
    match kind {
        BackendKind::Dummy => Ok(Box::new(DummyBackend::new())),
        BackendKind::Memory => Ok(Box::new(MemoryBackend::new())),
        BackendKind::Memcached => Ok(Box::new(MemcachedBackend::connect(address)?)),
    }
}
