//! The benchmark driver.
//!
//! Pulls the command stream through the scanner, parses commands off the
//! front of the window and dispatches each one to the backend, in input
//! order, one at a time. A command is dispatched only when fully parsed;
//! the next scan starts only after the backend call returns. Any error is
//! fatal: the run stops and the error is mapped to a process exit code.

use std::fmt;
use std::io::Read;
use std::time::{Duration, Instant};

use tracing::trace;

use crate::backend::{Backend, BackendError};
use crate::parser::{self, Command, ParseError, ParseResult};
use crate::scanner::{FillResult, ScanError, Scanner};

/// Counters for a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub gets: u64,
    pub puts: u64,
    pub bytes_read: u64,
    pub elapsed: Duration,
}

impl RunStats {
    pub fn commands(&self) -> u64 {
        self.gets + self.puts
    }

    pub fn ops_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.commands() as f64 / secs
    }
}

/// Anything that can abort a run.
#[derive(Debug)]
pub enum BenchError {
    Scan(ScanError),
    Parse(ParseError),
    Backend(BackendError),
}

impl BenchError {
    /// Process exit code for this failure. Each class gets its own code so
    /// a supervising script can tell bad input from a bad backend without
    /// parsing logs.
    pub fn exit_code(&self) -> i32 {
        match self {
            BenchError::Backend(_) => 2,
            BenchError::Scan(ScanError::Read(_)) => 3,
            BenchError::Scan(ScanError::CursorInvariant { .. }) => 4,
            BenchError::Parse(ParseError::MalformedGet(_)) => 6,
            BenchError::Parse(ParseError::IncompletePut(_)) => 7,
            BenchError::Parse(ParseError::PutSeparator(_)) => 8,
            BenchError::Parse(ParseError::PutTerminator(_)) => 9,
            BenchError::Parse(ParseError::UnknownCommand(_)) => 10,
            BenchError::Scan(ScanError::TokenTooLarge { .. }) => 11,
        }
    }
}

impl fmt::Display for BenchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BenchError::Scan(e) => write!(f, "{}", e),
            BenchError::Parse(e) => write!(f, "{}", e),
            BenchError::Backend(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for BenchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BenchError::Scan(e) => Some(e),
            BenchError::Parse(e) => Some(e),
            BenchError::Backend(e) => Some(e),
        }
    }
}

impl From<ScanError> for BenchError {
    fn from(e: ScanError) -> Self {
        BenchError::Scan(e)
    }
}

impl From<ParseError> for BenchError {
    fn from(e: ParseError) -> Self {
        BenchError::Parse(e)
    }
}

impl From<BackendError> for BenchError {
    fn from(e: BackendError) -> Self {
        BenchError::Backend(e)
    }
}

/// Stream commands from `source` into `backend` until the input is
/// exhausted or something fails.
pub fn run<R: Read>(
    source: &mut R,
    backend: &mut dyn Backend,
    scanner: &mut Scanner,
) -> Result<RunStats, BenchError> {
    let started = Instant::now();
    let mut gets = 0u64;
    let mut puts = 0u64;

    loop {
        match scanner.fill(source)? {
            FillResult::EndOfInput => break,
            FillResult::Ready => {}
        }

        match parser::parse(scanner.window(), scanner.attempt()) {
            ParseResult::Complete(command, consumed) => {
                match command {
                    Command::Get { key } => {
                        trace!(key = %key, "get");
                        backend.get(&key)?;
                        gets += 1;
                    }
                    Command::Put { key, value } => {
                        trace!(key = %key, len = value.len(), "put");
                        backend.put(&key, &value)?;
                        puts += 1;
                    }
                }
                scanner.consume(consumed);
            }
            ParseResult::NeedMore(attempt) => {
                trace!(
                    offset = attempt.offset,
                    len = attempt.len,
                    "token cut at window edge, refilling"
                );
                scanner.request_refill(attempt);
            }
            ParseResult::Error(e) => return Err(BenchError::Parse(e)),
        }
    }

    Ok(RunStats {
        gets,
        puts,
        bytes_read: scanner.bytes_read(),
        elapsed: started.elapsed(),
    })
}
