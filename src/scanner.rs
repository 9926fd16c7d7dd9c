//! Fixed-capacity scanning buffer over the command stream.
//!
//! The `Scanner` owns the only buffer in the harness: a single fixed
//! allocation with two cursors, `current` (next unread byte) and `end` (one
//! past the last valid byte). Bytes in `[current, end)` are valid unconsumed
//! input; bytes in `[end, capacity)` are stale. The parser consumes from the
//! front, and when a token is cut off at the valid-data edge the scanner
//! compacts the leftover bytes to the start of the buffer and reads more
//! into the tail, so a token split across reads is reassembled in place.
//!
//! Before each scan the buffer is in exactly one of three states:
//! - `Drain`: everything consumed, read a fresh block from offset 0
//! - `Refill`: a partial command remains, compact it and read into the tail
//! - `Ready`: enough data to scan, hand the window to the parser

use std::fmt;
use std::io::{self, Read};

use tracing::trace;

/// Default buffer capacity in bytes.
pub const DEFAULT_CAPACITY: usize = 4096;

/// Smallest workable capacity: a one-byte-token put plus framing must fit
/// with room to spare past the refill threshold.
pub const MIN_CAPACITY: usize = 16;

/// Refill when fewer bytes than this remain: the shortest command prefix
/// (`"get "` / `"put "`) is 4 bytes, so a smaller window can never hold the
/// start of a command plus its first token byte.
const REFILL_THRESHOLD: usize = 4;

/// Record of a token scan that ran into the valid-data edge.
///
/// `offset` is the token's start relative to `current`, which is stable
/// across compaction (compaction shifts the whole window, preserving
/// distances from the front). A later scan at a different offset is a
/// genuinely new scan; a rescan at the same offset must have grown the
/// token, or the input ended mid-token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenAttempt {
    /// Token start, relative to the window start.
    pub offset: usize,
    /// Scanned length at the last attempt.
    pub len: usize,
}

impl TokenAttempt {
    /// Whether this attempt shows progress over a previously recorded one:
    /// a different token, or the same token grown by at least one byte.
    pub fn supersedes(self, prev: Option<TokenAttempt>) -> bool {
        match prev {
            None => true,
            Some(p) => p.offset != self.offset || self.len > p.len,
        }
    }
}

/// Buffer state, re-evaluated before every scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    /// Buffer fully consumed; read a fresh block.
    Drain,
    /// Partial data left (or the parser asked for more); compact and refill.
    Refill,
    /// Enough valid data to scan.
    Ready,
}

/// Result of bringing the buffer to a scannable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillResult {
    /// The window holds data for the parser.
    Ready,
    /// The source is exhausted and nothing is buffered: the stream is done.
    EndOfInput,
}

/// Scanner errors. All are fatal to the run.
#[derive(Debug)]
pub enum ScanError {
    /// The input source failed (not end-of-input, which is never an error).
    Read(io::Error),
    /// Cursor bookkeeping violated `current <= end <= capacity`.
    CursorInvariant {
        current: usize,
        end: usize,
        capacity: usize,
    },
    /// The buffered data fills the whole buffer without completing a token;
    /// a refill could never add a byte, so the token can never fit.
    TokenTooLarge { len: usize, capacity: usize },
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::Read(e) => write!(f, "error reading input: {}", e),
            ScanError::CursorInvariant {
                current,
                end,
                capacity,
            } => write!(
                f,
                "buffer cursors out of range: current={} end={} capacity={}",
                current, end, capacity
            ),
            ScanError::TokenTooLarge { len, capacity } => write!(
                f,
                "no complete token in {} buffered bytes (buffer capacity {}); raise --buffer-size",
                len, capacity
            ),
        }
    }
}

impl std::error::Error for ScanError {}

/// The owned scanning state: buffer, cursors and truncation-retry record.
pub struct Scanner {
    /// Fixed allocation, made once for the process lifetime.
    buf: Box<[u8]>,
    /// Next unread byte.
    current: usize,
    /// One past the last valid byte.
    end: usize,
    /// Set when the parser hit the valid-data edge mid-token.
    need_more: bool,
    /// The edge-cut token of the pending scan, if any. Survives refills
    /// (the rescan needs it to detect no-progress); cleared when a command
    /// is consumed or the buffer is drained.
    attempt: Option<TokenAttempt>,
    /// Total bytes read from the source.
    bytes_read: u64,
}

impl Scanner {
    /// Create a scanner with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity >= MIN_CAPACITY, "capacity below minimum");
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            current: 0,
            end: 0,
            need_more: false,
            attempt: None,
            bytes_read: 0,
        }
    }

    /// The valid unconsumed bytes, `[current, end)`.
    pub fn window(&self) -> &[u8] {
        &self.buf[self.current..self.end]
    }

    /// The pending edge-cut token record, if any.
    pub fn attempt(&self) -> Option<TokenAttempt> {
        self.attempt
    }

    /// Total bytes read from the source so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Which action the buffer needs before the next scan.
    pub fn state(&self) -> FeedState {
        if self.end <= self.current {
            FeedState::Drain
        } else if self.end - self.current <= REFILL_THRESHOLD || self.need_more {
            FeedState::Refill
        } else {
            FeedState::Ready
        }
    }

    /// Record that the parser hit the valid-data edge mid-token; the next
    /// `fill` will compact and try to extend the window.
    pub fn request_refill(&mut self, attempt: TokenAttempt) {
        self.need_more = true;
        self.attempt = Some(attempt);
    }

    /// Advance past a fully consumed command and clear the retry state.
    pub fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.end - self.current, "consume past end");
        self.current += n;
        self.need_more = false;
        self.attempt = None;
    }

    /// Bring the buffer to a scannable state, reading from `source` as the
    /// state machine dictates. Returns `EndOfInput` only when the source is
    /// exhausted with nothing left buffered; end-of-input hit while a
    /// partial command is buffered is not terminal, the residue still gets
    /// scanned (and judged) by the parser.
    pub fn fill<R: Read>(&mut self, source: &mut R) -> Result<FillResult, ScanError> {
        loop {
            match self.state() {
                FeedState::Ready => return Ok(FillResult::Ready),

                FeedState::Drain => {
                    self.current = 0;
                    self.end = 0;
                    self.need_more = false;
                    self.attempt = None;
                    let n = read_retrying(source, &mut self.buf)?;
                    if n == 0 {
                        return Ok(FillResult::EndOfInput);
                    }
                    self.bytes_read += n as u64;
                    self.end = n;
                    trace!(bytes = n, "buffer refilled from empty");
                }

                FeedState::Refill => {
                    if self.current > self.end || self.end > self.buf.len() {
                        return Err(ScanError::CursorInvariant {
                            current: self.current,
                            end: self.end,
                            capacity: self.buf.len(),
                        });
                    }
                    let kept = self.end - self.current;
                    if kept == self.buf.len() {
                        // Full buffer and the parser still wants more:
                        // the token can never complete.
                        return Err(ScanError::TokenTooLarge {
                            len: kept,
                            capacity: self.buf.len(),
                        });
                    }
                    // Overlap-safe move of the leftover bytes to the front.
                    self.buf.copy_within(self.current..self.end, 0);
                    self.current = 0;
                    self.end = kept;
                    self.need_more = false;
                    let n = read_retrying(source, &mut self.buf[kept..])?;
                    self.bytes_read += n as u64;
                    self.end = kept + n;
                    trace!(kept, read = n, "buffer compacted and refilled");
                    if n == 0 {
                        // End of input with residue buffered: scan it as-is.
                        return Ok(FillResult::Ready);
                    }
                    // Loop: the window may still be under the threshold.
                }
            }
        }
    }
}

/// Read, retrying on `Interrupted`. `Ok(0)` is end-of-input, never an error.
fn read_retrying<R: Read>(source: &mut R, buf: &mut [u8]) -> Result<usize, ScanError> {
    loop {
        match source.read(buf) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ScanError::Read(e)),
        }
    }
}
