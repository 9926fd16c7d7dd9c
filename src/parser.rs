//! Command parser over the scanner's window.
//!
//! The stream is a sequence of newline-terminated commands:
//!
//! ```text
//! get <key>\n
//! put <key> <value>\n
//! ```
//!
//! Keys and values are single tokens: any bytes except space and newline.
//! Parsing is non-destructive; the caller consumes bytes only after a
//! `Complete`. A token that runs into the end of the window may just be cut
//! off by the read boundary, so the parser reports `NeedMore` with a
//! [`TokenAttempt`] and is re-run on the extended window. If a rescan of
//! the same token makes no progress, the input genuinely ended mid-command
//! and the parser classifies the failure instead.

use std::fmt;

use bytes::Bytes;

use crate::scanner::TokenAttempt;

/// Length of a command prefix, `"get "` or `"put "`.
pub const PREFIX_LEN: usize = 4;

/// A fully parsed command with owned key and value, valid after the
/// buffer has moved on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Get { key: String },
    Put { key: String, value: Bytes },
}

/// Result of scanning one window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseResult {
    /// A complete command and the bytes it occupied, newline included.
    Complete(Command, usize),
    /// A token ran into the valid-data edge; refill and rescan.
    NeedMore(TokenAttempt),
    /// The window cannot become a valid command. Fatal.
    Error(ParseError),
}

/// Why a window can never parse. Each variant carries the offending bytes
/// as buffered, lossily decoded for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A `get` key terminated by a space, or cut off by end of input.
    MalformedGet(String),
    /// A `put` whose value never arrived.
    IncompletePut(String),
    /// A `put` key not followed by a space.
    PutSeparator(String),
    /// A `put` value not followed by a newline, or cut off by end of input.
    PutTerminator(String),
    /// A leading byte that names no command.
    UnknownCommand(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::MalformedGet(at) => {
                write!(f, "get command must be followed by a newline; found: {}", at)
            }
            ParseError::IncompletePut(at) => write!(f, "incomplete put command: {}", at),
            ParseError::PutSeparator(at) => {
                write!(f, "put key must be followed by a space; found: {}", at)
            }
            ParseError::PutTerminator(at) => {
                write!(f, "put value must be followed by a newline; found: {}", at)
            }
            ParseError::UnknownCommand(at) => write!(f, "unknown command: {}", at),
        }
    }
}

impl std::error::Error for ParseError {}

/// Scan one command from the front of `window`.
///
/// `prev` is the edge-cut token record from the previous scan of this same
/// command, if any; a `NeedMore` is only reported when the current scan
/// supersedes it, otherwise the stalled token is classified as an error.
pub fn parse(window: &[u8], prev: Option<TokenAttempt>) -> ParseResult {
    let first = match window.first() {
        Some(&b) => b,
        // An empty window is drained before it ever reaches the parser.
        None => return ParseResult::NeedMore(TokenAttempt { offset: 0, len: 0 }),
    };

    match first {
        b'g' | b'p' => {}
        _ => {
            let shown = &window[..window.len().min(3)];
            return ParseResult::Error(ParseError::UnknownCommand(lossy(shown)));
        }
    }

    // The 4-byte prefix is trusted from the leading byte on; the generator
    // contract guarantees well-formed prefixes. A window too short to hold
    // prefix plus any token byte is treated as an attempt on the prefix
    // itself, so end-of-input mid-prefix resolves through the same
    // no-progress protocol as any cut token.
    if window.len() <= PREFIX_LEN {
        let attempt = TokenAttempt {
            offset: 0,
            len: window.len(),
        };
        if attempt.supersedes(prev) {
            return ParseResult::NeedMore(attempt);
        }
        return ParseResult::Error(truncated(first, window));
    }

    let key_start = PREFIX_LEN;
    let key_len = token_len(&window[key_start..]);

    if key_start + key_len == window.len() {
        let attempt = TokenAttempt {
            offset: key_start,
            len: key_len,
        };
        if attempt.supersedes(prev) {
            return ParseResult::NeedMore(attempt);
        }
        return ParseResult::Error(truncated(first, window));
    }

    match first {
        b'g' => {
            if window[key_start + key_len] != b'\n' {
                return ParseResult::Error(ParseError::MalformedGet(lossy(window)));
            }
            let key = lossy(&window[key_start..key_start + key_len]);
            ParseResult::Complete(Command::Get { key }, key_start + key_len + 1)
        }
        _ => {
            if window[key_start + key_len] != b' ' {
                return ParseResult::Error(ParseError::PutSeparator(lossy(window)));
            }
            let value_start = key_start + key_len + 1;
            let value_len = token_len(&window[value_start..]);

            if value_start + value_len == window.len() {
                let attempt = TokenAttempt {
                    offset: value_start,
                    len: value_len,
                };
                if attempt.supersedes(prev) {
                    return ParseResult::NeedMore(attempt);
                }
                return ParseResult::Error(ParseError::PutTerminator(lossy(window)));
            }
            if window[value_start + value_len] != b'\n' {
                return ParseResult::Error(ParseError::PutTerminator(lossy(window)));
            }

            let key = lossy(&window[key_start..key_start + key_len]);
            let value = Bytes::copy_from_slice(&window[value_start..value_start + value_len]);
            ParseResult::Complete(
                Command::Put { key, value },
                value_start + value_len + 1,
            )
        }
    }
}

/// Length of the token at the head of `bytes`: everything up to the first
/// space or newline, or the whole slice if neither occurs.
fn token_len(bytes: &[u8]) -> usize {
    bytes
        .iter()
        .position(|&b| b == b' ' || b == b'\n')
        .unwrap_or(bytes.len())
}

/// Classify a command cut off by end of input, by its leading byte.
fn truncated(first: u8, window: &[u8]) -> ParseError {
    if first == b'g' {
        ParseError::MalformedGet(lossy(window))
    } else {
        ParseError::IncompletePut(lossy(window))
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_get() {
        match parse(b"get mykey\n", None) {
            ParseResult::Complete(Command::Get { key }, consumed) => {
                assert_eq!(key, "mykey");
                assert_eq!(consumed, 10);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_parse_put() {
        match parse(b"put mykey myvalue\n", None) {
            ParseResult::Complete(Command::Put { key, value }, consumed) => {
                assert_eq!(key, "mykey");
                assert_eq!(&value[..], b"myvalue");
                assert_eq!(consumed, 18);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_parse_leaves_trailing_bytes() {
        // Only the first command is consumed; the rest stays for the
        // next scan.
        match parse(b"get a\nput b c\n", None) {
            ParseResult::Complete(Command::Get { key }, consumed) => {
                assert_eq!(key, "a");
                assert_eq!(consumed, 6);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_empty_key_and_value_are_valid() {
        match parse(b"get \n", None) {
            ParseResult::Complete(Command::Get { key }, 5) => assert_eq!(key, ""),
            other => panic!("unexpected: {:?}", other),
        }
        match parse(b"put k \n", None) {
            ParseResult::Complete(Command::Put { key, value }, 7) => {
                assert_eq!(key, "k");
                assert!(value.is_empty());
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_get_key_at_edge_requests_more() {
        match parse(b"get abc", None) {
            ParseResult::NeedMore(attempt) => {
                assert_eq!(attempt, TokenAttempt { offset: 4, len: 3 });
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_get_key_at_edge_without_progress_is_malformed() {
        let prev = Some(TokenAttempt { offset: 4, len: 3 });
        match parse(b"get abc", prev) {
            ParseResult::Error(ParseError::MalformedGet(at)) => assert_eq!(at, "get abc"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_grown_key_still_requests_more() {
        let prev = Some(TokenAttempt { offset: 4, len: 3 });
        match parse(b"get abcdef", prev) {
            ParseResult::NeedMore(attempt) => {
                assert_eq!(attempt, TokenAttempt { offset: 4, len: 6 });
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_get_key_ended_by_space_is_malformed() {
        match parse(b"get a b\n", None) {
            ParseResult::Error(ParseError::MalformedGet(_)) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_put_key_at_edge_stalled_is_incomplete() {
        let prev = Some(TokenAttempt { offset: 4, len: 3 });
        match parse(b"put abc", prev) {
            ParseResult::Error(ParseError::IncompletePut(at)) => assert_eq!(at, "put abc"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_put_key_terminated_by_newline_is_separator_error() {
        match parse(b"put abc\n", None) {
            ParseResult::Error(ParseError::PutSeparator(_)) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_put_value_at_edge_requests_more_then_fails() {
        match parse(b"put k abc", None) {
            ParseResult::NeedMore(attempt) => {
                assert_eq!(attempt, TokenAttempt { offset: 6, len: 3 });
            }
            other => panic!("unexpected: {:?}", other),
        }
        // A stalled value must never dispatch as a complete put.
        let prev = Some(TokenAttempt { offset: 6, len: 3 });
        match parse(b"put k abc", prev) {
            ParseResult::Error(ParseError::PutTerminator(at)) => assert_eq!(at, "put k abc"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_attempt_offsets_distinguish_key_from_value() {
        // A key attempt from an earlier command shape never suppresses a
        // value scan at a different offset.
        let prev = Some(TokenAttempt { offset: 4, len: 3 });
        match parse(b"put abc d", prev) {
            ParseResult::NeedMore(attempt) => {
                assert_eq!(attempt, TokenAttempt { offset: 8, len: 1 });
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_short_window_is_an_attempt_on_the_prefix() {
        match parse(b"ge", None) {
            ParseResult::NeedMore(attempt) => {
                assert_eq!(attempt, TokenAttempt { offset: 0, len: 2 });
            }
            other => panic!("unexpected: {:?}", other),
        }
        // No growth on rescan: the stream ended mid-prefix.
        let prev = Some(TokenAttempt { offset: 0, len: 2 });
        match parse(b"ge", prev) {
            ParseResult::Error(ParseError::MalformedGet(at)) => assert_eq!(at, "ge"),
            other => panic!("unexpected: {:?}", other),
        }
        let prev = Some(TokenAttempt { offset: 0, len: 3 });
        match parse(b"put", prev) {
            ParseResult::Error(ParseError::IncompletePut(at)) => assert_eq!(at, "put"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_command_reports_leading_bytes() {
        match parse(b"delete mykey\n", None) {
            ParseResult::Error(ParseError::UnknownCommand(at)) => assert_eq!(at, "del"),
            other => panic!("unexpected: {:?}", other),
        }
        // Shorter than three bytes: report what is there, no more.
        match parse(b"x", None) {
            ParseResult::Error(ParseError::UnknownCommand(at)) => assert_eq!(at, "x"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_binary_safe_tokens() {
        let mut input = b"put k ".to_vec();
        input.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        input.push(b'\n');
        match parse(&input, None) {
            ParseResult::Complete(Command::Put { key, value }, consumed) => {
                assert_eq!(key, "k");
                assert_eq!(&value[..], &[0xde, 0xad, 0xbe, 0xef]);
                assert_eq!(consumed, input.len());
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
