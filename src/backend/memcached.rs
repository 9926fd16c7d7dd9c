//! Memcached text-protocol client backend.
//!
//! A deliberately simple blocking client: one TCP connection, one
//! outstanding request. `get` maps to the protocol's `get`, `put` maps to
//! `set` with flags 0 and no expiry, `close` sends `quit`. Replies are
//! validated just enough to catch a confused server; anything unexpected
//! is a protocol error and aborts the run.

use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::net::TcpStream;

use bytes::Bytes;
use tracing::debug;

use super::{Backend, BackendError};

pub struct MemcachedBackend {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl MemcachedBackend {
    /// Connect to a memcached server at `address` (`host:port`).
    pub fn connect(address: &str) -> Result<Self, BackendError> {
        let stream = TcpStream::connect(address).map_err(|e| BackendError::Connect {
            address: address.to_string(),
            source: e,
        })?;
        // Request/response per command; batching latency would be measured
        // as backend latency.
        stream.set_nodelay(true)?;
        let reader = BufReader::new(stream.try_clone()?);
        let writer = BufWriter::new(stream);
        debug!(address = %address, "Connected to memcached");
        Ok(Self { reader, writer })
    }

    /// Read one CRLF-terminated reply line, without the terminator.
    fn read_line(&mut self) -> Result<String, BackendError> {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line)?;
        if n == 0 {
            return Err(BackendError::Protocol(
                "connection closed by server".to_string(),
            ));
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(line)
    }
}

impl Backend for MemcachedBackend {
    fn get(&mut self, key: &str) -> Result<Option<Bytes>, BackendError> {
        self.writer.write_all(b"get ")?;
        self.writer.write_all(key.as_bytes())?;
        self.writer.write_all(b"\r\n")?;
        self.writer.flush()?;

        let header = self.read_line()?;
        if header == "END" {
            return Ok(None);
        }

        // VALUE <key> <flags> <bytes>[ <cas>]
        let mut parts = header.split_whitespace();
        if parts.next() != Some("VALUE") {
            return Err(BackendError::Protocol(format!(
                "unexpected reply to get: {}",
                header
            )));
        }
        let len: usize = parts
            .nth(2)
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| BackendError::Protocol(format!("bad VALUE header: {}", header)))?;

        let mut data = vec![0u8; len + 2];
        self.reader.read_exact(&mut data)?;
        if !data.ends_with(b"\r\n") {
            return Err(BackendError::Protocol(
                "data block not CRLF-terminated".to_string(),
            ));
        }
        data.truncate(len);

        let footer = self.read_line()?;
        if footer != "END" {
            return Err(BackendError::Protocol(format!(
                "expected END after data block, got: {}",
                footer
            )));
        }
        Ok(Some(Bytes::from(data)))
    }

    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), BackendError> {
        let header = format!("set {} 0 0 {}\r\n", key, value.len());
        self.writer.write_all(header.as_bytes())?;
        self.writer.write_all(value)?;
        self.writer.write_all(b"\r\n")?;
        self.writer.flush()?;

        let reply = self.read_line()?;
        if reply != "STORED" {
            return Err(BackendError::Protocol(format!(
                "set was not stored: {}",
                reply
            )));
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), BackendError> {
        self.writer.write_all(b"quit\r\n")?;
        self.writer.flush()?;
        Ok(())
    }
}
