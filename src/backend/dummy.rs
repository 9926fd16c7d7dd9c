//! No-op backend.
//!
//! Accepts every command and does nothing, so a run against it measures
//! the harness itself: read, scan, parse, dispatch.

use bytes::Bytes;

use super::{Backend, BackendError};

#[derive(Debug, Default)]
pub struct DummyBackend;

impl DummyBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Backend for DummyBackend {
    fn get(&mut self, _key: &str) -> Result<Option<Bytes>, BackendError> {
        Ok(None)
    }

    fn put(&mut self, _key: &str, _value: &[u8]) -> Result<(), BackendError> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), BackendError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dummy_accepts_everything() {
        let mut backend = DummyBackend::new();
        backend.put("k", b"v").unwrap();
        assert_eq!(backend.get("k").unwrap(), None);
        backend.close().unwrap();
    }
}
