//! In-process hash map backend.
//!
//! Stores everything in a `HashMap`, so a run against it measures the
//! harness plus a realistic store without any network in the way.

use std::collections::HashMap;

use bytes::Bytes;

use super::{Backend, BackendError};

#[derive(Debug, Default)]
pub struct MemoryBackend {
    data: HashMap<String, Bytes>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
        }
    }
}

impl Backend for MemoryBackend {
    fn get(&mut self, key: &str) -> Result<Option<Bytes>, BackendError> {
        Ok(self.data.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), BackendError> {
        self.data
            .insert(key.to_string(), Bytes::copy_from_slice(value));
        Ok(())
    }

    fn close(&mut self) -> Result<(), BackendError> {
        self.data.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_then_get() {
        let mut backend = MemoryBackend::new();
        backend.put("key1", b"value1").unwrap();
        assert_eq!(
            backend.get("key1").unwrap(),
            Some(Bytes::from_static(b"value1"))
        );
    }

    #[test]
    fn test_get_missing_is_a_miss() {
        let mut backend = MemoryBackend::new();
        assert_eq!(backend.get("nope").unwrap(), None);
    }

    #[test]
    fn test_put_overwrites() {
        let mut backend = MemoryBackend::new();
        backend.put("k", b"old").unwrap();
        backend.put("k", b"new").unwrap();
        assert_eq!(backend.get("k").unwrap(), Some(Bytes::from_static(b"new")));
    }

    #[test]
    fn test_close_drops_data() {
        let mut backend = MemoryBackend::new();
        backend.put("k", b"v").unwrap();
        backend.close().unwrap();
        assert_eq!(backend.get("k").unwrap(), None);
    }
}
