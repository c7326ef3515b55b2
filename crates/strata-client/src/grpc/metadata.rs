//! Call metadata (gRPC headers).

use std::str::FromStr;

use tonic::metadata::{Ascii, KeyAndValueRef, MetadataKey, MetadataMap, MetadataValue};

use crate::error::{ClientError, Result};

/// Ordered call metadata with mapping semantics.
///
/// Metadata in gRPC is similar to HTTP headers. Keys are normalized to
/// lowercase, and inserting an existing key replaces its value in place,
/// so merging sources in precedence order is deterministic and
/// last-write-wins per key.
///
/// # Example
///
/// ```ignore
/// use strata_client::Metadata;
///
/// let mut metadata = Metadata::new();
/// metadata.insert("x-request-id", "12345");
/// metadata.insert("x-request-id", "67890"); // replaces the first value
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: Vec<(String, String)>,
}

impl Metadata {
    /// Create empty metadata.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Create metadata from key/value pairs, later duplicates winning.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut metadata = Self::new();
        for (key, value) in pairs {
            metadata.insert(key, value);
        }
        metadata
    }

    /// Insert an entry, replacing any existing value for the key.
    ///
    /// A replaced key keeps its original position in the sequence.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into().to_ascii_lowercase();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Get a value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        let key = key.to_ascii_lowercase();
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Remove an entry, returning its value if it was present.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let key = key.to_ascii_lowercase();
        let index = self.entries.iter().position(|(k, _)| *k == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Check if a key exists.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Check if the metadata is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterate over entries in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Merge another metadata source into this one.
    ///
    /// Every entry of `other` overwrites any entry of the same key, so the
    /// later source takes precedence.
    pub fn merge(&mut self, other: &Metadata) {
        for (key, value) in other.iter() {
            self.insert(key, value);
        }
    }

    /// Convert into a tonic [`MetadataMap`] for an outgoing request.
    ///
    /// Fails if any key or value is not valid ASCII header material.
    pub fn to_metadata_map(&self) -> Result<MetadataMap> {
        let mut map = MetadataMap::new();
        for (key, value) in self.iter() {
            let key = MetadataKey::from_str(key)
                .map_err(|e| ClientError::InvalidHeader(format!("invalid metadata key: {e}")))?;
            let value: MetadataValue<Ascii> = value
                .parse()
                .map_err(|e| ClientError::InvalidHeader(format!("invalid metadata value: {e}")))?;
            map.insert(key, value);
        }
        Ok(map)
    }

    /// Extract the ASCII entries of a tonic [`MetadataMap`].
    ///
    /// Binary (`-bin`) entries are skipped; this is used for trailing
    /// metadata inspection, where only text values matter.
    pub fn from_metadata_map(map: &MetadataMap) -> Self {
        let mut metadata = Self::new();
        for entry in map.iter() {
            if let KeyAndValueRef::Ascii(key, value) = entry {
                if let Ok(value) = value.to_str() {
                    metadata.insert(key.as_str(), value);
                }
            }
        }
        metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get() {
        let mut metadata = Metadata::new();
        metadata.insert("x-test", "foo");

        assert_eq!(metadata.get("x-test"), Some("foo"));
        assert!(metadata.contains_key("x-test"));
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut metadata = Metadata::new();
        metadata.insert("a", "1");
        metadata.insert("b", "2");
        metadata.insert("a", "3");

        let entries: Vec<_> = metadata.iter().collect();
        assert_eq!(entries, vec![("a", "3"), ("b", "2")]);
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let mut metadata = Metadata::new();
        metadata.insert("X-Test", "foo");

        assert_eq!(metadata.get("x-test"), Some("foo"));
        metadata.insert("x-TEST", "bar");
        assert_eq!(metadata.len(), 1);
        assert_eq!(metadata.get("X-Test"), Some("bar"));
    }

    #[test]
    fn test_merge_is_right_biased() {
        let defaults = Metadata::from_pairs([("a", "client"), ("b", "client")]);
        let operation = Metadata::from_pairs([("b", "operation"), ("c", "operation")]);
        let call = Metadata::from_pairs([("c", "call")]);

        let mut merged = Metadata::new();
        merged.merge(&defaults);
        merged.merge(&operation);
        merged.merge(&call);

        assert_eq!(merged.get("a"), Some("client"));
        assert_eq!(merged.get("b"), Some("operation"));
        assert_eq!(merged.get("c"), Some("call"));
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn test_remove() {
        let mut metadata = Metadata::from_pairs([("key", "value")]);

        assert_eq!(metadata.remove("key"), Some("value".to_string()));
        assert!(!metadata.contains_key("key"));
        assert_eq!(metadata.remove("key"), None);
    }

    #[test]
    fn test_to_metadata_map() {
        let metadata = Metadata::from_pairs([("x-test", "foo"), ("user-agent", "client/1.0")]);

        let map = metadata.to_metadata_map().unwrap();
        assert_eq!(map.get("x-test").unwrap(), "foo");
        assert_eq!(map.get("user-agent").unwrap(), "client/1.0");
    }

    #[test]
    fn test_to_metadata_map_rejects_invalid_key() {
        let metadata = Metadata::from_pairs([("not a header", "foo")]);

        let result = metadata.to_metadata_map();
        assert!(matches!(result, Err(ClientError::InvalidHeader(_))));
    }

    #[test]
    fn test_from_metadata_map_roundtrip() {
        let metadata = Metadata::from_pairs([("retry-after", "30")]);
        let map = metadata.to_metadata_map().unwrap();

        let back = Metadata::from_metadata_map(&map);
        assert_eq!(back.get("retry-after"), Some("30"));
    }
}
