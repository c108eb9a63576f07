//! Checksum utilities for snapshot integrity verification

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA256 checksum of a snapshot document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checksum(String);

impl Checksum {
    /// Compute checksum from raw bytes
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(format!("{:x}", hash))
    }

    /// Compute checksum from JSON value (canonicalized)
    pub fn from_json(value: &serde_json::Value) -> Self {
        let canonical = canonicalize(value).to_string();
        Self::from_bytes(canonical.as_bytes())
    }

    /// Compute checksum of any serializable value via its JSON document
    pub fn of<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::from_json(&serde_json::to_value(value)?))
    }

    /// Get the hex string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Verify that a JSON document matches this checksum
    pub fn verify_json(&self, value: &serde_json::Value) -> bool {
        Self::from_json(value) == *self
    }
}

/// Rebuild a JSON value with object keys in sorted order
fn canonicalize(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = serde_json::Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            serde_json::Value::Object(sorted)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(canonicalize).collect())
        }
        other => other.clone(),
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Checksum {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_same_document_same_checksum() {
        let doc = json!({"name": "test", "version": "1.0"});
        assert_eq!(Checksum::from_json(&doc), Checksum::from_json(&doc.clone()));
    }

    #[test]
    fn test_checksum_ignores_key_order() {
        let a: serde_json::Value = serde_json::from_str(r#"{"a": 1, "b": 2}"#).unwrap();
        let b: serde_json::Value = serde_json::from_str(r#"{"b": 2, "a": 1}"#).unwrap();
        assert_eq!(Checksum::from_json(&a), Checksum::from_json(&b));
    }

    #[test]
    fn test_checksum_verification() {
        let doc = json!({"name": "test"});
        let checksum = Checksum::from_json(&doc);
        assert!(checksum.verify_json(&doc));
        assert!(!checksum.verify_json(&json!({"name": "other"})));
        assert_eq!(checksum.as_str().len(), 64);
    }
}
