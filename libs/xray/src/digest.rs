//! Content digests of generated documents.
//!
//! The digest is taken over compact JSON with object keys in sorted order
//! (`serde_json::Map` is ordered by key), so it identifies content
//! independently of pretty-printing.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// A `sha256:<hex>` content digest.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct DocumentDigest(String);

impl DocumentDigest {
    /// Digest any serializable document.
    pub fn of<T: Serialize>(document: &T) -> serde_json::Result<Self> {
        let value = serde_json::to_value(document)?;
        Ok(Self::from_json(&value))
    }

    /// Digest a JSON value.
    pub fn from_json(json: &serde_json::Value) -> Self {
        let hash = Sha256::digest(json.to_string().as_bytes());
        Self(format!("sha256:{}", hex::encode(hash)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
