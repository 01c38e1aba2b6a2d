use serde::{Deserialize, Serialize};

/// A ledger block pushed by the serving node.
///
/// The client does not interpret blocks; the JSON is kept as received and a
/// few header fields are exposed for convenience.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Block(serde_json::Value);

impl Block {
    pub fn from_json(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_json(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn into_json(self) -> serde_json::Value {
        self.0
    }

    pub fn height(&self) -> Option<u64> {
        self.0.pointer("/header/height").and_then(|h| h.as_u64())
    }

    pub fn hash(&self) -> Option<&str> {
        self.0
            .get("hash")
            .or_else(|| self.0.pointer("/header/hash"))
            .and_then(|h| h.as_str())
    }
}
