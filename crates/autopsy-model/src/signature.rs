//! Tool-call signatures
//!
//! Provides [`InputDigest`], a 32-byte BLAKE3 digest of a tool input in
//! canonical JSON form, and [`CallSignature`], the `(tool, digest)` pair the
//! loop and retry-storm checks compare.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{self, Display, Formatter};

/// BLAKE3 digest of a canonicalized tool input
///
/// Object keys are hashed in sorted order, so inputs that differ only in
/// key order produce the same digest. An absent input hashes like `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InputDigest([u8; 32]);

impl InputDigest {
    /// Digest an optional input value
    #[must_use]
    pub fn of(input: Option<&Value>) -> Self {
        let mut hasher = blake3::Hasher::new();
        hash_canonical(input.unwrap_or(&Value::Null), &mut hasher);
        Self(*hasher.finalize().as_bytes())
    }

    /// Get reference to the underlying bytes
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Short string representation (first 16 hex chars)
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl Display for InputDigest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl Serialize for InputDigest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for InputDigest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("digest must be 32 bytes"))?;
        Ok(Self(arr))
    }
}

/// Feed a value into the hasher with sorted object keys
fn hash_canonical(value: &Value, hasher: &mut blake3::Hasher) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            hasher.update(b"{");
            for key in keys {
                hasher.update(Value::String(key.clone()).to_string().as_bytes());
                hasher.update(b":");
                hash_canonical(&map[key], hasher);
                hasher.update(b",");
            }
            hasher.update(b"}");
        }
        Value::Array(items) => {
            hasher.update(b"[");
            for item in items {
                hash_canonical(item, hasher);
                hasher.update(b",");
            }
            hasher.update(b"]");
        }
        scalar => {
            hasher.update(scalar.to_string().as_bytes());
        }
    }
}

/// Identity of a tool call for repetition analysis
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CallSignature {
    /// Tool name
    pub tool: String,
    /// Digest of the normalized input
    pub input: InputDigest,
}

impl CallSignature {
    /// Build a signature from a tool name and its (optional) input
    #[must_use]
    pub fn new(tool: impl Into<String>, input: Option<&Value>) -> Self {
        Self {
            tool: tool.into(),
            input: InputDigest::of(input),
        }
    }
}

impl Display for CallSignature {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tool, self.input.short())
    }
}
