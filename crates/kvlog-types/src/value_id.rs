use std::fmt;

use serde::{Deserialize, Serialize};

/// Content-addressed identifier of a stored value.
///
/// A `ValueId` is the 32-byte content hash of a normalized payload. Identical
/// payloads always produce the same `ValueId`, so a value referenced from many
/// history entries is stored once. Hashing itself lives with the value store;
/// this type only carries and formats the digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValueId([u8; 32]);

impl ValueId {
    /// Create a `ValueId` from a pre-computed hash.
    pub const fn from_hash(hash: [u8; 32]) -> Self {
        Self(hash)
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Debug for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValueId({})", self.short_hex())
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
