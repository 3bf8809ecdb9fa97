use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use crate::error::TypeError;

/// File extension used for every blob in the content store.
pub const BLOB_EXTENSION: &str = "bin";

/// SHA-256 content address of an EEPROM blob.
///
/// The canonical textual form is 64 lowercase hex characters. That string is
/// also the blob's file stem in the content store, so a digest can always be
/// re-verified by hashing the bytes found under its name.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest([u8; 32]);

impl Digest {
    /// Compute the digest of raw bytes.
    pub fn of(data: &[u8]) -> Self {
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&Sha256::digest(data));
        Self(hash)
    }

    /// Create a digest from a pre-computed hash.
    pub fn from_hash(hash: [u8; 32]) -> Self {
        Self(hash)
    }

    /// The raw 32-byte hash.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 12 characters), for logs.
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..6])
    }

    /// Parse from the canonical lowercase hex form.
    ///
    /// Uppercase input is rejected so that exactly one spelling maps to each
    /// blob file name.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        if s.len() != 64 {
            return Err(TypeError::InvalidLength {
                expected: 64,
                actual: s.len(),
            });
        }
        if s.bytes().any(|b| b.is_ascii_uppercase()) {
            return Err(TypeError::InvalidHex(format!("{s} is not lowercase")));
        }
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Returns `true` if `data` hashes to this digest.
    pub fn verify(&self, data: &[u8]) -> bool {
        Self::of(data) == *self
    }

    /// The blob file name for this digest: `<hex>.bin`.
    pub fn blob_file_name(&self) -> String {
        format!("{}.{BLOB_EXTENSION}", self.to_hex())
    }

    /// Parse a blob file name back into a digest.
    pub fn from_blob_file_name(name: &str) -> Result<Self, TypeError> {
        let stem = name
            .strip_suffix(".bin")
            .ok_or_else(|| TypeError::InvalidBlobName(name.to_string()))?;
        Self::from_hex(stem).map_err(|_| TypeError::InvalidBlobName(name.to_string()))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.short_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Digest {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for Digest {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<Digest> for String {
    fn from(digest: Digest) -> Self {
        digest.to_hex()
    }
}
