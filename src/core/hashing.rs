//! Content-addressed dictionary keys
//!
//! A key is the SHA-256 digest of an ordered field tuple, rendered as hex and
//! truncated to a configured number of characters. Truncation makes
//! collisions possible; the dictionary tiers compare full entries whenever a
//! key is already present and report a mismatch instead of merging.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Separates fields so that `("ab", "c")` and `("a", "bc")` hash differently.
const FIELD_SEPARATOR: u8 = 0x1f;
const MAX_HEX_WIDTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DictionaryKey(String);

impl DictionaryKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DictionaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DictionaryKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Implemented by attribute groups that are interned in a dictionary tier.
pub trait ContentKeyed {
    /// Canonical string forms of the fields, in hashing order.
    fn canonical_fields(&self) -> Vec<String>;
}

#[derive(Debug, Clone, Copy)]
pub struct AttributeHasher {
    width: usize,
}

impl AttributeHasher {
    pub fn new(width: usize) -> Result<Self> {
        if width == 0 || width > MAX_HEX_WIDTH {
            return Err(Error::Config(format!(
                "key width must be between 1 and {} hex characters, got {}",
                MAX_HEX_WIDTH, width
            )));
        }
        Ok(Self { width })
    }

    pub fn hash<I, S>(&self, fields: I) -> DictionaryKey
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut hasher = Sha256::new();
        for (index, field) in fields.into_iter().enumerate() {
            if index > 0 {
                hasher.update([FIELD_SEPARATOR]);
            }
            hasher.update(field.as_ref().as_bytes());
        }
        let mut digest = format!("{:x}", hasher.finalize());
        digest.truncate(self.width);
        DictionaryKey(digest)
    }

    pub fn key_of<T: ContentKeyed>(&self, entry: &T) -> DictionaryKey {
        self.hash(entry.canonical_fields())
    }
}
