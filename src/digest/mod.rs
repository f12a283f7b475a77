//! Content digests in `algorithm:hex` form.
//!
//! Blobs are named after the digest of their *plaintext* so identical content
//! always lands on the same entry name, whatever codec stores it.

use std::fmt;
use std::str::FromStr;

use sha2::{Digest as _, Sha256};

use crate::error::{Error, Result};

/// Separator between the algorithm and the hex part of a digest string.
pub const DIGEST_SEPARATOR: char = ':';

/// Hash algorithms the writer can address content with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigestAlgorithm {
    #[default]
    Sha256,
    Blake3,
}

impl DigestAlgorithm {
    pub fn name(self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "sha256",
            DigestAlgorithm::Blake3 => "blake3",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sha256" => Some(DigestAlgorithm::Sha256),
            "blake3" => Some(DigestAlgorithm::Blake3),
            _        => None,
        }
    }

    /// Digest `content`, returning a parsed [`ContentDigest`].
    pub fn digest(self, content: &[u8]) -> ContentDigest {
        let hex = match self {
            DigestAlgorithm::Sha256 => hex::encode(Sha256::digest(content)),
            DigestAlgorithm::Blake3 => blake3::hash(content).to_hex().to_string(),
        };
        ContentDigest { algorithm: self.name().to_owned(), hex }
    }
}

/// A validated `algorithm:hex` digest.
///
/// The algorithm is kept as a string: blobs handed over by an export service
/// may be addressed with algorithms this crate cannot compute itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentDigest {
    algorithm: String,
    hex:       String,
}

impl ContentDigest {
    /// Split on the first `:`. Both halves must be non-empty and the
    /// algorithm must not contain a path separator.
    pub fn parse(s: &str) -> Result<Self> {
        let (algorithm, hex) = s
            .split_once(DIGEST_SEPARATOR)
            .ok_or_else(|| Error::InvalidDigest(s.to_owned()))?;
        if algorithm.is_empty()
            || hex.is_empty()
            || algorithm.contains('/')
            || hex.contains('/')
        {
            return Err(Error::InvalidDigest(s.to_owned()));
        }
        Ok(Self { algorithm: algorithm.to_owned(), hex: hex.to_owned() })
    }

    pub fn algorithm(&self) -> &str { &self.algorithm }
    pub fn hex(&self) -> &str { &self.hex }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.algorithm, DIGEST_SEPARATOR, self.hex)
    }
}

impl FromStr for ContentDigest {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> { Self::parse(s) }
}

/// `sha256:<hex>` of `content`.
pub fn sha256_digest(content: &[u8]) -> String {
    DigestAlgorithm::Sha256.digest(content).to_string()
}
