//! Content digests
//!
//! Provides [`Digest`], the `<algorithm>:<hex>` content identifier used as the
//! lookup key for every blob and manifest in the store.

use sha2::Digest as _;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Length in bytes of the longest supported digest output
pub const MAX_DIGEST_LEN: usize = 64;

/// Hash algorithm used to derive a [`Digest`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// SHA-256 (canonical)
    #[default]
    Sha256,
    /// SHA-512
    Sha512,
    /// Blake3
    Blake3,
}

impl Algorithm {
    /// Name used as the digest string prefix
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
            Self::Blake3 => "blake3",
        }
    }

    /// Digest output length in bytes
    #[inline]
    #[must_use]
    pub const fn output_len(self) -> usize {
        match self {
            Self::Sha512 => 64,
            Self::Sha256 | Self::Blake3 => 32,
        }
    }

    /// Compute the digest of `data` with this algorithm
    #[must_use]
    pub fn digest(self, data: &[u8]) -> Digest {
        let mut bytes = [0u8; MAX_DIGEST_LEN];
        match self {
            Self::Sha256 => bytes[..32].copy_from_slice(&sha2::Sha256::digest(data)),
            Self::Sha512 => bytes.copy_from_slice(&sha2::Sha512::digest(data)),
            Self::Blake3 => bytes[..32].copy_from_slice(blake3::hash(data).as_bytes()),
        }
        Digest {
            algorithm: self,
            bytes,
        }
    }
}

impl Display for Algorithm {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            "blake3" => Ok(Self::Blake3),
            other => Err(DigestError::UnknownAlgorithm(other.to_string())),
        }
    }
}

/// A content digest (`sha256:<64 hex>`, `sha512:<128 hex>` or
/// `blake3:<64 hex>`)
///
/// Immutable and Copy. Ordering is algorithm first, then raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Digest {
    algorithm: Algorithm,
    // Bytes past `algorithm.output_len()` are always zero.
    bytes: [u8; MAX_DIGEST_LEN],
}

impl Digest {
    /// Create a digest from an algorithm and raw output bytes
    ///
    /// # Errors
    /// Returns [`DigestError::InvalidLength`] if `raw` is not exactly the
    /// algorithm's output length
    pub fn new(algorithm: Algorithm, raw: &[u8]) -> Result<Self, DigestError> {
        let expected = algorithm.output_len();
        if raw.len() != expected {
            return Err(DigestError::InvalidLength {
                expected,
                actual: raw.len(),
            });
        }
        let mut bytes = [0u8; MAX_DIGEST_LEN];
        bytes[..expected].copy_from_slice(raw);
        Ok(Self { algorithm, bytes })
    }

    /// SHA-256 digest of `data`
    #[inline]
    #[must_use]
    pub fn from_bytes(data: &[u8]) -> Self {
        Algorithm::Sha256.digest(data)
    }

    /// Algorithm that produced this digest
    #[inline]
    #[must_use]
    pub const fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Raw digest output
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.algorithm.output_len()]
    }

    /// Lowercase hex encoding without the algorithm prefix
    #[inline]
    #[must_use]
    pub fn hex(&self) -> String {
        hex::encode(self.as_bytes())
    }

    /// Short string representation (first 12 hex chars)
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.bytes[..6])
    }

    /// Recompute over `data` with this digest's algorithm and compare
    #[inline]
    #[must_use]
    pub fn verify(&self, data: &[u8]) -> bool {
        self.algorithm.digest(data) == *self
    }
}

impl Display for Digest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex())
    }
}

impl FromStr for Digest {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (algorithm, encoded) = s
            .split_once(':')
            .ok_or_else(|| DigestError::MissingAlgorithm(s.to_string()))?;
        let algorithm: Algorithm = algorithm.parse()?;

        // One digest, one spelling.
        if encoded.bytes().any(|b| b.is_ascii_uppercase()) {
            return Err(DigestError::NonCanonicalHex(s.to_string()));
        }

        let decoded = hex::decode(encoded)?;
        Self::new(algorithm, &decoded)
    }
}

impl serde::Serialize for Digest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for Digest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct DigestVisitor;

        impl serde::de::Visitor<'_> for DigestVisitor {
            type Value = Digest;

            fn expecting(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
                formatter.write_str("a digest string of the form <algorithm>:<hex>")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                value.parse().map_err(serde::de::Error::custom)
            }
        }

        deserializer.deserialize_str(DigestVisitor)
    }
}

/// Errors that can occur when parsing digests
#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    /// No `<algorithm>:` prefix
    #[error("digest '{0}' has no algorithm prefix")]
    MissingAlgorithm(String),

    /// Algorithm is not supported
    #[error("unsupported digest algorithm: {0}")]
    UnknownAlgorithm(String),

    /// Invalid digest length
    #[error("invalid digest length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// Uppercase hex digits
    #[error("digest '{0}' must use lowercase hex")]
    NonCanonicalHex(String),

    /// Hex encoding error
    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}
