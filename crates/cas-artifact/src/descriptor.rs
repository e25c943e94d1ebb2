//! Blob descriptors
//!
//! A [`Descriptor`] identifies one stored blob: its digest, size and the
//! media type it was stored under.

use crate::digest::{Algorithm, Digest};

/// `(digest, size, mediaType)` identifying a stored blob
///
/// Serialized with the field names `mediaType`, `size` and `digest`.
/// Only `digest` is required; an empty media type and a zero size are
/// omitted on output and defaulted on input.
/// Immutable once created; fields are read through accessors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    media_type: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    size: u64,
    digest: Digest,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero(size: &u64) -> bool {
    *size == 0
}

impl Descriptor {
    /// Describe an existing blob
    #[inline]
    #[must_use]
    pub fn new(media_type: impl Into<String>, size: u64, digest: Digest) -> Self {
        Self {
            media_type: media_type.into(),
            size,
            digest,
        }
    }

    /// Describe `content` using the canonical algorithm
    #[must_use]
    pub fn for_content(media_type: impl Into<String>, content: &[u8]) -> Self {
        Self::for_content_with(Algorithm::default(), media_type, content)
    }

    /// Describe `content` using `algorithm`
    #[must_use]
    pub fn for_content_with(
        algorithm: Algorithm,
        media_type: impl Into<String>,
        content: &[u8],
    ) -> Self {
        Self {
            media_type: media_type.into(),
            size: content.len() as u64,
            digest: algorithm.digest(content),
        }
    }

    #[inline]
    #[must_use]
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    #[must_use]
    pub fn digest(&self) -> &Digest {
        &self.digest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_content_fills_all_fields() {
        let desc = Descriptor::for_content("application/octet-stream", b"abc");
        assert_eq!(desc.size(), 3);
        assert_eq!(desc.media_type(), "application/octet-stream");
        assert_eq!(desc.digest(), &Digest::from_bytes(b"abc"));
    }

    #[test]
    fn for_content_with_blake3() {
        let desc = Descriptor::for_content_with(Algorithm::Blake3, "text/plain", b"abc");
        assert_eq!(desc.digest().algorithm(), Algorithm::Blake3);
        assert!(desc.digest().verify(b"abc"));
    }

    #[test]
    fn json_field_names() {
        let desc = Descriptor::for_content("text/plain", b"abc");
        let value = serde_json::to_value(&desc).unwrap();
        assert_eq!(value["mediaType"], "text/plain");
        assert_eq!(value["size"], 3);
        assert!(value["digest"].as_str().unwrap().starts_with("sha256:"));
    }

    #[test]
    fn json_accepts_digest_only() {
        let digest = Digest::from_bytes(b"layer");
        let json = format!(r#"{{"digest":"{digest}"}}"#);
        let desc: Descriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(desc.media_type(), "");
        assert_eq!(desc.size(), 0);
        assert_eq!(desc.digest(), &digest);
    }

    #[test]
    fn json_omits_empty_fields() {
        let desc = Descriptor::new("", 0, Digest::from_bytes(b"x"));
        let value = serde_json::to_value(&desc).unwrap();
        assert!(value.get("mediaType").is_none());
        assert!(value.get("size").is_none());
        assert_eq!(serde_json::from_value::<Descriptor>(value).unwrap(), desc);
    }

    #[test]
    fn json_accepts_sha512_digest() {
        let digest = crate::Algorithm::Sha512.digest(b"big");
        let json = format!(r#"{{"mediaType":"a/b","size":3,"digest":"{digest}"}}"#);
        let desc: Descriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(desc.digest(), &digest);
    }

    #[test]
    fn json_requires_digest() {
        let result = serde_json::from_str::<Descriptor>(r#"{"mediaType":"a/b","size":1}"#);
        assert!(result.is_err());
    }
}
