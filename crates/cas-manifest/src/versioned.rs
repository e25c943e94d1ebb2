//! Manifest version header

use crate::error::ManifestError;

/// `schemaVersion` + `mediaType`, the fields every manifest format shares
///
/// Parsing only this header is enough to route a stored document to the
/// format that owns it. Missing fields default to `0` and `""`.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Versioned {
    #[serde(default)]
    pub schema_version: i64,

    #[serde(default)]
    pub media_type: String,
}

impl Versioned {
    /// Header for `media_type` at `schema_version`
    #[must_use]
    pub fn new(schema_version: i64, media_type: impl Into<String>) -> Self {
        Self {
            schema_version,
            media_type: media_type.into(),
        }
    }

    /// Parse just the header out of a full manifest document
    ///
    /// # Errors
    /// Returns [`ManifestError::Format`] if `bytes` is not a JSON object
    pub fn peek(bytes: &[u8]) -> Result<Self, ManifestError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
