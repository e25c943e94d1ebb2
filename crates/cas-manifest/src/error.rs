//! Error types for manifest parsing and format registration

/// Errors raised while parsing, dispatching or registering manifests
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// Bytes are not a well-formed manifest document
    #[error("malformed manifest: {0}")]
    Format(#[from] serde_json::Error),

    /// Media type lacks the prefix required by the parsing format
    #[error("mediaType in manifest should have prefix '{expected_prefix}', '{actual}' does not")]
    MediaTypeMismatch {
        expected_prefix: String,
        actual: String,
    },

    /// No registered format matches the media type
    #[error("unsupported manifest media type: '{0}'")]
    UnsupportedMediaType(String),

    /// Payload requested from an envelope that was never populated
    #[error("manifest payload requested before canonical bytes were initialized")]
    Uninitialized,

    /// Prefix equals, contains or extends an already registered prefix
    #[error("media type prefix '{prefix}' conflicts with registered prefix '{conflicting}'")]
    DuplicateRegistration { prefix: String, conflicting: String },

    /// Prefix can never be registered
    #[error("invalid media type prefix: '{0}'")]
    InvalidPrefix(String),
}

impl ManifestError {
    /// Create a media type mismatch error
    pub fn media_type_mismatch(expected_prefix: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::MediaTypeMismatch {
            expected_prefix: expected_prefix.into(),
            actual: actual.into(),
        }
    }

    /// True for errors caused by the document bytes themselves
    #[inline]
    #[must_use]
    pub fn is_content_error(&self) -> bool {
        matches!(self, Self::Format(_) | Self::MediaTypeMismatch { .. })
    }
}
