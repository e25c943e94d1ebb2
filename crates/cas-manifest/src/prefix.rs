//! Media type prefix table
//!
//! Maps disjoint media type prefixes to values (parse functions, handlers).
//! Overlap is rejected when a prefix is inserted, so a lookup can match at
//! most one entry.

use crate::error::ManifestError;
use crate::generic::GENERIC_MEDIA_TYPE_PREFIX;
use std::fmt;

/// Table of disjoint media type prefixes
#[derive(Clone)]
pub struct PrefixTable<T> {
    entries: Vec<(String, T)>,
}

impl<T> Default for PrefixTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for PrefixTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrefixTable")
            .field("prefixes", &self.prefixes())
            .finish()
    }
}

impl<T> PrefixTable<T> {
    /// Create empty table
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Table routing the generic `x-application/` prefix to `value`
    #[must_use]
    pub fn with_generic(value: T) -> Self {
        Self {
            entries: vec![(GENERIC_MEDIA_TYPE_PREFIX.to_string(), value)],
        }
    }

    /// Insert `value` under `prefix`
    ///
    /// # Errors
    /// - [`ManifestError::InvalidPrefix`] for an empty prefix
    /// - [`ManifestError::DuplicateRegistration`] if `prefix` equals, is a
    ///   prefix of, or extends a registered prefix
    pub fn insert(&mut self, prefix: &str, value: T) -> Result<(), ManifestError> {
        if prefix.is_empty() {
            return Err(ManifestError::InvalidPrefix(prefix.to_string()));
        }

        if let Some((existing, _)) = self
            .entries
            .iter()
            .find(|(existing, _)| existing.starts_with(prefix) || prefix.starts_with(existing.as_str()))
        {
            return Err(ManifestError::DuplicateRegistration {
                prefix: prefix.to_string(),
                conflicting: existing.clone(),
            });
        }

        self.entries.push((prefix.to_string(), value));
        Ok(())
    }

    /// Find the entry whose prefix starts `media_type`
    #[must_use]
    pub fn lookup(&self, media_type: &str) -> Option<(&str, &T)> {
        self.entries
            .iter()
            .find(|(prefix, _)| media_type.starts_with(prefix.as_str()))
            .map(|(prefix, value)| (prefix.as_str(), value))
    }

    /// Registered prefixes in insertion order
    #[must_use]
    pub fn prefixes(&self) -> Vec<&str> {
        self.entries.iter().map(|(p, _)| p.as_str()).collect()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
