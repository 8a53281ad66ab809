use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

const MAX_LENGTH: usize = 64;

/// An opaque token identifying one stored URL.
///
/// Valid ids are 1-64 characters drawn from `[a-zA-Z0-9_-]`, which keeps
/// them safe to splice into a path segment.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShortId(String);

impl ShortId {
    /// Creates a new `ShortId` after validating the input.
    pub fn new(id: impl Into<String>) -> std::result::Result<Self, CoreError> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Creates a `ShortId` without validation.
    ///
    /// Use this only for ids coming from trusted sources, such as rows
    /// already persisted by a store or the built-in generators.
    pub fn new_unchecked(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Renders the full short link below `base_url`.
    pub fn to_url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self)
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(id: &str) -> std::result::Result<(), CoreError> {
        if id.is_empty() || id.len() > MAX_LENGTH {
            return Err(CoreError::InvalidShortId(format!(
                "length must be between 1 and {}, got {}",
                MAX_LENGTH,
                id.len()
            )));
        }

        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(CoreError::InvalidShortId(format!(
                "must contain only alphanumeric characters, hyphens, or underscores: '{}'",
                id
            )));
        }

        Ok(())
    }
}

impl Display for ShortId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of the user who created a record.
///
/// Issued by the (external) identity layer. The store only ever compares
/// owners for equality.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> std::result::Result<Self, CoreError> {
        let id = id.into();
        if id.is_empty() {
            return Err(CoreError::InvalidOwnerId("owner id cannot be empty".into()));
        }
        Ok(Self(id))
    }

    /// Creates an `OwnerId` without validation. Replayed log records that
    /// predate owner tracking decode to the empty owner through this.
    pub fn new_unchecked(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_ids() {
        assert!(ShortId::new("a").is_ok());
        assert!(ShortId::new("Abc-123_xyz").is_ok());
        assert!(ShortId::new("a".repeat(64)).is_ok());
    }

    #[test]
    fn empty_or_too_long() {
        assert!(ShortId::new("").is_err());
        assert!(ShortId::new("a".repeat(65)).is_err());
    }

    #[test]
    fn invalid_characters() {
        assert!(ShortId::new("abc def").is_err());
        assert!(ShortId::new("abc/def").is_err());
        assert!(ShortId::new("abc!def").is_err());
    }

    #[test]
    fn to_url_trims_trailing_slash() {
        let id = ShortId::new("abc123").unwrap();
        assert_eq!(id.to_url("http://localhost:8080"), "http://localhost:8080/abc123");
        assert_eq!(id.to_url("http://localhost:8080/"), "http://localhost:8080/abc123");
    }

    #[test]
    fn owner_must_not_be_empty() {
        assert_eq!(
            OwnerId::new(""),
            Err(CoreError::InvalidOwnerId("owner id cannot be empty".into()))
        );
        assert_eq!(OwnerId::new("alice").unwrap().as_str(), "alice");
    }
}
