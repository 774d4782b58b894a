//! Product comment bodies.

use core::fmt;

/// Errors that can occur when validating a [`CommentBody`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentError {
    #[error("comment cannot be empty")]
    Empty,
    #[error("comment must be at most {max} characters")]
    TooLong { max: usize },
}

/// A trimmed, non-empty comment of at most 500 characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentBody(String);

impl CommentBody {
    pub const MAX_CHARS: usize = 500;

    /// # Errors
    ///
    /// Returns [`CommentError`] for blank or over-long input.
    pub fn parse(input: &str) -> Result<Self, CommentError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(CommentError::Empty);
        }
        // Character count, not bytes: Turkish text is mostly multi-byte.
        if trimmed.chars().count() > Self::MAX_CHARS {
            return Err(CommentError::TooLong {
                max: Self::MAX_CHARS,
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommentBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_trims() {
        assert_eq!(CommentBody::parse("  Harika iş!  ").unwrap().as_str(), "Harika iş!");
    }

    #[test]
    fn test_rejects_blank() {
        assert_eq!(CommentBody::parse(" \n\t"), Err(CommentError::Empty));
    }

    #[test]
    fn test_limit_counts_characters() {
        let exactly = "ş".repeat(500);
        assert!(CommentBody::parse(&exactly).is_ok());
        let over = "ş".repeat(501);
        assert_eq!(
            CommentBody::parse(&over),
            Err(CommentError::TooLong { max: 500 })
        );
    }
}
