//! Repository-relative tree paths.
//!
//! Change paths come from the decision engine, so they are validated up
//! front. The depth bound keeps tree rebuilding bounded regardless of what
//! the engine sends.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

/// Maximum number of path segments in a change path.
pub const MAX_DEPTH: usize = 32;

/// A validated, normalized repository-relative file path (`docs/en/intro.md`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TreePath(String);

impl TreePath {
    /// Create a new validated tree path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPath`] for empty, absolute, traversing, or
    /// overly deep paths.
    pub fn new(path: impl Into<String>) -> Result<Self, Error> {
        let path = path.into();
        validate(&path).map_err(|reason| Error::InvalidPath {
            path: path.clone(),
            reason: reason.to_string(),
        })?;
        Ok(Self(path))
    }

    /// Get the path as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over the path's segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// Number of segments.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments().count()
    }
}

impl AsRef<str> for TreePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for TreePath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TreePath {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

fn validate(path: &str) -> Result<(), &'static str> {
    if path.is_empty() {
        return Err("path cannot be empty");
    }
    if path.starts_with('/') {
        return Err("path must be repository-relative");
    }
    if path.ends_with('/') {
        return Err("path cannot end with '/'");
    }
    if path.contains('\\') {
        return Err("use '/' as the path separator");
    }
    if path.chars().any(|c| c.is_ascii_control()) {
        return Err("path cannot contain control characters");
    }

    let mut depth = 0;
    for segment in path.split('/') {
        match segment {
            "" => return Err("path cannot contain empty segments"),
            "." | ".." => return Err("path cannot contain '.' or '..' segments"),
            _ => depth += 1,
        }
    }
    if depth > MAX_DEPTH {
        return Err("path is nested too deeply");
    }

    Ok(())
}
