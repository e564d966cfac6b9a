//! Branch name validation and newtype.
//!
//! Branch names arrive from an external decision engine and end up inside
//! ref paths and API URLs, so [`BranchName`] enforces git's ref-name rules
//! and rejects traversal sequences and shell metacharacters outright.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

/// A validated git branch name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BranchName(String);

impl BranchName {
    /// Create a new validated branch name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBranchName`] if the name violates git's
    /// branch naming rules or contains dangerous characters.
    pub fn new(name: impl Into<String>) -> Result<Self, Error> {
        let name = name.into();
        validate(&name).map_err(|reason| Error::InvalidBranchName {
            name: name.clone(),
            reason: reason.to_string(),
        })?;
        Ok(Self(name))
    }

    /// Get the branch name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the `BranchName` and return the inner `String`.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialEq<str> for BranchName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for BranchName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl Serialize for BranchName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for BranchName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

/// Characters git forbids in ref names.
const GIT_FORBIDDEN: &[char] = &[' ', '~', '^', ':', '?', '*', '['];

/// Shell metacharacters rejected for defense in depth.
const SHELL_META: &[char] = &[
    '$', ';', '|', '&', '>', '<', '`', '\\', '"', '\'', '(', ')', '{', '}', '!',
];

/// Validate a branch name against git rules and security constraints.
fn validate(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("branch name cannot be empty");
    }
    if name == "@" {
        return Err("branch name cannot be '@'");
    }
    if name.starts_with('.') || name.ends_with('.') {
        return Err("branch name cannot start or end with '.'");
    }
    if name.starts_with('/') || name.ends_with('/') {
        return Err("branch name cannot start or end with '/'");
    }
    #[allow(clippy::case_sensitive_file_extension_comparisons)]
    if name.ends_with(".lock") {
        return Err("branch name cannot end with '.lock'");
    }

    for c in name.chars() {
        if c.is_ascii_control() {
            return Err("branch name cannot contain control characters");
        }
        if GIT_FORBIDDEN.contains(&c) {
            return Err("branch name contains a character git forbids in refs");
        }
        if SHELL_META.contains(&c) {
            return Err("branch name contains a shell metacharacter");
        }
    }

    for pair in name.as_bytes().windows(2) {
        match pair {
            b".." => return Err("branch name cannot contain '..'"),
            b"//" => return Err("branch name cannot contain '//'"),
            b"@{" => return Err("branch name cannot contain '@{'"),
            b"/." => return Err("branch name component cannot start with '.'"),
            _ => {}
        }
    }

    Ok(())
}
