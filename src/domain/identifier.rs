use std::{borrow::Borrow, fmt, ops::Deref, str::FromStr};

/// Returns `true` if `s` matches `[A-Za-z_][A-Za-z0-9_]*`.
#[must_use]
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Returns `true` if `s` matches `[A-Za-z_][A-Za-z0-9_-]*`.
#[must_use]
pub fn is_requirement_id(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Returns `true` if `s` is a non-empty run of alphanumerics, `_` and `-`.
///
/// This is the shape of a key on the left of a `key: value` list item.
#[must_use]
pub fn is_key_token(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Error returned when a string doesn't match an identifier pattern.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    /// The string is not a valid requirement id.
    #[error(
        "invalid requirement id '{0}': must start with a letter or underscore and contain only alphanumerics, '_' or '-'"
    )]
    RequirementId(String),

    /// The string is not a valid dot-separated namespace.
    #[error(
        "invalid namespace '{0}': must be dot-separated identifiers (e.g. 'vehicle.dynamics')"
    )]
    Namespace(String),
}

/// A validated requirement identifier, such as `REQ-001`.
///
/// Must start with an ASCII letter or underscore, followed by any number of
/// ASCII alphanumerics, underscores or hyphens.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequirementId(String);

impl RequirementId {
    /// Creates a new `RequirementId`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RequirementId`] if the string does not match the
    /// identifier pattern.
    pub fn new(s: String) -> Result<Self, Error> {
        if is_requirement_id(&s) {
            Ok(Self(s))
        } else {
            Err(Error::RequirementId(s))
        }
    }

    /// Returns the string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for RequirementId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Borrow<str> for RequirementId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for RequirementId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequirementId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RequirementId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<&str> for RequirementId {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value.to_string())
    }
}

/// A dot-separated parameter namespace, such as `vehicle.dynamics`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Namespace(String);

impl Namespace {
    /// Creates a new `Namespace`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Namespace`] if the string is empty or any segment is
    /// not an identifier.
    pub fn new(s: String) -> Result<Self, Error> {
        if !s.is_empty() && s.split('.').all(is_identifier) {
            Ok(Self(s))
        } else {
            Err(Error::Namespace(s))
        }
    }

    /// Returns the dot-separated segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// Returns the string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Namespace {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}
