//! Redacting wrapper for vendor credentials.
//!
//! [`SecretString`] keeps API keys out of logs, `Debug` output and any
//! serialized config dump. The only way to read the value is
//! [`SecretString::expose`], which the HTTP adapter calls when it builds
//! the `Authorization` header.

use std::fmt;

use serde::{Serialize, Serializer};

const REDACTED: &str = "[REDACTED]";

/// A credential that must never be printed.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    /// Wrap a credential value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Build a credential from a raw lookup result.
    ///
    /// Surrounding whitespace is trimmed; a missing or blank value yields
    /// `None`, which is how an absent credential is represented everywhere.
    pub fn from_lookup(raw: Option<String>) -> Option<Self> {
        let raw = raw?;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// The actual credential. Only for building outbound requests.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns `true` if no value is held.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("SecretString(\"\")")
        } else {
            write!(f, "SecretString({REDACTED})")
        }
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.0.is_empty() {
            f.write_str(REDACTED)?;
        }
        Ok(())
    }
}

impl Serialize for SecretString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("")
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self(s)
    }
}
