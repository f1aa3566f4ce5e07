//! Session names.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Globally unique name a session is addressed by.
///
/// Clients may pick their own; otherwise the server assigns a random
/// version-4 UUID (`8-4-4-4-12` lowercase hex).
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionName(String);

impl SessionName {
    /// Generate a fresh random name.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Use a client-supplied name, falling back to a generated one when it
    /// is absent or empty.
    pub fn requested_or_generated(requested: Option<&str>) -> Self {
        match requested {
            Some(name) if !name.is_empty() => Self(name.to_owned()),
            _ => Self::generate(),
        }
    }

    /// Wrap an existing name.
    pub fn from_raw(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Borrow the name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
