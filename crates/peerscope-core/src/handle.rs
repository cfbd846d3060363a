//! Normalized account handles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// A normalized account identifier: trimmed, without the leading `@` sigil,
/// lowercase. Two handles that differ only in case or sigil compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Handle(String);

impl Handle {
    /// Normalizes `raw` into a handle.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EmptyHandle`] when nothing remains after stripping
    /// whitespace and sigils.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let normalized = raw.trim().trim_start_matches('@').trim().to_lowercase();
        if normalized.is_empty() {
            return Err(CoreError::EmptyHandle);
        }
        Ok(Self(normalized))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The handle as displayed to users, with the `@` sigil.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("@{}", self.0)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Handle {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Handle {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Handle> for String {
    fn from(value: Handle) -> Self {
        value.0
    }
}

impl AsRef<str> for Handle {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_sigil_and_lowercases() {
        let handle = Handle::parse("@NavalR").unwrap();
        assert_eq!(handle.as_str(), "navalr");
        assert_eq!(handle.display_name(), "@navalr");
    }

    #[test]
    fn case_and_sigil_insensitive_equality() {
        assert_eq!(
            Handle::parse("  @Foo_Bar ").unwrap(),
            Handle::parse("foo_bar").unwrap()
        );
    }

    #[test]
    fn empty_or_sigil_only_is_rejected() {
        assert!(matches!(Handle::parse(""), Err(CoreError::EmptyHandle)));
        assert!(matches!(Handle::parse(" @ "), Err(CoreError::EmptyHandle)));
        assert!(matches!(Handle::parse("@@"), Err(CoreError::EmptyHandle)));
    }

    #[test]
    fn deserializes_through_normalization() {
        let handle: Handle = serde_json::from_str("\"@Alice\"").unwrap();
        assert_eq!(handle.as_str(), "alice");
        assert!(serde_json::from_str::<Handle>("\"@\"").is_err());
    }
}
