//! Machine name type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`MachineName`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MachineNameError {
    /// The input string is empty.
    #[error("machine name cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("machine name must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The first character is not a lowercase ASCII letter.
    #[error("machine name must start with a lowercase letter")]
    InvalidStart,
    /// The input contains a character outside `[a-z0-9_]`.
    #[error("machine name contains invalid character {0:?}")]
    InvalidCharacter(char),
}

/// A configuration machine name, such as an order type or field name.
///
/// ## Constraints
///
/// - Length: 1-32 characters
/// - Must start with a lowercase ASCII letter
/// - May only contain lowercase ASCII letters, digits and underscores
///
/// ## Examples
///
/// ```
/// use order_profiles_core::MachineName;
///
/// assert!(MachineName::parse("default").is_ok());
/// assert!(MachineName::parse("customer_billing").is_ok());
///
/// assert!(MachineName::parse("").is_err());          // empty
/// assert!(MachineName::parse("Default").is_err());   // uppercase
/// assert!(MachineName::parse("1st_type").is_err());  // leading digit
/// assert!(MachineName::parse("has-dash").is_err());  // dash
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct MachineName(String);

impl MachineName {
    /// Maximum length of a machine name.
    pub const MAX_LENGTH: usize = 32;

    /// Parse a `MachineName` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input:
    /// - Is empty
    /// - Is longer than 32 characters
    /// - Does not start with a lowercase letter
    /// - Contains anything other than `[a-z0-9_]`
    pub fn parse(s: &str) -> Result<Self, MachineNameError> {
        let mut chars = s.chars();
        let Some(first) = chars.next() else {
            return Err(MachineNameError::Empty);
        };

        if s.len() > Self::MAX_LENGTH {
            return Err(MachineNameError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        if !first.is_ascii_lowercase() {
            return Err(MachineNameError::InvalidStart);
        }

        if let Some(bad) =
            chars.find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_'))
        {
            return Err(MachineNameError::InvalidCharacter(bad));
        }

        Ok(Self(s.to_owned()))
    }

    /// Returns the machine name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `MachineName` and returns the inner `String`.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for MachineName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for MachineName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl core::str::FromStr for MachineName {
    type Err = MachineNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MachineName {
    type Error = MachineNameError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<MachineName> for String {
    fn from(name: MachineName) -> Self {
        name.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_names() {
        assert!(MachineName::parse("default").is_ok());
        assert!(MachineName::parse("customer").is_ok());
        assert!(MachineName::parse("customer_shipping").is_ok());
        assert!(MachineName::parse("field_2").is_ok());
        assert!(MachineName::parse("a").is_ok());
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(MachineName::parse(""), Err(MachineNameError::Empty));
    }

    #[test]
    fn test_parse_too_long() {
        let long = "a".repeat(33);
        assert!(matches!(
            MachineName::parse(&long),
            Err(MachineNameError::TooLong { max: 32 })
        ));
        assert!(MachineName::parse(&"a".repeat(32)).is_ok());
    }

    #[test]
    fn test_parse_invalid_start() {
        assert_eq!(
            MachineName::parse("_private"),
            Err(MachineNameError::InvalidStart)
        );
        assert_eq!(
            MachineName::parse("9lives"),
            Err(MachineNameError::InvalidStart)
        );
    }

    #[test]
    fn test_parse_invalid_character() {
        assert_eq!(
            MachineName::parse("order-type"),
            Err(MachineNameError::InvalidCharacter('-'))
        );
        assert_eq!(
            MachineName::parse("orderType"),
            Err(MachineNameError::InvalidCharacter('T'))
        );
    }

    #[test]
    fn test_serde_rejects_invalid() {
        let parsed: MachineName = serde_json::from_str("\"default\"").unwrap();
        assert_eq!(parsed.as_str(), "default");

        assert!(serde_json::from_str::<MachineName>("\"Not Valid\"").is_err());
    }

    #[test]
    fn test_display() {
        let name = MachineName::parse("online").unwrap();
        assert_eq!(format!("{name}"), "online");
    }
}
