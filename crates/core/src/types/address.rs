//! Postal address content carried by a profile.

use serde::{Deserialize, Serialize};

/// Structured address content.
///
/// Migration copies this value verbatim when it duplicates a profile, and never
/// edits it otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    /// ISO 3166-1 alpha-2 country code.
    pub country_code: String,
    /// State, province or region code.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub administrative_area: String,
    /// City or town.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub locality: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub postal_code: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub address_line1: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub address_line2: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub organization: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub given_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub family_name: String,
}

impl Address {
    /// Create an address with only the country and region set.
    #[must_use]
    pub fn new(country_code: impl Into<String>, administrative_area: impl Into<String>) -> Self {
        Self {
            country_code: country_code.into(),
            administrative_area: administrative_area.into(),
            ..Self::default()
        }
    }

    /// Set the first address line.
    #[must_use]
    pub fn with_line1(mut self, line: impl Into<String>) -> Self {
        self.address_line1 = line.into();
        self
    }

    /// Whether no address data has been entered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_empty() {
        assert!(Address::default().is_empty());
        assert!(!Address::new("US", "NY").is_empty());
    }

    #[test]
    fn test_json_omits_blank_fields() {
        let json = serde_json::to_value(Address::new("FR", "")).unwrap();
        assert_eq!(json, serde_json::json!({ "country_code": "FR" }));
    }

    #[test]
    fn test_json_missing_fields_default() {
        let address: Address =
            serde_json::from_value(serde_json::json!({ "country_code": "US", "locality": "Buffalo" }))
                .unwrap();
        assert_eq!(address.locality, "Buffalo");
        assert!(address.address_line1.is_empty());
    }
}
