//! Category, field and display definitions for profile categories.
//!
//! The provisioner clones these from the shared category into the billing
//! and shipping categories.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::category::ProfileCategory;
use super::machine_name::MachineName;

/// A profile category as stored in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDefinition {
    pub category: ProfileCategory,
    pub label: String,
}

impl CategoryDefinition {
    /// Copy this definition under a different category, with that category's
    /// default label.
    #[must_use]
    pub fn duplicate_as(&self, category: ProfileCategory) -> Self {
        Self {
            category,
            label: category.label().to_owned(),
        }
    }
}

/// A field attached to a profile category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub category: ProfileCategory,
    pub name: MachineName,
    pub field_type: String,
    /// Base fields exist on every category and are never cloned.
    pub base: bool,
    pub required: bool,
    pub settings: JsonValue,
}

impl FieldDefinition {
    /// Copy this field onto another category.
    #[must_use]
    pub fn duplicate_as(&self, category: ProfileCategory) -> Self {
        Self {
            category,
            ..self.clone()
        }
    }
}

/// Which kind of display a layout configures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayKind {
    View,
    Form,
}

impl DisplayKind {
    pub const ALL: [Self; 2] = [Self::View, Self::Form];
}

impl std::fmt::Display for DisplayKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::View => write!(f, "view"),
            Self::Form => write!(f, "form"),
        }
    }
}

impl std::str::FromStr for DisplayKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "view" => Ok(Self::View),
            "form" => Ok(Self::Form),
            _ => Err(format!("invalid display kind: {s}")),
        }
    }
}

/// One field placed on a display, with its widget/formatter settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayComponent {
    pub name: String,
    pub settings: JsonValue,
}

/// A view or form layout for one category and display mode.
///
/// `components` is ordered; the order is what a renderer shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDisplay {
    pub category: ProfileCategory,
    pub kind: DisplayKind,
    pub mode: String,
    pub enabled: bool,
    pub components: Vec<DisplayComponent>,
}

impl EntityDisplay {
    /// An enabled display with no components.
    #[must_use]
    pub fn empty(category: ProfileCategory, kind: DisplayKind, mode: impl Into<String>) -> Self {
        Self {
            category,
            kind,
            mode: mode.into(),
            enabled: true,
            components: Vec::new(),
        }
    }

    /// Look up a component by field name.
    #[must_use]
    pub fn component(&self, name: &str) -> Option<&DisplayComponent> {
        self.components.iter().find(|c| c.name == name)
    }

    /// Remove a component if present.
    pub fn remove_component(&mut self, name: &str) {
        self.components.retain(|c| c.name != name);
    }

    /// Insert or replace a component.
    ///
    /// A replaced component keeps its position; a new one is appended.
    pub fn set_component(&mut self, component: DisplayComponent) {
        if let Some(existing) = self.components.iter_mut().find(|c| c.name == component.name) {
            *existing = component;
        } else {
            self.components.push(component);
        }
    }

    /// Component names in display order.
    #[must_use]
    pub fn component_names(&self) -> Vec<&str> {
        self.components.iter().map(|c| c.name.as_str()).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn component(name: &str, weight: i64) -> DisplayComponent {
        DisplayComponent {
            name: name.to_owned(),
            settings: json!({ "weight": weight }),
        }
    }

    #[test]
    fn test_set_component_replaces_in_place() {
        let mut display = EntityDisplay::empty(ProfileCategory::Billing, DisplayKind::Form, "default");
        display.set_component(component("address", 0));
        display.set_component(component("phone", 1));
        display.set_component(component("address", 5));

        assert_eq!(display.component_names(), vec!["address", "phone"]);
        assert_eq!(
            display.component("address").unwrap().settings,
            json!({ "weight": 5 })
        );
    }

    #[test]
    fn test_remove_then_set_restores_source_order() {
        let mut display = EntityDisplay::empty(ProfileCategory::Billing, DisplayKind::View, "default");
        display.set_component(component("phone", 1));
        display.set_component(component("address", 0));

        for name in ["address", "phone"] {
            display.remove_component(name);
        }
        display.set_component(component("address", 0));
        display.set_component(component("phone", 1));

        assert_eq!(display.component_names(), vec!["address", "phone"]);
    }

    #[test]
    fn test_field_duplicate_changes_only_category() {
        let field = FieldDefinition {
            category: ProfileCategory::Shared,
            name: MachineName::parse("address").unwrap(),
            field_type: "address".to_owned(),
            base: false,
            required: true,
            settings: json!({ "available_countries": [] }),
        };
        let copy = field.duplicate_as(ProfileCategory::Shipping);

        assert_eq!(copy.category, ProfileCategory::Shipping);
        assert_eq!(copy.name, field.name);
        assert_eq!(copy.settings, field.settings);
    }

    #[test]
    fn test_display_kind_parse() {
        assert_eq!("form".parse::<DisplayKind>().unwrap(), DisplayKind::Form);
        assert!("page".parse::<DisplayKind>().is_err());
    }
}
