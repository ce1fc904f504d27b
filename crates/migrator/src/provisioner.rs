//! Profile type provisioner.
//!
//! Creates the billing and shipping categories as copies of the shared
//! category: its label, every non-base field, and every view and form display
//! with the component order preserved. Categories that already exist are left
//! alone, so provisioning twice writes nothing the second time.

use serde::Serialize;
use tracing::{debug, info, instrument};

use order_profiles_core::{CategoryDefinition, EntityDisplay, OrderTypeContext, ProfileCategory};

use crate::error::ProvisionError;
use crate::store::CategoryStore;

/// What provisioning created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProvisionOutcome {
    /// Categories created by this call.
    pub created: Vec<ProfileCategory>,
    /// Categories that already existed.
    pub existing: Vec<ProfileCategory>,
    pub fields_cloned: usize,
    pub displays_cloned: usize,
}

impl ProvisionOutcome {
    /// Whether this call created anything.
    #[must_use]
    pub fn created_any(&self) -> bool {
        !self.created.is_empty()
    }
}

/// Clones the shared category into the split categories.
pub struct Provisioner<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: CategoryStore + ?Sized> Provisioner<'a, S> {
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Make sure the billing and shipping categories exist.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::SharedCategoryMissing`] when there is nothing
    /// to clone, or the first create/clone failure. Any error is fatal to the
    /// migration.
    #[instrument(skip(self, ctx), fields(order_type = %ctx.order_type))]
    pub async fn provision(
        &self,
        ctx: &OrderTypeContext,
    ) -> Result<ProvisionOutcome, ProvisionError> {
        let shared = self
            .store
            .load_category(ProfileCategory::Shared)
            .await?
            .ok_or(ProvisionError::SharedCategoryMissing)?;

        let mut outcome = ProvisionOutcome::default();
        for category in ProfileCategory::SPLIT {
            if self.store.load_category(category).await?.is_some() {
                debug!(category = %category, "Category already provisioned");
                outcome.existing.push(category);
                continue;
            }

            self.clone_category(&shared, category, &mut outcome).await?;
            outcome.created.push(category);
        }

        if outcome.created_any() {
            info!(
                created = outcome.created.len(),
                fields = outcome.fields_cloned,
                displays = outcome.displays_cloned,
                "Provisioned split profile categories"
            );
        }
        Ok(outcome)
    }

    async fn clone_category(
        &self,
        shared: &CategoryDefinition,
        category: ProfileCategory,
        outcome: &mut ProvisionOutcome,
    ) -> Result<(), ProvisionError> {
        self.store
            .create_category(&shared.duplicate_as(category))
            .await
            .map_err(|source| ProvisionError::CreateCategory { category, source })?;

        for field in self.store.field_definitions(shared.category).await? {
            if field.base {
                continue;
            }
            self.store
                .save_field_definition(&field.duplicate_as(category))
                .await
                .map_err(|source| ProvisionError::CloneField {
                    category,
                    field: field.name.clone(),
                    source,
                })?;
            outcome.fields_cloned += 1;
        }

        for source_display in self.store.displays(shared.category).await? {
            let display = self.clone_display(&source_display, category).await?;
            self.store
                .save_display(&display)
                .await
                .map_err(|source| ProvisionError::CloneDisplay {
                    category,
                    kind: display.kind,
                    mode: display.mode.clone(),
                    source,
                })?;
            outcome.displays_cloned += 1;
        }

        debug!(category = %category, "Cloned shared category");
        Ok(())
    }

    /// Build the target display: load or create it, drop every component the
    /// source places, then re-add them in source order.
    async fn clone_display(
        &self,
        source: &EntityDisplay,
        category: ProfileCategory,
    ) -> Result<EntityDisplay, ProvisionError> {
        let mut target = self
            .store
            .load_display(category, source.kind, &source.mode)
            .await?
            .unwrap_or_else(|| EntityDisplay::empty(category, source.kind, source.mode.clone()));

        for component in &source.components {
            target.remove_component(&component.name);
        }
        for component in &source.components {
            target.set_component(component.clone());
        }
        target.enabled = source.enabled;
        Ok(target)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use order_profiles_core::{
        DisplayComponent, DisplayKind, FieldDefinition, MachineName, OrderTypeId, ProfileMode,
    };
    use serde_json::json;

    use super::*;
    use crate::store::{FailPoint, MemoryStore};

    fn ctx() -> OrderTypeContext {
        OrderTypeContext::new(OrderTypeId::parse("default").unwrap(), ProfileMode::Single)
    }

    fn field(name: &str, base: bool) -> FieldDefinition {
        FieldDefinition {
            category: ProfileCategory::Shared,
            name: MachineName::parse(name).unwrap(),
            field_type: "string".to_owned(),
            base,
            required: false,
            settings: json!({}),
        }
    }

    fn component(name: &str) -> DisplayComponent {
        DisplayComponent {
            name: name.to_owned(),
            settings: json!({ "label": "above" }),
        }
    }

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert_category(CategoryDefinition {
            category: ProfileCategory::Shared,
            label: "Customer".to_owned(),
        });
        store.insert_field(field("address", true));
        store.insert_field(field("phone", false));
        store.insert_display(EntityDisplay {
            category: ProfileCategory::Shared,
            kind: DisplayKind::Form,
            mode: "default".to_owned(),
            enabled: true,
            components: vec![component("phone"), component("address")],
        });
        store
    }

    #[tokio::test]
    async fn test_clones_non_base_fields_and_displays() {
        let store = seeded();
        let outcome = Provisioner::new(&store).provision(&ctx()).await.unwrap();

        assert_eq!(outcome.created, ProfileCategory::SPLIT.to_vec());
        assert_eq!(outcome.fields_cloned, 2);
        assert_eq!(outcome.displays_cloned, 2);

        let billing_fields = store.fields_of(ProfileCategory::Billing);
        assert_eq!(billing_fields.len(), 1);
        assert_eq!(billing_fields[0].name.as_str(), "phone");

        let form = store
            .display(ProfileCategory::Shipping, DisplayKind::Form, "default")
            .unwrap();
        assert_eq!(form.component_names(), vec!["phone", "address"]);
    }

    #[tokio::test]
    async fn test_existing_target_display_is_reordered_to_match_source() {
        let store = seeded();
        store.insert_display(EntityDisplay {
            category: ProfileCategory::Billing,
            kind: DisplayKind::Form,
            mode: "default".to_owned(),
            enabled: false,
            components: vec![component("address"), component("notes"), component("phone")],
        });

        Provisioner::new(&store).provision(&ctx()).await.unwrap();

        let form = store
            .display(ProfileCategory::Billing, DisplayKind::Form, "default")
            .unwrap();
        assert_eq!(form.component_names(), vec!["notes", "phone", "address"]);
        assert!(form.enabled);
    }

    #[tokio::test]
    async fn test_second_call_writes_nothing() {
        let store = seeded();
        let provisioner = Provisioner::new(&store);
        provisioner.provision(&ctx()).await.unwrap();
        let writes = store.writes();

        let outcome = provisioner.provision(&ctx()).await.unwrap();

        assert!(!outcome.created_any());
        assert_eq!(outcome.existing, ProfileCategory::SPLIT.to_vec());
        assert_eq!(store.writes(), writes);
    }

    #[tokio::test]
    async fn test_missing_shared_category() {
        let store = MemoryStore::new();
        let err = Provisioner::new(&store).provision(&ctx()).await.unwrap_err();
        assert!(matches!(err, ProvisionError::SharedCategoryMissing));
    }

    #[tokio::test]
    async fn test_display_failure_names_category() {
        let store = seeded();
        store.fail_on(FailPoint::SaveDisplay(ProfileCategory::Shipping));

        let err = Provisioner::new(&store).provision(&ctx()).await.unwrap_err();

        assert!(matches!(
            err,
            ProvisionError::CloneDisplay { category: ProfileCategory::Shipping, kind: DisplayKind::Form, .. }
        ));
    }
}
