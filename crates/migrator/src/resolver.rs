//! Reference resolver.
//!
//! Once a shared profile has been duplicated, every shipment in the dataset
//! that still ships to the original must move to the duplicate. The scan
//! covers the whole shipment collection, not the current order or batch.

use tracing::{debug, info, instrument};

use order_profiles_core::{ProfileId, ShipmentId};

use crate::error::ResolverError;
use crate::store::ShipmentStore;

/// Repoints shipments from a superseded profile to its replacement.
pub struct ReferenceResolver<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: ShipmentStore + ?Sized> ReferenceResolver<'a, S> {
    /// Create a resolver over a shipment store.
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Point every shipment that ships to `original` at `replacement`.
    ///
    /// `exclude` names a shipment the caller has already rewritten. Returns the
    /// ids of the shipments this call repointed. Afterwards no shipment
    /// references `original`; the profile itself is left in place.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::Scan`] if the shipments cannot be listed and
    /// [`ResolverError::Repoint`] if one of them cannot be saved. Shipments
    /// saved before the failure stay repointed; a rerun picks up the rest.
    #[instrument(skip(self))]
    pub async fn repoint(
        &self,
        original: ProfileId,
        replacement: ProfileId,
        exclude: Option<ShipmentId>,
    ) -> Result<Vec<ShipmentId>, ResolverError> {
        let shipments = self
            .store
            .find_shipments_by_shipping_profile(original)
            .await
            .map_err(|source| ResolverError::Scan { original, source })?;

        let mut repointed = Vec::with_capacity(shipments.len());
        for mut shipment in shipments {
            if Some(shipment.id) == exclude {
                continue;
            }

            shipment.shipping_profile = Some(replacement);
            self.store
                .save_shipment(&shipment)
                .await
                .map_err(|source| ResolverError::Repoint {
                    shipment: shipment.id,
                    original,
                    replacement,
                    source,
                })?;

            debug!(shipment = %shipment.id, order = %shipment.order_id, "Repointed shipment");
            repointed.push(shipment.id);
        }

        if !repointed.is_empty() {
            info!(count = repointed.len(), "Repointed fan-out shipments");
        }

        Ok(repointed)
    }
}
