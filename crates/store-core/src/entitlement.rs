//! Entitlement Store
//!
//! Entitlements are derived, never written directly: an identity may access a
//! product iff a completed order line for it exists, or the policy says the
//! identity is the administrator. Reads go straight to the gateway so a
//! completion is visible on the very next check.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::catalog::{Catalog, ProductId};
use crate::error::Result;
use crate::gateway::PersistenceGateway;
use crate::identity::Identity;
use crate::order::PurchasedItem;
use crate::policy::AccessPolicy;

/// Read-side view of who owns what
#[derive(Clone)]
pub struct EntitlementStore {
    gateway: Arc<dyn PersistenceGateway>,
    catalog: Arc<Catalog>,
    policy: AccessPolicy,
}

impl EntitlementStore {
    pub fn new(gateway: Arc<dyn PersistenceGateway>, catalog: Arc<Catalog>, policy: AccessPolicy) -> Self {
        Self {
            gateway,
            catalog,
            policy,
        }
    }

    /// Product ids `identity` may access
    pub async fn entitlements(&self, identity: &Identity) -> Result<BTreeSet<ProductId>> {
        if self.policy.is_admin(identity) {
            return Ok(self.catalog.ids().cloned().collect());
        }

        let purchases = self.gateway.purchases(identity).await?;
        Ok(purchases.into_iter().map(|item| item.product_id).collect())
    }

    /// Whether `identity` may access `product`
    pub async fn has_access(&self, identity: &Identity, product: &ProductId) -> Result<bool> {
        if self.policy.is_admin(identity) {
            return Ok(true);
        }
        Ok(self.entitlements(identity).await?.contains(product))
    }

    /// Purchase history for `identity`
    pub async fn purchases(&self, identity: &Identity) -> Result<Vec<PurchasedItem>> {
        self.gateway.purchases(identity).await
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }
}
