//! Access Guard
//!
//! The single check every protected page and endpoint runs.

use tracing::warn;

use crate::catalog::Product;
use crate::entitlement::EntitlementStore;
use crate::error::{Result, StoreError};
use crate::identity::Identity;

/// Why access was refused
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DenialReason {
    /// No completed order for the product
    NotPurchased,
    /// Entitlements could not be read; refused rather than opened
    Unverifiable,
}

/// Outcome of an access check
#[derive(Clone, Debug)]
pub enum AccessDecision {
    Granted(Product),
    Denied { product: Product, reason: DenialReason },
}

impl AccessDecision {
    pub fn is_granted(&self) -> bool {
        matches!(self, AccessDecision::Granted(_))
    }

    pub fn product(&self) -> &Product {
        match self {
            AccessDecision::Granted(p) | AccessDecision::Denied { product: p, .. } => p,
        }
    }
}

/// Reusable content guard
#[derive(Clone)]
pub struct AccessGuard {
    entitlements: EntitlementStore,
}

impl AccessGuard {
    pub fn new(entitlements: EntitlementStore) -> Self {
        Self { entitlements }
    }

    /// Check whether `identity` may see the content guarded by `product_ref`.
    ///
    /// Unknown products are an error; missing identity is `Unauthenticated`;
    /// a failed entitlement read is a denial.
    pub async fn check(&self, identity: Option<&Identity>, product_ref: &str) -> Result<AccessDecision> {
        let product = self.entitlements.catalog().resolve(product_ref)?.clone();
        let identity = identity.ok_or(StoreError::Unauthenticated)?;

        match self.entitlements.has_access(identity, &product.id).await {
            Ok(true) => Ok(AccessDecision::Granted(product)),
            Ok(false) => Ok(AccessDecision::Denied {
                product,
                reason: DenialReason::NotPurchased,
            }),
            Err(e) => {
                warn!(identity = %identity, product = %product.id, error = %e, "Entitlement read failed, denying");
                Ok(AccessDecision::Denied {
                    product,
                    reason: DenialReason::Unverifiable,
                })
            }
        }
    }

    pub fn entitlements(&self) -> &EntitlementStore {
        &self.entitlements
    }
}
