//! Orders
//!
//! ```text
//! pending_confirmation ──(payment success)──▶ completed
//!          │
//!          └──────────(failure / expiry)────▶ failed
//! ```
//!
//! `completed` and `failed` are terminal. Completing an already completed
//! order is a no-op so webhook redelivery is harmless.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::{Catalog, ProductId};
use crate::error::{Result, StoreError};
use crate::identity::Identity;

/// Unique order identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order lifecycle status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingConfirmation,
    Completed,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::PendingConfirmation => "pending_confirmation",
            OrderStatus::Completed => "completed",
            OrderStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending_confirmation" | "pending" => Some(OrderStatus::PendingConfirmation),
            "completed" => Some(OrderStatus::Completed),
            "failed" => Some(OrderStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::PendingConfirmation)
    }
}

/// One product line in an order, priced from the catalog
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl LineItem {
    pub fn subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// A cart line as submitted by a client, before validation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CartLine {
    /// Product id or alias
    pub product: String,
    pub quantity: u32,
}

/// Validate a cart against the catalog and price it server-side.
///
/// Duplicate lines for the same product are merged.
pub fn price_cart(catalog: &Catalog, lines: &[CartLine]) -> Result<Vec<LineItem>> {
    if lines.is_empty() {
        return Err(StoreError::InvalidRequest("Cart is empty".into()));
    }

    let mut merged: Vec<LineItem> = Vec::new();
    for line in lines {
        let product = catalog.resolve(&line.product)?;
        if line.quantity == 0 {
            return Err(StoreError::InvalidRequest(format!(
                "Quantity for '{}' must be at least 1",
                line.product
            )));
        }

        match merged.iter_mut().find(|item| item.product_id == product.id) {
            Some(item) => item.quantity = item.quantity.saturating_add(line.quantity),
            None => merged.push(LineItem {
                product_id: product.id.clone(),
                quantity: line.quantity,
                unit_price: product.price,
            }),
        }
    }

    Ok(merged)
}

/// An order record
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    /// Order id, also embedded in the payment session metadata
    pub id: OrderId,

    /// Buyer
    pub owner: Identity,

    /// Purchased lines
    pub items: Vec<LineItem>,

    /// Sum of line subtotals
    pub total: Decimal,

    /// Lifecycle status
    pub status: OrderStatus,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// When payment was confirmed
    pub completed_at: Option<DateTime<Utc>>,

    /// Payment provider session reference
    pub payment_session_id: Option<String>,

    /// Set in the same write as completion; whoever flips it sends the confirmation email
    pub notified: bool,
}

impl Order {
    /// Create a pending order
    pub fn pending(id: OrderId, owner: Identity, items: Vec<LineItem>) -> Self {
        let total = items.iter().map(LineItem::subtotal).sum();
        Self {
            id,
            owner,
            items,
            total,
            status: OrderStatus::PendingConfirmation,
            created_at: Utc::now(),
            completed_at: None,
            payment_session_id: None,
            notified: false,
        }
    }

    /// Apply a payment success.
    ///
    /// Returns `true` when this call moved the order to `completed`, `false`
    /// when it was already completed.
    pub fn complete(&mut self, payment_session_id: &str) -> Result<bool> {
        match self.status {
            OrderStatus::Completed => Ok(false),
            OrderStatus::Failed => Err(StoreError::InvalidTransition {
                from: self.status.as_str().into(),
                to: OrderStatus::Completed.as_str().into(),
            }),
            OrderStatus::PendingConfirmation => {
                self.status = OrderStatus::Completed;
                self.completed_at = Some(Utc::now());
                self.payment_session_id = Some(payment_session_id.to_string());
                self.notified = true;
                Ok(true)
            }
        }
    }

    /// Apply a payment failure or expiry. Returns `true` if the status changed.
    pub fn fail(&mut self) -> Result<bool> {
        match self.status {
            OrderStatus::Failed => Ok(false),
            OrderStatus::Completed => Err(StoreError::InvalidTransition {
                from: self.status.as_str().into(),
                to: OrderStatus::Failed.as_str().into(),
            }),
            OrderStatus::PendingConfirmation => {
                self.status = OrderStatus::Failed;
                Ok(true)
            }
        }
    }

    /// Purchase records for a completed order
    pub fn purchased_items(&self, downloads: &BTreeMap<ProductId, String>) -> Vec<PurchasedItem> {
        let purchased_at = self.completed_at.unwrap_or(self.created_at);
        self.items
            .iter()
            .map(|item| PurchasedItem {
                order_id: self.id.clone(),
                product_id: item.product_id.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                download_token: downloads.get(&item.product_id).cloned(),
                purchased_at,
            })
            .collect()
    }
}

/// A persisted purchase line of a completed order
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchasedItem {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Decimal,
    /// Signed download reference
    pub download_token: Option<String>,
    pub purchased_at: DateTime<Utc>,
}

/// Everything a gateway needs to complete an order atomically
#[derive(Clone, Debug)]
pub struct OrderCompletion {
    /// Payment provider session id
    pub payment_session_id: String,

    /// Order rebuilt from the payment event; inserted if no row exists yet
    pub order: Order,

    /// Per-product download references
    pub downloads: BTreeMap<ProductId, String>,
}

/// Result of a completion attempt
#[derive(Clone, Debug)]
pub enum CompletionOutcome {
    /// This call completed the order
    Completed(Order),
    /// The order was already completed; nothing changed
    AlreadyCompleted(Order),
}

impl CompletionOutcome {
    pub fn order(&self) -> &Order {
        match self {
            CompletionOutcome::Completed(o) | CompletionOutcome::AlreadyCompleted(o) => o,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, CompletionOutcome::AlreadyCompleted(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn cart(lines: &[(&str, u32)]) -> Vec<CartLine> {
        lines
            .iter()
            .map(|(p, q)| CartLine {
                product: (*p).into(),
                quantity: *q,
            })
            .collect()
    }

    #[test]
    fn test_total_uses_catalog_prices() {
        let catalog = Catalog::standard();
        let items = price_cart(&catalog, &cart(&[("ebook", 1), ("2", 3)])).unwrap();
        let order = Order::pending(OrderId::new(), Identity::user("u1", "u1@x.io"), items);
        assert_eq!(order.total, dec!(45.00));
    }

    #[test]
    fn test_duplicate_lines_merge() {
        let catalog = Catalog::standard();
        let items = price_cart(&catalog, &cart(&[("ebook", 1), ("1", 2)])).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 3);
    }

    #[test]
    fn test_cart_validation() {
        let catalog = Catalog::standard();
        assert!(matches!(
            price_cart(&catalog, &[]),
            Err(StoreError::InvalidRequest(_))
        ));
        assert!(matches!(
            price_cart(&catalog, &cart(&[("ebook", 0)])),
            Err(StoreError::InvalidRequest(_))
        ));
        assert!(matches!(
            price_cart(&catalog, &cart(&[("unknown", 1)])),
            Err(StoreError::InvalidProduct(_))
        ));
    }

    #[test]
    fn test_complete_once() {
        let mut order = Order::pending(OrderId::new(), Identity::guest("g@x.io"), vec![]);
        assert!(order.complete("cs_1").unwrap());
        assert!(order.notified);
        assert!(!order.complete("cs_1").unwrap());
        assert!(order.fail().is_err());
    }

    #[test]
    fn test_failed_is_terminal() {
        let mut order = Order::pending(OrderId::new(), Identity::guest("g@x.io"), vec![]);
        assert!(order.fail().unwrap());
        assert!(!order.fail().unwrap());
        assert!(matches!(
            order.complete("cs_1"),
            Err(StoreError::InvalidTransition { .. })
        ));
    }
}
