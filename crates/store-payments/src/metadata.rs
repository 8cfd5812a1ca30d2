//! Checkout session metadata
//!
//! The checkout session carries enough to rebuild the order if the pending
//! row never made it to storage: order id, owner and `id:qty` item pairs.
//! Prices are never carried; they are re-read from the catalog.

use std::collections::HashMap;

use store_core::order::price_cart;
use store_core::{CartLine, Catalog, Identity, LineItem, OrderId};

use crate::error::{PaymentError, Result};

pub const ORDER_ID: &str = "order_id";
pub const USER_ID: &str = "user_id";
pub const EMAIL: &str = "email";
pub const ITEMS: &str = "items";

/// Build session metadata for an order
pub fn encode(order_id: &OrderId, owner: &Identity, items: &[LineItem]) -> HashMap<String, String> {
    let mut metadata = HashMap::new();
    metadata.insert(ORDER_ID.to_string(), order_id.to_string());
    metadata.insert(EMAIL.to_string(), owner.email().to_string());
    if let Some(user_id) = owner.user_id() {
        metadata.insert(USER_ID.to_string(), user_id.to_string());
    }
    let items = items
        .iter()
        .map(|item| format!("{}:{}", item.product_id, item.quantity))
        .collect::<Vec<_>>()
        .join(",");
    metadata.insert(ITEMS.to_string(), items);
    metadata
}

/// Owner from metadata, falling back to the session's customer email
pub fn decode_owner(metadata: &HashMap<String, String>, customer_email: Option<&str>) -> Result<Identity> {
    let email = metadata
        .get(EMAIL)
        .map(String::as_str)
        .or(customer_email)
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| PaymentError::WebhookParse("session has no customer email".into()))?;

    Ok(match metadata.get(USER_ID).filter(|id| !id.is_empty()) {
        Some(user_id) => Identity::user(user_id.clone(), email),
        None => Identity::guest(email),
    })
}

/// Line items from metadata, priced from the catalog
pub fn decode_items(metadata: &HashMap<String, String>, catalog: &Catalog) -> Result<Vec<LineItem>> {
    let raw = metadata
        .get(ITEMS)
        .ok_or_else(|| PaymentError::WebhookParse("session metadata has no items".into()))?;

    let lines = raw
        .split(',')
        .filter(|pair| !pair.trim().is_empty())
        .map(|pair| {
            let (product, quantity) = pair.split_once(':').unwrap_or((pair, "1"));
            let quantity = quantity
                .trim()
                .parse()
                .map_err(|_| PaymentError::WebhookParse(format!("bad quantity in '{}'", pair)))?;
            Ok(CartLine {
                product: product.trim().to_string(),
                quantity,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    price_cart(catalog, &lines).map_err(|e| PaymentError::WebhookParse(e.to_string()))
}
