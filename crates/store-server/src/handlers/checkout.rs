//! Checkout

use axum::Json;
use axum::extract::State;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use store_core::{CartLine, OrderId};

use crate::error::{ApiResult, payment_error};
use crate::identity::CurrentIdentity;
use crate::state::AppState;

fn one() -> u32 {
    1
}

/// A cart line as the storefront sends it. Client `name` and `price` fields
/// are accepted and ignored; prices come from the catalog.
#[derive(Debug, Deserialize)]
pub struct CheckoutItem {
    #[serde(alias = "productId", alias = "product")]
    pub id: String,
    #[serde(default = "one")]
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub items: Vec<CheckoutItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    /// Hosted payment page
    pub url: String,
    pub session_id: String,
    pub order_id: OrderId,
    pub total: Decimal,
}

/// Create a checkout session for the signed-in user's cart
pub async fn create_checkout(
    State(state): State<AppState>,
    identity: CurrentIdentity,
    Json(payload): Json<CheckoutRequest>,
) -> ApiResult<Json<CheckoutResponse>> {
    let cart: Vec<CartLine> = payload
        .items
        .into_iter()
        .map(|item| CartLine {
            product: item.id,
            quantity: item.quantity,
        })
        .collect();

    let session = state
        .checkout
        .initiate(identity.get(), &cart)
        .await
        .map_err(payment_error)?;

    Ok(Json(CheckoutResponse {
        url: session.checkout_url,
        session_id: session.session_id,
        order_id: session.order_id,
        total: session.total,
    }))
}
