//! Purchase confirmation

use axum::Json;
use axum::extract::{Query, State};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use store_core::{Fulfillment, Identity, OrderId, ProductId};

use crate::error::{ApiResult, forbidden, store_error, unauthenticated};
use crate::identity::CurrentIdentity;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchasesQuery {
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseView {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub purchased_at: DateTime<Utc>,
    /// Download or booking link
    pub access_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PurchasesResponse {
    pub purchases: Vec<PurchaseView>,
}

/// Completed purchases of the caller, or of `userId` for admins
pub async fn confirm_purchases(
    State(state): State<AppState>,
    identity: CurrentIdentity,
    Query(query): Query<PurchasesQuery>,
) -> ApiResult<Json<PurchasesResponse>> {
    let caller = identity.get().ok_or_else(unauthenticated)?;

    let subject = match query.user_id.as_deref().filter(|id| !id.is_empty()) {
        None => caller.clone(),
        Some(id) if caller.user_id() == Some(id) => caller.clone(),
        Some(id) if state.policy.is_admin(caller) => Identity::user(id, ""),
        Some(_) => return Err(forbidden()),
    };

    let items = state
        .bounded(state.guard.entitlements().purchases(&subject))
        .await
        .map_err(store_error)?;

    let site = state.dispatcher.config().site_url.trim_end_matches('/').to_string();
    let purchases = items
        .into_iter()
        .filter_map(|item| {
            let product = state.catalog.get(&item.product_id)?;
            let access_url = match &product.fulfillment {
                Fulfillment::Download { .. } => item.download_token.as_deref().map(|t| state.dispatcher.download_url(t)),
                Fulfillment::Booking { flow } => Some(format!("{}/{}", site, flow)),
            };
            Some(PurchaseView {
                order_id: item.order_id,
                product_name: product.name.clone(),
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
                purchased_at: item.purchased_at,
                access_url,
            })
        })
        .collect();

    Ok(Json(PurchasesResponse { purchases }))
}
