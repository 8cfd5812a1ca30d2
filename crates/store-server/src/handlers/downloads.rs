//! Signed download links

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Serialize;
use store_core::{Fulfillment, OrderId, OrderStatus, ProductId};

use crate::error::{ApiError, ApiResult, api_error};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub name: String,
    pub fulfillment: Fulfillment,
}

fn not_found() -> ApiError {
    api_error(StatusCode::NOT_FOUND, "NOT_FOUND", "This download link is not valid.")
}

/// Resolve a download token to the product's fulfilment reference
pub async fn resolve_download(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<Json<DownloadResponse>> {
    let (order_id, product_id) = state.downloads.verify(&token).map_err(|_| {
        tracing::warn!("Rejected download token");
        not_found()
    })?;

    let product = state.catalog.get(&product_id).ok_or_else(not_found)?;

    // An order that is readable but not completed does not grant the file.
    match state.bounded(state.gateway.get_order(&order_id)).await {
        Ok(Some(order)) if order.status != OrderStatus::Completed => return Err(not_found()),
        Ok(_) => {}
        Err(e) => tracing::debug!(order_id = %order_id, error = %e, "Order lookup skipped for download"),
    }

    tracing::info!(order_id = %order_id, product = %product_id, "Download resolved");

    Ok(Json(DownloadResponse {
        order_id,
        name: product.name.clone(),
        fulfillment: product.fulfillment.clone(),
        product_id,
    }))
}
