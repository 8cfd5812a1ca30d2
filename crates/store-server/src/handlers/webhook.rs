//! Payment webhook

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;

use super::Received;
use crate::error::{ApiResult, payment_error};
use crate::state::AppState;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Stripe webhook handler. Any 2xx stops provider retries, so everything
/// except a bad signature or unreadable payload is acknowledged.
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Received>> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());

    let handled = state.webhooks.handle(&body, signature).await.map_err(|e| {
        tracing::warn!(error = %e, "Webhook rejected");
        payment_error(e)
    })?;

    tracing::info!(outcome = ?handled.outcome, "Webhook processed");
    Ok(Received::ok())
}
