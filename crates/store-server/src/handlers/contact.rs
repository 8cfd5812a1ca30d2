//! Contact form

use axum::Json;
use axum::extract::State;
use store_notify::Inquiry;

use super::Received;
use crate::error::{ApiResult, bad_request};
use crate::state::AppState;

const MAX_MESSAGE_LEN: usize = 5000;

/// Acknowledge an inquiry and copy it to the admin
pub async fn submit_inquiry(
    State(state): State<AppState>,
    Json(inquiry): Json<Inquiry>,
) -> ApiResult<Json<Received>> {
    if inquiry.name.trim().is_empty() || inquiry.message.trim().is_empty() {
        return Err(bad_request("Name and message are required."));
    }
    if !inquiry.email.contains('@') {
        return Err(bad_request("A valid email address is required."));
    }
    if inquiry.message.len() > MAX_MESSAGE_LEN {
        return Err(bad_request("Message is too long."));
    }

    tracing::info!(email = %inquiry.email, "Inquiry received");

    let dispatcher = state.dispatcher.clone();
    tokio::spawn(async move { dispatcher.inquiry_received(&inquiry).await });

    Ok(Received::ok())
}
